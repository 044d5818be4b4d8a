use super::*;

pub type BadgeId = String;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeCondition {
    TotalCommits(u32),
    LongestStreak(u32),
    Level(u32),
    ActiveDays(u32),
    Experience(u32),
}

impl BadgeCondition {
    pub const fn is_achieved(&self, progress: &UserProgress) -> bool {
        match self {
            Self::TotalCommits(value) => progress.total_commits >= *value,
            Self::LongestStreak(value) => progress.longest_streak >= *value,
            Self::Level(value) => progress.level >= *value,
            Self::ActiveDays(value) => progress.active_days >= *value,
            Self::Experience(value) => progress.experience >= *value,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Badge {
    pub id: &'static str,
    pub title: &'static str,
    pub condition: BadgeCondition,
}

pub const BADGES: &[Badge] = &[
    Badge {
        id: "first_commit",
        title: "First Commit",
        condition: BadgeCondition::TotalCommits(1),
    },
    Badge {
        id: "commits_100",
        title: "Centurion",
        condition: BadgeCondition::TotalCommits(100),
    },
    Badge {
        id: "commits_1000",
        title: "Commit Machine",
        condition: BadgeCondition::TotalCommits(1000),
    },
    Badge {
        id: "streak_3",
        title: "On a Roll",
        condition: BadgeCondition::LongestStreak(3),
    },
    Badge {
        id: "streak_7",
        title: "Week Warrior",
        condition: BadgeCondition::LongestStreak(7),
    },
    Badge {
        id: "streak_30",
        title: "Unstoppable",
        condition: BadgeCondition::LongestStreak(30),
    },
    Badge {
        id: "level_5",
        title: "Rising Star",
        condition: BadgeCondition::Level(5),
    },
    Badge {
        id: "level_10",
        title: "Vibe Master",
        condition: BadgeCondition::Level(10),
    },
    Badge {
        id: "xp_2500",
        title: "High Voltage",
        condition: BadgeCondition::Experience(2500),
    },
    Badge {
        id: "active_days_30",
        title: "Regular",
        condition: BadgeCondition::ActiveDays(30),
    },
];

pub fn find_badge(id: &str) -> Option<&'static Badge> {
    BADGES.iter().find(|badge| badge.id == id)
}

/// Badges the progress qualifies for but doesn't hold yet, in table order.
pub fn unlocked_badges(progress: &UserProgress) -> Vec<BadgeId> {
    BADGES
        .iter()
        .filter(|badge| badge.condition.is_achieved(progress))
        .filter(|badge| !progress.badges.iter().any(|owned| owned == badge.id))
        .map(|badge| badge.id.to_string())
        .collect()
}
