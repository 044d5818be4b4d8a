use chrono::{DateTime, Duration, TimeZone, Utc};

use super::*;

pub fn github_handle(id: u8) -> GithubHandle {
    format!("name-{id}")
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()
}

pub struct CommunityExt {
    pub users: Vec<(GithubHandle, UserProgress)>,
    pub config: ScoringConfig,
}

impl CommunityExt {
    pub fn new(users: u8) -> Self {
        Self {
            users: (0..users)
                .map(|id| (github_handle(id), UserProgress::new(id as u32)))
                .collect(),
            config: ScoringConfig::default(),
        }
    }

    pub fn commit(&mut self, id: u8, day: i64, amount: usize) -> ProgressUpdate {
        let commits: Vec<Commit> = (0..amount)
            .map(|n| Commit {
                sha: format!("{id}-{day}-{n}"),
                author: github_handle(id),
                timestamp: start_time() + Duration::days(day) + Duration::minutes(n as i64),
                message: format!("change {n}"),
            })
            .collect();
        let (_, progress) = &mut self.users[id as usize];
        let update = progress.apply_commits(&commits, &self.config).unwrap();
        *progress = update.progress.clone();
        update
    }

    pub fn progress(&self, id: u8) -> &UserProgress {
        &self.users[id as usize].1
    }
}

#[test]
fn month_of_daily_commits_flow() {
    let mut community = CommunityExt::new(1);
    let mut longest = 0;
    let mut total = 0;

    for day in 0..30 {
        let before = community.progress(0).total_commits;
        community.commit(0, day, 2);
        let progress = community.progress(0);

        assert_eq!(progress.total_commits, before + 2);
        assert!(progress.longest_streak >= longest);
        assert_eq!(progress.level, progress.experience / 100 + 1);
        longest = progress.longest_streak;
        total += 2;
    }

    let progress = community.progress(0);
    assert_eq!(progress.total_commits, total);
    assert_eq!(progress.current_streak, 30);
    assert_eq!(progress.active_days, 30);
    assert_eq!(progress.experience, 600);
    assert_eq!(progress.level, 7);
    for badge in ["first_commit", "streak_3", "streak_7", "streak_30", "level_5", "active_days_30"] {
        assert!(progress.badges.iter().any(|b| b == badge), "missing {badge}");
    }
}

#[test]
fn badges_survive_broken_streak() {
    let mut community = CommunityExt::new(1);
    for day in 0..7 {
        community.commit(0, day, 1);
    }
    assert!(community.progress(0).badges.contains(&"streak_7".to_string()));

    let update = community.commit(0, 20, 1);
    assert!(update.new_badges.is_empty());
    let progress = community.progress(0);
    assert_eq!(progress.current_streak, 1);
    assert_eq!(progress.longest_streak, 7);
    assert!(progress.badges.contains(&"streak_7".to_string()));

    let mut sorted = progress.badges.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(sorted.len(), progress.badges.len());
}

#[test]
fn leaderboard_and_classifier_over_community() {
    let mut community = CommunityExt::new(3);
    community.commit(0, 0, 25);
    community.commit(1, 0, 28);
    community.commit(2, 0, 50);
    community.commit(2, 1, 1);

    let today = (start_time() + Duration::days(1)).date_naive();
    let ranked = rank(community.users.clone(), LeaderboardMetric::Level, today);
    let order: Vec<_> = ranked.iter().map(|e| e.user.as_str()).collect();
    assert_eq!(order, vec!["name-2", "name-1", "name-0"]);

    let by_streak = rank(community.users.clone(), LeaderboardMetric::Streak, today);
    assert_eq!(by_streak[0].user, "name-2");

    // A week later nobody has a live streak, input order decides
    let later = rank(community.users.clone(), LeaderboardMetric::Streak, today + Duration::days(7));
    assert_eq!(later[0].user, "name-0");

    let thresholds = ActivityThresholds::default();
    let last_commit = start_time() + Duration::days(1);
    assert_eq!(
        thresholds.classify(Some(last_commit), last_commit + Duration::days(2)),
        ActivityStatus::Active
    );
    assert_eq!(
        thresholds.classify(Some(last_commit), last_commit + Duration::days(10)),
        ActivityStatus::Inactive
    );
}
