use std::cmp::Ordering;
use std::str::FromStr;

use chrono::NaiveDate;

use strum::{Display, EnumIter, EnumString};

use super::*;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, EnumIter, Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum LeaderboardMetric {
    #[default]
    Level,
    #[strum(to_string = "experience", serialize = "xp")]
    Experience,
    Commits,
    Streak,
}

impl LeaderboardMetric {
    pub fn parse(value: &str) -> Result<Self> {
        Self::from_str(value).map_err(|_| Error::invalid(format!("unknown leaderboard metric: {value}")))
    }

    /// Streaks compare as they stand on `today`, a broken streak counts as 0.
    pub fn compare(&self, a: &UserProgress, b: &UserProgress, today: NaiveDate) -> Ordering {
        match self {
            Self::Level => a
                .level
                .cmp(&b.level)
                .then_with(|| a.experience.cmp(&b.experience)),
            _ => self.value(a, today).cmp(&self.value(b, today)),
        }
    }

    pub fn value(&self, progress: &UserProgress, today: NaiveDate) -> u32 {
        match self {
            Self::Level => progress.level,
            Self::Experience => progress.experience,
            Self::Commits => progress.total_commits,
            Self::Streak => progress.effective_streak(today),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedEntry<T> {
    pub place: u32,
    pub user: T,
    pub progress: UserProgress,
}

/// Best first. Equal entries keep their input order.
pub fn rank<T>(
    entries: Vec<(T, UserProgress)>,
    metric: LeaderboardMetric,
    today: NaiveDate,
) -> Vec<RankedEntry<T>> {
    let mut entries = entries;
    entries.sort_by(|(_, a), (_, b)| metric.compare(b, a, today));

    entries
        .into_iter()
        .enumerate()
        .map(|(index, (user, progress))| RankedEntry {
            place: index as u32 + 1,
            user,
            progress,
        })
        .collect()
}
