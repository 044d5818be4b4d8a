use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use shared::{non_negative, ActivityStatus, RepoInfo, UserProgress, Vacation, WeeklyStat};

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: i32,
    pub login: String,
    pub full_name: Option<String>,
    pub telegram_chat_id: Option<i64>,
    pub vacation_start: Option<NaiveDate>,
    pub vacation_end: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn vacation(&self) -> Option<Vacation> {
        Vacation::from_bounds(self.vacation_start, self.vacation_end)
    }
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize, Default)]
pub struct ProgressRecord {
    pub user_id: i32,
    pub total_commits: i32,
    pub active_days: i32,
    pub current_streak: i32,
    pub longest_streak: i32,
    pub level: i32,
    pub experience: i32,
    pub badges: Vec<String>,
    pub last_active_day: Option<NaiveDate>,
    pub active_dates: Vec<NaiveDate>,
}

impl TryFrom<ProgressRecord> for UserProgress {
    type Error = shared::Error;

    fn try_from(record: ProgressRecord) -> shared::Result<Self> {
        let experience = non_negative("experience", record.experience as i64)?;
        non_negative("level", record.level as i64)?;
        Ok(Self {
            user_id: non_negative("user_id", record.user_id as i64)?,
            total_commits: non_negative("total_commits", record.total_commits as i64)?,
            active_days: non_negative("active_days", record.active_days as i64)?,
            current_streak: non_negative("current_streak", record.current_streak as i64)?,
            longest_streak: non_negative("longest_streak", record.longest_streak as i64)?,
            // Stored level is derived, recompute it
            level: shared::level_for_experience(experience),
            experience,
            badges: record.badges,
            last_active_day: record.last_active_day,
            active_dates: record.active_dates.into_iter().collect(),
        })
    }
}

/// Postgres INTEGER column value, counters past `i32::MAX` are rejected instead of wrapping.
pub fn stored_counter(field: &str, value: u32) -> shared::Result<i32> {
    i32::try_from(value)
        .map_err(|_| shared::Error::invalid(format!("{field} is too large to store: {value}")))
}

impl TryFrom<&UserProgress> for ProgressRecord {
    type Error = shared::Error;

    fn try_from(progress: &UserProgress) -> shared::Result<Self> {
        Ok(Self {
            user_id: stored_counter("user_id", progress.user_id)?,
            total_commits: stored_counter("total_commits", progress.total_commits)?,
            active_days: stored_counter("active_days", progress.active_days)?,
            current_streak: stored_counter("current_streak", progress.current_streak)?,
            longest_streak: stored_counter("longest_streak", progress.longest_streak)?,
            level: stored_counter("level", progress.level)?,
            experience: stored_counter("experience", progress.experience)?,
            badges: progress.badges.clone(),
            last_active_day: progress.last_active_day,
            active_dates: progress.active_dates.iter().copied().collect(),
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct LeaderboardRecord {
    pub login: String,
    pub full_name: Option<String>,
    #[sqlx(flatten)]
    pub progress: ProgressRecord,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct RepositoryRecord {
    pub id: i32,
    pub user_id: i32,
    pub owner: String,
    pub name: String,
    pub full_name: String,
    pub last_commit_date: Option<DateTime<Utc>>,
    pub last_commit_sha: Option<String>,
    pub status: String,
    pub changes_summary: Option<String>,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl RepositoryRecord {
    pub fn status(&self) -> ActivityStatus {
        self.status.parse().unwrap_or_default()
    }

    pub fn repo_info(&self) -> shared::Result<RepoInfo> {
        RepoInfo::new(&self.owner, &self.name)
    }
}

/// Repository joined with the owner fields the poller needs.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct TrackedRepositoryRecord {
    #[sqlx(flatten)]
    pub repository: RepositoryRecord,
    pub login: String,
    pub telegram_chat_id: Option<i64>,
    pub vacation_start: Option<NaiveDate>,
    pub vacation_end: Option<NaiveDate>,
}

impl TrackedRepositoryRecord {
    pub fn vacation(&self) -> Option<Vacation> {
        Vacation::from_bounds(self.vacation_start, self.vacation_end)
    }
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct WeeklyStatRecord {
    pub user_id: i32,
    pub week: String,
    pub commit_count: i32,
    pub streak_days: i32,
}

impl TryFrom<&WeeklyStat> for WeeklyStatRecord {
    type Error = shared::Error;

    fn try_from(stat: &WeeklyStat) -> shared::Result<Self> {
        Ok(Self {
            user_id: stored_counter("user_id", stat.user_id)?,
            week: stat.week.clone(),
            commit_count: stored_counter("commit_count", stat.commit_count)?,
            streak_days: stored_counter("streak_days", stat.streak_days)?,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct WeeklyLeaderRecord {
    pub login: String,
    pub commit_count: i32,
    pub streak_days: i32,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize, Default)]
pub struct Statistics {
    pub number_of_users: Option<i64>,
    pub number_of_repos: Option<i64>,
    pub active_repos: Option<i64>,
    pub warning_repos: Option<i64>,
    pub inactive_repos: Option<i64>,
    pub pending_repos: Option<i64>,
    pub total_commits: Option<i64>,
    pub total_experience: Option<i64>,
    pub top_login: Option<String>,
    pub top_level: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_record_recomputes_level() {
        let record = ProgressRecord {
            user_id: 4,
            total_commits: 30,
            experience: 300,
            level: 1,
            badges: vec!["first_commit".to_string()],
            ..Default::default()
        };
        let progress = UserProgress::try_from(record).unwrap();
        assert_eq!(progress.level, 4);
        assert_eq!(progress.user_id, 4);
    }

    #[test]
    fn progress_round_trips_through_record() {
        let progress = UserProgress {
            user_id: 3,
            total_commits: 4,
            active_days: 2,
            current_streak: 2,
            longest_streak: 2,
            experience: 40,
            badges: vec!["first_commit".to_string()],
            last_active_day: NaiveDate::from_ymd_opt(2024, 3, 2),
            active_dates: [
                NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
            ]
            .into(),
            ..UserProgress::new(3)
        };
        let record = ProgressRecord::try_from(&progress).unwrap();
        assert_eq!(record.active_dates.len(), 2);
        assert_eq!(UserProgress::try_from(record).unwrap(), progress);
    }

    #[test]
    fn counters_past_i32_are_not_stored() {
        let progress = UserProgress {
            experience: i32::MAX as u32 + 1,
            ..UserProgress::new(1)
        };
        assert!(matches!(
            ProgressRecord::try_from(&progress),
            Err(shared::Error::InvalidArgument(_))
        ));
        assert_eq!(stored_counter("level", i32::MAX as u32), Ok(i32::MAX));

        let stat = WeeklyStat {
            user_id: 1,
            week: "2024W10".to_string(),
            commit_count: u32::MAX,
            streak_days: 1,
        };
        assert!(WeeklyStatRecord::try_from(&stat).is_err());
    }

    #[test]
    fn negative_counters_are_invalid() {
        let record = ProgressRecord {
            experience: -10,
            ..Default::default()
        };
        assert!(matches!(
            UserProgress::try_from(record),
            Err(shared::Error::InvalidArgument(_))
        ));
    }
}
