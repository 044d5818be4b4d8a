use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use super::*;

pub const EXPERIENCE_PER_LEVEL: u32 = 100;
pub const DEFAULT_POINTS_PER_COMMIT: u32 = 10;

pub const fn level_for_experience(experience: u32) -> u32 {
    experience / EXPERIENCE_PER_LEVEL + 1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub points_per_commit: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            points_per_commit: DEFAULT_POINTS_PER_COMMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProgress {
    pub user_id: u32,
    pub total_commits: u32,
    pub active_days: u32,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub level: u32,
    pub experience: u32,
    pub badges: Vec<BadgeId>,
    pub last_active_day: Option<NaiveDate>,
    /// Every day already counted as active.
    #[serde(default)]
    pub active_dates: BTreeSet<NaiveDate>,
}

impl Default for UserProgress {
    fn default() -> Self {
        Self::new(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyStat {
    pub user_id: u32,
    pub week: TimePeriodString,
    pub commit_count: u32,
    pub streak_days: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub progress: UserProgress,
    pub new_badges: Vec<BadgeId>,
    /// Amounts to add to the stored weekly rows, one entry per touched week.
    pub weekly: Vec<WeeklyStat>,
}

impl UserProgress {
    pub fn new(user_id: u32) -> Self {
        Self {
            user_id,
            total_commits: 0,
            active_days: 0,
            current_streak: 0,
            longest_streak: 0,
            level: level_for_experience(0),
            experience: 0,
            badges: vec![],
            last_active_day: None,
            active_dates: BTreeSet::new(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.user_id);
    }

    pub fn effective_streak(&self, today: NaiveDate) -> u32 {
        effective_streak(self.current_streak, self.last_active_day, today)
    }

    pub fn apply_commits(&self, commits: &[Commit], config: &ScoringConfig) -> Result<ProgressUpdate> {
        let batch = u32::try_from(commits.len())
            .map_err(|_| Error::invalid("commit batch is too large"))?;
        let mut progress = self.clone();

        progress.total_commits = progress
            .total_commits
            .checked_add(batch)
            .ok_or_else(|| Error::invalid("total commits overflow"))?;

        let mut weekly: BTreeMap<TimePeriodString, WeeklyStat> = BTreeMap::new();
        for commit in commits {
            weekly
                .entry(TimePeriod::Week.date_string(commit.day()))
                .or_insert_with_key(|week| WeeklyStat {
                    user_id: progress.user_id,
                    week: week.clone(),
                    commit_count: 0,
                    streak_days: 0,
                })
                .commit_count += 1;
        }

        let mut counted_new_day = false;
        for day in distinct_days(commits) {
            if !progress.active_dates.insert(day) {
                continue;
            }
            counted_new_day = true;
            progress.active_days += 1;
            if let Some(stat) = weekly.get_mut(&TimePeriod::Week.date_string(day)) {
                stat.streak_days += 1;
            }
        }
        // Days may arrive out of order, so streaks come from the whole set
        if counted_new_day {
            progress.last_active_day = progress.active_dates.last().copied();
            if let Some(last) = progress.last_active_day {
                progress.current_streak = run_ending_at(&progress.active_dates, last);
            }
            progress.longest_streak = progress
                .longest_streak
                .max(longest_run(&progress.active_dates));
        }

        let gained = batch
            .checked_mul(config.points_per_commit)
            .ok_or_else(|| Error::invalid("experience overflow"))?;
        progress.experience = progress
            .experience
            .checked_add(gained)
            .ok_or_else(|| Error::invalid("experience overflow"))?;
        progress.level = level_for_experience(progress.experience);

        let new_badges = unlocked_badges(&progress);
        progress.badges.extend(new_badges.iter().cloned());

        Ok(ProgressUpdate {
            progress,
            new_badges,
            weekly: weekly.into_values().collect(),
        })
    }
}

fn distinct_days(commits: &[Commit]) -> Vec<NaiveDate> {
    let mut days: Vec<NaiveDate> = commits.iter().map(Commit::day).collect();
    days.sort_unstable();
    days.dedup();
    days
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};

    use super::*;

    fn commit_at(sha: &str, timestamp: DateTime<Utc>) -> Commit {
        Commit {
            sha: sha.to_string(),
            author: "octocat".to_string(),
            timestamp,
            message: String::new(),
        }
    }

    fn on_day(day: u32) -> Commit {
        commit_at(
            &format!("sha-{day}"),
            Utc.with_ymd_and_hms(2024, 4, day, 10, 0, 0).unwrap(),
        )
    }

    #[test]
    fn level_follows_experience() {
        assert_eq!(level_for_experience(0), 1);
        assert_eq!(level_for_experience(99), 1);
        assert_eq!(level_for_experience(100), 2);
        assert_eq!(level_for_experience(250), 3);
        for experience in (0..5_000).step_by(37) {
            assert_eq!(level_for_experience(experience), experience / 100 + 1);
        }
    }

    #[test]
    fn first_batch_starts_everything() {
        let update = UserProgress::new(7)
            .apply_commits(&[on_day(1), on_day(1), on_day(2)], &ScoringConfig::default())
            .unwrap();
        let progress = update.progress;

        assert_eq!(progress.total_commits, 3);
        assert_eq!(progress.active_days, 2);
        assert_eq!(progress.current_streak, 2);
        assert_eq!(progress.longest_streak, 2);
        assert_eq!(progress.experience, 30);
        assert_eq!(progress.level, 1);
        assert_eq!(progress.badges, vec!["first_commit"]);
        assert_eq!(update.new_badges, vec!["first_commit"]);
        assert_eq!(
            progress.last_active_day,
            NaiveDate::from_ymd_opt(2024, 4, 2)
        );
    }

    #[test]
    fn next_day_extends_streak_by_one() {
        let config = ScoringConfig::default();
        let progress = UserProgress::new(1)
            .apply_commits(&[on_day(4)], &config)
            .unwrap()
            .progress;
        let next = progress.apply_commits(&[on_day(5)], &config).unwrap().progress;
        assert_eq!(next.current_streak, progress.current_streak + 1);
        assert_eq!(next.active_days, 2);
    }

    #[test]
    fn gap_resets_streak_but_keeps_longest() {
        let config = ScoringConfig::default();
        let progress = UserProgress::new(1)
            .apply_commits(&[on_day(1), on_day(2), on_day(3)], &config)
            .unwrap()
            .progress;
        assert_eq!(progress.current_streak, 3);

        let after_gap = progress.apply_commits(&[on_day(6)], &config).unwrap().progress;
        assert_eq!(after_gap.current_streak, 1);
        assert_eq!(after_gap.longest_streak, 3);
    }

    #[test]
    fn repeated_days_are_not_recounted() {
        let config = ScoringConfig::default();
        let progress = UserProgress::new(1)
            .apply_commits(&[on_day(10)], &config)
            .unwrap()
            .progress;
        let again = progress.apply_commits(&[on_day(10)], &config).unwrap();

        assert_eq!(again.progress.total_commits, 2);
        assert_eq!(again.progress.active_days, 1);
        assert_eq!(again.progress.current_streak, 1);
        assert_eq!(again.progress.experience, 20);
        assert_eq!(again.weekly[0].streak_days, 0);
        assert!(again.new_badges.is_empty());
    }

    #[test]
    fn batches_out_of_order_match_one_batch() {
        let config = ScoringConfig::default();
        let joint = UserProgress::new(1)
            .apply_commits(&[on_day(9), on_day(10)], &config)
            .unwrap()
            .progress;

        let first = UserProgress::new(1)
            .apply_commits(&[on_day(10)], &config)
            .unwrap()
            .progress;
        let late = first.apply_commits(&[on_day(9)], &config).unwrap();
        let split = late.progress;

        assert_eq!(split.active_days, 2);
        assert_eq!(split.current_streak, 2);
        assert_eq!(split.longest_streak, 2);
        assert_eq!(split.last_active_day, NaiveDate::from_ymd_opt(2024, 4, 10));
        assert_eq!(late.weekly[0].streak_days, 1);
        assert_eq!(split, joint);
    }

    #[test]
    fn older_day_before_a_gap_keeps_current_streak() {
        let config = ScoringConfig::default();
        let progress = UserProgress::new(1)
            .apply_commits(&[on_day(10), on_day(11)], &config)
            .unwrap()
            .progress;
        let update = progress.apply_commits(&[on_day(3)], &config).unwrap();

        assert_eq!(update.progress.active_days, 3);
        assert_eq!(update.progress.current_streak, 2);
        assert_eq!(update.progress.longest_streak, 2);
        assert_eq!(update.progress.last_active_day, NaiveDate::from_ymd_opt(2024, 4, 11));
    }

    #[test]
    fn empty_batch_changes_nothing() {
        let progress = UserProgress::new(3)
            .apply_commits(&[on_day(1)], &ScoringConfig::default())
            .unwrap()
            .progress;
        let update = progress.apply_commits(&[], &ScoringConfig::default()).unwrap();
        assert_eq!(update.progress, progress);
        assert!(update.weekly.is_empty());
    }

    #[test]
    fn weekly_deltas_split_by_iso_week() {
        // 2024-04-07 is a Sunday, 2024-04-08 starts week 15
        let commits = [on_day(6), on_day(7), on_day(7), on_day(8)];
        let update = UserProgress::new(2)
            .apply_commits(&commits, &ScoringConfig::default())
            .unwrap();

        assert_eq!(
            update.weekly,
            vec![
                WeeklyStat {
                    user_id: 2,
                    week: "2024W14".to_string(),
                    commit_count: 3,
                    streak_days: 2,
                },
                WeeklyStat {
                    user_id: 2,
                    week: "2024W15".to_string(),
                    commit_count: 1,
                    streak_days: 1,
                },
            ]
        );
        let total: u32 = update.weekly.iter().map(|w| w.commit_count).sum();
        assert_eq!(total, commits.len() as u32);
    }

    #[test]
    fn custom_points_per_commit() {
        let config = ScoringConfig {
            points_per_commit: 25,
        };
        let progress = UserProgress::new(1)
            .apply_commits(&[on_day(1), on_day(2), on_day(3), on_day(4)], &config)
            .unwrap()
            .progress;
        assert_eq!(progress.experience, 100);
        assert_eq!(progress.level, 2);
    }

    #[test]
    fn reset_keeps_user() {
        let mut progress = UserProgress::new(9)
            .apply_commits(&[on_day(1)], &ScoringConfig::default())
            .unwrap()
            .progress;
        progress.reset();
        assert_eq!(progress, UserProgress::new(9));
        assert_eq!(progress.level, 1);
    }

    #[test]
    fn experience_overflow_is_rejected() {
        let progress = UserProgress {
            experience: u32::MAX - 5,
            ..UserProgress::new(1)
        };
        assert!(matches!(
            progress.apply_commits(&[on_day(1)], &ScoringConfig::default()),
            Err(Error::InvalidArgument(_))
        ));
    }
}
