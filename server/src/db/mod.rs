use chrono::{DateTime, NaiveDate, Utc};
use rocket::{
    fairing::{self, AdHoc},
    Build, Rocket,
};
use rocket_db_pools::Database;
use shared::{Commit, ProgressUpdate, RepoInfo, ScoringConfig, UserProgress, WeeklyStat};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::instrument;

#[derive(Database, Clone, Debug)]
#[database("vibe-community")]
pub struct DB(PgPool);

pub mod types;

use self::types::{
    LeaderboardRecord, ProgressRecord, RepositoryRecord, Statistics, TrackedRepositoryRecord,
    UserRecord, WeeklyLeaderRecord, WeeklyStatRecord,
};

const USER_COLUMNS: &str =
    "id, login, full_name, telegram_chat_id, vacation_start, vacation_end, created_at";
const PROGRESS_COLUMNS: &str = "user_id, total_commits, active_days, current_streak, longest_streak, level, experience, badges, last_active_day, active_dates";
const REPOSITORY_COLUMNS: &str = "r.id, r.user_id, r.owner, r.name, r.full_name, r.last_commit_date, r.last_commit_sha, r.status, r.changes_summary, r.last_checked_at, r.created_at";

impl DB {
    #[instrument(skip(self))]
    pub async fn upsert_user(&self, login: &str, full_name: Option<&str>) -> anyhow::Result<UserRecord> {
        let rec = sqlx::query_as::<_, UserRecord>(&format!(
            r#"
            INSERT INTO users (login, full_name)
            VALUES ($1, $2)
            ON CONFLICT (login) DO UPDATE
            SET full_name = COALESCE(EXCLUDED.full_name, users.full_name)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(login)
        .bind(full_name)
        .fetch_one(&self.0)
        .await?;

        sqlx::query("INSERT INTO user_progress (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(rec.id)
            .execute(&self.0)
            .await?;

        Ok(rec)
    }

    #[instrument(skip(self))]
    pub async fn get_user(&self, login: &str) -> anyhow::Result<Option<UserRecord>> {
        Ok(sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(login) = lower($1)"
        ))
        .bind(login)
        .fetch_optional(&self.0)
        .await?)
    }

    #[instrument(skip(self))]
    pub async fn get_user_by_chat(&self, chat_id: i64) -> anyhow::Result<Option<UserRecord>> {
        Ok(sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE telegram_chat_id = $1"
        ))
        .bind(chat_id)
        .fetch_optional(&self.0)
        .await?)
    }

    /// Links the chat to the user, detaching it from any other user first.
    #[instrument(skip(self))]
    pub async fn link_telegram_chat(&self, login: &str, chat_id: i64) -> anyhow::Result<bool> {
        let mut tx = self.0.begin().await?;
        sqlx::query("UPDATE users SET telegram_chat_id = NULL WHERE telegram_chat_id = $1")
            .bind(chat_id)
            .execute(&mut *tx)
            .await?;
        let updated = sqlx::query("UPDATE users SET telegram_chat_id = $2 WHERE lower(login) = lower($1)")
            .bind(login)
            .bind(chat_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        // Unknown login: dropping the transaction keeps the previous link
        if updated == 0 {
            return Ok(false);
        }
        tx.commit().await?;

        Ok(true)
    }

    #[instrument(skip(self))]
    pub async fn unlink_telegram_chat(&self, chat_id: i64) -> anyhow::Result<bool> {
        let updated = sqlx::query("UPDATE users SET telegram_chat_id = NULL WHERE telegram_chat_id = $1")
            .bind(chat_id)
            .execute(&self.0)
            .await?
            .rows_affected();
        Ok(updated > 0)
    }

    #[instrument(skip(self))]
    pub async fn set_vacation(
        &self,
        user_id: i32,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET vacation_start = $2, vacation_end = $3 WHERE id = $1")
            .bind(user_id)
            .bind(start)
            .bind(end)
            .execute(&self.0)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get_progress(&self, user_id: i32) -> anyhow::Result<UserProgress> {
        let record = sqlx::query_as::<_, ProgressRecord>(&format!(
            "SELECT {PROGRESS_COLUMNS} FROM user_progress WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.0)
        .await?;

        match record {
            Some(record) => Ok(UserProgress::try_from(record)?),
            None => Ok(UserProgress::new(user_id as u32)),
        }
    }

    #[instrument(skip(self))]
    pub async fn get_all_progress(&self) -> anyhow::Result<Vec<LeaderboardRecord>> {
        Ok(sqlx::query_as::<_, LeaderboardRecord>(
            r#"
            SELECT u.login, u.full_name, p.user_id, p.total_commits, p.active_days,
                   p.current_streak, p.longest_streak, p.level, p.experience, p.badges,
                   p.last_active_day, p.active_dates
            FROM user_progress p
            JOIN users u ON u.id = p.user_id
            ORDER BY u.id
            "#,
        )
        .fetch_all(&self.0)
        .await?)
    }

    /// Scores a commit batch for the user.
    ///
    /// The user's progress row stays locked for the whole transaction, so concurrent batches for
    /// the same user are applied one after another. When `repository_id` is given, commits that
    /// were already stored for that repository are dropped from the batch before scoring.
    #[instrument(skip(self, commits, config), fields(commits = commits.len()))]
    pub async fn ingest_commits(
        &self,
        user_id: i32,
        repository_id: Option<i32>,
        commits: &[Commit],
        config: &ScoringConfig,
    ) -> anyhow::Result<ProgressUpdate> {
        let mut tx = self.0.begin().await?;

        let fresh = match repository_id {
            Some(repository_id) => Self::store_new_commits(&mut tx, repository_id, commits).await?,
            None => commits.to_vec(),
        };

        sqlx::query("INSERT INTO user_progress (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        let record = sqlx::query_as::<_, ProgressRecord>(&format!(
            "SELECT {PROGRESS_COLUMNS} FROM user_progress WHERE user_id = $1 FOR UPDATE"
        ))
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        let progress = UserProgress::try_from(record)?;
        let update = progress.apply_commits(&fresh, config)?;

        Self::store_progress(&mut tx, &update.progress).await?;
        for stat in &update.weekly {
            Self::add_weekly_stat(&mut tx, stat).await?;
        }

        tx.commit().await?;
        Ok(update)
    }

    async fn store_new_commits(
        tx: &mut Transaction<'static, Postgres>,
        repository_id: i32,
        commits: &[Commit],
    ) -> anyhow::Result<Vec<Commit>> {
        let mut fresh = Vec::with_capacity(commits.len());
        for commit in commits {
            let inserted = sqlx::query(
                r#"
                INSERT INTO commits (repository_id, sha, author, committed_at, message)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (repository_id, sha) DO NOTHING
                "#,
            )
            .bind(repository_id)
            .bind(&commit.sha)
            .bind(&commit.author)
            .bind(commit.timestamp)
            .bind(&commit.message)
            .execute(&mut **tx)
            .await?
            .rows_affected();

            if inserted > 0 {
                fresh.push(commit.clone());
            }
        }
        Ok(fresh)
    }

    async fn store_progress(
        tx: &mut Transaction<'static, Postgres>,
        progress: &UserProgress,
    ) -> anyhow::Result<()> {
        let record = ProgressRecord::try_from(progress)?;
        sqlx::query(
            r#"
            UPDATE user_progress
            SET total_commits = $2,
                active_days = $3,
                current_streak = $4,
                longest_streak = $5,
                level = $6,
                experience = $7,
                badges = $8,
                last_active_day = $9,
                active_dates = $10,
                updated_at = now()
            WHERE user_id = $1
            "#,
        )
        .bind(record.user_id)
        .bind(record.total_commits)
        .bind(record.active_days)
        .bind(record.current_streak)
        .bind(record.longest_streak)
        .bind(record.level)
        .bind(record.experience)
        .bind(&record.badges)
        .bind(record.last_active_day)
        .bind(&record.active_dates)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn add_weekly_stat(
        tx: &mut Transaction<'static, Postgres>,
        stat: &WeeklyStat,
    ) -> anyhow::Result<()> {
        let record = WeeklyStatRecord::try_from(stat)?;
        sqlx::query(
            r#"
            INSERT INTO weekly_stats (user_id, week, commit_count, streak_days)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, week) DO UPDATE
            SET commit_count = weekly_stats.commit_count + EXCLUDED.commit_count,
                streak_days = weekly_stats.streak_days + EXCLUDED.streak_days
            "#,
        )
        .bind(record.user_id)
        .bind(&record.week)
        .bind(record.commit_count)
        .bind(record.streak_days)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Administrative reset: progress goes back to its initial state and weekly rows are dropped.
    #[instrument(skip(self))]
    pub async fn reset_progress(&self, user_id: i32) -> anyhow::Result<UserProgress> {
        let mut tx = self.0.begin().await?;

        sqlx::query("INSERT INTO user_progress (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        let record = sqlx::query_as::<_, ProgressRecord>(&format!(
            "SELECT {PROGRESS_COLUMNS} FROM user_progress WHERE user_id = $1 FOR UPDATE"
        ))
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        // Corrupted rows are reset too
        let mut progress = UserProgress::try_from(record).unwrap_or_else(|_| UserProgress::new(user_id as u32));
        progress.reset();

        Self::store_progress(&mut tx, &progress).await?;
        sqlx::query("DELETE FROM weekly_stats WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(progress)
    }

    #[instrument(skip(self))]
    pub async fn get_weekly_stats(&self, user_id: i32, limit: i64) -> anyhow::Result<Vec<WeeklyStatRecord>> {
        Ok(sqlx::query_as::<_, WeeklyStatRecord>(
            r#"
            SELECT user_id, week, commit_count, streak_days
            FROM weekly_stats
            WHERE user_id = $1
            ORDER BY week DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.0)
        .await?)
    }

    #[instrument(skip(self))]
    pub async fn get_weekly_leaders(&self, week: &str) -> anyhow::Result<Vec<WeeklyLeaderRecord>> {
        Ok(sqlx::query_as::<_, WeeklyLeaderRecord>(
            r#"
            SELECT u.login, w.commit_count, w.streak_days
            FROM weekly_stats w
            JOIN users u ON u.id = w.user_id
            WHERE w.week = $1
            ORDER BY w.commit_count DESC, w.streak_days DESC, u.login
            "#,
        )
        .bind(week)
        .fetch_all(&self.0)
        .await?)
    }

    #[instrument(skip(self))]
    pub async fn add_repository(&self, user_id: i32, repo: &RepoInfo) -> anyhow::Result<RepositoryRecord> {
        Ok(sqlx::query_as::<_, RepositoryRecord>(&format!(
            r#"
            INSERT INTO repositories AS r (user_id, owner, name, full_name)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, full_name) DO UPDATE
            SET owner = EXCLUDED.owner
            RETURNING {REPOSITORY_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(&repo.owner)
        .bind(&repo.repo)
        .bind(&repo.full_name)
        .fetch_one(&self.0)
        .await?)
    }

    #[instrument(skip(self))]
    pub async fn get_repositories(&self, user_id: i32) -> anyhow::Result<Vec<RepositoryRecord>> {
        Ok(sqlx::query_as::<_, RepositoryRecord>(&format!(
            "SELECT {REPOSITORY_COLUMNS} FROM repositories r WHERE r.user_id = $1 ORDER BY r.full_name"
        ))
        .bind(user_id)
        .fetch_all(&self.0)
        .await?)
    }

    #[instrument(skip(self))]
    pub async fn get_tracked_repository(
        &self,
        user_id: i32,
        full_name: &str,
    ) -> anyhow::Result<Option<TrackedRepositoryRecord>> {
        Ok(sqlx::query_as::<_, TrackedRepositoryRecord>(&format!(
            r#"
            SELECT {REPOSITORY_COLUMNS}, u.login, u.telegram_chat_id, u.vacation_start, u.vacation_end
            FROM repositories r
            JOIN users u ON u.id = r.user_id
            WHERE r.user_id = $1 AND lower(r.full_name) = lower($2)
            "#
        ))
        .bind(user_id)
        .bind(full_name)
        .fetch_optional(&self.0)
        .await?)
    }

    #[instrument(skip(self))]
    pub async fn get_tracked_repositories(&self) -> anyhow::Result<Vec<TrackedRepositoryRecord>> {
        Ok(sqlx::query_as::<_, TrackedRepositoryRecord>(&format!(
            r#"
            SELECT {REPOSITORY_COLUMNS}, u.login, u.telegram_chat_id, u.vacation_start, u.vacation_end
            FROM repositories r
            JOIN users u ON u.id = r.user_id
            ORDER BY r.last_checked_at NULLS FIRST, r.id
            "#
        ))
        .fetch_all(&self.0)
        .await?)
    }

    #[instrument(skip(self))]
    pub async fn delete_repository(&self, user_id: i32, full_name: &str) -> anyhow::Result<bool> {
        let deleted = sqlx::query("DELETE FROM repositories WHERE user_id = $1 AND lower(full_name) = lower($2)")
            .bind(user_id)
            .bind(full_name)
            .execute(&self.0)
            .await?
            .rows_affected();
        Ok(deleted > 0)
    }

    #[instrument(skip(self, changes_summary))]
    pub async fn update_repository_activity(
        &self,
        repository_id: i32,
        last_commit_date: Option<DateTime<Utc>>,
        last_commit_sha: Option<&str>,
        status: &str,
        changes_summary: Option<&str>,
    ) -> anyhow::Result<RepositoryRecord> {
        Ok(sqlx::query_as::<_, RepositoryRecord>(&format!(
            r#"
            UPDATE repositories AS r
            SET last_commit_date = $2,
                last_commit_sha = $3,
                status = $4,
                changes_summary = COALESCE($5, r.changes_summary),
                last_checked_at = now()
            WHERE r.id = $1
            RETURNING {REPOSITORY_COLUMNS}
            "#
        ))
        .bind(repository_id)
        .bind(last_commit_date)
        .bind(last_commit_sha)
        .bind(status)
        .bind(changes_summary)
        .fetch_one(&self.0)
        .await?)
    }

    #[instrument(skip(self))]
    pub async fn statistics(&self) -> anyhow::Result<Statistics> {
        Ok(sqlx::query_as::<_, Statistics>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users) AS number_of_users,
                (SELECT COUNT(*) FROM repositories) AS number_of_repos,
                (SELECT COUNT(*) FROM repositories WHERE status = 'active') AS active_repos,
                (SELECT COUNT(*) FROM repositories WHERE status = 'warning') AS warning_repos,
                (SELECT COUNT(*) FROM repositories WHERE status = 'inactive') AS inactive_repos,
                (SELECT COUNT(*) FROM repositories WHERE status = 'pending') AS pending_repos,
                (SELECT SUM(total_commits)::BIGINT FROM user_progress) AS total_commits,
                (SELECT SUM(experience)::BIGINT FROM user_progress) AS total_experience,
                top.login AS top_login,
                top.level AS top_level
            FROM (SELECT 1) AS one
            LEFT JOIN LATERAL (
                SELECT u.login, p.level
                FROM user_progress p
                JOIN users u ON u.id = p.user_id
                ORDER BY p.level DESC, p.experience DESC
                LIMIT 1
            ) AS top ON true
            "#,
        )
        .fetch_one(&self.0)
        .await?)
    }
}

async fn run_migrations(rocket: Rocket<Build>) -> fairing::Result {
    match DB::fetch(&rocket) {
        Some(db) => match sqlx::migrate!("./migrations").run(&**db).await {
            Ok(_) => Ok(rocket),
            Err(e) => {
                rocket::error!("Failed to initialize SQLx database: {}", e);
                Err(rocket)
            }
        },
        None => Err(rocket),
    }
}

pub fn stage() -> AdHoc {
    AdHoc::on_ignite("SQLx Stage", |rocket| async {
        rocket
            .attach(DB::init())
            .attach(AdHoc::try_on_ignite("SQLx Migrations", run_migrations))
    })
}
