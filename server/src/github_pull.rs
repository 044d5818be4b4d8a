use std::{
    sync::{atomic::AtomicBool, Arc},
    time::Duration,
};

use chrono::{DateTime, Utc};
use futures::{stream, StreamExt};
use octocrab::Octocrab;
use rocket::{
    fairing::AdHoc,
    http::Status,
    request::{FromRequest, Outcome},
    Request,
};
use rocket_db_pools::Database;
use serde::Serialize;
use shared::{github::GithubCommit, telegram::TelegramSubscriber, Commit, RepoInfo};
use tracing::{info, instrument, warn};

use crate::{
    db::{
        types::{RepositoryRecord, TrackedRepositoryRecord},
        DB,
    },
    health_monitor::HealthMonitor,
    notifications::{self, Recipient},
    settings::Settings,
    summary::Summarizer,
};

const PER_PAGE: usize = 100;
const MAX_PAGES: u32 = 10;
/// How far back the first check of a freshly linked repository looks.
pub const INITIAL_LOOKBACK_DAYS: i64 = 14;
pub const POLLER_TASK: &str = "commit-poller";
const CONCURRENT_CHECKS: usize = 4;

pub struct GithubClient {
    pub octocrab: Octocrab,
}

#[derive(Serialize)]
struct CommitsQuery {
    since: Option<String>,
    per_page: usize,
    page: u32,
}

fn is_status(error: &octocrab::Error, status: u16) -> bool {
    matches!(error, octocrab::Error::GitHub { source, .. } if source.status_code.as_u16() == status)
}

impl GithubClient {
    pub fn new(github_token: String) -> anyhow::Result<Self> {
        let octocrab = octocrab::Octocrab::builder()
            .personal_token(github_token)
            .build()?;
        Ok(Self { octocrab })
    }

    #[instrument(skip(self))]
    pub async fn repository_exists(&self, repo: &RepoInfo) -> anyhow::Result<bool> {
        match self.octocrab.repos(&repo.owner, &repo.repo).get().await {
            Ok(_) => Ok(true),
            Err(e) if is_status(&e, 404) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self))]
    pub async fn commits_since(
        &self,
        repo: &RepoInfo,
        since: Option<DateTime<Utc>>,
    ) -> anyhow::Result<Vec<Commit>> {
        let route = format!("/repos/{}/{}/commits", repo.owner, repo.repo);
        let mut commits = Vec::new();

        for page in 1..=MAX_PAGES {
            let query = CommitsQuery {
                since: since.map(|since| since.to_rfc3339()),
                per_page: PER_PAGE,
                page,
            };
            let batch: Vec<GithubCommit> = match self.octocrab.get(&route, Some(&query)).await {
                Ok(batch) => batch,
                // Empty repositories answer with 409 Conflict
                Err(e) if is_status(&e, 409) => break,
                Err(e) => return Err(e.into()),
            };
            let fetched = batch.len();

            for commit in batch {
                match Commit::try_from(commit) {
                    Ok(commit) => commits.push(commit),
                    Err(e) => warn!("Skipping commit in {}: {e}", repo.full_name),
                }
            }

            if fetched < PER_PAGE {
                break;
            }
        }

        Ok(commits)
    }
}

/// Everything a repository check needs, assembled from Rocket state.
#[derive(Clone)]
pub struct ActivityContext {
    pub db: DB,
    pub github: Arc<GithubClient>,
    pub summarizer: Arc<Summarizer>,
    pub telegram: Arc<TelegramSubscriber>,
    pub settings: Arc<Settings>,
}

impl ActivityContext {
    pub fn from_rocket<P: rocket::Phase>(rocket: &rocket::Rocket<P>) -> Option<Self> {
        Some(Self {
            db: DB::fetch(rocket)?.clone(),
            github: rocket.state::<Arc<GithubClient>>()?.clone(),
            summarizer: rocket.state::<Arc<Summarizer>>()?.clone(),
            telegram: rocket.state::<Arc<TelegramSubscriber>>()?.clone(),
            settings: rocket.state::<Arc<Settings>>()?.clone(),
        })
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ActivityContext {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match ActivityContext::from_rocket(req.rocket()) {
            Some(context) => Outcome::Success(context),
            None => Outcome::Error((Status::InternalServerError, ())),
        }
    }
}

fn recipient(tracked: &TrackedRepositoryRecord) -> Recipient {
    Recipient {
        login: tracked.login.clone(),
        chat_id: tracked.telegram_chat_id,
        vacation: tracked.vacation(),
    }
}

/// Pulls new commits of one repository, scores the owner's commits, reclassifies the repository
/// and sends the alerts that became due.
#[instrument(skip(context, tracked), fields(repo = %tracked.repository.full_name))]
pub async fn check_repository(
    context: &ActivityContext,
    tracked: &TrackedRepositoryRecord,
    now: DateTime<Utc>,
) -> anyhow::Result<RepositoryRecord> {
    let repository = &tracked.repository;
    let repo = repository.repo_info()?;
    let since = repository
        .last_commit_date
        .unwrap_or(repository.created_at - chrono::Duration::days(INITIAL_LOOKBACK_DAYS));

    let commits = context.github.commits_since(&repo, Some(since)).await?;

    let (last_commit_date, last_commit_sha) = match commits.iter().max_by_key(|c| c.timestamp) {
        Some(latest)
            if repository
                .last_commit_date
                .map_or(true, |known| latest.timestamp >= known) =>
        {
            (Some(latest.timestamp), Some(latest.sha.clone()))
        }
        _ => (repository.last_commit_date, repository.last_commit_sha.clone()),
    };

    let own_commits: Vec<Commit> = commits
        .iter()
        .filter(|commit| commit.author.eq_ignore_ascii_case(&tracked.login))
        .cloned()
        .collect();
    let update = context
        .db
        .ingest_commits(
            repository.user_id,
            Some(repository.id),
            &own_commits,
            &context.settings.scoring,
        )
        .await?;

    let recipient = recipient(tracked);
    if !update.new_badges.is_empty() {
        info!("{} unlocked {:?}", tracked.login, update.new_badges);
        notifications::notify_badges(&context.telegram, &recipient, &update.new_badges, now);
    }

    let summary = if last_commit_sha != repository.last_commit_sha {
        let messages: Vec<String> = commits
            .iter()
            .filter(|c| Some(&c.sha) != repository.last_commit_sha.as_ref())
            .map(|c| c.message.clone())
            .collect();
        match context.summarizer.summarize(&repo, &messages).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!("Failed to summarize commits of {}: {e:#}", repo.full_name);
                None
            }
        }
    } else {
        None
    };

    let previous = repository.status();
    let status = context.settings.thresholds.classify(last_commit_date, now);
    let updated = context
        .db
        .update_repository_activity(
            repository.id,
            last_commit_date,
            last_commit_sha.as_deref(),
            &status.to_string(),
            summary.as_deref(),
        )
        .await?;

    notifications::notify_status_change(
        &context.telegram,
        &recipient,
        &repository.full_name,
        previous,
        status,
        last_commit_date,
        now,
    );

    Ok(updated)
}

#[instrument(skip(context))]
async fn check_all_repositories(context: &ActivityContext) -> anyhow::Result<()> {
    let repositories = context.db.get_tracked_repositories().await?;
    let total = repositories.len();
    let now = Utc::now();

    let failed = stream::iter(&repositories)
        .map(|tracked| async move {
            check_repository(context, tracked, now)
                .await
                .map_err(|e| (tracked.repository.full_name.as_str(), e))
        })
        .buffer_unordered(CONCURRENT_CHECKS)
        .boxed()
        .filter_map(|result| async move { result.err() })
        .fold(0, |failed, (full_name, e)| async move {
            warn!("Failed to check repository {}: {:#}", full_name, e);
            failed + 1
        })
        .await;

    info!("Checked {} repositories, {} failed", total, failed);
    Ok(())
}

pub fn stage(
    github_client: GithubClient,
    sleep_duration: Duration,
    atomic_bool: Arc<AtomicBool>,
) -> AdHoc {
    AdHoc::on_ignite("GitHub commit pull", move |rocket| async move {
        rocket
            .manage(Arc::new(github_client))
            .attach(AdHoc::on_liftoff(
                "Checks tracked repositories every X minutes",
                move |rocket| {
                    Box::pin(async move {
                        let context = ActivityContext::from_rocket(rocket)
                            .expect("Failed to build activity context");
                        let health: Option<Arc<HealthMonitor>> = rocket.state().cloned();
                        rocket::tokio::spawn(async move {
                            let mut interval: rocket::tokio::time::Interval =
                                rocket::tokio::time::interval(sleep_duration);
                            while atomic_bool.load(std::sync::atomic::Ordering::Relaxed) {
                                interval.tick().await;

                                if let Err(e) = check_all_repositories(&context).await {
                                    tracing::error!("Failed to check repositories: {:#?}", e);
                                }
                                if let Some(health) = &health {
                                    health.im_alive(POLLER_TASK);
                                }
                            }
                        });
                    })
                },
            ))
    })
}
