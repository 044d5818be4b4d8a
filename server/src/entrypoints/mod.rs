use rocket::{fairing::AdHoc, http::Status, serde::json::Json, Request};
use serde_json::{json, Value};
use utoipa::OpenApi;
use vibe_community_server::{
    db::{types::UserRecord, DB},
    error::ApiError,
};

pub mod admin;
pub mod leaderboards;
pub mod repos;
pub mod statistics;
pub mod telegram;
pub mod types;
pub mod users;

pub async fn load_user(db: &DB, login: &str) -> Result<UserRecord, ApiError> {
    db.get_user(login)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("user {login}")))
}

#[catch(default)]
fn default_catcher(status: Status, _req: &Request) -> Json<Value> {
    Json(json!({ "error": status.reason().unwrap_or("unknown error") }))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        users::register_user,
        users::get_user,
        users::set_vacation,
        users::clear_vacation,
        users::get_weekly_stats,
        repos::get_repositories,
        repos::add_repository,
        repos::delete_repository,
        repos::check_now,
        leaderboards::get_leaderboard,
        statistics::get_statistics,
        admin::ingest_commits,
        admin::reset_progress,
    ),
    components(schemas(
        types::GithubMeta,
        types::BadgeResponse,
        types::ProgressResponse,
        types::VacationResponse,
        types::UserProfile,
        types::RegisterRequest,
        types::VacationRequest,
        types::AddRepositoryRequest,
        types::RepositoryResponse,
        types::LeaderboardResponse,
        types::PaginatedLeaderboardResponse,
        types::WeeklyStatResponse,
        types::CommitRequest,
        types::CommitBatchRequest,
        types::IngestResponse,
        types::RepositoryStatusCount,
        types::TopMember,
        types::Statistics,
    ))
)]
pub struct ApiDoc;

pub fn stage() -> AdHoc {
    AdHoc::on_ignite("Installing entrypoints", |rocket| async {
        rocket
            .register("/", catchers![default_catcher])
            .attach(users::stage())
            .attach(repos::stage())
            .attach(leaderboards::stage())
            .attach(statistics::stage())
            .attach(telegram::stage())
            .attach(admin::stage())
    })
}
