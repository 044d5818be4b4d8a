use std::sync::Arc;

use chrono::Utc;
use rocket::{
    http::Status,
    request::{FromRequest, Outcome},
    serde::json::Json,
    Request, State,
};
use shared::{validate_batch, CommitInput};
use vibe_community_server::{db::DB, error::ApiResult, settings::Settings};

use super::{
    load_user,
    types::{CommitBatchRequest, IngestResponse, ProgressResponse},
};

const ADMIN_HEADER: &str = "X-Admin-Token";

/// Requires the configured admin token in the `X-Admin-Token` header.
pub struct AdminToken;

fn tokens_match(given: &str, expected: &str) -> bool {
    given.len() == expected.len()
        && given
            .bytes()
            .zip(expected.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminToken {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let Some(settings) = req.rocket().state::<Arc<Settings>>() else {
            return Outcome::Error((Status::InternalServerError, ()));
        };
        match req.headers().get_one(ADMIN_HEADER) {
            Some(token) if tokens_match(token, &settings.admin_token) => {
                Outcome::Success(AdminToken)
            }
            _ => {
                tracing::warn!("Rejected admin request to {}", req.uri());
                Outcome::Error((Status::Unauthorized, ()))
            }
        }
    }
}

#[utoipa::path(context_path = "/admin", request_body = CommitBatchRequest, responses(
    (status = 200, description = "Score a commit batch for the member", body = IngestResponse),
    (status = 400, description = "Malformed commit in the batch"),
    (status = 401, description = "Missing or wrong admin token")
))]
#[post("/users/<login>/commits", data = "<request>")]
async fn ingest_commits(
    _admin: AdminToken,
    db: &State<DB>,
    settings: &State<Arc<Settings>>,
    login: &str,
    request: Json<CommitBatchRequest>,
) -> ApiResult<IngestResponse> {
    let commits = validate_batch(
        request
            .into_inner()
            .commits
            .into_iter()
            .map(CommitInput::from)
            .collect(),
    )?;
    let user = load_user(db, login).await?;
    let update = db
        .ingest_commits(user.id, None, &commits, &settings.scoring)
        .await?;
    tracing::info!(
        "Ingested {} commits for {}, new badges: {:?}",
        commits.len(),
        user.login,
        update.new_badges
    );
    Ok(Json(IngestResponse::new(&update, Utc::now().date_naive())))
}

#[utoipa::path(context_path = "/admin", responses(
    (status = 200, description = "Reset member progress", body = ProgressResponse),
    (status = 401, description = "Missing or wrong admin token")
))]
#[post("/users/<login>/reset")]
async fn reset_progress(
    _admin: AdminToken,
    db: &State<DB>,
    login: &str,
) -> ApiResult<ProgressResponse> {
    let user = load_user(db, login).await?;
    let progress = db.reset_progress(user.id).await?;
    tracing::warn!("Progress of {} was reset", user.login);
    Ok(Json(ProgressResponse::new(&progress, Utc::now().date_naive())))
}

pub fn stage() -> rocket::fairing::AdHoc {
    rocket::fairing::AdHoc::on_ignite("Installing entrypoints", |rocket| async {
        rocket.mount("/admin", rocket::routes![ingest_commits, reset_progress])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_comparison() {
        assert!(tokens_match("secret", "secret"));
        assert!(!tokens_match("secreT", "secret"));
        assert!(!tokens_match("secret-longer", "secret"));
        assert!(!tokens_match("", "secret"));
    }
}
