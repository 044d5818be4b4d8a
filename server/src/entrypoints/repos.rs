use chrono::Utc;
use rocket::{serde::json::Json, State};
use shared::RepoInfo;
use vibe_community_server::{
    db::DB,
    error::{ApiError, ApiResult},
    github_pull::{check_repository, ActivityContext, GithubClient},
};

use super::{
    load_user,
    types::{AddRepositoryRequest, RepositoryResponse},
};

#[utoipa::path(context_path = "/api/users", responses(
    (status = 200, description = "Get tracked repositories of a member", body = [RepositoryResponse])
))]
#[get("/<login>/repos")]
async fn get_repositories(db: &State<DB>, login: &str) -> ApiResult<Vec<RepositoryResponse>> {
    let user = load_user(db, login).await?;
    let repositories = db.get_repositories(user.id).await?;
    Ok(Json(repositories.into_iter().map(Into::into).collect()))
}

#[utoipa::path(context_path = "/api/users", request_body = AddRepositoryRequest, responses(
    (status = 200, description = "Start tracking a repository, initial status is pending", body = RepositoryResponse),
    (status = 404, description = "Unknown member or repository")
))]
#[post("/<login>/repos", data = "<request>")]
async fn add_repository(
    db: &State<DB>,
    github: &State<std::sync::Arc<GithubClient>>,
    login: &str,
    request: Json<AddRepositoryRequest>,
) -> ApiResult<RepositoryResponse> {
    let repo = RepoInfo::parse(&request.full_name)?;
    let user = load_user(db, login).await?;
    if !github.repository_exists(&repo).await? {
        return Err(ApiError::not_found(format!("repository {}", repo.full_name)));
    }

    let repository = db.add_repository(user.id, &repo).await?;
    tracing::info!("{} started tracking {}", user.login, repo.full_name);
    Ok(Json(repository.into()))
}

#[utoipa::path(context_path = "/api/users", responses(
    (status = 200, description = "Stop tracking a repository"),
    (status = 404, description = "Repository is not tracked")
))]
#[delete("/<login>/repos/<owner>/<name>")]
async fn delete_repository(
    db: &State<DB>,
    login: &str,
    owner: &str,
    name: &str,
) -> Result<(), ApiError> {
    let repo = RepoInfo::new(owner, name)?;
    let user = load_user(db, login).await?;
    if !db.delete_repository(user.id, &repo.full_name).await? {
        return Err(ApiError::not_found(format!("repository {}", repo.full_name)));
    }
    tracing::info!("{} stopped tracking {}", user.login, repo.full_name);
    Ok(())
}

#[utoipa::path(context_path = "/api/users", responses(
    (status = 200, description = "Poll the repository now and return its new status", body = RepositoryResponse)
))]
#[post("/<login>/repos/<owner>/<name>/check")]
async fn check_now(
    context: ActivityContext,
    login: &str,
    owner: &str,
    name: &str,
) -> ApiResult<RepositoryResponse> {
    let repo = RepoInfo::new(owner, name)?;
    let user = load_user(&context.db, login).await?;
    let tracked = context
        .db
        .get_tracked_repository(user.id, &repo.full_name)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("repository {}", repo.full_name)))?;

    let updated = check_repository(&context, &tracked, Utc::now()).await?;
    Ok(Json(updated.into()))
}

pub fn stage() -> rocket::fairing::AdHoc {
    rocket::fairing::AdHoc::on_ignite("Installing entrypoints", |rocket| async {
        rocket.mount(
            "/api/users",
            rocket::routes![get_repositories, add_repository, delete_repository, check_now],
        )
    })
}
