use chrono::Utc;
use rocket::{serde::json::Json, State};
use shared::{LeaderboardMetric, Vacation};
use vibe_community_server::{
    db::{types::UserRecord, DB},
    error::ApiResult,
};

use super::{
    leaderboards::ranked_members,
    load_user,
    types::{
        clamp_limit, validate_login, RegisterRequest, UserProfile, VacationRequest,
        WeeklyStatResponse,
    },
};

async fn profile(db: &DB, user: UserRecord) -> anyhow::Result<UserProfile> {
    let progress = db.get_progress(user.id).await?;
    let now = Utc::now();
    let place = ranked_members(db, LeaderboardMetric::Level, now.date_naive())
        .await?
        .into_iter()
        .find(|entry| entry.user.progress.user_id == user.id)
        .map(|entry| entry.place);
    Ok(UserProfile::new(user, &progress, place, now))
}

#[utoipa::path(context_path = "/api/users", request_body = RegisterRequest, responses(
    (status = 200, description = "Register a community member", body = UserProfile)
))]
#[post("/", data = "<request>")]
async fn register_user(db: &State<DB>, request: Json<RegisterRequest>) -> ApiResult<UserProfile> {
    let request = request.into_inner();
    let login = validate_login(&request.login)?;
    let full_name = request
        .full_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty());

    let user = db.upsert_user(&login, full_name).await?;
    tracing::info!("Registered community member {}", user.login);
    Ok(Json(profile(db, user).await?))
}

#[utoipa::path(context_path = "/api/users", responses(
    (status = 200, description = "Get member profile with progress and badges", body = UserProfile),
    (status = 404, description = "Unknown member")
))]
#[get("/<login>")]
async fn get_user(db: &State<DB>, login: &str) -> ApiResult<UserProfile> {
    let user = load_user(db, login).await?;
    Ok(Json(profile(db, user).await?))
}

#[utoipa::path(context_path = "/api/users", request_body = VacationRequest, responses(
    (status = 200, description = "Pause alerts for the given days", body = UserProfile)
))]
#[put("/<login>/vacation", data = "<request>")]
async fn set_vacation(
    db: &State<DB>,
    login: &str,
    request: Json<VacationRequest>,
) -> ApiResult<UserProfile> {
    let vacation = Vacation::new(request.start, request.end)?;
    let user = load_user(db, login).await?;
    db.set_vacation(user.id, Some(vacation.start), Some(vacation.end))
        .await?;
    let user = load_user(db, login).await?;
    Ok(Json(profile(db, user).await?))
}

#[utoipa::path(context_path = "/api/users", responses(
    (status = 200, description = "Resume alerts", body = UserProfile)
))]
#[delete("/<login>/vacation")]
async fn clear_vacation(db: &State<DB>, login: &str) -> ApiResult<UserProfile> {
    let user = load_user(db, login).await?;
    db.set_vacation(user.id, None, None).await?;
    let user = load_user(db, login).await?;
    Ok(Json(profile(db, user).await?))
}

#[utoipa::path(context_path = "/api/users", responses(
    (status = 200, description = "Get weekly stats, latest week first", body = [WeeklyStatResponse])
))]
#[get("/<login>/weekly?<limit>")]
async fn get_weekly_stats(
    db: &State<DB>,
    login: &str,
    limit: Option<u64>,
) -> ApiResult<Vec<WeeklyStatResponse>> {
    let user = load_user(db, login).await?;
    let stats = db
        .get_weekly_stats(user.id, clamp_limit(limit) as i64)
        .await?;
    Ok(Json(stats.into_iter().map(Into::into).collect()))
}

pub fn stage() -> rocket::fairing::AdHoc {
    rocket::fairing::AdHoc::on_ignite("Installing entrypoints", |rocket| async {
        rocket.mount(
            "/api/users",
            rocket::routes![
                register_user,
                get_user,
                set_vacation,
                clear_vacation,
                get_weekly_stats
            ],
        )
    })
}
