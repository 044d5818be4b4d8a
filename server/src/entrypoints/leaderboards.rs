use chrono::{NaiveDate, Utc};
use itertools::{Either, Itertools};
use rocket::{serde::json::Json, State};
use shared::{rank, LeaderboardMetric, RankedEntry, UserProgress};
use vibe_community_server::{
    db::{types::LeaderboardRecord, DB},
    error::ApiResult,
};

use super::types::{clamp_limit, page_offset, LeaderboardResponse, PaginatedResponse};

/// Loads every member's progress and ranks it. Rows that fail validation are left out.
pub async fn ranked_members(
    db: &DB,
    metric: LeaderboardMetric,
    today: NaiveDate,
) -> anyhow::Result<Vec<RankedEntry<LeaderboardRecord>>> {
    let (entries, corrupted): (Vec<_>, Vec<_>) =
        db.get_all_progress()
            .await?
            .into_iter()
            .partition_map(|record| match UserProgress::try_from(record.progress.clone()) {
                Ok(progress) => Either::Left((record, progress)),
                Err(e) => Either::Right((record.login, e)),
            });
    for (login, e) in corrupted {
        tracing::warn!("Skipping corrupted progress of {login}: {e}");
    }
    Ok(rank(entries, metric, today))
}

#[utoipa::path(context_path = "/leaderboard", responses(
    (status = 200, description = "Get user leaderboard", body = PaginatedLeaderboardResponse)
))]
#[get("/users?<metric>&<page>&<limit>")]
async fn get_leaderboard(
    db: &State<DB>,
    metric: Option<String>,
    page: Option<u64>,
    limit: Option<u64>,
) -> ApiResult<PaginatedResponse<LeaderboardResponse>> {
    let metric = match metric {
        Some(metric) => LeaderboardMetric::parse(&metric)?,
        None => LeaderboardMetric::default(),
    };
    let page = page.unwrap_or(0);
    let limit = clamp_limit(limit);
    let today = Utc::now().date_naive();

    let ranked = ranked_members(db, metric, today).await?;
    let total = ranked.len() as u64;
    let records = ranked
        .into_iter()
        .skip(page_offset(page, limit))
        .take(limit as usize)
        .map(|entry| LeaderboardResponse::new(entry.place, entry.user, &entry.progress, today))
        .collect();

    Ok(Json(PaginatedResponse::new(records, page.saturating_add(1), limit, total)))
}

pub fn stage() -> rocket::fairing::AdHoc {
    rocket::fairing::AdHoc::on_ignite("Installing entrypoints", |rocket| async {
        rocket.mount("/leaderboard", rocket::routes![get_leaderboard])
    })
}
