use rocket::{serde::json::Json, State};
use vibe_community_server::{db::DB, error::ApiResult};

use super::types::Statistics;

#[utoipa::path(context_path = "/info", responses(
    (status = 200, description = "Get community statistics", body = Statistics)
))]
#[get("/")]
async fn get_statistics(db: &State<DB>) -> ApiResult<Statistics> {
    Ok(Json(db.statistics().await?.into()))
}

pub fn stage() -> rocket::fairing::AdHoc {
    rocket::fairing::AdHoc::on_ignite("Installing entrypoints", |rocket| async {
        rocket.mount("/info", rocket::routes![get_statistics])
    })
}
