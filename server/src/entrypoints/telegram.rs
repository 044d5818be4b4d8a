use std::sync::Arc;

use chrono::Utc;
use rocket::{
    http::Status,
    request::{FromRequest, Outcome},
    serde::json::Json,
    Request, State,
};
use shared::telegram::{BotCommand, ChatId, TelegramSubscriber, Update};
use vibe_community_server::{
    db::DB,
    error::ApiError,
    notifications::{
        HELP_MESSAGE, LINKED_MESSAGE, NOT_LINKED_MESSAGE, UNKNOWN_USER_MESSAGE, UNLINKED_MESSAGE,
    },
    settings::Settings,
};

const SECRET_HEADER: &str = "X-Telegram-Bot-Api-Secret-Token";

/// Passes when no webhook secret is configured or the header matches it.
pub struct WebhookSecret;

#[rocket::async_trait]
impl<'r> FromRequest<'r> for WebhookSecret {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let Some(settings) = req.rocket().state::<Arc<Settings>>() else {
            return Outcome::Error((Status::InternalServerError, ()));
        };
        match &settings.telegram_webhook_secret {
            None => Outcome::Success(WebhookSecret),
            Some(secret) if req.headers().get_one(SECRET_HEADER) == Some(secret.as_str()) => {
                Outcome::Success(WebhookSecret)
            }
            Some(_) => Outcome::Error((Status::Unauthorized, ())),
        }
    }
}

async fn status_reply(db: &DB, chat_id: ChatId) -> anyhow::Result<String> {
    let Some(user) = db.get_user_by_chat(chat_id).await? else {
        return Ok(NOT_LINKED_MESSAGE.to_string());
    };
    let progress = db.get_progress(user.id).await?;
    let repositories = db.get_repositories(user.id).await?;

    let mut reply = format!(
        "📊 {}: level {} ({} XP), {} commits, streak {} (best {}), {} badges",
        user.login,
        progress.level,
        progress.experience,
        progress.total_commits,
        progress.effective_streak(Utc::now().date_naive()),
        progress.longest_streak,
        progress.badges.len(),
    );
    for repository in repositories {
        reply.push_str(&format!("\n• {}: {}", repository.full_name, repository.status()));
    }
    Ok(reply)
}

async fn handle_command(db: &DB, chat_id: ChatId, command: BotCommand) -> anyhow::Result<String> {
    Ok(match command {
        BotCommand::Link(login) => {
            if db.link_telegram_chat(&login, chat_id).await? {
                tracing::info!("Linked telegram chat for {login}");
                LINKED_MESSAGE.replace("{login}", &login)
            } else {
                UNKNOWN_USER_MESSAGE.replace("{login}", &login)
            }
        }
        BotCommand::Unlink => {
            if db.unlink_telegram_chat(chat_id).await? {
                UNLINKED_MESSAGE.to_string()
            } else {
                NOT_LINKED_MESSAGE.to_string()
            }
        }
        BotCommand::Status => status_reply(db, chat_id).await?,
        BotCommand::Unknown(_) => HELP_MESSAGE.to_string(),
    })
}

#[post("/webhook", data = "<update>")]
async fn webhook(
    _secret: WebhookSecret,
    db: &State<DB>,
    telegram: &State<Arc<TelegramSubscriber>>,
    update: Json<Update>,
) -> Result<(), ApiError> {
    // Plain chatter is ignored, Telegram only needs a 200
    let Some((chat_id, command)) = update.command() else {
        return Ok(());
    };
    let reply = handle_command(db, chat_id, command).await?;
    telegram.send_to_chat(chat_id, &reply);
    Ok(())
}

pub fn stage() -> rocket::fairing::AdHoc {
    rocket::fairing::AdHoc::on_ignite("Installing entrypoints", |rocket| async {
        rocket.mount("/telegram", rocket::routes![webhook])
    })
}
