use chrono::{DateTime, Utc};
use shared::{find_badge, telegram::TelegramSubscriber, ActivityStatus, Vacation};
use tracing::{debug, info};

pub const WARNING_MESSAGE: &str = "⚠️ Heads up! {repo} has been quiet for {days} days. A small commit keeps your streak alive. 🔥";
pub const INACTIVE_MESSAGE: &str = "😴 {repo} has had no commits for {days} days and is now marked inactive. We miss your vibes! 🎧";
pub const BADGE_MESSAGE: &str = "🏅 New badge unlocked: {badge}! Keep shipping. 🚀";
pub const LINKED_MESSAGE: &str = "✅ This chat now receives activity alerts for {login}. Send /stop to unsubscribe.";
pub const UNLINKED_MESSAGE: &str = "👋 Alerts are turned off for this chat.";
pub const UNKNOWN_USER_MESSAGE: &str = "❓ There is no community member called {login}. Register on the dashboard first.";
pub const NOT_LINKED_MESSAGE: &str = "ℹ️ This chat is not linked yet. Send /start <github login> to subscribe.";
pub const HELP_MESSAGE: &str = "🤖 Commands: /start <github login> to subscribe, /status to see your progress, /stop to unsubscribe.";

/// Recipient of activity alerts.
#[derive(Debug, Clone)]
pub struct Recipient {
    pub login: String,
    pub chat_id: Option<i64>,
    pub vacation: Option<Vacation>,
}

impl Recipient {
    fn reachable(&self, now: DateTime<Utc>) -> Option<i64> {
        let chat_id = self.chat_id?;
        if self.vacation.is_some_and(|vacation| vacation.covers(now)) {
            debug!("{} is on vacation, skipping alert", self.login);
            return None;
        }
        Some(chat_id)
    }
}

pub fn status_message(
    repo: &str,
    status: ActivityStatus,
    last_commit: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<String> {
    let template = match status {
        ActivityStatus::Warning => WARNING_MESSAGE,
        ActivityStatus::Inactive => INACTIVE_MESSAGE,
        ActivityStatus::Active | ActivityStatus::Pending => return None,
    };
    let days = last_commit
        .map(|last| (now - last).num_days().max(0))
        .unwrap_or_default();

    Some(
        template
            .replace("{repo}", repo)
            .replace("{days}", &days.to_string()),
    )
}

/// Sends an alert when the repository status got worse. Returns whether a message was queued.
pub fn notify_status_change(
    telegram: &TelegramSubscriber,
    recipient: &Recipient,
    repo: &str,
    previous: ActivityStatus,
    current: ActivityStatus,
    last_commit: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    if !ActivityStatus::needs_notification(previous, current) {
        return false;
    }
    let Some(chat_id) = recipient.reachable(now) else {
        return false;
    };
    let Some(message) = status_message(repo, current, last_commit, now) else {
        return false;
    };

    info!("Notifying {} about {repo}: {previous} -> {current}", recipient.login);
    telegram.send_to_chat(chat_id, &message);
    true
}

pub fn notify_badges(telegram: &TelegramSubscriber, recipient: &Recipient, badges: &[String], now: DateTime<Utc>) {
    let Some(chat_id) = recipient.reachable(now) else {
        return;
    };
    for badge in badges {
        let title = find_badge(badge).map(|b| b.title).unwrap_or(badge.as_str());
        telegram.send_to_chat(chat_id, &BADGE_MESSAGE.replace("{badge}", title));
    }
}
