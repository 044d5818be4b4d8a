use std::{
    sync::{atomic::AtomicBool, Arc},
    time::Duration,
};

use chrono::Utc;
use num_format::{Locale, ToFormattedString};
use rocket::fairing::AdHoc;
use rocket_db_pools::Database;
use shared::{telegram::TelegramSubscriber, TimePeriod};
use tracing::{instrument, Level};

use crate::db::{types::WeeklyLeaderRecord, DB};

const TOP_USERS: usize = 10;

/// MarkdownV2 text for the admin chat. Sent at INFO level, where the sender escapes dashes only.
pub fn digest_message(week: &str, leaders: &[WeeklyLeaderRecord]) -> String {
    let total: i64 = leaders.iter().map(|l| l.commit_count as i64).sum();
    let mut message = format!(
        "Weekly stats for {week}: {} commits by {} members\n",
        total.to_formatted_string(&Locale::en),
        leaders.len()
    );
    for (place, leader) in leaders.iter().take(TOP_USERS).enumerate() {
        message.push_str(&format!(
            "{}\\. {}: {} commits, {} active days\n",
            place + 1,
            leader.login,
            (leader.commit_count as i64).to_formatted_string(&Locale::en),
            leader.streak_days
        ));
    }
    message
}

pub fn digest_csv(leaders: &[WeeklyLeaderRecord]) -> Vec<u8> {
    let mut csv = String::from("login,commit_count,streak_days\n");
    for leader in leaders {
        csv.push_str(&format!(
            "{},{},{}\n",
            leader.login, leader.commit_count, leader.streak_days
        ));
    }
    csv.into_bytes()
}

#[instrument(skip(db, telegram))]
async fn send_weekly_digest(db: &DB, telegram: &TelegramSubscriber) -> anyhow::Result<()> {
    let last_week = TimePeriod::Week
        .previous_period(Utc::now())
        .ok_or_else(|| anyhow::anyhow!("Failed to compute previous week"))?;
    let week = TimePeriod::Week.time_string(last_week);
    let leaders = db.get_weekly_leaders(&week).await?;

    telegram.send_to_telegram(&digest_message(&week, &leaders), &Level::INFO);
    if !leaders.is_empty() {
        telegram.send_csv_file_to_telegram(digest_csv(&leaders), format!("weekly-{week}.csv"));
    }

    Ok(())
}

pub fn stage(sleep_duration: Duration, atomic_bool: Arc<AtomicBool>) -> AdHoc {
    AdHoc::on_ignite("Weekly stats", move |rocket| async move {
        rocket.attach(AdHoc::on_liftoff(
            "Sends weekly statistics digest",
            move |rocket| {
                Box::pin(async move {
                    // Get an actual DB connection
                    let db = DB::fetch(rocket)
                        .expect("Failed to get DB connection")
                        .clone();
                    let telegram: Arc<TelegramSubscriber> = rocket
                        .state()
                        .cloned()
                        .expect("failed to get telegram client");
                    rocket::tokio::spawn(async move {
                        let mut interval: rocket::tokio::time::Interval =
                            rocket::tokio::time::interval(sleep_duration);
                        // The first tick fires immediately, skip it so restarts don't spam the chat
                        interval.tick().await;
                        while atomic_bool.load(std::sync::atomic::Ordering::Relaxed) {
                            interval.tick().await;
                            if let Err(e) = send_weekly_digest(&db, &telegram).await {
                                tracing::error!("Failed to send weekly stats: {:#?}", e);
                            }
                        }
                    });
                })
            },
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leader(login: &str, commit_count: i32, streak_days: i32) -> WeeklyLeaderRecord {
        WeeklyLeaderRecord {
            login: login.to_string(),
            commit_count,
            streak_days,
        }
    }

    #[test]
    fn digest_lists_leaders_in_order() {
        let leaders = vec![leader("alice", 1200, 6), leader("bob", 3, 1)];
        let message = digest_message("2024W10", &leaders);
        assert!(message.starts_with("Weekly stats for 2024W10: 1,203 commits by 2 members"));
        assert!(message.contains("1\\. alice: 1,200 commits, 6 active days\n"));
        assert!(message.contains("2\\. bob: 3 commits, 1 active days\n"));
    }

    #[test]
    fn csv_has_header_and_rows() {
        let csv = String::from_utf8(digest_csv(&[leader("alice", 4, 2)])).unwrap();
        assert_eq!(csv, "login,commit_count,streak_days\nalice,4,2\n");
    }
}
