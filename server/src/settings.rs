use std::time::Duration;

use serde::Deserialize;
use shared::{ActivityThresholds, ScoringConfig, DEFAULT_POINTS_PER_COMMIT};

const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";

#[derive(Debug, Clone, Deserialize)]
pub struct Env {
    pub github_token: String,
    pub admin_token: String,
    pub telegram_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub telegram_webhook_secret: Option<String>,
    pub gemini_api_key: Option<String>,
    pub gemini_model: Option<String>,
    pub sleep_duration_in_minutes: Option<u32>,
    pub weekly_stats_interval_in_hours: Option<u32>,
    pub active_threshold_days: Option<u32>,
    pub warning_threshold_days: Option<u32>,
    pub points_per_commit: Option<u32>,
}

impl Env {
    pub fn settings(&self) -> shared::Result<Settings> {
        let defaults = ActivityThresholds::default();
        let thresholds = ActivityThresholds::new(
            self.active_threshold_days.unwrap_or(defaults.active_days),
            self.warning_threshold_days.unwrap_or(defaults.warning_days),
        )?;
        if self.admin_token.trim().is_empty() {
            return Err(shared::Error::invalid("ADMIN_TOKEN must not be empty"));
        }

        Ok(Settings {
            thresholds,
            scoring: ScoringConfig {
                points_per_commit: self.points_per_commit.unwrap_or(DEFAULT_POINTS_PER_COMMIT),
            },
            admin_token: self.admin_token.clone(),
            telegram_webhook_secret: self
                .telegram_webhook_secret
                .clone()
                .filter(|secret| !secret.trim().is_empty()),
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.sleep_duration_in_minutes.unwrap_or(10).max(1) as u64 * 60)
    }

    pub fn weekly_stats_interval(&self) -> Duration {
        Duration::from_secs(self.weekly_stats_interval_in_hours.unwrap_or(7 * 24).max(1) as u64 * 3600)
    }

    pub fn gemini_model(&self) -> String {
        self.gemini_model
            .clone()
            .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string())
    }
}

/// Runtime configuration shared with handlers and background jobs.
#[derive(Debug, Clone)]
pub struct Settings {
    pub thresholds: ActivityThresholds,
    pub scoring: ScoringConfig,
    pub admin_token: String,
    pub telegram_webhook_secret: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> Env {
        Env {
            github_token: "token".to_string(),
            admin_token: "secret".to_string(),
            telegram_token: None,
            telegram_chat_id: None,
            telegram_webhook_secret: None,
            gemini_api_key: None,
            gemini_model: None,
            sleep_duration_in_minutes: None,
            weekly_stats_interval_in_hours: None,
            active_threshold_days: None,
            warning_threshold_days: None,
            points_per_commit: None,
        }
    }

    #[test]
    fn defaults() {
        let env = env();
        let settings = env.settings().unwrap();
        assert_eq!(settings.thresholds, ActivityThresholds::default());
        assert_eq!(settings.scoring.points_per_commit, 10);
        assert_eq!(env.poll_interval(), Duration::from_secs(600));
        assert_eq!(env.gemini_model(), "gemini-1.5-flash");
    }

    #[test]
    fn rejects_inverted_thresholds() {
        let env = Env {
            active_threshold_days: Some(10),
            warning_threshold_days: Some(5),
            ..env()
        };
        assert!(env.settings().is_err());
    }

    #[test]
    fn rejects_blank_admin_token() {
        let env = Env {
            admin_token: "  ".to_string(),
            ..env()
        };
        assert!(env.settings().is_err());
    }

    #[test]
    fn blank_webhook_secret_is_ignored() {
        let env = Env {
            telegram_webhook_secret: Some(String::new()),
            ..env()
        };
        assert_eq!(env.settings().unwrap().telegram_webhook_secret, None);
    }
}
