pub mod db;
pub mod error;
pub mod github_pull;
pub mod health_monitor;
pub mod notifications;
pub mod settings;
pub mod summary;
pub mod weekly_stats;
