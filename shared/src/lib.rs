use serde::{Deserialize, Serialize};

mod activity;
mod badge;
mod commit;
mod error;
mod leaderboard;
mod progress;
mod streak;
mod timeperiod;

#[cfg(feature = "github")]
pub mod github;

#[cfg(feature = "client")]
pub mod telegram;

#[cfg(test)]
mod tests;

pub use activity::*;
pub use badge::*;
pub use commit::*;
pub use error::*;
pub use leaderboard::*;
pub use progress::*;
pub use streak::*;
pub use timeperiod::*;

#[cfg(feature = "github")]
pub use github::RepoInfo;

pub type GithubHandle = String;
