use chrono::{DateTime, NaiveDate, Utc};
use strum::{Display, EnumString};

use super::*;

pub const DEFAULT_ACTIVE_DAYS: u32 = 3;
pub const DEFAULT_WARNING_DAYS: u32 = 7;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ActivityStatus {
    Active,
    Warning,
    Inactive,
    #[default]
    Pending,
}

impl ActivityStatus {
    /// The repository hasn't seen a commit recently enough to count as active.
    pub const fn is_quiet(&self) -> bool {
        matches!(self, Self::Warning | Self::Inactive)
    }

    const fn severity(&self) -> u8 {
        match self {
            Self::Pending | Self::Active => 0,
            Self::Warning => 1,
            Self::Inactive => 2,
        }
    }

    /// A status change deserves an alert only when it gets worse and ends up quiet.
    pub const fn needs_notification(previous: ActivityStatus, current: ActivityStatus) -> bool {
        current.is_quiet() && current.severity() > previous.severity()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityThresholds {
    pub active_days: u32,
    pub warning_days: u32,
}

impl Default for ActivityThresholds {
    fn default() -> Self {
        Self {
            active_days: DEFAULT_ACTIVE_DAYS,
            warning_days: DEFAULT_WARNING_DAYS,
        }
    }
}

impl ActivityThresholds {
    pub fn new(active_days: u32, warning_days: u32) -> Result<Self> {
        if active_days == 0 {
            return Err(Error::invalid("active threshold must be at least one day"));
        }
        if warning_days < active_days {
            return Err(Error::invalid(format!(
                "warning threshold ({warning_days}) must not be shorter than active threshold ({active_days})"
            )));
        }

        Ok(Self {
            active_days,
            warning_days,
        })
    }

    pub fn classify(
        &self,
        last_commit: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> ActivityStatus {
        let Some(last_commit) = last_commit else {
            return ActivityStatus::Pending;
        };

        // Commits stamped in the future count as fresh
        let days = (now - last_commit).num_days().max(0) as u64;
        if days <= self.active_days as u64 {
            ActivityStatus::Active
        } else if days <= self.warning_days as u64 {
            ActivityStatus::Warning
        } else {
            ActivityStatus::Inactive
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vacation {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Vacation {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end < start {
            return Err(Error::invalid(format!(
                "vacation end {end} precedes its start {start}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn from_bounds(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Option<Self> {
        match (start, end) {
            (Some(start), Some(end)) if start <= end => Some(Self { start, end }),
            _ => None,
        }
    }

    pub fn covers(&self, now: DateTime<Utc>) -> bool {
        let today = now.date_naive();
        self.start <= today && today <= self.end
    }
}
