use chrono::{DateTime, NaiveDate, Utc};

use super::*;

/// A commit observed on a tracked repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub sha: String,
    pub author: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub message: String,
}

impl Commit {
    pub fn day(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}

/// Commit as submitted from outside, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommitInput {
    pub sha: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub message: Option<String>,
}

impl TryFrom<CommitInput> for Commit {
    type Error = Error;

    fn try_from(input: CommitInput) -> Result<Self> {
        let sha = input.sha.trim().to_string();
        if sha.is_empty() {
            return Err(Error::invalid("commit sha must not be empty"));
        }
        let timestamp = input
            .timestamp
            .ok_or_else(|| Error::invalid(format!("commit {sha} has no timestamp")))?;

        Ok(Self {
            sha,
            author: input.author.unwrap_or_default(),
            timestamp,
            message: input.message.unwrap_or_default(),
        })
    }
}

pub fn validate_batch(batch: Vec<CommitInput>) -> Result<Vec<Commit>> {
    batch.into_iter().map(Commit::try_from).collect()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn rejects_missing_timestamp_and_sha() {
        let missing_time = CommitInput {
            sha: "abc".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            Commit::try_from(missing_time),
            Err(Error::InvalidArgument(_))
        ));

        let missing_sha = CommitInput {
            sha: "  ".to_string(),
            timestamp: Some(Utc::now()),
            ..Default::default()
        };
        assert!(Commit::try_from(missing_sha).is_err());
    }

    #[test]
    fn batch_fails_on_first_malformed_commit() {
        let timestamp = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let good = CommitInput {
            sha: "a1".to_string(),
            author: Some("octocat".to_string()),
            timestamp: Some(timestamp),
            message: None,
        };
        let commits = validate_batch(vec![good.clone()]).unwrap();
        assert_eq!(commits[0].author, "octocat");
        assert_eq!(commits[0].day(), timestamp.date_naive());

        let bad = CommitInput {
            timestamp: None,
            ..good.clone()
        };
        assert!(validate_batch(vec![good, bad]).is_err());
    }
}
