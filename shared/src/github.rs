use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Commit, Error};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoInfo {
    pub owner: String,
    pub repo: String,
    pub full_name: String,
}

impl RepoInfo {
    pub fn new(owner: &str, repo: &str) -> crate::Result<Self> {
        let valid = |part: &str| {
            !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        };
        if !valid(owner) || !valid(repo) {
            return Err(Error::invalid(format!(
                "invalid repository name: {owner}/{repo}"
            )));
        }

        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            full_name: format!("{owner}/{repo}"),
        })
    }

    /// Accepts `owner/repo` as well as a github.com URL.
    pub fn parse(value: &str) -> crate::Result<Self> {
        let trimmed = value
            .trim()
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_start_matches("github.com/")
            .trim_end_matches('/')
            .trim_end_matches(".git");
        let mut parts = trimmed.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(owner), Some(repo), None) => Self::new(owner, repo),
            _ => Err(Error::invalid(format!("invalid repository name: {value}"))),
        }
    }

    pub fn url(&self) -> String {
        format!("https://github.com/{}", self.full_name)
    }
}

/// Subset of the `GET /repos/{owner}/{repo}/commits` response item.
#[derive(Debug, Clone, Deserialize)]
pub struct GithubCommit {
    pub sha: String,
    pub commit: GithubCommitDetails,
    pub author: Option<GithubAccount>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubCommitDetails {
    pub message: String,
    pub author: Option<GithubSignature>,
    pub committer: Option<GithubSignature>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubSignature {
    pub name: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubAccount {
    pub login: String,
}

impl TryFrom<GithubCommit> for Commit {
    type Error = anyhow::Error;

    fn try_from(commit: GithubCommit) -> anyhow::Result<Self> {
        let date = commit
            .commit
            .author
            .as_ref()
            .and_then(|a| a.date)
            .or_else(|| commit.commit.committer.as_ref().and_then(|c| c.date));
        let Some(timestamp) = date else {
            return Err(anyhow::anyhow!("Commit {} has no date", commit.sha));
        };

        let author = commit
            .author
            .map(|a| a.login)
            .or_else(|| commit.commit.author.and_then(|a| a.name))
            .unwrap_or_default();

        Ok(Self {
            sha: commit.sha,
            author,
            timestamp,
            message: commit.commit.message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_repo_names() {
        let repo = RepoInfo::parse("https://github.com/rust-lang/rust.git").unwrap();
        assert_eq!(repo.owner, "rust-lang");
        assert_eq!(repo.repo, "rust");
        assert_eq!(repo.full_name, "rust-lang/rust");

        assert!(RepoInfo::parse("rust-lang").is_err());
        assert!(RepoInfo::parse("a/b/c").is_err());
        assert!(RepoInfo::parse("a/b c").is_err());
    }

    #[test]
    fn converts_github_commit_json() {
        let json = r#"{
            "sha": "6dcb09b5b57875f334f61aebed695e2e4193db5e",
            "commit": {
                "message": "Fix all the bugs",
                "author": { "name": "Monalisa Octocat", "date": "2011-04-14T16:00:49Z" },
                "committer": { "name": "Monalisa Octocat", "date": "2011-04-15T16:00:49Z" }
            },
            "author": { "login": "octocat" }
        }"#;
        let commit: GithubCommit = serde_json::from_str(json).unwrap();
        let commit = Commit::try_from(commit).unwrap();
        assert_eq!(commit.author, "octocat");
        assert_eq!(commit.message, "Fix all the bugs");
        assert_eq!(commit.timestamp.to_rfc3339(), "2011-04-14T16:00:49+00:00");
    }

    #[test]
    fn commit_without_date_is_rejected() {
        let json = r#"{ "sha": "abc", "commit": { "message": "x", "author": null, "committer": null }, "author": null }"#;
        let commit: GithubCommit = serde_json::from_str(json).unwrap();
        assert!(Commit::try_from(commit).is_err());
    }
}
