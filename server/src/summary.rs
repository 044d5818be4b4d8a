use serde::{Deserialize, Serialize};
use shared::RepoInfo;
use tracing::instrument;

const MAX_MESSAGES: usize = 30;
const MAX_MESSAGE_LENGTH: usize = 300;

/// Writes short human summaries of new commits with Gemini.
pub struct Summarizer {
    client: reqwest::Client,
    api_key: Option<String>,
    model: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

pub fn build_prompt(repo: &RepoInfo, messages: &[String]) -> String {
    let mut prompt = format!(
        "Summarize the following recent commits of the GitHub repository {} in two or three \
         short sentences for a developer community dashboard. Mention the main areas of work \
         and do not list commit hashes.\n\nCommits:\n",
        repo.full_name
    );
    for message in messages.iter().take(MAX_MESSAGES) {
        let first_line = message.lines().next().unwrap_or_default().trim();
        if first_line.is_empty() {
            continue;
        }
        let line: String = first_line.chars().take(MAX_MESSAGE_LENGTH).collect();
        prompt.push_str("- ");
        prompt.push_str(&line);
        prompt.push('\n');
    }
    prompt
}

impl Summarizer {
    pub fn new(api_key: Option<String>, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            model,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    /// `Ok(None)` when no API key is configured or there is nothing to summarize.
    #[instrument(skip(self, messages), fields(messages = messages.len()))]
    pub async fn summarize(&self, repo: &RepoInfo, messages: &[String]) -> anyhow::Result<Option<String>> {
        let Some(api_key) = &self.api_key else {
            return Ok(None);
        };
        if messages.is_empty() {
            return Ok(None);
        }

        let prompt = build_prompt(repo, messages);
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
            self.model
        );
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: &prompt }],
            }],
        };

        let response: GenerateResponse = self
            .client
            .post(&url)
            .query(&[("key", api_key.as_str())])
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let text = response
            .candidates
            .into_iter()
            .filter_map(|candidate| candidate.content)
            .flat_map(|content| content.parts)
            .filter_map(|part| part.text)
            .collect::<Vec<_>>()
            .join("")
            .trim()
            .to_string();

        Ok((!text.is_empty()).then_some(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_uses_first_lines_only() {
        let repo = RepoInfo::new("octocat", "hello-world").unwrap();
        let messages = vec![
            "Add login page\n\nLong description".to_string(),
            "   ".to_string(),
            "Fix typo".to_string(),
        ];
        let prompt = build_prompt(&repo, &messages);
        assert!(prompt.contains("octocat/hello-world"));
        assert!(prompt.contains("- Add login page\n"));
        assert!(prompt.contains("- Fix typo\n"));
        assert!(!prompt.contains("Long description"));
        assert_eq!(prompt.matches("\n- ").count(), 2);
    }

    #[tokio::test]
    async fn disabled_without_key() {
        let summarizer = Summarizer::new(Some(" ".to_string()), "gemini-1.5-flash".to_string());
        assert!(!summarizer.is_enabled());
        let repo = RepoInfo::new("octocat", "hello-world").unwrap();
        let summary = summarizer
            .summarize(&repo, &["Add feature".to_string()])
            .await
            .unwrap();
        assert_eq!(summary, None);
    }

    #[test]
    fn reads_generate_response() {
        let json = r#"{"candidates":[{"content":{"parts":[{"text":"Work on auth."}],"role":"model"}}]}"#;
        let response: GenerateResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            response.candidates[0].content.as_ref().unwrap().parts[0].text.as_deref(),
            Some("Work on auth.")
        );
    }
}
