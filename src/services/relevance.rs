// src/services/relevance.rs

//! Relevance classifier backed by the Anthropic Messages API.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::RelevanceConfig;
use crate::services::{Candidate, RelevanceClassifier};

/// Environment variable holding the API key.
pub const API_KEY_VAR: &str = "ANTHROPIC_API_KEY";

const API_VERSION: &str = "2023-06-01";

/// Asks a language model which candidates in a batch are on-topic.
pub struct AnthropicClassifier {
    client: Client,
    api_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    topic: String,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    text: String,
}

impl AnthropicClassifier {
    /// Create a classifier; a missing or blank key is a credential error.
    pub fn new(client: Client, config: &RelevanceConfig, api_key: Option<String>) -> Result<Self> {
        let api_key = api_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AppError::MissingCredential(API_KEY_VAR.to_string()))?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            topic: config.topic.clone(),
        })
    }

    /// Create a classifier with the key taken from `ANTHROPIC_API_KEY`.
    pub fn from_env(client: Client, config: &RelevanceConfig) -> Result<Self> {
        Self::new(client, config, std::env::var(API_KEY_VAR).ok())
    }
}

#[async_trait]
impl RelevanceClassifier for AnthropicClassifier {
    async fn classify(&self, batch: &[Candidate]) -> Result<String> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            messages: vec![Message {
                role: "user",
                content: build_prompt(&self.topic, batch),
            }],
        };

        let response: MessagesResponse = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response
            .content
            .into_iter()
            .next()
            .map(|c| c.text.trim().to_string())
            .ok_or_else(|| AppError::relevance("reply contained no content"))
    }
}

/// Build the classification prompt for one batch.
pub fn build_prompt(topic: &str, batch: &[Candidate]) -> String {
    let listing = batch
        .iter()
        .map(|c| {
            format!(
                "Index: {}\nTitle: {}\nDescription: {}\nSource: {}\n---",
                c.index, c.title, c.description, c.source
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are helping to curate a weekly research digest. Your task is to identify articles that are relevant to {topic} research, academia, and policy analysis.

INCLUDE articles that mention or discuss:
- New academic research, studies, or publications in {topic}
- Policy reports, white papers, or survey findings
- Academic conferences, symposiums, or scholarly events
- New books, journal articles, or academic publications
- Academic appointments, fellowships, grants, or scholarly achievements
- Educational initiatives or academic programs
- Think tank reports or scholarly commentary

EXCLUDE articles about:
- General news, politics, or current events without research or academic analysis
- Opinion pieces without research backing
- Community events or social activities
- Business, entertainment, sports, or lifestyle content

Here are the articles to evaluate:

{listing}

Respond with ONLY a JSON array containing the index numbers of articles that meet the criteria, for example: [0, 5, 12]

Do not include any other text in your response, just the JSON array.
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn candidates() -> Vec<Candidate> {
        vec![
            Candidate {
                index: 0,
                title: "New survey released".into(),
                description: "Findings on community demographics".into(),
                source: "Daily".into(),
            },
            Candidate {
                index: 1,
                title: "Match report".into(),
                description: String::new(),
                source: "Sports".into(),
            },
        ]
    }

    #[test]
    fn test_missing_key_is_credential_error() {
        let config = RelevanceConfig::default();
        let err = AnthropicClassifier::new(Client::new(), &config, None).err().unwrap();
        assert!(matches!(err, AppError::MissingCredential(ref var) if var == API_KEY_VAR));

        let blank = AnthropicClassifier::new(Client::new(), &config, Some("  ".into()));
        assert!(matches!(blank, Err(AppError::MissingCredential(_))));
    }

    #[test]
    fn test_prompt_lists_batch_relative_indices() {
        let prompt = build_prompt("Medieval History", &candidates());
        assert!(prompt.contains("relevant to Medieval History research"));
        assert!(prompt.contains("Index: 0\nTitle: New survey released"));
        assert!(
            prompt.contains("Index: 1\nTitle: Match report\nDescription: \nSource: Sports\n---")
        );
        assert!(prompt.contains("ONLY a JSON array"));
    }

    #[tokio::test]
    async fn test_classify_returns_reply_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-api-key", "test-key"))
            .and(header("anthropic-version", API_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [{"type": "text", "text": " [0] "}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config = RelevanceConfig {
            api_url: format!("{}/v1/messages", server.uri()),
            ..RelevanceConfig::default()
        };
        let classifier =
            AnthropicClassifier::new(Client::new(), &config, Some("test-key".into())).unwrap();

        assert_eq!(classifier.classify(&candidates()).await.unwrap(), "[0]");
    }

    #[tokio::test]
    async fn test_classify_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(529))
            .mount(&server)
            .await;

        let config = RelevanceConfig {
            api_url: server.uri(),
            ..RelevanceConfig::default()
        };
        let classifier =
            AnthropicClassifier::new(Client::new(), &config, Some("test-key".into())).unwrap();

        assert!(classifier.classify(&candidates()).await.is_err());
    }
}
