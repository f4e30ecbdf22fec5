use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::SummarizerConfig;
use crate::error::SummarizeError;

/// The API key must never appear in a request URL.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Free-text analysis of an article's title and abstract.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, title: &str, summary: &str) -> Result<String, SummarizeError>;
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

/// Google Gemini `generateContent` client.
pub struct GeminiSummarizer {
    client: Client,
    api_key: Option<String>,
    endpoint: String,
    model: String,
}

impl GeminiSummarizer {
    pub fn new(config: &SummarizerConfig, api_key: Option<String>) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;
        Ok(Self {
            client,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    pub fn prompt(title: &str, summary: &str) -> String {
        format!(
            "You are a medical oncologist. Summarize the following paper abstract.\n\
             Title: {}\n\
             Abstract: {}\n\
             [Format]\n\
             1. Key summary (5 lines)\n\
             2. Clinical significance\n\
             3. Who should read it",
            title, summary
        )
    }
}

impl fmt::Debug for GeminiSummarizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiSummarizer")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish()
    }
}

#[async_trait]
impl Summarizer for GeminiSummarizer {
    async fn summarize(&self, title: &str, summary: &str) -> Result<String, SummarizeError> {
        let api_key = self.api_key.as_deref().ok_or(SummarizeError::MissingApiKey)?;

        let url = format!("{}/models/{}:generateContent", self.endpoint, self.model);
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: Self::prompt(title, summary),
                }],
            }],
        };

        debug!("Requesting analysis from {} for '{}'", self.model, title);
        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| SummarizeError::Request(e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SummarizeError::Status { status, body });
        }

        let reply: GenerateResponse = response
            .json()
            .await
            .map_err(|e| SummarizeError::Request(e.without_url()))?;
        let text: String = reply
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| content.parts.into_iter().map(|part| part.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(SummarizeError::EmptyResponse);
        }

        info!("Received {} characters of analysis for '{}'", text.len(), title);
        Ok(text)
    }
}
