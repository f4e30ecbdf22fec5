use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

use crate::model::FeedSource;

/// The compiled-in journal catalog and relay settings.
const BUILTIN_CONFIG: &str = include_str!("../feeds.toml");

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Keyword string used until the user saves their own
    #[serde(default = "default_keywords")]
    pub default_keywords: String,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub summarizer: SummarizerConfig,
    pub feeds: Vec<FeedSource>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RelayConfig {
    #[serde(default = "default_relay_endpoint")]
    pub endpoint: String,
    /// Query parameter carrying the encoded feed URL
    #[serde(default = "default_relay_param")]
    pub param: String,
    /// Pause before every request after the first, in milliseconds
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SummarizerConfig {
    #[serde(default = "default_summarizer_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_summarizer_model")]
    pub model: String,
}

fn default_keywords() -> String {
    "immunotherapy, pembrolizumab, kras, egfr, nsclc".to_string()
}

fn default_relay_endpoint() -> String {
    "https://api.allorigins.win/raw".to_string()
}

fn default_relay_param() -> String {
    "url".to_string()
}

fn default_request_delay_ms() -> u64 {
    200
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_summarizer_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_summarizer_model() -> String {
    "gemini-2.0-flash-exp".to_string()
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            endpoint: default_relay_endpoint(),
            param: default_relay_param(),
            request_delay_ms: default_request_delay_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            endpoint: default_summarizer_endpoint(),
            model: default_summarizer_model(),
        }
    }
}

impl Config {
    /// The configuration baked into the binary from `feeds.toml`.
    pub fn builtin() -> anyhow::Result<Self> {
        Self::from_str(BUILTIN_CONFIG)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        let mut seen = HashSet::new();
        for feed in &self.feeds {
            if !seen.insert(feed.url.as_str()) {
                anyhow::bail!("duplicate feed url in catalog: {}", feed.url);
            }
        }
        Ok(())
    }
}
