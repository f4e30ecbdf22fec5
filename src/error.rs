use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("XML parse error: {0}")]
    Xml(String),

    #[error("document contains no feed markup")]
    NotAFeed,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("relay answered HTTP {status} for {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },

    #[error("invalid relay url: {0}")]
    RelayUrl(String),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

#[derive(Debug, Error)]
pub enum SummarizeError {
    #[error("summarizer API key is not configured")]
    MissingApiKey,

    #[error("summarizer request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("summarizer answered HTTP {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("summarizer returned no text")]
    EmptyResponse,
}

#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("a refresh is already in progress")]
    RefreshInProgress,

    #[error("article not found: {0}")]
    ArticleNotFound(String),

    #[error("feed is not in the catalog: {0}")]
    UnknownFeed(String),

    #[error(transparent)]
    Summarize(#[from] SummarizeError),
}
