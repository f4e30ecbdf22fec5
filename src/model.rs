use serde::{Deserialize, Serialize};

/// Placeholder date for items that carry no date element at all.
pub const UNKNOWN_DATE: &str = "Unknown";

/// One journal in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSource {
    pub name: String,
    pub url: String,
}

impl FeedSource {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// A normalized feed item.
///
/// `published_date` is `YYYY-MM-DD` when the source date could be parsed, the
/// raw source string when it could not, and [`UNKNOWN_DATE`] when the item had
/// none. `matched_keywords` is only filled in by the filter pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Article {
    pub id: String,
    pub journal: String,
    pub title: String,
    pub link: String,
    pub published_date: String,
    pub summary: String,
    pub matched_keywords: Vec<String>,
}

impl Article {
    pub fn has_unknown_date(&self) -> bool {
        self.published_date == UNKNOWN_DATE
    }
}
