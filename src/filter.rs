//! Keyword relevance and the article filters.
//!
//! Everything here is a pure function of its inputs; the reader recomputes
//! the filtered list whenever preferences or criteria change.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dates::parse_date;
use crate::model::Article;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Lowercased keywords in the order the user typed them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KeywordSet(Vec<String>);

impl KeywordSet {
    /// Parse a comma-separated keyword string. Blank entries and repeats are
    /// dropped.
    pub fn parse(raw: &str) -> Self {
        let mut keywords: Vec<String> = Vec::new();
        for keyword in raw.split(',').map(|k| k.trim().to_lowercase()) {
            if !keyword.is_empty() && !keywords.contains(&keyword) {
                keywords.push(keyword);
            }
        }
        Self(keywords)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, keyword: &str) -> bool {
        let keyword = keyword.trim().to_lowercase();
        self.0.iter().any(|k| *k == keyword)
    }

    /// Keywords found as substrings of the article's title or summary,
    /// ignoring case.
    pub fn matches(&self, article: &Article) -> Vec<String> {
        let content = format!("{} {}", article.title, article.summary).to_lowercase();
        self.0
            .iter()
            .filter(|keyword| content.contains(keyword.as_str()))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    All,
    /// Only articles matching at least one keyword.
    Interests,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DateRange {
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
    #[serde(rename = "90d")]
    Quarter,
    #[default]
    #[serde(rename = "all")]
    All,
}

impl DateRange {
    /// Largest admitted distance from now, in days.
    pub fn max_days(self) -> Option<i64> {
        match self {
            DateRange::Week => Some(7),
            DateRange::Month => Some(30),
            DateRange::Quarter => Some(90),
            DateRange::All => None,
        }
    }
}

impl FromStr for ViewMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(ViewMode::All),
            "interests" => Ok(ViewMode::Interests),
            other => Err(format!("unknown view mode: {}", other)),
        }
    }
}

impl FromStr for DateRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "7d" => Ok(DateRange::Week),
            "30d" => Ok(DateRange::Month),
            "90d" => Ok(DateRange::Quarter),
            "all" => Ok(DateRange::All),
            other => Err(format!("unknown date range: {}", other)),
        }
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DateRange::Week => "7d",
            DateRange::Month => "30d",
            DateRange::Quarter => "90d",
            DateRange::All => "all",
        };
        f.write_str(label)
    }
}

/// The user's current view over the article list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FilterCriteria {
    #[serde(default)]
    pub view: ViewMode,
    /// Title search term; blank means no search.
    #[serde(default, rename = "q")]
    pub search: String,
    #[serde(default)]
    pub range: DateRange,
}

/// Whole days between `now` and the article's date, rounded up.
/// `None` when the date is unknown or doesn't parse.
pub fn day_distance(published_date: &str, now: DateTime<Utc>) -> Option<i64> {
    let date = parse_date(published_date)?;
    let ms = (now - date).num_milliseconds().abs();
    Some((ms + DAY_MS - 1) / DAY_MS)
}

/// Date predicate. Articles without a usable date are excluded from every
/// range except [`DateRange::All`].
pub fn within_range(article: &Article, range: DateRange, now: DateTime<Utc>) -> bool {
    match range.max_days() {
        None => true,
        Some(max) => matches!(day_distance(&article.published_date, now), Some(days) if days <= max),
    }
}

fn matches_search(article: &Article, search: &str) -> bool {
    let search = search.trim();
    search.is_empty() || article.title.to_lowercase().contains(&search.to_lowercase())
}

fn matches_view(article: &Article, view: ViewMode) -> bool {
    match view {
        ViewMode::All => true,
        ViewMode::Interests => !article.matched_keywords.is_empty(),
    }
}

/// Annotate every article with its keyword matches and keep those passing
/// all of `criteria`, in their original order.
pub fn apply(
    articles: &[Article],
    keywords: &KeywordSet,
    criteria: &FilterCriteria,
    now: DateTime<Utc>,
) -> Vec<Article> {
    articles
        .iter()
        .map(|article| Article {
            matched_keywords: keywords.matches(article),
            ..article.clone()
        })
        .filter(|article| matches_view(article, criteria.view))
        .filter(|article| matches_search(article, &criteria.search))
        .filter(|article| within_range(article, criteria.range, now))
        .collect()
}
