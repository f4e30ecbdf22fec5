use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::warn;

use crate::filter::KeywordSet;
use crate::model::FeedSource;

pub const KEYWORDS_KEY: &str = "keywords";
pub const SELECTED_FEEDS_KEY: &str = "selectedFeeds";

/// String key-value persistence for user preferences.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn load(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn save(&self, key: &str, value: &str) -> anyhow::Result<()>;
}

/// Process-local store; preferences last as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PreferenceStore for MemoryStore {
    async fn load(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn save(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// The user's keyword string and feed selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preferences {
    keywords: String,
    selected: BTreeSet<String>,
}

impl Preferences {
    pub fn new(keywords: impl Into<String>, selected: impl IntoIterator<Item = String>) -> Self {
        Self {
            keywords: keywords.into(),
            selected: selected.into_iter().collect(),
        }
    }

    /// First-run preferences: the default keywords and every catalog feed.
    pub fn defaults(default_keywords: &str, catalog: &[FeedSource]) -> Self {
        Self::new(default_keywords, catalog.iter().map(|f| f.url.clone()))
    }

    /// Read preferences from `store`, falling back to defaults for anything
    /// missing, undecodable, or unreadable.
    pub async fn load(
        store: &dyn PreferenceStore,
        default_keywords: &str,
        catalog: &[FeedSource],
    ) -> Self {
        let mut prefs = Self::defaults(default_keywords, catalog);

        match store.load(KEYWORDS_KEY).await {
            Ok(Some(keywords)) => prefs.keywords = keywords,
            Ok(None) => {}
            Err(e) => warn!("Failed to load keywords, using defaults: {}", e),
        }

        match store.load(SELECTED_FEEDS_KEY).await {
            Ok(Some(json)) => match serde_json::from_str::<Vec<String>>(&json) {
                Ok(urls) => {
                    // Feeds dropped from the catalog stay unselected
                    prefs.selected = urls
                        .into_iter()
                        .filter(|url| catalog.iter().any(|feed| &feed.url == url))
                        .collect()
                }
                Err(e) => warn!("Stored feed selection is not a JSON array, selecting all: {}", e),
            },
            Ok(None) => {}
            Err(e) => warn!("Failed to load feed selection, selecting all: {}", e),
        }

        prefs
    }

    /// Write both entries to `store`.
    pub async fn save(&self, store: &dyn PreferenceStore) -> anyhow::Result<()> {
        store.save(KEYWORDS_KEY, &self.keywords).await?;
        store
            .save(SELECTED_FEEDS_KEY, &self.selected_json()?)
            .await?;
        Ok(())
    }

    pub fn keywords(&self) -> &str {
        &self.keywords
    }

    pub fn keyword_set(&self) -> KeywordSet {
        KeywordSet::parse(&self.keywords)
    }

    pub fn set_keywords(&mut self, keywords: impl Into<String>) {
        self.keywords = keywords.into();
    }

    pub fn is_selected(&self, url: &str) -> bool {
        self.selected.contains(url)
    }

    pub fn selected_urls(&self) -> impl Iterator<Item = &str> {
        self.selected.iter().map(String::as_str)
    }

    pub fn selected_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.selected)
    }

    /// Flip one feed in or out of the selection.
    pub fn toggle_one(&mut self, url: &str) {
        if !self.selected.remove(url) {
            self.selected.insert(url.to_string());
        }
    }

    /// Clear the selection when every catalog feed is selected, otherwise
    /// select them all.
    pub fn toggle_all(&mut self, catalog: &[FeedSource]) {
        if self.all_selected(catalog) {
            self.selected.clear();
        } else {
            self.selected = catalog.iter().map(|f| f.url.clone()).collect();
        }
    }

    pub fn all_selected(&self, catalog: &[FeedSource]) -> bool {
        catalog.iter().all(|f| self.selected.contains(&f.url))
    }

    /// Selected feeds in catalog order.
    pub fn selected_feeds(&self, catalog: &[FeedSource]) -> Vec<FeedSource> {
        catalog
            .iter()
            .filter(|f| self.selected.contains(&f.url))
            .cloned()
            .collect()
    }
}
