use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::ReaderError;
use crate::fetcher::{FetchEvent, Fetcher};
use crate::filter::{self, FilterCriteria, KeywordSet};
use crate::model::{Article, FeedSource};
use crate::prefs::{PreferenceStore, Preferences};
use crate::summarizer::Summarizer;

/// Snapshot of the current (or last) ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RefreshStatus {
    pub refreshing: bool,
    pub percent: f64,
    pub message: String,
}

/// Proof that a run is in flight. Dropping it, including when the run's task
/// panics or is aborted, lets the next run start.
#[derive(Debug)]
pub struct RefreshGuard {
    running: Arc<AtomicBool>,
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

/// Owns the reader's state: preferences, the current run's articles, and the
/// analyses produced for them.
pub struct Reader {
    catalog: Vec<FeedSource>,
    fetcher: Fetcher,
    summarizer: Arc<dyn Summarizer>,
    store: Arc<dyn PreferenceStore>,
    preferences: RwLock<Preferences>,
    articles: RwLock<Vec<Article>>,
    status: RwLock<RefreshStatus>,
    running: Arc<AtomicBool>,
    /// Analyses keyed by article id; cleared when a run replaces the articles
    analyses: RwLock<HashMap<String, String>>,
}

impl Reader {
    pub async fn new(
        catalog: Vec<FeedSource>,
        default_keywords: &str,
        fetcher: Fetcher,
        summarizer: Arc<dyn Summarizer>,
        store: Arc<dyn PreferenceStore>,
    ) -> Self {
        let preferences = Preferences::load(store.as_ref(), default_keywords, &catalog).await;
        info!(
            "Loaded preferences: {} keywords, {} of {} feeds selected",
            preferences.keyword_set().as_slice().len(),
            preferences.selected_feeds(&catalog).len(),
            catalog.len()
        );

        Self {
            catalog,
            fetcher,
            summarizer,
            store,
            preferences: RwLock::new(preferences),
            articles: RwLock::new(Vec::new()),
            status: RwLock::new(RefreshStatus::default()),
            running: Arc::new(AtomicBool::new(false)),
            analyses: RwLock::new(HashMap::new()),
        }
    }

    pub fn catalog(&self) -> &[FeedSource] {
        &self.catalog
    }

    pub async fn preferences(&self) -> Preferences {
        self.preferences.read().await.clone()
    }

    pub async fn keyword_set(&self) -> KeywordSet {
        self.preferences.read().await.keyword_set()
    }

    pub async fn status(&self) -> RefreshStatus {
        let mut status = self.status.read().await.clone();
        status.refreshing = self.running.load(Ordering::Acquire);
        status
    }

    pub async fn is_refreshing(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub async fn article_count(&self) -> usize {
        self.articles.read().await.len()
    }

    /// Fetch the selected feeds and replace the article collection.
    ///
    /// Only one run may be in flight; a second call while one is running is
    /// rejected rather than queued.
    pub async fn refresh(&self) -> Result<usize, ReaderError> {
        let guard = self.begin_refresh().await?;
        Ok(self.run_refresh(guard).await)
    }

    /// Claim the single run slot, or fail if a run is already in flight.
    pub async fn begin_refresh(&self) -> Result<RefreshGuard, ReaderError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            info!("Refresh already in progress, rejecting");
            return Err(ReaderError::RefreshInProgress);
        }

        *self.status.write().await = RefreshStatus {
            refreshing: true,
            percent: 0.0,
            message: String::new(),
        };
        Ok(RefreshGuard {
            running: self.running.clone(),
        })
    }

    /// Perform the run claimed by `guard`. The slot is released when the
    /// guard drops at the end.
    pub async fn run_refresh(&self, guard: RefreshGuard) -> usize {
        let targets = self.preferences.read().await.selected_feeds(&self.catalog);
        info!("Starting refresh of {} selected feeds", targets.len());

        let mut collected = Vec::new();
        let mut events = std::pin::pin!(self.fetcher.events(targets));
        while let Some(event) = events.next().await {
            match event {
                FetchEvent::Progress { percent, message } => {
                    let mut status = self.status.write().await;
                    status.percent = percent;
                    status.message = message;
                }
                FetchEvent::FeedLoaded { articles, .. } => collected.extend(articles),
                FetchEvent::FeedFailed { .. } => {}
            }
        }

        let count = collected.len();
        {
            let mut articles = self.articles.write().await;
            let mut analyses = self.analyses.write().await;
            *articles = collected;
            analyses.clear();
        }

        {
            let mut status = self.status.write().await;
            status.refreshing = false;
            status.percent = 100.0;
            status.message = format!("Loaded {} articles", count);
        }
        drop(guard);

        info!("Refresh complete with {} articles", count);
        count
    }

    /// The current articles that pass `criteria`, annotated with keyword
    /// matches.
    pub async fn filtered_articles(&self, criteria: &FilterCriteria) -> Vec<Article> {
        let keywords = self.keyword_set().await;
        let articles = self.articles.read().await;
        filter::apply(&articles, &keywords, criteria, Utc::now())
    }

    pub async fn set_keywords(&self, keywords: &str) -> Preferences {
        let mut prefs = self.preferences.write().await;
        prefs.set_keywords(keywords);
        self.persist(&prefs).await;
        prefs.clone()
    }

    /// Flip one catalog feed. URLs outside the catalog are rejected.
    pub async fn toggle_feed(&self, url: &str) -> Result<Preferences, ReaderError> {
        if !self.catalog.iter().any(|feed| feed.url == url) {
            return Err(ReaderError::UnknownFeed(url.to_string()));
        }

        let mut prefs = self.preferences.write().await;
        prefs.toggle_one(url);
        self.persist(&prefs).await;
        Ok(prefs.clone())
    }

    pub async fn toggle_all_feeds(&self) -> Preferences {
        let mut prefs = self.preferences.write().await;
        prefs.toggle_all(&self.catalog);
        self.persist(&prefs).await;
        prefs.clone()
    }

    /// Save preferences; on failure keep running on the in-memory copy.
    async fn persist(&self, prefs: &Preferences) {
        if let Err(e) = prefs.save(self.store.as_ref()).await {
            warn!("Failed to save preferences, keeping them for this session only: {}", e);
        }
    }

    /// Ask the summarizer about one article and remember the answer.
    pub async fn summarize(&self, article_id: &str) -> Result<String, ReaderError> {
        let (title, summary) = {
            let articles = self.articles.read().await;
            let article = articles
                .iter()
                .find(|a| a.id == article_id)
                .ok_or_else(|| ReaderError::ArticleNotFound(article_id.to_string()))?;
            (article.title.clone(), article.summary.clone())
        };

        let analysis = self.summarizer.summarize(&title, &summary).await?;

        // A run may have replaced the articles while the summarizer worked
        let articles = self.articles.read().await;
        if articles.iter().any(|a| a.id == article_id) {
            self.analyses
                .write()
                .await
                .insert(article_id.to_string(), analysis.clone());
        } else {
            debug!("Article '{}' was replaced during analysis, not storing it", article_id);
        }
        Ok(analysis)
    }

    pub async fn analysis(&self, article_id: &str) -> Option<String> {
        self.analyses.read().await.get(article_id).cloned()
    }
}
