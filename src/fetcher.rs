use std::time::Duration;

use futures::stream::{self, Stream, StreamExt};
use reqwest::{Client, Url};
use tracing::{info, warn};

use crate::config::RelayConfig;
use crate::error::FetchError;
use crate::model::{Article, FeedSource};
use crate::parser::parse_feed;

/// One step of an ingestion run.
#[derive(Debug)]
pub enum FetchEvent {
    /// Announced before each feed is requested.
    Progress { percent: f64, message: String },
    FeedLoaded {
        feed: FeedSource,
        articles: Vec<Article>,
    },
    /// The feed was skipped; the run carries on with the next one.
    FeedFailed { feed: FeedSource, error: String },
}

/// Where the run is before emitting its next event.
#[derive(Debug, Clone, Copy)]
enum Step {
    Announce(usize),
    Retrieve(usize),
}

struct Run {
    feeds: Vec<FeedSource>,
    step: Step,
}

/// Retrieves feeds one at a time through the relay.
pub struct Fetcher {
    client: Client,
    relay: RelayConfig,
}

impl Fetcher {
    pub fn new(relay: RelayConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(relay.timeout_secs))
            .user_agent("OncoReader/1.0 (Journal Feed Reader)")
            .build()?;

        Ok(Self { client, relay })
    }

    /// Relay URL with the feed URL carried as an encoded query parameter.
    pub fn relay_url(&self, feed_url: &str) -> Result<Url, FetchError> {
        Url::parse_with_params(&self.relay.endpoint, &[(self.relay.param.as_str(), feed_url)])
            .map_err(|e| FetchError::RelayUrl(format!("{}: {}", self.relay.endpoint, e)))
    }

    /// Fetch and parse one feed.
    pub async fn fetch_feed(&self, feed: &FeedSource) -> Result<Vec<Article>, FetchError> {
        let url = self.relay_url(&feed.url)?;
        info!("Fetching feed: {} ({})", feed.name, feed.url);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status,
                url: feed.url.clone(),
            });
        }

        let bytes = response.bytes().await?;
        let articles = parse_feed(&bytes, &feed.name)?;

        info!("Parsed {} articles for feed '{}'", articles.len(), feed.name);
        Ok(articles)
    }

    /// The run as a lazy sequence of events, one feed at a time in the given
    /// order. Each feed yields a `Progress` event and then its outcome.
    pub fn events(&self, feeds: Vec<FeedSource>) -> impl Stream<Item = FetchEvent> + '_ {
        let total = feeds.len();
        let delay = Duration::from_millis(self.relay.request_delay_ms);

        let start = Run {
            feeds,
            step: Step::Announce(0),
        };

        stream::unfold(start, move |mut run| async move {
            match run.step {
                Step::Announce(index) if index < total => {
                    let event = FetchEvent::Progress {
                        percent: progress_percent(index, total),
                        message: format!("Fetching {}...", run.feeds[index].name),
                    };
                    run.step = Step::Retrieve(index);
                    Some((event, run))
                }
                Step::Announce(_) => None,
                Step::Retrieve(index) => {
                    if index > 0 && !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }

                    let feed = run.feeds[index].clone();
                    let event = match self.fetch_feed(&feed).await {
                        Ok(articles) => FetchEvent::FeedLoaded { feed, articles },
                        Err(e) => {
                            warn!("Failed to fetch feed '{}': {}", feed.name, e);
                            FetchEvent::FeedFailed {
                                feed,
                                error: e.to_string(),
                            }
                        }
                    };
                    run.step = Step::Announce(index + 1);
                    Some((event, run))
                }
            }
        })
    }

    /// Fetch every feed and concatenate the articles in feed order.
    /// Failed feeds contribute nothing.
    pub async fn fetch_articles<F>(&self, feeds: Vec<FeedSource>, mut on_progress: F) -> Vec<Article>
    where
        F: FnMut(f64, &str),
    {
        let total = feeds.len();
        info!("Refreshing {} feeds", total);

        let mut all = Vec::new();
        let mut failed = 0;
        let mut events = std::pin::pin!(self.events(feeds));
        while let Some(event) = events.next().await {
            match event {
                FetchEvent::Progress { percent, message } => on_progress(percent, &message),
                FetchEvent::FeedLoaded { articles, .. } => all.extend(articles),
                FetchEvent::FeedFailed { .. } => failed += 1,
            }
        }

        info!(
            "Feed refresh complete: {} articles, {} of {} feeds failed",
            all.len(),
            failed,
            total
        );
        all
    }
}

/// Share of the run reached once feed `index` (zero-based) is under way.
pub fn progress_percent(index: usize, total: usize) -> f64 {
    if total == 0 {
        return 100.0;
    }
    (index + 1) as f64 / total as f64 * 100.0
}
