//! Integration tests for the onco-reader feed pipeline
//!
//! These tests drive the relay fetch, parsing, filtering and preference
//! persistence together against mock relays and on-disk databases.

use std::io::Write;
use tempfile::NamedTempFile;

mod common {
    use onco_reader::config::RelayConfig;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Create a temporary directory for test databases
    pub fn create_temp_dir() -> TempDir {
        tempfile::tempdir().expect("Failed to create temp directory")
    }

    /// Create a test database path
    pub fn create_db_path(temp_dir: &TempDir) -> String {
        let db_path = temp_dir.path().join("test.db");
        format!("sqlite:{}?mode=rwc", db_path.display())
    }

    pub fn relay_config(server: &MockServer) -> RelayConfig {
        RelayConfig {
            endpoint: format!("{}/raw", server.uri()),
            param: "url".to_string(),
            request_delay_ms: 0,
            timeout_secs: 5,
        }
    }

    pub fn rss_item(title: &str, link: &str, date: &str, description: &str) -> String {
        format!(
            "<item><title>{}</title><link>{}</link><pubDate>{}</pubDate>\
             <description><![CDATA[{}]]></description></item>",
            title, link, date, description
        )
    }

    pub fn rss(items: &[String]) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
            <rss version="2.0"><channel><title>Journal</title>{}</channel></rss>"#,
            items.concat()
        )
    }

    /// Serve `body` through the relay for `feed_url`.
    pub async fn relay_feed(server: &MockServer, feed_url: &str, body: String) {
        Mock::given(method("GET"))
            .and(path("/raw"))
            .and(query_param("url", feed_url))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    pub async fn relay_status(server: &MockServer, feed_url: &str, status: u16) {
        Mock::given(method("GET"))
            .and(path("/raw"))
            .and(query_param("url", feed_url))
            .respond_with(ResponseTemplate::new(status))
            .mount(server)
            .await;
    }
}

#[cfg(test)]
mod config_integration_tests {
    use super::*;
    use onco_reader::config::Config;

    #[test]
    fn test_load_actual_feeds_config() {
        // Test loading the actual feeds.toml from the project
        let config = Config::load("feeds.toml");
        assert!(config.is_ok(), "Failed to load feeds.toml: {:?}", config.err());

        let config = config.unwrap();
        assert!(!config.feeds.is_empty(), "feeds.toml should have at least one feed");
        assert!(config.relay.timeout_secs > 0, "timeout_secs should be positive");
    }

    #[test]
    fn test_builtin_matches_file() {
        let builtin = Config::builtin().unwrap();
        let file = Config::load("feeds.toml").unwrap();
        assert_eq!(builtin.feeds, file.feeds);
    }

    #[test]
    fn test_custom_config_file() {
        let toml_content = r#"
            default_keywords = "osimertinib"

            [relay]
            endpoint = "https://relay.internal/raw"

            [[feeds]]
            name = "JAMA Oncology"
            url = "https://jamanetwork.com/rss/site_159/174.xml"

            [[feeds]]
            name = "Cancer Discovery"
            url = "https://aacrjournals.org/rss/site_1000003/1000004.xml"
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.default_keywords, "osimertinib");
        assert_eq!(config.relay.endpoint, "https://relay.internal/raw");
        assert_eq!(config.relay.request_delay_ms, 200);
        assert_eq!(config.feeds.len(), 2);
        assert_eq!(config.feeds[1].name, "Cancer Discovery");
    }
}

#[cfg(test)]
mod fetcher_integration_tests {
    use super::common::*;
    use futures::StreamExt;
    use onco_reader::fetcher::{FetchEvent, Fetcher};
    use onco_reader::model::FeedSource;
    use wiremock::MockServer;

    fn feeds() -> Vec<FeedSource> {
        vec![
            FeedSource::new("JCO", "https://ascopubs.org/action/showFeed?type=etoc&feed=rss&jc=jco"),
            FeedSource::new("Lancet Oncology", "https://www.thelancet.com/rssfeed/lanonc_current.xml"),
            FeedSource::new("Cancer Research", "https://aacrjournals.org/rss/site_1000011/1000008.xml"),
        ]
    }

    #[tokio::test]
    async fn test_failed_feeds_lose_only_their_contribution() {
        let server = MockServer::start().await;
        let feeds = feeds();

        relay_feed(
            &server,
            &feeds[0].url,
            rss(&[
                rss_item("JCO 1", "https://jco/1", "Mon, 09 Dec 2024 12:00:00 GMT", "a"),
                rss_item("JCO 2", "https://jco/2", "Mon, 09 Dec 2024 10:00:00 GMT", "b"),
            ]),
        )
        .await;
        relay_status(&server, &feeds[1].url, 500).await;
        relay_feed(
            &server,
            &feeds[2].url,
            rss(&[rss_item("CR 1", "https://cr/1", "2024-12-01", "c")]),
        )
        .await;

        let fetcher = Fetcher::new(relay_config(&server)).unwrap();
        let articles = fetcher.fetch_articles(feeds, |_, _| {}).await;

        let titles: Vec<_> = articles.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["JCO 1", "JCO 2", "CR 1"]);
        assert_eq!(articles[0].journal, "JCO");
        assert_eq!(articles[2].journal, "Cancer Research");
    }

    #[tokio::test]
    async fn test_malformed_document_yields_nothing_for_that_feed() {
        let server = MockServer::start().await;
        let feeds = feeds();

        relay_feed(&server, &feeds[0].url, "<rss><channel><item><title>x</item>".to_string()).await;
        relay_feed(
            &server,
            &feeds[1].url,
            rss(&[rss_item("Lancet 1", "https://lancet/1", "2024-12-01", "d")]),
        )
        .await;
        relay_feed(&server, &feeds[2].url, "<html><body>Too many requests</body></html>".to_string())
            .await;

        let fetcher = Fetcher::new(relay_config(&server)).unwrap();
        let articles = fetcher.fetch_articles(feeds, |_, _| {}).await;

        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].title, "Lancet 1");
    }

    #[tokio::test]
    async fn test_progress_is_reported_before_each_feed() {
        let server = MockServer::start().await;
        let feeds = feeds();
        for feed in &feeds {
            relay_feed(&server, &feed.url, rss(&[])).await;
        }

        let fetcher = Fetcher::new(relay_config(&server)).unwrap();
        let mut progress = Vec::new();
        fetcher
            .fetch_articles(feeds, |percent, message| {
                progress.push((percent.round() as u32, message.to_string()))
            })
            .await;

        assert_eq!(
            progress,
            vec![
                (33, "Fetching JCO...".to_string()),
                (67, "Fetching Lancet Oncology...".to_string()),
                (100, "Fetching Cancer Research...".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_event_stream_alternates_progress_and_outcome() {
        let server = MockServer::start().await;
        let feeds = feeds();
        relay_feed(&server, &feeds[0].url, rss(&[rss_item("A", "https://a", "2024-12-01", "")])).await;
        relay_status(&server, &feeds[1].url, 404).await;
        relay_feed(&server, &feeds[2].url, rss(&[])).await;

        let fetcher = Fetcher::new(relay_config(&server)).unwrap();
        let events: Vec<_> = fetcher.events(feeds).collect().await;

        assert_eq!(events.len(), 6);
        assert!(matches!(events[0], FetchEvent::Progress { .. }));
        assert!(matches!(&events[1], FetchEvent::FeedLoaded { articles, .. } if articles.len() == 1));
        assert!(matches!(events[2], FetchEvent::Progress { .. }));
        assert!(matches!(&events[3], FetchEvent::FeedFailed { error, .. } if error.contains("404")));
        assert!(matches!(events[4], FetchEvent::Progress { .. }));
        assert!(matches!(&events[5], FetchEvent::FeedLoaded { articles, .. } if articles.is_empty()));
    }

    #[tokio::test]
    async fn test_inter_request_delay() {
        let server = MockServer::start().await;
        let feeds = feeds();
        for feed in &feeds {
            relay_feed(&server, &feed.url, rss(&[])).await;
        }

        let mut config = relay_config(&server);
        config.request_delay_ms = 100;
        let fetcher = Fetcher::new(config).unwrap();

        let started = std::time::Instant::now();
        fetcher.fetch_articles(feeds, |_, _| {}).await;

        // Two pauses for three feeds
        assert!(started.elapsed() >= std::time::Duration::from_millis(200));
    }
}

#[cfg(test)]
mod preference_integration_tests {
    use super::common::*;
    use onco_reader::db::Database;
    use onco_reader::model::FeedSource;
    use onco_reader::prefs::{PreferenceStore, Preferences, SELECTED_FEEDS_KEY};

    fn catalog() -> Vec<FeedSource> {
        vec![
            FeedSource::new("Annals of Oncology", "https://www.annalsofoncology.org/current.rss"),
            FeedSource::new("JAMA Oncology", "https://jamanetwork.com/rss/site_159/174.xml"),
        ]
    }

    #[tokio::test]
    async fn test_preferences_survive_reopen() {
        let temp_dir = create_temp_dir();
        let db_url = create_db_path(&temp_dir);
        let catalog = catalog();

        {
            let db = Database::new(&db_url).await.unwrap();
            db.initialize().await.unwrap();

            let mut prefs = Preferences::load(&db, "egfr", &catalog).await;
            prefs.set_keywords("kras, nsclc");
            prefs.toggle_one(&catalog[0].url);
            prefs.save(&db).await.unwrap();
        }

        {
            let db = Database::new(&db_url).await.unwrap();
            let prefs = Preferences::load(&db, "egfr", &catalog).await;

            assert_eq!(prefs.keywords(), "kras, nsclc");
            assert!(!prefs.is_selected(&catalog[0].url));
            assert!(prefs.is_selected(&catalog[1].url));

            let json = db.load(SELECTED_FEEDS_KEY).await.unwrap().unwrap();
            assert_eq!(json, r#"["https://jamanetwork.com/rss/site_159/174.xml"]"#);
        }
    }
}

#[cfg(test)]
mod end_to_end_tests {
    use super::common::*;
    use chrono::{Duration, Utc};
    use onco_reader::db::Database;
    use onco_reader::error::{ReaderError, SummarizeError};
    use onco_reader::fetcher::Fetcher;
    use onco_reader::filter::{DateRange, FilterCriteria, ViewMode};
    use onco_reader::model::{FeedSource, UNKNOWN_DATE};
    use onco_reader::reader::Reader;
    use onco_reader::summarizer::Summarizer;
    use std::sync::Arc;
    use wiremock::MockServer;

    struct TitleSummarizer;

    #[async_trait::async_trait]
    impl Summarizer for TitleSummarizer {
        async fn summarize(&self, title: &str, summary: &str) -> Result<String, SummarizeError> {
            Ok(format!("{} | {}", title, summary))
        }
    }

    fn catalog() -> Vec<FeedSource> {
        vec![
            FeedSource::new("JAMA Oncology", "https://jamanetwork.com/rss/site_159/174.xml"),
            FeedSource::new("npj Precision Oncology", "https://www.nature.com/npjprecisiononcology.rss"),
        ]
    }

    async fn setup(server: &MockServer, db_url: &str) -> Reader {
        let catalog = catalog();
        let today = Utc::now().to_rfc2822();
        let long_ago = (Utc::now() - Duration::days(120)).to_rfc2822();

        relay_feed(
            server,
            &catalog[0].url,
            rss(&[
                rss_item(
                    "EGFR trial",
                    "https://jamanetwork.com/a/1",
                    &today,
                    "<p>Osimertinib <script>alert(1)</script>after chemoradiotherapy</p>",
                ),
                rss_item("KRAS update", "https://jamanetwork.com/a/2", &long_ago, "Sotorasib"),
            ]),
        )
        .await;
        relay_feed(
            server,
            &catalog[1].url,
            format!(
                "<rss><channel>{}<item><title>Undated NSCLC review</title>\
                 <link>https://nature.com/a/3</link></item></channel></rss>",
                rss_item("KRAS-mutant NSCLC", "https://nature.com/a/4", &today, "")
            ),
        )
        .await;

        let db = Database::new(db_url).await.unwrap();
        db.initialize().await.unwrap();

        let fetcher = Fetcher::new(relay_config(server)).unwrap();
        Reader::new(catalog, "egfr", fetcher, Arc::new(TitleSummarizer), Arc::new(db)).await
    }

    fn titles(articles: &[onco_reader::model::Article]) -> Vec<String> {
        articles.iter().map(|a| a.title.clone()).collect()
    }

    #[tokio::test]
    async fn test_full_pipeline() {
        let server = MockServer::start().await;
        let temp_dir = create_temp_dir();
        let reader = setup(&server, &create_db_path(&temp_dir)).await;

        assert_eq!(reader.refresh().await.unwrap(), 4);

        // Everything, in ingestion order
        let all = reader.filtered_articles(&FilterCriteria::default()).await;
        assert_eq!(
            titles(&all),
            vec!["EGFR trial", "KRAS update", "KRAS-mutant NSCLC", "Undated NSCLC review"]
        );
        assert_eq!(all[3].published_date, UNKNOWN_DATE);
        assert!(!all[0].summary.contains('<'));
        assert!(!all[0].summary.contains("alert"));

        // Interests within 30 days
        let criteria = FilterCriteria {
            view: ViewMode::Interests,
            search: String::new(),
            range: DateRange::Month,
        };
        let recent = reader.filtered_articles(&criteria).await;
        assert_eq!(titles(&recent), vec!["EGFR trial"]);
        assert_eq!(recent[0].matched_keywords, vec!["egfr"]);

        // The old article fails on date even in the "all" view
        let criteria = FilterCriteria {
            view: ViewMode::All,
            search: String::new(),
            range: DateRange::Month,
        };
        let recent = reader.filtered_articles(&criteria).await;
        assert_eq!(titles(&recent), vec!["EGFR trial", "KRAS-mutant NSCLC"]);

        // Keyword change re-annotates without refetching
        reader.set_keywords("KRAS, nsclc").await;
        let criteria = FilterCriteria {
            view: ViewMode::Interests,
            search: "kras".to_string(),
            range: DateRange::All,
        };
        let matched = reader.filtered_articles(&criteria).await;
        assert_eq!(titles(&matched), vec!["KRAS update", "KRAS-mutant NSCLC"]);
        assert_eq!(matched[1].matched_keywords, vec!["kras", "nsclc"]);
    }

    #[tokio::test]
    async fn test_summarize_keeps_articles_unchanged() {
        let server = MockServer::start().await;
        let temp_dir = create_temp_dir();
        let reader = setup(&server, &create_db_path(&temp_dir)).await;
        reader.refresh().await.unwrap();

        let before = reader.filtered_articles(&FilterCriteria::default()).await;
        let analysis = reader.summarize("https://jamanetwork.com/a/2").await.unwrap();
        let after = reader.filtered_articles(&FilterCriteria::default()).await;

        assert_eq!(analysis, "KRAS update | Sotorasib...");
        assert_eq!(before, after);
        assert_eq!(
            reader.analysis("https://jamanetwork.com/a/2").await,
            Some(analysis)
        );

        let missing = reader.summarize("https://jamanetwork.com/a/99").await;
        assert!(matches!(missing, Err(ReaderError::ArticleNotFound(_))));
    }

    #[tokio::test]
    async fn test_selection_persists_across_readers() {
        let server = MockServer::start().await;
        let temp_dir = create_temp_dir();
        let db_url = create_db_path(&temp_dir);

        {
            let reader = setup(&server, &db_url).await;
            reader
                .toggle_feed("https://www.nature.com/npjprecisiononcology.rss")
                .await
                .unwrap();
        }

        let reader = setup(&server, &db_url).await;
        assert_eq!(reader.refresh().await.unwrap(), 2);
        let prefs = reader.preferences().await;
        assert!(!prefs.is_selected("https://www.nature.com/npjprecisiononcology.rss"));
    }
}
