use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use onco_reader::config::Config;
use onco_reader::db::Database;
use onco_reader::fetcher::Fetcher;
use onco_reader::prefs::{MemoryStore, PreferenceStore};
use onco_reader::reader::Reader;
use onco_reader::routes::{self, AppState};
use onco_reader::summarizer::GeminiSummarizer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "onco_reader=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = match std::env::var("ONCO_READER_CONFIG") {
        Ok(path) => Config::load(&path)?,
        Err(_) => Config::builtin()?,
    };
    info!("Loaded {} feeds from configuration", config.feeds.len());

    // Preferences survive restarts when the database opens; otherwise they
    // only last for this session
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite:onco_reader.db?mode=rwc".to_string());
    let store: Arc<dyn PreferenceStore> = match open_database(&database_url).await {
        Ok(db) => {
            info!("Database initialized");
            Arc::new(db)
        }
        Err(e) => {
            warn!("Failed to open preference database, using in-memory preferences: {}", e);
            Arc::new(MemoryStore::new())
        }
    };

    let fetcher = Fetcher::new(config.relay.clone())?;
    let api_key = std::env::var("GEMINI_API_KEY").ok();
    if api_key.is_none() {
        warn!("GEMINI_API_KEY is not set; article analysis will be unavailable");
    }
    let summarizer = Arc::new(GeminiSummarizer::new(&config.summarizer, api_key)?);

    let reader = Arc::new(
        Reader::new(
            config.feeds.clone(),
            &config.default_keywords,
            fetcher,
            summarizer,
            store,
        )
        .await,
    );

    // Build router
    let app = routes::router(Arc::new(AppState { reader }));

    // Start server
    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Server starting on http://{}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn open_database(database_url: &str) -> anyhow::Result<Database> {
    let db = Database::new(database_url).await?;
    db.initialize().await?;
    Ok(db)
}
