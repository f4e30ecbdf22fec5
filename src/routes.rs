use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::error::ReaderError;
use crate::filter::FilterCriteria;
use crate::model::Article;
use crate::prefs::Preferences;
use crate::reader::{Reader, RefreshStatus};

pub struct AppState {
    pub reader: Arc<Reader>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/feeds", get(feeds))
        .route("/feeds/toggle", post(toggle_feed))
        .route("/feeds/toggle-all", post(toggle_all_feeds))
        .route("/preferences", get(preferences))
        .route("/preferences/keywords", put(set_keywords))
        .route("/articles", get(articles))
        .route("/articles/summarize", post(summarize))
        .route("/refresh", post(refresh))
        .route("/refresh/status", get(refresh_status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// Response bodies
#[derive(Serialize)]
pub struct FeedView {
    pub name: String,
    pub url: String,
    pub selected: bool,
}

#[derive(Serialize)]
pub struct PreferencesView {
    pub keywords: String,
    pub keyword_list: Vec<String>,
    pub selected_feeds: Vec<String>,
}

impl From<Preferences> for PreferencesView {
    fn from(prefs: Preferences) -> Self {
        Self {
            keywords: prefs.keywords().to_string(),
            keyword_list: prefs.keyword_set().as_slice().to_vec(),
            selected_feeds: prefs.selected_urls().map(str::to_string).collect(),
        }
    }
}

#[derive(Serialize)]
pub struct ArticlesView {
    pub total: usize,
    pub articles: Vec<Article>,
}

#[derive(Serialize)]
pub struct StatusView {
    #[serde(flatten)]
    pub status: RefreshStatus,
    pub article_count: usize,
}

#[derive(Serialize)]
pub struct AnalysisView {
    pub id: String,
    pub analysis: String,
}

// Request bodies
#[derive(Deserialize)]
pub struct ToggleRequest {
    pub url: String,
}

#[derive(Deserialize)]
pub struct KeywordsRequest {
    pub keywords: String,
}

#[derive(Deserialize)]
pub struct SummarizeRequest {
    pub id: String,
}

// Custom error type
pub struct AppError(ReaderError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ReaderError::RefreshInProgress => StatusCode::CONFLICT,
            ReaderError::ArticleNotFound(_) | ReaderError::UnknownFeed(_) => StatusCode::NOT_FOUND,
            ReaderError::Summarize(_) => StatusCode::BAD_GATEWAY,
        };
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

impl From<ReaderError> for AppError {
    fn from(err: ReaderError) -> Self {
        AppError(err)
    }
}

// Route handlers
pub async fn health() -> impl IntoResponse {
    Html("OK")
}

pub async fn feeds(State(state): State<Arc<AppState>>) -> Json<Vec<FeedView>> {
    let prefs = state.reader.preferences().await;
    let feeds = state
        .reader
        .catalog()
        .iter()
        .map(|feed| FeedView {
            name: feed.name.clone(),
            url: feed.url.clone(),
            selected: prefs.is_selected(&feed.url),
        })
        .collect();
    Json(feeds)
}

pub async fn toggle_feed(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ToggleRequest>,
) -> Result<Json<PreferencesView>, AppError> {
    Ok(Json(state.reader.toggle_feed(&request.url).await?.into()))
}

pub async fn toggle_all_feeds(State(state): State<Arc<AppState>>) -> Json<PreferencesView> {
    Json(state.reader.toggle_all_feeds().await.into())
}

pub async fn preferences(State(state): State<Arc<AppState>>) -> Json<PreferencesView> {
    Json(state.reader.preferences().await.into())
}

pub async fn set_keywords(
    State(state): State<Arc<AppState>>,
    Json(request): Json<KeywordsRequest>,
) -> Json<PreferencesView> {
    Json(state.reader.set_keywords(&request.keywords).await.into())
}

pub async fn articles(
    State(state): State<Arc<AppState>>,
    Query(criteria): Query<FilterCriteria>,
) -> Json<ArticlesView> {
    let articles = state.reader.filtered_articles(&criteria).await;
    Json(ArticlesView {
        total: articles.len(),
        articles,
    })
}

pub async fn refresh(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    // Claim the run before answering so a second request sees the conflict
    let guard = state.reader.begin_refresh().await?;

    // Spawn the refresh task
    let reader = state.reader.clone();
    tokio::spawn(async move {
        reader.run_refresh(guard).await;
    });

    Ok((StatusCode::ACCEPTED, Json(serde_json::json!({ "refreshing": true }))))
}

pub async fn refresh_status(State(state): State<Arc<AppState>>) -> Json<StatusView> {
    Json(StatusView {
        status: state.reader.status().await,
        article_count: state.reader.article_count().await,
    })
}

pub async fn summarize(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SummarizeRequest>,
) -> Result<Json<AnalysisView>, AppError> {
    let analysis = state.reader.summarize(&request.id).await?;
    Ok(Json(AnalysisView {
        id: request.id,
        analysis,
    }))
}
