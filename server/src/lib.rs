use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use search_core::persist::IndexPaths;
use search_core::{
    Document, DocumentInput, EngineConfig, Error, Field, FieldScope, SearchEngine, SearchHit, SearchModel,
    SearchRequest, StemmingNormalizer,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    pub field: Option<String>,
    pub k: Option<usize>,
    pub model: Option<String>,
    pub proximity: Option<u32>,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Deserialize)]
pub struct SuggestParams {
    pub prefix: String,
    #[serde(default = "default_suggest_limit")]
    pub limit: usize,
}
fn default_suggest_limit() -> usize { 10 }

#[derive(Deserialize)]
pub struct FieldText {
    pub text: String,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SearchEngine>,
    pub index_dir: PathBuf,
    pub admin_token: Option<String>,
}

/// Engine errors as HTTP responses.
pub struct ApiError(StatusCode, String);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidDocument(_) | Error::UnknownField(_) | Error::MalformedQuery(_) => StatusCode::BAD_REQUEST,
            Error::IncompatibleIndex(_) | Error::Io(_) | Error::Encode(_) | Error::Json(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        ApiError(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(serde_json::json!({ "error": self.1 }))).into_response()
    }
}

pub fn build_app(index_dir: String, config: EngineConfig) -> Result<Router> {
    let paths = IndexPaths::new(&index_dir);
    let normalizer = Arc::new(StemmingNormalizer::default());
    let engine = if paths.exists() {
        SearchEngine::open(&paths, normalizer, config)?
    } else {
        tracing::warn!(index_dir = %index_dir, "no saved index found, starting empty");
        SearchEngine::new(normalizer, config)
    };
    let admin_token = std::env::var("ADMIN_TOKEN").ok();
    Ok(router(AppState { engine: Arc::new(engine), index_dir: PathBuf::from(&index_dir), admin_token }))
}

pub fn router(app_state: AppState) -> Router {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val.split(',').filter_map(|s| s.trim().parse().ok()).collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/suggest", get(suggest_handler))
        .route("/doc/:doc_id", get(doc_handler))
        .route("/documents", post(insert_handler))
        .route("/documents/:doc_id", delete(delete_handler))
        .route("/documents/:doc_id/:field", put(update_handler))
        .route("/index/commit", post(index_commit))
        .route("/index/stats", get(stats_handler))
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let start = std::time::Instant::now();
    let field = match params.field.as_deref() {
        None | Some("") | Some("all") => FieldScope::All,
        Some(name) => FieldScope::One(name.parse::<Field>()?),
    };
    let model = match params.model.as_deref() {
        None | Some("") => SearchModel::default(),
        Some(name) => name.parse::<SearchModel>()?,
    };
    let request = SearchRequest {
        query: params.q.clone(),
        field,
        k: params.k.unwrap_or(state.engine.config().default_k),
        model,
        proximity: params.proximity,
    };
    let results = state.engine.search(&request);
    let elapsed = start.elapsed();
    tracing::debug!(query = %params.q, total = results.total, "search served");
    Ok(Json(SearchResponse {
        query: params.q,
        took_s: elapsed.as_secs_f64(),
        total_hits: results.total,
        results: results.hits,
    }))
}

async fn suggest_handler(State(state): State<AppState>, Query(params): Query<SuggestParams>) -> Json<Vec<String>> {
    Json(state.engine.suggest(&params.prefix, params.limit.min(100)))
}

pub async fn doc_handler(State(state): State<AppState>, Path(doc_id): Path<u32>) -> Result<Json<Document>, ApiError> {
    state.engine.document(doc_id).map(Json).ok_or_else(|| ApiError::from(Error::NotFound(doc_id)))
}

async fn stats_handler(State(state): State<AppState>) -> Json<search_core::IndexStats> {
    Json(state.engine.stats())
}

// --- Admin endpoints ---
async fn insert_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<DocumentInput>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    authorize(&state, &headers)?;
    let engine = state.engine.clone();
    let doc_id = blocking(move || engine.insert(input)).await?;
    Ok((StatusCode::CREATED, Json(serde_json::json!({ "doc_id": doc_id }))))
}

async fn delete_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(doc_id): Path<u32>,
) -> Result<StatusCode, ApiError> {
    authorize(&state, &headers)?;
    let engine = state.engine.clone();
    blocking(move || engine.delete(doc_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn update_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((doc_id, field)): Path<(u32, String)>,
    Json(body): Json<FieldText>,
) -> Result<StatusCode, ApiError> {
    authorize(&state, &headers)?;
    let field: Field = field.parse()?;
    let engine = state.engine.clone();
    blocking(move || engine.update_field(doc_id, field, &body.text)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn index_commit(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(&state, &headers)?;
    let engine = state.engine.clone();
    let paths = IndexPaths::new(&state.index_dir);
    blocking(move || engine.save(&paths)).await?;
    Ok(Json(serde_json::json!({ "committed": true, "num_docs": state.engine.stats().num_docs })))
}

/// Runs an index operation off the async workers; writers may hold the lock for a while.
async fn blocking<T, F>(op: F) -> Result<T, ApiError>
where
    F: FnOnce() -> search_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|err| ApiError(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?
        .map_err(ApiError::from)
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err(ApiError(StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err(ApiError(StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}
