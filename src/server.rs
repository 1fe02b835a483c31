//! REST API over a [`Repository`].
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/api/assets` | Search: `query`, facet keys, `date`, `kinds`, `sort`, `starred` |
//! | `POST` | `/api/assets` | Create one asset from `{metadata, content}` (schema-validated) |
//! | `POST` | `/api/assets/bulk` | Create many assets, all or nothing |
//! | `GET`  | `/api/assets/stale` | Assets due for re-verification |
//! | `GET`  | `/api/assets/{id}` | One asset |
//! | `POST` | `/api/assets/{id}/verify` | Mark verified (today, or `?date=`) |
//! | `PUT`  | `/api/assets/{id}/note` | Replace the note |
//! | `POST` | `/api/assets/{id}/comments` | Add a comment |
//! | `GET`  | `/api/facets` | Facet counts |
//! | `GET`  | `/api/inbox` | Inbox items |
//! | `DELETE` | `/api/inbox/{id}` | Dismiss an inbox item |
//! | `POST` | `/api/extract` | `{filename, data}` (base64) to a metadata draft |
//! | `GET`/`POST` | `/api/plays` | List or create plays |
//! | `POST` | `/api/plays/match` | Match plays by offering, industry, region |
//! | `POST` | `/api/plays/{id}/assets` | Link an asset to a play at a stage: `{asset_id, phase}` |
//! | `GET`  | `/api/schemas` | Active schemas |
//! | `PUT`  | `/api/schemas/{type}` | Replace one schema |
//! | `POST` | `/api/guide` | Deal-guide stage buckets |
//! | `GET`  | `/api/analytics` | Catalog statistics |
//!
//! The asset ids `stale` and `bulk` are reserved for the routes above.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "invalid input: title must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `conflict` (409),
//! `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser UI can be
//! served from anywhere.

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use base64::Engine;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use gitkb_core::bucket::{bucketize, RecommendationBuckets, Stage};
use gitkb_core::facets::Facets;
use gitkb_core::filter::FilterSet;
use gitkb_core::models::{
    Asset, AssetDraft, AssetType, Comment, InboxItem, Note, Play, PlayDraft,
};
use gitkb_core::plays::PlayCriteria;
use gitkb_core::query::search;
use gitkb_core::schema::{Schema, SchemaRegistry};
use gitkb_core::stats::CatalogStats;
use gitkb_core::store::Repository;
use gitkb_core::CatalogError;

use crate::catalog::open_repository;
use crate::config::Config;
use crate::extract::extract_metadata;
use crate::search::parse_search;

#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    repo: Arc<dyn Repository>,
}

/// Opens the configured store and serves it on `[server].bind` until the
/// process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let repo = open_repository(config).await?;
    run_server_with_repository(config, repo).await
}

/// Like [`run_server`], but serves an already-open repository.
pub async fn run_server_with_repository(
    config: &Config,
    repo: Arc<dyn Repository>,
) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let app = router(Arc::new(config.clone()), repo);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "catalog server listening");
    println!("GitKB server listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// The full route table.
pub fn router(config: Arc<Config>, repo: Arc<dyn Repository>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Extraction uploads arrive base64-encoded.
    let body_limit = (config.import.max_extract_bytes as usize)
        .saturating_mul(4)
        / 3
        + 64 * 1024;

    let state = AppState { config, repo };

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/assets", get(handle_search).post(handle_create_asset))
        .route("/api/assets/bulk", post(handle_bulk_create))
        .route("/api/assets/stale", get(handle_stale))
        .route("/api/assets/{id}", get(handle_get_asset))
        .route("/api/assets/{id}/verify", post(handle_verify))
        .route("/api/assets/{id}/note", put(handle_update_note))
        .route("/api/assets/{id}/comments", post(handle_add_comment))
        .route("/api/facets", get(handle_facets))
        .route("/api/inbox", get(handle_inbox))
        .route("/api/inbox/{id}", delete(handle_dismiss))
        .route("/api/extract", post(handle_extract))
        .route("/api/plays", get(handle_plays).post(handle_create_play))
        .route("/api/plays/match", post(handle_match_plays))
        .route("/api/plays/{id}/assets", post(handle_associate_asset))
        .route("/api/schemas", get(handle_schemas))
        .route("/api/schemas/{type}", put(handle_update_schema))
        .route("/api/guide", post(handle_guide))
        .route("/api/analytics", get(handle_analytics))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        let (status, code) = match &err {
            CatalogError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
            CatalogError::Invalid(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            CatalogError::Duplicate(_) => (StatusCode::CONFLICT, "conflict"),
        };
        AppError {
            status,
            code,
            message: err.to_string(),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(catalog) = err.downcast_ref::<CatalogError>() {
            return catalog.clone().into();
        }
        tracing::error!(error = %format!("{:#}", err), "request failed");
        AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "internal",
            message: err.to_string(),
        }
    }
}

type ApiResult<T> = Result<Json<T>, AppError>;

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ Assets ============

async fn handle_search(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Vec<Asset>> {
    let req = parse_search(pairs)?;
    let fetched = state.repo.fetch_assets(&req.query, &req.filters).await?;
    Ok(Json(search(&req, &fetched, Utc::now())))
}

#[derive(Deserialize)]
struct CreateAssetBody {
    metadata: AssetDraft,
    #[serde(default)]
    content: Option<String>,
}

async fn handle_create_asset(
    State(state): State<AppState>,
    Json(body): Json<CreateAssetBody>,
) -> Result<(StatusCode, Json<Asset>), AppError> {
    let registry = SchemaRegistry::with_overrides(state.repo.schemas().await?)?;
    registry.validate(&body.metadata)?;
    let asset = state
        .repo
        .persist_asset(body.metadata, body.content)
        .await?;
    Ok((StatusCode::CREATED, Json(asset)))
}

async fn handle_bulk_create(
    State(state): State<AppState>,
    Json(drafts): Json<Vec<AssetDraft>>,
) -> Result<(StatusCode, Json<Vec<Asset>>), AppError> {
    let saved = state.repo.persist_many(drafts).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

#[derive(Deserialize)]
struct StaleParams {
    today: Option<NaiveDate>,
    days: Option<u32>,
}

async fn handle_stale(
    State(state): State<AppState>,
    Query(params): Query<StaleParams>,
) -> ApiResult<Vec<Asset>> {
    let today = params.today.unwrap_or_else(|| Utc::now().date_naive());
    let days = params.days.unwrap_or(state.config.catalog.stale_after_days);
    Ok(Json(state.repo.stale_assets(today, days).await?))
}

async fn handle_get_asset(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Asset> {
    match state.repo.get_asset(&id).await? {
        Some(asset) => Ok(Json(asset)),
        None => Err(CatalogError::asset_not_found(id).into()),
    }
}

#[derive(Deserialize)]
struct VerifyParams {
    date: Option<NaiveDate>,
}

async fn handle_verify(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<VerifyParams>,
) -> ApiResult<Asset> {
    let date = params.date.unwrap_or_else(|| Utc::now().date_naive());
    Ok(Json(state.repo.verify_asset(&id, date).await?))
}

async fn handle_update_note(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(note): Json<Note>,
) -> ApiResult<Note> {
    Ok(Json(state.repo.update_note(&id, note).await?))
}

#[derive(Deserialize)]
struct CommentBody {
    #[serde(default)]
    author: Option<String>,
    text: String,
}

async fn handle_add_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<CommentBody>,
) -> Result<(StatusCode, Json<Comment>), AppError> {
    let author = body
        .author
        .unwrap_or_else(|| state.config.catalog.default_author.clone());
    let comment = state.repo.add_comment(&id, &author, &body.text).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

async fn handle_facets(State(state): State<AppState>) -> ApiResult<Facets> {
    Ok(Json(state.repo.fetch_facets().await?))
}

// ============ Inbox ============

async fn handle_inbox(State(state): State<AppState>) -> ApiResult<Vec<InboxItem>> {
    Ok(Json(state.repo.fetch_inbox_items().await?))
}

async fn handle_dismiss(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<serde_json::Value> {
    let dismissed = state.repo.dismiss_inbox_item(&id).await?;
    Ok(Json(serde_json::json!({ "dismissed": dismissed })))
}

// ============ POST /api/extract ============

#[derive(Deserialize)]
struct ExtractBody {
    filename: String,
    /// Base64-encoded file bytes.
    data: String,
}

async fn handle_extract(
    State(state): State<AppState>,
    Json(body): Json<ExtractBody>,
) -> ApiResult<AssetDraft> {
    if body.filename.trim().is_empty() {
        return Err(bad_request("filename must not be empty"));
    }
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(body.data.as_bytes())
        .map_err(|e| bad_request(format!("data is not valid base64: {}", e)))?;
    if bytes.len() as u64 > state.config.import.max_extract_bytes {
        return Err(bad_request("file exceeds import.max_extract_bytes"));
    }
    let max_chars = state.config.import.max_summary_chars;
    let filename = body.filename;
    let draft = tokio::task::spawn_blocking(move || extract_metadata(&filename, &bytes, max_chars))
        .await
        .map_err(|e| anyhow::anyhow!("extraction task failed: {}", e))?;
    Ok(Json(draft))
}

// ============ Plays ============

async fn handle_plays(State(state): State<AppState>) -> ApiResult<Vec<Play>> {
    Ok(Json(state.repo.fetch_plays().await?))
}

async fn handle_create_play(
    State(state): State<AppState>,
    Json(draft): Json<PlayDraft>,
) -> Result<(StatusCode, Json<Play>), AppError> {
    let play = state.repo.create_play(draft).await?;
    Ok((StatusCode::CREATED, Json(play)))
}

async fn handle_match_plays(
    State(state): State<AppState>,
    Json(criteria): Json<PlayCriteria>,
) -> ApiResult<Vec<Play>> {
    Ok(Json(state.repo.match_plays(&criteria).await?))
}

#[derive(Deserialize)]
struct AssociateBody {
    asset_id: String,
    phase: Stage,
}

async fn handle_associate_asset(
    State(state): State<AppState>,
    Path(play_id): Path<String>,
    Json(body): Json<AssociateBody>,
) -> ApiResult<Play> {
    let play = state
        .repo
        .associate_asset(&play_id, &body.asset_id, body.phase)
        .await?;
    Ok(Json(play))
}

// ============ Schemas ============

async fn handle_schemas(State(state): State<AppState>) -> ApiResult<Vec<Schema>> {
    Ok(Json(state.repo.schemas().await?))
}

async fn handle_update_schema(
    State(state): State<AppState>,
    Path(asset_type): Path<String>,
    Json(schema): Json<Schema>,
) -> ApiResult<Schema> {
    let asset_type: AssetType = asset_type.parse()?;
    if schema.id != asset_type {
        return Err(bad_request(format!(
            "schema id '{}' does not match path '{}'",
            schema.id, asset_type
        )));
    }
    Ok(Json(state.repo.update_schema(schema).await?))
}

// ============ Guide & analytics ============

#[derive(Deserialize)]
struct GuideBody {
    #[serde(default)]
    offerings: Vec<String>,
    #[serde(default)]
    technologies: Vec<String>,
}

async fn handle_guide(
    State(state): State<AppState>,
    Json(body): Json<GuideBody>,
) -> ApiResult<RecommendationBuckets> {
    let all = state.repo.fetch_assets("", &FilterSet::new()).await?;
    Ok(Json(bucketize(&all, &body.offerings, &body.technologies)))
}

async fn handle_analytics(State(state): State<AppState>) -> ApiResult<CatalogStats> {
    let all = state.repo.fetch_assets("", &FilterSet::new()).await?;
    Ok(Json(CatalogStats::compute(
        &all,
        Utc::now(),
        state.config.catalog.stale_after_days,
    )))
}
