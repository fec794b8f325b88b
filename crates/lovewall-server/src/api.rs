use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, Path, State},
    http::Method,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use lovewall_store::{
    AlbumEntry, ImageStore, LoveMessage, NewLoveMessage, RecordStore, UPLOADS_URL_PREFIX,
};

use crate::config::ServerConfig;
use crate::error::ApiError;

/// Multipart field carrying the uploaded photo.
const IMAGE_FIELD: &str = "image";

/// Slack on top of the image limit for multipart boundaries and headers.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub records: Arc<RecordStore>,
    pub images: Arc<ImageStore>,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    let body_limit = state.images.max_size() + MULTIPART_OVERHEAD;
    let uploads = ServeDir::new(state.images.base_path());

    let mut router = Router::new()
        .route("/health", get(health_check))
        .route("/api/love", get(list_love).post(post_love))
        .route("/api/album", get(list_album))
        .route("/api/album/upload", post(album_upload))
        .route("/api/album/{position}", delete(album_delete))
        .nest_service(UPLOADS_URL_PREFIX, uploads);

    if let Some(public_dir) = &state.config.public_dir {
        router = router.fallback_service(ServeDir::new(public_dir));
    }

    router
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Success body of mutating endpoints: a human-readable message plus the
/// affected record, if any.
#[derive(Serialize)]
struct Envelope<T> {
    message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    messages: usize,
    photos: usize,
}

async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    Ok(Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        messages: state.records.message_count().await?,
        photos: state.records.album_count().await?,
    }))
}

// ─── Love messages ───

async fn list_love(State(state): State<AppState>) -> Result<Json<Vec<LoveMessage>>, ApiError> {
    Ok(Json(state.records.list_messages().await?))
}

async fn post_love(
    State(state): State<AppState>,
    payload: Result<Json<NewLoveMessage>, JsonRejection>,
) -> Result<Json<Envelope<LoveMessage>>, ApiError> {
    let Json(new) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let message = state.records.append_message(new).await?;

    info!(name = %message.name, "Message posted");
    Ok(Json(Envelope {
        message: "Message posted",
        data: Some(message),
    }))
}

// ─── Album ───

async fn list_album(State(state): State<AppState>) -> Result<Json<Vec<AlbumEntry>>, ApiError> {
    Ok(Json(state.records.list_album().await?))
}

async fn album_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Envelope<AlbumEntry>>, ApiError> {
    while let Some(mut field) = multipart.next_field().await.map_err(ApiError::multipart)? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        // A part without a file name is a plain form value, not a file.
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let mime = field.content_type().unwrap_or_default().to_string();

        // Stop buffering as soon as the limit is crossed; the store reports
        // the rejection.
        let max = state.images.max_size();
        let mut data = Vec::new();
        while let Some(chunk) = field.chunk().await.map_err(ApiError::multipart)? {
            data.extend_from_slice(&chunk);
            if data.len() > max {
                break;
            }
        }

        let entry = state.images.accept_upload(&data, &mime, &file_name).await?;

        let entry = match state.records.append_album_entry(entry.clone()).await {
            Ok(entry) => entry,
            Err(e) => {
                if let Err(cleanup) = state.images.remove(&entry.filename).await {
                    warn!(filename = %entry.filename, error = %cleanup, "Failed to discard orphaned image");
                }
                return Err(e.into());
            }
        };

        info!(filename = %entry.filename, size = data.len(), "Photo uploaded");
        return Ok(Json(Envelope {
            message: "Photo uploaded",
            data: Some(entry),
        }));
    }

    Err(ApiError::BadRequest(format!(
        "Missing '{IMAGE_FIELD}' file in multipart form"
    )))
}

async fn album_delete(
    State(state): State<AppState>,
    Path(position): Path<String>,
) -> Result<Json<Envelope<()>>, ApiError> {
    let position = parse_position(&position)
        .ok_or_else(|| ApiError::BadRequest(format!("Invalid album position: {position:?}")))?;

    let removed = state
        .records
        .delete_album_entry(position, &state.images)
        .await?;

    info!(position, filename = %removed.filename, "Photo deleted");
    Ok(Json(Envelope {
        message: "Photo deleted",
        data: None,
    }))
}

/// Parse an album position.  Integers too wide for `i64` saturate, so they
/// are reported as outside the album rather than as malformed.
fn parse_position(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    let digits = raw.strip_prefix(|c| c == '-' || c == '+').unwrap_or(raw);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let saturated = if raw.starts_with('-') {
        i64::MIN
    } else {
        i64::MAX
    };
    Some(raw.parse().unwrap_or(saturated))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
