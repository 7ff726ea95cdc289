use crate::{
    config::{save_config_to, ConfigUpdate},
    error::{AppError, Stage},
    extractor::{media_url, YtDlp},
    media_info as describe,
    models::{DownloadRequest, DownloadResponse, MediaKind},
    selector::selector_for,
    AppState,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use once_cell::sync::Lazy;
use regex::Regex;

static UNSAFE_FILENAME_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]+").unwrap());

// ===================================================================
//                          CONFIG HANDLERS
// ===================================================================

/// # GET /config - Returns the current application configuration.
pub async fn get_config(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let config = state.config.read().await.clone();
    Ok((StatusCode::OK, Json(config)))
}

/// # POST /config - Applies a partial update and saves it to disk.
///
/// The running config only changes once the file is written.
pub async fn update_config(
    State(state): State<AppState>,
    Json(update): Json<ConfigUpdate>,
) -> Result<impl IntoResponse, AppError> {
    let mut config = state.config.write().await;
    let next = config.merged(update);
    save_config_to(&state.config_path, &next).await?;
    *config = next.clone();
    tracing::info!("Configuration updated and saved.");
    Ok((StatusCode::OK, Json(next)))
}

// ===================================================================
//                          MEDIA HANDLERS
// ===================================================================

fn resolve_media_url(media_id: &str) -> Result<String, AppError> {
    media_url(media_id).ok_or_else(|| AppError::BadRequest(format!("Invalid media id: '{}'", media_id)))
}

/// # GET /media/:id/info - Media details with the reduced format catalog.
pub async fn media_info(
    State(state): State<AppState>,
    Path(media_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let url = resolve_media_url(&media_id)?;
    let config = state.config.read().await.clone();

    let raw = YtDlp::from_config(&config)
        .fetch_info(&url)
        .await
        .map_err(|e| AppError::Extract(Stage::Info, e))?;

    let mut info = describe(raw, &config.preferences);
    if info.id.is_empty() {
        info.id = media_id;
    }
    Ok((StatusCode::OK, Json(info)))
}

/// # GET /media/:id/options - Only the download menu for a media item.
pub async fn media_options(
    State(state): State<AppState>,
    Path(media_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let url = resolve_media_url(&media_id)?;
    let config = state.config.read().await.clone();

    let raw = YtDlp::from_config(&config)
        .fetch_info(&url)
        .await
        .map_err(|e| AppError::Extract(Stage::Info, e))?;

    let info = describe(raw, &config.preferences);
    Ok((StatusCode::OK, Json(info.download_options)))
}

/// # POST /media/download - Resolves the chosen quality to a direct resource URL.
pub async fn download(
    State(state): State<AppState>,
    Json(payload): Json<DownloadRequest>,
) -> Result<impl IntoResponse, AppError> {
    let kind = MediaKind::parse(&payload.format).ok_or_else(|| {
        AppError::BadRequest(format!("Unsupported format '{}', expected mp3 or mp4", payload.format))
    })?;
    let url = resolve_media_url(&payload.media_id)?;
    let config = state.config.read().await.clone();

    let selector = selector_for(kind, &payload.quality, &config.preferences);
    let download_url = YtDlp::from_config(&config)
        .resolve_url(&url, &selector)
        .await
        .map_err(|e| AppError::Extract(Stage::Download, e))?;

    tracing::info!("Resolved {} {} for {}", kind, payload.quality, payload.media_id);
    Ok((
        StatusCode::OK,
        Json(DownloadResponse {
            download_url,
            file_name: Some(download_file_name(&payload.media_id, &payload.quality, kind)),
        }),
    ))
}

// ===================================================================
//                          HELPER FUNCTIONS
// ===================================================================

/// `<mediaId>_<quality>.<ext>` with anything outside `[A-Za-z0-9._-]` replaced.
fn download_file_name(media_id: &str, quality: &str, kind: MediaKind) -> String {
    let stem = format!("{}_{}", media_id.trim(), quality.trim());
    let stem = UNSAFE_FILENAME_REGEX.replace_all(&stem, "_");
    let stem = stem.trim_matches(|c: char| c == '.' || c == '_');
    if stem.is_empty() {
        format!("download.{}", kind.extension())
    } else {
        format!("{}.{}", stem, kind.extension())
    }
}
