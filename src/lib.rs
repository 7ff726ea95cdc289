//! Format selection for a yt-dlp backed music service.
//!
//! The pure core lives in [`formats`] (catalog reduction), [`options`]
//! (download menu) and [`selector`] (quality to yt-dlp selector). The
//! [`extractor`] and [`handlers`] modules wrap it with process and HTTP I/O.

use axum::{
    routing::{get, post},
    Router,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};

use crate::config::{Config, FormatPreferences};
use crate::models::{MediaInfo, RawMediaInfo};

// --- Modules ---
pub mod config;
pub mod error;
pub mod extractor;
pub mod formats;
pub mod handlers;
pub mod models;
pub mod options;
pub mod selector;

// --- State Type Aliases ---
pub type ConfigState = Arc<RwLock<Config>>;

#[derive(Clone)]
pub struct AppState {
    pub config: ConfigState,
    /// File that `POST /config` writes to.
    pub config_path: Arc<PathBuf>,
}

impl AppState {
    pub fn new(config: Config, config_path: PathBuf) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            config_path: Arc::new(config_path),
        }
    }
}

/// Builds the HTTP API.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/media/:id/info", get(handlers::media_info))
        .route("/media/:id/options", get(handlers::media_options))
        .route("/media/download", post(handlers::download))
        .route("/config", get(handlers::get_config).post(handlers::update_config))
        .layer(CorsLayer::new().allow_origin(Any).allow_headers(Any).allow_methods(Any))
        .with_state(state)
}

/// Reduces a yt-dlp info dump into the client-facing media description.
pub fn media_info(raw: RawMediaInfo, prefs: &FormatPreferences) -> MediaInfo {
    let formats = formats::reduce_formats(&raw.formats, prefs);
    let default_audio = formats::default_audio(&formats).cloned();
    let download_options = options::present_options(&formats, prefs);

    MediaInfo {
        channel: raw.channel_name(),
        thumbnail: raw.thumbnail_url(),
        id: raw.id,
        title: raw.title,
        description: raw.description,
        duration: raw.duration,
        formats,
        default_audio,
        download_options,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MediaKind;

    #[test]
    fn media_info_combines_catalog_and_menu() {
        let raw: RawMediaInfo = serde_json::from_str(
            r#"{
                "id": "abc",
                "title": "Track",
                "channel": "Artist",
                "duration": 215,
                "thumbnail": "https://i/t.jpg",
                "formats": [
                    {"format_id": "140", "ext": "m4a", "vcodec": "none", "acodec": "mp4a.40.2", "abr": 129.5, "url": "https://a"},
                    {"format_id": "251", "ext": "webm", "vcodec": "none", "acodec": "opus", "abr": 135.0, "url": "https://o"},
                    {"format_id": "18", "ext": "mp4", "vcodec": "avc1.42001E", "acodec": "mp4a.40.2", "width": 640, "height": 360, "url": "https://v"},
                    {"format_id": "sb0", "ext": "mhtml", "vcodec": "none", "acodec": "none", "url": "https://s"}
                ]
            }"#,
        )
        .unwrap();

        let info = media_info(raw, &FormatPreferences::default());

        assert_eq!(info.channel.as_deref(), Some("Artist"));
        assert_eq!(info.duration, Some(215.0));
        let ids: Vec<&str> = info.formats.iter().map(|f| f.format_id.as_str()).collect();
        assert_eq!(ids, vec!["140", "18"]);
        assert_eq!(info.default_audio.as_ref().map(|f| f.format_id.as_str()), Some("140"));
        assert_eq!(info.download_options[0].label, "MP3 – Standard (~130kbps)");
        assert_eq!(
            info.download_options.iter().filter(|o| o.format == MediaKind::Video).count(),
            3
        );
    }

    #[test]
    fn media_info_without_formats_still_offers_a_menu() {
        let raw: RawMediaInfo = serde_json::from_str(r#"{"id": "abc", "title": "Track"}"#).unwrap();

        let info = media_info(raw, &FormatPreferences::default());

        assert!(info.formats.is_empty());
        assert!(info.default_audio.is_none());
        assert_eq!(info.download_options[0].label, "MP3 – 128kbps");
    }

    #[test]
    fn media_info_serializes_camel_case() {
        let raw: RawMediaInfo = serde_json::from_str(r#"{"id": "abc", "title": "Track"}"#).unwrap();
        let json = serde_json::to_value(media_info(raw, &FormatPreferences::default())).unwrap();

        assert!(json.get("downloadOptions").is_some());
        assert!(json.get("defaultAudio").is_some());
        assert_eq!(json["downloadOptions"][0]["format"], "mp3");
    }
}
