use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

// === yt-dlp Output Models ===

/// Represents the top-level JSON output from `yt-dlp --dump-single-json`.
///
/// Only the fields the service reads are modelled; everything else in the
/// document is ignored. A missing `formats` list is treated as empty.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct RawMediaInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub duration: Option<f64>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub thumbnails: Vec<Thumbnail>,
    #[serde(default)]
    pub formats: Vec<RawFormat>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Thumbnail {
    pub url: String,
}

impl RawMediaInfo {
    /// Channel name, falling back to the uploader.
    pub fn channel_name(&self) -> Option<String> {
        self.channel.clone().or_else(|| self.uploader.clone())
    }

    /// The single thumbnail URL, falling back to the last (largest) listed one.
    pub fn thumbnail_url(&self) -> Option<String> {
        self.thumbnail
            .clone()
            .or_else(|| self.thumbnails.last().map(|t| t.url.clone()))
    }
}

/// A single format as enumerated by yt-dlp.
///
/// Numeric fields accept integers, floats or `null`; anything else is read as
/// absent rather than failing the whole document.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct RawFormat {
    #[serde(default)]
    pub format_id: String,
    #[serde(default)]
    pub ext: String,
    #[serde(default)]
    pub vcodec: Option<String>,
    #[serde(default)]
    pub acodec: Option<String>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub height: Option<u32>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub width: Option<u32>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub fps: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub abr: Option<f64>, // Audio bitrate in KBit/s
    #[serde(default, deserialize_with = "lenient_f64")]
    pub vbr: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub tbr: Option<f64>, // Total Bitrate in KBit/s
    #[serde(default, deserialize_with = "lenient_u64")]
    pub filesize: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub filesize_approx: Option<u64>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub format_note: Option<String>,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub container: Option<String>,
    #[serde(default)]
    pub resolution: Option<String>,
}

/// yt-dlp reports "no stream" as either a missing field or the literal `none`.
pub fn usable_codec(codec: &Option<String>) -> Option<&str> {
    codec
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty() && !c.eq_ignore_ascii_case("none"))
}

impl RawFormat {
    pub fn video_codec(&self) -> Option<&str> {
        usable_codec(&self.vcodec)
    }

    pub fn audio_codec(&self) -> Option<&str> {
        usable_codec(&self.acodec)
    }

    pub fn is_audio_only(&self) -> bool {
        self.audio_codec().is_some() && self.video_codec().is_none()
    }

    pub fn is_video_with_audio(&self) -> bool {
        self.audio_codec().is_some() && self.video_codec().is_some()
    }
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }))
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_number(deserializer)?.filter(|n| n.is_finite()))
}

fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_number(deserializer)?
        .filter(|n| n.is_finite() && *n >= 0.0 && *n <= u32::MAX as f64)
        .map(|n| n.round() as u32))
}

fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_number(deserializer)?
        .filter(|n| n.is_finite() && *n >= 0.0)
        .map(|n| n.round() as u64))
}

// === Core Output Models ===

/// Audio-only or muxed video+audio.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FormatCategory {
    Audio,
    Video,
}

/// A normalized format chosen to represent one quality bucket of a media item.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RepresentativeFormat {
    pub format_id: String,
    pub category: FormatCategory,
    pub ext: String,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
    pub height: Option<u32>,
    pub width: Option<u32>,
    pub fps: Option<f64>,
    pub abr: Option<f64>,
    pub vbr: Option<f64>,
    pub tbr: Option<f64>,
    pub filesize: Option<u64>,
    pub url: String,
    pub format_note: Option<String>,
    pub protocol: Option<String>,
    pub container: Option<String>,
    pub resolution: Option<String>,
    pub quality_label: String,
    pub signature: String,
}

impl RepresentativeFormat {
    pub fn is_audio(&self) -> bool {
        self.category == FormatCategory::Audio
    }

    /// Audio bitrate in kbps, falling back to the total bitrate; 0 when unknown.
    pub fn bitrate(&self) -> f64 {
        self.abr.or(self.tbr).unwrap_or(0.0)
    }

    /// Height parsed from the `WIDTHxHEIGHT` resolution, else the height field, else 0.
    pub fn resolution_height(&self) -> u32 {
        self.resolution
            .as_deref()
            .and_then(parse_resolution_height)
            .or(self.height)
            .unwrap_or(0)
    }
}

/// Parses the height out of a `WIDTHxHEIGHT` string.
pub fn parse_resolution_height(resolution: &str) -> Option<u32> {
    let (width, height) = resolution.trim().split_once('x')?;
    width.trim().parse::<u32>().ok()?;
    height.trim().parse::<u32>().ok()
}

/// The user-facing kind of a download, named after its container format.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    #[serde(rename = "mp3")]
    Audio,
    #[serde(rename = "mp4")]
    Video,
}

impl MediaKind {
    pub fn extension(&self) -> &'static str {
        match self {
            MediaKind::Audio => "mp3",
            MediaKind::Video => "mp4",
        }
    }

    /// Accepts the container names as well as the plain kind names.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mp3" | "audio" => Some(MediaKind::Audio),
            "mp4" | "video" => Some(MediaKind::Video),
            _ => None,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// One entry in the download menu.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DownloadOption {
    pub label: String,
    pub format: MediaKind,
    pub quality: String,
    pub estimated_size: Option<u64>,
    pub source_format: Option<RepresentativeFormat>,
}

// === API Request/Response Models ===

/// The response for `GET /media/:id/info`.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct MediaInfo {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub duration: Option<f64>,
    pub channel: Option<String>,
    pub thumbnail: Option<String>,
    pub formats: Vec<RepresentativeFormat>,
    pub default_audio: Option<RepresentativeFormat>,
    pub download_options: Vec<DownloadOption>,
}

/// The JSON body for a `POST /media/download` request.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRequest {
    pub media_id: String,
    pub format: String,
    pub quality: String,
}

/// The response sent after a download URL was resolved.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResponse {
    pub download_url: String,
    pub file_name: Option<String>,
}
