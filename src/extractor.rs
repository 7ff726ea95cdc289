use crate::config::Config;
use crate::models::RawMediaInfo;
use once_cell::sync::Lazy;
use regex::Regex;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

static MEDIA_ID_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").unwrap());
static YOUTUBE_URL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://(?:(?:www|m|music)\.)?(?:youtube\.com|youtu\.be)(?:[/?#][^\s@]*)?$").unwrap()
});

/// Failures of a yt-dlp invocation.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to start yt-dlp: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("yt-dlp did not finish within {0:?}")]
    Timeout(Duration),

    #[error("yt-dlp failed: {0}")]
    Tool(String),

    #[error("yt-dlp returned invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Resolve mode produced no usable URL.
    #[error("yt-dlp did not return a URL: {0:?}")]
    Unresolved(String),
}

impl ExtractError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ExtractError::Timeout(_))
    }
}

/// Turns a media identifier into the URL handed to yt-dlp.
///
/// YouTube URLs pass through; bare ids are treated as YouTube video ids.
/// Any other host is refused.
pub fn media_url(media_id: &str) -> Option<String> {
    let media_id = media_id.trim();
    if media_id.starts_with("https://") || media_id.starts_with("http://") {
        return YOUTUBE_URL_REGEX.is_match(media_id).then(|| media_id.to_string());
    }
    MEDIA_ID_REGEX
        .is_match(media_id)
        .then(|| format!("https://www.youtube.com/watch?v={}", media_id))
}

/// Extracts the resource URL from resolve-mode output.
///
/// Merged selectors print one URL per stream; the first one is the primary stream.
pub fn parse_resolved_url(stdout: &str) -> Result<String, ExtractError> {
    let first = stdout.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
    if first.starts_with("https://") || first.starts_with("http://") {
        Ok(first.to_string())
    } else {
        Err(ExtractError::Unresolved(stdout.trim().to_string()))
    }
}

/// Runs yt-dlp in info and resolve mode with a time budget per call.
#[derive(Debug, Clone)]
pub struct YtDlp {
    binary: String,
    info_timeout: Duration,
    resolve_timeout: Duration,
}

impl YtDlp {
    pub fn new(binary: impl Into<String>, info_timeout: Duration, resolve_timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            info_timeout,
            resolve_timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.ytdlp_path.clone(),
            Duration::from_secs(config.info_timeout_secs),
            Duration::from_secs(config.resolve_timeout_secs),
        )
    }

    async fn run(&self, args: &[&str], limit: Duration) -> Result<Vec<u8>, ExtractError> {
        let child = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = tokio::time::timeout(limit, child.wait_with_output())
            .await
            .map_err(|_| ExtractError::Timeout(limit))??;

        if !output.status.success() {
            let error_message = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(ExtractError::Tool(error_message));
        }
        Ok(output.stdout)
    }

    /// `--dump-single-json` for one media item.
    pub async fn fetch_info(&self, url: &str) -> Result<RawMediaInfo, ExtractError> {
        tracing::info!("Fetching info for {}", url);
        let stdout = self
            .run(
                &[
                    "--dump-single-json",
                    "--no-playlist",
                    "--no-warnings",
                    "--skip-download",
                    url,
                ],
                self.info_timeout,
            )
            .await?;

        let info: RawMediaInfo = serde_json::from_slice(&stdout)?;
        tracing::info!("Fetched {} formats for '{}'", info.formats.len(), info.title);
        Ok(info)
    }

    /// `-g -f <selector>`: resolves the selector to a single resource URL.
    pub async fn resolve_url(&self, url: &str, selector: &str) -> Result<String, ExtractError> {
        tracing::info!("Resolving {} with selector {}", url, selector);
        let stdout = self
            .run(
                &["-g", "-f", selector, "--no-playlist", "--no-warnings", url],
                self.resolve_timeout,
            )
            .await?;
        parse_resolved_url(&String::from_utf8_lossy(&stdout))
    }
}
