use anyhow::{anyhow, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// The structure of our configuration file (config.toml)
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Path or name of the yt-dlp executable.
    pub ytdlp_path: String,
    /// Upper bound for an info (`--dump-single-json`) call.
    pub info_timeout_secs: u64,
    /// Upper bound for a resolve (`-g`) call.
    pub resolve_timeout_secs: u64,
    pub preferences: FormatPreferences,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ytdlp_path: "yt-dlp".to_string(),
            info_timeout_secs: 60,
            resolve_timeout_secs: 30,
            preferences: FormatPreferences::default(),
        }
    }
}

/// Tiers and thresholds that drive format reduction, the download menu and
/// selector mapping.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct FormatPreferences {
    /// Heights the catalog keeps one muxed format for.
    pub catalog_heights: Vec<u32>,
    /// Heights offered in the download menu.
    pub option_heights: Vec<u32>,
    /// An Opus pick is only kept next to an AAC pick if their bitrates differ by more than this.
    pub opus_distinct_kbps: f64,
    /// Best audio at or above this bitrate unlocks the "High" option.
    pub high_threshold_kbps: f64,
    /// Best audio at or above this bitrate unlocks the "Medium" option.
    pub medium_threshold_kbps: f64,
    pub high_tier_kbps: u32,
    pub medium_tier_kbps: u32,
    pub standard_tier_kbps: u32,
}

impl Default for FormatPreferences {
    fn default() -> Self {
        FormatPreferences {
            catalog_heights: vec![360, 480, 720, 1080],
            option_heights: vec![360, 720, 1080],
            opus_distinct_kbps: 32.0,
            high_threshold_kbps: 256.0,
            medium_threshold_kbps: 190.0,
            high_tier_kbps: 320,
            medium_tier_kbps: 192,
            standard_tier_kbps: 128,
        }
    }
}

impl FormatPreferences {
    pub fn audio_tier(kbps: u32) -> String {
        format!("{}kbps", kbps)
    }

    pub fn video_tier(height: u32) -> String {
        format!("{}p", height)
    }

    /// The audio tier vocabulary, highest first.
    pub fn audio_tiers(&self) -> [u32; 3] {
        [self.high_tier_kbps, self.medium_tier_kbps, self.standard_tier_kbps]
    }
}

/// Fields a client may change through `POST /config`. Absent fields keep
/// their current value. The yt-dlp executable is only set in the file.
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigUpdate {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub info_timeout_secs: Option<u64>,
    pub resolve_timeout_secs: Option<u64>,
    pub preferences: Option<PreferencesUpdate>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PreferencesUpdate {
    pub catalog_heights: Option<Vec<u32>>,
    pub option_heights: Option<Vec<u32>>,
    pub opus_distinct_kbps: Option<f64>,
    pub high_threshold_kbps: Option<f64>,
    pub medium_threshold_kbps: Option<f64>,
    pub high_tier_kbps: Option<u32>,
    pub medium_tier_kbps: Option<u32>,
    pub standard_tier_kbps: Option<u32>,
}

impl Config {
    /// Returns a copy of `self` with the fields present in `update` replaced.
    pub fn merged(&self, update: ConfigUpdate) -> Config {
        let mut next = self.clone();
        if let Some(host) = update.host {
            next.host = host;
        }
        if let Some(port) = update.port {
            next.port = port;
        }
        if let Some(secs) = update.info_timeout_secs {
            next.info_timeout_secs = secs;
        }
        if let Some(secs) = update.resolve_timeout_secs {
            next.resolve_timeout_secs = secs;
        }
        if let Some(prefs) = update.preferences {
            let p = &mut next.preferences;
            p.catalog_heights = prefs.catalog_heights.unwrap_or_else(|| p.catalog_heights.clone());
            p.option_heights = prefs.option_heights.unwrap_or_else(|| p.option_heights.clone());
            p.opus_distinct_kbps = prefs.opus_distinct_kbps.unwrap_or(p.opus_distinct_kbps);
            p.high_threshold_kbps = prefs.high_threshold_kbps.unwrap_or(p.high_threshold_kbps);
            p.medium_threshold_kbps = prefs.medium_threshold_kbps.unwrap_or(p.medium_threshold_kbps);
            p.high_tier_kbps = prefs.high_tier_kbps.unwrap_or(p.high_tier_kbps);
            p.medium_tier_kbps = prefs.medium_tier_kbps.unwrap_or(p.medium_tier_kbps);
            p.standard_tier_kbps = prefs.standard_tier_kbps.unwrap_or(p.standard_tier_kbps);
        }
        next
    }
}

/// Returns the cross-platform path to the configuration file, creating the directory if needed.
pub async fn config_path() -> Result<PathBuf> {
    let project_dirs = ProjectDirs::from("com", "Tunepick", "tunepick")
        .ok_or_else(|| anyhow!("Could not find a valid home directory to store config"))?;

    let config_dir = project_dirs.config_dir();
    fs::create_dir_all(config_dir).await?;

    Ok(config_dir.join("config.toml"))
}

/// Loads the configuration from the file, or creates a default one if it doesn't exist.
pub async fn load_config() -> Result<Config> {
    let config_path = config_path().await?;
    load_config_from(&config_path).await
}

pub async fn load_config_from(config_path: &Path) -> Result<Config> {
    if !config_path.exists() {
        tracing::info!(
            "No config file found. Creating a default one at: {}",
            config_path.display()
        );
        let default_config = Config::default();
        save_config_to(config_path, &default_config).await?;
        return Ok(default_config);
    }

    let config_content = fs::read_to_string(config_path).await?;
    let config: Config = toml::from_str(&config_content)
        .map_err(|e| anyhow!("Failed to parse config file at {}: {}", config_path.display(), e))?;

    Ok(config)
}

pub async fn save_config_to(config_path: &Path, config: &Config) -> Result<()> {
    let toml_string = toml::to_string_pretty(config)?;
    fs::write(config_path, toml_string).await?;
    Ok(())
}

/// Applies `HOST` / `PORT` environment overrides.
pub fn apply_env_overrides(config: &mut Config) {
    if let Ok(host) = std::env::var("HOST") {
        config.host = host;
    }
    if let Ok(port) = std::env::var("PORT") {
        match port.parse() {
            Ok(port) => config.port = port,
            Err(_) => tracing::warn!("Ignoring invalid PORT value: {}", port),
        }
    }
}
