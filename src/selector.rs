//! Maps a chosen (kind, quality tier) pair to a yt-dlp `-f` selector.
//!
//! Selectors are `/`-separated fallback chains; yt-dlp takes the first
//! expression that matches any available format.

use crate::config::FormatPreferences;
use crate::models::MediaKind;

const DEFAULT_AUDIO: &str = "bestaudio";
const DEFAULT_VIDEO: &str = "best[ext=mp4]/best";

fn audio_selector(cap_kbps: Option<u32>) -> String {
    match cap_kbps {
        None => "bestaudio[ext=m4a]/bestaudio[ext=mp3]/bestaudio".to_string(),
        Some(cap) => format!(
            "bestaudio[ext=m4a][abr<={cap}]/bestaudio[ext=mp3][abr<={cap}]/bestaudio[abr<={cap}]/bestaudio"
        ),
    }
}

fn video_selector(height: u32) -> String {
    format!(
        "bestvideo[ext=mp4][height<={height}]+bestaudio[ext=m4a]/best[ext=mp4][height<={height}]/best[height<={height}]"
    )
}

/// Returns the selector for `quality`. Never fails: tiers outside the
/// configured vocabulary map to a generic best-of selector.
pub fn selector_for(kind: MediaKind, quality: &str, prefs: &FormatPreferences) -> String {
    let quality = quality.trim();
    match kind {
        MediaKind::Audio => {
            let tiers = prefs.audio_tiers();
            let top = tiers.iter().copied().max().unwrap_or(prefs.high_tier_kbps);
            match tiers
                .iter()
                .copied()
                .find(|kbps| FormatPreferences::audio_tier(*kbps).eq_ignore_ascii_case(quality))
            {
                Some(kbps) if kbps == top => audio_selector(None),
                Some(kbps) => audio_selector(Some(kbps)),
                None => DEFAULT_AUDIO.to_string(),
            }
        }
        MediaKind::Video => prefs
            .option_heights
            .iter()
            .copied()
            .find(|h| FormatPreferences::video_tier(*h).eq_ignore_ascii_case(quality))
            .map(video_selector)
            .unwrap_or_else(|| DEFAULT_VIDEO.to_string()),
    }
}
