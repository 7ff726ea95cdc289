//! Builds the download menu shown for a media item: up to three MP3 options
//! derived from the best audio stream and one MP4 option per offered height.

use crate::config::FormatPreferences;
use crate::formats::{sort_catalog, to_representative};
use crate::models::{DownloadOption, MediaKind, RawFormat, RepresentativeFormat};

fn height_class(height: u32) -> &'static str {
    match height {
        0..=719 => "SD",
        720..=1079 => "HD",
        1080..=1439 => "Full HD",
        1440..=2159 => "QHD",
        _ => "4K",
    }
}

fn audio_option(label: String, tier_kbps: u32, source: Option<&RepresentativeFormat>) -> DownloadOption {
    DownloadOption {
        label,
        format: MediaKind::Audio,
        quality: FormatPreferences::audio_tier(tier_kbps),
        estimated_size: source.and_then(|f| f.filesize),
        source_format: source.cloned(),
    }
}

fn audio_options(catalog: &[RepresentativeFormat], prefs: &FormatPreferences) -> Vec<DownloadOption> {
    let mut audio: Vec<&RepresentativeFormat> = catalog.iter().filter(|f| f.is_audio()).collect();
    audio.sort_by(|a, b| b.bitrate().total_cmp(&a.bitrate()));

    let Some(best) = audio.first().copied() else {
        return vec![audio_option(
            format!("MP3 – {}kbps", prefs.standard_tier_kbps),
            prefs.standard_tier_kbps,
            None,
        )];
    };

    let bitrate = best.bitrate();
    let shown = bitrate.round() as u64;
    let mut options = Vec::new();

    if bitrate >= prefs.high_threshold_kbps {
        options.push(audio_option(
            format!("MP3 – High (~{}kbps)", shown),
            prefs.high_tier_kbps,
            Some(best),
        ));
    }
    if bitrate >= prefs.medium_threshold_kbps {
        options.push(audio_option(
            format!("MP3 – Medium (~{}kbps)", shown),
            prefs.medium_tier_kbps,
            Some(best),
        ));
    }

    let standard = if bitrate > 0.0 {
        shown
    } else {
        u64::from(prefs.standard_tier_kbps)
    };
    options.push(audio_option(
        format!("MP3 – Standard (~{}kbps)", standard),
        prefs.standard_tier_kbps,
        Some(best),
    ));

    options
}

fn video_options(catalog: &[RepresentativeFormat], prefs: &FormatPreferences) -> Vec<DownloadOption> {
    let mut heights = prefs.option_heights.clone();
    heights.sort_unstable();
    heights.dedup();

    heights
        .into_iter()
        .map(|height| {
            let source = catalog
                .iter()
                .find(|f| !f.is_audio() && f.ext == "mp4" && f.resolution_height() == height);
            DownloadOption {
                label: format!("MP4 – {} {}p", height_class(height), height),
                format: MediaKind::Video,
                quality: FormatPreferences::video_tier(height),
                estimated_size: source.and_then(|f| f.filesize),
                source_format: source.cloned(),
            }
        })
        .collect()
}

/// Adds `option` unless its (kind, tier) pair is already present. A label that
/// clashes with a different tier is kept and suffixed with its tier.
fn push_option(out: &mut Vec<DownloadOption>, mut option: DownloadOption) {
    if out
        .iter()
        .any(|o| o.format == option.format && o.quality == option.quality)
    {
        return;
    }
    if out.iter().any(|o| o.label == option.label) {
        tracing::warn!(
            "Download option label '{}' is shared by {} {} and another tier",
            option.label,
            option.format,
            option.quality
        );
        option.label = format!("{} [{}]", option.label, option.quality);
    }
    out.push(option);
}

/// Builds the download menu from a reduced catalog.
///
/// Every configured video height is offered even without a matching mp4
/// stream; those options carry no source format and are resolved at download
/// time through the selector fallbacks.
pub fn present_options(catalog: &[RepresentativeFormat], prefs: &FormatPreferences) -> Vec<DownloadOption> {
    let mut out = Vec::new();
    for option in audio_options(catalog, prefs)
        .into_iter()
        .chain(video_options(catalog, prefs))
    {
        push_option(&mut out, option);
    }

    // Audio is emitted first already; keep it that way if emission order ever changes.
    out.sort_by_key(|o| o.format != MediaKind::Audio);
    out
}

/// Builds the download menu straight from raw yt-dlp formats.
pub fn present_raw(raw: &[RawFormat], prefs: &FormatPreferences) -> Vec<DownloadOption> {
    let mut normalized: Vec<RepresentativeFormat> = raw.iter().filter_map(to_representative).collect();
    sort_catalog(&mut normalized);
    present_options(&normalized, prefs)
}
