//! Reduces the raw yt-dlp format list of one media item into a small,
//! deduplicated catalog: the best AAC and/or Opus audio stream and one muxed
//! video stream per target height.

use crate::config::FormatPreferences;
use crate::models::{parse_resolution_height, FormatCategory, RawFormat, RepresentativeFormat};
use std::collections::HashSet;

/// Audio bitrate in kbps, falling back to the total bitrate; 0 when unknown.
pub(crate) fn raw_bitrate(f: &RawFormat) -> f64 {
    f.abr.or(f.tbr).unwrap_or(0.0)
}

fn raw_height(f: &RawFormat) -> u32 {
    f.height
        .or_else(|| f.resolution.as_deref().and_then(parse_resolution_height))
        .unwrap_or(0)
}

fn bitrate_key(bitrate: f64) -> String {
    if bitrate > 0.0 {
        format!("{}", bitrate.round() as u64)
    } else {
        "best".to_string()
    }
}

fn has_prefix(codec: Option<&str>, prefix: &str) -> bool {
    codec.map_or(false, |c| c.to_ascii_lowercase().starts_with(prefix))
}

fn is_aac(f: &RawFormat) -> bool {
    f.ext.eq_ignore_ascii_case("m4a") && has_prefix(f.audio_codec(), "mp4a")
}

fn is_opus(f: &RawFormat) -> bool {
    f.ext.eq_ignore_ascii_case("opus")
        || (f.ext.eq_ignore_ascii_case("webm") && has_prefix(f.audio_codec(), "opus"))
}

fn quality_label(f: &RawFormat, category: FormatCategory) -> String {
    let note = f
        .format_note
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());
    match category {
        FormatCategory::Audio => {
            let bitrate = raw_bitrate(f);
            if bitrate > 0.0 {
                format!("{}kbps", bitrate.round() as u64)
            } else {
                note.unwrap_or("Unknown").to_string()
            }
        }
        FormatCategory::Video => match raw_height(f) {
            0 => note.unwrap_or("Unknown").to_string(),
            h => format!("{}p", h),
        },
    }
}

fn normalized_resolution(f: &RawFormat) -> Option<String> {
    match (f.width, f.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => Some(format!("{}x{}", w, h)),
        _ => f
            .resolution
            .as_deref()
            .filter(|r| parse_resolution_height(r).is_some())
            .map(|r| r.trim().to_string()),
    }
}

/// Normalizes a raw format. Returns `None` for formats with neither a usable
/// audio nor a usable video codec, and for video-only formats.
pub fn to_representative(f: &RawFormat) -> Option<RepresentativeFormat> {
    let category = if f.is_audio_only() {
        FormatCategory::Audio
    } else if f.is_video_with_audio() {
        FormatCategory::Video
    } else {
        return None;
    };

    let resolution = normalized_resolution(f);
    let quality_label = quality_label(f, category);
    let ext = f.ext.to_ascii_lowercase();
    let signature = match category {
        FormatCategory::Audio => format!("audio_{}_{}", ext, bitrate_key(raw_bitrate(f))),
        FormatCategory::Video => format!(
            "video_{}_{}",
            ext,
            resolution.clone().unwrap_or_else(|| quality_label.clone())
        ),
    };

    Some(RepresentativeFormat {
        format_id: f.format_id.clone(),
        category,
        ext,
        video_codec: f.video_codec().map(str::to_string),
        audio_codec: f.audio_codec().map(str::to_string),
        height: f.height,
        width: f.width,
        fps: f.fps,
        abr: f.abr,
        vbr: f.vbr,
        tbr: f.tbr,
        filesize: f.filesize.or(f.filesize_approx),
        url: f.url.clone(),
        format_note: f.format_note.clone(),
        protocol: f.protocol.clone(),
        container: f.container.clone(),
        resolution,
        quality_label,
        signature,
    })
}

fn is_mp4(f: &RawFormat) -> bool {
    f.ext.eq_ignore_ascii_case("mp4")
}

fn is_webm(f: &RawFormat) -> bool {
    f.ext.eq_ignore_ascii_case("webm")
}

fn audio_pick(f: &RawFormat, family: &str, suffix: &str) -> Option<RepresentativeFormat> {
    let mut rep = to_representative(f)?;
    rep.quality_label = format!("{} ({})", rep.quality_label, suffix);
    rep.signature = format!("audio_{}_{}", family, bitrate_key(raw_bitrate(f)));
    Some(rep)
}

/// Picks the format for one target height, preferring H.264/AAC in mp4, then
/// any mp4, then VP9 with Opus/Vorbis in webm, then anything.
fn pick_for_height<'a>(sorted: &[&'a RawFormat], height: u32) -> Option<&'a RawFormat> {
    let at_height: Vec<&RawFormat> = sorted
        .iter()
        .copied()
        .filter(|f| raw_height(f) == height)
        .collect();

    at_height
        .iter()
        .find(|f| {
            is_mp4(f) && has_prefix(f.video_codec(), "avc1") && has_prefix(f.audio_codec(), "mp4a")
        })
        .or_else(|| at_height.iter().find(|f| is_mp4(f)))
        .or_else(|| {
            at_height.iter().find(|f| {
                is_webm(f)
                    && (has_prefix(f.video_codec(), "vp9") || has_prefix(f.video_codec(), "vp09"))
                    && (has_prefix(f.audio_codec(), "opus") || has_prefix(f.audio_codec(), "vorbis"))
            })
        })
        .or_else(|| at_height.first())
        .copied()
}

fn push_unique(
    seen: &mut HashSet<String>,
    out: &mut Vec<RepresentativeFormat>,
    rep: RepresentativeFormat,
) -> bool {
    if seen.insert(rep.signature.clone()) {
        out.push(rep);
        true
    } else {
        false
    }
}

fn reduce_audio(
    audio: &[&RawFormat],
    prefs: &FormatPreferences,
    seen: &mut HashSet<String>,
    out: &mut Vec<RepresentativeFormat>,
) {
    let mut added = false;
    let aac = audio.iter().find(|f| is_aac(f));
    if let Some(rep) = aac.and_then(|f| audio_pick(f, "m4a", "AAC")) {
        added |= push_unique(seen, out, rep);
    }

    if let Some(opus) = audio.iter().find(|f| is_opus(f)) {
        let distinct = aac.map_or(true, |a| {
            (raw_bitrate(opus) - raw_bitrate(a)).abs() > prefs.opus_distinct_kbps
        });
        if distinct {
            if let Some(rep) = audio_pick(opus, "opus", "Opus") {
                added |= push_unique(seen, out, rep);
            }
        }
    }

    if !added {
        if let Some(rep) = audio.first().and_then(|f| to_representative(f)) {
            push_unique(seen, out, rep);
        }
    }
}

fn reduce_video(
    video: &[&RawFormat],
    prefs: &FormatPreferences,
    seen: &mut HashSet<String>,
    out: &mut Vec<RepresentativeFormat>,
) {
    let mut heights = prefs.catalog_heights.clone();
    heights.sort_unstable();
    heights.dedup();

    let mut added = false;
    for height in heights {
        if let Some(rep) = pick_for_height(video, height).and_then(to_representative) {
            added |= push_unique(seen, out, rep);
        }
    }

    if !added {
        if let Some(rep) = video.first().and_then(|f| to_representative(f)) {
            push_unique(seen, out, rep);
        }
    }
}

/// Reduces a raw format list into the ordered representative catalog.
///
/// Audio entries come first (highest bitrate first), followed by video
/// entries in ascending height. No two entries share a signature.
pub fn reduce_formats(raw: &[RawFormat], prefs: &FormatPreferences) -> Vec<RepresentativeFormat> {
    let mut audio: Vec<&RawFormat> = raw.iter().filter(|f| f.is_audio_only()).collect();
    let mut video: Vec<&RawFormat> = raw.iter().filter(|f| f.is_video_with_audio()).collect();

    audio.sort_by(|a, b| raw_bitrate(b).total_cmp(&raw_bitrate(a)));
    video.sort_by(|a, b| {
        raw_height(b)
            .cmp(&raw_height(a))
            .then_with(|| b.fps.unwrap_or(0.0).total_cmp(&a.fps.unwrap_or(0.0)))
            .then_with(|| b.tbr.unwrap_or(0.0).total_cmp(&a.tbr.unwrap_or(0.0)))
    });

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    reduce_audio(&audio, prefs, &mut seen, &mut out);
    reduce_video(&video, prefs, &mut seen, &mut out);

    sort_catalog(&mut out);
    out
}

/// Audio before video; audio by descending bitrate, video by ascending height.
pub(crate) fn sort_catalog(formats: &mut [RepresentativeFormat]) {
    formats.sort_by(|a, b| match (a.is_audio(), b.is_audio()) {
        (true, false) => std::cmp::Ordering::Less,
        (false, true) => std::cmp::Ordering::Greater,
        (true, true) => b.bitrate().total_cmp(&a.bitrate()),
        (false, false) => a.resolution_height().cmp(&b.resolution_height()),
    });
}

/// The audio entry used for playback: the first audio entry of a reduced catalog.
pub fn default_audio(catalog: &[RepresentativeFormat]) -> Option<&RepresentativeFormat> {
    catalog.iter().find(|f| f.is_audio())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audio(id: &str, ext: &str, acodec: &str, abr: Option<f64>) -> RawFormat {
        RawFormat {
            format_id: id.to_string(),
            ext: ext.to_string(),
            vcodec: Some("none".to_string()),
            acodec: Some(acodec.to_string()),
            abr,
            url: format!("https://media.example/{}", id),
            ..Default::default()
        }
    }

    fn video(id: &str, ext: &str, vcodec: &str, acodec: &str, height: u32, fps: f64) -> RawFormat {
        RawFormat {
            format_id: id.to_string(),
            ext: ext.to_string(),
            vcodec: Some(vcodec.to_string()),
            acodec: Some(acodec.to_string()),
            height: Some(height),
            width: Some(height * 16 / 9),
            fps: Some(fps),
            url: format!("https://media.example/{}", id),
            ..Default::default()
        }
    }

    fn prefs() -> FormatPreferences {
        FormatPreferences::default()
    }

    fn assert_catalog_invariants(catalog: &[RepresentativeFormat]) {
        let signatures: HashSet<&str> = catalog.iter().map(|f| f.signature.as_str()).collect();
        assert_eq!(signatures.len(), catalog.len(), "duplicate signature in {:?}", catalog);

        let first_video = catalog.iter().position(|f| !f.is_audio()).unwrap_or(catalog.len());
        assert!(catalog[first_video..].iter().all(|f| !f.is_audio()));

        let heights: Vec<u32> = catalog[first_video..].iter().map(|f| f.resolution_height()).collect();
        assert!(heights.windows(2).all(|w| w[0] <= w[1]), "heights not ascending: {:?}", heights);
    }

    #[test]
    fn aac_wins_over_close_opus() {
        let raw = vec![
            audio("140", "m4a", "mp4a.40.2", Some(128.0)),
            audio("251", "webm", "opus", Some(160.0)),
            video("22", "mp4", "avc1", "mp4a.40.2", 720, 30.0),
        ];

        let catalog = reduce_formats(&raw, &prefs());

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog[0].format_id, "140");
        assert_eq!(catalog[0].quality_label, "128kbps (AAC)");
        assert_eq!(catalog[0].signature, "audio_m4a_128");
        assert_eq!(catalog[1].format_id, "22");
        assert_eq!(catalog[1].quality_label, "720p");
        assert_catalog_invariants(&catalog);
    }

    #[test]
    fn distant_opus_is_kept_and_sorted_first() {
        let raw = vec![
            audio("140", "m4a", "mp4a.40.2", Some(128.0)),
            audio("251", "webm", "opus", Some(170.0)),
        ];

        let catalog = reduce_formats(&raw, &prefs());

        let ids: Vec<&str> = catalog.iter().map(|f| f.format_id.as_str()).collect();
        assert_eq!(ids, vec!["251", "140"]);
        assert_eq!(catalog[0].quality_label, "170kbps (Opus)");
        assert_eq!(catalog[0].signature, "audio_opus_170");
    }

    #[test]
    fn opus_alone_is_picked() {
        let raw = vec![
            audio("250", "webm", "opus", Some(70.0)),
            audio("251", "webm", "opus", Some(160.0)),
            audio("x", "opus", "opus", None),
        ];

        let catalog = reduce_formats(&raw, &prefs());

        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].format_id, "251");
    }

    #[test]
    fn falls_back_to_best_audio_of_any_kind() {
        let raw = vec![
            audio("mp3-low", "mp3", "mp3", Some(96.0)),
            audio("mp3-high", "mp3", "mp3", Some(256.0)),
        ];

        let catalog = reduce_formats(&raw, &prefs());

        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].format_id, "mp3-high");
        assert_eq!(catalog[0].quality_label, "256kbps");
        assert_eq!(catalog[0].signature, "audio_mp3_256");
    }

    #[test]
    fn missing_bitrate_and_resolution_is_unknown() {
        let raw = vec![
            audio("a", "mp3", "mp3", None),
            RawFormat {
                format_id: "v".to_string(),
                ext: "3gp".to_string(),
                vcodec: Some("mp4v".to_string()),
                acodec: Some("mp4a".to_string()),
                ..Default::default()
            },
        ];

        let catalog = reduce_formats(&raw, &prefs());

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog[0].quality_label, "Unknown");
        assert_eq!(catalog[0].signature, "audio_mp3_best");
        assert_eq!(catalog[1].quality_label, "Unknown");
        assert_eq!(catalog[1].signature, "video_3gp_Unknown");
    }

    #[test]
    fn format_note_labels_when_numbers_missing() {
        let mut f = audio("a", "mp3", "mp3", None);
        f.format_note = Some("medium".to_string());
        assert_eq!(to_representative(&f).unwrap().quality_label, "medium");
    }

    #[test]
    fn empty_and_codecless_inputs() {
        assert!(reduce_formats(&[], &prefs()).is_empty());

        let storyboard = RawFormat {
            format_id: "sb0".to_string(),
            ext: "mhtml".to_string(),
            vcodec: Some("none".to_string()),
            acodec: Some("none".to_string()),
            ..Default::default()
        };
        let video_only = RawFormat {
            format_id: "137".to_string(),
            ext: "mp4".to_string(),
            vcodec: Some("avc1.640028".to_string()),
            acodec: Some("none".to_string()),
            height: Some(1080),
            ..Default::default()
        };
        assert!(reduce_formats(&[storyboard, video_only], &prefs()).is_empty());
    }

    #[test]
    fn one_video_per_tier_with_preference_chain() {
        let raw = vec![
            video("webm360", "webm", "vp9", "opus", 360, 30.0),
            video("mp4-360-h264", "mp4", "avc1.42001E", "mp4a.40.2", 360, 30.0),
            video("mp4-480-other", "mp4", "av01.0.04M.08", "mp4a.40.2", 480, 30.0),
            video("webm480", "webm", "vp9", "opus", 480, 30.0),
            video("webm720-vorbis", "webm", "vp9", "vorbis", 720, 30.0),
            video("mkv720", "mkv", "hevc", "aac", 720, 60.0),
            video("flv1080", "flv", "h264", "aac", 1080, 30.0),
            video("mp4-1440", "mp4", "avc1", "mp4a", 1440, 30.0),
        ];

        let catalog = reduce_formats(&raw, &prefs());

        let ids: Vec<&str> = catalog.iter().map(|f| f.format_id.as_str()).collect();
        assert_eq!(ids, vec!["mp4-360-h264", "mp4-480-other", "webm720-vorbis", "flv1080"]);
        assert_catalog_invariants(&catalog);
    }

    #[test]
    fn higher_fps_then_bitrate_breaks_ties() {
        let mut slow = video("slow", "mp4", "avc1", "mp4a", 720, 30.0);
        slow.tbr = Some(3000.0);
        let mut fast_low = video("fast-low", "mp4", "avc1", "mp4a", 720, 60.0);
        fast_low.tbr = Some(1000.0);
        let mut fast_high = video("fast-high", "mp4", "avc1", "mp4a", 720, 60.0);
        fast_high.tbr = Some(2000.0);

        let catalog = reduce_formats(&[slow, fast_low, fast_high], &prefs());

        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].format_id, "fast-high");
    }

    #[test]
    fn off_tier_video_falls_back_to_top_entry() {
        let raw = vec![
            video("240", "mp4", "avc1", "mp4a", 240, 30.0),
            video("144", "3gp", "mp4v", "mp4a", 144, 15.0),
        ];

        let catalog = reduce_formats(&raw, &prefs());

        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].format_id, "240");
        assert_eq!(catalog[0].resolution.as_deref(), Some("426x240"));
        assert_eq!(catalog[0].signature, "video_mp4_426x240");
    }

    #[test]
    fn custom_tiers_are_honoured() {
        let raw = vec![
            video("240", "mp4", "avc1", "mp4a", 240, 30.0),
            video("360", "mp4", "avc1", "mp4a", 360, 30.0),
        ];
        let prefs = FormatPreferences {
            catalog_heights: vec![240],
            ..FormatPreferences::default()
        };

        let catalog = reduce_formats(&raw, &prefs);

        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].format_id, "240");
    }

    #[test]
    fn presence_and_idempotence_on_mixed_input() {
        let raw = vec![
            video("1080", "mp4", "avc1", "mp4a", 1080, 30.0),
            audio("140", "m4a", "mp4a.40.2", Some(129.0)),
            video("360", "webm", "vp9", "opus", 360, 30.0),
            audio("251", "webm", "opus", Some(255.0)),
            video("720", "mp4", "avc1", "mp4a", 720, 60.0),
            audio("600", "webm", "opus", None),
        ];

        let first = reduce_formats(&raw, &prefs());
        let second = reduce_formats(&raw, &prefs());

        assert_eq!(first, second);
        assert!(first.iter().any(|f| f.is_audio()));
        assert!(first.iter().any(|f| !f.is_audio()));
        assert_catalog_invariants(&first);
        assert_eq!(default_audio(&first).map(|f| f.format_id.as_str()), Some("251"));
    }

    #[test]
    fn filesize_falls_back_to_approximation() {
        let mut f = audio("140", "m4a", "mp4a.40.2", Some(128.0));
        f.filesize_approx = Some(42);
        assert_eq!(to_representative(&f).unwrap().filesize, Some(42));
    }
}
