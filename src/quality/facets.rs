//! Release-title facet parsing: extracts resolution, source, codec, and
//! season/episode tokens from a raw release title via regex token scan.

use std::sync::LazyLock;

use regex::Regex;

/// Matches a resolution token: either an explicit `2160p`/`1080p`/`720p`/
/// `480p` or the bare `4k`/`sd` aliases.
#[allow(clippy::expect_used)]
static RESOLUTION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(2160p|1080p|720p|480p|4k|sd)\b").expect("resolution regex is valid")
});

/// Matches a source token (web, bluray, remux, hdtv, dvd).
#[allow(clippy::expect_used)]
static SOURCE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(web-?dl|webrip|web|bluray|blu-ray|remux|bdrip|hdtv|dvdrip|dvd)\b")
        .expect("source regex is valid")
});

/// Matches a video codec token (`x264`, `x265`, `h264`, `h265`, `hevc`,
/// `avc`, `av1`).
#[allow(clippy::expect_used)]
static CODEC_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(x264|x265|h\.?264|h\.?265|hevc|avc|av1)\b").expect("codec regex is valid")
});

/// Matches an audio codec token.
#[allow(clippy::expect_used)]
static AUDIO_CODEC_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(dts[-.]?hd|dts|truehd|ddp?5\.1|ac3|aac|flac)\b").expect("audio codec regex is valid")
});

/// Matches a `SxxEyy` or `SxxxEyy` season/episode token.
#[allow(clippy::expect_used)]
static SEASON_EPISODE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bs(\d{1,3})e(\d{1,3})\b").expect("season/episode regex is valid"));

/// Matches a standalone season-pack token: `Season 3` or `S03` with no
/// trailing episode marker.
#[allow(clippy::expect_used)]
static SEASON_PACK_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:season\s*(\d{1,3})|s(\d{1,3}))\b").expect("season pack regex is valid"));

/// The facets recognized in a release title, each `None` when absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseFacets {
    /// Vertical resolution in pixels (2160, 1080, 720, 480).
    pub resolution: Option<i64>,
    /// Normalized source token (lowercase, hyphens stripped).
    pub source: Option<String>,
    /// Canonicalized video codec (`HEVC`, `AVC`) or the raw token
    /// (lowercase) when it doesn't map onto either.
    pub codec: Option<String>,
    /// Normalized audio codec token (lowercase, hyphens/dots stripped).
    pub audio_codec: Option<String>,
    /// Season number, when a season or season/episode token is present.
    pub season: Option<i64>,
    /// Episode number, when a season/episode token is present.
    pub episode: Option<i64>,
    /// `true` if the title looks like a season pack (season token present,
    /// no specific episode token).
    pub is_season_pack: bool,
}

/// Parses the recognizable facets out of a raw release title.
///
/// Unrecognized tokens are simply absent from the result; this never fails,
/// since release titles are free text with no fixed grammar.
#[must_use]
pub fn parse_facets(title: &str) -> ReleaseFacets {
    let resolution = RESOLUTION_PATTERN
        .captures(title)
        .and_then(|caps| caps.get(1))
        .and_then(|m| canonicalize_resolution(m.as_str()));

    let source = SOURCE_PATTERN
        .captures(title)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_lowercase().replace('-', ""));

    let codec = CODEC_PATTERN
        .captures(title)
        .and_then(|caps| caps.get(1))
        .map(|m| canonicalize_video_codec(m.as_str()));

    let audio_codec = AUDIO_CODEC_PATTERN
        .captures(title)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_lowercase().replace(['-', '.'], ""));

    let (season, episode) = if let Some(caps) = SEASON_EPISODE_PATTERN.captures(title) {
        (caps.get(1).and_then(|m| m.as_str().parse().ok()), caps.get(2).and_then(|m| m.as_str().parse().ok()))
    } else if let Some(caps) = SEASON_PACK_PATTERN.captures(title) {
        let season = caps
            .get(1)
            .or_else(|| caps.get(2))
            .and_then(|m| m.as_str().parse().ok());
        (season, None)
    } else {
        (None, None)
    };

    let is_season_pack = season.is_some() && episode.is_none();

    ReleaseFacets { resolution, source, codec, audio_codec, season, episode, is_season_pack }
}

/// Maps a matched resolution token onto its vertical pixel count, resolving
/// the `4k`/`sd` aliases to their `p`-suffixed equivalents.
fn canonicalize_resolution(token: &str) -> Option<i64> {
    match token.to_lowercase().as_str() {
        "4k" => Some(2160),
        "sd" => Some(480),
        other => other.trim_end_matches('p').parse().ok(),
    }
}

/// Maps a matched video codec token onto its canonical name, per the
/// x265/hevc/h265 → HEVC and x264/avc/h264 → AVC grouping; anything else is
/// kept as its lowercase raw token (currently only `av1`).
fn canonicalize_video_codec(token: &str) -> String {
    let normalized = token.to_lowercase().replace('.', "");
    match normalized.as_str() {
        "x265" | "hevc" | "h265" => "HEVC".to_string(),
        "x264" | "avc" | "h264" => "AVC".to_string(),
        other => other.to_string(),
    }
}
