//! Naming template expansion: turns a folder/file template and the metadata
//! for one import into a concrete, filesystem-safe path segment.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::model::MediaKind;

/// Matches `{Token Name}` or `{token:00}`, where the trailing `0`s after a
/// colon request zero-padding to their own count.
static TOKEN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z ]+)(?::(0+))?\}").expect("token pattern is valid"));

/// How a literal colon in a resolved token value is rewritten before the
/// path-illegal-character pass runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColonReplacement {
    Delete,
    Dash,
    Space,
    #[default]
    SpaceDash,
}

impl ColonReplacement {
    fn replacement(self) -> &'static str {
        match self {
            Self::Delete => "",
            Self::Dash => "-",
            Self::Space => " ",
            Self::SpaceDash => " -",
        }
    }
}

/// Metadata available for template expansion. Fields irrelevant to the
/// media kind being imported (e.g. `season` for a movie) are left `None`
/// and their tokens expand to an empty string.
#[derive(Debug, Clone, Default)]
pub struct ImportContext {
    pub media_kind: Option<MediaKind>,
    pub movie_title: Option<String>,
    pub release_year: Option<i64>,
    pub quality: Option<String>,
    pub edition: Option<String>,
    pub imdb_id: Option<String>,
    pub series_title: Option<String>,
    pub season: Option<i64>,
    pub episode: Option<i64>,
    pub episode_title: Option<String>,
    pub release_date: Option<String>,
    pub tvdb_id: Option<String>,
}

/// Expands every recognized token in `template` against `context`, then
/// collapses the separator runs left behind by missing tokens.
#[must_use]
pub fn expand_template(template: &str, context: &ImportContext) -> String {
    let expanded = TOKEN_PATTERN.replace_all(template, |caps: &Captures<'_>| {
        let name = &caps[1];
        let width = caps.get(2).map(|m| m.as_str().len());
        resolve_token(name, width, context).unwrap_or_default()
    });
    collapse_separator_runs(&expanded)
}

fn resolve_token(name: &str, width: Option<usize>, context: &ImportContext) -> Option<String> {
    match name {
        "Movie Title" => context.movie_title.clone(),
        "Release Year" => context.release_year.map(|year| year.to_string()),
        "Quality" => context.quality.clone(),
        "Edition" => context.edition.clone(),
        "IMDb ID" => context.imdb_id.clone(),
        "Series Title" => context.series_title.clone(),
        "Season" | "season" => context.season.map(|season| zero_pad(season, width)),
        "Episode" | "episode" => context.episode.map(|episode| zero_pad(episode, width)),
        "Episode Title" => context.episode_title.clone(),
        "Release Date" => context.release_date.clone(),
        "TVDb ID" => context.tvdb_id.clone(),
        _ => None,
    }
}

fn zero_pad(value: i64, width: Option<usize>) -> String {
    match width {
        Some(width) => format!("{value:0width$}"),
        None => value.to_string(),
    }
}

/// Collapses runs of whitespace left by an empty token, and trims the
/// result, without touching path separators the caller adds afterwards.
fn collapse_separator_runs(expanded: &str) -> String {
    let mut out = String::with_capacity(expanded.len());
    let mut last_was_space = false;
    for ch in expanded.trim().chars() {
        if ch == ' ' {
            if !last_was_space {
                out.push(ch);
            }
            last_was_space = true;
        } else {
            out.push(ch);
            last_was_space = false;
        }
    }
    out
}

/// Replaces filesystem-illegal characters in one path segment, handling the
/// colon separately since its replacement is a per-library setting rather
/// than a fixed substitution.
///
/// Mirrors the character-class mapping and run-collapsing approach the
/// downloader's own filename sanitizer uses, generalized to take the colon
/// mode as a parameter instead of hardcoding `_`.
#[must_use]
pub fn sanitize_path_segment(segment: &str, colon_replacement: ColonReplacement) -> String {
    let with_colons_handled = segment.replace(':', colon_replacement.replacement());

    let mut out = String::with_capacity(with_colons_handled.len());
    let mut last_was_underscore = false;
    for ch in with_colons_handled.chars() {
        match ch {
            '<' | '>' | '"' | '/' | '\\' | '|' | '?' | '*' => {
                if !last_was_underscore {
                    out.push('_');
                }
                last_was_underscore = true;
            }
            c if c.is_control() => {}
            c => {
                out.push(c);
                last_was_underscore = false;
            }
        }
    }

    out.trim_matches(|c: char| c.is_whitespace() || c == '.').to_string()
}
