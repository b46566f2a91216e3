//! `MediaItem` and its hierarchy kind.

use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::value::{ValueMap, parse_bag, serialize_bag};

/// The kind of node a `MediaItem` represents in the catalog hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    /// A standalone film.
    Movie,
    /// A TV series (the root of a season/episode hierarchy).
    TvSeries,
    /// A single season of a TV series.
    TvSeason,
    /// A single episode of a season.
    TvEpisode,
    /// A music artist.
    MusicArtist,
    /// A music album.
    MusicAlbum,
    /// A music track.
    MusicTrack,
    /// A book.
    Book,
}

impl MediaKind {
    /// Returns the catalog string representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::TvSeries => "tv_series",
            Self::TvSeason => "tv_season",
            Self::TvEpisode => "tv_episode",
            Self::MusicArtist => "music_artist",
            Self::MusicAlbum => "music_album",
            Self::MusicTrack => "music_track",
            Self::Book => "book",
        }
    }

    /// Returns the kind of the immediate canonical parent, if this kind has one.
    #[must_use]
    pub fn parent_kind(self) -> Option<Self> {
        match self {
            Self::TvEpisode => Some(Self::TvSeason),
            Self::TvSeason => Some(Self::TvSeries),
            Self::MusicTrack => Some(Self::MusicAlbum),
            Self::MusicAlbum => Some(Self::MusicArtist),
            Self::Movie | Self::TvSeries | Self::MusicArtist | Self::Book => None,
        }
    }

    /// Returns `true` if a media item of this kind is ever itself the
    /// subject of a release search, as opposed to an organizational node
    /// whose descendants are searched instead.
    ///
    /// Equivalent to "never returned by any kind's `parent_kind()`": a
    /// `TvSeries`/`TvSeason`/`MusicAlbum`/`MusicArtist` groups other items
    /// but never has a release of its own.
    #[must_use]
    pub fn is_searchable_leaf(self) -> bool {
        matches!(self, Self::Movie | Self::TvEpisode | Self::MusicTrack | Self::Book)
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movie" => Ok(Self::Movie),
            "tv_series" => Ok(Self::TvSeries),
            "tv_season" => Ok(Self::TvSeason),
            "tv_episode" => Ok(Self::TvEpisode),
            "music_artist" => Ok(Self::MusicArtist),
            "music_album" => Ok(Self::MusicAlbum),
            "music_track" => Ok(Self::MusicTrack),
            "book" => Ok(Self::Book),
            _ => Err(format!("invalid media kind: {s}")),
        }
    }
}

/// A node in the media hierarchy: a movie, a TV series/season/episode, etc.
///
/// The natural key `(kind, title, year, parent_id)` uniquely identifies an
/// item; this is enforced by a `UNIQUE` index in the catalog schema, not in
/// application code.
#[derive(Debug, Clone, FromRow)]
pub struct MediaItem {
    /// Unique identifier.
    pub id: i64,
    /// Hierarchy kind (stored as text, parsed via [`Self::kind`]).
    #[sqlx(rename = "kind")]
    pub kind_str: String,
    /// Display title.
    pub title: String,
    /// Normalized title used for stable sort ordering.
    pub sort_title: String,
    /// Release/air year, when known.
    pub year: Option<i64>,
    /// Parent item id, per the canonical hierarchy (episode -> season -> series).
    pub parent_id: Option<i64>,
    /// Opaque external identifiers (IMDb, TMDB, TVDB, ...) as a JSON bag.
    pub external_ids: String,
    /// Opaque rich metadata as a JSON bag.
    pub metadata: String,
    /// Convenience flag mirrored from the associated `MonitoringRule.enabled`,
    /// `false` for items with no rule yet.
    #[sqlx(rename = "monitored")]
    pub monitored_flag: i64,
    /// Creation timestamp.
    pub created_at: String,
    /// Last update timestamp.
    pub updated_at: String,
}

impl MediaItem {
    /// Returns the parsed [`MediaKind`].
    ///
    /// # Panics
    ///
    /// Panics if the stored kind string is not a recognized value; this can
    /// only happen if the catalog's `CHECK` constraint was bypassed.
    #[must_use]
    pub fn kind(&self) -> MediaKind {
        self.kind_str
            .parse()
            .unwrap_or_else(|_| unreachable!("catalog CHECK constraint guarantees a valid kind"))
    }

    /// Returns `true` if a monitoring rule is attached and enabled.
    #[must_use]
    pub fn is_monitored(&self) -> bool {
        self.monitored_flag != 0
    }

    /// Parses the external-id bag.
    #[must_use]
    pub fn external_ids(&self) -> ValueMap {
        parse_bag(&self.external_ids)
    }

    /// Parses the metadata bag.
    #[must_use]
    pub fn metadata(&self) -> ValueMap {
        parse_bag(&self.metadata)
    }
}

/// Fields needed to insert a new `MediaItem`.
#[derive(Debug, Clone)]
pub struct NewMediaItem {
    /// Hierarchy kind.
    pub kind: MediaKind,
    /// Display title.
    pub title: String,
    /// Sort title.
    pub sort_title: String,
    /// Release/air year.
    pub year: Option<i64>,
    /// Parent item id.
    pub parent_id: Option<i64>,
    /// External ids bag.
    pub external_ids: ValueMap,
    /// Metadata bag.
    pub metadata: ValueMap,
}

impl NewMediaItem {
    /// Serializes the external-id bag for storage.
    #[must_use]
    pub fn external_ids_json(&self) -> String {
        serialize_bag(&self.external_ids)
    }

    /// Serializes the metadata bag for storage.
    #[must_use]
    pub fn metadata_json(&self) -> String {
        serialize_bag(&self.metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_kind_parent_chain_matches_canonical_hierarchy() {
        assert_eq!(MediaKind::TvEpisode.parent_kind(), Some(MediaKind::TvSeason));
        assert_eq!(MediaKind::TvSeason.parent_kind(), Some(MediaKind::TvSeries));
        assert_eq!(MediaKind::TvSeries.parent_kind(), None);
        assert_eq!(MediaKind::Movie.parent_kind(), None);
    }

    #[test]
    fn media_kind_round_trips_through_str() {
        for kind in [
            MediaKind::Movie,
            MediaKind::TvSeries,
            MediaKind::TvSeason,
            MediaKind::TvEpisode,
            MediaKind::Book,
        ] {
            let parsed: MediaKind = kind.as_str().parse().unwrap();
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn media_kind_from_str_rejects_unknown() {
        assert!("laserdisc".parse::<MediaKind>().is_err());
    }

    #[test]
    fn only_leaf_kinds_are_searchable() {
        assert!(MediaKind::Movie.is_searchable_leaf());
        assert!(MediaKind::TvEpisode.is_searchable_leaf());
        assert!(MediaKind::MusicTrack.is_searchable_leaf());
        assert!(MediaKind::Book.is_searchable_leaf());
        assert!(!MediaKind::TvSeries.is_searchable_leaf());
        assert!(!MediaKind::TvSeason.is_searchable_leaf());
        assert!(!MediaKind::MusicAlbum.is_searchable_leaf());
        assert!(!MediaKind::MusicArtist.is_searchable_leaf());
    }
}
