//! The `Indexer` plugin contract: turns a search request into releases.

use async_trait::async_trait;

use crate::model::{MediaKind, Release, ValueMap};

use super::PluginError;

/// A typed search request handed to every indexer in a fan-out.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// Free-text query, usually a media item's title.
    pub query: String,
    /// The kind of media being searched for, as a hint for indexers that
    /// serve more than one category (e.g. to restrict results to the
    /// matching torznab category).
    pub media_kind: MediaKind,
    /// Release year, when known, for disambiguation.
    pub year: Option<i64>,
    /// Season number, for TV season/episode searches.
    pub season: Option<i64>,
    /// Episode number, for single-episode searches.
    pub episode: Option<i64>,
    /// External ids (IMDb, TMDB, TVDB) carried over from the target media
    /// item's `external_ids` bag, for indexers that support id-based lookup.
    pub ids: ValueMap,
    /// Minimum seeders to request, when the indexer supports filtering.
    pub minimum_seeders: i64,
}

/// Capability an indexer plugin may declare support for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexerCapability {
    /// Movie search.
    Movie,
    /// TV season-pack search.
    TvSeason,
    /// Single TV episode search.
    TvEpisode,
    /// Music search.
    Music,
}

/// An indexer plugin: given a search request, returns candidate releases.
///
/// Uses `async_trait` for object-safe dynamic dispatch via `Box<dyn
/// Indexer>`; Rust 2024 native async traits are not object-safe, so the
/// registry pattern requires it.
#[async_trait]
pub trait Indexer: Send + Sync {
    /// Returns the indexer's unique id (e.g. `"indexer-prowlarr-rss"`).
    fn id(&self) -> &str;

    /// Returns `true` if this indexer declares support for `capability`.
    fn supports(&self, capability: IndexerCapability) -> bool;

    /// Searches for releases matching `request`.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError`] if the underlying transport fails or the
    /// call times out.
    async fn search(&self, request: &SearchRequest) -> Result<Vec<Release>, PluginError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_request_carries_disambiguation_fields() {
        let request = SearchRequest {
            query: "Arrival".to_string(),
            media_kind: MediaKind::Movie,
            year: Some(2016),
            season: None,
            episode: None,
            ids: ValueMap::new(),
            minimum_seeders: 0,
        };
        assert_eq!(request.query, "Arrival");
        assert_eq!(request.year, Some(2016));
    }
}
