//! Release aggregator: fans a search out to every capable indexer plugin in
//! parallel and merges the results into one deduplicated, ranked list.

mod error;

pub use error::AggregatorError;

use futures_util::stream::{FuturesUnordered, StreamExt};
use tracing::{instrument, warn};

use crate::db::Catalog;
use crate::model::{MediaKind, Release};
use crate::plugin::{IndexerCapability, PluginRegistry, SearchRequest};

/// Maximum releases returned from a single aggregated search.
const MAX_RESULTS: usize = 200;

/// The outcome of a fanned-out search: the merged, ranked release list plus
/// how many of the fanned-out indexers actually answered, so a caller can
/// tell "nothing matched" apart from "every source failed".
#[derive(Debug, Clone)]
pub struct AggregatedSearch {
    /// Deduplicated, ranked releases across every indexer that answered.
    pub releases: Vec<Release>,
    /// Total releases returned before dedupe, across all successful sources.
    pub total: usize,
    /// Number of indexers that answered successfully.
    pub sources_ok: usize,
    /// Number of indexers that errored or timed out.
    pub sources_failed: usize,
}

/// Builds a [`SearchRequest`] for `media_item_id` by walking its parent
/// chain to recover title/year/season/episode, and fans the request out to
/// every registered indexer declaring the matching capability.
pub struct AggregateSearch<'a> {
    catalog: &'a Catalog,
    plugins: &'a PluginRegistry,
}

impl<'a> AggregateSearch<'a> {
    /// Creates a new aggregator bound to a catalog and plugin registry.
    #[must_use]
    pub fn new(catalog: &'a Catalog, plugins: &'a PluginRegistry) -> Self {
        Self { catalog, plugins }
    }

    /// Runs an aggregated search for `media_item_id`.
    ///
    /// # Errors
    ///
    /// Returns [`AggregatorError::MediaItemNotFound`] if the item doesn't
    /// exist, [`AggregatorError::NoIndexersAvailable`] if no indexer
    /// declares support for the item's capability, or
    /// [`AggregatorError::AllIndexersFailed`] if every fanned-out indexer
    /// errored or timed out.
    #[instrument(skip(self))]
    pub async fn search(&self, media_item_id: i64, minimum_seeders: i64) -> Result<AggregatedSearch, AggregatorError> {
        let chain = self.catalog.media_items().parent_chain(media_item_id).await?;
        let target = chain
            .first()
            .ok_or(AggregatorError::MediaItemNotFound(media_item_id))?;

        let request = build_search_request(&chain, minimum_seeders);
        let capability = capability_for(target.kind());
        let indexers = self.plugins.indexers_for(capability);
        if indexers.is_empty() {
            return Err(AggregatorError::NoIndexersAvailable);
        }

        let plugins = self.plugins;
        let mut tasks = FuturesUnordered::new();
        for indexer in indexers {
            let request = request.clone();
            tasks.push(async move { (indexer.id().to_string(), plugins.search(indexer, request).await) });
        }

        let mut releases = Vec::new();
        let mut sources_ok = 0;
        let mut sources_failed = 0;
        while let Some((plugin_id, result)) = tasks.next().await {
            match result {
                Ok(found) => {
                    sources_ok += 1;
                    releases.extend(found);
                }
                Err(error) => {
                    sources_failed += 1;
                    warn!(plugin_id, %error, "indexer search failed, excluding from results");
                }
            }
        }

        if sources_ok == 0 && sources_failed > 0 {
            return Err(AggregatorError::AllIndexersFailed(sources_failed));
        }

        let total = releases.len();
        Ok(AggregatedSearch { releases: dedupe_and_rank(releases), total, sources_ok, sources_failed })
    }
}

/// Maps a media kind to the search capability an indexer must declare.
fn capability_for(kind: MediaKind) -> IndexerCapability {
    match kind {
        MediaKind::TvSeason => IndexerCapability::TvSeason,
        MediaKind::TvEpisode => IndexerCapability::TvEpisode,
        MediaKind::MusicArtist | MediaKind::MusicAlbum | MediaKind::MusicTrack => IndexerCapability::Music,
        MediaKind::Movie | MediaKind::TvSeries | MediaKind::Book => IndexerCapability::Movie,
    }
}

/// Builds a search request from a parent chain ordered leaf-to-root
/// (`chain[0]` is the item being searched for).
fn build_search_request(chain: &[crate::model::MediaItem], minimum_seeders: i64) -> SearchRequest {
    let target = &chain[0];
    let series = chain.iter().find(|item| item.kind() == MediaKind::TvSeries);
    let season = chain.iter().find(|item| item.kind() == MediaKind::TvSeason);

    let query = series.map_or_else(|| target.title.clone(), |series| series.title.clone());
    let season_number = season.and_then(|season| season.metadata().get("season_number").and_then(crate::model::Value::as_i64));
    let episode_number = if target.kind() == MediaKind::TvEpisode {
        target.metadata().get("episode_number").and_then(crate::model::Value::as_i64)
    } else {
        None
    };

    let target_ids = target.external_ids();
    let ids = if target_ids.is_empty() { series.map(crate::model::MediaItem::external_ids).unwrap_or_default() } else { target_ids };

    SearchRequest {
        query,
        media_kind: target.kind(),
        year: target.year.or_else(|| series.and_then(|series| series.year)),
        season: season_number,
        episode: episode_number,
        ids,
        minimum_seeders,
    }
}

/// Deduplicates releases against every release already kept, using
/// [`Release::is_duplicate_of`] (GUID match or normalized-title+size
/// collision), keeping the higher-seeder copy of any duplicate pair. Scans
/// linearly against the kept set rather than hashing on the dedupe key alone
/// since a GUID match can collide releases whose titles differ entirely.
/// Sorts the survivors by publish date descending (newest first, releases
/// with no reported date sort last) and truncates to [`MAX_RESULTS`].
fn dedupe_and_rank(releases: Vec<Release>) -> Vec<Release> {
    let mut kept: Vec<Release> = Vec::new();
    for release in releases {
        match kept.iter_mut().find(|existing| release.is_duplicate_of(existing)) {
            Some(existing) => {
                if release.seeders.unwrap_or(0) > existing.seeders.unwrap_or(0) {
                    *existing = release;
                }
            }
            None => kept.push(release),
        }
    }

    kept.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    kept.truncate(MAX_RESULTS);
    kept
}
