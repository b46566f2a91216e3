//! Errors raised while aggregating releases across indexers.

use thiserror::Error;

use crate::db::CatalogError;

/// Errors the release aggregator can fail with.
#[derive(Error, Debug)]
pub enum AggregatorError {
    /// The catalog lookup needed to build a search request failed.
    #[error("catalog lookup failed: {0}")]
    Catalog(#[from] sqlx::Error),

    /// The catalog repository call needed to build a search request failed.
    #[error("catalog repository lookup failed: {0}")]
    CatalogRepository(#[from] CatalogError),

    /// The requested media item does not exist.
    #[error("media item {0} not found")]
    MediaItemNotFound(i64),

    /// No indexer is registered that can satisfy the search.
    #[error("no indexer registered for this search")]
    NoIndexersAvailable,

    /// Every registered indexer failed; a result with zero sources reporting
    /// success is not the same as a genuine zero-release search.
    #[error("all {0} indexer(s) failed for this search")]
    AllIndexersFailed(usize),
}
