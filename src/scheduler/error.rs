//! Errors raised while running scheduler jobs.

use thiserror::Error;

/// Errors a scheduler job run can fail with.
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// The catalog operation backing this job failed.
    #[error("catalog error: {0}")]
    Catalog(#[from] crate::db::CatalogError),

    /// The aggregator failed while running a monitored search.
    #[error("aggregation failed: {0}")]
    Aggregation(#[from] crate::aggregator::AggregatorError),

    /// The dispatcher failed while grabbing a chosen release.
    #[error("dispatch failed: {0}")]
    Dispatch(#[from] crate::dispatcher::DispatchError),

    /// The quality engine rejected the profile itself (e.g. no allowed qualities).
    #[error("quality evaluation failed: {0}")]
    Quality(#[from] crate::quality::QualityError),

    /// A monitoring rule referenced a quality profile that no longer exists.
    #[error("quality profile {0} referenced by a monitoring rule was not found")]
    MissingQualityProfile(i64),

    /// A monitoring rule's own `media_item_id` no longer resolves to a
    /// media item (e.g. the item was deleted after the rule was created).
    #[error("media item {0} referenced by a monitoring rule was not found")]
    MissingMediaItem(i64),
}
