//! Errors raised while dispatching and tracking downloads.

use thiserror::Error;

/// Errors the dispatcher can fail with.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// The catalog operation backing this dispatch failed.
    #[error("catalog error: {0}")]
    Catalog(#[from] crate::db::CatalogError),

    /// No registered downloader plugin can handle the release's source.
    #[error("no downloader plugin can handle source: {0}")]
    NoCapableDownloader(String),

    /// The downloader plugin call failed.
    #[error("downloader plugin error: {0}")]
    Plugin(#[from] crate::plugin::PluginError),

    /// The requested download does not exist.
    #[error("download {0} not found")]
    DownloadNotFound(i64),

    /// The requested state transition is not legal from the download's
    /// current status.
    #[error("cannot transition download {0} from {1} to {2}")]
    IllegalTransition(i64, &'static str, &'static str),

    /// A download reached `Processing` without the `media_item_id` tag its
    /// metadata bag is supposed to carry from the original grab.
    #[error("download {0} is missing its media_item_id tag")]
    MissingMediaItemTag(i64),

    /// The importer failed to place the finished file into the library.
    #[error("import error: {0}")]
    Import(#[from] crate::importer::ImportError),
}
