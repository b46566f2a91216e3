//! Errors raised while importing a completed download into the library.

use std::path::PathBuf;

use thiserror::Error;

/// Errors an import attempt can fail with.
#[derive(Error, Debug)]
pub enum ImportError {
    /// The completed download's source path does not exist on disk.
    #[error("source path does not exist: {0}")]
    SourceMissing(PathBuf),

    /// A TV import was attempted without a resolved season and episode.
    #[error("season and episode are required for a TV import")]
    MissingSeasonEpisode,

    /// The destination filesystem does not have enough free space.
    #[error("insufficient free space at destination: need at least {needed_mb} MB")]
    InsufficientFreeSpace { needed_mb: u64 },

    /// The rendered destination path already holds an unrelated file.
    #[error("destination already exists and was not produced by this import: {0}")]
    DestinationConflict(PathBuf),

    /// A filesystem operation (hardlink, copy, rename, mkdir) failed.
    #[error("filesystem error: {0}")]
    Filesystem(#[from] std::io::Error),

    /// The catalog update that finalizes the import failed.
    #[error("catalog error: {0}")]
    Catalog(#[from] crate::db::CatalogError),

    /// The import was rolled back after a mid-flight failure; the wrapped
    /// error is the one that triggered the rollback.
    #[error("import failed and was rolled back: {0}")]
    RolledBack(Box<ImportError>),
}
