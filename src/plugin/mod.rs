//! Plugin facade: indexer and downloader traits plus a registry that
//! isolates and time-bounds every call into them.
//!
//! Mirrors the upstream resolver registry's shape (priority-ordered trait
//! objects behind `async_trait`, registered into a central collection) but
//! adds per-call task isolation, since indexer/downloader plugins here are
//! assumed less trustworthy than the upstream's first-party resolvers.

mod downloader;
mod error;
mod indexer;
mod registry;

pub use downloader::{DownloadProgress, Downloader};
pub use error::PluginError;
pub use indexer::{Indexer, IndexerCapability, SearchRequest};
pub use registry::PluginRegistry;
