//! The `Downloader` plugin contract: accepts a grab and reports progress.

use async_trait::async_trait;

use super::PluginError;

/// A progress snapshot reported by a downloader plugin for one active transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadProgress {
    /// Percentage complete, 0-100.
    pub percent: i64,
    /// Bytes transferred so far.
    pub downloaded_bytes: i64,
    /// Total bytes, once known.
    pub total_bytes: Option<i64>,
    /// The on-disk location of the transferred content, once the plugin has
    /// one to report. Populated at or near 100% and consumed by the
    /// importer; plugins that cannot resolve a path before completion may
    /// leave this `None` until then.
    pub local_path: Option<std::path::PathBuf>,
}

/// A downloader plugin: accepts a source URI and reports progress/cancellation.
///
/// Uses `async_trait` for object-safe dynamic dispatch via `Box<dyn
/// Downloader>`, matching the indexer trait's rationale.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Returns the downloader's unique id (e.g. `"downloader-qbittorrent"`).
    fn id(&self) -> &str;

    /// Returns `true` if this downloader can handle `source` (e.g. by
    /// scheme: `magnet:`, `http(s)://`, a provider-specific prefix).
    fn can_handle(&self, source: &str) -> bool;

    /// Returns the release categories this downloader advertises support
    /// for (e.g. `"movies"`, `"tv"`). An empty slice means the downloader
    /// doesn't discriminate by category and is only selected by
    /// [`Self::can_handle`] and [`Self::priority`].
    fn categories(&self) -> &[&str] {
        &[]
    }

    /// Selection priority among downloaders that otherwise tie on category
    /// match; higher wins. Defaults to 0.
    fn priority(&self) -> i32 {
        0
    }

    /// Starts a transfer for `source`, returning the plugin's own id for it.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError`] if the plugin rejects the source or the
    /// underlying transport fails.
    async fn start(&self, source: &str) -> Result<String, PluginError>;

    /// Polls the current progress of a transfer previously started with
    /// [`Self::start`].
    ///
    /// # Errors
    ///
    /// Returns [`PluginError`] if the external download id is unknown to
    /// this plugin or the underlying transport fails.
    async fn poll(&self, external_download_id: &str) -> Result<DownloadProgress, PluginError>;

    /// Cancels a transfer previously started with [`Self::start`].
    ///
    /// # Errors
    ///
    /// Returns [`PluginError`] if the cancellation request fails.
    async fn cancel(&self, external_download_id: &str) -> Result<(), PluginError>;
}
