//! `Download`: the dispatcher's persisted view of a single grab.

use std::fmt;

use sqlx::FromRow;

use super::value::{ValueMap, parse_bag, serialize_bag};

/// The lifecycle of a single download, as tracked by the dispatcher.
///
/// Transitions are one-directional except for `Paused`, which can return to
/// `Downloading`: `Queued -> Downloading -> Processing -> Completed`, with
/// `Failed` and `Cancelled` reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStatus {
    /// Accepted by the dispatcher, waiting for fleet capacity.
    Queued,
    /// Actively transferring via the selected downloader plugin.
    Downloading,
    /// Transfer finished, awaiting import.
    Processing,
    /// Transfer paused by the user or the downloader plugin.
    Paused,
    /// Imported successfully; terminal.
    Completed,
    /// Failed after exhausting retries; terminal.
    Failed,
    /// Cancelled by the user; terminal.
    Cancelled,
}

impl DownloadStatus {
    /// Returns the catalog string representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Downloading => "downloading",
            Self::Processing => "processing",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Returns `true` if no further transitions are possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Returns `true` if moving from `self` to `next` is a legal transition.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self, next) {
            (Self::Queued, Self::Downloading | Self::Cancelled | Self::Failed) => true,
            (Self::Downloading, Self::Processing | Self::Paused | Self::Cancelled | Self::Failed) => true,
            (Self::Paused, Self::Downloading | Self::Cancelled | Self::Failed) => true,
            (Self::Processing, Self::Completed | Self::Failed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DownloadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "downloading" => Ok(Self::Downloading),
            "processing" => Ok(Self::Processing),
            "paused" => Ok(Self::Paused),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("invalid download status: {s}")),
        }
    }
}

/// A single grab tracked by the dispatcher, from queueing through import.
#[derive(Debug, Clone, FromRow)]
pub struct Download {
    /// Unique identifier.
    pub id: i64,
    /// Id of the plugin handling this download.
    pub plugin_id: String,
    /// The downloader plugin's own identifier for this transfer, once known.
    pub external_download_id: Option<String>,
    /// Human-readable name, usually the release title.
    pub name: String,
    /// Current lifecycle status (stored as text, parsed via [`Self::status`]).
    #[sqlx(rename = "status")]
    pub status_str: String,
    /// Percentage complete, 0-100.
    pub progress: i64,
    /// Total transfer size in bytes, once known.
    pub total_bytes: Option<i64>,
    /// Bytes transferred so far.
    pub downloaded_bytes: i64,
    /// The release's original source URI or magnet link.
    pub source: String,
    /// GUID of the release this download satisfies, for dedupe/reconciliation.
    pub release_guid: Option<String>,
    /// Final destination path, once the importer has placed the file.
    pub destination_path: Option<String>,
    /// Last error message, if the download has failed at any point.
    pub error_message: Option<String>,
    /// Position in the fleet queue, for queued downloads.
    pub queue_position: Option<i64>,
    /// Relative priority; higher values are dispatched first.
    pub priority: i64,
    /// Opaque metadata bag.
    pub metadata: String,
    /// Id of the user who requested this grab, for manually-initiated grabs.
    pub created_by_user_id: Option<i64>,
    /// Creation timestamp.
    pub created_at: String,
    /// Timestamp the transfer actually started, if it has.
    pub started_at: Option<String>,
    /// Timestamp the download reached a terminal state, if it has.
    pub completed_at: Option<String>,
    /// Last update timestamp.
    pub updated_at: String,
}

impl Download {
    /// Returns the parsed [`DownloadStatus`].
    ///
    /// # Panics
    ///
    /// Panics if the stored status string is not recognized; this can only
    /// happen if the catalog's `CHECK` constraint was bypassed.
    #[must_use]
    pub fn status(&self) -> DownloadStatus {
        self.status_str
            .parse()
            .unwrap_or_else(|_| unreachable!("catalog CHECK constraint guarantees a valid status"))
    }

    /// Parses the metadata bag.
    #[must_use]
    pub fn metadata(&self) -> ValueMap {
        parse_bag(&self.metadata)
    }
}

/// Fields needed to queue a new [`Download`].
#[derive(Debug, Clone)]
pub struct NewDownload {
    /// Id of the plugin that will handle this download.
    pub plugin_id: String,
    /// Human-readable name.
    pub name: String,
    /// Source URI or magnet link.
    pub source: String,
    /// GUID of the release being grabbed, for dedupe.
    pub release_guid: Option<String>,
    /// Relative priority; higher values are dispatched first.
    pub priority: i64,
    /// Opaque metadata bag.
    pub metadata: ValueMap,
    /// Id of the requesting user, for manually-initiated grabs.
    pub created_by_user_id: Option<i64>,
}

impl NewDownload {
    /// Serializes the metadata bag for storage.
    #[must_use]
    pub fn metadata_json(&self) -> String {
        serialize_bag(&self.metadata)
    }
}

/// A single log line attached to a download, for the activity history view.
#[derive(Debug, Clone, FromRow)]
pub struct DownloadLogEntry {
    /// Unique identifier.
    pub id: i64,
    /// Owning download.
    pub download_id: i64,
    /// Log level, free text (e.g. `"info"`, `"warn"`, `"error"`).
    pub level: String,
    /// Log message.
    pub message: String,
    /// Creation timestamp.
    pub created_at: String,
}
