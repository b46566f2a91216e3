//! Errors surfaced by indexer and downloader plugins.

use thiserror::Error;

/// Errors a plugin call can fail with.
#[derive(Error, Debug, Clone)]
pub enum PluginError {
    /// The plugin call exceeded its allotted timeout.
    #[error("plugin '{0}' timed out")]
    Timeout(String),

    /// The plugin's underlying transport failed (network, auth, parse).
    #[error("plugin '{0}' failed: {1}")]
    Failed(String, String),

    /// No registered plugin declares the requested capability.
    #[error("no plugin registered for capability '{0}'")]
    NoCapablePlugin(String),

    /// The plugin panicked or its task was cancelled.
    #[error("plugin '{0}' task did not complete: {1}")]
    TaskFailed(String, String),
}
