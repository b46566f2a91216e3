//! The plugin registry: holds indexer and downloader plugins and runs each
//! call in its own isolated, time-bounded task.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::model::Release;

use super::downloader::{DownloadProgress, Downloader};
use super::indexer::{Indexer, IndexerCapability, SearchRequest};
use super::PluginError;

/// Default time budget for a single plugin call before it is treated as failed.
const DEFAULT_PLUGIN_TIMEOUT: Duration = Duration::from_secs(30);

/// A registry of indexer and downloader plugins.
///
/// Each call into a plugin runs on its own `tokio::spawn`'d task, bounded by
/// [`DEFAULT_PLUGIN_TIMEOUT`], so that one misbehaving plugin (hang, panic)
/// cannot block or crash the caller. Capability probes are cached per
/// plugin id since `supports`/`can_handle` are synchronous and called
/// repeatedly during aggregation.
pub struct PluginRegistry {
    indexers: Vec<Arc<dyn Indexer>>,
    downloaders: Vec<Arc<dyn Downloader>>,
    capability_cache: DashMap<(String, IndexerCapability), bool>,
}

impl PluginRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            indexers: Vec::new(),
            downloaders: Vec::new(),
            capability_cache: DashMap::new(),
        }
    }

    /// Registers an indexer plugin.
    pub fn register_indexer(&mut self, indexer: Arc<dyn Indexer>) {
        debug!(plugin_id = indexer.id(), "registering indexer plugin");
        self.indexers.push(indexer);
    }

    /// Registers a downloader plugin.
    pub fn register_downloader(&mut self, downloader: Arc<dyn Downloader>) {
        debug!(plugin_id = downloader.id(), "registering downloader plugin");
        self.downloaders.push(downloader);
    }

    /// Returns all registered indexers.
    #[must_use]
    pub fn indexers(&self) -> &[Arc<dyn Indexer>] {
        &self.indexers
    }

    /// Returns the indexers that declare support for `capability`, using
    /// (and populating) the capability cache.
    #[must_use]
    pub fn indexers_for(&self, capability: IndexerCapability) -> Vec<Arc<dyn Indexer>> {
        self.indexers
            .iter()
            .filter(|indexer| {
                let key = (indexer.id().to_string(), capability);
                *self
                    .capability_cache
                    .entry(key)
                    .or_insert_with(|| indexer.supports(capability))
            })
            .cloned()
            .collect()
    }

    /// Selects a downloader for `source`, restricted first to `category`
    /// when given: among the downloaders that can handle `source`, prefer
    /// those whose advertised categories include `category`, falling back
    /// to the full candidate set when none declare it (or `category` is
    /// `None`). Ties break by priority descending, then id ascending.
    #[must_use]
    pub fn downloader_for(&self, category: Option<&str>, source: &str) -> Option<Arc<dyn Downloader>> {
        let capable: Vec<&Arc<dyn Downloader>> = self.downloaders.iter().filter(|downloader| downloader.can_handle(source)).collect();

        let mut candidates = capable.clone();
        if let Some(category) = category {
            let matching: Vec<&Arc<dyn Downloader>> = capable
                .iter()
                .filter(|downloader| downloader.categories().iter().any(|advertised| advertised.eq_ignore_ascii_case(category)))
                .copied()
                .collect();
            if !matching.is_empty() {
                candidates = matching;
            }
        }

        candidates
            .into_iter()
            .max_by(|a, b| a.priority().cmp(&b.priority()).then_with(|| b.id().cmp(a.id())))
            .cloned()
    }

    /// Runs a single indexer's search in an isolated, time-bounded task.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Timeout`] if the call exceeds the time
    /// budget, [`PluginError::TaskFailed`] if the task panics, or whatever
    /// error the plugin itself returned.
    pub async fn search(
        &self,
        indexer: Arc<dyn Indexer>,
        request: SearchRequest,
    ) -> Result<Vec<Release>, PluginError> {
        let plugin_id = indexer.id().to_string();
        let task = tokio::spawn(async move { indexer.search(&request).await });

        match tokio::time::timeout(DEFAULT_PLUGIN_TIMEOUT, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => {
                warn!(plugin_id, error = %join_error, "indexer task panicked");
                Err(PluginError::TaskFailed(plugin_id, join_error.to_string()))
            }
            Err(_elapsed) => {
                warn!(plugin_id, "indexer call timed out");
                Err(PluginError::Timeout(plugin_id))
            }
        }
    }

    /// Runs a downloader's `start` call in an isolated, time-bounded task.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Timeout`] if the call exceeds the time
    /// budget, [`PluginError::TaskFailed`] if the task panics, or whatever
    /// error the plugin itself returned.
    pub async fn start_download(
        &self,
        downloader: Arc<dyn Downloader>,
        source: String,
    ) -> Result<String, PluginError> {
        let plugin_id = downloader.id().to_string();
        let task = tokio::spawn(async move { downloader.start(&source).await });

        match tokio::time::timeout(DEFAULT_PLUGIN_TIMEOUT, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(PluginError::TaskFailed(plugin_id, join_error.to_string())),
            Err(_elapsed) => Err(PluginError::Timeout(plugin_id)),
        }
    }

    /// Runs a downloader's `poll` call in an isolated, time-bounded task.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Timeout`] if the call exceeds the time
    /// budget, [`PluginError::TaskFailed`] if the task panics, or whatever
    /// error the plugin itself returned.
    pub async fn poll_download(
        &self,
        downloader: Arc<dyn Downloader>,
        external_download_id: String,
    ) -> Result<DownloadProgress, PluginError> {
        let plugin_id = downloader.id().to_string();
        let task = tokio::spawn(async move { downloader.poll(&external_download_id).await });

        match tokio::time::timeout(DEFAULT_PLUGIN_TIMEOUT, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(PluginError::TaskFailed(plugin_id, join_error.to_string())),
            Err(_elapsed) => Err(PluginError::Timeout(plugin_id)),
        }
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("indexer_count", &self.indexers.len())
            .field("downloader_count", &self.downloaders.len())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tokio::time::Duration as StdDuration;

    struct MockIndexer {
        mock_id: &'static str,
        capability: IndexerCapability,
        delay: Option<StdDuration>,
    }

    #[async_trait]
    impl Indexer for MockIndexer {
        fn id(&self) -> &str {
            self.mock_id
        }

        fn supports(&self, capability: IndexerCapability) -> bool {
            capability == self.capability
        }

        async fn search(&self, _request: &SearchRequest) -> Result<Vec<Release>, PluginError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(Vec::new())
        }
    }

    fn sample_request() -> SearchRequest {
        SearchRequest {
            query: "Arrival".to_string(),
            media_kind: crate::model::MediaKind::Movie,
            year: Some(2016),
            season: None,
            episode: None,
            ids: crate::model::ValueMap::new(),
            minimum_seeders: 0,
        }
    }

    #[test]
    fn indexers_for_filters_by_capability() {
        let mut registry = PluginRegistry::new();
        registry.register_indexer(Arc::new(MockIndexer {
            mock_id: "movies-only",
            capability: IndexerCapability::Movie,
            delay: None,
        }));
        registry.register_indexer(Arc::new(MockIndexer {
            mock_id: "tv-only",
            capability: IndexerCapability::TvSeason,
            delay: None,
        }));

        let movie_indexers = registry.indexers_for(IndexerCapability::Movie);
        assert_eq!(movie_indexers.len(), 1);
        assert_eq!(movie_indexers[0].id(), "movies-only");
    }

    #[tokio::test]
    async fn search_succeeds_within_timeout() {
        let registry = PluginRegistry::new();
        let indexer: Arc<dyn Indexer> = Arc::new(MockIndexer {
            mock_id: "fast",
            capability: IndexerCapability::Movie,
            delay: None,
        });
        let result = registry.search(indexer, sample_request()).await;
        assert!(result.is_ok());
    }

    struct MockDownloader {
        mock_id: &'static str,
        mock_categories: Vec<&'static str>,
        mock_priority: i32,
    }

    #[async_trait]
    impl Downloader for MockDownloader {
        fn id(&self) -> &str {
            self.mock_id
        }

        fn can_handle(&self, _source: &str) -> bool {
            true
        }

        fn categories(&self) -> &[&str] {
            &self.mock_categories
        }

        fn priority(&self) -> i32 {
            self.mock_priority
        }

        async fn start(&self, _source: &str) -> Result<String, PluginError> {
            Ok("ext-1".to_string())
        }

        async fn poll(&self, _external_download_id: &str) -> Result<DownloadProgress, PluginError> {
            Ok(DownloadProgress { percent: 0, downloaded_bytes: 0, total_bytes: None, local_path: None })
        }

        async fn cancel(&self, _external_download_id: &str) -> Result<(), PluginError> {
            Ok(())
        }
    }

    #[test]
    fn downloader_for_prefers_matching_category() {
        let mut registry = PluginRegistry::new();
        registry.register_downloader(Arc::new(MockDownloader { mock_id: "general", mock_categories: vec![], mock_priority: 0 }));
        registry.register_downloader(Arc::new(MockDownloader { mock_id: "tv-specialist", mock_categories: vec!["tv"], mock_priority: 0 }));

        let chosen = registry.downloader_for(Some("tv"), "magnet:?xt=abc").unwrap();
        assert_eq!(chosen.id(), "tv-specialist");
    }

    #[test]
    fn downloader_for_breaks_category_ties_by_priority_then_name() {
        let mut registry = PluginRegistry::new();
        registry.register_downloader(Arc::new(MockDownloader { mock_id: "low-priority", mock_categories: vec!["movies"], mock_priority: 1 }));
        registry.register_downloader(Arc::new(MockDownloader { mock_id: "high-priority", mock_categories: vec!["movies"], mock_priority: 5 }));

        let chosen = registry.downloader_for(Some("movies"), "magnet:?xt=abc").unwrap();
        assert_eq!(chosen.id(), "high-priority");
    }

    #[test]
    fn downloader_for_falls_back_to_any_capable_downloader_when_no_category_matches() {
        let mut registry = PluginRegistry::new();
        registry.register_downloader(Arc::new(MockDownloader { mock_id: "general", mock_categories: vec![], mock_priority: 0 }));

        let chosen = registry.downloader_for(Some("music"), "magnet:?xt=abc").unwrap();
        assert_eq!(chosen.id(), "general");
    }
}
