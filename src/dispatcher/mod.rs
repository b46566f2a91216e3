//! Download dispatcher: turns grabbed releases into active transfers,
//! tracks their lifecycle, and enforces a fleet-wide concurrency cap.

mod error;

pub use error::DispatchError;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tracing::{instrument, warn};

use crate::db::Catalog;
use crate::importer::Importer;
use crate::model::{Download, DownloadStatus, NewDownload, Value, ValueMap};
use crate::plugin::PluginRegistry;

/// An action requested against an in-flight download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    /// Pause the transfer.
    Pause,
    /// Resume a paused transfer.
    Resume,
    /// Cancel the transfer permanently.
    Cancel,
}

/// Coordinates grabbing releases, starting transfers, polling progress, and
/// enforcing the maximum number of concurrently active downloads.
///
/// The fleet cap is a [`Semaphore`]: a permit is acquired when a download
/// starts and held (in `permits`) until it reaches a terminal state, the
/// same acquire-on-start/release-on-finish shape the upstream engine uses
/// for its per-item download tasks, just held across ticks instead of one
/// task's lifetime since transfers here live in the catalog, not a
/// in-process future.
pub struct Dispatcher {
    catalog: Catalog,
    plugins: Arc<PluginRegistry>,
    importer: Importer,
    semaphore: Arc<Semaphore>,
    permits: DashMap<i64, OwnedSemaphorePermit>,
    progress_locks: DashMap<i64, Arc<Mutex<()>>>,
}

impl Dispatcher {
    /// Creates a dispatcher capped at `max_concurrent_downloads` simultaneous
    /// active transfers.
    #[must_use]
    pub fn new(
        catalog: Catalog,
        plugins: Arc<PluginRegistry>,
        importer: Importer,
        max_concurrent_downloads: usize,
    ) -> Self {
        Self {
            catalog,
            plugins,
            importer,
            semaphore: Arc::new(Semaphore::new(max_concurrent_downloads)),
            permits: DashMap::new(),
            progress_locks: DashMap::new(),
        }
    }

    /// Queues a grab for `release`, or returns the id of an already-active
    /// download for the same release guid (idempotent re-grab).
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Catalog`] if the catalog operation fails.
    #[instrument(skip(self, source, metadata), fields(name = %name))]
    pub async fn grab(
        &self,
        plugin_id: &str,
        name: &str,
        source: &str,
        release_guid: &str,
        priority: i64,
        metadata: ValueMap,
    ) -> Result<i64, DispatchError> {
        if let Some(existing) = self.catalog.downloads().active_for_release(release_guid).await? {
            return Ok(existing.id);
        }

        let new_download = NewDownload {
            plugin_id: plugin_id.to_string(),
            name: name.to_string(),
            source: source.to_string(),
            release_guid: Some(release_guid.to_string()),
            priority,
            metadata,
            created_by_user_id: None,
        };
        let id = self.catalog.downloads().insert(&new_download).await?;
        Ok(id)
    }

    /// Claims as many queued downloads as the fleet has spare capacity for
    /// and starts each one with its matching downloader plugin.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Catalog`] if claiming queued downloads
    /// fails. Per-download start failures are recorded on the download
    /// itself and do not fail the tick.
    #[instrument(skip(self))]
    pub async fn dispatch_tick(&self) -> Result<usize, DispatchError> {
        let available = self.semaphore.available_permits();
        if available == 0 {
            return Ok(0);
        }

        let claimed = self.catalog.downloads().claim_queued(available as i64).await?;
        let mut started = 0;
        for download in claimed {
            let permit = Arc::clone(&self.semaphore)
                .acquire_owned()
                .await
                .expect("dispatcher semaphore is never closed");

            match self.start_one(&download).await {
                Ok(()) => {
                    self.permits.insert(download.id, permit);
                    started += 1;
                }
                Err(error) => {
                    warn!(download_id = download.id, %error, "failed to start download");
                    if let Err(fail_err) = self.catalog.downloads().fail(download.id, &error.to_string()).await {
                        warn!(download_id = download.id, error = %fail_err, "failed to record download failure");
                    }
                    drop(permit);
                }
            }
        }
        Ok(started)
    }

    async fn start_one(&self, download: &Download) -> Result<(), DispatchError> {
        let downloader = self.downloader_for(download)?;

        let external_id = self.plugins.start_download(downloader, download.source.clone()).await?;
        self.catalog.downloads().set_external_id(download.id, &external_id).await?;
        Ok(())
    }

    /// Polls every download currently in `Downloading` status, updates its
    /// progress, and transitions it to `Processing` once the plugin reports
    /// completion.
    ///
    /// Progress writes for a single download are serialized through a
    /// per-download keyed mutex so a slow poll can never race a faster one
    /// and write stale progress over fresh progress.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Catalog`] if listing active downloads
    /// fails. Per-download poll failures are logged and skipped.
    #[instrument(skip(self))]
    pub async fn poll_tick(&self) -> Result<(), DispatchError> {
        self.reacquire_permits().await?;
        let active = self.active_downloading().await?;
        for download in active {
            if let Err(error) = self.poll_one(&download).await {
                warn!(download_id = download.id, %error, "failed to poll download progress");
            }
        }
        Ok(())
    }

    /// Lists every download the catalog considers `Downloading`, independent
    /// of which dispatcher instance (or process) started it. A freshly
    /// started dispatcher that inherits downloads left mid-transfer by a
    /// prior process has no permit for them yet; [`Self::reacquire_permits`]
    /// backfills the fleet-cap bookkeeping for exactly that case.
    async fn active_downloading(&self) -> Result<Vec<Download>, DispatchError> {
        Ok(self.catalog.downloads().list_by_status(DownloadStatus::Downloading).await?)
    }

    /// Acquires a fleet-cap permit for every `Downloading` row this
    /// dispatcher instance doesn't already hold one for, so restart-inherited
    /// downloads count against the concurrency cap exactly like ones this
    /// process started.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Catalog`] if listing active downloads fails.
    #[instrument(skip(self))]
    pub async fn reacquire_permits(&self) -> Result<(), DispatchError> {
        for download in self.active_downloading().await? {
            if self.permits.contains_key(&download.id) {
                continue;
            }
            match Arc::clone(&self.semaphore).try_acquire_owned() {
                Ok(permit) => {
                    self.permits.insert(download.id, permit);
                }
                Err(_) => {
                    warn!(download_id = download.id, "no spare fleet-cap permit to resume tracking an inherited download");
                }
            }
        }
        Ok(())
    }

    /// Selects the downloader plugin responsible for `download`, using the
    /// release category tagged on it at grab time.
    fn downloader_for(&self, download: &Download) -> Result<Arc<dyn crate::plugin::Downloader>, DispatchError> {
        let category = download.metadata().get("category").and_then(Value::as_str).map(str::to_string);
        self.plugins
            .downloader_for(category.as_deref(), &download.source)
            .ok_or_else(|| DispatchError::NoCapableDownloader(download.source.clone()))
    }

    async fn poll_one(&self, download: &Download) -> Result<(), DispatchError> {
        let Some(external_id) = download.external_download_id.clone() else {
            return Ok(());
        };
        let downloader = self.downloader_for(download)?;

        let lock = Arc::clone(self.progress_locks.entry(download.id).or_insert_with(|| Arc::new(Mutex::new(()))).value());
        let _guard = lock.lock().await;

        let progress = self.plugins.poll_download(downloader, external_id).await?;
        self.catalog
            .downloads()
            .update_progress(download.id, progress.percent, progress.downloaded_bytes, progress.total_bytes)
            .await?;

        if progress.percent >= 100 {
            self.catalog.downloads().set_status(download.id, DownloadStatus::Processing).await?;
        }
        Ok(())
    }

    /// Imports every download sitting in `Processing`, asking its downloader
    /// plugin once more for the on-disk path the transfer landed at.
    ///
    /// A plugin that hasn't resolved a path yet (`local_path` still `None`)
    /// is left in `Processing` for a later tick; everything else either
    /// completes or fails terminally.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Catalog`] if listing processing downloads
    /// fails. Per-download import failures are recorded on the download and
    /// do not fail the tick.
    #[instrument(skip(self))]
    pub async fn import_tick(&self) -> Result<usize, DispatchError> {
        let processing = self.catalog.downloads().list_by_status(DownloadStatus::Processing).await?;
        let mut imported = 0;
        for download in processing {
            match self.import_one(&download).await {
                Ok(true) => imported += 1,
                Ok(false) => {}
                Err(error) => {
                    warn!(download_id = download.id, %error, "failed to import download");
                    if let Err(fail_err) = self.catalog.downloads().fail(download.id, &error.to_string()).await {
                        warn!(download_id = download.id, error = %fail_err, "failed to record import failure");
                    }
                    self.permits.remove(&download.id);
                    self.progress_locks.remove(&download.id);
                }
            }
        }
        Ok(imported)
    }

    /// Returns `Ok(true)` if `download` was imported and marked completed.
    async fn import_one(&self, download: &Download) -> Result<bool, DispatchError> {
        let Some(external_id) = download.external_download_id.clone() else {
            return Ok(false);
        };
        let downloader = self.downloader_for(download)?;

        let progress = self.plugins.poll_download(downloader, external_id).await?;
        let Some(local_path) = progress.local_path else {
            return Ok(false);
        };

        let metadata = download.metadata();
        let media_item_id = metadata
            .get("media_item_id")
            .and_then(crate::model::Value::as_i64)
            .ok_or_else(|| DispatchError::MissingMediaItemTag(download.id))?;
        let quality_label = metadata.get("quality_label").and_then(crate::model::Value::as_str);

        let outcome = self
            .importer
            .import(&local_path, media_item_id, quality_label)
            .await
            .map_err(DispatchError::Import)?;

        self.mark_completed(download.id, &outcome.final_path.to_string_lossy()).await?;
        Ok(true)
    }

    /// Marks a download completed at `destination_path`, releasing its
    /// fleet-cap permit.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Catalog`] if the update fails.
    #[instrument(skip(self))]
    pub async fn mark_completed(&self, download_id: i64, destination_path: &str) -> Result<(), DispatchError> {
        self.catalog.downloads().complete(download_id, destination_path).await?;
        self.permits.remove(&download_id);
        self.progress_locks.remove(&download_id);
        Ok(())
    }

    /// Marks a download failed, releasing its fleet-cap permit.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Catalog`] if the update fails.
    #[instrument(skip(self))]
    pub async fn mark_failed(&self, download_id: i64, error_message: &str) -> Result<(), DispatchError> {
        self.catalog.downloads().fail(download_id, error_message).await?;
        self.permits.remove(&download_id);
        self.progress_locks.remove(&download_id);
        Ok(())
    }

    /// Applies a control action to an in-flight download.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::DownloadNotFound`] if the download doesn't
    /// exist, [`DispatchError::IllegalTransition`] if the action isn't
    /// valid from the download's current status, or
    /// [`DispatchError::Plugin`] if cancelling via the plugin fails.
    #[instrument(skip(self))]
    pub async fn control(&self, download_id: i64, action: ControlAction) -> Result<(), DispatchError> {
        let download = self
            .catalog
            .downloads()
            .get(download_id)
            .await?
            .ok_or(DispatchError::DownloadNotFound(download_id))?;
        let current = download.status();

        let target = match action {
            ControlAction::Pause => DownloadStatus::Paused,
            ControlAction::Resume => DownloadStatus::Downloading,
            ControlAction::Cancel => DownloadStatus::Cancelled,
        };

        if !current.can_transition_to(target) {
            return Err(DispatchError::IllegalTransition(download_id, current.as_str(), target.as_str()));
        }

        if action == ControlAction::Cancel {
            if let (Some(external_id), Ok(downloader)) = (download.external_download_id.clone(), self.downloader_for(&download)) {
                self.plugins.poll_download(Arc::clone(&downloader), external_id.clone()).await.ok();
                downloader.cancel(&external_id).await?;
            }
            self.permits.remove(&download_id);
            self.progress_locks.remove(&download_id);
        }

        self.catalog.downloads().set_status(download_id, target).await?;
        Ok(())
    }
}

/// Returns a metadata value suitable for tagging a download with the id of
/// the media item it satisfies, the quality it was grabbed at, and the
/// release category it was grabbed under, since `Download` itself has none
/// of those columns. The importer reads the first two back out when it
/// places the finished file; the dispatcher reads the category back out to
/// reselect the same downloader on every subsequent poll/import/cancel.
#[must_use]
pub fn media_item_tag(media_item_id: i64, quality_label: &str, category: Option<&str>) -> ValueMap {
    let mut metadata = ValueMap::new();
    metadata.insert("media_item_id".to_string(), Value::from(media_item_id));
    metadata.insert("quality_label".to_string(), Value::from(quality_label));
    if let Some(category) = category {
        metadata.insert("category".to_string(), Value::from(category));
    }
    metadata
}
