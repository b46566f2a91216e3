//! Repository for downloads and their log entries.

use sqlx::SqlitePool;
use tracing::instrument;

use crate::model::{Download, DownloadLogEntry, DownloadStatus, NewDownload};

use super::CatalogError;

/// Query/mutation surface over `downloads` and `download_log`.
#[derive(Debug, Clone, Copy)]
pub struct DownloadsRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> DownloadsRepository<'a> {
    pub(super) fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Queues a new download in status `queued`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Connection`] if the insert fails.
    #[instrument(skip(self, new_download), fields(name = %new_download.name))]
    pub async fn insert(&self, new_download: &NewDownload) -> Result<i64, CatalogError> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO downloads (plugin_id, name, status, source, release_guid, priority, metadata, created_by_user_id)
             VALUES (?, ?, 'queued', ?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(&new_download.plugin_id)
        .bind(&new_download.name)
        .bind(&new_download.source)
        .bind(&new_download.release_guid)
        .bind(new_download.priority)
        .bind(new_download.metadata_json())
        .bind(new_download.created_by_user_id)
        .fetch_one(self.pool)
        .await?;
        Ok(id)
    }

    /// Fetches a download by id.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Connection`] if the query fails.
    #[instrument(skip(self))]
    pub async fn get(&self, id: i64) -> Result<Option<Download>, CatalogError> {
        let download = sqlx::query_as::<_, Download>("SELECT * FROM downloads WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(download)
    }

    /// Finds an existing, non-terminal download for `release_guid`, used to
    /// make re-grabbing the same release idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Connection`] if the query fails.
    #[instrument(skip(self))]
    pub async fn active_for_release(&self, release_guid: &str) -> Result<Option<Download>, CatalogError> {
        let download = sqlx::query_as::<_, Download>(
            "SELECT * FROM downloads
             WHERE release_guid = ? AND status NOT IN ('completed', 'failed', 'cancelled')
             ORDER BY created_at DESC
             LIMIT 1",
        )
        .bind(release_guid)
        .fetch_optional(self.pool)
        .await?;
        Ok(download)
    }

    /// Atomically claims up to `limit` queued downloads for dispatch,
    /// highest priority first, flipping them to `downloading` so a second
    /// dispatcher tick cannot also pick them up.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Connection`] if the query fails.
    #[instrument(skip(self))]
    pub async fn claim_queued(&self, limit: i64) -> Result<Vec<Download>, CatalogError> {
        let claimed = sqlx::query_as::<_, Download>(
            r"UPDATE downloads
              SET status = 'downloading', started_at = datetime('now'), updated_at = datetime('now')
              WHERE id IN (
                  SELECT id FROM downloads
                  WHERE status = 'queued'
                  ORDER BY priority DESC, created_at ASC
                  LIMIT ?
              )
              RETURNING *",
        )
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        Ok(claimed)
    }

    /// Lists every download currently in `status`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Connection`] if the query fails.
    #[instrument(skip(self))]
    pub async fn list_by_status(&self, status: DownloadStatus) -> Result<Vec<Download>, CatalogError> {
        let downloads = sqlx::query_as::<_, Download>("SELECT * FROM downloads WHERE status = ? ORDER BY updated_at ASC")
            .bind(status.as_str())
            .fetch_all(self.pool)
            .await?;
        Ok(downloads)
    }

    /// Records the downloader plugin's own id for a started transfer.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Connection`] if the update fails.
    #[instrument(skip(self))]
    pub async fn set_external_id(&self, id: i64, external_download_id: &str) -> Result<(), CatalogError> {
        sqlx::query("UPDATE downloads SET external_download_id = ?, updated_at = datetime('now') WHERE id = ?")
            .bind(external_download_id)
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Updates progress fields for an in-flight download.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Connection`] if the update fails.
    #[instrument(skip(self))]
    pub async fn update_progress(
        &self,
        id: i64,
        progress: i64,
        downloaded_bytes: i64,
        total_bytes: Option<i64>,
    ) -> Result<(), CatalogError> {
        sqlx::query(
            "UPDATE downloads
             SET progress = ?, downloaded_bytes = ?, total_bytes = COALESCE(?, total_bytes), updated_at = datetime('now')
             WHERE id = ?",
        )
        .bind(progress)
        .bind(downloaded_bytes)
        .bind(total_bytes)
        .bind(id)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Transitions a download to a new status.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Connection`] if the update fails.
    #[instrument(skip(self))]
    pub async fn set_status(&self, id: i64, status: DownloadStatus) -> Result<(), CatalogError> {
        let completed_at_clause = if status.is_terminal() {
            ", completed_at = datetime('now')"
        } else {
            ""
        };
        let sql = format!(
            "UPDATE downloads SET status = ?, updated_at = datetime('now'){completed_at_clause} WHERE id = ?"
        );
        sqlx::query(&sql).bind(status.as_str()).bind(id).execute(self.pool).await?;
        Ok(())
    }

    /// Records the destination path and marks a download completed.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Connection`] if the update fails.
    #[instrument(skip(self))]
    pub async fn complete(&self, id: i64, destination_path: &str) -> Result<(), CatalogError> {
        sqlx::query(
            "UPDATE downloads
             SET status = 'completed', destination_path = ?, completed_at = datetime('now'), updated_at = datetime('now')
             WHERE id = ?",
        )
        .bind(destination_path)
        .bind(id)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Marks a download failed with an error message.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Connection`] if the update fails.
    #[instrument(skip(self))]
    pub async fn fail(&self, id: i64, error_message: &str) -> Result<(), CatalogError> {
        sqlx::query(
            "UPDATE downloads
             SET status = 'failed', error_message = ?, completed_at = datetime('now'), updated_at = datetime('now')
             WHERE id = ?",
        )
        .bind(error_message)
        .bind(id)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Appends a log line for a download.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Connection`] if the insert fails.
    #[instrument(skip(self, message))]
    pub async fn log(&self, download_id: i64, level: &str, message: &str) -> Result<(), CatalogError> {
        sqlx::query("INSERT INTO download_log (download_id, level, message) VALUES (?, ?, ?)")
            .bind(download_id)
            .bind(level)
            .bind(message)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Lists log entries for a download, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Connection`] if the query fails.
    #[instrument(skip(self))]
    pub async fn logs(&self, download_id: i64) -> Result<Vec<DownloadLogEntry>, CatalogError> {
        let logs = sqlx::query_as::<_, DownloadLogEntry>(
            "SELECT * FROM download_log WHERE download_id = ? ORDER BY created_at ASC",
        )
        .bind(download_id)
        .fetch_all(self.pool)
        .await?;
        Ok(logs)
    }

    /// Counts downloads currently in a non-terminal state, used to enforce
    /// the dispatcher's fleet concurrency cap.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Connection`] if the query fails.
    #[instrument(skip(self))]
    pub async fn active_count(&self) -> Result<i64, CatalogError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM downloads WHERE status NOT IN ('completed', 'failed', 'cancelled')",
        )
        .fetch_one(self.pool)
        .await?;
        Ok(count)
    }
}
