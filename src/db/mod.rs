//! Catalog connection and schema management.
//!
//! This module provides the `SQLite`-backed connection pool the rest of the
//! core treats as the transactional "catalog store" of record: media items,
//! files, quality policy, monitoring rules, scheduler jobs and downloads.
//!
//! # Example
//!
//! ```no_run
//! use fetchbay_core::Catalog;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let catalog = Catalog::new(Path::new("library.db")).await?;
//! // Use catalog.pool() for queries...
//! # Ok(())
//! # }
//! ```

mod downloads;
mod media_items;
mod monitoring;
mod quality;
mod scheduler;

pub use downloads::DownloadsRepository;
pub use media_items::MediaItemsRepository;
pub use monitoring::MonitoringRepository;
pub use quality::QualityRepository;
pub use scheduler::SchedulerRepository;

use std::path::Path;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use thiserror::Error;
use tracing::instrument;

/// Default maximum number of connections in the pool.
/// Kept low for `SQLite` since it uses file-level locking.
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// `SQLite` busy timeout in milliseconds.
const BUSY_TIMEOUT_MS: u32 = 5000;

/// Catalog-related errors.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Failed to connect to the catalog store.
    #[error("failed to connect to catalog: {0}")]
    Connection(#[from] sqlx::Error),

    /// Failed to run migrations.
    #[error("failed to run catalog migrations: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Connection pool wrapper for the media catalog.
///
/// Handles `SQLite` connection pooling, WAL mode configuration, and
/// automatic migration execution at startup.
#[derive(Debug, Clone)]
pub struct Catalog {
    pool: SqlitePool,
}

impl Catalog {
    /// Opens (creating if absent) the catalog database at `db_path`.
    ///
    /// This will:
    /// 1. Create the database file if it doesn't exist.
    /// 2. Enable WAL mode for concurrent reads.
    /// 3. Run any pending migrations.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Connection`] if the connection fails, or
    /// [`CatalogError::Migration`] if migrations fail.
    #[instrument(skip(db_path), fields(path = %db_path.display()))]
    pub async fn new(db_path: &Path) -> Result<Self, CatalogError> {
        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(DEFAULT_MAX_CONNECTIONS)
            .connect(&db_url)
            .await?;

        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&pool)
            .await?;
        sqlx::query("PRAGMA foreign_keys=ON").execute(&pool).await?;
        sqlx::query(&format!("PRAGMA busy_timeout={BUSY_TIMEOUT_MS}"))
            .execute(&pool)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Creates an in-memory catalog for testing.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Connection`] if the connection fails, or
    /// [`CatalogError::Migration`] if migrations fail.
    #[instrument]
    pub async fn new_in_memory() -> Result<Self, CatalogError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        sqlx::query("PRAGMA foreign_keys=ON").execute(&pool).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Returns a reference to the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Returns a repository for `media_items`/`media_files`/`media_relations`.
    #[must_use]
    pub fn media_items(&self) -> MediaItemsRepository<'_> {
        MediaItemsRepository::new(&self.pool)
    }

    /// Returns a repository for quality definitions, profiles, and state.
    #[must_use]
    pub fn quality(&self) -> QualityRepository<'_> {
        QualityRepository::new(&self.pool)
    }

    /// Returns a repository for monitoring rules.
    #[must_use]
    pub fn monitoring(&self) -> MonitoringRepository<'_> {
        MonitoringRepository::new(&self.pool)
    }

    /// Returns a repository for scheduler job state.
    #[must_use]
    pub fn scheduler(&self) -> SchedulerRepository<'_> {
        SchedulerRepository::new(&self.pool)
    }

    /// Returns a repository for downloads and their log entries.
    #[must_use]
    pub fn downloads(&self) -> DownloadsRepository<'_> {
        DownloadsRepository::new(&self.pool)
    }

    /// Gracefully closes all connections in the pool.
    #[instrument(skip(self))]
    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn new_in_memory_succeeds() {
        let catalog = Catalog::new_in_memory().await;
        assert!(catalog.is_ok(), "failed to create in-memory catalog");
    }

    #[tokio::test]
    async fn migrations_create_media_items_table() {
        let catalog = Catalog::new_in_memory().await.unwrap();
        let result = sqlx::query(
            "INSERT INTO media_items (kind, title, sort_title) VALUES ('movie', 'Arrival', 'Arrival')",
        )
        .execute(catalog.pool())
        .await;
        assert!(result.is_ok(), "media_items table should exist after migration");
    }

    #[tokio::test]
    async fn natural_key_uniqueness_is_enforced() {
        let catalog = Catalog::new_in_memory().await.unwrap();
        sqlx::query(
            "INSERT INTO media_items (kind, title, sort_title, year) VALUES ('movie', 'Arrival', 'Arrival', 2016)",
        )
        .execute(catalog.pool())
        .await
        .unwrap();

        let dup = sqlx::query(
            "INSERT INTO media_items (kind, title, sort_title, year) VALUES ('movie', 'Arrival', 'Arrival', 2016)",
        )
        .execute(catalog.pool())
        .await;
        assert!(dup.is_err(), "duplicate natural key should be rejected");
    }

    #[tokio::test]
    async fn media_file_path_uniqueness_is_enforced() {
        let catalog = Catalog::new_in_memory().await.unwrap();
        let item_id: i64 = sqlx::query_scalar(
            "INSERT INTO media_items (kind, title, sort_title) VALUES ('movie', 'Arrival', 'Arrival') RETURNING id",
        )
        .fetch_one(catalog.pool())
        .await
        .unwrap();

        sqlx::query("INSERT INTO media_files (media_item_id, path, size) VALUES (?, '/movies/a.mkv', 10)")
            .bind(item_id)
            .execute(catalog.pool())
            .await
            .unwrap();

        let dup = sqlx::query(
            "INSERT INTO media_files (media_item_id, path, size) VALUES (?, '/movies/a.mkv', 20)",
        )
        .bind(item_id)
        .execute(catalog.pool())
        .await;
        assert!(dup.is_err(), "duplicate media file path should be rejected");
    }
}
