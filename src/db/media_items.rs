//! Repository for `media_items`, `media_files`, and `media_relations`.

use sqlx::SqlitePool;
use tracing::instrument;

use crate::model::{MediaFile, MediaItem, NewMediaItem};

use super::CatalogError;

/// Query/mutation surface over the media hierarchy tables.
#[derive(Debug, Clone, Copy)]
pub struct MediaItemsRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> MediaItemsRepository<'a> {
    pub(super) fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Inserts a new media item, returning its assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Connection`] if the insert violates the
    /// natural-key `UNIQUE` constraint or otherwise fails.
    #[instrument(skip(self, new_item), fields(title = %new_item.title))]
    pub async fn insert(&self, new_item: &NewMediaItem) -> Result<i64, CatalogError> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO media_items (kind, title, sort_title, year, parent_id, external_ids, metadata)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(new_item.kind.as_str())
        .bind(&new_item.title)
        .bind(&new_item.sort_title)
        .bind(new_item.year)
        .bind(new_item.parent_id)
        .bind(new_item.external_ids_json())
        .bind(new_item.metadata_json())
        .fetch_one(self.pool)
        .await?;
        Ok(id)
    }

    /// Fetches a media item by id.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Connection`] if the query fails.
    #[instrument(skip(self))]
    pub async fn get(&self, id: i64) -> Result<Option<MediaItem>, CatalogError> {
        let item = sqlx::query_as::<_, MediaItem>("SELECT * FROM media_items WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(item)
    }

    /// Walks the parent chain starting at `id`, returning items ordered from
    /// `id` itself up to the hierarchy root.
    ///
    /// Used by the aggregator to recover a movie/series/season/episode's
    /// full ancestry when building a search request.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Connection`] if a query fails partway
    /// through the walk.
    #[instrument(skip(self))]
    pub async fn parent_chain(&self, id: i64) -> Result<Vec<MediaItem>, CatalogError> {
        let mut chain = Vec::new();
        let mut current = self.get(id).await?;
        while let Some(item) = current {
            let parent_id = item.parent_id;
            chain.push(item);
            current = match parent_id {
                Some(parent_id) => self.get(parent_id).await?,
                None => None,
            };
        }
        Ok(chain)
    }

    /// Lists direct children of `parent_id`, ordered by year then title.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Connection`] if the query fails.
    #[instrument(skip(self))]
    pub async fn children(&self, parent_id: i64) -> Result<Vec<MediaItem>, CatalogError> {
        let items = sqlx::query_as::<_, MediaItem>(
            "SELECT * FROM media_items WHERE parent_id = ? ORDER BY year, sort_title",
        )
        .bind(parent_id)
        .fetch_all(self.pool)
        .await?;
        Ok(items)
    }

    /// Walks every descendant of `root_id` (not including `root_id` itself),
    /// at any depth, ordered by year then title.
    ///
    /// Used by the scheduler to resolve a monitoring rule's search targets
    /// when the rule watches a hierarchy node (a series or season) rather
    /// than a single searchable leaf.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Connection`] if the query fails.
    #[instrument(skip(self))]
    pub async fn descendants(&self, root_id: i64) -> Result<Vec<MediaItem>, CatalogError> {
        let items = sqlx::query_as::<_, MediaItem>(
            r"WITH RECURSIVE tree(id) AS (
                  SELECT id FROM media_items WHERE parent_id = ?
                  UNION ALL
                  SELECT media_items.id FROM media_items JOIN tree ON media_items.parent_id = tree.id
              )
              SELECT media_items.* FROM media_items JOIN tree ON media_items.id = tree.id
              ORDER BY media_items.year, media_items.sort_title",
        )
        .bind(root_id)
        .fetch_all(self.pool)
        .await?;
        Ok(items)
    }

    /// Sets the `monitored` convenience flag on an item.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Connection`] if the update fails.
    #[instrument(skip(self))]
    pub async fn set_monitored(&self, id: i64, monitored: bool) -> Result<(), CatalogError> {
        sqlx::query("UPDATE media_items SET monitored = ?, updated_at = datetime('now') WHERE id = ?")
            .bind(i64::from(monitored))
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Records a file placed on disk for `media_item_id`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Connection`] if the insert violates the
    /// path-uniqueness constraint or otherwise fails.
    #[instrument(skip(self))]
    pub async fn add_file(
        &self,
        media_item_id: i64,
        path: &str,
        size: i64,
    ) -> Result<i64, CatalogError> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO media_files (media_item_id, path, size) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(media_item_id)
        .bind(path)
        .bind(size)
        .fetch_one(self.pool)
        .await?;
        Ok(id)
    }

    /// Lists files recorded against `media_item_id`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Connection`] if the query fails.
    #[instrument(skip(self))]
    pub async fn files(&self, media_item_id: i64) -> Result<Vec<MediaFile>, CatalogError> {
        let files = sqlx::query_as::<_, MediaFile>(
            "SELECT * FROM media_files WHERE media_item_id = ? ORDER BY created_at",
        )
        .bind(media_item_id)
        .fetch_all(self.pool)
        .await?;
        Ok(files)
    }
}
