//! Repository for quality definitions, profiles, and per-item quality state.

use sqlx::SqlitePool;
use tracing::instrument;

use crate::model::{MediaQualityState, QualityDefinition, QualityProfile, QualityProfileItem};

use super::CatalogError;

/// Query/mutation surface over the quality policy tables.
#[derive(Debug, Clone, Copy)]
pub struct QualityRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> QualityRepository<'a> {
    pub(super) fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Fetches a quality definition by id.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Connection`] if the query fails.
    #[instrument(skip(self))]
    pub async fn definition(&self, id: i64) -> Result<Option<QualityDefinition>, CatalogError> {
        let def = sqlx::query_as::<_, QualityDefinition>("SELECT * FROM quality_definitions WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(def)
    }

    /// Lists all quality definitions ordered from worst to best.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Connection`] if the query fails.
    #[instrument(skip(self))]
    pub async fn all_definitions(&self) -> Result<Vec<QualityDefinition>, CatalogError> {
        let defs = sqlx::query_as::<_, QualityDefinition>(
            "SELECT * FROM quality_definitions ORDER BY weight ASC",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(defs)
    }

    /// Fetches a quality profile by id.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Connection`] if the query fails.
    #[instrument(skip(self))]
    pub async fn profile(&self, id: i64) -> Result<Option<QualityProfile>, CatalogError> {
        let profile = sqlx::query_as::<_, QualityProfile>("SELECT * FROM quality_profiles WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(profile)
    }

    /// Lists the membership rows for `profile_id`, ordered per the
    /// profile's `sort_order` (worst to best).
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Connection`] if the query fails.
    #[instrument(skip(self))]
    pub async fn profile_items(&self, profile_id: i64) -> Result<Vec<QualityProfileItem>, CatalogError> {
        let items = sqlx::query_as::<_, QualityProfileItem>(
            "SELECT * FROM quality_profile_items WHERE profile_id = ? ORDER BY sort_order ASC",
        )
        .bind(profile_id)
        .fetch_all(self.pool)
        .await?;
        Ok(items)
    }

    /// Fetches the current quality state of a media item, if any.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Connection`] if the query fails.
    #[instrument(skip(self))]
    pub async fn state(&self, media_item_id: i64) -> Result<Option<MediaQualityState>, CatalogError> {
        let state = sqlx::query_as::<_, MediaQualityState>(
            "SELECT * FROM media_quality_state WHERE media_item_id = ?",
        )
        .bind(media_item_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(state)
    }

    /// Upserts the current quality state for a media item and records the
    /// transition in `quality_upgrade_history` when the quality changed.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Connection`] if either write fails. The two
    /// statements are not wrapped in an explicit transaction since both
    /// operate on rows scoped to a single `media_item_id` and a partial
    /// write only loses history, never corrupts current state.
    #[instrument(skip(self))]
    pub async fn record_quality(
        &self,
        media_item_id: i64,
        new_quality_id: i64,
        cutoff_met: bool,
    ) -> Result<(), CatalogError> {
        let previous = self.state(media_item_id).await?;
        let previous_quality_id = previous.and_then(|s| s.current_quality_id);

        sqlx::query(
            "INSERT INTO media_quality_state (media_item_id, current_quality_id, cutoff_met, updated_at)
             VALUES (?, ?, ?, datetime('now'))
             ON CONFLICT(media_item_id) DO UPDATE SET
                current_quality_id = excluded.current_quality_id,
                cutoff_met = excluded.cutoff_met,
                updated_at = excluded.updated_at",
        )
        .bind(media_item_id)
        .bind(new_quality_id)
        .bind(i64::from(cutoff_met))
        .execute(self.pool)
        .await?;

        if previous_quality_id != Some(new_quality_id) {
            sqlx::query(
                "INSERT INTO quality_upgrade_history (media_item_id, previous_quality_id, new_quality_id)
                 VALUES (?, ?, ?)",
            )
            .bind(media_item_id)
            .bind(previous_quality_id)
            .bind(new_quality_id)
            .execute(self.pool)
            .await?;
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::super::Catalog;

    async fn seed_profile(catalog: &Catalog) -> (i64, i64, i64) {
        let low_id: i64 = sqlx::query_scalar(
            "INSERT INTO quality_definitions (name, weight, resolution) VALUES ('SD', 1, 480) RETURNING id",
        )
        .fetch_one(catalog.pool())
        .await
        .unwrap();
        let high_id: i64 = sqlx::query_scalar(
            "INSERT INTO quality_definitions (name, weight, resolution) VALUES ('HD', 2, 1080) RETURNING id",
        )
        .fetch_one(catalog.pool())
        .await
        .unwrap();
        let profile_id: i64 = sqlx::query_scalar(
            "INSERT INTO quality_profiles (name, cutoff_quality_id) VALUES ('Standard', ?) RETURNING id",
        )
        .bind(high_id)
        .fetch_one(catalog.pool())
        .await
        .unwrap();
        (low_id, high_id, profile_id)
    }

    #[tokio::test]
    async fn record_quality_inserts_state_and_history_on_change() {
        let catalog = Catalog::new_in_memory().await.unwrap();
        let (low_id, high_id, _) = seed_profile(&catalog).await;
        let item_id: i64 = sqlx::query_scalar(
            "INSERT INTO media_items (kind, title, sort_title) VALUES ('movie', 'Arrival', 'Arrival') RETURNING id",
        )
        .fetch_one(catalog.pool())
        .await
        .unwrap();

        let repo = catalog.quality();
        repo.record_quality(item_id, low_id, false).await.unwrap();
        repo.record_quality(item_id, high_id, true).await.unwrap();

        let state = repo.state(item_id).await.unwrap().unwrap();
        assert_eq!(state.current_quality_id, Some(high_id));
        assert!(state.cutoff_met());

        let history_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM quality_upgrade_history WHERE media_item_id = ?")
                .bind(item_id)
                .fetch_one(catalog.pool())
                .await
                .unwrap();
        assert_eq!(history_count, 2);
    }

    #[tokio::test]
    async fn record_quality_skips_history_when_quality_unchanged() {
        let catalog = Catalog::new_in_memory().await.unwrap();
        let (low_id, _high_id, _) = seed_profile(&catalog).await;
        let item_id: i64 = sqlx::query_scalar(
            "INSERT INTO media_items (kind, title, sort_title) VALUES ('movie', 'Arrival', 'Arrival') RETURNING id",
        )
        .fetch_one(catalog.pool())
        .await
        .unwrap();

        let repo = catalog.quality();
        repo.record_quality(item_id, low_id, false).await.unwrap();
        repo.record_quality(item_id, low_id, false).await.unwrap();

        let history_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM quality_upgrade_history WHERE media_item_id = ?")
                .bind(item_id)
                .fetch_one(catalog.pool())
                .await
                .unwrap();
        assert_eq!(history_count, 1);
    }
}
