//! Repository for monitoring rules.

use sqlx::SqlitePool;
use tracing::instrument;

use crate::model::MonitoringRule;

use super::CatalogError;

/// Query/mutation surface over `monitoring_rules`.
#[derive(Debug, Clone, Copy)]
pub struct MonitoringRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> MonitoringRepository<'a> {
    pub(super) fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Creates a monitoring rule for `media_item_id`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Connection`] if the insert violates the
    /// one-rule-per-item `UNIQUE` constraint or otherwise fails.
    #[instrument(skip(self))]
    pub async fn create(
        &self,
        media_item_id: i64,
        profile_id: i64,
        monitor_mode: &str,
        search_interval_secs: i64,
    ) -> Result<i64, CatalogError> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO monitoring_rules (media_item_id, profile_id, monitor_mode, search_interval_secs, next_search_at)
             VALUES (?, ?, ?, ?, datetime('now'))
             RETURNING id",
        )
        .bind(media_item_id)
        .bind(profile_id)
        .bind(monitor_mode)
        .bind(search_interval_secs)
        .fetch_one(self.pool)
        .await?;
        Ok(id)
    }

    /// Fetches a rule by the media item it watches.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Connection`] if the query fails.
    #[instrument(skip(self))]
    pub async fn for_media_item(&self, media_item_id: i64) -> Result<Option<MonitoringRule>, CatalogError> {
        let rule = sqlx::query_as::<_, MonitoringRule>(
            "SELECT * FROM monitoring_rules WHERE media_item_id = ?",
        )
        .bind(media_item_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(rule)
    }

    /// Atomically claims the single most overdue enabled, automatic rule and
    /// stamps its `next_search_at` forward by `search_interval_secs`.
    ///
    /// Uses an atomic `UPDATE ... WHERE id = (SELECT ...) RETURNING` so two
    /// concurrent scheduler ticks can never claim the same rule.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Connection`] if the query fails.
    #[instrument(skip(self))]
    pub async fn claim_due_rule(&self) -> Result<Option<MonitoringRule>, CatalogError> {
        let rule = sqlx::query_as::<_, MonitoringRule>(
            r"UPDATE monitoring_rules
              SET last_search_at = datetime('now'),
                  next_search_at = datetime('now', '+' || search_interval_secs || ' seconds'),
                  search_count = search_count + 1
              WHERE id = (
                  SELECT id FROM monitoring_rules
                  WHERE enabled = 1 AND automatic_search = 1
                    AND (next_search_at IS NULL OR next_search_at <= datetime('now'))
                  ORDER BY next_search_at ASC
                  LIMIT 1
              )
              RETURNING *",
        )
        .fetch_optional(self.pool)
        .await?;
        Ok(rule)
    }

    /// Records the outcome of a search against a rule.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Connection`] if the update fails.
    #[instrument(skip(self))]
    pub async fn record_search_result(
        &self,
        rule_id: i64,
        items_found: i64,
        items_grabbed: i64,
    ) -> Result<(), CatalogError> {
        sqlx::query(
            "UPDATE monitoring_rules
             SET items_found = items_found + ?, items_grabbed = items_grabbed + ?
             WHERE id = ?",
        )
        .bind(items_found)
        .bind(items_grabbed)
        .bind(rule_id)
        .execute(self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::super::Catalog;

    async fn seed_item_and_profile(catalog: &Catalog) -> (i64, i64) {
        let item_id: i64 = sqlx::query_scalar(
            "INSERT INTO media_items (kind, title, sort_title) VALUES ('movie', 'Arrival', 'Arrival') RETURNING id",
        )
        .fetch_one(catalog.pool())
        .await
        .unwrap();
        let quality_id: i64 = sqlx::query_scalar(
            "INSERT INTO quality_definitions (name, weight) VALUES ('HD', 1) RETURNING id",
        )
        .fetch_one(catalog.pool())
        .await
        .unwrap();
        let profile_id: i64 = sqlx::query_scalar(
            "INSERT INTO quality_profiles (name, cutoff_quality_id) VALUES ('Standard', ?) RETURNING id",
        )
        .bind(quality_id)
        .fetch_one(catalog.pool())
        .await
        .unwrap();
        (item_id, profile_id)
    }

    #[tokio::test]
    async fn claim_due_rule_returns_overdue_rule_once() {
        let catalog = Catalog::new_in_memory().await.unwrap();
        let (item_id, profile_id) = seed_item_and_profile(&catalog).await;
        let repo = catalog.monitoring();
        repo.create(item_id, profile_id, "all", 3600).await.unwrap();

        sqlx::query("UPDATE monitoring_rules SET next_search_at = datetime('now', '-1 hour')")
            .execute(catalog.pool())
            .await
            .unwrap();

        let claimed = repo.claim_due_rule().await.unwrap();
        assert!(claimed.is_some());

        let claimed_again = repo.claim_due_rule().await.unwrap();
        assert!(claimed_again.is_none(), "rule should not be claimable again until its interval elapses");
    }

    #[tokio::test]
    async fn disabled_rule_is_never_claimed() {
        let catalog = Catalog::new_in_memory().await.unwrap();
        let (item_id, profile_id) = seed_item_and_profile(&catalog).await;
        let repo = catalog.monitoring();
        let rule_id = repo.create(item_id, profile_id, "all", 3600).await.unwrap();
        sqlx::query("UPDATE monitoring_rules SET enabled = 0, next_search_at = datetime('now', '-1 hour') WHERE id = ?")
            .bind(rule_id)
            .execute(catalog.pool())
            .await
            .unwrap();

        assert!(repo.claim_due_rule().await.unwrap().is_none());
    }
}
