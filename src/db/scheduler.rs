//! Repository for scheduler job run-state.

use sqlx::SqlitePool;
use tracing::instrument;

use crate::model::SchedulerJob;

use super::CatalogError;

/// Query/mutation surface over `scheduler_jobs`.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SchedulerRepository<'a> {
    pub(super) fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Registers a named job, doing nothing if it already exists.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Connection`] if the query fails for a reason
    /// other than the name already being registered.
    #[instrument(skip(self))]
    pub async fn ensure_registered(&self, name: &str, interval_secs: i64) -> Result<(), CatalogError> {
        sqlx::query(
            "INSERT INTO scheduler_jobs (name, interval_secs) VALUES (?, ?)
             ON CONFLICT(name) DO NOTHING",
        )
        .bind(name)
        .bind(interval_secs)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Atomically claims `name` for execution if it is enabled, not already
    /// running, and due, flipping `running` to `1` in the same statement
    /// that checks eligibility. This is the run-guard that prevents the
    /// same job from starting twice concurrently.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Connection`] if the query fails.
    #[instrument(skip(self))]
    pub async fn try_claim(&self, name: &str) -> Result<bool, CatalogError> {
        let claimed = sqlx::query(
            r"UPDATE scheduler_jobs
              SET running = 1
              WHERE name = ? AND enabled = 1 AND running = 0 AND next_run_at <= datetime('now')",
        )
        .bind(name)
        .execute(self.pool)
        .await?;
        Ok(claimed.rows_affected() > 0)
    }

    /// Releases a job after a successful run, scheduling its next run and
    /// resetting the consecutive-failure counter.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Connection`] if the update fails.
    #[instrument(skip(self))]
    pub async fn release_success(&self, name: &str, duration_ms: i64) -> Result<(), CatalogError> {
        sqlx::query(
            r"UPDATE scheduler_jobs
              SET running = 0,
                  last_run_at = datetime('now'),
                  last_run_duration_ms = ?,
                  next_run_at = datetime('now', '+' || interval_secs || ' seconds'),
                  consecutive_failures = 0,
                  last_status = 'ok'
              WHERE name = ?",
        )
        .bind(duration_ms)
        .bind(name)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Releases a job after a failed run, scheduling its next attempt with
    /// an exponential backoff based on the new consecutive-failure count,
    /// capped at `max_backoff_secs`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Connection`] if the update fails.
    #[instrument(skip(self))]
    pub async fn release_failure(
        &self,
        name: &str,
        error: &str,
        max_backoff_secs: i64,
    ) -> Result<(), CatalogError> {
        sqlx::query(
            r"UPDATE scheduler_jobs
              SET running = 0,
                  last_run_at = datetime('now'),
                  consecutive_failures = consecutive_failures + 1,
                  next_run_at = datetime('now', '+' || MIN(
                      ?, interval_secs * (1 << MIN(consecutive_failures + 1, 20))
                  ) || ' seconds'),
                  last_status = ?
              WHERE name = ?",
        )
        .bind(max_backoff_secs)
        .bind(error)
        .bind(name)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Fetches a job by name.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Connection`] if the query fails.
    #[instrument(skip(self))]
    pub async fn get(&self, name: &str) -> Result<Option<SchedulerJob>, CatalogError> {
        let job = sqlx::query_as::<_, SchedulerJob>("SELECT * FROM scheduler_jobs WHERE name = ?")
            .bind(name)
            .fetch_optional(self.pool)
            .await?;
        Ok(job)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::super::Catalog;

    #[tokio::test]
    async fn try_claim_is_exclusive() {
        let catalog = Catalog::new_in_memory().await.unwrap();
        let repo = catalog.scheduler();
        repo.ensure_registered("monitored_search", 60).await.unwrap();

        assert!(repo.try_claim("monitored_search").await.unwrap());
        assert!(
            !repo.try_claim("monitored_search").await.unwrap(),
            "a second claim while running should fail"
        );
    }

    #[tokio::test]
    async fn release_success_reopens_the_run_guard() {
        let catalog = Catalog::new_in_memory().await.unwrap();
        let repo = catalog.scheduler();
        repo.ensure_registered("monitored_search", 60).await.unwrap();
        repo.try_claim("monitored_search").await.unwrap();
        repo.release_success("monitored_search", 120).await.unwrap();

        sqlx::query("UPDATE scheduler_jobs SET next_run_at = datetime('now', '-1 second') WHERE name = 'monitored_search'")
            .execute(catalog.pool())
            .await
            .unwrap();

        assert!(repo.try_claim("monitored_search").await.unwrap());
    }

    #[tokio::test]
    async fn release_failure_increments_consecutive_failures() {
        let catalog = Catalog::new_in_memory().await.unwrap();
        let repo = catalog.scheduler();
        repo.ensure_registered("monitored_search", 60).await.unwrap();
        repo.try_claim("monitored_search").await.unwrap();
        repo.release_failure("monitored_search", "boom", 3600).await.unwrap();

        let job = repo.get("monitored_search").await.unwrap().unwrap();
        assert_eq!(job.consecutive_failures, 1);
        assert!(!job.is_running());
        assert_eq!(job.last_status.as_deref(), Some("boom"));
    }
}
