//! `SchedulerJob`: persisted run-state for a named recurring job.

use sqlx::FromRow;

/// Persisted state for a single named job the scheduler ticks.
///
/// `running` is the compare-and-swap flag the scheduler uses as a run-guard:
/// a tick only starts a job when it can atomically flip `running` from 0 to
/// 1 in the same statement that checks `next_run_at`, which is what prevents
/// a slow-running job from being started twice.
#[derive(Debug, Clone, FromRow)]
pub struct SchedulerJob {
    /// Unique identifier.
    pub id: i64,
    /// Unique job name (e.g. `"monitored_search"`, `"download_poll"`).
    pub name: String,
    /// Interval between runs, in seconds.
    pub interval_secs: i64,
    /// Whether the job is eligible to run at all.
    #[sqlx(rename = "enabled")]
    pub enabled_flag: i64,
    /// Run-guard: 1 while a tick currently owns this job.
    #[sqlx(rename = "running")]
    pub running_flag: i64,
    /// Timestamp of the last run start, if any.
    pub last_run_at: Option<String>,
    /// Duration of the last run, in milliseconds.
    pub last_run_duration_ms: Option<i64>,
    /// Timestamp at which the next run is due.
    pub next_run_at: String,
    /// Consecutive failure count, used to scale backoff.
    pub consecutive_failures: i64,
    /// Outcome of the last run (`"ok"`, `"error"`, ...), free text.
    pub last_status: Option<String>,
}

impl SchedulerJob {
    /// Returns `true` if the job is enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled_flag != 0
    }

    /// Returns `true` if a tick currently owns this job.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running_flag != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheduler_job_flags_decode() {
        let job = SchedulerJob {
            id: 1,
            name: "monitored_search".to_string(),
            interval_secs: 60,
            enabled_flag: 1,
            running_flag: 0,
            last_run_at: None,
            last_run_duration_ms: None,
            next_run_at: "now".to_string(),
            consecutive_failures: 0,
            last_status: None,
        };
        assert!(job.is_enabled());
        assert!(!job.is_running());
    }
}
