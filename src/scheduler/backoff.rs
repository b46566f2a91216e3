//! Exponential backoff with jitter for scheduler job retries.

use std::time::Duration;

use rand::Rng;

/// Base delay for the first backoff step.
const BASE_DELAY_SECS: u64 = 30;

/// Maximum delay a backoff step can reach, before jitter.
pub(super) const MAX_DELAY_SECS: u64 = 3600;

/// Backoff multiplier (doubles each consecutive failure).
const BACKOFF_MULTIPLIER: f64 = 2.0;

/// Maximum jitter added to a delay, to avoid synchronized retries across jobs.
const MAX_JITTER_SECS: u64 = 30;

/// Computes the delay before the next attempt, given the number of
/// consecutive failures so far (1 for the first failure).
#[must_use]
pub fn delay_for(consecutive_failures: u32) -> Duration {
    let exponent = f64::from(consecutive_failures.saturating_sub(1));
    let base_secs = BASE_DELAY_SECS as f64 * BACKOFF_MULTIPLIER.powf(exponent);
    let capped_secs = base_secs.min(MAX_DELAY_SECS as f64);

    let mut rng = rand::thread_rng();
    let jitter_secs = rng.gen_range(0..=MAX_JITTER_SECS);

    Duration::from_secs(capped_secs as u64 + jitter_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_with_consecutive_failures() {
        let first = delay_for(1).as_secs();
        let third = delay_for(3).as_secs();
        assert!(third >= first, "backoff should not shrink as failures accumulate");
    }

    #[test]
    fn delay_is_capped_at_max_plus_jitter() {
        let delay = delay_for(100).as_secs();
        assert!(delay <= MAX_DELAY_SECS + MAX_JITTER_SECS);
    }
}
