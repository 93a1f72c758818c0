use std::time::Duration;

use rand::Rng;

use crate::config::AppConfig;

const MAX_BACKOFF: Duration = Duration::from_secs(15 * 60);

/// Retry budget applied uniformly to every job type. `max_retries` counts
/// attempts after the first, so a job runs at most `max_retries + 1` times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.job_max_retries, config.job_retry_base_delay)
    }

    pub fn should_retry(&self, attempts: i32) -> bool {
        attempts >= 1 && (attempts as u32) <= self.max_retries
    }

    pub fn allows_run(&self, attempts: i32) -> bool {
        attempts >= 1 && (attempts as u32) <= self.max_retries + 1
    }

    pub fn backoff(&self, attempts: i32) -> Duration {
        let exponent = attempts.saturating_sub(1).clamp(0, 16) as u32;
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(MAX_BACKOFF)
    }

    pub fn delay_for(&self, attempts: i32) -> Duration {
        let backoff = self.backoff(attempts);
        let jitter_ceiling = backoff.as_millis() as u64 / 4;
        let jitter = if jitter_ceiling == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter_ceiling)
        };
        backoff + Duration::from_millis(jitter)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(5))
    }
}
