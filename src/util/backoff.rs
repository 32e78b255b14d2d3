use std::time::Duration;

use rand::Rng;

pub const DEFAULT_RETRY_INTERVAL_MILLIS: u64 = 100;
pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;
pub const MAX_RETRY_BACKOFF_MILLIS: u64 = 5_000;
pub const RANDOM_FACTOR: f64 = 0.5;

/// Exponential backoff parameters used between delivery attempts of a single batch.
#[derive(Debug, Clone, Copy)]
pub struct RetryBackoff {
    pub interval_millis: u64,
    pub backoff_factor: f64,
    pub max_millis: u64,
}

impl Default for RetryBackoff {
    fn default() -> Self {
        Self {
            interval_millis: DEFAULT_RETRY_INTERVAL_MILLIS,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            max_millis: MAX_RETRY_BACKOFF_MILLIS,
        }
    }
}

impl RetryBackoff {
    /// Delay to wait before retry number `attempt` (0-based), with jitter applied.
    pub fn delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.delay_millis_with_rng(attempt, &mut rand::thread_rng()))
    }

    fn delay_millis_with_rng<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> u64 {
        let base = (self.interval_millis as f64) * self.backoff_factor.powi(attempt as i32);
        let jitter = RANDOM_FACTOR * base * rng.gen_range(-1.0..=1.0);
        (base + jitter).round().clamp(0.0, self.max_millis as f64) as u64
    }
}
