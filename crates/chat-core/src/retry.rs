use std::time::Duration;

use rand::Rng;

const MIN_DELAY_FLOOR_MS: u64 = 250;
const MAX_DELAY_FLOOR_MS: u64 = 500;

/// Backoff applied between transparent token-expiry retries.
///
/// The delay grows with the client's consecutive-failure counter and is
/// drawn at random from a window so that many clients recovering at once do
/// not retry in lockstep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    step_ms: u64,
    max_delay_ms: u64,
    max_token_retries: Option<u32>,
}

impl RetryPolicy {
    pub fn new(step_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            step_ms,
            max_delay_ms: max_delay_ms.max(MIN_DELAY_FLOOR_MS),
            max_token_retries: None,
        }
    }

    /// Stop retrying a single call after `max` token-expiry retries.
    ///
    /// Without a cap the client keeps retrying for as long as the service
    /// answers with the token-expiry code.
    pub fn with_max_token_retries(mut self, max: Option<u32>) -> Self {
        self.max_token_retries = max;
        self
    }

    pub fn step_ms(&self) -> u64 {
        self.step_ms
    }

    pub fn max_delay_ms(&self) -> u64 {
        self.max_delay_ms
    }

    pub fn max_token_retries(&self) -> Option<u32> {
        self.max_token_retries
    }

    /// Whether another token-expiry retry is allowed after `retries_so_far`.
    pub fn allows_token_retry(&self, retries_so_far: u32) -> bool {
        self.max_token_retries
            .is_none_or(|max| retries_so_far < max)
    }

    /// Lower (inclusive) and upper (exclusive) delay bounds for `failures`
    /// consecutive failures.
    pub fn delay_window(&self, failures: u32) -> (Duration, Duration) {
        let failures = u64::from(failures);
        let lower = failures
            .saturating_sub(1)
            .saturating_mul(self.step_ms)
            .max(MIN_DELAY_FLOOR_MS)
            .min(self.max_delay_ms);
        let upper = failures
            .saturating_mul(self.step_ms)
            .saturating_add(MAX_DELAY_FLOOR_MS)
            .min(self.max_delay_ms);
        (Duration::from_millis(lower), Duration::from_millis(upper))
    }

    /// Randomized delay inside [`RetryPolicy::delay_window`].
    pub fn delay_for_failures(&self, failures: u32) -> Duration {
        let (lower, upper) = self.delay_window(failures);
        if upper <= lower {
            return lower;
        }
        let range = lower.as_millis() as u64..upper.as_millis() as u64;
        let millis = rand::thread_rng().gen_range(range);
        Duration::from_millis(millis)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2_000, 25_000)
    }
}
