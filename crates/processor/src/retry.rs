//! Bounded retry with exponential backoff.

use std::time::Duration;

use tracing::{info, warn};

/// Retry policy: `max_retries + 1` attempts, fixed or exponential delay.
///
/// No jitter; the delay for retry `k` (0-indexed among retries) is
/// `exponential ? min(base * 2^k, max) : base`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
    exponential: bool,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration, exponential: bool) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
            exponential,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay before retry `k` (0-indexed among retries).
    pub fn delay_for(&self, retry_index: u32) -> Duration {
        if !self.exponential {
            return self.base_delay;
        }
        let factor = 2u32.checked_pow(retry_index).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map(|d| d.min(self.max_delay))
            .unwrap_or(self.max_delay)
    }

    /// Run `op` until it succeeds or the attempt budget is exhausted.
    ///
    /// The final error is returned unchanged.
    pub fn execute<T, E>(&self, label: &str, mut op: impl FnMut() -> Result<T, E>) -> Result<T, E>
    where
        E: core::fmt::Display,
    {
        let mut retry_index = 0u32;
        loop {
            match op() {
                Ok(value) => {
                    if retry_index > 0 {
                        info!(operation = label, retries = retry_index, "succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if retry_index < self.max_retries => {
                    let delay = self.delay_for(retry_index);
                    warn!(
                        operation = label,
                        retry = retry_index + 1,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "attempt failed, retrying"
                    );
                    std::thread::sleep(delay);
                    retry_index += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
