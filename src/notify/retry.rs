//! Delivery retry policy
//!
//! The delay after failed attempt `n` (0-based) is `base * 2^n`, capped at `max_delay_ms`,
//! then spread by ±`jitter_pct`.

use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;

use crate::config::NotifierConfig;

/// Jittered exponential backoff for notification delivery.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_pct: f64,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, base_delay_ms: u64, max_delay_ms: u64, jitter_pct: f64) -> Self {
        let base_delay_ms = base_delay_ms.max(1);
        Self {
            max_attempts: max_attempts.max(1),
            base_delay_ms,
            max_delay_ms: max_delay_ms.max(base_delay_ms),
            jitter_pct: jitter_pct.clamp(0.0, 1.0),
        }
    }

    pub fn from_config(config: &NotifierConfig) -> Self {
        Self::new(
            config.max_attempts,
            config.base_delay_ms,
            config.max_delay_ms,
            0.2,
        )
    }

    /// Delay after the given failed attempt (0-based)
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let exp = 2_u64.saturating_pow(attempt.min(32) as u32);
        let delay = self.base_delay_ms.saturating_mul(exp).min(self.max_delay_ms);
        if self.jitter_pct <= 0.0 {
            return Duration::from_millis(delay);
        }
        let spread = (delay as f64 * self.jitter_pct) as i64;
        let delta = rand::thread_rng().gen_range(-spread..=spread);
        Duration::from_millis(delay.saturating_add_signed(delta))
    }

    /// Run `op` until it succeeds or attempts run out; returns the last error.
    pub async fn retry_async<F, Fut, T, E>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut(usize) -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        let mut attempt = 0;
        loop {
            match op(attempt).await {
                Ok(val) => return Ok(val),
                Err(err) => {
                    attempt += 1;
                    if attempt >= self.max_attempts {
                        return Err(err);
                    }
                    sleep(self.delay_for(attempt - 1)).await;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, 250, 10_000, 0.2)
    }
}
