//! Exponential backoff.
//!
//! Attempt `n` waits `initial_delay * multiplier^n`, capped at `max_delay`.
//! The transport uses one instance for reconnects and a second, with its own
//! bounds, for request retries.

use super::traits::{ReconnectionStats, ReconnectionStrategy};
use crate::transport::TransportError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::Duration;

/// Doubling delay with a ceiling.
///
/// The defaults give the reconnect schedule `1s, 2s, 4s, 8s, 16s, 30s, 30s, ...`
/// without jitter and without an attempt limit.
///
/// # Examples
///
/// ```
/// use tether::reconnection::ExponentialBackoff;
/// use std::time::Duration;
///
/// let reconnect = ExponentialBackoff::default();
/// assert_eq!(reconnect.delay_for(0), Duration::from_secs(1));
/// assert_eq!(reconnect.delay_for(5), Duration::from_secs(30));
///
/// let retry = ExponentialBackoff::builder()
///     .initial_delay(Duration::from_secs(1))
///     .max_delay(Duration::from_secs(8))
///     .build();
/// assert_eq!(retry.delay_for(4), Duration::from_secs(8));
/// ```
#[derive(Debug)]
pub struct ExponentialBackoff {
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    jitter: bool,
    /// `None` retries forever
    max_attempts: Option<u32>,
    stats: Mutex<ReconnectionStats>,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ExponentialBackoff {
    /// Starts from the defaults: 1 s, doubling, 30 s cap.
    pub fn builder() -> ExponentialBackoffBuilder {
        ExponentialBackoffBuilder::default()
    }

    /// Opens and closes seen so far.
    pub fn stats(&self) -> ReconnectionStats {
        self.stats.lock().clone()
    }

    /// Delay before attempt `attempt`, counting from 0.
    ///
    /// With jitter the result is drawn uniformly from `[0, capped delay]`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let cap_ms = self.max_delay.as_millis() as f64;
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let raw_ms = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped_ms = if raw_ms.is_finite() { raw_ms.min(cap_ms) } else { cap_ms };

        let delay_ms = if self.jitter {
            rand::random::<f64>() * capped_ms
        } else {
            capped_ms
        };
        Duration::from_millis(delay_ms as u64)
    }
}

#[async_trait]
impl ReconnectionStrategy for ExponentialBackoff {
    async fn should_reconnect(&self, attempt: u32, cause: &TransportError) -> bool {
        // Configuration errors and explicit closes are final.
        cause.is_recoverable() && self.max_attempts.map_or(true, |limit| attempt < limit)
    }

    async fn next_delay(&self, attempt: u32) -> Duration {
        self.delay_for(attempt)
    }

    fn on_connected(&self) {
        self.stats.lock().record_open();
    }

    fn on_disconnected(&self, cause: &TransportError) {
        self.stats.lock().record_close(cause);
    }

    fn reset(&self) {
        *self.stats.lock() = ReconnectionStats::default();
    }

    fn name(&self) -> &str {
        "exponential-backoff"
    }
}

/// Builder for [`ExponentialBackoff`].
#[derive(Debug, Clone)]
pub struct ExponentialBackoffBuilder {
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    jitter: bool,
    max_attempts: Option<u32>,
}

impl Default for ExponentialBackoffBuilder {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: false,
            max_attempts: None,
        }
    }
}

impl ExponentialBackoffBuilder {
    /// Delay before attempt 0.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Ceiling for every delay.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Growth factor between consecutive attempts.
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Randomises each delay below its computed value.
    pub fn jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Stops reconnecting once `limit` attempts have been scheduled.
    pub fn max_attempts(mut self, limit: Option<u32>) -> Self {
        self.max_attempts = limit;
        self
    }

    /// Finishes the strategy.
    pub fn build(self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_delay: self.initial_delay,
            max_delay: self.max_delay,
            multiplier: self.multiplier,
            jitter: self.jitter,
            max_attempts: self.max_attempts,
            stats: Mutex::new(ReconnectionStats::new()),
        }
    }
}
