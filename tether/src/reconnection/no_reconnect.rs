//! Strategy for transports that must not reconnect on their own.
//!
//! A close stays a close until the caller connects again, either explicitly
//! or through an auto-connecting `send`/`request`.

use super::traits::{ReconnectionStats, ReconnectionStrategy};
use crate::transport::TransportError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::Duration;

/// Never schedules an attempt.
///
/// ```
/// use std::sync::Arc;
/// use tether::TransportConfig;
/// use tether::reconnection::NoReconnect;
///
/// let config = TransportConfig::default().with_reconnection_strategy(Arc::new(NoReconnect::new()));
/// ```
#[derive(Debug, Default)]
pub struct NoReconnect {
    stats: Mutex<ReconnectionStats>,
}

impl NoReconnect {
    /// Creates the strategy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens and closes seen so far.
    pub fn stats(&self) -> ReconnectionStats {
        self.stats.lock().clone()
    }
}

#[async_trait]
impl ReconnectionStrategy for NoReconnect {
    async fn should_reconnect(&self, _attempt: u32, _cause: &TransportError) -> bool {
        false
    }

    async fn next_delay(&self, _attempt: u32) -> Duration {
        Duration::ZERO
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
        "no-reconnect"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_never_reconnects() {
        let strategy = NoReconnect::new();
        let lost = TransportError::connection_lost("peer went away");

        for attempt in [0, 1, 100] {
            assert!(!strategy.should_reconnect(attempt, &lost).await);
        }
        assert_eq!(strategy.name(), "no-reconnect");
    }

    #[test]
    fn test_keeps_history() {
        let strategy = NoReconnect::new();
        strategy.on_disconnected(&TransportError::Closed);
        assert_eq!(strategy.stats().closes, 1);

        strategy.on_connected();
        assert_eq!(strategy.stats().consecutive_closes, 0);

        strategy.reset();
        assert_eq!(strategy.stats(), ReconnectionStats::default());
    }
}
