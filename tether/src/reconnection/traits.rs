//! The strategy seam consulted on every close, plus the bookkeeping that
//! strategies keep about opens and closes.

use crate::transport::TransportError;
use async_trait::async_trait;
use std::time::Duration;

/// Decides whether a closed transport tries again, and when.
///
/// The lifecycle calls [`should_reconnect`](Self::should_reconnect) and then
/// [`next_delay`](Self::next_delay) with the number of attempts scheduled
/// since the link was last open. The counter starts at 0 and goes back to 0
/// after a successful open.
///
/// # Examples
///
/// ```
/// use tether::reconnection::ReconnectionStrategy;
/// use tether::transport::TransportError;
/// use async_trait::async_trait;
/// use std::time::Duration;
///
/// /// Retries every five seconds, three times.
/// struct Steady;
///
/// #[async_trait]
/// impl ReconnectionStrategy for Steady {
///     async fn should_reconnect(&self, attempt: u32, cause: &TransportError) -> bool {
///         cause.is_recoverable() && attempt < 3
///     }
///
///     async fn next_delay(&self, _attempt: u32) -> Duration {
///         Duration::from_secs(5)
///     }
///
///     fn on_connected(&self) {}
///     fn on_disconnected(&self, _cause: &TransportError) {}
///     fn reset(&self) {}
///
///     fn name(&self) -> &str {
///         "steady"
///     }
/// }
/// ```
#[async_trait]
pub trait ReconnectionStrategy: Send + Sync {
    /// Whether attempt number `attempt` should be scheduled after `cause`.
    async fn should_reconnect(&self, attempt: u32, cause: &TransportError) -> bool;

    /// How long to wait before attempt number `attempt`.
    async fn next_delay(&self, attempt: u32) -> Duration;

    /// The link opened.
    fn on_connected(&self);

    /// The link closed or an attempt failed.
    fn on_disconnected(&self, cause: &TransportError);

    /// Forgets everything recorded so far. Called when auto-reconnect is
    /// switched back on.
    fn reset(&self);

    /// Short name for logs.
    fn name(&self) -> &str;
}

/// Open/close history kept by the built-in strategies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconnectionStats {
    /// Links opened
    pub opens: u64,
    /// Close transitions, failed attempts included
    pub closes: u64,
    /// Closes since the last open
    pub consecutive_closes: u32,
    /// Reason of the most recent close, cleared by an open
    pub last_close_reason: Option<String>,
}

impl ReconnectionStats {
    /// Empty history.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_open(&mut self) {
        self.opens += 1;
        self.consecutive_closes = 0;
        self.last_close_reason = None;
    }

    pub(crate) fn record_close(&mut self, cause: &TransportError) {
        self.closes += 1;
        self.consecutive_closes = self.consecutive_closes.saturating_add(1);
        self.last_close_reason = Some(cause.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_then_open() {
        let mut stats = ReconnectionStats::new();
        stats.record_close(&TransportError::connection_lost("reset by peer"));
        stats.record_close(&TransportError::connection_failed("ws://x", "refused"));

        assert_eq!(stats.closes, 2);
        assert_eq!(stats.consecutive_closes, 2);
        assert_eq!(
            stats.last_close_reason.as_deref(),
            Some("failed to connect to ws://x: refused")
        );

        stats.record_open();
        assert_eq!(stats.opens, 1);
        assert_eq!(stats.closes, 2);
        assert_eq!(stats.consecutive_closes, 0);
        assert!(stats.last_close_reason.is_none());
    }

    #[test]
    fn test_consecutive_closes_saturate() {
        let mut stats = ReconnectionStats {
            consecutive_closes: u32::MAX,
            ..ReconnectionStats::default()
        };
        stats.record_close(&TransportError::Closed);
        assert_eq!(stats.consecutive_closes, u32::MAX);
    }
}
