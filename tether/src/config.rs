//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Transport configuration.
//!
//! Every timing constant and bound used by the transport is a public field
//! on [`TransportConfig`]. Defaults:
//!
//! | Knob | Default |
//! |---|---|
//! | batch debounce window | 25 ms |
//! | max batch size | 32 messages |
//! | max queue depth | 1024 messages, reject new |
//! | reconnect backoff | 1 s doubling, capped at 30 s |
//! | keepalive interval | 60 s |
//! | default RPC timeout | 10 s |
//! | default RPC retries | 1 |
//! | RPC retry backoff | 1 s doubling, capped at 8 s |

use crate::reconnection::{ExponentialBackoff, ReconnectionStrategy};
use crate::transport::{TransportError, WebSocketConfig};
use std::sync::Arc;
use std::time::Duration;

/// Environment variable holding the endpoint URL.
pub const ENV_WS_URL: &str = "TETHER_WS_URL";

/// Environment variable that turns the transport into an inert stub when `true`.
pub const ENV_DISABLE_API: &str = "TETHER_DISABLE_API";

/// Endpoint used when none is configured.
pub const DEFAULT_WS_URL: &str = "ws://localhost:8000/ws";

/// What the outbound queue does when it is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Refuse the new message; `send`/`request` return an error.
    #[default]
    RejectNew,
    /// Evict the oldest queued message to make room.
    DropOldest,
}

/// Application-level keepalive settings.
#[derive(Debug, Clone)]
pub struct KeepaliveConfig {
    /// Whether probes are sent at all.
    pub enabled: bool,
    /// Time between probes while the connection is open.
    pub interval: Duration,
    /// Event name of the probe, sent by us and recognised when the server sends it.
    pub probe_event: String,
    /// Event name sent back automatically when the server probes us.
    pub reply_event: String,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(60),
            probe_event: "ping".to_string(),
            reply_event: "pong".to_string(),
        }
    }
}

/// Configuration for a [`Transport`](crate::Transport).
///
/// # Examples
///
/// ```rust
/// use tether::config::{OverflowPolicy, TransportConfig};
/// use std::time::Duration;
///
/// let config = TransportConfig::new("wss://chat.example.com/ws")
///     .with_default_timeout(Duration::from_secs(5))
///     .with_default_retries(2)
///     .with_max_queue_depth(256, OverflowPolicy::DropOldest);
///
/// assert_eq!(config.max_batch_size, 32);
/// assert_eq!(config.default_retries, 2);
/// ```
#[derive(Clone)]
pub struct TransportConfig {
    /// Endpoint URL.
    ///
    /// Default: `ws://localhost:8000/ws`
    pub url: String,

    /// Debounce window between the first unflushed enqueue and the flush.
    pub batch_interval: Duration,

    /// Maximum number of messages per batch frame; reaching it flushes at once.
    pub max_batch_size: usize,

    /// Maximum number of messages waiting in the outbound queue.
    pub max_queue_depth: usize,

    /// Behaviour when the outbound queue is full.
    pub overflow_policy: OverflowPolicy,

    /// Whether a close schedules a reconnection attempt.
    pub auto_reconnect: bool,

    /// Strategy deciding whether and when to reconnect.
    ///
    /// Default: [`ExponentialBackoff`] from 1 s to 30 s
    pub reconnection_strategy: Arc<dyn ReconnectionStrategy>,

    /// Application-level keepalive.
    pub keepalive: KeepaliveConfig,

    /// Request deadline used when the caller does not supply one.
    pub default_timeout: Duration,

    /// Retry budget used when the caller does not supply one.
    pub default_retries: u32,

    /// Backoff before the first request retry; doubles on each further retry.
    pub retry_backoff_initial: Duration,

    /// Upper bound on the request retry backoff.
    pub retry_backoff_max: Duration,

    /// Turns the transport into an inert stub.
    pub disabled: bool,

    /// Socket-level limits for the WebSocket connector.
    pub websocket: WebSocketConfig,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_WS_URL.to_string(),
            batch_interval: Duration::from_millis(25),
            max_batch_size: 32,
            max_queue_depth: 1024,
            overflow_policy: OverflowPolicy::RejectNew,
            auto_reconnect: true,
            reconnection_strategy: Arc::new(ExponentialBackoff::default()),
            keepalive: KeepaliveConfig::default(),
            default_timeout: Duration::from_secs(10),
            default_retries: 1,
            retry_backoff_initial: Duration::from_secs(1),
            retry_backoff_max: Duration::from_secs(8),
            disabled: false,
            websocket: WebSocketConfig::default(),
        }
    }
}

impl std::fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportConfig")
            .field("url", &self.url)
            .field("batch_interval", &self.batch_interval)
            .field("max_batch_size", &self.max_batch_size)
            .field("max_queue_depth", &self.max_queue_depth)
            .field("overflow_policy", &self.overflow_policy)
            .field("auto_reconnect", &self.auto_reconnect)
            .field("reconnection_strategy", &self.reconnection_strategy.name())
            .field("keepalive", &self.keepalive)
            .field("default_timeout", &self.default_timeout)
            .field("default_retries", &self.default_retries)
            .field("retry_backoff_initial", &self.retry_backoff_initial)
            .field("retry_backoff_max", &self.retry_backoff_max)
            .field("disabled", &self.disabled)
            .finish_non_exhaustive()
    }
}

impl TransportConfig {
    /// Creates a configuration for `url` with default values.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Reads the URL and the disable flag from the environment.
    ///
    /// `TETHER_WS_URL` overrides the endpoint. `TETHER_DISABLE_API=true`
    /// produces a disabled configuration.
    pub fn from_env() -> Self {
        let url = std::env::var(ENV_WS_URL)
            .ok()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_WS_URL.to_string());
        let disabled = std::env::var(ENV_DISABLE_API)
            .map(|flag| parse_flag(&flag))
            .unwrap_or(false);

        Self::new(url).with_disabled(disabled)
    }

    /// Sets the debounce window and the maximum batch size.
    pub fn with_batching(mut self, interval: Duration, max_batch_size: usize) -> Self {
        self.batch_interval = interval;
        self.max_batch_size = max_batch_size;
        self
    }

    /// Sets the queue bound and what happens when it is reached.
    pub fn with_max_queue_depth(mut self, depth: usize, policy: OverflowPolicy) -> Self {
        self.max_queue_depth = depth;
        self.overflow_policy = policy;
        self
    }

    /// Enables or disables automatic reconnection.
    pub fn with_auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    /// Replaces the reconnection strategy.
    pub fn with_reconnection_strategy(mut self, strategy: Arc<dyn ReconnectionStrategy>) -> Self {
        self.reconnection_strategy = strategy;
        self
    }

    /// Uses exponential reconnect backoff between `initial` and `max`.
    pub fn with_reconnect_backoff(self, initial: Duration, max: Duration) -> Self {
        self.with_reconnection_strategy(Arc::new(
            ExponentialBackoff::builder()
                .initial_delay(initial)
                .max_delay(max)
                .build(),
        ))
    }

    /// Sets the keepalive settings.
    pub fn with_keepalive(mut self, keepalive: KeepaliveConfig) -> Self {
        self.keepalive = keepalive;
        self
    }

    /// Sets the default request deadline.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Sets the default retry budget.
    pub fn with_default_retries(mut self, retries: u32) -> Self {
        self.default_retries = retries;
        self
    }

    /// Sets the request retry backoff bounds.
    pub fn with_retry_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.retry_backoff_initial = initial;
        self.retry_backoff_max = max;
        self
    }

    /// Turns the transport into an inert stub.
    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    /// Sets the WebSocket limits.
    pub fn with_websocket(mut self, websocket: WebSocketConfig) -> Self {
        self.websocket = websocket;
        self
    }

    /// Checks the bounds that the batcher and keepalive rely on.
    pub fn validate(&self) -> Result<(), TransportError> {
        if self.url.trim().is_empty() {
            return Err(TransportError::invalid_configuration("url is empty"));
        }
        if self.max_batch_size == 0 {
            return Err(TransportError::invalid_configuration(
                "max_batch_size must be at least 1",
            ));
        }
        if self.max_queue_depth == 0 {
            return Err(TransportError::invalid_configuration(
                "max_queue_depth must be at least 1",
            ));
        }
        if self.keepalive.enabled && self.keepalive.interval.is_zero() {
            return Err(TransportError::invalid_configuration(
                "keepalive interval must be non-zero",
            ));
        }
        Ok(())
    }

    /// Backoff schedule for request retries.
    pub(crate) fn retry_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff::builder()
            .initial_delay(self.retry_backoff_initial)
            .max_delay(self.retry_backoff_max)
            .build()
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TransportConfig::default();
        assert_eq!(config.url, "ws://localhost:8000/ws");
        assert_eq!(config.batch_interval, Duration::from_millis(25));
        assert_eq!(config.max_batch_size, 32);
        assert_eq!(config.max_queue_depth, 1024);
        assert_eq!(config.overflow_policy, OverflowPolicy::RejectNew);
        assert!(config.auto_reconnect);
        assert_eq!(config.keepalive.interval, Duration::from_secs(60));
        assert_eq!(config.keepalive.probe_event, "ping");
        assert_eq!(config.keepalive.reply_event, "pong");
        assert_eq!(config.default_timeout, Duration::from_secs(10));
        assert_eq!(config.default_retries, 1);
        assert!(!config.disabled);
        assert_eq!(config.reconnection_strategy.name(), "exponential-backoff");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_retry_backoff_schedule() {
        let backoff = TransportConfig::default().retry_backoff();
        let delays: Vec<u64> = (0..6).map(|n| backoff.delay_for(n).as_millis() as u64).collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 8000, 8000]);

        let fast = TransportConfig::default()
            .with_retry_backoff(Duration::from_millis(200), Duration::from_secs(8))
            .retry_backoff();
        assert_eq!(fast.delay_for(0), Duration::from_millis(200));
        assert_eq!(fast.delay_for(1), Duration::from_millis(400));
    }

    #[test]
    fn test_validate_rejects_zero_bounds() {
        let config = TransportConfig::default().with_batching(Duration::from_millis(5), 0);
        assert!(matches!(
            config.validate(),
            Err(TransportError::InvalidConfiguration { .. })
        ));

        let config = TransportConfig::default().with_max_queue_depth(0, OverflowPolicy::DropOldest);
        assert!(config.validate().is_err());

        let config = TransportConfig::new("  ");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true"));
        assert!(parse_flag(" TRUE "));
        assert!(parse_flag("1"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(""));
    }

    #[test]
    fn test_debug_names_strategy() {
        let debug = format!("{:?}", TransportConfig::default());
        assert!(debug.contains("exponential-backoff"));
    }
}
