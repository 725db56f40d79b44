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

//! The public transport handle.
//!
//! A [`Transport`] owns one logical connection and everything multiplexed
//! over it: fire-and-forget events, correlated requests and server-pushed
//! events. It is a cheap `Clone` handle; clones share the same connection,
//! queue, pending table and listeners. Construct one at start-up and pass it
//! to whatever needs it.
//!
//! All methods that may start background work (`connect`, `send`, `request`)
//! must be called from within a Tokio runtime.

use crate::batcher::{Batcher, FlushTrigger};
use crate::config::TransportConfig;
use crate::events::{ListenerId, ListenerRegistry, Subscription};
use crate::lifecycle::{ConnectionState, Lifecycle};
use crate::observability::{MetricsSnapshot, TransportMetrics};
use crate::rpc::{Correlator, RequestOptions, RpcError};
use crate::transport::{Connector, TransportError, WebSocketConnector};
use crate::wire::{MessageIdGenerator, OutgoingMessage};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;

/// State shared by every clone of a [`Transport`] and by its background tasks.
///
/// Background tasks hold it weakly, so dropping the last handle stops them.
pub(crate) struct Shared {
    pub(crate) config: TransportConfig,
    pub(crate) connector: Arc<dyn Connector>,
    pub(crate) ids: MessageIdGenerator,
    pub(crate) batcher: Batcher,
    pub(crate) correlator: Correlator,
    pub(crate) listeners: Arc<ListenerRegistry>,
    pub(crate) lifecycle: Lifecycle,
    pub(crate) metrics: Arc<TransportMetrics>,
}

impl Shared {
    fn new(config: TransportConfig, connector: Arc<dyn Connector>) -> Self {
        let metrics = Arc::new(TransportMetrics::new());
        Self {
            batcher: Batcher::new(&config, Arc::clone(&metrics)),
            correlator: Correlator::new(config.retry_backoff(), Arc::clone(&metrics)),
            lifecycle: Lifecycle::new(config.auto_reconnect),
            listeners: Arc::new(ListenerRegistry::new()),
            ids: MessageIdGenerator::new(),
            connector,
            config,
            metrics,
        }
    }

    /// Queues a fire-and-forget event.
    pub(crate) fn send_event(
        self: &Arc<Self>,
        event: &str,
        payload: Option<Value>,
    ) -> Result<(), RpcError> {
        self.enqueue(OutgoingMessage::event(self.ids.next(), event, payload))
    }

    /// Hands `message` to the batcher, connecting first if needed.
    pub(crate) fn enqueue(self: &Arc<Self>, message: OutgoingMessage) -> Result<(), RpcError> {
        if !self.lifecycle.is_open() {
            self.ensure_connecting().map_err(|e| match e {
                TransportError::InvalidConfiguration { reason } => {
                    RpcError::InvalidConfiguration { reason }
                }
                other => RpcError::InvalidConfiguration {
                    reason: other.to_string(),
                },
            })?;
        }

        match self.batcher.enqueue(message)? {
            FlushTrigger::Immediate => self.flush(),
            FlushTrigger::Debounce => self.schedule_flush(),
            FlushTrigger::None => {}
        }
        Ok(())
    }

    fn schedule_flush(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let interval = self.batcher.interval();
        tokio::spawn(async move {
            tokio::time::sleep(interval).await;
            if let Some(shared) = weak.upgrade() {
                shared.batcher.timer_fired();
                shared.flush();
            }
        });
    }

    /// Writes the queue to the current link, if there is one.
    pub(crate) fn flush(&self) {
        let link = self.lifecycle.link();
        self.batcher.flush(link.as_ref());
    }
}

/// Client-side message transport.
///
/// # Examples
///
/// ```rust,no_run
/// use tether::{Transport, TransportConfig};
/// use serde_json::json;
///
/// # async fn example() -> Result<(), tether::TetherError> {
/// let transport = Transport::new(TransportConfig::new("wss://chat.example.com/ws"));
///
/// let presence = transport.on("presence", |payload| {
///     println!("presence update: {payload}");
/// });
///
/// // Connects on demand.
/// let users = transport
///     .request("users.with_info", Some(json!({ "page": 1, "limit": 5 })))
///     .await?;
/// println!("{users}");
///
/// transport.send("typing", Some(json!({ "chat": 42 })))?;
///
/// presence.unsubscribe();
/// transport.close();
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Transport {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("url", &self.shared.config.url)
            .field("connector", &self.shared.connector.name())
            .field("state", &self.shared.lifecycle.state())
            .field("disabled", &self.shared.config.disabled)
            .field("pending", &self.shared.correlator.pending().len())
            .finish()
    }
}

impl Transport {
    /// Creates a WebSocket transport. Nothing connects until first use.
    pub fn new(config: TransportConfig) -> Self {
        let connector = Arc::new(WebSocketConnector::new(config.websocket.clone()));
        Self::with_connector(config, connector)
    }

    /// Creates a transport that opens its links through `connector`.
    pub fn with_connector(config: TransportConfig, connector: Arc<dyn Connector>) -> Self {
        tracing::debug!(
            url = %config.url,
            connector = connector.name(),
            disabled = config.disabled,
            "Creating transport"
        );
        Self {
            shared: Arc::new(Shared::new(config, connector)),
        }
    }

    /// Creates a transport configured from the environment.
    ///
    /// See [`TransportConfig::from_env`].
    pub fn from_env() -> Self {
        Self::new(TransportConfig::from_env())
    }

    /// Creates an inert transport for builds without a backend.
    ///
    /// `connect` succeeds immediately, `send` is ignored, `on` registers
    /// nothing and `request` fails with [`RpcError::NotConfigured`].
    pub fn disabled() -> Self {
        Self::new(TransportConfig::default().with_disabled(true))
    }

    /// Returns the configuration.
    pub fn config(&self) -> &TransportConfig {
        &self.shared.config
    }

    /// Returns `true` for an inert transport.
    pub fn is_disabled(&self) -> bool {
        self.shared.config.disabled
    }

    /// Opens the connection if it is not open yet.
    ///
    /// Resolves once the link is open. Concurrent calls share one attempt and
    /// all observe its outcome. A failed attempt still counts as a close and
    /// is retried in the background when auto-reconnect is on.
    pub async fn connect(&self) -> Result<(), TransportError> {
        if self.is_disabled() {
            return Ok(());
        }
        self.shared.connect().await
    }

    /// Closes the connection and cancels any scheduled reconnection.
    ///
    /// Pending requests are rejected with [`RpcError::ConnectionClosed`] and
    /// leave the outbound queue. Queued events stay queued and go out once
    /// the transport is used again.
    pub fn close(&self) {
        if !self.is_disabled() {
            self.shared.close();
        }
    }

    /// Returns `true` while the link is open.
    pub fn is_ready(&self) -> bool {
        !self.is_disabled() && self.shared.lifecycle.is_open()
    }

    /// Enables or disables reconnection after a close.
    ///
    /// Disabling also cancels a reconnection that is already scheduled.
    /// Enabling it again restarts the backoff from its first delay and calls
    /// [`ReconnectionStrategy::reset`](crate::reconnection::ReconnectionStrategy::reset).
    pub fn set_auto_reconnect(&self, enabled: bool) {
        if !self.is_disabled() {
            self.shared.set_auto_reconnect(enabled);
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.shared.lifecycle.state()
    }

    /// Watches connection state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.lifecycle.subscribe()
    }

    /// Calls `method` with the default timeout and retry budget.
    pub async fn request(&self, method: &str, payload: Option<Value>) -> Result<Value, RpcError> {
        self.request_with(method, payload, RequestOptions::default())
            .await
    }

    /// Calls `method` and waits for the correlated reply.
    ///
    /// Each attempt waits `timeout`. On expiry the same message is resent
    /// under the same id after `min(initial * 2^tries, max)` of retry backoff,
    /// up to `retries` times, before failing with [`RpcError::Timeout`].
    /// A server `rpc_error` fails the call with [`RpcError::Remote`].
    #[tracing::instrument(skip(self, payload, options))]
    pub async fn request_with(
        &self,
        method: &str,
        payload: Option<Value>,
        options: RequestOptions,
    ) -> Result<Value, RpcError> {
        if self.is_disabled() {
            return Err(RpcError::NotConfigured);
        }

        let config = &self.shared.config;
        let timeout = options.timeout.unwrap_or(config.default_timeout);
        let retries = options.retries.unwrap_or(config.default_retries);
        let message = OutgoingMessage::rpc(self.shared.ids.next(), method, payload);
        tracing::debug!(id = %message.id, ?timeout, retries, "Sending request");

        self.shared
            .correlator
            .call(message, timeout, retries, |m| self.shared.enqueue(m))
            .await
    }

    /// Typed variant of [`request`](Self::request).
    pub async fn call<P, R>(&self, method: &str, params: &P) -> Result<R, RpcError>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let payload =
            serde_json::to_value(params).map_err(|e| RpcError::Serialization(e.to_string()))?;
        let payload = (!payload.is_null()).then_some(payload);
        let result = self.request(method, payload).await?;
        serde_json::from_value(result).map_err(|e| RpcError::Decode(e.to_string()))
    }

    /// Queues a fire-and-forget event.
    ///
    /// Fails when the outbound queue is full under
    /// [`OverflowPolicy::RejectNew`](crate::config::OverflowPolicy::RejectNew),
    /// or with [`RpcError::InvalidConfiguration`] when the link would have to
    /// be opened with a configuration that fails
    /// [`TransportConfig::validate`].
    pub fn send(&self, event: &str, payload: Option<Value>) -> Result<(), RpcError> {
        if self.is_disabled() {
            return Ok(());
        }
        self.shared.send_event(event, payload)
    }

    /// Registers `handler` for server events named `event`.
    ///
    /// The lifecycle events `"open"` and `"close"` are delivered here too.
    pub fn on<F>(&self, event: &str, handler: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        if self.is_disabled() {
            return Subscription::inert(event.to_string());
        }
        let id = self.shared.listeners.on(event, handler);
        Subscription::new(&self.shared.listeners, event.to_string(), id)
    }

    /// Removes the handler `id` from `event`.
    pub fn off(&self, event: &str, id: ListenerId) -> bool {
        self.shared.listeners.off(event, id)
    }

    /// Number of requests waiting for a reply.
    pub fn pending_requests(&self) -> usize {
        self.shared.correlator.pending().len()
    }

    /// Number of messages waiting to be flushed.
    pub fn queued_messages(&self) -> usize {
        self.shared.batcher.len()
    }

    /// Snapshot of the transport counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_disabled_transport_is_inert() {
        let transport = Transport::disabled();

        assert!(transport.is_disabled());
        assert!(transport.connect().await.is_ok());
        assert!(!transport.is_ready());
        assert!(transport.send("typing", None).is_ok());
        assert_eq!(transport.queued_messages(), 0);
        assert_eq!(
            transport.request("users.list", None).await,
            Err(RpcError::NotConfigured)
        );

        let subscription = transport.on("presence", |_| {});
        assert!(!subscription.unsubscribe());
        transport.set_auto_reconnect(false);
        transport.close();
        assert_eq!(transport.state(), ConnectionState::Idle);
    }

    #[tokio::test]
    async fn test_invalid_config_rejects_connect() {
        let transport =
            Transport::new(TransportConfig::default().with_batching(std::time::Duration::ZERO, 0));
        assert!(matches!(
            transport.connect().await,
            Err(TransportError::InvalidConfiguration { .. })
        ));
        assert_eq!(transport.state(), ConnectionState::Idle);
    }

    #[tokio::test]
    async fn test_invalid_config_rejects_send_and_request() {
        let transport = Transport::new(TransportConfig::new(""));

        assert!(matches!(
            transport.send("typing", None),
            Err(RpcError::InvalidConfiguration { .. })
        ));
        assert!(matches!(
            transport.request("users.list", None).await,
            Err(RpcError::InvalidConfiguration { .. })
        ));
        assert_eq!(transport.state(), ConnectionState::Idle);
        assert_eq!(transport.queued_messages(), 0);
        assert_eq!(transport.pending_requests(), 0);
    }

    #[tokio::test]
    async fn test_call_on_disabled_transport() {
        let transport = Transport::disabled();
        let result: Result<Value, _> = transport.call("m", &json!({ "a": 1 })).await;
        assert_eq!(result, Err(RpcError::NotConfigured));
    }

    #[test]
    fn test_debug_output() {
        let transport = Transport::disabled();
        let debug = format!("{transport:?}");
        assert!(debug.contains("Transport"));
        assert!(debug.contains("disabled: true"));
    }
}
