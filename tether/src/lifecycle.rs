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

//! Connection lifecycle management.
//!
//! State machine:
//!
//! ```text
//! Idle ──connect()──▶ Connecting ──link open──▶ Open
//!                        │    ▲                   │
//!            attempt fails    │ backoff elapsed   │ link lost
//!                        ▼    │                   ▼
//!                        Closed ◀─────────────────┘
//! ```
//!
//! Exactly one link is live at a time. Concurrent `connect()` calls share
//! the in-flight attempt. Every close transition, including a failed
//! attempt, consults the [`ReconnectionStrategy`] and, if auto-reconnect is
//! on, schedules the next attempt after the strategy's delay. An explicit
//! [`Transport::close`](crate::Transport::close) cancels all of that.
//!
//! Each attempt runs under a fresh epoch. Tasks belonging to an older epoch
//! (a connect that finished after `close()`, a reader that noticed a link
//! already replaced) find the epoch changed and do nothing.
//!
//! [`ReconnectionStrategy`]: crate::reconnection::ReconnectionStrategy

use crate::client::Shared;
use crate::dispatcher;
use crate::events::{CLOSE_EVENT, OPEN_EVENT};
use crate::keepalive;
use crate::rpc::RpcError;
use crate::transport::{Link, TransportError};
use parking_lot::{Mutex, MutexGuard};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Where the connection is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Never connected.
    Idle,
    /// A connection attempt is in flight.
    Connecting,
    /// The link is open and flushes reach the server.
    Open,
    /// The link is gone; a reconnection may be scheduled.
    Closed,
}

impl ConnectionState {
    /// Returns the lowercase name of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Write half of the current link, as seen by the batcher.
pub(crate) type LinkSender = mpsc::UnboundedSender<String>;

type Waiter = oneshot::Sender<Result<(), TransportError>>;

#[derive(Debug)]
pub(crate) struct Lifecycle {
    state: watch::Sender<ConnectionState>,
    inner: Mutex<LifecycleInner>,
    auto_reconnect: AtomicBool,
}

#[derive(Debug, Default)]
struct LifecycleInner {
    epoch: u64,
    link: Option<LinkSender>,
    attempts: u32,
    waiters: Vec<Waiter>,
    reconnect: Option<JoinHandle<()>>,
    keepalive: Option<JoinHandle<()>>,
}

impl Lifecycle {
    pub(crate) fn new(auto_reconnect: bool) -> Self {
        let (state, _) = watch::channel(ConnectionState::Idle);
        Self {
            state,
            inner: Mutex::new(LifecycleInner::default()),
            auto_reconnect: AtomicBool::new(auto_reconnect),
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub(crate) fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    pub(crate) fn link(&self) -> Option<LinkSender> {
        self.inner.lock().link.clone()
    }

    pub(crate) fn auto_reconnect(&self) -> bool {
        self.auto_reconnect.load(Ordering::Acquire)
    }

    fn set_state(&self, state: ConnectionState) -> ConnectionState {
        self.state.send_replace(state)
    }
}

impl Shared {
    /// Opens the link unless it is already open, joining an in-flight attempt.
    #[tracing::instrument(skip(self), fields(url = %self.config.url))]
    pub(crate) async fn connect(self: &Arc<Self>) -> Result<(), TransportError> {
        self.config.validate()?;

        let outcome = {
            let mut inner = self.lifecycle.inner.lock();
            let state = self.lifecycle.state();
            match state {
                ConnectionState::Open => return Ok(()),
                ConnectionState::Connecting => {}
                ConnectionState::Idle | ConnectionState::Closed => self.begin_attempt(&mut inner),
            }
            let (tx, rx) = oneshot::channel();
            inner.waiters.push(tx);
            rx
        };

        outcome.await.unwrap_or(Err(TransportError::Closed))
    }

    /// Starts an attempt in the background if none is open or in flight.
    ///
    /// Fails without starting anything when the configuration is invalid.
    pub(crate) fn ensure_connecting(self: &Arc<Self>) -> Result<(), TransportError> {
        let mut inner = self.lifecycle.inner.lock();
        if matches!(
            self.lifecycle.state(),
            ConnectionState::Idle | ConnectionState::Closed
        ) {
            self.config.validate()?;
            debug!("Connecting on demand");
            self.begin_attempt(&mut inner);
        }
        Ok(())
    }

    fn begin_attempt(self: &Arc<Self>, inner: &mut LifecycleInner) {
        if let Some(reconnect) = inner.reconnect.take() {
            reconnect.abort();
        }
        inner.epoch += 1;
        let epoch = inner.epoch;
        self.lifecycle.set_state(ConnectionState::Connecting);

        let weak = Arc::downgrade(self);
        let connector = Arc::clone(&self.connector);
        let url = self.config.url.clone();
        tokio::spawn(async move {
            debug!(url = %url, connector = connector.name(), epoch, "Opening link");
            let result = connector.connect(&url).await;
            let Some(shared) = weak.upgrade() else {
                return;
            };
            if let Some(mut stale) = shared.attempt_finished(epoch, result) {
                let _ = stale.writer.close().await;
            }
        });
    }

    /// Applies the outcome of attempt `epoch`. Hands back a link that is no
    /// longer wanted so the caller can close it.
    fn attempt_finished(
        self: &Arc<Self>,
        epoch: u64,
        result: Result<Link, TransportError>,
    ) -> Option<Link> {
        let mut inner = self.lifecycle.inner.lock();
        if inner.epoch != epoch {
            debug!(epoch, "Discarding outcome of superseded connection attempt");
            return result.ok();
        }

        match result {
            Ok(link) => {
                let (tx, rx) = mpsc::unbounded_channel();
                inner.link = Some(tx);
                inner.attempts = 0;
                self.lifecycle.set_state(ConnectionState::Open);

                tokio::spawn(run_link(Arc::downgrade(self), epoch, link, rx));
                if self.config.keepalive.enabled {
                    inner.keepalive = Some(keepalive::spawn(
                        Arc::downgrade(self),
                        self.config.keepalive.clone(),
                    ));
                }
                let waiters = std::mem::take(&mut inner.waiters);
                drop(inner);

                self.metrics.record_connection_opened();
                self.config.reconnection_strategy.on_connected();
                info!(url = %self.config.url, "Connection open");

                for waiter in waiters {
                    let _ = waiter.send(Ok(()));
                }
                self.listeners.emit(OPEN_EVENT, &Value::Null);
                self.flush();
                None
            }
            Err(error) => {
                self.metrics.record_connection_error();
                warn!(url = %self.config.url, error = %error, "Connection attempt failed");

                let waiters = std::mem::take(&mut inner.waiters);
                for waiter in waiters {
                    let _ = waiter.send(Err(copy_error(&error, &self.config.url)));
                }
                self.transition_closed(inner, error);
                None
            }
        }
    }

    /// Called by the link task when the link of `epoch` ends on its own.
    fn link_lost(self: &Arc<Self>, epoch: u64, error: TransportError) {
        let inner = self.lifecycle.inner.lock();
        if inner.epoch != epoch || inner.link.is_none() {
            return;
        }
        self.metrics.record_connection_closed();
        info!(reason = %error, "Connection lost");
        self.transition_closed(inner, error);
    }

    fn transition_closed(
        self: &Arc<Self>,
        mut inner: MutexGuard<'_, LifecycleInner>,
        error: TransportError,
    ) {
        inner.link = None;
        if let Some(keepalive) = inner.keepalive.take() {
            keepalive.abort();
        }
        self.lifecycle.set_state(ConnectionState::Closed);

        if self.lifecycle.auto_reconnect() {
            let attempt = inner.attempts;
            inner.attempts = inner.attempts.saturating_add(1);
            inner.reconnect = Some(self.schedule_reconnect(inner.epoch, attempt, &error));
        }
        drop(inner);

        self.config.reconnection_strategy.on_disconnected(&error);
        self.listeners.emit(CLOSE_EVENT, &Value::Null);
    }

    fn schedule_reconnect(
        self: &Arc<Self>,
        epoch: u64,
        attempt: u32,
        error: &TransportError,
    ) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        let strategy = Arc::clone(&self.config.reconnection_strategy);
        let error = copy_error(error, &self.config.url);

        tokio::spawn(async move {
            if !strategy.should_reconnect(attempt, &error).await {
                info!(
                    strategy = strategy.name(),
                    attempt,
                    error = %error,
                    "Not reconnecting"
                );
                return;
            }
            let delay = strategy.next_delay(attempt).await;
            debug!(strategy = strategy.name(), attempt, ?delay, "Reconnection scheduled");
            tokio::time::sleep(delay).await;

            if let Some(shared) = weak.upgrade() {
                shared.reconnect_now(epoch);
            }
        })
    }

    fn reconnect_now(self: &Arc<Self>, epoch: u64) {
        let mut inner = self.lifecycle.inner.lock();
        if inner.epoch != epoch || self.lifecycle.state() != ConnectionState::Closed {
            return;
        }
        inner.reconnect = None;
        if !self.lifecycle.auto_reconnect() {
            return;
        }
        self.metrics.record_reconnect_attempt();
        info!(attempt = inner.attempts, "Reconnecting");
        self.begin_attempt(&mut inner);
    }

    /// Tears the link down without scheduling a reconnection.
    ///
    /// In-flight `connect()` calls fail with [`TransportError::Closed`] and
    /// every pending request is rejected with [`RpcError::ConnectionClosed`].
    /// Rejected requests still waiting in the outbound queue are dropped so
    /// a later connection does not send them.
    pub(crate) fn close(&self) {
        let (previous, waiters) = {
            let mut inner = self.lifecycle.inner.lock();
            inner.epoch += 1;
            inner.attempts = 0;
            // Dropping the sender ends the link task, which closes the socket.
            inner.link = None;
            if let Some(reconnect) = inner.reconnect.take() {
                reconnect.abort();
            }
            if let Some(keepalive) = inner.keepalive.take() {
                keepalive.abort();
            }
            let previous = self.lifecycle.set_state(ConnectionState::Closed);
            (previous, std::mem::take(&mut inner.waiters))
        };

        for waiter in waiters {
            let _ = waiter.send(Err(TransportError::Closed));
        }
        let rejected: HashSet<_> = self
            .correlator
            .reject_all(|| RpcError::ConnectionClosed)
            .into_iter()
            .collect();
        let discarded = self.batcher.discard_requests(&rejected);

        if previous == ConnectionState::Open {
            self.metrics.record_connection_closed();
        }
        info!(
            previous = %previous,
            rejected = rejected.len(),
            discarded,
            "Transport closed"
        );

        if matches!(previous, ConnectionState::Open | ConnectionState::Connecting) {
            self.config
                .reconnection_strategy
                .on_disconnected(&TransportError::Closed);
            self.listeners.emit(CLOSE_EVENT, &Value::Null);
        }
    }

    /// Switching back on starts a fresh backoff and clears the strategy's
    /// history.
    pub(crate) fn set_auto_reconnect(&self, enabled: bool) {
        let previous = self
            .lifecycle
            .auto_reconnect
            .swap(enabled, Ordering::AcqRel);
        if enabled {
            if !previous {
                self.lifecycle.inner.lock().attempts = 0;
                self.config.reconnection_strategy.reset();
                debug!(strategy = self.config.reconnection_strategy.name(), "Auto-reconnect re-enabled");
            }
        } else if let Some(reconnect) = self.lifecycle.inner.lock().reconnect.take() {
            reconnect.abort();
        }
    }
}

/// Pumps one link: inbound frames go to the dispatcher, outbound frames come
/// from the batcher.
async fn run_link(
    shared: Weak<Shared>,
    epoch: u64,
    link: Link,
    mut outbound: mpsc::UnboundedReceiver<String>,
) {
    let Link {
        mut reader,
        mut writer,
    } = link;

    let lost = loop {
        tokio::select! {
            frame = reader.next_frame() => match frame {
                Some(Ok(frame)) => {
                    let Some(shared) = shared.upgrade() else {
                        break None;
                    };
                    dispatcher::dispatch_frame(&shared, &frame);
                }
                Some(Err(error)) => break Some(error),
                None => break Some(TransportError::connection_lost("closed by peer")),
            },
            frame = outbound.recv() => match frame {
                Some(frame) => {
                    if let Err(error) = writer.send_frame(frame).await {
                        break Some(error);
                    }
                }
                // The lifecycle dropped this link.
                None => break None,
            },
        }
    };

    if let Err(error) = writer.close().await {
        debug!(error = %error, "Error while closing link");
    }
    if let (Some(error), Some(shared)) = (lost, shared.upgrade()) {
        shared.link_lost(epoch, error);
    }
}

/// Builds an owned copy of `error` for each party waiting on one attempt.
fn copy_error(error: &TransportError, url: &str) -> TransportError {
    match error {
        TransportError::InvalidConfiguration { reason } => {
            TransportError::invalid_configuration(reason.clone())
        }
        TransportError::ConnectionFailed { url, reason } => {
            TransportError::connection_failed(url.clone(), reason.clone())
        }
        TransportError::ConnectionLost { reason } => TransportError::connection_lost(reason.clone()),
        TransportError::Closed => TransportError::Closed,
        TransportError::WebSocket(e) => TransportError::connection_failed(url, e.to_string()),
    }
}
