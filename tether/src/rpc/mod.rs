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

//! Request/response correlation.
//!
//! Each request gets a fresh id and an entry in the [`PendingTable`]. The
//! caller's future then waits for one of three things:
//!
//! - an `rpc_result` or `rpc_error` with the same id, routed here by the
//!   dispatcher;
//! - the attempt deadline, after which the same message is resent under the
//!   same id following an exponential backoff, while the retry budget lasts;
//! - an explicit [`Transport::close`](crate::Transport::close), which rejects
//!   every pending request.
//!
//! Requests are correlated by id only, so concurrent calls may complete in
//! any order.

mod error;
mod pending;

pub use error::RpcError;
pub use pending::{PendingTable, Reply};

use crate::observability::TransportMetrics;
use crate::reconnection::ExponentialBackoff;
use crate::wire::{MessageId, OutgoingMessage};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;

/// Per-call overrides for [`Transport::request_with`](crate::Transport::request_with).
///
/// Unset fields fall back to the transport's configured defaults.
///
/// # Examples
///
/// ```rust
/// use tether::rpc::RequestOptions;
/// use std::time::Duration;
///
/// let options = RequestOptions::new()
///     .timeout(Duration::from_millis(500))
///     .retries(3);
/// assert_eq!(options.retries, Some(3));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Deadline for each attempt.
    pub timeout: Option<Duration>,
    /// Number of resends after the first attempt times out.
    pub retries: Option<u32>,
}

impl RequestOptions {
    /// Options that use the configured defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-attempt deadline.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the retry budget.
    #[must_use]
    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }
}

/// Pending table plus the retry policy applied to it.
#[derive(Debug)]
pub(crate) struct Correlator {
    pending: PendingTable,
    backoff: ExponentialBackoff,
    metrics: Arc<TransportMetrics>,
}

impl Correlator {
    pub(crate) fn new(backoff: ExponentialBackoff, metrics: Arc<TransportMetrics>) -> Self {
        Self {
            pending: PendingTable::new(),
            backoff,
            metrics,
        }
    }

    pub(crate) fn pending(&self) -> &PendingTable {
        &self.pending
    }

    /// Routes a reply to its request. Returns `false` if the id is unknown.
    pub(crate) fn resolve(&self, id: &MessageId, reply: Reply) -> bool {
        self.pending.complete(id, reply)
    }

    pub(crate) fn acknowledge(&self, id: &MessageId) -> bool {
        self.pending.acknowledge(id)
    }

    pub(crate) fn reject_all(&self, error: impl Fn() -> RpcError) -> Vec<MessageId> {
        self.pending.reject_all(error)
    }

    /// Sends `message` through `enqueue` and waits for its reply, resending
    /// on timeout while `retries` lasts.
    pub(crate) async fn call<F>(
        &self,
        message: OutgoingMessage,
        timeout: Duration,
        retries: u32,
        enqueue: F,
    ) -> Result<Value, RpcError>
    where
        F: Fn(OutgoingMessage) -> Result<(), RpcError>,
    {
        let id = message.id.clone();
        let method = message.message_type.clone();
        let mut rx = self.pending.register(message.clone(), timeout)?;
        let _guard = PendingGuard {
            pending: &self.pending,
            id: &id,
        };

        enqueue(message)?;

        let mut tries = 0u32;
        loop {
            if let Ok(reply) = time::timeout(timeout, &mut rx).await {
                return settle(reply);
            }

            if tries >= retries {
                if !self.pending.remove(&id) {
                    // A reply won the race against the deadline.
                    return settle(rx.try_recv());
                }
                self.metrics.record_rpc_timeout();
                tracing::debug!(id = %id, method = %method, attempts = tries + 1, "Request timed out");
                return Err(RpcError::Timeout {
                    method,
                    attempts: tries + 1,
                    timeout,
                });
            }

            let delay = self.backoff.delay_for(tries);
            tokio::select! {
                reply = &mut rx => return settle(reply),
                () = time::sleep(delay) => {}
            }

            let Some(message) = self.pending.begin_retry(&id) else {
                return settle(rx.try_recv());
            };
            tries += 1;
            self.metrics.record_rpc_retry();
            tracing::debug!(id = %id, method = %method, attempt = tries + 1, ?delay, "Retrying request");
            enqueue(message)?;
        }
    }
}

fn settle<E>(reply: Result<Reply, E>) -> Result<Value, RpcError> {
    // The sender is only dropped without a reply when the entry was torn down.
    reply.unwrap_or(Err(RpcError::ConnectionClosed))
}

/// Removes the pending entry when the waiting future goes away.
struct PendingGuard<'a> {
    pending: &'a PendingTable,
    id: &'a MessageId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.remove(self.id);
    }
}
