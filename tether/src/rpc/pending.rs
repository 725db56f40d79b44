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

//! Tracking of in-flight requests.
//!
//! The pending table maps a request id to the continuation that resolves the
//! caller's future, plus the original message so a timed-out request can be
//! resent verbatim. Whoever removes an entry first decides the outcome; any
//! later reply for the same id finds nothing and is ignored.

use crate::rpc::RpcError;
use crate::wire::{MessageId, OutgoingMessage};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;

/// Outcome delivered to a waiting request.
pub type Reply = Result<Value, RpcError>;

#[derive(Debug)]
struct PendingEntry {
    tx: oneshot::Sender<Reply>,
    message: OutgoingMessage,
    sent_at: Instant,
    tries: u32,
    timeout: Duration,
    acknowledged: bool,
}

/// In-flight requests keyed by id.
///
/// # Example
///
/// ```rust
/// use tether::rpc::PendingTable;
/// use tether::wire::{MessageId, OutgoingMessage};
/// use std::time::Duration;
///
/// # async fn example() {
/// let pending = PendingTable::new();
/// let message = OutgoingMessage::rpc(MessageId::from("1-a"), "users.list", None);
/// let rx = pending.register(message, Duration::from_secs(10)).unwrap();
///
/// assert!(pending.complete(&MessageId::from("1-a"), Ok(serde_json::json!([]))));
/// // Duplicate replies are ignored.
/// assert!(!pending.complete(&MessageId::from("1-a"), Ok(serde_json::json!(null))));
///
/// assert_eq!(rx.await.unwrap().unwrap(), serde_json::json!([]));
/// # }
/// ```
#[derive(Debug, Default)]
pub struct PendingTable {
    entries: Mutex<HashMap<MessageId, PendingEntry>>,
}

impl PendingTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `message` and returns the receiver its reply will arrive on.
    ///
    /// Fails if an entry with the same id is still live.
    pub fn register(
        &self,
        message: OutgoingMessage,
        timeout: Duration,
    ) -> Result<oneshot::Receiver<Reply>, RpcError> {
        let mut entries = self.entries.lock();
        if entries.contains_key(&message.id) {
            return Err(RpcError::DuplicateId(message.id));
        }

        let (tx, rx) = oneshot::channel();
        entries.insert(
            message.id.clone(),
            PendingEntry {
                tx,
                message,
                sent_at: Instant::now(),
                tries: 0,
                timeout,
                acknowledged: false,
            },
        );
        Ok(rx)
    }

    /// Resolves the request `id` with `reply` and removes it.
    ///
    /// Returns `false` if no such request is pending.
    pub fn complete(&self, id: &MessageId, reply: Reply) -> bool {
        let Some(entry) = self.entries.lock().remove(id) else {
            return false;
        };
        tracing::trace!(
            id = %id,
            tries = entry.tries,
            elapsed = ?entry.sent_at.elapsed(),
            "Completing pending request"
        );
        // The caller may have given up already; the entry is gone either way.
        let _ = entry.tx.send(reply);
        true
    }

    /// Marks the request `id` as acknowledged by the server.
    ///
    /// Acknowledgement does not resolve the request.
    pub fn acknowledge(&self, id: &MessageId) -> bool {
        match self.entries.lock().get_mut(id) {
            Some(entry) => {
                entry.acknowledged = true;
                true
            }
            None => false,
        }
    }

    /// Returns whether the request `id` has been acknowledged, or `None` if
    /// it is not pending.
    #[must_use]
    pub fn is_acknowledged(&self, id: &MessageId) -> Option<bool> {
        self.entries.lock().get(id).map(|entry| entry.acknowledged)
    }

    /// Prepares a resend of the request `id`.
    ///
    /// Bumps the try counter, restarts the send clock and returns a copy of
    /// the original message. Returns `None` if the request is no longer
    /// pending.
    pub fn begin_retry(&self, id: &MessageId) -> Option<OutgoingMessage> {
        let mut entries = self.entries.lock();
        let entry = entries.get_mut(id)?;
        entry.tries += 1;
        entry.sent_at = Instant::now();
        entry.acknowledged = false;
        Some(entry.message.clone())
    }

    /// Number of retries issued so far for `id`.
    #[must_use]
    pub fn tries(&self, id: &MessageId) -> Option<u32> {
        self.entries.lock().get(id).map(|entry| entry.tries)
    }

    /// Deadline applied to each attempt of `id`.
    #[must_use]
    pub fn timeout(&self, id: &MessageId) -> Option<Duration> {
        self.entries.lock().get(id).map(|entry| entry.timeout)
    }

    /// Removes the request `id` without resolving it.
    ///
    /// The waiting receiver observes a closed channel.
    pub fn remove(&self, id: &MessageId) -> bool {
        self.entries.lock().remove(id).is_some()
    }

    /// Rejects every pending request with the error built by `error`.
    ///
    /// Returns the ids of the rejected requests.
    pub fn reject_all(&self, error: impl Fn() -> RpcError) -> Vec<MessageId> {
        let drained: Vec<_> = self.entries.lock().drain().collect();
        drained
            .into_iter()
            .map(|(id, entry)| {
                let _ = entry.tx.send(Err(error()));
                id
            })
            .collect()
    }

    /// Returns `true` if `id` is pending.
    #[must_use]
    pub fn contains(&self, id: &MessageId) -> bool {
        self.entries.lock().contains_key(id)
    }

    /// Number of pending requests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if no request is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
