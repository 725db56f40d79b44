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

//! Transport metrics.
//!
//! Counters are plain atomics so every component can record through a shared
//! reference. A [`MetricsSnapshot`] copies them out for inspection.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one transport instance.
///
/// # Examples
///
/// ```rust
/// use tether::observability::TransportMetrics;
///
/// let metrics = TransportMetrics::new();
/// metrics.record_connection_opened();
/// metrics.record_batch_sent(3);
///
/// let snapshot = metrics.snapshot();
/// assert_eq!(snapshot.connections_opened, 1);
/// assert_eq!(snapshot.messages_sent, 3);
/// ```
#[derive(Debug, Default)]
pub struct TransportMetrics {
    /// Links successfully opened
    connections_opened: AtomicU64,
    /// Links closed, by either side
    connections_closed: AtomicU64,
    /// Connector calls that failed
    connection_errors: AtomicU64,
    /// Reconnection attempts scheduled
    reconnect_attempts: AtomicU64,
    /// Batch frames written
    batches_sent: AtomicU64,
    /// Messages carried by those frames
    messages_sent: AtomicU64,
    /// Frames read from the link
    frames_received: AtomicU64,
    /// Inbound frames dropped because they were not JSON
    malformed_frames: AtomicU64,
    /// Inbound messages skipped because their type was not recognised
    unknown_messages: AtomicU64,
    /// Acks received
    acks_received: AtomicU64,
    /// Requests resent after a deadline expired
    rpc_retries: AtomicU64,
    /// Requests that gave up after exhausting retries
    rpc_timeouts: AtomicU64,
    /// Requests rejected by the server
    rpc_remote_errors: AtomicU64,
    /// Results or errors for ids that were no longer pending
    late_replies: AtomicU64,
    /// Messages rejected or evicted by the queue bound
    queue_overflows: AtomicU64,
}

macro_rules! counters {
    ($($(#[$doc:meta])* $record:ident => $field:ident;)*) => {
        impl TransportMetrics {
            $(
                $(#[$doc])*
                pub fn $record(&self) {
                    self.$field.fetch_add(1, Ordering::Relaxed);
                }
            )*
        }
    };
}

counters! {
    /// Records a link being opened.
    record_connection_opened => connections_opened;
    /// Records a link being closed.
    record_connection_closed => connections_closed;
    /// Records a failed connector call.
    record_connection_error => connection_errors;
    /// Records a scheduled reconnection attempt.
    record_reconnect_attempt => reconnect_attempts;
    /// Records an inbound frame.
    record_frame_received => frames_received;
    /// Records a dropped malformed frame.
    record_malformed_frame => malformed_frames;
    /// Records an ack.
    record_ack => acks_received;
    /// Records a request retry.
    record_rpc_retry => rpc_retries;
    /// Records a request that timed out for good.
    record_rpc_timeout => rpc_timeouts;
    /// Records a server-side request failure.
    record_rpc_remote_error => rpc_remote_errors;
    /// Records a reply for an id that was not pending.
    record_late_reply => late_replies;
    /// Records a message lost to the queue bound.
    record_queue_overflow => queue_overflows;
}

impl TransportMetrics {
    /// Creates a zeroed metrics tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one batch frame carrying `messages` messages.
    pub fn record_batch_sent(&self, messages: usize) {
        self.batches_sent.fetch_add(1, Ordering::Relaxed);
        self.messages_sent
            .fetch_add(messages as u64, Ordering::Relaxed);
    }

    /// Records inbound messages skipped by the decoder.
    pub fn record_unknown_messages(&self, count: usize) {
        self.unknown_messages
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Returns the number of currently open links (0 or 1).
    #[must_use]
    pub fn active_connections(&self) -> u64 {
        let opened = self.connections_opened.load(Ordering::Relaxed);
        let closed = self.connections_closed.load(Ordering::Relaxed);
        opened.saturating_sub(closed)
    }

    /// Copies every counter.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        MetricsSnapshot {
            connections_opened: load(&self.connections_opened),
            connections_closed: load(&self.connections_closed),
            connection_errors: load(&self.connection_errors),
            reconnect_attempts: load(&self.reconnect_attempts),
            batches_sent: load(&self.batches_sent),
            messages_sent: load(&self.messages_sent),
            frames_received: load(&self.frames_received),
            malformed_frames: load(&self.malformed_frames),
            unknown_messages: load(&self.unknown_messages),
            acks_received: load(&self.acks_received),
            rpc_retries: load(&self.rpc_retries),
            rpc_timeouts: load(&self.rpc_timeouts),
            rpc_remote_errors: load(&self.rpc_remote_errors),
            late_replies: load(&self.late_replies),
            queue_overflows: load(&self.queue_overflows),
        }
    }
}

/// Point-in-time copy of [`TransportMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct MetricsSnapshot {
    pub connections_opened: u64,
    pub connections_closed: u64,
    pub connection_errors: u64,
    pub reconnect_attempts: u64,
    pub batches_sent: u64,
    pub messages_sent: u64,
    pub frames_received: u64,
    pub malformed_frames: u64,
    pub unknown_messages: u64,
    pub acks_received: u64,
    pub rpc_retries: u64,
    pub rpc_timeouts: u64,
    pub rpc_remote_errors: u64,
    pub late_replies: u64,
    pub queue_overflows: u64,
}
