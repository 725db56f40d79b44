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

//! Outbound batching.
//!
//! Messages accumulate in an ordered queue and leave as one
//! `{ "type": "batch", "messages": [...] }` frame when either the debounce
//! window since the first unflushed enqueue elapses or the queue reaches the
//! maximum batch size. A flush writes as many frames as it takes to empty the
//! queue, each holding at most the maximum batch size, in enqueue order.
//!
//! While no link is open a flush does nothing and messages wait, up to
//! `max_queue_depth`. Past that bound the [`OverflowPolicy`] decides between
//! refusing the newcomer and evicting the oldest message.

use crate::config::{OverflowPolicy, TransportConfig};
use crate::lifecycle::LinkSender;
use crate::observability::TransportMetrics;
use crate::rpc::RpcError;
use crate::wire::{codec, MessageId, MessageKind, OutgoingMessage};
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Flush the caller should arrange after an enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FlushTrigger {
    /// A flush is already scheduled.
    None,
    /// First unflushed message: flush after the debounce window.
    Debounce,
    /// The queue holds a full batch: flush now.
    Immediate,
}

#[derive(Debug)]
pub(crate) struct Batcher {
    queue: Mutex<VecDeque<OutgoingMessage>>,
    flush_scheduled: AtomicBool,
    interval: Duration,
    max_batch_size: usize,
    max_queue_depth: usize,
    overflow_policy: OverflowPolicy,
    metrics: Arc<TransportMetrics>,
}

impl Batcher {
    pub(crate) fn new(config: &TransportConfig, metrics: Arc<TransportMetrics>) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            flush_scheduled: AtomicBool::new(false),
            interval: config.batch_interval,
            max_batch_size: config.max_batch_size.max(1),
            max_queue_depth: config.max_queue_depth.max(1),
            overflow_policy: config.overflow_policy,
            metrics,
        }
    }

    pub(crate) fn interval(&self) -> Duration {
        self.interval
    }

    /// Appends `message` and reports which flush is due.
    pub(crate) fn enqueue(&self, message: OutgoingMessage) -> Result<FlushTrigger, RpcError> {
        let mut queue = self.queue.lock();

        if queue.len() >= self.max_queue_depth {
            self.metrics.record_queue_overflow();
            match self.overflow_policy {
                OverflowPolicy::RejectNew => {
                    tracing::warn!(
                        id = %message.id,
                        capacity = self.max_queue_depth,
                        "Outbound queue full, rejecting message"
                    );
                    return Err(RpcError::QueueFull {
                        capacity: self.max_queue_depth,
                    });
                }
                OverflowPolicy::DropOldest => {
                    if let Some(evicted) = queue.pop_front() {
                        tracing::warn!(
                            id = %evicted.id,
                            capacity = self.max_queue_depth,
                            "Outbound queue full, dropping oldest message"
                        );
                    }
                }
            }
        }

        queue.push_back(message);

        if queue.len() >= self.max_batch_size {
            Ok(FlushTrigger::Immediate)
        } else if self.flush_scheduled.swap(true, Ordering::AcqRel) {
            Ok(FlushTrigger::None)
        } else {
            Ok(FlushTrigger::Debounce)
        }
    }

    /// Called by the debounce timer before it flushes.
    pub(crate) fn timer_fired(&self) {
        self.flush_scheduled.store(false, Ordering::Release);
    }

    /// Writes every queued message to `link` as batch frames.
    ///
    /// Does nothing without a link. If the link goes away mid-flush the
    /// unsent batch returns to the front of the queue. Returns the number of
    /// frames written.
    pub(crate) fn flush(&self, link: Option<&LinkSender>) -> usize {
        let Some(link) = link else {
            return 0;
        };

        // Held across the writes so concurrent flushes cannot interleave frames.
        let mut queue = self.queue.lock();
        let mut frames = 0;

        while !queue.is_empty() {
            let count = queue.len().min(self.max_batch_size);
            let batch: Vec<OutgoingMessage> = queue.drain(..count).collect();

            let frame = match codec::encode_batch(&batch) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::error!(error = %e, dropped = count, "Failed to encode batch");
                    continue;
                }
            };

            if link.send(frame).is_err() {
                for message in batch.into_iter().rev() {
                    queue.push_front(message);
                }
                tracing::debug!(queued = queue.len(), "Link closed during flush");
                break;
            }

            self.metrics.record_batch_sent(count);
            frames += 1;
        }

        if frames > 0 {
            tracing::trace!(frames, "Flushed outbound queue");
        }
        frames
    }

    /// Drops queued requests whose ids are in `ids`. Events are kept.
    ///
    /// Returns the number of messages removed.
    pub(crate) fn discard_requests(&self, ids: &HashSet<MessageId>) -> usize {
        if ids.is_empty() {
            return 0;
        }
        let mut queue = self.queue.lock();
        let before = queue.len();
        queue.retain(|m| !(m.kind == MessageKind::Rpc && ids.contains(&m.id)));
        before - queue.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.lock().len()
    }
}
