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

//! Publish/subscribe fan-out for server-pushed events.
//!
//! Handlers are keyed by event name. Any number of handlers may listen to the
//! same name; each one is invoked once per emitted event, in no guaranteed
//! order. A handler that panics is logged and skipped; its siblings still run.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Event emitted after the connection opens.
pub const OPEN_EVENT: &str = "open";

/// Event emitted after the connection closes.
pub const CLOSE_EVENT: &str = "close";

/// Callback invoked with an event's payload (`Value::Null` when absent).
pub type Handler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Identifies one registered handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// Mapping from event name to its handlers.
#[derive(Default)]
pub struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: Mutex<HashMap<String, Vec<(ListenerId, Handler)>>>,
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let listeners = self.listeners.lock();
        let counts: HashMap<&str, usize> = listeners
            .iter()
            .map(|(event, handlers)| (event.as_str(), handlers.len()))
            .collect();
        f.debug_struct("ListenerRegistry")
            .field("listeners", &counts)
            .finish()
    }
}

impl ListenerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `event`.
    pub fn on<F>(&self, event: impl Into<String>, handler: F) -> ListenerId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .entry(event.into())
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Removes the handler `id` from `event`. Returns `false` if it was not registered.
    pub fn off(&self, event: &str, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let Some(handlers) = listeners.get_mut(event) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|(listener, _)| *listener != id);
        let removed = handlers.len() != before;
        if handlers.is_empty() {
            listeners.remove(event);
        }
        removed
    }

    /// Invokes every handler registered for `event`.
    ///
    /// Handlers run outside the registry lock, so they may subscribe or
    /// unsubscribe freely. Returns the number of handlers that completed.
    pub fn emit(&self, event: &str, payload: &Value) -> usize {
        let handlers: Vec<Handler> = match self.listeners.lock().get(event) {
            Some(handlers) => handlers.iter().map(|(_, h)| Arc::clone(h)).collect(),
            None => return 0,
        };

        let mut completed = 0;
        for handler in handlers {
            match panic::catch_unwind(AssertUnwindSafe(|| handler(payload))) {
                Ok(()) => completed += 1,
                Err(_) => tracing::warn!(event, "Event handler panicked"),
            }
        }
        completed
    }

    /// Number of handlers registered for `event`.
    #[must_use]
    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.lock().get(event).map_or(0, Vec::len)
    }
}

/// Handle returned by [`Transport::on`](crate::Transport::on).
///
/// Dropping a subscription leaves the handler registered; call
/// [`Subscription::unsubscribe`] to remove it.
#[derive(Debug, Clone)]
#[must_use = "keep the subscription to be able to unsubscribe"]
pub struct Subscription {
    registry: Weak<ListenerRegistry>,
    event: String,
    id: ListenerId,
}

impl Subscription {
    pub(crate) fn new(registry: &Arc<ListenerRegistry>, event: String, id: ListenerId) -> Self {
        Self {
            registry: Arc::downgrade(registry),
            event,
            id,
        }
    }

    /// A subscription that is not attached to any registry.
    pub(crate) fn inert(event: String) -> Self {
        Self {
            registry: Weak::new(),
            event,
            id: ListenerId(u64::MAX),
        }
    }

    /// Event name this subscription listens to.
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Identifier of the registered handler.
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Removes the handler. Returns `false` if it was already removed.
    pub fn unsubscribe(self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.off(&self.event, self.id))
    }
}
