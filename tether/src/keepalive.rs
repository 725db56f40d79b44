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

//! Keepalive driver.
//!
//! While the link is open, sends the configured probe event (default
//! `"ping"`) with a `{ "ts": <millis> }` payload once per interval. Replies
//! are neither awaited nor required. The lifecycle aborts the task on every
//! transition out of `Open`.

use crate::client::Shared;
use crate::config::KeepaliveConfig;
use crate::wire::unix_millis;
use serde_json::json;
use std::sync::Weak;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

pub(crate) fn spawn(shared: Weak<Shared>, config: KeepaliveConfig) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval_at(Instant::now() + config.interval, config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let Some(shared) = shared.upgrade() else {
                break;
            };
            if !shared.lifecycle.is_open() {
                continue;
            }
            tracing::trace!(event = %config.probe_event, "Sending keepalive probe");
            if let Err(e) = shared.send_event(&config.probe_event, Some(json!({ "ts": unix_millis() }))) {
                tracing::debug!(error = %e, "Keepalive probe not queued");
            }
        }
    })
}
