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

//! Inbound routing.
//!
//! Each frame is decoded into zero or more messages which are handled in
//! frame order:
//!
//! - `ack` marks the pending request as acknowledged; the request keeps
//!   waiting for its result
//! - `rpc_result` / `rpc_error` complete the pending request with that id
//! - `event` fans out to listeners; a keepalive probe from the server is
//!   answered with the reply event first
//!
//! Malformed frames are counted and dropped. Nothing here surfaces an error.

use crate::client::Shared;
use crate::rpc::RpcError;
use crate::wire::{codec, unix_millis, IncomingMessage};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, trace};

pub(crate) fn dispatch_frame(shared: &Arc<Shared>, frame: &str) {
    shared.metrics.record_frame_received();

    let decoded = match codec::decode_frame(frame) {
        Ok(decoded) => decoded,
        Err(e) => {
            shared.metrics.record_malformed_frame();
            debug!(error = %e, len = frame.len(), "Dropping malformed frame");
            return;
        }
    };
    if decoded.skipped > 0 {
        shared.metrics.record_unknown_messages(decoded.skipped);
    }

    for message in decoded.messages {
        dispatch_message(shared, message);
    }
}

fn dispatch_message(shared: &Arc<Shared>, message: IncomingMessage) {
    match message {
        IncomingMessage::Ack { id } => {
            shared.metrics.record_ack();
            if !shared.correlator.acknowledge(&id) {
                trace!(id = %id, "Ack for unknown id");
            }
        }
        IncomingMessage::RpcResult { id, result } => {
            if !shared.correlator.resolve(&id, Ok(result)) {
                shared.metrics.record_late_reply();
                debug!(id = %id, "Ignoring result for request that is no longer pending");
            }
        }
        IncomingMessage::RpcError { id, error } => {
            if shared.correlator.resolve(&id, Err(RpcError::Remote(error))) {
                shared.metrics.record_rpc_remote_error();
            } else {
                shared.metrics.record_late_reply();
                debug!(id = %id, "Ignoring error for request that is no longer pending");
            }
        }
        IncomingMessage::Event { event, payload } => {
            let keepalive = &shared.config.keepalive;
            if event == keepalive.probe_event {
                trace!("Answering keepalive probe");
                if let Err(e) =
                    shared.send_event(&keepalive.reply_event, Some(json!({ "ts": unix_millis() })))
                {
                    debug!(error = %e, "Keepalive reply not queued");
                }
            }
            let handled = shared
                .listeners
                .emit(&event, payload.as_ref().unwrap_or(&Value::Null));
            trace!(event = %event, handled, "Dispatched event");
        }
    }
}
