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

//! Wire message types.
//!
//! Outbound:
//!
//! ```json
//! { "id": "…", "kind": "rpc", "type": "users.with_info", "payload": { … }, "ts": 1718000000000 }
//! ```
//!
//! Inbound, discriminated by `type`:
//!
//! ```json
//! { "type": "ack", "id": "…" }
//! { "type": "rpc_result", "id": "…", "result": … }
//! { "type": "rpc_error", "id": "…", "error": { "message": "…", "code": 404, "data": … } }
//! { "type": "event", "event": "presence", "payload": … }
//! ```

use crate::wire::MessageId;
use crate::wire::id::unix_millis;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Whether an outgoing message expects a correlated reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Request expecting an `rpc_result` or `rpc_error` with the same id
    Rpc,
    /// Fire-and-forget event
    Event,
}

/// A message queued for transmission.
///
/// Immutable once created; a retried request is resent byte-for-byte under
/// the same id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    /// Correlation identifier
    pub id: MessageId,
    /// Rpc or event
    pub kind: MessageKind,
    /// Method or event name
    #[serde(rename = "type")]
    pub message_type: String,
    /// Optional body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    /// Creation time, milliseconds since the Unix epoch
    pub ts: u64,
}

impl OutgoingMessage {
    /// Creates a request message.
    pub fn rpc(id: MessageId, message_type: impl Into<String>, payload: Option<Value>) -> Self {
        Self::new(id, MessageKind::Rpc, message_type.into(), payload)
    }

    /// Creates a fire-and-forget event message.
    pub fn event(id: MessageId, message_type: impl Into<String>, payload: Option<Value>) -> Self {
        Self::new(id, MessageKind::Event, message_type.into(), payload)
    }

    fn new(id: MessageId, kind: MessageKind, message_type: String, payload: Option<Value>) -> Self {
        Self {
            id,
            kind,
            message_type,
            payload,
            ts: unix_millis(),
        }
    }
}

/// Numeric or symbolic error code supplied by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorCode {
    /// Numeric code, e.g. `404`
    Number(i64),
    /// Symbolic code, e.g. `"not_found"`
    Text(String),
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

fn default_remote_message() -> String {
    "WS error".to_string()
}

/// `null` and `""` count as no message.
fn remote_message<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let message = Option::<String>::deserialize(deserializer)?;
    Ok(message
        .filter(|m| !m.is_empty())
        .unwrap_or_else(default_remote_message))
}

/// `"error": null` decodes like a missing descriptor.
fn remote_error<'de, D: Deserializer<'de>>(deserializer: D) -> Result<RemoteError, D::Error> {
    Ok(Option::<RemoteError>::deserialize(deserializer)?.unwrap_or_default())
}

/// Error descriptor carried by an `rpc_error` frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteError {
    /// Human-readable message
    #[serde(default = "default_remote_message", deserialize_with = "remote_message")]
    pub message: String,
    /// Optional machine-readable code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    /// Optional structured details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} (code {code})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl Default for RemoteError {
    fn default() -> Self {
        Self {
            message: default_remote_message(),
            code: None,
            data: None,
        }
    }
}

/// A single inbound message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IncomingMessage {
    /// Receipt for an outgoing message; informational
    Ack {
        /// Id of the acknowledged message
        id: MessageId,
    },
    /// Successful reply to a request
    RpcResult {
        /// Id of the request
        id: MessageId,
        /// Result value
        #[serde(default)]
        result: Value,
    },
    /// Failed reply to a request
    RpcError {
        /// Id of the request
        id: MessageId,
        /// Server-supplied error
        #[serde(default, deserialize_with = "remote_error")]
        error: RemoteError,
    },
    /// Server-pushed event
    Event {
        /// Event name
        event: String,
        /// Optional body
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
}
