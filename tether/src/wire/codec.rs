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

//! JSON framing.
//!
//! Outbound traffic is always framed as a batch envelope:
//!
//! ```json
//! { "type": "batch", "messages": [ … ] }
//! ```
//!
//! Inbound frames are either a single [`IncomingMessage`] or the same batch
//! envelope wrapping several of them. Decoding is tolerant at the message
//! level: one unrecognised entry inside a batch is skipped without losing its
//! siblings. Only a frame that is not JSON at all is rejected as a whole.

use crate::wire::{IncomingMessage, OutgoingMessage};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

const BATCH_TYPE: &str = "batch";

/// Errors produced while framing messages.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The frame is not valid JSON.
    #[error("malformed frame: {0}")]
    Malformed(#[source] serde_json::Error),

    /// A message could not be serialized.
    #[error("failed to encode batch: {0}")]
    Encode(#[source] serde_json::Error),
}

#[derive(Serialize)]
struct BatchFrame<'a> {
    #[serde(rename = "type")]
    frame_type: &'static str,
    messages: &'a [OutgoingMessage],
}

/// Messages recovered from one inbound frame.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DecodedFrame {
    /// Recognised messages, in frame order
    pub messages: Vec<IncomingMessage>,
    /// Number of entries that were not recognised and were dropped
    pub skipped: usize,
}

/// Serializes `messages` into one batch frame, preserving order.
///
/// # Example
///
/// ```rust
/// use tether::wire::{codec, MessageId, OutgoingMessage};
///
/// let messages = vec![OutgoingMessage::event(MessageId::from("1-a"), "typing", None)];
/// let frame = codec::encode_batch(&messages).unwrap();
/// assert!(frame.starts_with(r#"{"type":"batch","messages":[{"id":"1-a""#));
/// ```
pub fn encode_batch(messages: &[OutgoingMessage]) -> Result<String, CodecError> {
    serde_json::to_string(&BatchFrame {
        frame_type: BATCH_TYPE,
        messages,
    })
    .map_err(CodecError::Encode)
}

/// Decodes one inbound frame.
///
/// # Example
///
/// ```rust
/// use tether::wire::{codec, IncomingMessage};
///
/// let frame = r#"{"type":"batch","messages":[{"type":"ack","id":"1-a"},{"type":"mystery"}]}"#;
/// let decoded = codec::decode_frame(frame).unwrap();
/// assert_eq!(decoded.messages, vec![IncomingMessage::Ack { id: "1-a".into() }]);
/// assert_eq!(decoded.skipped, 1);
///
/// assert!(codec::decode_frame("not json").is_err());
/// ```
pub fn decode_frame(raw: &str) -> Result<DecodedFrame, CodecError> {
    let value: Value = serde_json::from_str(raw).map_err(CodecError::Malformed)?;
    let mut decoded = DecodedFrame::default();

    match value {
        Value::Object(mut object)
            if object.get("type").and_then(Value::as_str) == Some(BATCH_TYPE)
                && object.get("messages").is_some_and(Value::is_array) =>
        {
            if let Some(Value::Array(entries)) = object.remove("messages") {
                for entry in entries {
                    decoded.push(entry);
                }
            }
        }
        single => decoded.push(single),
    }

    Ok(decoded)
}

impl DecodedFrame {
    fn push(&mut self, entry: Value) {
        match serde_json::from_value::<IncomingMessage>(entry) {
            Ok(message) => self.messages.push(message),
            Err(e) => {
                tracing::debug!(error = %e, "Skipping unrecognised inbound message");
                self.skipped += 1;
            }
        }
    }
}
