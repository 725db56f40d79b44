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

//! Error types for request/response calls.

use crate::wire::{MessageId, RemoteError};
use std::time::Duration;
use thiserror::Error;

/// Why a request did not produce a result.
///
/// Every request future resolves exactly once, either with the server's
/// result or with one of these.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RpcError {
    /// No reply arrived within the deadline of the last attempt.
    #[error("request '{method}' timed out after {attempts} attempt(s) of {timeout:?}")]
    Timeout {
        /// Method name of the request.
        method: String,
        /// Total number of times the request was sent.
        attempts: u32,
        /// Deadline applied to each attempt.
        timeout: Duration,
    },

    /// The server answered with an `rpc_error`.
    #[error("remote error: {0}")]
    Remote(RemoteError),

    /// The transport was closed explicitly while the request was pending.
    #[error("connection closed")]
    ConnectionClosed,

    /// The outbound queue was full and the message was refused.
    #[error("outbound queue is full ({capacity} messages)")]
    QueueFull {
        /// Configured queue bound.
        capacity: usize,
    },

    /// The transport is disabled; no backend is configured.
    #[error("backend is not configured")]
    NotConfigured,

    /// The transport configuration failed validation, so no connection
    /// attempt was made and nothing was queued.
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration {
        /// What failed validation.
        reason: String,
    },

    /// A request with the same id is already pending.
    #[error("request id {0} is already pending")]
    DuplicateId(MessageId),

    /// The request payload could not be converted to JSON.
    #[error("failed to serialize payload: {0}")]
    Serialization(String),

    /// The result could not be converted to the expected type.
    #[error("failed to decode result: {0}")]
    Decode(String),
}

impl RpcError {
    /// Returns `true` for [`RpcError::Timeout`].
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns the server-supplied error, if any.
    #[must_use]
    pub const fn remote(&self) -> Option<&RemoteError> {
        match self {
            Self::Remote(error) => Some(error),
            _ => None,
        }
    }

    /// Returns `true` if issuing the same call again may succeed.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::ConnectionClosed | Self::QueueFull { .. }
        )
    }
}
