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

//! Transport layer error types.
//!
//! Transport errors are the lowest level of the error hierarchy and describe
//! failures of the underlying socket. They are never surfaced to RPC callers
//! directly: a lost connection shows up as request timeouts and as a deferred
//! reconnection. Only [`Transport::connect`](crate::Transport::connect) hands
//! them back to the caller.
//!
//! # Recovery Strategy
//!
//! - Recoverable errors close the link and schedule a reconnection attempt
//!   (when auto-reconnect is enabled).
//! - Non-recoverable errors (invalid configuration) reject the connect call
//!   and are not retried.

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Errors that can occur in the transport layer.
///
/// # Examples
///
/// ```rust
/// use tether::transport::TransportError;
///
/// let error = TransportError::connection_failed("ws://localhost:1/ws", "connection refused");
/// assert!(error.is_recoverable());
///
/// let error = TransportError::invalid_configuration("relative URL without a base");
/// assert!(!error.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum TransportError {
    /// Failed to establish a connection to the remote endpoint.
    #[error("failed to connect to {url}: {reason}")]
    ConnectionFailed {
        /// The URL that failed to connect
        url: String,
        /// Description of the failure
        reason: String,
    },

    /// An established connection was lost.
    #[error("connection lost: {reason}")]
    ConnectionLost {
        /// Description of why the connection was lost
        reason: String,
    },

    /// A WebSocket protocol error occurred.
    #[error("websocket error: {0}")]
    WebSocket(#[from] Box<tungstenite::Error>),

    /// The transport was configured with invalid parameters.
    ///
    /// This is not recoverable and indicates a programming or deployment error.
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration {
        /// Description of the configuration error
        reason: String,
    },

    /// The transport was explicitly closed.
    #[error("transport is closed")]
    Closed,
}

impl TransportError {
    /// Creates a [`TransportError::ConnectionFailed`].
    pub fn connection_failed(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates a [`TransportError::ConnectionLost`].
    pub fn connection_lost(reason: impl Into<String>) -> Self {
        Self::ConnectionLost {
            reason: reason.into(),
        }
    }

    /// Creates a [`TransportError::InvalidConfiguration`].
    pub fn invalid_configuration(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            reason: reason.into(),
        }
    }

    /// Returns `true` if a later connection attempt may succeed.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::ConnectionFailed { .. }
            | Self::ConnectionLost { .. }
            | Self::WebSocket(_) => true,
            Self::InvalidConfiguration { .. } | Self::Closed => false,
        }
    }
}

impl From<tungstenite::Error> for TransportError {
    fn from(error: tungstenite::Error) -> Self {
        match error {
            tungstenite::Error::Url(e) => Self::invalid_configuration(e.to_string()),
            tungstenite::Error::HttpFormat(e) => Self::invalid_configuration(e.to_string()),
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                Self::connection_lost("socket already closed")
            }
            other => Self::WebSocket(Box::new(other)),
        }
    }
}
