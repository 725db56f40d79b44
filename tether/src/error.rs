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

//! Top-level error type.
//!
//! tether distinguishes two layers:
//!
//! 1. **Transport**: the socket could not be opened or was lost
//!    ([`TransportError`]). Only `connect()` reports these to callers; for
//!    requests a lost link shows up as a timeout.
//! 2. **Request**: a single call failed ([`RpcError`]): timed out, rejected
//!    by the server, refused by the queue bound or cut short by `close()`.
//!
//! [`TetherError`] composes both so application code can use `?` across
//! `connect` and `request` alike.
//!
//! # Examples
//!
//! ```rust
//! use tether::{RpcError, TetherError};
//! use tether::transport::TransportError;
//!
//! let error: TetherError = TransportError::Closed.into();
//! assert!(error.is_transport_error());
//!
//! let error: TetherError = RpcError::ConnectionClosed.into();
//! assert!(error.is_rpc_error());
//! assert!(error.is_recoverable());
//! ```

use crate::rpc::RpcError;
use crate::transport::TransportError;
use crate::wire::RemoteError;
use std::error::Error as StdError;
use std::fmt;

/// Any error returned by tether.
#[derive(Debug)]
pub enum TetherError {
    /// The connection could not be established or was lost.
    Transport(TransportError),

    /// A request failed.
    Rpc(RpcError),
}

impl TetherError {
    /// Returns `true` if this is a transport error.
    #[must_use]
    pub const fn is_transport_error(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Returns `true` if this is a request error.
    #[must_use]
    pub const fn is_rpc_error(&self) -> bool {
        matches!(self, Self::Rpc(_))
    }

    /// Returns `true` if a request ran out of time.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Rpc(e) if e.is_timeout())
    }

    /// Returns the server-supplied error, if the server rejected a request.
    #[must_use]
    pub const fn remote(&self) -> Option<&RemoteError> {
        match self {
            Self::Rpc(e) => e.remote(),
            Self::Transport(_) => None,
        }
    }

    /// Returns `true` if repeating the operation may succeed.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_recoverable(),
            Self::Rpc(e) => e.is_recoverable(),
        }
    }
}

impl fmt::Display for TetherError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport error: {}", e),
            Self::Rpc(e) => write!(f, "request error: {}", e),
        }
    }
}

impl StdError for TetherError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Transport(e) => Some(e),
            Self::Rpc(e) => Some(e),
        }
    }
}

impl From<TransportError> for TetherError {
    fn from(error: TransportError) -> Self {
        Self::Transport(error)
    }
}

impl From<RpcError> for TetherError {
    fn from(error: RpcError) -> Self {
        Self::Rpc(error)
    }
}
