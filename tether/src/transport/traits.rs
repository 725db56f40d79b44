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

use crate::transport::TransportError;
use async_trait::async_trait;

/// Opens message-oriented bidirectional links.
///
/// A connector is the only component that knows how a socket is created. The
/// lifecycle manager calls [`connect`](Connector::connect) once per connection
/// attempt and owns the returned [`Link`] until it closes.
///
/// # Implementations
///
/// - [`WebSocketConnector`](crate::transport::WebSocketConnector): `ws://` and
///   `wss://` endpoints via tokio-tungstenite
/// - [`MemoryConnector`](crate::transport::MemoryConnector): in-process links
///   for testing
///
/// # Examples
///
/// ```rust
/// use tether::transport::{Connector, FrameReader, FrameWriter, Link, TransportError};
/// use async_trait::async_trait;
///
/// struct Refusing;
///
/// #[async_trait]
/// impl Connector for Refusing {
///     async fn connect(&self, url: &str) -> Result<Link, TransportError> {
///         Err(TransportError::connection_failed(url, "refused"))
///     }
///
///     fn name(&self) -> &str {
///         "refusing"
///     }
/// }
/// ```
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Establishes a new link to `url`.
    ///
    /// Resolves once the opening handshake has completed.
    async fn connect(&self, url: &str) -> Result<Link, TransportError>;

    /// Human-readable name used in logs.
    fn name(&self) -> &str;
}

/// Read half of a link, yielding one text frame at a time.
#[async_trait]
pub trait FrameReader: Send + 'static {
    /// Waits for the next frame.
    ///
    /// Returns `None` once the peer has closed the link.
    async fn next_frame(&mut self) -> Option<Result<String, TransportError>>;
}

/// Write half of a link.
#[async_trait]
pub trait FrameWriter: Send + 'static {
    /// Writes one text frame.
    async fn send_frame(&mut self, frame: String) -> Result<(), TransportError>;

    /// Starts the closing handshake and releases the socket.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// An open link split into its read and write halves.
pub struct Link {
    /// Incoming frames
    pub reader: Box<dyn FrameReader>,
    /// Outgoing frames
    pub writer: Box<dyn FrameWriter>,
}

impl Link {
    /// Creates a link from its two halves.
    pub fn new(reader: impl FrameReader, writer: impl FrameWriter) -> Self {
        Self {
            reader: Box::new(reader),
            writer: Box::new(writer),
        }
    }
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link").finish_non_exhaustive()
    }
}
