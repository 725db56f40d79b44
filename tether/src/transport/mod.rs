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

//! Socket abstractions for tether.
//!
//! A [`Connector`] opens a [`Link`]: a message-oriented, bidirectional
//! connection split into a [`FrameReader`] and a [`FrameWriter`]. The lifecycle
//! manager is the only component that holds a link; everything else talks to
//! "whatever the current link is" through the outbound batcher.
//!
//! - [`WebSocketConnector`]: WebSocket endpoints (`ws://`, `wss://`)
//! - [`MemoryConnector`]: in-process links for tests
//!
//! # Implementing a custom connector
//!
//! ```rust
//! use tether::transport::{Connector, Link, MemoryConnector, TransportError};
//! use async_trait::async_trait;
//!
//! /// Rewrites every URL before delegating.
//! struct Rewriting<C> {
//!     inner: C,
//!     target: String,
//! }
//!
//! #[async_trait]
//! impl<C: Connector> Connector for Rewriting<C> {
//!     async fn connect(&self, _url: &str) -> Result<Link, TransportError> {
//!         self.inner.connect(&self.target).await
//!     }
//!
//!     fn name(&self) -> &str {
//!         "rewriting"
//!     }
//! }
//! ```

mod error;
mod memory;
mod traits;
mod websocket;

pub use error::TransportError;
pub use memory::{MemoryConnector, MemoryPeer, MemoryServer};
pub use traits::{Connector, FrameReader, FrameWriter, Link};
pub use websocket::{WebSocketConfig, WebSocketConnector};
