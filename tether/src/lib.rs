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

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

//! # tether - client-side message transport
//!
//! tether multiplexes three kinds of traffic over one persistent WebSocket
//! connection:
//!
//! - **Fire-and-forget events** ([`Transport::send`])
//! - **Request/response calls** with correlation by id, per-attempt
//!   deadlines and retry with exponential backoff ([`Transport::request`])
//! - **Server-pushed events** fanned out to subscribers ([`Transport::on`])
//!
//! Outgoing messages are coalesced into batch frames, the connection
//! reconnects with exponential backoff after any loss, and an application
//! keepalive probes the server while the link is idle.
//!
//! ## Architecture
//!
//! - **[`wire`]**: message types and JSON framing
//! - **[`transport`]**: the socket seam (WebSocket, in-memory)
//! - **[`reconnection`]**: pluggable reconnection strategies
//! - **[`rpc`]**: pending-request table and retry policy
//! - **[`events`]**: listener registry
//! - **[`config`]**: every tunable, with environment loading
//! - **[`observability`]**: counters
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tether::{Transport, TransportConfig, TetherError};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), TetherError> {
//! let transport = Transport::new(TransportConfig::from_env());
//! transport.connect().await?;
//!
//! let _messages = transport.on("chat.message", |payload| println!("new message: {payload}"));
//!
//! let profile = transport
//!     .request("profile.get", Some(json!({ "user": 7 })))
//!     .await?;
//! println!("{profile}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing without a network
//!
//! ```rust
//! use tether::{Transport, TransportConfig};
//! use tether::transport::MemoryConnector;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let (connector, mut server) = MemoryConnector::pair();
//! let transport = Transport::with_connector(TransportConfig::new("memory://test"), Arc::new(connector));
//!
//! let call = tokio::spawn({
//!     let transport = transport.clone();
//!     async move { transport.request("math.double", Some(json!(21))).await }
//! });
//!
//! let mut peer = server.accept().await.unwrap();
//! let batch = peer.recv_json().await.unwrap();
//! let id = batch["messages"][0]["id"].clone();
//! peer.send_json(&json!({ "type": "rpc_result", "id": id, "result": 42 }));
//!
//! assert_eq!(call.await.unwrap().unwrap(), json!(42));
//! # }
//! ```

mod batcher;
mod client;
pub mod config;
mod dispatcher;
pub mod error;
pub mod events;
mod keepalive;
mod lifecycle;
pub mod observability;
pub mod reconnection;
pub mod rpc;
pub mod transport;
pub mod wire;

pub use client::Transport;
pub use config::{KeepaliveConfig, OverflowPolicy, TransportConfig};
pub use error::TetherError;
pub use events::{ListenerId, Subscription};
pub use lifecycle::ConnectionState;
pub use observability::{MetricsSnapshot, TransportMetrics};
pub use rpc::{RequestOptions, RpcError};
pub use transport::TransportError;
