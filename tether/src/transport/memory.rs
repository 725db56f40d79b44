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

//! In-memory connector implementation.
//!
//! The memory connector hands each connection attempt to a [`MemoryServer`]
//! living in the same process. It is meant for:
//!
//! - Unit and integration testing without a network
//! - Simulating refused connections and dropped links
//! - Scripting server replies (results, errors, pushed events)
//!
//! # Examples
//!
//! ```rust
//! use tether::transport::{Connector, MemoryConnector};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (connector, mut server) = MemoryConnector::pair();
//!
//! let link = connector.connect("memory://test").await?;
//! let mut peer = server.accept().await.expect("server is alive");
//! peer.send_json(&serde_json::json!({ "type": "event", "event": "hello" }));
//! # Ok(())
//! # }
//! ```

use crate::transport::{Connector, FrameReader, FrameWriter, Link, TransportError};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tokio::time::Instant;

#[derive(Debug, Default)]
struct ServerControl {
    refusing: AtomicBool,
    attempts: Mutex<Vec<Instant>>,
}

/// Connector whose links terminate at a [`MemoryServer`].
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    accept_tx: mpsc::UnboundedSender<MemoryPeer>,
    control: Arc<ServerControl>,
}

impl MemoryConnector {
    /// Creates a connector together with the server that accepts its links.
    pub fn pair() -> (Self, MemoryServer) {
        let (accept_tx, accept_rx) = mpsc::unbounded_channel();
        let control = Arc::new(ServerControl::default());
        (
            Self {
                accept_tx,
                control: Arc::clone(&control),
            },
            MemoryServer { accept_rx, control },
        )
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, url: &str) -> Result<Link, TransportError> {
        self.control.attempts.lock().push(Instant::now());

        if self.control.refusing.load(Ordering::Acquire) {
            return Err(TransportError::connection_failed(url, "connection refused"));
        }

        let (to_server, from_client) = mpsc::unbounded_channel();
        let (to_client, from_server) = mpsc::unbounded_channel();

        let peer = MemoryPeer {
            from_client,
            to_client: Some(to_client),
        };
        self.accept_tx
            .send(peer)
            .map_err(|_| TransportError::connection_failed(url, "memory server is gone"))?;

        Ok(Link::new(
            MemoryReader { rx: from_server },
            MemoryWriter {
                tx: Some(to_server),
            },
        ))
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Server side of a [`MemoryConnector`].
#[derive(Debug)]
pub struct MemoryServer {
    accept_rx: mpsc::UnboundedReceiver<MemoryPeer>,
    control: Arc<ServerControl>,
}

impl MemoryServer {
    /// Waits for the next accepted link.
    ///
    /// Returns `None` once every connector clone has been dropped.
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.accept_rx.recv().await
    }

    /// Makes subsequent connection attempts fail (or succeed again).
    pub fn refuse_connections(&self, refuse: bool) {
        self.control.refusing.store(refuse, Ordering::Release);
    }

    /// Number of connection attempts seen so far, refused ones included.
    pub fn connect_attempts(&self) -> usize {
        self.control.attempts.lock().len()
    }

    /// Instants at which each connection attempt was made.
    pub fn attempt_times(&self) -> Vec<Instant> {
        self.control.attempts.lock().clone()
    }
}

/// The server's view of one accepted link.
#[derive(Debug)]
pub struct MemoryPeer {
    from_client: mpsc::UnboundedReceiver<String>,
    to_client: Option<mpsc::UnboundedSender<String>>,
}

impl MemoryPeer {
    /// Waits for the next frame written by the client.
    ///
    /// Returns `None` once the client has closed its side.
    pub async fn recv_frame(&mut self) -> Option<String> {
        self.from_client.recv().await
    }

    /// Waits for the next frame and parses it as JSON.
    ///
    /// Frames that are not valid JSON are returned as a JSON string.
    pub async fn recv_json(&mut self) -> Option<Value> {
        let frame = self.recv_frame().await?;
        Some(serde_json::from_str(&frame).unwrap_or(Value::String(frame)))
    }

    /// Returns a frame the client has already written, without waiting.
    pub fn try_recv_frame(&mut self) -> Option<String> {
        self.from_client.try_recv().ok()
    }

    /// Pushes a raw frame to the client. Returns `false` if the link is gone.
    pub fn send_frame(&self, frame: impl Into<String>) -> bool {
        self.to_client
            .as_ref()
            .is_some_and(|tx| tx.send(frame.into()).is_ok())
    }

    /// Pushes a JSON frame to the client. Returns `false` if the link is gone.
    pub fn send_json(&self, value: &Value) -> bool {
        self.send_frame(value.to_string())
    }

    /// Drops the server side of the link; the client observes a close.
    pub fn disconnect(&mut self) {
        self.to_client = None;
        self.from_client.close();
    }
}

struct MemoryReader {
    rx: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
impl FrameReader for MemoryReader {
    async fn next_frame(&mut self) -> Option<Result<String, TransportError>> {
        self.rx.recv().await.map(Ok)
    }
}

struct MemoryWriter {
    tx: Option<mpsc::UnboundedSender<String>>,
}

#[async_trait]
impl FrameWriter for MemoryWriter {
    async fn send_frame(&mut self, frame: String) -> Result<(), TransportError> {
        let tx = self.tx.as_ref().ok_or(TransportError::Closed)?;
        tx.send(frame)
            .map_err(|_| TransportError::connection_lost("memory peer dropped"))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.tx = None;
        Ok(())
    }
}
