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

//! WebSocket connector.
//!
//! Opens `ws://` and `wss://` links with tokio-tungstenite. Every frame of the
//! tether protocol is a JSON document carried in a text message; binary
//! messages are decoded as UTF-8 so that servers which send JSON as binary
//! still work.
//!
//! Credentials ride on the opening handshake (cookies, headers); this module
//! neither adds nor inspects them.
//!
//! # Examples
//!
//! ```rust,no_run
//! use tether::transport::{Connector, WebSocketConfig, WebSocketConnector};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let connector = WebSocketConnector::new(WebSocketConfig::default());
//! let link = connector.connect("ws://localhost:8000/ws").await?;
//! # Ok(())
//! # }
//! ```

use crate::transport::{Connector, FrameReader, FrameWriter, Link, TransportError};
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig as ProtocolConfig;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async_with_config};
use tracing::{debug, trace};

type Stream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Size limits for WebSocket links.
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// Maximum size of a single WebSocket frame (default: 16 MB)
    pub max_frame_size: usize,

    /// Maximum size of a complete message (default: 64 MB)
    pub max_message_size: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            max_frame_size: 16 * 1024 * 1024,
            max_message_size: 64 * 1024 * 1024,
        }
    }
}

impl WebSocketConfig {
    fn protocol_config(&self) -> ProtocolConfig {
        let mut config = ProtocolConfig::default();
        config.max_frame_size = Some(self.max_frame_size);
        config.max_message_size = Some(self.max_message_size);
        config
    }
}

/// Connector for WebSocket endpoints.
#[derive(Debug, Clone, Default)]
pub struct WebSocketConnector {
    config: WebSocketConfig,
}

impl WebSocketConnector {
    /// Creates a connector with the given limits.
    pub fn new(config: WebSocketConfig) -> Self {
        Self { config }
    }

    /// Returns the configured limits.
    pub fn config(&self) -> &WebSocketConfig {
        &self.config
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, url: &str) -> Result<Link, TransportError> {
        let (stream, response) =
            connect_async_with_config(url, Some(self.config.protocol_config()), false)
                .await
                .map_err(|e| match TransportError::from(e) {
                    TransportError::WebSocket(inner) => {
                        TransportError::connection_failed(url, inner.to_string())
                    }
                    other => other,
                })?;

        debug!(url, status = %response.status(), "WebSocket handshake complete");

        let (sink, stream) = stream.split();
        Ok(Link::new(WebSocketReader { stream }, WebSocketWriter { sink }))
    }

    fn name(&self) -> &str {
        "websocket"
    }
}

struct WebSocketReader {
    stream: SplitStream<Stream>,
}

#[async_trait]
impl FrameReader for WebSocketReader {
    async fn next_frame(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Binary(data)) => {
                    return Some(Ok(String::from_utf8_lossy(&data).into_owned()));
                }
                // Protocol pings are answered by tungstenite itself.
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => continue,
                Ok(Message::Close(frame)) => {
                    trace!(?frame, "Peer sent close frame");
                    return None;
                }
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}

struct WebSocketWriter {
    sink: SplitSink<Stream, Message>,
}

#[async_trait]
impl FrameWriter for WebSocketWriter {
    async fn send_frame(&mut self, frame: String) -> Result<(), TransportError> {
        self.sink.send(Message::Text(frame)).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.sink.close().await?;
        Ok(())
    }
}
