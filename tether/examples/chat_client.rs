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


//! Chat client example.
//!
//! Connects to the endpoint named by `TETHER_WS_URL` (default
//! `ws://localhost:8000/ws`), listens for pushed chat messages, fetches a page
//! of users and posts a message.
//!
//! # Running the Example
//!
//! ```bash
//! TETHER_WS_URL=ws://localhost:8000/ws RUST_LOG=tether=debug \
//!     cargo run --example chat_client
//! ```
//!
//! Set `TETHER_DISABLE_API=true` to run against the inert transport.

use serde_json::json;
use std::time::Duration;
use tether::events::{CLOSE_EVENT, OPEN_EVENT};
use tether::rpc::RequestOptions;
use tether::{TetherError, Transport, TransportConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), TetherError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = TransportConfig::from_env().with_default_timeout(Duration::from_secs(5));
    println!("=== tether chat client ===");
    println!("endpoint: {}", config.url);

    let transport = Transport::new(config);
    let _open = transport.on(OPEN_EVENT, |_| println!("* connected"));
    let _close = transport.on(CLOSE_EVENT, |_| println!("* disconnected"));
    let _messages = transport.on("chat.message", |payload| {
        println!("<- {}: {}", payload["from"], payload["text"]);
    });

    if let Err(e) = transport.connect().await {
        eprintln!("connection failed: {e}");
        eprintln!("reconnecting in the background, requests will wait for it");
    }

    let options = RequestOptions::new().retries(3);
    match transport
        .request_with("users.with_info", Some(json!({ "page": 1, "limit": 5 })), options)
        .await
    {
        Ok(users) => println!("users: {users}"),
        Err(e) if e.is_timeout() => eprintln!("server did not answer: {e}"),
        Err(e) => return Err(e.into()),
    }

    transport.send("chat.post", Some(json!({ "text": "hello from tether" })))?;
    transport.send("typing", Some(json!({ "typing": false })))?;

    tokio::time::sleep(Duration::from_secs(10)).await;

    let metrics = transport.metrics();
    println!(
        "sent {} messages in {} batches, received {} frames",
        metrics.messages_sent, metrics.batches_sent, metrics.frames_received
    );
    transport.close();
    Ok(())
}
