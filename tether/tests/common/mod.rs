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


//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tether::transport::{MemoryConnector, MemoryPeer, MemoryServer};
use tether::{Transport, TransportConfig};

pub fn config() -> TransportConfig {
    TransportConfig::new("memory://test")
}

pub fn transport(config: TransportConfig) -> (Transport, MemoryServer) {
    let (connector, server) = MemoryConnector::pair();
    (Transport::with_connector(config, Arc::new(connector)), server)
}

/// Connects and returns the server side of the new link.
pub async fn open(transport: &Transport, server: &mut MemoryServer) -> MemoryPeer {
    transport.connect().await.expect("connect");
    server.accept().await.expect("server is alive")
}

/// Waits for the next batch frame and returns its messages.
pub async fn next_batch(peer: &mut MemoryPeer) -> Vec<Value> {
    let frame = peer.recv_json().await.expect("link is open");
    assert_eq!(frame["type"], "batch", "unexpected frame {frame}");
    frame["messages"]
        .as_array()
        .cloned()
        .expect("batch carries a messages array")
}

/// Lets every runnable task finish without firing any pending timer.
pub async fn quiesce() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

pub fn rpc_result(id: &Value, result: Value) -> Value {
    json!({ "type": "rpc_result", "id": id, "result": result })
}

pub fn rpc_error(id: &Value, error: Value) -> Value {
    json!({ "type": "rpc_error", "id": id, "error": error })
}

pub fn event(name: &str, payload: Value) -> Value {
    json!({ "type": "event", "event": name, "payload": payload })
}

/// Asserts `actual` is within a few milliseconds of `expected`.
pub fn assert_close(actual: Duration, expected: Duration) {
    let slack = Duration::from_millis(5);
    assert!(
        actual + slack >= expected && actual <= expected + slack,
        "expected ~{expected:?}, got {actual:?}"
    );
}
