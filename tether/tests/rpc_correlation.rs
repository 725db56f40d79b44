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


//! Request/response correlation over an in-memory link.

mod common;

use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tether::rpc::RequestOptions;
use tether::wire::{ErrorCode, RemoteError};
use tether::{ConnectionState, RpcError, TetherError};
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn test_request_connects_on_demand_and_resolves() {
    let (transport, mut server) = common::transport(common::config());
    assert_eq!(transport.state(), ConnectionState::Idle);

    let call = tokio::spawn({
        let transport = transport.clone();
        async move {
            transport
                .request("users.with_info", Some(json!({ "page": 1, "limit": 5 })))
                .await
        }
    });

    let mut peer = server.accept().await.unwrap();
    let batch = common::next_batch(&mut peer).await;
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0]["kind"], "rpc");
    assert_eq!(batch[0]["type"], "users.with_info");
    assert_eq!(batch[0]["payload"], json!({ "page": 1, "limit": 5 }));
    assert!(batch[0]["ts"].is_u64());

    let users = json!({ "users": [{ "id": 1, "name": "ada" }], "total": 1 });
    peer.send_json(&common::rpc_result(&batch[0]["id"], users.clone()));

    assert_eq!(call.await.unwrap(), Ok(users));
    assert!(transport.is_ready());
    assert_eq!(transport.pending_requests(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_requests_complete_out_of_order() {
    let (transport, mut server) = common::transport(common::config());
    let mut peer = common::open(&transport, &mut server).await;

    let first = tokio::spawn({
        let transport = transport.clone();
        async move { transport.request("first", None).await }
    });
    let second = tokio::spawn({
        let transport = transport.clone();
        async move { transport.request("second", None).await }
    });

    let batch = common::next_batch(&mut peer).await;
    assert_eq!(batch.len(), 2);
    assert_ne!(batch[0]["id"], batch[1]["id"]);

    let id_of = |method: &str| {
        batch
            .iter()
            .find(|m| m["type"] == method)
            .map(|m| m["id"].clone())
            .unwrap()
    };
    peer.send_json(&common::rpc_result(&id_of("second"), json!(2)));
    peer.send_json(&common::rpc_result(&id_of("first"), json!(1)));

    assert_eq!(second.await.unwrap(), Ok(json!(2)));
    assert_eq!(first.await.unwrap(), Ok(json!(1)));
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_replies_are_ignored() {
    let (transport, mut server) = common::transport(common::config());
    let mut peer = common::open(&transport, &mut server).await;

    let call = tokio::spawn({
        let transport = transport.clone();
        async move { transport.request("profile.get", None).await }
    });
    let batch = common::next_batch(&mut peer).await;
    let id = batch[0]["id"].clone();

    peer.send_json(&common::rpc_result(&id, json!("first")));
    peer.send_json(&common::rpc_result(&id, json!("second")));
    peer.send_json(&common::rpc_error(&id, json!({ "message": "late" })));

    assert_eq!(call.await.unwrap(), Ok(json!("first")));
    common::quiesce().await;

    let metrics = transport.metrics();
    assert_eq!(metrics.late_replies, 2);
    assert_eq!(metrics.rpc_remote_errors, 0);
    assert!(transport.is_ready());
}

#[tokio::test(start_paused = true)]
async fn test_ack_does_not_complete_request() {
    let (transport, mut server) = common::transport(common::config());
    let mut peer = common::open(&transport, &mut server).await;

    let call = tokio::spawn({
        let transport = transport.clone();
        async move { transport.request("upload", None).await }
    });
    let batch = common::next_batch(&mut peer).await;
    let id = batch[0]["id"].clone();

    peer.send_json(&json!({ "type": "ack", "id": id }));
    common::quiesce().await;
    assert!(!call.is_finished());
    assert_eq!(transport.pending_requests(), 1);
    assert_eq!(transport.metrics().acks_received, 1);

    peer.send_json(&common::rpc_result(&id, json!({ "stored": true })));
    assert_eq!(call.await.unwrap(), Ok(json!({ "stored": true })));
}

#[tokio::test(start_paused = true)]
async fn test_remote_error_is_surfaced() {
    let (transport, mut server) = common::transport(common::config());
    let mut peer = common::open(&transport, &mut server).await;

    let call = tokio::spawn({
        let transport = transport.clone();
        async move { transport.request("users.get", Some(json!({ "id": 99 }))).await }
    });
    let batch = common::next_batch(&mut peer).await;
    peer.send_json(&common::rpc_error(
        &batch[0]["id"],
        json!({ "message": "no such user", "code": 404 }),
    ));

    let error = call.await.unwrap().unwrap_err();
    assert_eq!(
        error,
        RpcError::Remote(RemoteError {
            message: "no such user".to_string(),
            code: Some(ErrorCode::Number(404)),
            data: None,
        })
    );
    assert!(!error.is_recoverable());
    assert_eq!(transport.metrics().rpc_remote_errors, 1);

    let wrapped = TetherError::from(error);
    assert_eq!(wrapped.remote().map(|e| e.message.as_str()), Some("no such user"));
}

#[tokio::test(start_paused = true)]
async fn test_remote_error_without_descriptor() {
    let (transport, mut server) = common::transport(common::config());
    let mut peer = common::open(&transport, &mut server).await;

    let call = tokio::spawn({
        let transport = transport.clone();
        async move { transport.request("broken", None).await }
    });
    let batch = common::next_batch(&mut peer).await;
    peer.send_json(&json!({ "type": "rpc_error", "id": batch[0]["id"] }));

    let error = call.await.unwrap().unwrap_err();
    assert_eq!(error.remote().map(|e| e.message.as_str()), Some("WS error"));
}

#[tokio::test(start_paused = true)]
async fn test_remote_error_with_null_fields() {
    let (transport, mut server) = common::transport(common::config());
    let mut peer = common::open(&transport, &mut server).await;
    let options = RequestOptions::new()
        .timeout(Duration::from_millis(100))
        .retries(0);

    let null_error = tokio::spawn({
        let transport = transport.clone();
        async move { transport.request_with("m", None, options).await }
    });
    let batch = common::next_batch(&mut peer).await;
    peer.send_json(&common::rpc_error(&batch[0]["id"], json!(null)));

    let error = null_error.await.unwrap().unwrap_err();
    assert_eq!(error, RpcError::Remote(RemoteError::default()));

    let null_message = tokio::spawn({
        let transport = transport.clone();
        async move { transport.request_with("m", None, options).await }
    });
    let batch = common::next_batch(&mut peer).await;
    peer.send_json(&common::rpc_error(
        &batch[0]["id"],
        json!({ "message": null, "code": 5 }),
    ));

    let error = null_message.await.unwrap().unwrap_err();
    assert_eq!(
        error,
        RpcError::Remote(RemoteError {
            message: "WS error".to_string(),
            code: Some(ErrorCode::Number(5)),
            data: None,
        })
    );
    assert_eq!(transport.metrics().rpc_remote_errors, 2);
    assert_eq!(transport.metrics().unknown_messages, 0);
}

#[tokio::test(start_paused = true)]
async fn test_retries_follow_backoff_then_time_out() {
    let config = common::config().with_retry_backoff(Duration::from_millis(200), Duration::from_secs(8));
    let (transport, mut server) = common::transport(config);
    let mut peer = common::open(&transport, &mut server).await;

    let start = Instant::now();
    let call = tokio::spawn({
        let transport = transport.clone();
        async move {
            let options = RequestOptions::new()
                .timeout(Duration::from_millis(100))
                .retries(2);
            transport.request_with("slow", None, options).await
        }
    });

    let mut arrivals = Vec::new();
    let mut ids = Vec::new();
    for _ in 0..3 {
        let batch = common::next_batch(&mut peer).await;
        assert_eq!(batch.len(), 1);
        arrivals.push(start.elapsed());
        ids.push(batch[0]["id"].clone());
    }

    assert!(ids.iter().all(|id| *id == ids[0]), "resends reuse the id: {ids:?}");
    common::assert_close(arrivals[1] - arrivals[0], Duration::from_millis(300));
    common::assert_close(arrivals[2] - arrivals[1], Duration::from_millis(500));

    let error = call.await.unwrap().unwrap_err();
    assert!(matches!(
        error,
        RpcError::Timeout { ref method, attempts: 3, timeout } if method == "slow" && timeout == Duration::from_millis(100)
    ));
    assert!(error.is_timeout());
    assert_eq!(transport.pending_requests(), 0);

    let metrics = transport.metrics();
    assert_eq!(metrics.rpc_retries, 2);
    assert_eq!(metrics.rpc_timeouts, 1);
}

#[tokio::test(start_paused = true)]
async fn test_reply_to_resend_resolves_request() {
    let config = common::config().with_retry_backoff(Duration::from_millis(200), Duration::from_secs(8));
    let (transport, mut server) = common::transport(config);
    let mut peer = common::open(&transport, &mut server).await;

    let call = tokio::spawn({
        let transport = transport.clone();
        async move {
            let options = RequestOptions::new()
                .timeout(Duration::from_millis(100))
                .retries(1);
            transport.request_with("flaky", None, options).await
        }
    });

    let original = common::next_batch(&mut peer).await;
    let resend = common::next_batch(&mut peer).await;
    assert_eq!(original[0]["id"], resend[0]["id"]);

    peer.send_json(&common::rpc_result(&resend[0]["id"], json!("ok")));
    assert_eq!(call.await.unwrap(), Ok(json!("ok")));
    assert_eq!(transport.metrics().rpc_timeouts, 0);
}

#[tokio::test(start_paused = true)]
async fn test_late_result_after_timeout_is_dropped() {
    let (transport, mut server) = common::transport(common::config());
    let mut peer = common::open(&transport, &mut server).await;

    let call = tokio::spawn({
        let transport = transport.clone();
        async move {
            let options = RequestOptions::new()
                .timeout(Duration::from_millis(50))
                .retries(0);
            transport.request_with("slow", None, options).await
        }
    });
    let batch = common::next_batch(&mut peer).await;

    assert!(matches!(
        call.await.unwrap(),
        Err(RpcError::Timeout { attempts: 1, .. })
    ));

    peer.send_json(&common::rpc_result(&batch[0]["id"], json!("too late")));
    common::quiesce().await;
    assert_eq!(transport.metrics().late_replies, 1);
    assert_eq!(transport.pending_requests(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_typed_call() {
    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        id: u32,
        name: String,
    }

    let (transport, mut server) = common::transport(common::config());
    let mut peer = common::open(&transport, &mut server).await;

    let call = tokio::spawn({
        let transport = transport.clone();
        async move { transport.call::<_, User>("users.get", &json!({ "id": 7 })).await }
    });
    let batch = common::next_batch(&mut peer).await;
    assert_eq!(batch[0]["payload"], json!({ "id": 7 }));
    peer.send_json(&common::rpc_result(&batch[0]["id"], json!({ "id": 7, "name": "grace" })));

    assert_eq!(
        call.await.unwrap(),
        Ok(User {
            id: 7,
            name: "grace".to_string(),
        })
    );

    let mismatch = tokio::spawn({
        let transport = transport.clone();
        async move { transport.call::<(), User>("users.get", &()).await }
    });
    let batch = common::next_batch(&mut peer).await;
    assert!(batch[0].get("payload").is_none());
    peer.send_json(&common::rpc_result(&batch[0]["id"], json!("not a user")));
    assert!(matches!(mismatch.await.unwrap(), Err(RpcError::Decode(_))));
}

#[tokio::test(start_paused = true)]
async fn test_close_rejects_pending_requests() {
    let (transport, mut server) = common::transport(common::config());
    let mut peer = common::open(&transport, &mut server).await;

    let call = tokio::spawn({
        let transport = transport.clone();
        async move { transport.request("never.answered", None).await }
    });
    common::next_batch(&mut peer).await;
    assert_eq!(transport.pending_requests(), 1);

    transport.close();

    assert_eq!(call.await.unwrap(), Err(RpcError::ConnectionClosed));
    assert_eq!(transport.pending_requests(), 0);
    assert_eq!(transport.state(), ConnectionState::Closed);
    assert!(peer.recv_frame().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_close_drops_queued_requests() {
    let (transport, mut server) = common::transport(common::config());
    server.refuse_connections(true);

    let call = tokio::spawn({
        let transport = transport.clone();
        async move { transport.request("never.sent", None).await }
    });
    common::quiesce().await;
    transport.send("typing", Some(json!({ "chat": 7 }))).unwrap();
    assert_eq!(transport.queued_messages(), 2);

    transport.close();
    assert_eq!(call.await.unwrap(), Err(RpcError::ConnectionClosed));
    assert_eq!(transport.queued_messages(), 1);

    server.refuse_connections(false);
    let mut peer = common::open(&transport, &mut server).await;
    let batch = common::next_batch(&mut peer).await;
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0]["type"], "typing");
    assert_eq!(batch[0]["kind"], "event");
}
