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


//! Connection loss, reconnection and keepalive.

mod common;

use serde_json::json;
use std::time::Duration;
use std::sync::Arc;
use tether::reconnection::{ExponentialBackoff, NoReconnect, ReconnectionStats};
use tether::rpc::RequestOptions;
use tether::{ConnectionState, KeepaliveConfig, RpcError, TransportError};
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn test_reconnect_delays_grow_and_cap() {
    let (transport, mut server) = common::transport(common::config());
    let mut peer = common::open(&transport, &mut server).await;

    server.refuse_connections(true);
    let lost_at = Instant::now();
    peer.disconnect();
    tokio::time::sleep(Duration::from_secs(130)).await;

    let attempts = server.attempt_times();
    assert_eq!(attempts.len(), 9, "{attempts:?}");
    let mut previous = lost_at;
    for (at, secs) in attempts[1..].iter().zip([1, 2, 4, 8, 16, 30, 30, 30]) {
        common::assert_close(*at - previous, Duration::from_secs(secs));
        previous = *at;
    }

    assert_eq!(transport.state(), ConnectionState::Closed);
    let metrics = transport.metrics();
    assert_eq!(metrics.connections_opened, 1);
    assert_eq!(metrics.connections_closed, 1);
    assert_eq!(metrics.connection_errors, 8);
    assert_eq!(metrics.reconnect_attempts, 8);
}

#[tokio::test(start_paused = true)]
async fn test_successful_open_resets_backoff() {
    let (transport, mut server) = common::transport(common::config());
    let mut peer = common::open(&transport, &mut server).await;

    server.refuse_connections(true);
    peer.disconnect();
    // Fails after 1s and 2s; the third attempt is due 4s later.
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(server.connect_attempts(), 3);

    server.refuse_connections(false);
    let mut peer = server.accept().await.unwrap();
    assert!(transport.is_ready());

    let lost_at = Instant::now();
    peer.disconnect();
    let _peer = server.accept().await.unwrap();
    common::assert_close(lost_at.elapsed(), Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_request_survives_link_loss() {
    let config = common::config()
        .with_reconnect_backoff(Duration::from_millis(500), Duration::from_secs(30))
        .with_retry_backoff(Duration::from_millis(200), Duration::from_secs(8));
    let (transport, mut server) = common::transport(config);
    let mut first = common::open(&transport, &mut server).await;

    let call = tokio::spawn({
        let transport = transport.clone();
        async move {
            let options = RequestOptions::new()
                .timeout(Duration::from_secs(1))
                .retries(2);
            transport
                .request_with("users.with_info", Some(json!({ "page": 1 })), options)
                .await
        }
    });

    let original = common::next_batch(&mut first).await;
    first.disconnect();

    let mut second = server.accept().await.unwrap();
    let resend = common::next_batch(&mut second).await;
    assert_eq!(resend[0]["id"], original[0]["id"]);
    assert_eq!(resend[0]["payload"], json!({ "page": 1 }));

    second.send_json(&common::rpc_result(&resend[0]["id"], json!({ "users": [] })));
    assert_eq!(call.await.unwrap(), Ok(json!({ "users": [] })));
    assert_eq!(transport.metrics().rpc_retries, 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_connect_reports_error_and_retries() {
    let (transport, mut server) = common::transport(common::config());
    server.refuse_connections(true);

    let error = transport.connect().await.unwrap_err();
    assert!(matches!(error, TransportError::ConnectionFailed { .. }));
    assert!(error.is_recoverable());
    assert_eq!(transport.state(), ConnectionState::Closed);

    server.refuse_connections(false);
    let start = Instant::now();
    let _peer = server.accept().await.unwrap();
    common::assert_close(start.elapsed(), Duration::from_secs(1));
    assert!(transport.is_ready());
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_connects_share_one_attempt() {
    let (transport, mut server) = common::transport(common::config());

    let (a, b) = tokio::join!(transport.connect(), transport.connect());
    assert!(a.is_ok() && b.is_ok());
    assert!(transport.connect().await.is_ok());

    assert_eq!(server.connect_attempts(), 1);
    assert!(server.accept().await.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_close_cancels_scheduled_reconnect() {
    let (transport, mut server) = common::transport(common::config());
    let mut peer = common::open(&transport, &mut server).await;

    peer.disconnect();
    common::quiesce().await;
    assert_eq!(transport.state(), ConnectionState::Closed);

    transport.close();
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(server.connect_attempts(), 1);
    assert_eq!(transport.state(), ConnectionState::Closed);

    // Still usable afterwards.
    let _peer = common::open(&transport, &mut server).await;
    assert!(transport.is_ready());
}

#[tokio::test(start_paused = true)]
async fn test_disabling_auto_reconnect_cancels_timer() {
    let (transport, mut server) = common::transport(common::config());
    let mut peer = common::open(&transport, &mut server).await;

    peer.disconnect();
    common::quiesce().await;
    transport.set_auto_reconnect(false);

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(server.connect_attempts(), 1);

    transport.set_auto_reconnect(true);
    let _peer = common::open(&transport, &mut server).await;
    assert_eq!(server.connect_attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_reenabling_auto_reconnect_resets_backoff() {
    let strategy = Arc::new(ExponentialBackoff::default());
    let config = common::config().with_reconnection_strategy(strategy.clone());
    let (transport, mut server) = common::transport(config);
    let mut peer = common::open(&transport, &mut server).await;

    // Two failed reconnects push the backoff to its third step.
    server.refuse_connections(true);
    peer.disconnect();
    tokio::time::sleep(Duration::from_millis(3_500)).await;
    assert_eq!(server.connect_attempts(), 3);
    assert_eq!(strategy.stats().consecutive_closes, 3);

    transport.set_auto_reconnect(false);
    transport.set_auto_reconnect(true);
    assert_eq!(strategy.stats(), ReconnectionStats::default());

    // The next failure waits the first delay again instead of 8 s.
    transport.send("typing", None).unwrap();
    common::quiesce().await;
    assert_eq!(server.connect_attempts(), 4);
    assert_eq!(strategy.stats().closes, 1);

    tokio::time::sleep(Duration::from_secs(2)).await;
    let times = server.attempt_times();
    assert_eq!(times.len(), 5);
    common::assert_close(times[4] - times[3], Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_no_reconnect_strategy_stays_closed() {
    let strategy = Arc::new(NoReconnect::new());
    let config = common::config().with_reconnection_strategy(strategy.clone());
    let (transport, mut server) = common::transport(config);
    let mut peer = common::open(&transport, &mut server).await;

    peer.disconnect();
    tokio::time::sleep(Duration::from_secs(120)).await;

    assert_eq!(server.connect_attempts(), 1);
    assert_eq!(transport.state(), ConnectionState::Closed);
    assert_eq!(strategy.stats().closes, 1);
}

#[tokio::test(start_paused = true)]
async fn test_attempt_limit_stops_reconnecting() {
    let strategy = ExponentialBackoff::builder()
        .initial_delay(Duration::from_millis(100))
        .max_delay(Duration::from_secs(1))
        .max_attempts(Some(3))
        .build();
    let config = common::config().with_reconnection_strategy(Arc::new(strategy));
    let (transport, mut server) = common::transport(config);
    let mut peer = common::open(&transport, &mut server).await;

    server.refuse_connections(true);
    peer.disconnect();
    tokio::time::sleep(Duration::from_secs(60)).await;

    // The initial open plus three refused reconnects.
    assert_eq!(server.connect_attempts(), 4);
    assert_eq!(transport.metrics().reconnect_attempts, 3);
}

#[tokio::test(start_paused = true)]
async fn test_keepalive_probes_while_open() {
    let (transport, mut server) = common::transport(common::config());
    let mut peer = common::open(&transport, &mut server).await;
    let start = Instant::now();

    let probe = common::next_batch(&mut peer).await;
    common::assert_close(start.elapsed(), Duration::from_millis(60_025));
    assert_eq!(probe.len(), 1);
    assert_eq!(probe[0]["kind"], "event");
    assert_eq!(probe[0]["type"], "ping");
    assert!(probe[0]["payload"]["ts"].is_u64());

    let probe = common::next_batch(&mut peer).await;
    common::assert_close(start.elapsed(), Duration::from_millis(120_025));
    assert_eq!(probe[0]["type"], "ping");
    assert!(transport.is_ready());
}

#[tokio::test(start_paused = true)]
async fn test_keepalive_can_be_disabled() {
    let keepalive = KeepaliveConfig {
        enabled: false,
        ..KeepaliveConfig::default()
    };
    let (transport, mut server) = common::transport(common::config().with_keepalive(keepalive));
    let mut peer = common::open(&transport, &mut server).await;

    tokio::time::sleep(Duration::from_secs(300)).await;
    assert!(peer.try_recv_frame().is_none());
    assert!(transport.is_ready());
}

#[tokio::test(start_paused = true)]
async fn test_invalid_keepalive_never_opens_a_link() {
    let keepalive = KeepaliveConfig {
        interval: Duration::ZERO,
        ..KeepaliveConfig::default()
    };
    let (transport, server) = common::transport(common::config().with_keepalive(keepalive));

    assert!(matches!(
        transport.connect().await,
        Err(TransportError::InvalidConfiguration { .. })
    ));
    assert!(matches!(
        transport.send("typing", None),
        Err(RpcError::InvalidConfiguration { .. })
    ));
    assert!(matches!(
        transport.request("users.list", None).await,
        Err(RpcError::InvalidConfiguration { .. })
    ));

    common::quiesce().await;
    assert_eq!(server.connect_attempts(), 0);
    assert_eq!(transport.state(), ConnectionState::Idle);
    assert_eq!(transport.queued_messages(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_server_probe_is_answered() {
    let (transport, mut server) = common::transport(common::config());
    let mut peer = common::open(&transport, &mut server).await;

    peer.send_json(&common::event("ping", json!({ "ts": 1 })));
    let reply = common::next_batch(&mut peer).await;
    assert_eq!(reply.len(), 1);
    assert_eq!(reply[0]["type"], "pong");
    assert!(reply[0]["payload"]["ts"].is_u64());
}

#[tokio::test(start_paused = true)]
async fn test_dropping_last_handle_closes_link() {
    let (transport, mut server) = common::transport(common::config());
    let mut peer = common::open(&transport, &mut server).await;

    let clone = transport.clone();
    drop(transport);
    common::quiesce().await;
    assert!(clone.is_ready());

    drop(clone);
    assert!(peer.recv_frame().await.is_none());
}
