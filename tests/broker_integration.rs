//! End-to-end tests against a real `Broker` serving a loopback `TcpListener`,
//! driven by real `TcpStream` clients speaking the newline-delimited JSON
//! protocol (§8's scenario list).

use lora_medium_broker::{Broker, BrokerConfig};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

/// Start a broker seeded for determinism, bound to an ephemeral loopback
/// port, and return a connector for it.
async fn start_broker(seed: u64) -> std::net::SocketAddr {
    let config = BrokerConfig {
        listen: "127.0.0.1:0".to_string(),
        seed: Some(seed),
    };
    let broker = Arc::new(Broker::new(&config));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = broker.serve(listener).await;
    });
    addr
}

async fn connect(addr: std::net::SocketAddr) -> (tokio::net::tcp::OwnedWriteHalf, BufReader<tokio::net::tcp::OwnedReadHalf>) {
    let stream = TcpStream::connect(addr).await.unwrap();
    let (r, w) = stream.into_split();
    (w, BufReader::new(r))
}

async fn send(w: &mut tokio::net::tcp::OwnedWriteHalf, value: &Value) {
    let mut line = serde_json::to_string(value).unwrap();
    line.push('\n');
    w.write_all(line.as_bytes()).await.unwrap();
}

async fn register(w: &mut tokio::net::tcp::OwnedWriteHalf, node_id: u64, x: f64, y: f64) {
    send(w, &json!({"type": "register", "node_id": node_id, "location": [x, y]})).await;
}

async fn recv_rx(r: &mut BufReader<tokio::net::tcp::OwnedReadHalf>) -> Option<Value> {
    let mut line = String::new();
    let fut = r.read_line(&mut line);
    match tokio::time::timeout(Duration::from_secs(2), fut).await {
        Ok(Ok(0)) => None,
        Ok(Ok(_)) => Some(serde_json::from_str(&line).unwrap()),
        Ok(Err(_)) | Err(_) => None,
    }
}

#[tokio::test]
async fn co_located_nodes_deliver_with_strong_rssi() {
    let addr = start_broker(1).await;
    let (mut w1, _r1) = connect(addr).await;
    let (mut w2, mut r2) = connect(addr).await;

    register(&mut w1, 1, 0.0, 0.0).await;
    register(&mut w2, 2, 0.0, 0.0).await;

    send(&mut w1, &json!({"type": "tx", "from": 1, "data": "hello", "meta": {"destination": 2}})).await;

    let rx = recv_rx(&mut r2).await.expect("expected delivery");
    assert_eq!(rx["type"], "rx");
    assert_eq!(rx["data"], "hello");
    assert!(rx["rssi"].as_f64().unwrap() > -40.0);
    assert_eq!(rx["meta"]["from"], 1);
}

#[tokio::test]
async fn far_beyond_sf7_range_is_dropped() {
    let addr = start_broker(2).await;
    let (mut w1, _r1) = connect(addr).await;
    let (mut w2, mut r2) = connect(addr).await;

    register(&mut w1, 1, 0.0, 0.0).await;
    register(&mut w2, 2, 50.0, 0.0).await;

    send(&mut w1, &json!({"type": "tx", "from": 1, "data": "far", "meta": {"destination": 2, "sf": 7}})).await;

    assert!(recv_rx(&mut r2).await.is_none(), "frame beyond SF7 range should not arrive");
}

#[tokio::test]
async fn broadcast_reaches_all_peers_but_not_sender() {
    let addr = start_broker(3).await;
    let (mut w1, mut r1) = connect(addr).await;
    let (mut w2, mut r2) = connect(addr).await;
    let (mut w3, mut r3) = connect(addr).await;

    register(&mut w1, 1, 0.0, 0.0).await;
    register(&mut w2, 2, 0.1, 0.0).await;
    register(&mut w3, 3, 0.0, 0.1).await;

    send(&mut w1, &json!({"type": "tx", "from": 1, "data": "all", "meta": {"broadcast": true}})).await;

    let got2 = recv_rx(&mut r2).await;
    let got3 = recv_rx(&mut r3).await;
    assert!(got2.is_some(), "peer 2 should receive broadcast");
    assert!(got3.is_some(), "peer 3 should receive broadcast");

    // The sender itself should never receive its own broadcast.
    let mut probe = String::new();
    let sender_got_own = tokio::time::timeout(Duration::from_millis(300), r1.read_line(&mut probe)).await;
    assert!(sender_got_own.is_err(), "sender must not receive its own broadcast");
}

#[tokio::test]
async fn broadcast_delivers_independent_outcomes_per_receiver() {
    let addr = start_broker(6).await;
    let (mut w1, _r1) = connect(addr).await;
    let (mut near, mut r_near) = connect(addr).await;
    let (mut far, mut r_far) = connect(addr).await;

    register(&mut w1, 1, 0.0, 0.0).await;
    register(&mut near, 2, 0.1, 0.0).await;
    register(&mut far, 3, 3.0, 0.0).await;

    send(&mut w1, &json!({"type": "tx", "from": 1, "data": "broadcast", "meta": {"broadcast": true}})).await;

    let at_near = recv_rx(&mut r_near).await.expect("near peer should receive broadcast");
    let at_far = recv_rx(&mut r_far).await.expect("far peer should receive broadcast");

    let rssi_near = at_near["rssi"].as_f64().unwrap();
    let rssi_far = at_far["rssi"].as_f64().unwrap();
    assert!(rssi_near > rssi_far, "closer peer should see stronger rssi: near={rssi_near} far={rssi_far}");
}

#[tokio::test]
async fn reregister_updates_location_without_duplicate_delivery() {
    let addr = start_broker(5).await;
    let (mut w1, _r1) = connect(addr).await;
    let (mut w2a, mut r2a) = connect(addr).await;

    register(&mut w1, 1, 0.0, 0.0).await;
    register(&mut w2a, 2, 0.0, 0.0).await;

    // A second connection re-registers the same node id; the first
    // connection's registry entry should be replaced, not duplicated.
    let (mut w2b, mut r2b) = connect(addr).await;
    register(&mut w2b, 2, 1.0, 1.0).await;

    send(&mut w1, &json!({"type": "tx", "from": 1, "data": "after-reregister", "meta": {"destination": 2}})).await;

    let got_old = recv_rx(&mut r2a).await;
    let got_new = recv_rx(&mut r2b).await;
    assert!(got_old.is_none(), "stale connection must not receive further deliveries");
    assert!(got_new.is_some(), "current connection for node 2 should receive the frame");
}
