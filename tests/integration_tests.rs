//! End-to-end integration tests — real WebSocket connections and HTTP calls
//! against a running server.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use matlist_server::SessionCoordinator;
use matlist_services::{Catalog, routes};
use matlist_transport::{EventSink, GroupRegistry, TransportConfig, TransportServer};
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::time::timeout;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

type Ws = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Start a test server on a random port. Returns the port and a handle to
/// the coordinator for store assertions.
async fn start_test_server() -> (u16, Arc<SessionCoordinator>) {
    let upload_dir = TempDir::new().unwrap();
    // Leak the TempDir so it persists for the test duration
    let upload_path = Box::leak(Box::new(upload_dir)).path().to_path_buf();

    let catalog = Arc::new(Catalog::new(&upload_path));
    catalog.init().await.unwrap();

    let groups = Arc::new(GroupRegistry::new());
    let sink: Arc<dyn EventSink> = groups.clone();
    let coordinator = Arc::new(SessionCoordinator::new(sink));

    let config = TransportConfig {
        port: 0, // OS-assigned
        hostname: "127.0.0.1".into(),
        enable_cors: false,
        max_connections: Some(16),
        verbose_logging: false,
    };

    let transport = TransportServer::start(
        config,
        coordinator.clone(),
        groups,
        routes::router(catalog),
    )
    .await
    .unwrap();
    let port = transport.port();

    // Leak the transport to keep it running for the test
    Box::leak(Box::new(transport));

    (port, coordinator)
}

/// Connect and read the connection acknowledgement.
async fn connect(port: u16) -> (Ws, Value) {
    let url = format!("ws://127.0.0.1:{port}/ws");
    let (mut ws, _) = connect_async(&url).await.expect("Failed to connect");

    let ack = recv_event(&mut ws).await;
    assert_eq!(ack["event"], "connection-ack");
    assert!(ack["data"]["connectionId"].is_string());
    (ws, ack)
}

async fn send_event(ws: &mut Ws, value: Value) {
    ws.send(Message::Text(value.to_string().into()))
        .await
        .expect("Failed to send");
}

async fn recv_event(ws: &mut Ws) -> Value {
    let msg = timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("Timeout waiting for event")
        .expect("Stream ended")
        .expect("WebSocket error");
    let text = msg.into_text().unwrap();
    serde_json::from_str(&text).unwrap()
}

/// Assert that nothing arrives on the socket for a little while.
async fn expect_silence(ws: &mut Ws) {
    let result = timeout(Duration::from_millis(300), ws.next()).await;
    assert!(result.is_err(), "expected silence, got {result:?}");
}

fn rows3() -> Value {
    json!([
        {"name": "resistor", "quantity": "100", "boxes": 0, "groups": 1, "pieces": 36, "status": "未完成"},
        {"name": "capacitor", "quantity": "64", "boxes": 0, "groups": 1, "pieces": 0, "status": "未完成"},
        {"name": "ic socket", "quantity": "1800", "boxes": 1, "groups": 1, "pieces": 8, "status": "未完成"},
    ])
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn connect_acknowledges_with_user_count() {
    let (port, coordinator) = start_test_server().await;
    let (_ws_a, ack_a) = connect(port).await;
    assert_eq!(ack_a["data"]["userCount"], 1);

    let (_ws_b, ack_b) = connect(port).await;
    assert_eq!(ack_b["data"]["userCount"], 2);
    assert_eq!(coordinator.connection_count(), 2);
}

#[tokio::test]
async fn shared_editing_end_to_end() {
    let (port, coordinator) = start_test_server().await;

    // A joins an empty document: membership only, no document-state.
    let (mut ws_a, _) = connect(port).await;
    send_event(
        &mut ws_a,
        json!({"event": "join-document", "data": {"documentId": "boxA", "displayName": "alice"}}),
    )
    .await;
    let ev = recv_event(&mut ws_a).await;
    assert_eq!(ev["event"], "membership-changed");
    assert_eq!(ev["data"]["userCount"], 1);
    assert_eq!(ev["data"]["displayNames"], json!(["alice"]));

    // A preloads three rows; wait until the server has them before B joins.
    send_event(
        &mut ws_a,
        json!({"event": "data-loaded", "data": {"documentId": "boxA", "rows": rows3()}}),
    )
    .await;
    for _ in 0..50 {
        if coordinator.document_rows("boxA").is_some_and(|rows| rows.len() == 3) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    // B joins: gets the current rows privately, then both see the membership.
    let (mut ws_b, _) = connect(port).await;
    send_event(
        &mut ws_b,
        json!({"event": "join-document", "data": {"documentId": "boxA", "displayName": "bob"}}),
    )
    .await;
    let state = recv_event(&mut ws_b).await;
    assert_eq!(state["event"], "document-state");
    assert_eq!(state["data"]["documentId"], "boxA");
    assert_eq!(state["data"]["rows"].as_array().unwrap().len(), 3);

    let ev = recv_event(&mut ws_b).await;
    assert_eq!(ev["event"], "membership-changed");
    assert_eq!(ev["data"]["userCount"], 2);
    let ev = recv_event(&mut ws_a).await;
    assert_eq!(ev["event"], "membership-changed");
    assert_eq!(ev["data"]["userCount"], 2);
    assert_eq!(ev["data"]["displayNames"], json!(["alice", "bob"]));

    // A completes the first row: B hears about it, A hears nothing back.
    send_event(
        &mut ws_a,
        json!({"event": "cell-update", "data": {
            "documentId": "boxA", "rowIndex": 0,
            "status": "completed", "displayName": "alice",
        }}),
    )
    .await;
    let ev = recv_event(&mut ws_b).await;
    assert_eq!(ev["event"], "cell-updated");
    assert_eq!(ev["data"]["rowIndex"], 0);
    assert_eq!(ev["data"]["status"], "completed");
    assert_eq!(ev["data"]["displayName"], "alice");
    expect_silence(&mut ws_a).await;

    // A leaves: B is notified, the session survives.
    ws_a.close(None).await.unwrap();
    let ev = recv_event(&mut ws_b).await;
    assert_eq!(ev["event"], "membership-changed");
    assert_eq!(ev["data"]["userCount"], 1);
    assert_eq!(ev["data"]["displayNames"], json!(["bob"]));
    assert!(coordinator.has_session("boxA"));

    // B leaves: the session is gone.
    ws_b.close(None).await.unwrap();
    for _ in 0..50 {
        if !coordinator.has_session("boxA") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(!coordinator.has_session("boxA"));
}

#[tokio::test]
async fn data_sync_resynchronizes_peers() {
    let (port, _coordinator) = start_test_server().await;

    // Join one at a time so the membership traffic is deterministic.
    let (mut ws_a, _) = connect(port).await;
    send_event(
        &mut ws_a,
        json!({"event": "join-document", "data": {"documentId": "boxB", "displayName": "ann"}}),
    )
    .await;
    let ev = recv_event(&mut ws_a).await;
    assert_eq!(ev["data"]["userCount"], 1);

    let (mut ws_b, _) = connect(port).await;
    send_event(
        &mut ws_b,
        json!({"event": "join-document", "data": {"documentId": "boxB", "displayName": "ben"}}),
    )
    .await;
    let ev = recv_event(&mut ws_b).await;
    assert_eq!(ev["data"]["userCount"], 2);
    let ev = recv_event(&mut ws_a).await;
    assert_eq!(ev["data"]["userCount"], 2);

    send_event(
        &mut ws_b,
        json!({"event": "data-sync", "data": {"documentId": "boxB", "rows": rows3()}}),
    )
    .await;

    let ev = recv_event(&mut ws_a).await;
    assert_eq!(ev["event"], "data-resynced");
    assert_eq!(ev["data"]["documentId"], "boxB");
    assert_eq!(ev["data"]["rows"].as_array().unwrap().len(), 3);
    expect_silence(&mut ws_b).await;
}

#[tokio::test]
async fn malformed_frames_are_ignored() {
    let (port, _coordinator) = start_test_server().await;
    let (mut ws, _) = connect(port).await;

    ws.send(Message::Text("not json at all".into())).await.unwrap();
    ws.send(Message::Text(json!({"event": "no-such-event", "data": {}}).to_string().into()))
        .await
        .unwrap();
    // Missing documentId: dropped in the schema layer.
    ws.send(Message::Text(
        json!({"event": "cell-update", "data": {"rowIndex": 0, "status": "x"}}).to_string().into(),
    ))
    .await
    .unwrap();

    // The connection is still healthy.
    send_event(
        &mut ws,
        json!({"event": "join-document", "data": {"documentId": "boxC", "displayName": "alice"}}),
    )
    .await;
    let ev = recv_event(&mut ws).await;
    assert_eq!(ev["event"], "membership-changed");
    assert_eq!(ev["data"]["userCount"], 1);
}

#[tokio::test]
async fn health_endpoint_reports_clients() {
    let (port, _coordinator) = start_test_server().await;
    let (_ws, _) = connect(port).await;

    let health: Value = reqwest::get(format!("http://127.0.0.1:{port}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["clients"], 1);
}

#[tokio::test]
async fn file_api_round_trip() {
    let (port, _coordinator) = start_test_server().await;
    let client = reqwest::Client::new();
    let base = format!("http://127.0.0.1:{port}/files");

    // Upload a CSV body; rows come back with computed packing.
    let uploaded: Value = client
        .post(format!("{base}/demo.csv"))
        .body("name,quantity\nresistor,100\nic socket,1800\n")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let rows = uploaded["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["groups"], 1);
    assert_eq!(rows[0]["pieces"], 36);
    assert_eq!(rows[1]["boxes"], 1);
    assert_eq!(rows[0]["status"], "未完成");

    // It shows up in the listing.
    let listing: Value = client.get(&base).send().await.unwrap().json().await.unwrap();
    let files = listing["files"].as_array().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0]["filename"], "demo.csv");

    // Open it again.
    let opened: Value = client
        .get(format!("{base}/demo.csv"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(opened["rows"].as_array().unwrap().len(), 2);

    // Save an edited snapshot; the name normalizes to .mtl.
    let saved: Value = client
        .put(format!("{base}/demo.csv"))
        .json(&rows3())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(saved["success"], true);
    assert_eq!(saved["file"]["filename"], "demo.mtl");

    // Delete the snapshot; a second delete is a 404.
    let resp = client.delete(format!("{base}/demo.mtl")).send().await.unwrap();
    assert!(resp.status().is_success());
    let resp = client.delete(format!("{base}/demo.mtl")).send().await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);

    // Unsupported extensions are rejected outright.
    let resp = client.get(format!("{base}/notes.txt")).send().await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
}
