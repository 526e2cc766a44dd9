use super::*;
use crate::routes;
use crate::state::test_helpers;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::{Duration, timeout};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type WsClient = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

async fn start_server() -> (std::net::SocketAddr, AppState) {
    let dir = tempfile::tempdir().expect("tempdir");
    let state = test_helpers::test_app_state(&dir);
    let app = routes::app(state.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("test server failed");
    });
    (addr, state)
}

async fn connect(addr: std::net::SocketAddr, id: &str) -> WsClient {
    let (ws, _) = connect_async(format!("ws://{addr}/ws?id={id}"))
        .await
        .expect("websocket connect failed");
    ws
}

/// Receive the next data frame as JSON, skipping ping/pong traffic.
async fn recv_json(ws: &mut WsClient) -> Value {
    loop {
        let msg = timeout(Duration::from_secs(1), ws.next())
            .await
            .expect("receive timed out")
            .expect("connection ended unexpectedly")
            .expect("transport error");
        match msg {
            WsMessage::Text(text) => return serde_json::from_str(text.as_str()).expect("frame is not json"),
            WsMessage::Ping(_) | WsMessage::Pong(_) => {}
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

async fn send_text(ws: &mut WsClient, text: &str) {
    ws.send(WsMessage::text(text)).await.expect("send failed");
}

fn join_frame(id: &str) -> Value {
    json!({"id": id, "message": {"type": "join", "payload": null}})
}

fn leave_frame(id: &str) -> Value {
    json!({"id": id, "message": {"type": "leave", "payload": null}})
}

#[tokio::test]
async fn chat_is_fanned_out_to_peers_and_echoed_to_sender() {
    let (addr, _state) = start_server().await;

    let mut a = connect(addr, "a").await;
    assert_eq!(recv_json(&mut a).await, join_frame("a"));

    let mut b = connect(addr, "b").await;
    assert_eq!(recv_json(&mut a).await, join_frame("b"));
    assert_eq!(recv_json(&mut b).await, join_frame("b"));

    send_text(&mut a, r#"{"type":"chat","payload":"hi"}"#).await;

    let expected = json!({"id": "a", "message": {"type": "chat", "payload": "hi"}});
    assert_eq!(recv_json(&mut b).await, expected);
    assert_eq!(recv_json(&mut a).await, expected);
}

#[tokio::test]
async fn missing_identity_is_closed_without_registration() {
    let (addr, state) = start_server().await;

    let (mut ws, _) = connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("websocket connect failed");

    let msg = timeout(Duration::from_secs(1), ws.next())
        .await
        .expect("close timed out")
        .expect("connection ended unexpectedly")
        .expect("transport error");
    assert!(matches!(msg, WsMessage::Close(_)), "expected close frame, got {msg:?}");
    assert_eq!(state.hub.client_count().await, 0);
}

#[tokio::test]
async fn empty_identity_is_closed_without_registration() {
    let (addr, state) = start_server().await;

    let mut ws = connect(addr, "").await;
    let msg = timeout(Duration::from_secs(1), ws.next())
        .await
        .expect("close timed out")
        .expect("connection ended unexpectedly")
        .expect("transport error");
    assert!(matches!(msg, WsMessage::Close(_)), "expected close frame, got {msg:?}");
    assert_eq!(state.hub.client_count().await, 0);
}

#[tokio::test]
async fn disconnect_broadcasts_leave_to_remaining_clients_exactly_once() {
    let (addr, state) = start_server().await;

    let mut a = connect(addr, "a").await;
    assert_eq!(recv_json(&mut a).await, join_frame("a"));

    let mut b = connect(addr, "b").await;
    assert_eq!(recv_json(&mut a).await, join_frame("b"));
    assert_eq!(recv_json(&mut b).await, join_frame("b"));

    b.close(None).await.expect("close failed");

    assert_eq!(recv_json(&mut a).await, leave_frame("b"));
    assert_eq!(state.hub.client_count().await, 1);
    assert!(
        timeout(Duration::from_millis(100), a.next()).await.is_err(),
        "expected no second leave"
    );
}

#[tokio::test]
async fn malformed_frame_is_dropped_and_reading_continues() {
    let (addr, state) = start_server().await;

    let mut a = connect(addr, "a").await;
    assert_eq!(recv_json(&mut a).await, join_frame("a"));

    let mut b = connect(addr, "b").await;
    assert_eq!(recv_json(&mut a).await, join_frame("b"));
    assert_eq!(recv_json(&mut b).await, join_frame("b"));

    send_text(&mut a, "this is not json").await;
    send_text(&mut a, r#"{"type":"chat","payload":"still here"}"#).await;

    assert_eq!(
        recv_json(&mut b).await,
        json!({"id": "a", "message": {"type": "chat", "payload": "still here"}})
    );
    assert_eq!(state.hub.client_count().await, 2);
}

#[tokio::test]
async fn oversized_frame_terminates_the_offending_client() {
    let (addr, _state) = start_server().await;

    let mut a = connect(addr, "a").await;
    assert_eq!(recv_json(&mut a).await, join_frame("a"));

    let mut b = connect(addr, "b").await;
    assert_eq!(recv_json(&mut a).await, join_frame("b"));
    assert_eq!(recv_json(&mut b).await, join_frame("b"));

    let oversized = format!(r#"{{"type":"chat","payload":"{}"}}"#, "x".repeat(1024));
    send_text(&mut a, &oversized).await;

    // The frame exceeds the 512-byte inbound cap: a is dropped, b survives.
    assert_eq!(recv_json(&mut b).await, leave_frame("a"));
}

#[tokio::test]
async fn plain_get_on_ws_endpoint_requires_upgrade() {
    let (addr, _state) = start_server().await;

    let resp = reqwest::get(format!("http://{addr}/ws")).await.expect("request failed");
    assert_eq!(resp.status(), reqwest::StatusCode::UPGRADE_REQUIRED);
}

#[tokio::test]
async fn root_and_health_endpoints_respond() {
    let (addr, _state) = start_server().await;

    let resp = reqwest::get(format!("http://{addr}/")).await.expect("request failed");
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    assert_eq!(resp.text().await.expect("body"), "Hello, World!");

    let resp = reqwest::get(format!("http://{addr}/healthz")).await.expect("request failed");
    assert_eq!(resp.status(), reqwest::StatusCode::OK);

    let resp = reqwest::get(format!("http://{addr}/spotify/playback")).await.expect("request failed");
    assert_eq!(resp.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);
}
