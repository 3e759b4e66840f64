//! WebSocket session tests over a real socket.

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use parlor::chat::HubHandle;
use parlor::{Config, WebServer};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

async fn start_server() -> (SocketAddr, HubHandle) {
    let mut config = Config::default();
    config.server.host = "127.0.0.1".to_string();
    config.server.port = 0;
    config.chat.admin_nick = "root".to_string();
    config.web.serve_static = false;

    let web = WebServer::start(&config).expect("start hub");
    let hub = web.hub().clone();
    let addr = web.run_with_addr().await.expect("bind");
    (addr, hub)
}

async fn connect(addr: SocketAddr) -> Client {
    let (ws, _) = connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("ws connect");
    ws
}

async fn send(ws: &mut Client, frame: Value) {
    ws.send(Message::Text(frame.to_string()))
        .await
        .expect("ws send");
}

/// Read frames until one with the given event name arrives.
async fn expect_event(ws: &mut Client, event: &str) -> Value {
    loop {
        let message = tokio::time::timeout(WAIT, ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("socket closed")
            .expect("ws error");
        if let Message::Text(text) = message {
            let frame: Value = serde_json::from_str(&text).expect("json frame");
            if frame["event"] == event {
                return frame;
            }
        }
    }
}

/// Read until the server closes the socket, returning the event names seen.
async fn drain_until_close(ws: &mut Client) -> Vec<String> {
    let mut events = Vec::new();
    loop {
        let next = tokio::time::timeout(WAIT, ws.next())
            .await
            .expect("timed out waiting for close");
        match next {
            Some(Ok(Message::Text(text))) => {
                let frame: Value = serde_json::from_str(&text).expect("json frame");
                events.push(frame["event"].as_str().unwrap_or_default().to_string());
            }
            Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return events,
            Some(Ok(_)) => {}
        }
    }
}

async fn wait_for_users(hub: &HubHandle, users: usize) {
    for _ in 0..50 {
        if hub.stats().await.unwrap().users == users {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("hub never reached {users} users");
}

#[tokio::test]
async fn test_join_and_message_over_socket() {
    let (addr, hub) = start_server().await;
    let mut alice = connect(addr).await;
    let mut bob = connect(addr).await;

    send(&mut alice, json!({"event": "join", "data": "alice"})).await;
    let joined = expect_event(&mut alice, "joined").await;
    assert_eq!(joined["data"]["session"]["nick"], "alice");
    assert_eq!(joined["data"]["session"]["role"], "guest");

    send(&mut bob, json!({"event": "join", "data": "bob"})).await;
    expect_event(&mut bob, "joined").await;
    wait_for_users(&hub, 2).await;

    send(&mut alice, json!({"event": "message", "data": "hello"})).await;
    let message = expect_event(&mut bob, "message").await;
    assert_eq!(message["data"]["type"], "message");
    assert_eq!(message["data"]["nick"], "alice");
    assert_eq!(message["data"]["text"], "hello");

    send(&mut bob, json!({"event": "ping"})).await;
    expect_event(&mut bob, "pong").await;
}

#[tokio::test]
async fn test_invalid_frame_reports_error() {
    let (addr, _hub) = start_server().await;
    let mut ws = connect(addr).await;

    ws.send(Message::Text("not json".to_string())).await.unwrap();
    let error = expect_event(&mut ws, "error").await;
    assert_eq!(error["data"], "Invalid message format");
}

#[tokio::test]
async fn test_kick_flushes_then_closes_socket() {
    let (addr, hub) = start_server().await;
    let mut admin = connect(addr).await;
    let mut bob = connect(addr).await;

    send(&mut admin, json!({"event": "join", "data": "root"})).await;
    expect_event(&mut admin, "joined").await;
    send(&mut bob, json!({"event": "join", "data": "bob"})).await;
    expect_event(&mut bob, "joined").await;
    wait_for_users(&hub, 2).await;

    send(&mut admin, json!({"event": "message", "data": "/kick bob spam"})).await;

    let events = drain_until_close(&mut bob).await;
    assert_eq!(events.last().map(String::as_str), Some("kicked"));

    wait_for_users(&hub, 1).await;
    let quit = loop {
        let frame = expect_event(&mut admin, "message").await;
        if frame["data"]["type"] == "quit" {
            break frame;
        }
    };
    assert_eq!(quit["data"]["nick"], "bob");
    assert_eq!(quit["data"]["reason"], "Kicked: spam");
}

#[tokio::test]
async fn test_client_close_removes_session() {
    let (addr, hub) = start_server().await;
    let mut alice = connect(addr).await;
    send(&mut alice, json!({"event": "join", "data": "alice"})).await;
    expect_event(&mut alice, "joined").await;
    wait_for_users(&hub, 1).await;

    alice.close(None).await.unwrap();
    wait_for_users(&hub, 0).await;
}
