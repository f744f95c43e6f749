//! End-to-end: a real listener, a fake browser over WebSocket and an HTTP
//! caller.

use std::net::SocketAddr;
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tabrelay_server::{RelayServer, ServerConfig, ServerHandle};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Sink = SplitSink<Socket, Message>;
type Stream = SplitStream<Socket>;

async fn start_server() -> (RelayServer, ServerHandle) {
    let server = RelayServer::new(ServerConfig::default());
    let handle = server.start().await.unwrap();
    (server, handle)
}

fn url(addr: SocketAddr, path: &str) -> String {
    format!("http://{addr}{path}")
}

async fn connect_browser(addr: SocketAddr) -> (Sink, Stream) {
    let (socket, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    socket.split()
}

async fn wait_for_browser(client: &reqwest::Client, addr: SocketAddr) {
    for _ in 0..200 {
        let health: Value = client
            .get(url(addr, "/health"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if health["connected_browsers"] == 1 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("browser never registered");
}

async fn next_json(stream: &mut Stream) -> Value {
    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => return serde_json::from_str(text.as_str()).unwrap(),
            Some(Ok(Message::Close(_))) | None => panic!("socket closed"),
            Some(Ok(_)) => {}
            Some(Err(e)) => panic!("socket error: {e}"),
        }
    }
}

async fn send_json(sink: &mut Sink, value: Value) {
    sink.send(Message::Text(value.to_string().into())).await.unwrap();
}

/// Answers every `execute`: `throw` fails, `hang` is ignored, anything else
/// evaluates to 2.
fn spawn_browser(mut sink: Sink, mut stream: Stream) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(Ok(msg)) = stream.next().await {
            let Message::Text(text) = msg else { continue };
            let frame: Value = serde_json::from_str(text.as_str()).unwrap();
            if frame["type"] != "execute" {
                continue;
            }
            let reply = match frame["code"].as_str().unwrap_or_default() {
                "hang" => continue,
                "throw" => json!({
                    "type": "result",
                    "request_id": frame["request_id"],
                    "ok": false,
                    "error": "Error: thrown in page",
                }),
                _ => json!({
                    "type": "result",
                    "request_id": frame["request_id"],
                    "ok": true,
                    "result": 2,
                    "url": "https://example.test/",
                    "title": "Example",
                    "elapsed_ms": 3,
                }),
            };
            if sink.send(Message::Text(reply.to_string().into())).await.is_err() {
                break;
            }
        }
    })
}

#[tokio::test]
async fn execute_round_trip() {
    let (_server, handle) = start_server().await;
    let addr = handle.local_addr();
    let client = reqwest::Client::new();

    let (sink, stream) = connect_browser(addr).await;
    let _browser = spawn_browser(sink, stream);
    wait_for_browser(&client, addr).await;

    let resp = client
        .post(url(addr, "/execute"))
        .json(&json!({"code": "1+1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(
        body,
        json!({
            "ok": true,
            "status": "ok",
            "result": 2,
            "url": "https://example.test/",
            "title": "Example",
        })
    );

    let resp = client
        .post(url(addr, "/execute"))
        .json(&json!({"code": "throw"}))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "error");
    assert_eq!(body["error"], "Error: thrown in page");

    handle.shutdown(Some(Duration::from_secs(2))).await;
}

#[tokio::test]
async fn run_then_poll() {
    let (_server, handle) = start_server().await;
    let addr = handle.local_addr();
    let client = reqwest::Client::new();

    let (sink, stream) = connect_browser(addr).await;
    let _browser = spawn_browser(sink, stream);
    wait_for_browser(&client, addr).await;

    let body: Value = client
        .post(url(addr, "/run"))
        .json(&json!({"code": "document.title"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["ok"], true);
    let id = body["request_id"].as_str().unwrap().to_string();

    let mut result = Value::Null;
    for _ in 0..200 {
        result = client
            .get(url(addr, &format!("/result?request_id={id}")))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if result["status"] != "pending" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(result["status"], "ok");
    assert_eq!(result["result"], 2);
    assert_eq!(result["request_id"], id.as_str());

    let health: Value = client
        .get(url(addr, "/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["completed"], 1);
    assert_eq!(health["pending"], 0);

    handle.shutdown(Some(Duration::from_secs(2))).await;
}

#[tokio::test]
async fn run_without_browser_is_rejected() {
    let (_server, handle) = start_server().await;
    let addr = handle.local_addr();

    let resp = reqwest::Client::new()
        .post(url(addr, "/run"))
        .json(&json!({"code": "1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 503);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["ok"], false);

    handle.shutdown(Some(Duration::from_secs(2))).await;
}

#[tokio::test]
async fn ping_gets_pong_without_side_effects() {
    let (_server, handle) = start_server().await;
    let addr = handle.local_addr();
    let client = reqwest::Client::new();

    let (mut sink, mut stream) = connect_browser(addr).await;
    wait_for_browser(&client, addr).await;

    send_json(&mut sink, json!({"type": "ping"})).await;
    assert_eq!(next_json(&mut stream).await, json!({"type": "pong"}));

    let body: Value = client
        .get(url(addr, "/notifications"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["notifications"], json!([]));

    handle.shutdown(Some(Duration::from_secs(2))).await;
}

#[tokio::test]
async fn notifications_are_queued_and_drained() {
    let (_server, handle) = start_server().await;
    let addr = handle.local_addr();
    let client = reqwest::Client::new();

    let (mut sink, mut stream) = connect_browser(addr).await;
    wait_for_browser(&client, addr).await;

    send_json(
        &mut sink,
        json!({"type": "refocus_notification", "success": true, "message": "refocused"}),
    )
    .await;
    // A ping round trip guarantees the notification was processed first.
    send_json(&mut sink, json!({"type": "ping"})).await;
    assert_eq!(next_json(&mut stream).await["type"], "pong");

    let body: Value = client
        .get(url(addr, "/notifications"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let notifications = body["notifications"].as_array().unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0]["type"], "refocus_notification");
    assert_eq!(notifications[0]["message"], "refocused");
    assert!(notifications[0]["timestamp"].is_string());

    let body: Value = client
        .get(url(addr, "/notifications"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["notifications"], json!([]));

    handle.shutdown(Some(Duration::from_secs(2))).await;
}

#[tokio::test]
async fn malformed_frames_keep_connection_open() {
    let (_server, handle) = start_server().await;
    let addr = handle.local_addr();
    let client = reqwest::Client::new();

    let (mut sink, mut stream) = connect_browser(addr).await;
    wait_for_browser(&client, addr).await;

    sink.send(Message::Text("{not json".into())).await.unwrap();
    send_json(&mut sink, json!({"type": "execute", "request_id": "x", "code": "1"})).await;
    send_json(&mut sink, json!({"type": "ping", "extra": true})).await;
    send_json(&mut sink, json!({"type": "ping"})).await;
    assert_eq!(next_json(&mut stream).await, json!({"type": "pong"}));

    handle.shutdown(Some(Duration::from_secs(2))).await;
}

#[tokio::test]
async fn new_browser_replaces_old_and_fails_pending() {
    let (_server, handle) = start_server().await;
    let addr = handle.local_addr();
    let client = reqwest::Client::new();

    let (_old_sink, mut old_stream) = connect_browser(addr).await;
    wait_for_browser(&client, addr).await;

    let pending = {
        let client = client.clone();
        tokio::spawn(async move {
            client
                .post(url(addr, "/execute"))
                .json(&json!({"code": "hang", "timeout_ms": 30_000}))
                .send()
                .await
                .unwrap()
        })
    };
    // The old browser sees the execute but never answers.
    assert_eq!(next_json(&mut old_stream).await["code"], "hang");

    let (new_sink, new_stream) = connect_browser(addr).await;
    let _browser = spawn_browser(new_sink, new_stream);

    let resp = tokio::time::timeout(Duration::from_secs(5), pending)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(resp.status(), 503);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "connection_lost");

    // The old socket is closed by the relay.
    let closed = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match old_stream.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(closed.is_ok());

    // The replacement serves new requests.
    let body: Value = client
        .post(url(addr, "/execute"))
        .json(&json!({"code": "1+1"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["result"], 2);

    handle.shutdown(Some(Duration::from_secs(2))).await;
}

#[tokio::test]
async fn execute_timeout_with_retries() {
    let (_server, handle) = start_server().await;
    let addr = handle.local_addr();
    let client = reqwest::Client::new();

    let (_sink, mut stream) = connect_browser(addr).await;
    wait_for_browser(&client, addr).await;

    let resp = client
        .post(url(addr, "/execute"))
        .json(&json!({"code": "hang", "timeout_ms": 100, "retries": 1}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 504);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "timeout");

    // Two attempts, two distinct ids.
    let first = next_json(&mut stream).await;
    let second = next_json(&mut stream).await;
    assert_ne!(first["request_id"], second["request_id"]);

    handle.shutdown(Some(Duration::from_secs(2))).await;
}
