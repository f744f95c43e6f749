//! `GET /ws`: the browser's persistent connection.
//!
//! Each connection runs three tasks: a writer draining the outbound queue,
//! a heartbeat watching keepalive pings, and the reader loop below, which
//! hands every inbound frame to the orchestrator in arrival order.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::connection::{BrowserConnection, new_connection_id};
use super::heartbeat::expire_on_silence;
use super::registry::DisconnectReason;
use crate::relay::orchestrator::Relay;
use crate::server::AppState;

/// How long the writer gets to flush a close frame after the reader stops.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// WebSocket upgrade handler.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

/// Register a freshly upgraded socket and serve it until it closes.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (tx, rx) = mpsc::channel(state.config.send_queue_capacity.max(1));
    let conn = Arc::new(BrowserConnection::new(
        new_connection_id(),
        tx,
        state.shutdown.token().child_token(),
    ));
    let _ = state.relay.registry().register(Arc::clone(&conn));

    run_connection(
        socket,
        conn,
        rx,
        Arc::clone(&state.relay),
        state.config.keepalive_interval,
    )
    .await;
}

/// Serve a registered connection until either side closes it.
pub async fn run_connection(
    socket: WebSocket,
    conn: Arc<BrowserConnection>,
    mut rx: mpsc::Receiver<Arc<String>>,
    relay: Arc<Relay>,
    keepalive_interval: Duration,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let closed = conn.closed_token();

    // Writer task: the only place that writes to the socket.
    let writer_closed = closed.clone();
    let writer_conn_id = conn.id.clone();
    let writer = tokio::spawn(async move {
        loop {
            tokio::select! {
                msg = rx.recv() => {
                    let Some(text) = msg else { break };
                    if ws_tx.send(Message::Text(String::clone(&text).into())).await.is_err() {
                        debug!(conn_id = %writer_conn_id, "websocket write failed");
                        break;
                    }
                }
                () = writer_closed.cancelled() => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    let heartbeat = tokio::spawn(expire_on_silence(
        Arc::clone(relay.registry()),
        Arc::clone(&conn),
        keepalive_interval,
    ));

    // Reader loop. `None` means the relay closed the connection itself
    // (replaced, expired or shutting down) and has already unregistered it.
    let reason = loop {
        tokio::select! {
            frame = ws_rx.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    relay.handle_inbound(&conn, text.as_str().as_bytes());
                }
                Some(Ok(Message::Binary(bytes))) => relay.handle_inbound(&conn, &bytes),
                Some(Ok(Message::Close(_))) | None => break Some(DisconnectReason::Closed),
                // Transport-level ping/pong is answered by axum.
                Some(Ok(_)) => {}
                Some(Err(error)) => {
                    warn!(conn_id = %conn.id, %error, "websocket read failed");
                    break Some(DisconnectReason::Error);
                }
            },
            () = closed.cancelled() => break None,
        }
    };

    if let Some(reason) = reason {
        let _ = relay.registry().unregister(&conn.id, reason);
    }
    conn.close();
    let _ = heartbeat.await;
    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, writer).await.is_err() {
        debug!(conn_id = %conn.id, "writer did not finish in time");
    }

    info!(
        conn_id = %conn.id,
        age_secs = conn.age().as_secs(),
        dropped = conn.drop_count(),
        "browser connection finished"
    );
}
