//! Browser WebSocket connection state.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tabrelay_core::{RelayMessage, encode};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Mint a connection id (`conn_<uuid>`).
pub fn new_connection_id() -> String {
    format!("conn_{}", Uuid::new_v4())
}

/// A connected browser tab.
pub struct BrowserConnection {
    /// Unique connection ID.
    pub id: String,
    /// Send channel to the connection's WebSocket writer task.
    tx: mpsc::Sender<Arc<String>>,
    /// When this connection was established.
    pub connected_at: Instant,
    /// Last keepalive `ping` (the handshake counts as the first one).
    last_ping: Mutex<Instant>,
    /// Frames dropped because the outbound queue was full or closed.
    dropped_messages: AtomicU64,
    /// Cancelled when the connection is closed from the relay side.
    closed: CancellationToken,
}

impl BrowserConnection {
    /// Create a new connection.
    ///
    /// `closed` should be a child of the server shutdown token so that
    /// shutdown tears down every connection task.
    pub fn new(id: String, tx: mpsc::Sender<Arc<String>>, closed: CancellationToken) -> Self {
        let now = Instant::now();
        Self {
            id,
            tx,
            connected_at: now,
            last_ping: Mutex::new(now),
            dropped_messages: AtomicU64::new(0),
            closed,
        }
    }

    /// Queue a text frame for the writer task without waiting.
    ///
    /// Returns `false` if the queue is full or the writer is gone.
    pub fn send(&self, text: Arc<String>) -> bool {
        if self.tx.try_send(text).is_ok() {
            true
        } else {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Whether the writer side of the outbound queue has gone away.
    pub fn is_writer_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Encode and queue a relay message.
    pub fn send_message(&self, message: &RelayMessage) -> bool {
        self.send(Arc::new(encode(message)))
    }

    /// Record a keepalive `ping`.
    pub fn mark_alive(&self) {
        *self.last_ping.lock() = Instant::now();
    }

    /// Time since the last `ping` (or the handshake).
    pub fn last_ping_elapsed(&self) -> Duration {
        self.last_ping.lock().elapsed()
    }

    /// Whether a `ping` was seen within `window`.
    pub fn is_alive_within(&self, window: Duration) -> bool {
        self.last_ping_elapsed() < window
    }

    /// Total frames dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Signal the connection's tasks to stop.
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Whether [`close`](Self::close) was called (or the server is shutting down).
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Token cancelled when the connection closes.
    pub fn closed_token(&self) -> CancellationToken {
        self.closed.clone()
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

impl std::fmt::Debug for BrowserConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserConnection")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
