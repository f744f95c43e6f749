//! Single-slot registry for the live browser connection.
//!
//! At most one browser is connected. Registering a new connection closes
//! the previous one, and every change of connection fails all pending
//! requests with [`Outcome::ConnectionLost`] while the slot lock is held, so
//! no request can straddle two connections.

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge};
use parking_lot::RwLock;
use tabrelay_core::{Outcome, RelayError, RelayMessage};
use tracing::{debug, info, warn};

use super::connection::BrowserConnection;
use crate::metrics::{WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL};
use crate::relay::correlation::CorrelationTable;

/// Why a connection left the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The browser closed the socket.
    Closed,
    /// The socket failed.
    Error,
    /// No `ping` within the liveness window.
    KeepaliveExpired,
    /// A newer connection took the slot.
    Replaced,
    /// The relay is shutting down.
    Shutdown,
}

impl DisconnectReason {
    /// Label for logs and metrics.
    pub fn label(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Error => "error",
            Self::KeepaliveExpired => "keepalive_expired",
            Self::Replaced => "replaced",
            Self::Shutdown => "shutdown",
        }
    }
}

/// Holds the current browser connection.
pub struct ConnectionRegistry {
    current: RwLock<Option<Arc<BrowserConnection>>>,
    correlation: Arc<CorrelationTable>,
    liveness_timeout: Duration,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    ///
    /// `correlation` is swept on every connection change.
    pub fn new(correlation: Arc<CorrelationTable>, liveness_timeout: Duration) -> Self {
        Self {
            current: RwLock::new(None),
            correlation,
            liveness_timeout,
        }
    }

    /// Silence after which the connection is considered gone.
    pub fn liveness_timeout(&self) -> Duration {
        self.liveness_timeout
    }

    /// Make `conn` the current connection, closing any previous one.
    ///
    /// Returns the number of pending requests failed with `ConnectionLost`.
    pub fn register(&self, conn: Arc<BrowserConnection>) -> usize {
        let conn_id = conn.id.clone();
        let (previous, failed) = {
            let mut slot = self.current.write();
            let previous = slot.replace(conn);
            let failed = self.correlation.fail_all(&Outcome::ConnectionLost);
            (previous, failed)
        };

        counter!(WS_CONNECTIONS_TOTAL).increment(1);
        if let Some(previous) = previous {
            previous.close();
            counter!(WS_DISCONNECTIONS_TOTAL, "reason" => DisconnectReason::Replaced.label())
                .increment(1);
            info!(
                conn_id,
                replaced = %previous.id,
                failed_pending = failed,
                "browser connection replaced"
            );
        } else {
            info!(conn_id, failed_pending = failed, "browser connected");
        }
        gauge!(WS_CONNECTIONS_ACTIVE).set(1.0);
        failed
    }

    /// Clear the slot if `conn_id` is still the current connection.
    ///
    /// A replaced connection's late close is ignored so it cannot evict its
    /// successor. Returns `true` if the slot was cleared.
    pub fn unregister(&self, conn_id: &str, reason: DisconnectReason) -> bool {
        let (removed, failed) = {
            let mut slot = self.current.write();
            if slot.as_ref().is_none_or(|c| c.id != conn_id) {
                debug!(conn_id, reason = reason.label(), "stale unregister ignored");
                return false;
            }
            let removed = slot.take();
            let failed = self.correlation.fail_all(&Outcome::ConnectionLost);
            (removed, failed)
        };

        if let Some(conn) = removed {
            conn.close();
        }
        counter!(WS_DISCONNECTIONS_TOTAL, "reason" => reason.label()).increment(1);
        gauge!(WS_CONNECTIONS_ACTIVE).set(0.0);
        info!(
            conn_id,
            reason = reason.label(),
            failed_pending = failed,
            "browser disconnected"
        );
        true
    }

    /// The current connection, if it is still within its liveness window.
    ///
    /// An expired connection is unregistered on the spot.
    pub fn current(&self) -> Option<Arc<BrowserConnection>> {
        let conn = self.current.read().clone()?;
        if conn.is_alive_within(self.liveness_timeout) {
            return Some(conn);
        }
        warn!(
            conn_id = %conn.id,
            silent_ms = conn.last_ping_elapsed().as_millis() as u64,
            "browser missed keepalive"
        );
        let _ = self.unregister(&conn.id, DisconnectReason::KeepaliveExpired);
        None
    }

    /// Whether a live browser is connected.
    pub fn is_alive(&self) -> bool {
        self.current().is_some()
    }

    /// Number of live connections (0 or 1).
    pub fn connection_count(&self) -> usize {
        usize::from(self.is_alive())
    }

    /// Queue `message` for the current connection without blocking.
    pub fn send(&self, message: &RelayMessage) -> Result<(), RelayError> {
        let conn = self.current().ok_or(RelayError::NotConnected)?;
        if conn.send_message(message) {
            Ok(())
        } else if conn.is_writer_closed() {
            warn!(conn_id = %conn.id, kind = message.kind(), "outbound writer gone");
            Err(RelayError::NotConnected)
        } else {
            warn!(
                conn_id = %conn.id,
                kind = message.kind(),
                dropped = conn.drop_count(),
                "outbound queue full, browser still connected"
            );
            Err(RelayError::SendQueueFull)
        }
    }

    /// Drop the current connection, if any, for shutdown.
    pub fn close_current(&self) -> bool {
        let conn_id = self.current.read().as_ref().map(|c| c.id.clone());
        conn_id.is_some_and(|id| self.unregister(&id, DisconnectReason::Shutdown))
    }
}
