//! Keepalive liveness monitoring.
//!
//! The browser sends `ping` every keepalive interval. The heartbeat ticks at
//! the same interval and gives up once no `ping` has been seen for the
//! liveness timeout, so a silent browser is detected within one interval of
//! the timeout even if nobody touches the registry.

use std::sync::Arc;
use std::time::Duration;

use tabrelay_core::constants::MIN_KEEPALIVE_INTERVAL;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::connection::BrowserConnection;
use super::registry::{ConnectionRegistry, DisconnectReason};

/// Outcome of the heartbeat loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatResult {
    /// No `ping` within the timeout window.
    TimedOut,
    /// The heartbeat was cancelled externally.
    Cancelled,
}

/// Watch `connection` until it goes silent for `timeout` or `cancel` fires.
///
/// `interval` is raised to [`MIN_KEEPALIVE_INTERVAL`] if smaller.
pub async fn run_heartbeat(
    connection: Arc<BrowserConnection>,
    interval: Duration,
    timeout: Duration,
    cancel: CancellationToken,
) -> HeartbeatResult {
    let interval = interval.max(MIN_KEEPALIVE_INTERVAL);
    let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if connection.last_ping_elapsed() >= timeout {
                    return HeartbeatResult::TimedOut;
                }
            }
            () = cancel.cancelled() => {
                return HeartbeatResult::Cancelled;
            }
        }
    }
}

/// Run the heartbeat for `connection` and unregister it on expiry.
///
/// Expiry fails every pending request with `ConnectionLost`.
pub async fn expire_on_silence(
    registry: Arc<ConnectionRegistry>,
    connection: Arc<BrowserConnection>,
    interval: Duration,
) -> HeartbeatResult {
    let result = run_heartbeat(
        Arc::clone(&connection),
        interval,
        registry.liveness_timeout(),
        connection.closed_token(),
    )
    .await;

    if result == HeartbeatResult::TimedOut {
        warn!(
            conn_id = %connection.id,
            silent_ms = connection.last_ping_elapsed().as_millis() as u64,
            "browser keepalive expired"
        );
        let _ = registry.unregister(&connection.id, DisconnectReason::KeepaliveExpired);
    }
    result
}
