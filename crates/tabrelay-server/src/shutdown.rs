//! Graceful shutdown coordination via `CancellationToken`.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::relay::orchestrator::Relay;

/// Default timeout for graceful shutdown before giving up on tasks.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Coordinates shutdown of the listener, the browser connection tasks and
/// callers still waiting on results.
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Get a clone of the cancellation token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Initiate shutdown.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether a shutdown has been initiated.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Stop everything.
    ///
    /// 1. Cancel the token (listener and connection tasks observe it)
    /// 2. Fail every pending request with `ConnectionLost`
    /// 3. Wait up to `timeout` for `handles` to finish
    pub async fn graceful_shutdown(
        &self,
        relay: &Relay,
        handles: Vec<JoinHandle<()>>,
        timeout: Option<Duration>,
    ) {
        let timeout = timeout.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT);

        self.shutdown();
        let failed = relay.shutdown();
        info!(
            task_count = handles.len(),
            failed_pending = failed,
            timeout_secs = timeout.as_secs(),
            "waiting for tasks to complete"
        );

        let drain = futures::future::join_all(handles);
        if tokio::time::timeout(timeout, drain).await.is_err() {
            warn!("shutdown timed out after {timeout:?}, some tasks may still be running");
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use tabrelay_core::Outcome;
    use tokio::sync::mpsc;

    use crate::relay::correlation::CorrelationTable;
    use crate::relay::notifications::NotificationQueue;
    use crate::websocket::connection::BrowserConnection;
    use crate::websocket::registry::ConnectionRegistry;

    fn make_relay() -> Relay {
        let correlation = Arc::new(CorrelationTable::new());
        let registry = Arc::new(ConnectionRegistry::new(
            Arc::clone(&correlation),
            Duration::from_secs(30),
        ));
        Relay::new(registry, correlation, Arc::new(NotificationQueue::default()))
    }

    #[test]
    fn initial_state_not_shutting_down() {
        let coord = ShutdownCoordinator::new();
        assert!(!coord.is_shutting_down());
    }

    #[test]
    fn child_tokens_follow_shutdown() {
        let coord = ShutdownCoordinator::new();
        let conn_token = coord.token().child_token();
        coord.shutdown();
        coord.shutdown();
        assert!(coord.is_shutting_down());
        assert!(conn_token.is_cancelled());
    }

    #[tokio::test]
    async fn graceful_shutdown_fails_pending_and_waits_for_tasks() {
        let coord = ShutdownCoordinator::new();
        let relay = make_relay();
        let (tx, _rx) = mpsc::channel(4);
        let conn = Arc::new(BrowserConnection::new(
            "conn_sd".into(),
            tx,
            coord.token().child_token(),
        ));
        let _ = relay.registry().register(Arc::clone(&conn));
        let submission = relay.dispatch("1").unwrap();

        let token = coord.token();
        let task = tokio::spawn(async move { token.cancelled().await });

        coord
            .graceful_shutdown(&relay, vec![task], Some(Duration::from_secs(1)))
            .await;

        assert!(conn.is_closed());
        assert!(!relay.is_alive());
        assert_eq!(
            relay.wait(submission, Duration::from_secs(1)).await,
            Outcome::ConnectionLost
        );
    }

    #[tokio::test(start_paused = true)]
    async fn graceful_shutdown_gives_up_on_stuck_tasks() {
        let coord = ShutdownCoordinator::new();
        let relay = make_relay();
        let stuck = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });

        let start = tokio::time::Instant::now();
        coord
            .graceful_shutdown(&relay, vec![stuck], Some(Duration::from_secs(2)))
            .await;
        assert!(start.elapsed() < Duration::from_secs(3600));
    }
}
