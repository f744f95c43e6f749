//! Relay orchestrator: submits `execute` requests and routes inbound frames.
//!
//! A submission moves through `Created → Sent → {Resolved | TimedOut |
//! ConnectionLost}`. Terminal states are final; a retry is a new
//! submission with a new request id, and is the caller's decision.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use metrics::{counter, histogram};
use tabrelay_core::{BrowserMessage, Outcome, RelayError, RelayMessage, RequestId, decode};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::correlation::{CorrelationTable, PendingHandle};
use super::notifications::{NotificationEvent, NotificationQueue};
use crate::metrics::{
    RELAY_DECODE_ERRORS_TOTAL, RELAY_LATE_RESULTS_TOTAL, RELAY_NOTIFICATIONS_TOTAL,
    RELAY_OUTCOMES_TOTAL, RELAY_REQUEST_DURATION_SECONDS, RELAY_SUBMISSIONS_TOTAL,
};
use crate::websocket::connection::BrowserConnection;
use crate::websocket::registry::ConnectionRegistry;

/// Lifecycle of a single submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    /// Correlation slot registered, nothing sent yet.
    Created,
    /// `execute` queued for the browser.
    Sent,
    /// The browser answered (success or script error).
    Resolved,
    /// No answer within the timeout.
    TimedOut,
    /// The connection went away first.
    ConnectionLost,
}

impl SubmissionState {
    /// Terminal state reached with `outcome`.
    pub fn from_outcome(outcome: &Outcome) -> Self {
        match outcome {
            Outcome::Ok { .. } | Outcome::JsError { .. } => Self::Resolved,
            Outcome::Timeout => Self::TimedOut,
            Outcome::ConnectionLost => Self::ConnectionLost,
        }
    }

    /// Whether no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved | Self::TimedOut | Self::ConnectionLost)
    }
}

/// An `execute` that has been sent and is awaiting its result.
#[derive(Debug)]
pub struct Submission {
    handle: PendingHandle,
    state: SubmissionState,
    sent_at: Instant,
}

impl Submission {
    /// Correlation id echoed by the browser.
    pub fn request_id(&self) -> &RequestId {
        self.handle.request_id()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SubmissionState {
        self.state
    }
}

/// Ties the connection registry, correlation table and notification queue
/// together.
pub struct Relay {
    registry: Arc<ConnectionRegistry>,
    correlation: Arc<CorrelationTable>,
    notifications: Arc<NotificationQueue>,
    submitted: AtomicU64,
    completed: AtomicU64,
}

impl Relay {
    /// Create an orchestrator over shared components.
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        correlation: Arc<CorrelationTable>,
        notifications: Arc<NotificationQueue>,
    ) -> Self {
        Self {
            registry,
            correlation,
            notifications,
            submitted: AtomicU64::new(0),
            completed: AtomicU64::new(0),
        }
    }

    /// Send `code` to the browser without waiting for the result.
    ///
    /// Fails with `NotConnected` when no live browser is connected and with
    /// `SendQueueFull` when the browser's outbound queue is saturated. No
    /// correlation entry is left behind either way.
    pub fn dispatch(&self, code: &str) -> Result<Submission, RelayError> {
        if !self.registry.is_alive() {
            debug!("submission rejected, no browser connected");
            record_outcome(&Outcome::ConnectionLost, None);
            return Err(RelayError::NotConnected);
        }

        let handle = self.correlation.create();
        let mut submission = Submission {
            handle,
            state: SubmissionState::Created,
            sent_at: Instant::now(),
        };

        let message = RelayMessage::Execute {
            request_id: submission.request_id().clone(),
            code: code.to_string(),
        };
        if let Err(error) = self.registry.send(&message) {
            warn!(request_id = %submission.request_id(), %error, "failed to send execute");
            record_outcome(&Outcome::ConnectionLost, None);
            // Dropping the submission removes its correlation entry.
            return Err(error);
        }

        submission.state = SubmissionState::Sent;
        submission.sent_at = Instant::now();
        let _ = self.submitted.fetch_add(1, Ordering::Relaxed);
        counter!(RELAY_SUBMISSIONS_TOTAL).increment(1);
        debug!(request_id = %submission.request_id(), code_len = code.len(), "execute sent");
        Ok(submission)
    }

    /// Wait for a dispatched submission to finish.
    pub async fn wait(&self, submission: Submission, timeout: Duration) -> Outcome {
        let Submission {
            handle, sent_at, ..
        } = submission;
        let request_id = handle.request_id().clone();

        let outcome = self.correlation.await_result(handle, timeout).await;
        let state = SubmissionState::from_outcome(&outcome);
        record_outcome(&outcome, Some(sent_at.elapsed()));
        debug!(%request_id, ?state, "submission finished");
        outcome
    }

    /// Dispatch `code` and wait up to `timeout` for its outcome.
    pub async fn submit(&self, code: &str, timeout: Duration) -> Outcome {
        match self.dispatch(code) {
            Ok(submission) => self.wait(submission, timeout).await,
            Err(error) => {
                debug!(%error, "submission not dispatched");
                Outcome::ConnectionLost
            }
        }
    }

    /// Route one inbound frame from `conn`.
    ///
    /// Malformed frames are logged and dropped; the connection stays open.
    #[instrument(skip_all, fields(conn_id = %conn.id))]
    pub fn handle_inbound(&self, conn: &BrowserConnection, raw: &[u8]) {
        let message = match decode(raw) {
            Ok(message) => message,
            Err(error) => {
                counter!(RELAY_DECODE_ERRORS_TOTAL, "kind" => error.kind()).increment(1);
                warn!(%error, len = raw.len(), "dropping malformed browser message");
                return;
            }
        };

        match message {
            BrowserMessage::Result(result) => {
                let request_id = result.request_id.clone();
                if self
                    .correlation
                    .resolve(request_id.as_str(), Outcome::from_result(result))
                {
                    let _ = self.completed.fetch_add(1, Ordering::Relaxed);
                } else {
                    counter!(RELAY_LATE_RESULTS_TOTAL).increment(1);
                    debug!(%request_id, "late or unknown result dropped");
                }
            }
            BrowserMessage::Ping => {
                conn.mark_alive();
                if !conn.send_message(&RelayMessage::Pong) {
                    warn!("failed to queue pong");
                }
            }
            BrowserMessage::ReinitControl { config } => {
                self.enqueue(NotificationEvent::ReinitControl { config });
            }
            BrowserMessage::RefocusNotification { success, message } => {
                self.enqueue(NotificationEvent::RefocusNotification { success, message });
            }
        }
    }

    fn enqueue(&self, event: NotificationEvent) {
        counter!(RELAY_NOTIFICATIONS_TOTAL, "type" => event.kind()).increment(1);
        debug!(kind = event.kind(), "notification queued");
        self.notifications.push(event);
    }

    /// Drop the browser connection and fail everything still pending.
    ///
    /// Returns the number of requests failed.
    pub fn shutdown(&self) -> usize {
        let failed = self.correlation.fail_all(&Outcome::ConnectionLost);
        let _ = self.registry.close_current();
        info!(failed_pending = failed, "relay shut down");
        failed
    }

    /// Number of `execute` frames sent.
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Number of results matched to a pending request.
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Requests awaiting a result.
    pub fn pending(&self) -> usize {
        self.correlation.pending_count()
    }

    /// Whether a live browser is connected.
    pub fn is_alive(&self) -> bool {
        self.registry.is_alive()
    }

    /// The connection registry.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// The correlation table.
    pub fn correlation(&self) -> &Arc<CorrelationTable> {
        &self.correlation
    }

    /// The notification queue.
    pub fn notifications(&self) -> &Arc<NotificationQueue> {
        &self.notifications
    }
}

fn record_outcome(outcome: &Outcome, elapsed: Option<Duration>) {
    let label = outcome.label();
    counter!(RELAY_OUTCOMES_TOTAL, "outcome" => label).increment(1);
    if let Some(elapsed) = elapsed {
        histogram!(RELAY_REQUEST_DURATION_SECONDS, "outcome" => label)
            .record(elapsed.as_secs_f64());
    }
}
