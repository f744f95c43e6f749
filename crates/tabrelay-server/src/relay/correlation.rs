//! Correlation table: pending `execute` requests keyed by request id.
//!
//! Each entry owns a single-use `oneshot` slot. An entry leaves the table
//! exactly once: on [`CorrelationTable::resolve`], on timeout, when its
//! [`PendingHandle`] is dropped, or on [`CorrelationTable::fail_all`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tabrelay_core::{Outcome, RequestId};
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::debug;

struct PendingEntry {
    tx: oneshot::Sender<Outcome>,
    created_at: Instant,
}

type PendingMap = Arc<Mutex<HashMap<RequestId, PendingEntry>>>;

/// Caller's side of a pending request.
///
/// Dropping the handle removes its entry, so a result that arrives after the
/// caller gave up is discarded instead of filling a slot nobody reads.
pub struct PendingHandle {
    request_id: RequestId,
    rx: oneshot::Receiver<Outcome>,
    pending: PendingMap,
}

impl PendingHandle {
    /// Id the browser must echo.
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }
}

impl Drop for PendingHandle {
    fn drop(&mut self) {
        if self.pending.lock().remove(self.request_id.as_str()).is_some() {
            debug!(request_id = %self.request_id, "pending request abandoned");
        }
    }
}

impl std::fmt::Debug for PendingHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingHandle")
            .field("request_id", &self.request_id)
            .finish_non_exhaustive()
    }
}

/// Map of in-flight request ids to their completion slots.
pub struct CorrelationTable {
    pending: PendingMap,
}

impl CorrelationTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Mint a fresh request id and register its slot.
    pub fn create(&self) -> PendingHandle {
        let request_id = RequestId::new();
        let (tx, rx) = oneshot::channel();
        let entry = PendingEntry {
            tx,
            created_at: Instant::now(),
        };
        let _ = self.pending.lock().insert(request_id.clone(), entry);
        PendingHandle {
            request_id,
            rx,
            pending: Arc::clone(&self.pending),
        }
    }

    /// Fulfil a pending request. At most once per id.
    ///
    /// Returns `false` for unknown, already resolved, timed out or abandoned
    /// ids; the outcome is dropped in that case.
    pub fn resolve(&self, request_id: &str, outcome: Outcome) -> bool {
        let Some(entry) = self.pending.lock().remove(request_id) else {
            return false;
        };
        debug!(
            request_id,
            outcome = outcome.label(),
            waited_ms = entry.created_at.elapsed().as_millis() as u64,
            "resolving pending request"
        );
        entry.tx.send(outcome).is_ok()
    }

    /// Wait for `handle` to be resolved, up to `timeout`.
    ///
    /// Only the calling task is suspended. The entry is removed on every
    /// exit path, including when this future is dropped mid-wait.
    pub async fn await_result(&self, mut handle: PendingHandle, timeout: Duration) -> Outcome {
        match tokio::time::timeout(timeout, &mut handle.rx).await {
            Ok(Ok(outcome)) => outcome,
            // Sender dropped without an outcome: the table was torn down.
            Ok(Err(_)) => Outcome::ConnectionLost,
            Err(_) => {
                debug!(request_id = %handle.request_id, ?timeout, "pending request timed out");
                Outcome::Timeout
            }
        }
    }

    /// Resolve every pending entry with `outcome` and clear the table.
    ///
    /// Returns the number of entries drained.
    pub fn fail_all(&self, outcome: &Outcome) -> usize {
        let drained: Vec<PendingEntry> = {
            let mut pending = self.pending.lock();
            pending.drain().map(|(_, entry)| entry).collect()
        };
        let count = drained.len();
        for entry in drained {
            let _ = entry.tx.send(outcome.clone());
        }
        count
    }

    /// Whether `request_id` is still awaiting a result.
    pub fn contains(&self, request_id: &str) -> bool {
        self.pending.lock().contains_key(request_id)
    }

    /// Number of in-flight requests.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

impl Default for CorrelationTable {
    fn default() -> Self {
        Self::new()
    }
}
