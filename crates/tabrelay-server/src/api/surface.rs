//! Command surface: the caller-facing operations behind the HTTP routes.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashSet;
use parking_lot::Mutex;
use serde_json::Value;
use tabrelay_core::{ControlConfiguration, Outcome, RelayError, RequestId};
use tracing::{debug, info};

use super::result_cache::{ResultCache, ResultCacheConfig};
use crate::relay::control::ControlScriptProvider;
use crate::relay::notifications::Notification;
use crate::relay::orchestrator::Relay;

/// State of a request id as seen by a poller.
#[derive(Debug, Clone, PartialEq)]
pub enum Poll {
    /// Sent and still awaiting its result.
    Pending,
    /// Finished with this outcome.
    Done(Outcome),
    /// Never issued, or its outcome has been evicted.
    Unknown,
}

/// Point-in-time relay counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthSnapshot {
    /// Whether a live browser is connected.
    pub connected: bool,
    /// Requests awaiting a result.
    pub pending_count: usize,
    /// Results matched to a request since startup.
    pub completed_count: u64,
    /// `execute` frames sent since startup.
    pub submitted_count: u64,
}

/// Tunables for [`CommandSurface`].
#[derive(Clone, Debug)]
pub struct SurfaceConfig {
    /// Timeout used when a caller does not give one.
    pub default_timeout: Duration,
    /// Retention of finished outcomes.
    pub results: ResultCacheConfig,
    /// Defaults merged under every control re-initialization.
    pub control_defaults: ControlConfiguration,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            default_timeout: tabrelay_core::constants::DEFAULT_EXECUTE_TIMEOUT,
            results: ResultCacheConfig::default(),
            control_defaults: ControlConfiguration::default(),
        }
    }
}

/// Submission, polling, health and notification access for callers.
pub struct CommandSurface {
    relay: Arc<Relay>,
    results: Arc<Mutex<ResultCache>>,
    in_flight: Arc<DashSet<RequestId>>,
    control_script: Arc<dyn ControlScriptProvider>,
    config: SurfaceConfig,
}

impl CommandSurface {
    /// Create a surface over `relay`.
    pub fn new(
        relay: Arc<Relay>,
        config: SurfaceConfig,
        control_script: Arc<dyn ControlScriptProvider>,
    ) -> Self {
        Self {
            relay,
            results: Arc::new(Mutex::new(ResultCache::new(config.results.clone()))),
            in_flight: Arc::new(DashSet::new()),
            control_script,
            config,
        }
    }

    /// Send `code` and return its request id immediately.
    ///
    /// The outcome is awaited in the background and kept for
    /// [`poll_result`](Self::poll_result).
    pub fn submit_code(
        &self,
        code: &str,
        timeout: Option<Duration>,
    ) -> Result<RequestId, RelayError> {
        let submission = self.relay.dispatch(code)?;
        let request_id = submission.request_id().clone();
        let timeout = timeout.unwrap_or(self.config.default_timeout);

        let _ = self.in_flight.insert(request_id.clone());
        let relay = Arc::clone(&self.relay);
        let results = Arc::clone(&self.results);
        let in_flight = Arc::clone(&self.in_flight);
        let id = request_id.clone();
        let _ = tokio::spawn(async move {
            let outcome = relay.wait(submission, timeout).await;
            // Cache before clearing in-flight so pollers never see a gap.
            results.lock().insert(id.clone(), outcome);
            let _ = in_flight.remove(&id);
        });

        debug!(%request_id, "submission accepted");
        Ok(request_id)
    }

    /// Send `code` and wait for its outcome.
    pub async fn execute(&self, code: &str, timeout: Option<Duration>) -> Outcome {
        self.relay
            .submit(code, timeout.unwrap_or(self.config.default_timeout))
            .await
    }

    /// Like [`execute`](Self::execute), retrying on `Timeout` only.
    ///
    /// Makes at most `attempts` submissions (at least one), each with a
    /// fresh request id.
    pub async fn execute_with_retry(
        &self,
        code: &str,
        timeout: Option<Duration>,
        attempts: u32,
    ) -> Outcome {
        let attempts = attempts.max(1);
        let mut attempt = 1;
        loop {
            let outcome = self.execute(code, timeout).await;
            if outcome != Outcome::Timeout || attempt >= attempts {
                return outcome;
            }
            info!(attempt, attempts, "execute timed out, retrying");
            attempt += 1;
        }
    }

    /// Current state of `request_id`. Repeatable.
    pub fn poll_result(&self, request_id: &str) -> Poll {
        if self.in_flight.contains(request_id) {
            return Poll::Pending;
        }
        match self.results.lock().get(request_id) {
            Some(outcome) => Poll::Done(outcome),
            None => Poll::Unknown,
        }
    }

    /// Relay counters.
    pub fn health(&self) -> HealthSnapshot {
        HealthSnapshot {
            connected: self.relay.is_alive(),
            pending_count: self.relay.pending(),
            completed_count: self.relay.completed(),
            submitted_count: self.relay.submitted(),
        }
    }

    /// Take every queued notification.
    pub fn drain_notifications(&self) -> Vec<Notification> {
        self.relay.notifications().drain()
    }

    /// Re-initialize in-page control mode with `config` over the defaults.
    ///
    /// `config` must be a JSON object. The resulting snippet is submitted
    /// like [`submit_code`](Self::submit_code).
    pub fn reinit_control(&self, config: Value) -> Result<RequestId, RelayError> {
        let overrides = ControlConfiguration::from_value(config)?;
        let merged = self.config.control_defaults.clone().merged_with(&overrides);
        let code = self.control_script.reinit_script(&merged);
        let request_id = self.submit_code(&code, None)?;
        info!(%request_id, keys = merged.len(), "control re-initialization sent");
        Ok(request_id)
    }

    /// The underlying orchestrator.
    pub fn relay(&self) -> &Arc<Relay> {
        &self.relay
    }

    /// Default execute timeout.
    pub fn default_timeout(&self) -> Duration {
        self.config.default_timeout
    }

    /// Drop expired cached outcomes.
    pub fn purge_expired_results(&self) -> usize {
        self.results.lock().purge_expired()
    }
}
