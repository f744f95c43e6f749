//! Prometheus metrics recorder and metric name constants.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Call once at startup, before any metrics are recorded.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

// Metric name constants to avoid typos across modules.

/// `execute` frames sent to the browser (counter).
pub const RELAY_SUBMISSIONS_TOTAL: &str = "relay_submissions_total";
/// Finished submissions (counter, labels: outcome).
pub const RELAY_OUTCOMES_TOTAL: &str = "relay_outcomes_total";
/// Time from dispatch to outcome (histogram, labels: outcome).
pub const RELAY_REQUEST_DURATION_SECONDS: &str = "relay_request_duration_seconds";
/// `result` frames with no pending request (counter).
pub const RELAY_LATE_RESULTS_TOTAL: &str = "relay_late_results_total";
/// Inbound frames that failed to decode (counter, labels: kind).
pub const RELAY_DECODE_ERRORS_TOTAL: &str = "relay_decode_errors_total";
/// Out-of-band notifications queued (counter, labels: type).
pub const RELAY_NOTIFICATIONS_TOTAL: &str = "relay_notifications_total";
/// Browser connections opened (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// Browser connections closed (counter, labels: reason).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Live browser connections, 0 or 1 (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
