//! `/health` endpoint.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::surface::HealthSnapshot;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `true` when the relay is serving.
    pub ok: bool,
    /// Server time of the check.
    pub timestamp: DateTime<Utc>,
    /// Live browser connections (0 or 1).
    pub connected_browsers: usize,
    /// Requests awaiting a result.
    pub pending: usize,
    /// Results matched to a request since startup.
    pub completed: u64,
    /// `execute` frames sent since startup.
    pub submitted: u64,
    /// Seconds since the server started.
    pub uptime_secs: u64,
}

/// Build a health response from live counters.
pub fn health_check(start_time: Instant, snapshot: HealthSnapshot) -> HealthResponse {
    HealthResponse {
        ok: true,
        timestamp: Utc::now(),
        connected_browsers: usize::from(snapshot.connected),
        pending: snapshot.pending_count,
        completed: snapshot.completed_count,
        submitted: snapshot.submitted_count,
        uptime_secs: start_time.elapsed().as_secs(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(connected: bool) -> HealthSnapshot {
        HealthSnapshot {
            connected,
            pending_count: 2,
            completed_count: 7,
            submitted_count: 9,
        }
    }

    #[test]
    fn reports_counters() {
        let resp = health_check(Instant::now(), snapshot(true));
        assert!(resp.ok);
        assert_eq!(resp.connected_browsers, 1);
        assert_eq!(resp.pending, 2);
        assert_eq!(resp.completed, 7);
        assert_eq!(resp.submitted, 9);
    }

    #[test]
    fn disconnected_reports_zero_browsers() {
        let resp = health_check(Instant::now(), snapshot(false));
        assert_eq!(resp.connected_browsers, 0);
    }

    #[test]
    fn uptime_increases() {
        let start = Instant::now()
            .checked_sub(std::time::Duration::from_secs(60))
            .unwrap();
        let resp = health_check(start, snapshot(false));
        assert!(resp.uptime_secs >= 59);
    }

    #[test]
    fn serializes_expected_fields() {
        let value = serde_json::to_value(health_check(Instant::now(), snapshot(true))).unwrap();
        for key in [
            "ok",
            "timestamp",
            "connected_browsers",
            "pending",
            "completed",
            "uptime_secs",
        ] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        assert!(value["timestamp"].is_string());
    }
}
