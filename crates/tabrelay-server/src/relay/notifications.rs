//! Out-of-band browser events awaiting a caller to drain them.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tabrelay_core::ControlConfiguration;

/// Browser-originated event that is not tied to any request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationEvent {
    /// The page re-initialized its control mode.
    ReinitControl {
        /// Configuration now active in the page.
        config: ControlConfiguration,
    },
    /// An automatic refocus attempt finished.
    RefocusNotification {
        /// Whether focus was restored.
        success: bool,
        /// Detail reported by the page.
        message: String,
    },
}

impl NotificationEvent {
    /// Wire name of the originating message.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ReinitControl { .. } => "reinit_control",
            Self::RefocusNotification { .. } => "refocus_notification",
        }
    }
}

/// A queued event stamped with the relay's receipt time.
///
/// Serializes flat: `{"type": ..., <payload>, "timestamp": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    /// The event payload.
    #[serde(flatten)]
    pub event: NotificationEvent,
    /// When the relay received it (UTC).
    pub timestamp: DateTime<Utc>,
}

/// Unbounded append/drain queue of [`Notification`]s, kept in arrival order.
///
/// Nothing is ever evicted: events stay until a caller drains them.
#[derive(Default)]
pub struct NotificationQueue {
    events: Mutex<Vec<Notification>>,
}

impl NotificationQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event stamped with the current time.
    pub fn push(&self, event: NotificationEvent) {
        self.push_at(event, Utc::now());
    }

    /// Append an event with an explicit receipt time.
    pub fn push_at(&self, event: NotificationEvent, timestamp: DateTime<Utc>) {
        self.events.lock().push(Notification { event, timestamp });
    }

    /// Take every queued event, oldest first, leaving the queue empty.
    pub fn drain(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Number of undrained events.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Whether there is nothing to drain.
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn refocus(message: &str) -> NotificationEvent {
        NotificationEvent::RefocusNotification {
            success: true,
            message: message.into(),
        }
    }

    #[test]
    fn drain_returns_arrival_order() {
        let queue = NotificationQueue::default();
        queue.push(refocus("first"));
        queue.push(refocus("second"));

        let drained = queue.drain();
        let messages: Vec<_> = drained
            .iter()
            .map(|n| match &n.event {
                NotificationEvent::RefocusNotification { message, .. } => message.as_str(),
                NotificationEvent::ReinitControl { .. } => "reinit",
            })
            .collect();
        assert_eq!(messages, ["first", "second"]);
    }

    #[test]
    fn second_drain_is_empty() {
        let queue = NotificationQueue::default();
        queue.push(refocus("x"));
        assert_eq!(queue.drain().len(), 1);
        assert!(queue.drain().is_empty());
        assert!(queue.is_empty());
    }

    #[test]
    fn large_backlog_is_kept_in_full() {
        let queue = NotificationQueue::new();
        for i in 0..1100 {
            queue.push(refocus(&i.to_string()));
        }
        assert_eq!(queue.len(), 1100);

        let drained = queue.drain();
        assert_eq!(drained.len(), 1100);
        assert_eq!(drained[0].event, refocus("0"));
        assert_eq!(drained[1099].event, refocus("1099"));
        assert!(queue.is_empty());
    }

    #[test]
    fn serializes_flat_with_type_and_timestamp() {
        let queue = NotificationQueue::default();
        let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        queue.push_at(refocus("restored"), at);

        let value = serde_json::to_value(&queue.drain()[0]).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "refocus_notification",
                "success": true,
                "message": "restored",
                "timestamp": "2026-01-02T03:04:05Z",
            })
        );
    }

    #[test]
    fn reinit_control_serializes_config() {
        let config = ControlConfiguration::from_value(json!({"tts_enabled": true})).unwrap();
        let event = NotificationEvent::ReinitControl { config };
        assert_eq!(event.kind(), "reinit_control");

        let value = serde_json::to_value(Notification {
            event,
            timestamp: Utc::now(),
        })
        .unwrap();
        assert_eq!(value["type"], "reinit_control");
        assert_eq!(value["config"]["tts_enabled"], true);
        assert!(value["timestamp"].is_string());
    }
}
