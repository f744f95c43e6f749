//! Settings schema.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tabrelay_core::ControlConfiguration;
use tabrelay_core::constants::{
    DEFAULT_EXECUTE_TIMEOUT, DEFAULT_KEEPALIVE_INTERVAL, DEFAULT_LIVENESS_TIMEOUT,
    DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_PORT, DEFAULT_RESULT_CACHE_SIZE, DEFAULT_RESULT_CACHE_TTL,
    DEFAULT_SEND_QUEUE,
};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelaySettings {
    /// Network binding.
    pub server: ServerSettings,
    /// Timeouts, keepalive and result retention.
    pub timing: TimingSettings,
    /// Log output.
    pub logging: LoggingSettings,
    /// Defaults merged under every control re-initialization.
    pub control: ControlConfiguration,
}

/// Network binding for the HTTP + WebSocket listener.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address. Loopback by default: the relay has no authentication.
    pub host: String,
    /// Listen port.
    pub port: u16,
    /// Max inbound WebSocket frame size in bytes.
    pub max_message_size: usize,
    /// Outbound queue capacity per browser connection.
    pub send_queue_capacity: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            send_queue_capacity: DEFAULT_SEND_QUEUE,
        }
    }
}

/// Relay timing and retention.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimingSettings {
    /// Default execute timeout when a caller does not give one.
    pub execute_timeout_ms: u64,
    /// Expected interval between browser pings.
    pub keepalive_interval_ms: u64,
    /// Silence after which the browser is considered gone.
    pub liveness_timeout_ms: u64,
    /// Resolved outcomes kept for late polling.
    pub result_cache_size: usize,
    /// How long a resolved outcome stays pollable.
    pub result_cache_ttl_secs: u64,
    /// Extra attempts `POST /execute` makes after a timeout.
    pub execute_retries: u32,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            execute_timeout_ms: DEFAULT_EXECUTE_TIMEOUT.as_millis() as u64,
            keepalive_interval_ms: DEFAULT_KEEPALIVE_INTERVAL.as_millis() as u64,
            liveness_timeout_ms: DEFAULT_LIVENESS_TIMEOUT.as_millis() as u64,
            result_cache_size: DEFAULT_RESULT_CACHE_SIZE,
            result_cache_ttl_secs: DEFAULT_RESULT_CACHE_TTL.as_secs(),
            execute_retries: 0,
        }
    }
}

impl TimingSettings {
    /// Execute timeout as a [`Duration`].
    pub fn execute_timeout(&self) -> Duration {
        Duration::from_millis(self.execute_timeout_ms)
    }

    /// Keepalive interval as a [`Duration`].
    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_millis(self.keepalive_interval_ms)
    }

    /// Liveness timeout as a [`Duration`].
    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_millis(self.liveness_timeout_ms)
    }

    /// Result cache TTL as a [`Duration`].
    pub fn result_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.result_cache_ttl_secs)
    }
}

/// Log output settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive (overridden by `RUST_LOG`).
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
