//! Server configuration.

use std::time::Duration;

use tabrelay_core::ControlConfiguration;
use tabrelay_core::constants::{
    DEFAULT_EXECUTE_TIMEOUT, DEFAULT_KEEPALIVE_INTERVAL, DEFAULT_LIVENESS_TIMEOUT,
    DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_RESULT_CACHE_SIZE, DEFAULT_RESULT_CACHE_TTL,
    DEFAULT_SEND_QUEUE, MAX_EXECUTE_RETRIES, MIN_KEEPALIVE_INTERVAL,
};
use tabrelay_settings::RelaySettings;

use crate::api::result_cache::ResultCacheConfig;
use crate::api::surface::SurfaceConfig;

/// Configuration for the relay server.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Max inbound WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Outbound queue capacity for the browser connection.
    pub send_queue_capacity: usize,
    /// Execute timeout when a caller does not give one.
    pub execute_timeout: Duration,
    /// Expected browser ping interval; also the heartbeat tick.
    pub keepalive_interval: Duration,
    /// Silence after which the browser is dropped.
    pub liveness_timeout: Duration,
    /// Finished outcomes kept for polling.
    pub result_cache_size: usize,
    /// How long a finished outcome stays pollable.
    pub result_cache_ttl: Duration,
    /// Default extra attempts for `POST /execute` after a timeout.
    pub execute_retries: u32,
    /// Defaults merged under every control re-initialization.
    pub control_defaults: ControlConfiguration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            send_queue_capacity: DEFAULT_SEND_QUEUE,
            execute_timeout: DEFAULT_EXECUTE_TIMEOUT,
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            liveness_timeout: DEFAULT_LIVENESS_TIMEOUT,
            result_cache_size: DEFAULT_RESULT_CACHE_SIZE,
            result_cache_ttl: DEFAULT_RESULT_CACHE_TTL,
            execute_retries: 0,
            control_defaults: ControlConfiguration::default(),
        }
    }
}

impl ServerConfig {
    /// Build from loaded settings.
    pub fn from_settings(settings: &RelaySettings) -> Self {
        let timing = &settings.timing;
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            max_message_size: settings.server.max_message_size,
            send_queue_capacity: settings.server.send_queue_capacity,
            execute_timeout: timing.execute_timeout(),
            keepalive_interval: timing.keepalive_interval().max(MIN_KEEPALIVE_INTERVAL),
            liveness_timeout: timing.liveness_timeout(),
            result_cache_size: timing.result_cache_size,
            result_cache_ttl: timing.result_cache_ttl(),
            execute_retries: timing.execute_retries.min(MAX_EXECUTE_RETRIES),
            control_defaults: ControlConfiguration::default().merged_with(&settings.control),
        }
    }

    /// `host:port` to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Settings for the command surface.
    pub fn surface_config(&self) -> SurfaceConfig {
        SurfaceConfig {
            default_timeout: self.execute_timeout,
            results: ResultCacheConfig {
                ttl: self.result_cache_ttl,
                max_entries: self.result_cache_size,
            },
            control_defaults: self.control_defaults.clone(),
        }
    }
}
