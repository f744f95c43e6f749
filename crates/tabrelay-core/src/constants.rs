//! Timing and sizing defaults shared by the relay and its settings.

use std::time::Duration;

/// Default per-request execute timeout.
pub const DEFAULT_EXECUTE_TIMEOUT: Duration = Duration::from_secs(10);

/// Interval at which the browser is expected to send keepalive pings.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(10);

/// A connection with no ping for this long is considered dead.
pub const DEFAULT_LIVENESS_TIMEOUT: Duration = Duration::from_secs(30);

/// Default HTTP/WebSocket port.
pub const DEFAULT_PORT: u16 = 8787;

/// Resolved outcomes retained for late polling.
pub const DEFAULT_RESULT_CACHE_SIZE: usize = 256;

/// How long a resolved outcome stays pollable.
pub const DEFAULT_RESULT_CACHE_TTL: Duration = Duration::from_secs(10 * 60);

/// Capacity of the per-connection outbound queue.
pub const DEFAULT_SEND_QUEUE: usize = 256;

/// Max inbound WebSocket message size (16 MB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Shortest keepalive interval accepted from settings; also the floor for the
/// heartbeat tick.
pub const MIN_KEEPALIVE_INTERVAL: Duration = Duration::from_millis(100);

/// Upper bound on the extra attempts a single `execute` may request.
pub const MAX_EXECUTE_RETRIES: u32 = 10;
