//! `tracing` subscriber setup.
//!
//! Logs go to stderr so stdout stays free for anything a wrapper script
//! wants to pipe. `RUST_LOG` takes precedence over the configured level.

use tracing_subscriber::EnvFilter;

/// Output format for the stderr log layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable compact lines.
    #[default]
    Compact,
    /// One JSON object per event.
    Json,
}

/// Build the filter: `RUST_LOG` if set, otherwise `level`.
pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Initialize the global tracing subscriber.
///
/// Call once at startup. Later calls are no-ops.
pub fn init_subscriber(level: &str, format: LogFormat) {
    let filter = env_filter(level);

    let result = match format {
        LogFormat::Compact => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .compact()
            .try_init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .json()
            .try_init(),
    };
    // Already installed (tests, embedding).
    drop(result);
}
