//! Server startup errors.

use thiserror::Error;

/// Errors starting the relay server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Could not bind the listener.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Other listener I/O failure.
    #[error("listener error: {0}")]
    Io(#[from] std::io::Error),
}
