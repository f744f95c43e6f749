//! Browser connection management, keepalive and the `/ws` handler.

pub mod connection;
pub mod handler;
pub mod heartbeat;
pub mod registry;
