//! # tabrelay-server
//!
//! Relay between HTTP callers and a single browser tab.
//!
//! The browser holds one WebSocket on `/ws`. Callers post JavaScript to the
//! HTTP command surface; the relay forwards it as an `execute` frame,
//! correlates the browser's `result` by request id, and hands back an
//! [`Outcome`](tabrelay_core::Outcome).
//!
//! - [`relay`]: correlation table, notification queue, orchestrator
//! - [`websocket`]: connection registry, keepalive heartbeat, socket tasks
//! - [`api`]: command surface, result cache, HTTP routes
//! - [`server`]: router assembly and listener lifecycle

#![deny(unsafe_code)]

pub mod api;
pub mod config;
pub mod errors;
pub mod health;
pub mod metrics;
pub mod relay;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use api::surface::{CommandSurface, HealthSnapshot, Poll};
pub use config::ServerConfig;
pub use errors::ServerError;
pub use relay::control::{ControlScriptProvider, DefaultControlScript};
pub use relay::orchestrator::Relay;
pub use server::{RelayServer, ServerHandle};
