//! # tabrelay-core
//!
//! Shared building blocks for the tabrelay browser bridge.
//!
//! - [`protocol`]: closed wire message types and the decode/encode codec
//! - [`outcome`]: terminal result of a submitted execution
//! - [`ids`]: opaque request identifiers
//! - [`control`]: control-mode configuration passed through to the browser
//! - [`errors`]: relay-wide error types
//! - [`logging`]: `tracing` subscriber setup

#![deny(unsafe_code)]

pub mod constants;
pub mod control;
pub mod errors;
pub mod ids;
pub mod logging;
pub mod outcome;
pub mod protocol;

pub use control::ControlConfiguration;
pub use errors::{DecodeError, RelayError};
pub use ids::RequestId;
pub use outcome::Outcome;
pub use protocol::{BrowserMessage, RelayMessage, ResultMessage, decode, encode};
