//! Request/response correlation, notifications and the orchestrator tying
//! them to the browser connection.

pub mod control;
pub mod correlation;
pub mod notifications;
pub mod orchestrator;
