//! Caller-facing command surface and its HTTP routes.

pub mod result_cache;
pub mod routes;
pub mod surface;
