//! gifspin API server library.
//!
//! Exposes the building blocks (config, state, error handling, handlers,
//! routes) so integration tests and the binary entrypoint share them.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
