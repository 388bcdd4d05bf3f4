//! Core domain logic for the gifspin compositing service.
//!
//! Everything here is free of HTTP concerns: the token/path codec, the
//! composite options and their limits, request-scoped cancellation, the
//! compositing task that drives the external executable, and the bounded
//! dispatcher that gates how many of those run at once.

pub mod context;
pub mod dispatch;
pub mod error;
pub mod media;
pub mod options;
pub mod task;
pub mod token;
