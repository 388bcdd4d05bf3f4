//! Request extractors shared by handlers.
//!
//! - [`context::RequestContext`] -- Request-scoped cancellation with the
//!   configured API deadline.

pub mod context;
