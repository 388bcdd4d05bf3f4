use std::sync::Arc;

use gifspin_core::context::Context;
use gifspin_core::dispatch::Dispatcher;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration, immutable after startup.
    pub config: Arc<ServerConfig>,
    /// Admission gate for compositing processes.
    pub dispatcher: Arc<Dispatcher>,
    /// Parent of every request context. Cancelled when the shutdown grace
    /// period runs out, which kills any compositing still in flight.
    pub root: Context,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let dispatcher = Dispatcher::new(config.dispatch_size);
        Self {
            config: Arc::new(config),
            dispatcher: Arc::new(dispatcher),
            root: Context::new(),
        }
    }
}
