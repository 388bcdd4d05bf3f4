use std::process::ExitStatus;

use crate::context::ContextError;
use crate::options::LimitError;

/// Everything that can go wrong between validating options and the
/// compositing executable finishing.
#[derive(Debug, thiserror::Error)]
pub enum SpinError {
    /// Client-supplied options fall outside the configured limits.
    #[error("invalid settings: {0}")]
    Limits(#[from] LimitError),

    /// The request context was cancelled or hit its deadline.
    #[error(transparent)]
    Context(#[from] ContextError),

    /// The executable could not be spawned.
    #[error("task failed to start: {0}")]
    Start(#[source] std::io::Error),

    /// Waiting on the child process failed.
    #[error("task wait failed: {0}")]
    Wait(#[source] std::io::Error),

    /// The executable ran and exited unsuccessfully.
    #[error("task failed: {output:?}, {status}")]
    Failed { status: ExitStatus, output: String },

    /// The task body panicked; the panic was contained.
    #[error("task panic: {0}")]
    Panicked(String),

    /// The dispatcher has been closed for shutdown.
    #[error("dispatcher is shutting down")]
    Closed,
}
