//! Bounded admission gate for compositing tasks.
//!
//! The [`Dispatcher`] is a fixed-capacity semaphore, not a queue. A caller
//! either obtains a slot before its context finishes or gives up; nothing
//! is buffered. This bounds both the number of concurrent child processes
//! and how long a request can wait for one.

use tokio::sync::Semaphore;

use crate::context::Context;
use crate::error::SpinError;
use crate::task::Task;

/// Default number of tasks allowed to run at once.
pub const DEFAULT_CAPACITY: usize = 4;

/// Process-wide gate limiting how many [`Task`]s execute concurrently.
#[derive(Debug)]
pub struct Dispatcher {
    slots: Semaphore,
    capacity: usize,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Dispatcher {
    /// Create a dispatcher with `capacity` slots (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: Semaphore::new(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of slots currently held by running tasks.
    pub fn in_use(&self) -> usize {
        self.capacity.saturating_sub(self.slots.available_permits())
    }

    /// Stop admitting new tasks. Tasks already holding a slot keep running.
    pub fn close(&self) {
        if !self.slots.is_closed() {
            self.slots.close();
            tracing::info!(in_use = self.in_use(), "Dispatcher closed to new tasks");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.slots.is_closed()
    }

    /// Run `task` once a slot is free, unless `ctx` finishes first.
    ///
    /// A task that loses the race is never started. The slot is released
    /// when execution ends, however it ends.
    pub async fn submit<T: Task>(&self, ctx: &Context, task: &T) -> Result<(), SpinError> {
        if let Some(reason) = ctx.err() {
            return Err(reason.into());
        }

        let _permit = tokio::select! {
            biased;
            reason = ctx.done() => {
                tracing::debug!(reason = %reason, "Task admission abandoned");
                return Err(reason.into());
            }
            permit = self.slots.acquire() => match permit {
                Ok(permit) => permit,
                Err(_closed) => return Err(SpinError::Closed),
            },
        };

        task.execute(ctx).await
    }
}
