//! Request-scoped cancellation with an optional deadline.
//!
//! A [`Context`] is handed to every operation that can suspend (reading a
//! request body, waiting for a dispatcher slot, waiting for a child
//! process). Contexts form a tree: cancelling a parent cancels all of its
//! children, and a child's deadline never outlives its parent's.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a [`Context`] finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    /// The context (or one of its ancestors) was cancelled explicitly.
    #[error("context canceled")]
    Canceled,
    /// The context's deadline passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Cancellation token plus an optional deadline.
///
/// Cheap to clone; clones share the same cancellation state.
#[derive(Debug, Clone)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
    /// First observed reason, so `err()` stays stable once set.
    reason: Arc<OnceLock<ContextError>>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// A root context with no deadline.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
            reason: Arc::new(OnceLock::new()),
        }
    }

    /// A child that is cancelled whenever `self` is, sharing its deadline.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
            reason: Arc::new(OnceLock::new()),
        }
    }

    /// A child whose deadline is `timeout` from now (or the parent's
    /// deadline, whichever comes first).
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// A child whose deadline is `deadline` (clamped to the parent's).
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let mut child = self.child();
        child.deadline = Some(match self.deadline {
            Some(parent) => parent.min(deadline),
            None => deadline,
        });
        child
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancel this context and all of its children.
    ///
    /// A context whose deadline has already passed keeps reporting
    /// [`ContextError::DeadlineExceeded`].
    pub fn cancel(&self) {
        if self.err().is_none() {
            let _ = self.reason.set(ContextError::Canceled);
        }
        self.token.cancel();
    }

    /// The reason this context finished, or `None` while it is still live.
    pub fn err(&self) -> Option<ContextError> {
        if let Some(reason) = self.reason.get() {
            return Some(*reason);
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Some(*self.reason.get_or_init(|| ContextError::DeadlineExceeded));
        }
        if self.token.is_cancelled() {
            return Some(*self.reason.get_or_init(|| ContextError::Canceled));
        }
        None
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Resolve once the context is cancelled or its deadline passes.
    pub async fn done(&self) -> ContextError {
        if let Some(reason) = self.err() {
            return reason;
        }

        let reason = match self.deadline {
            Some(deadline) => tokio::select! {
                () = self.token.cancelled() => ContextError::Canceled,
                () = tokio::time::sleep_until(deadline) => ContextError::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                ContextError::Canceled
            }
        };

        *self.reason.get_or_init(|| reason)
    }
}
