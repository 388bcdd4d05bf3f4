//! One invocation of the external compositing executable.
//!
//! The executable's contract is purely positional:
//!
//! ```text
//! binary width height frameCount frameDelay crop reverse flatten background input output
//! ```
//!
//! Integers are decimal, flags are `0`/`1`, and exit code 0 means the output
//! file now exists. Anything else is a failure whose diagnostics are on the
//! combined stdout/stderr.

use std::any::Any;
use std::ffi::OsString;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use futures::FutureExt;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use crate::context::Context;
use crate::error::SpinError;
use crate::options::CompositeOptions;

/// Cap on combined stdout/stderr kept in memory per run (64 KiB).
///
/// Output beyond this is still drained so the child never blocks on a full
/// pipe, but it is discarded.
pub const MAX_OUTPUT_BYTES: usize = 64 * 1024;

/// Cap on the diagnostic text carried in a [`SpinError::Failed`].
pub const MAX_DIAGNOSTIC_CHARS: usize = 1024;

/// Unit of work gated by the [`Dispatcher`](crate::dispatch::Dispatcher).
pub trait Task: Send + Sync {
    /// Run to completion, failure, or cancellation of `ctx`.
    fn execute(&self, ctx: &Context) -> impl Future<Output = Result<(), SpinError>> + Send;
}

/// Everything needed to run the compositing executable once.
#[derive(Debug, Clone)]
pub struct CompositeTask {
    pub options: CompositeOptions,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub binary_path: PathBuf,
}

impl CompositeTask {
    /// The positional argument vector passed to the executable.
    pub fn args(&self) -> Vec<OsString> {
        let opts = &self.options;
        let flag = |value: bool| OsString::from(if value { "1" } else { "0" });

        vec![
            opts.width.to_string().into(),
            opts.height.to_string().into(),
            opts.frame_count.to_string().into(),
            opts.frame_delay.to_string().into(),
            flag(opts.flag_crop),
            flag(opts.flag_reverse),
            flag(opts.flag_flatten),
            opts.background.to_string().into(),
            self.input_path.clone().into_os_string(),
            self.output_path.clone().into_os_string(),
        ]
    }

    async fn run(&self, ctx: &Context) -> Result<(), SpinError> {
        // A context that is already done never gets a process.
        if let Some(reason) = ctx.err() {
            return Err(reason.into());
        }

        let mut command = Command::new(&self.binary_path);
        command
            .args(self.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let started = Instant::now();
        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) => {
                if let Some(reason) = ctx.err() {
                    return Err(reason.into());
                }
                tracing::error!(
                    binary = %self.binary_path.display(),
                    error = %err,
                    "Failed to start compositing process",
                );
                return Err(SpinError::Start(err));
            }
        };

        tracing::debug!(
            pid = child.id(),
            output = %self.output_path.display(),
            "Compositing process started",
        );

        let output = OutputBuffer::default();
        let mut readers = [
            tokio::spawn(output.clone().capture(child.stdout.take())),
            tokio::spawn(output.clone().capture(child.stderr.take())),
        ];

        let outcome = tokio::select! {
            status = child.wait() => Ok(status),
            reason = ctx.done() => Err(reason),
        };

        let status = match outcome {
            Ok(Ok(status)) => status,
            Ok(Err(err)) => {
                if let Some(reason) = ctx.err() {
                    return Err(reason.into());
                }
                return Err(SpinError::Wait(err));
            }
            Err(reason) => {
                // Kill and reap before reporting so no child outlives its request.
                if let Err(err) = child.kill().await {
                    tracing::warn!(error = %err, "Failed to kill compositing process");
                }
                for reader in &readers {
                    reader.abort();
                }
                tracing::warn!(
                    reason = %reason,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Compositing process killed",
                );
                return Err(reason.into());
            }
        };

        // The pipes close when the child exits; don't let a stray grandchild
        // holding them open stall the request past its context.
        tokio::select! {
            _ = futures::future::join_all(readers.iter_mut()) => {}
            reason = ctx.done() => {
                for reader in &readers {
                    reader.abort();
                }
                tracing::debug!(reason = %reason, "Abandoned output capture");
            }
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;

        if !status.success() {
            if let Some(reason) = ctx.err() {
                return Err(reason.into());
            }
            let output = output.diagnostic();
            tracing::warn!(
                exit_code = status.code(),
                elapsed_ms,
                output = %output,
                "Compositing process failed",
            );
            return Err(SpinError::Failed { status, output });
        }

        tracing::info!(
            elapsed_ms,
            output = %self.output_path.display(),
            "Compositing process finished",
        );

        match ctx.err() {
            Some(reason) => Err(reason.into()),
            None => Ok(()),
        }
    }
}

impl Task for CompositeTask {
    async fn execute(&self, ctx: &Context) -> Result<(), SpinError> {
        contain_panics(self.run(ctx)).await
    }
}

/// Run `fut`, turning a panic inside it into [`SpinError::Panicked`].
pub async fn contain_panics<F>(fut: F) -> Result<(), SpinError>
where
    F: Future<Output = Result<(), SpinError>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::error!(panic = %message, "Task panicked");
            Err(SpinError::Panicked(message))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

// ---------------------------------------------------------------------------
// Output capture
// ---------------------------------------------------------------------------

/// Combined stdout/stderr of one run, shared by both reader tasks.
#[derive(Debug, Clone, Default)]
struct OutputBuffer(Arc<Mutex<Vec<u8>>>);

impl OutputBuffer {
    async fn capture<R: AsyncRead + Unpin>(self, stream: Option<R>) {
        let Some(mut stream) = stream else {
            return;
        };
        let mut chunk = [0u8; 4096];
        loop {
            match stream.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => self.append(&chunk[..n]),
            }
        }
    }

    fn append(&self, bytes: &[u8]) {
        let mut buf = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        let room = MAX_OUTPUT_BYTES.saturating_sub(buf.len());
        buf.extend_from_slice(&bytes[..bytes.len().min(room)]);
    }

    /// Trimmed, lossily decoded output capped at [`MAX_DIAGNOSTIC_CHARS`].
    fn diagnostic(&self) -> String {
        let buf = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buf)
            .trim()
            .chars()
            .take(MAX_DIAGNOSTIC_CHARS)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
