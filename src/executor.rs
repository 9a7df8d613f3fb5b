//! Executor contract and production implementation.
//!
//! The pool treats an executor as an opaque capability that runs one work
//! unit at a time and reports idleness. How the capability is implemented
//! (runtime task, OS thread, process) is a collaborator's concern; this
//! module defines the contract and provides the Tokio-backed production
//! implementation.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Pool Manager                            │
//! │                                                              │
//! │  Owns executors through these trait abstractions:           │
//! │  • Executor        - run one work unit, report idleness     │
//! │  • ExecutorFactory - create executors for elastic growth    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Production Implementations                  │
//! │                                                              │
//! │  • TokioExecutor        → Executor                          │
//! │  • TokioExecutorFactory → ExecutorFactory                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use crate::error::TaskError;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;

// ============================================================================
// Work Unit Types
// ============================================================================

/// The type-erased value a work unit produces.
pub type TaskValue = Box<dyn Any + Send>;

/// A pinned, boxed future resolving to a work unit's result.
pub type WorkFuture = Pin<Box<dyn Future<Output = Result<TaskValue, TaskError>> + Send>>;

/// A re-invocable unit of work.
///
/// The closure captures its argument payload, so the retry policy can
/// produce a fresh execution of the same task by calling it again.
pub type WorkFn = Arc<dyn Fn() -> WorkFuture + Send + Sync>;

/// Builds a [`WorkFn`] from a plain function and its argument.
///
/// The argument is cloned into every invocation so retries re-run against
/// the original payload. The function runs via `spawn_blocking` so
/// compute-heavy work never stalls the async runtime; a panicking function
/// surfaces as [`TaskError::ExecutionFailed`].
pub(crate) fn work_fn<A, R, F>(f: Arc<F>, arg: A) -> WorkFn
where
    F: Fn(A) -> R + Send + Sync + 'static + ?Sized,
    A: Clone + Send + Sync + 'static,
    R: Send + 'static,
{
    Arc::new(move || {
        let f = Arc::clone(&f);
        let arg = arg.clone();
        let fut: WorkFuture = Box::pin(async move {
            match tokio::task::spawn_blocking(move || (f.as_ref())(arg)).await {
                Ok(value) => Ok(Box::new(value) as TaskValue),
                Err(join_error) => Err(TaskError::ExecutionFailed(join_error.to_string())),
            }
        });
        fut
    })
}

/// Recovers the concrete result type from a type-erased task value.
pub(crate) fn downcast_value<R: 'static>(value: TaskValue) -> Result<R, TaskError> {
    value
        .downcast::<R>()
        .map(|boxed| *boxed)
        .map_err(|_| TaskError::ExecutionFailed("task produced an unexpected result type".into()))
}

// ============================================================================
// Executor Trait
// ============================================================================

/// An opaque unit capable of running one work unit at a time.
///
/// Implementations must flag themselves busy for the duration of a work unit
/// and idle again once it finishes, even when the caller stops waiting on the
/// returned future (advisory cancellation abandons the wait, not the work).
pub trait Executor: Send + Sync + 'static {
    /// Runs one work unit and returns a future resolving to its result.
    ///
    /// Calling this while the executor is busy or terminated resolves with
    /// [`TaskError::InvalidState`].
    fn execute(&self, work: WorkFn) -> WorkFuture;

    /// Returns true if the executor is neither running a work unit nor
    /// terminated.
    fn is_idle(&self) -> bool;

    /// Shuts the executor down. Work already running is not preempted, but
    /// no further work will be accepted.
    fn terminate(&self);
}

// ============================================================================
// Executor Factory Trait
// ============================================================================

/// Creates executors for the pool's elastic growth.
///
/// The factory is called while the pool schedules, so `create` should be
/// cheap; expensive setup belongs inside the executor's first execution.
pub trait ExecutorFactory: Send + Sync + 'static {
    /// Creates a fresh, idle executor.
    fn create(&self) -> Result<Arc<dyn Executor>, SpawnError>;
}

/// Errors from executor creation.
#[derive(Debug, Clone)]
pub struct SpawnError {
    /// Human-readable error message.
    pub message: String,
}

impl SpawnError {
    /// Creates a new spawn error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for SpawnError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for SpawnError {}

// ============================================================================
// Tokio Executor Implementation
// ============================================================================

/// Tokio-backed executor.
///
/// Work units run on a detached runtime task. If the caller stops waiting
/// (timeout or abort race lost), the work keeps running to completion and the
/// executor flips back to idle on its own - nothing is preempted.
///
/// A panicking work unit is caught and reported as
/// [`TaskError::ExecutionFailed`].
pub struct TokioExecutor {
    busy: Arc<AtomicBool>,
    terminated: AtomicBool,
}

impl TokioExecutor {
    /// Creates a new idle executor.
    pub fn new() -> Self {
        Self {
            busy: Arc::new(AtomicBool::new(false)),
            terminated: AtomicBool::new(false),
        }
    }
}

impl Default for TokioExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor for TokioExecutor {
    fn execute(&self, work: WorkFn) -> WorkFuture {
        if self.terminated.load(Ordering::Acquire) {
            return Box::pin(std::future::ready(Err(TaskError::InvalidState(
                "executor terminated".into(),
            ))));
        }
        if self.busy.swap(true, Ordering::AcqRel) {
            return Box::pin(std::future::ready(Err(TaskError::InvalidState(
                "executor already running a task".into(),
            ))));
        }

        let busy = Arc::clone(&self.busy);
        let (result_tx, result_rx) = oneshot::channel();

        tokio::spawn(async move {
            // The work closure is invoked inside the guarded future so a
            // panic while producing the future is caught too.
            let guarded = std::panic::AssertUnwindSafe(async move { (work.as_ref())().await });
            let result = guarded.catch_unwind().await.unwrap_or_else(|payload| {
                Err(TaskError::ExecutionFailed(panic_message(payload)))
            });
            busy.store(false, Ordering::Release);
            let _ = result_tx.send(result);
        });

        Box::pin(async move {
            result_rx.await.unwrap_or_else(|_| {
                Err(TaskError::ExecutionFailed(
                    "executor task dropped before completion".into(),
                ))
            })
        })
    }

    fn is_idle(&self) -> bool {
        !self.busy.load(Ordering::Acquire) && !self.terminated.load(Ordering::Acquire)
    }

    fn terminate(&self) {
        self.terminated.store(true, Ordering::Release);
    }
}

impl std::fmt::Debug for TokioExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokioExecutor")
            .field("busy", &self.busy.load(Ordering::Relaxed))
            .field("terminated", &self.terminated.load(Ordering::Relaxed))
            .finish()
    }
}

/// Extracts a printable message from a panic payload.
fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "work unit panicked".to_string()
    }
}

/// Factory producing [`TokioExecutor`] instances.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioExecutorFactory;

impl TokioExecutorFactory {
    /// Creates a new factory.
    pub fn new() -> Self {
        Self
    }
}

impl ExecutorFactory for TokioExecutorFactory {
    fn create(&self) -> Result<Arc<dyn Executor>, SpawnError> {
        Ok(Arc::new(TokioExecutor::new()))
    }
}
