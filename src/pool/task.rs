//! Task envelope and result handle.
//!
//! A [`Task`] is the immutable description of one queued unit of work plus
//! the sending half of its result channel. The receiving half lives in the
//! [`TaskHandle`] returned to the submitter. A task is owned exclusively by
//! the pool from enqueue to completion and is resolved exactly once.

use crate::config::TaskOptions;
use crate::error::TaskError;
use crate::executor::{TaskValue, WorkFn};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::oneshot;

/// Global counter for generating unique task IDs.
static TASK_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Unique identifier for a submitted task.
#[derive(Clone, Copy, Hash, Eq, PartialEq)]
pub struct TaskId(u64);

impl TaskId {
    /// Returns the next unique task ID.
    pub(crate) fn next() -> Self {
        Self(TASK_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the numeric value of this ID.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TaskId({})", self.0)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// A queued unit of work.
///
/// Immutable once constructed. The pool resolves the task exactly once -
/// either with the work unit's result or with the error that ended it.
pub struct Task {
    /// Unique task identifier.
    pub(crate) id: TaskId,

    /// The re-invocable work unit (argument payload captured inside).
    pub(crate) work: WorkFn,

    /// Per-task options (timeout, signal, retries, priority).
    pub(crate) options: TaskOptions,

    /// When the task was submitted.
    pub(crate) created_at: Instant,

    /// Sending half of the result channel.
    result_tx: oneshot::Sender<Result<TaskValue, TaskError>>,
}

impl Task {
    /// Creates a task envelope and the handle its submitter keeps.
    pub(crate) fn new(work: WorkFn, options: TaskOptions) -> (Self, TaskHandle) {
        let id = TaskId::next();
        let (result_tx, result_rx) = oneshot::channel();
        let task = Self {
            id,
            work,
            options,
            created_at: Instant::now(),
            result_tx,
        };
        (task, TaskHandle { id, result_rx })
    }

    /// Returns the task's unique identifier.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Returns how long the task has existed.
    pub fn age(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }

    /// Resolves the task, consuming it.
    ///
    /// A handle that was dropped simply discards the result.
    pub(crate) fn resolve(self, result: Result<TaskValue, TaskError>) {
        let _ = self.result_tx.send(result);
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("priority", &self.options.priority)
            .field("age", &self.age())
            .finish_non_exhaustive()
    }
}

/// Handle to a submitted task's pending result.
///
/// Returned from submission; await [`TaskHandle::wait`] for the outcome.
pub struct TaskHandle {
    id: TaskId,
    result_rx: oneshot::Receiver<Result<TaskValue, TaskError>>,
}

impl TaskHandle {
    /// Returns the task's unique identifier.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Waits for the task to resolve.
    ///
    /// A pool torn down while the task was pending surfaces as
    /// [`TaskError::PoolTerminating`].
    pub async fn wait(self) -> Result<TaskValue, TaskError> {
        self.result_rx
            .await
            .unwrap_or(Err(TaskError::PoolTerminating))
    }

    /// Creates a handle that is already resolved.
    ///
    /// Used for admission-time rejections so callers always get the same
    /// handle type back, never a panic.
    pub(crate) fn resolved(id: TaskId, result: Result<TaskValue, TaskError>) -> Self {
        let (tx, result_rx) = oneshot::channel();
        let _ = tx.send(result);
        Self { id, result_rx }
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn noop_work() -> WorkFn {
        Arc::new(|| {
            let fut: crate::executor::WorkFuture =
                Box::pin(async { Ok(Box::new(()) as TaskValue) });
            fut
        })
    }

    #[test]
    fn test_task_ids_are_unique() {
        let id1 = TaskId::next();
        let id2 = TaskId::next();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_task_id_display() {
        let id = TaskId(7);
        assert_eq!(format!("{}", id), "task-7");
        assert_eq!(format!("{:?}", id), "TaskId(7)");
    }

    #[tokio::test]
    async fn test_task_resolves_once() {
        let (task, handle) = Task::new(noop_work(), TaskOptions::default());
        let id = task.id();
        assert_eq!(handle.id(), id);

        task.resolve(Ok(Box::new(5u32)));
        let value = handle.wait().await.unwrap();
        assert_eq!(*value.downcast::<u32>().unwrap(), 5);
    }

    #[tokio::test]
    async fn test_dropped_task_surfaces_pool_terminating() {
        let (task, handle) = Task::new(noop_work(), TaskOptions::default());
        drop(task);
        assert_eq!(handle.wait().await.unwrap_err(), TaskError::PoolTerminating);
    }

    #[tokio::test]
    async fn test_resolved_handle() {
        let handle = TaskHandle::resolved(TaskId::next(), Err(TaskError::QueueFull(4)));
        assert_eq!(handle.wait().await.unwrap_err(), TaskError::QueueFull(4));
    }

    #[tokio::test]
    async fn test_dropped_handle_does_not_panic_resolution() {
        let (task, handle) = Task::new(noop_work(), TaskOptions::default());
        drop(handle);
        task.resolve(Ok(Box::new(1u8)));
    }
}
