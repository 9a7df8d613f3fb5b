//! Batched execution with captured per-task outcomes.
//!
//! `batch` runs tasks in parallel within a batch (batches sequential) and
//! captures every task's outcome side by side instead of aborting the batch
//! on the first failure. `parallel` is `batch` plus "fail if any failed".

use super::{resolve_batch_size, DispatchOptions, Dispatcher};
use crate::error::TaskError;
use crate::executor::{downcast_value, work_fn};
use crate::pool::TaskHandle;
use std::sync::Arc;

/// One unit of work for `batch`/`parallel`, data captured inside.
pub type BatchTask<R> = Arc<dyn Fn() -> R + Send + Sync>;

/// Wraps a closure as a [`BatchTask`].
pub fn batch_task<R, F>(f: F) -> BatchTask<R>
where
    F: Fn() -> R + Send + Sync + 'static,
{
    Arc::new(f)
}

// =============================================================================
// Task Outcome
// =============================================================================

/// Captured outcome of one task in a batch.
///
/// Exactly one of `result` and `error` is populated.
#[derive(Clone, Debug)]
pub struct TaskOutcome<R> {
    /// Whether the task produced a value.
    pub success: bool,

    /// The value, when `success` is true.
    pub result: Option<R>,

    /// The failure message, when `success` is false.
    pub error: Option<String>,
}

impl<R> TaskOutcome<R> {
    fn from_success(result: R) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
        }
    }

    fn from_failure(error: TaskError) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.to_string()),
        }
    }

    /// Returns true if the task produced a value.
    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Converts the outcome back into a `Result`.
    pub fn into_result(self) -> Result<R, TaskError> {
        match (self.result, self.error) {
            (Some(result), _) => Ok(result),
            (None, Some(error)) => Err(TaskError::ExecutionFailed(error)),
            (None, None) => Err(TaskError::ExecutionFailed("missing batch result".into())),
        }
    }
}

impl Dispatcher {
    /// Runs every task, capturing each outcome.
    ///
    /// Tasks within a batch run concurrently; batches run sequentially. A
    /// batch never fails as a whole - individual failures (including
    /// admission rejections) are captured in the corresponding
    /// [`TaskOutcome`]. The only call-level error is a structurally invalid
    /// request (zero batch size).
    pub async fn batch<R>(
        &self,
        tasks: Vec<BatchTask<R>>,
        options: &DispatchOptions,
    ) -> Result<Vec<TaskOutcome<R>>, TaskError>
    where
        R: Send + 'static,
    {
        let batch_size = resolve_batch_size(options.batch_size, tasks.len())?;
        let mut outcomes = Vec::with_capacity(tasks.len());

        for chunk in tasks.chunks(batch_size) {
            let handles: Vec<TaskHandle> = chunk
                .iter()
                .map(|task| {
                    let job = Arc::clone(task);
                    self.pool().submit(
                        work_fn(Arc::new(move |_: ()| (job.as_ref())()), ()),
                        options.task.clone(),
                    )
                })
                .collect();

            for handle in handles {
                match handle.wait().await.and_then(downcast_value::<R>) {
                    Ok(value) => outcomes.push(TaskOutcome::from_success(value)),
                    Err(error) => outcomes.push(TaskOutcome::from_failure(error)),
                }
            }
        }

        Ok(outcomes)
    }

    /// Runs every task and fails if any of them failed.
    ///
    /// On failure the error message concatenates every captured failure.
    pub async fn parallel<R>(
        &self,
        tasks: Vec<BatchTask<R>>,
        options: &DispatchOptions,
    ) -> Result<Vec<R>, TaskError>
    where
        R: Send + 'static,
    {
        let outcomes = self.batch(tasks, options).await?;

        let mut results = Vec::with_capacity(outcomes.len());
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome.into_result() {
                Ok(value) => results.push(value),
                Err(error) => failures.push(error.to_string()),
            }
        }

        if failures.is_empty() {
            Ok(results)
        } else {
            Err(TaskError::ExecutionFailed(failures.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolConfig;
    use crate::pool::PoolManager;

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(PoolManager::new(PoolConfig::new(1, 4)).unwrap())
    }

    #[tokio::test]
    async fn test_batch_captures_mixed_outcomes() {
        let dispatcher = dispatcher();
        let tasks: Vec<BatchTask<u32>> = vec![
            batch_task(|| -> u32 { panic!("deliberate failure") }),
            batch_task(|| 5u32),
        ];

        let outcomes = dispatcher
            .batch(tasks, &DispatchOptions::default())
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 2);
        assert!(!outcomes[0].success);
        assert!(outcomes[0].result.is_none());
        assert!(outcomes[0].error.is_some());
        assert!(outcomes[1].success);
        assert_eq!(outcomes[1].result, Some(5));
        assert!(outcomes[1].error.is_none());
    }

    #[tokio::test]
    async fn test_batch_never_fails_as_a_whole() {
        let dispatcher = dispatcher();
        let tasks: Vec<BatchTask<u32>> = (0..6)
            .map(|i| batch_task(move || -> u32 { panic!("task {} failed", i) }))
            .collect();

        let outcomes = dispatcher
            .batch(tasks, &DispatchOptions::default().with_batch_size(2))
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 6);
        assert!(outcomes.iter().all(|outcome| !outcome.is_success()));
    }

    #[tokio::test]
    async fn test_parallel_succeeds_when_all_succeed() {
        let dispatcher = dispatcher();
        let tasks: Vec<BatchTask<i32>> = (0..5).map(|i| batch_task(move || i * i)).collect();

        let results = dispatcher
            .parallel(tasks, &DispatchOptions::default())
            .await
            .unwrap();
        assert_eq!(results, vec![0, 1, 4, 9, 16]);
    }

    #[tokio::test]
    async fn test_parallel_concatenates_failure_messages() {
        let dispatcher = dispatcher();
        let tasks: Vec<BatchTask<i32>> = vec![
            batch_task(|| 1),
            batch_task(|| -> i32 { panic!("first failure") }),
            batch_task(|| -> i32 { panic!("second failure") }),
        ];

        let error = dispatcher
            .parallel(tasks, &DispatchOptions::default())
            .await
            .unwrap_err();

        match error {
            TaskError::ExecutionFailed(message) => {
                assert!(message.contains("; "), "expected joined messages: {}", message);
            }
            other => panic!("expected ExecutionFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_outcome_into_result() {
        let success = TaskOutcome::from_success(3u8);
        assert_eq!(success.into_result().unwrap(), 3);

        let failure: TaskOutcome<u8> = TaskOutcome::from_failure(TaskError::Aborted);
        assert!(failure.into_result().is_err());
    }
}
