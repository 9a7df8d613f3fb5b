//! Per-task execution control.
//!
//! The [`ExecutionController`] wraps exactly one task's run: it validates
//! executor state, races the work against the task's cancellation signal and
//! deadline, applies the bounded sequential retry policy, and records one
//! metrics entry per attempt.
//!
//! Cancellation and timeout are advisory. Losing the race abandons the
//! caller's wait; the executor keeps running the work unit to completion on
//! its own and reports idle again afterwards.

use super::task::Task;
use crate::error::TaskError;
use crate::executor::{Executor, TaskValue};
use crate::metrics::{ExecutionMetrics, MetricsHistory};
use crate::telemetry::{PoolEvent, TelemetrySink};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Wraps a single task execution on one executor.
pub(crate) struct ExecutionController {
    executor: Arc<dyn Executor>,
    telemetry: Arc<dyn TelemetrySink>,
    metrics: Arc<MetricsHistory>,
    auto_clean: bool,
}

impl ExecutionController {
    pub(crate) fn new(
        executor: Arc<dyn Executor>,
        telemetry: Arc<dyn TelemetrySink>,
        metrics: Arc<MetricsHistory>,
        auto_clean: bool,
    ) -> Self {
        Self {
            executor,
            telemetry,
            metrics,
            auto_clean,
        }
    }

    /// Runs the task to a final result, retrying retryable failures until
    /// the task's retry budget is exhausted.
    pub(crate) async fn run(&self, task: &Task) -> Result<TaskValue, TaskError> {
        if !self.executor.is_idle() {
            return Err(TaskError::InvalidState(
                "executor busy or terminated".into(),
            ));
        }

        let max_retries = task.options.max_retries;
        let mut attempt: u32 = 0;

        loop {
            let started_at = Utc::now();
            let clock = Instant::now();
            let result = self.attempt_once(task).await;

            self.metrics.record(ExecutionMetrics {
                started_at,
                finished_at: Utc::now(),
                duration: clock.elapsed(),
                success: result.is_ok(),
                error_message: result.as_ref().err().map(|e| e.to_string()),
            });

            match result {
                Ok(value) => return Ok(value),
                Err(error) if attempt < max_retries && error.is_retryable() => {
                    attempt += 1;
                    tracing::warn!(
                        task_id = %task.id,
                        attempt = attempt,
                        max_retries = max_retries,
                        error = %error,
                        "Task attempt failed, retrying"
                    );
                    self.telemetry.emit(PoolEvent::TaskRetrying {
                        task_id: task.id,
                        attempt,
                        error: error.to_string(),
                    });
                }
                Err(error) => {
                    if self.auto_clean {
                        self.executor.terminate();
                    }
                    return Err(error);
                }
            }
        }
    }

    /// One execution attempt: work vs. abort signal vs. deadline.
    async fn attempt_once(&self, task: &Task) -> Result<TaskValue, TaskError> {
        // A signal that fired before the attempt never reaches the executor.
        if let Some(signal) = &task.options.signal {
            if signal.is_cancelled() {
                return Err(TaskError::Aborted);
            }
        }

        let mut work = self.executor.execute(Arc::clone(&task.work));

        let abort = async {
            match &task.options.signal {
                Some(signal) => signal.cancelled().await,
                None => std::future::pending::<()>().await,
            }
        };

        let deadline = async {
            match task.options.timeout {
                Some(timeout) => {
                    tokio::time::sleep(timeout).await;
                    timeout
                }
                None => std::future::pending::<Duration>().await,
            }
        };

        tokio::select! {
            result = &mut work => result,
            _ = abort => Err(TaskError::Aborted),
            timeout = deadline => Err(TaskError::TimedOut(timeout)),
        }
    }
}
