//! Error types for task submission and execution.
//!
//! Errors are categorized by where in the task lifecycle they occur, so
//! callers can distinguish admission-time rejections (`QueueFull`,
//! `PoolTerminating`) from execution-time failures (`Aborted`, `TimedOut`,
//! `ExecutionFailed`).

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while submitting or executing a task.
///
/// Admission-time errors (`QueueFull`, `PoolTerminating`) are reported the
/// moment a task is submitted. Execution-time errors surface through the
/// task's result future, after the retry policy has been exhausted.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskError {
    /// The task description is missing or invalid (e.g. a zero batch size).
    #[error("invalid task: {0}")]
    InvalidTask(String),

    /// The executor was busy or terminated when execution was attempted.
    #[error("invalid executor state: {0}")]
    InvalidState(String),

    /// The task's cancellation signal fired.
    #[error("task aborted")]
    Aborted,

    /// The task did not complete within its deadline.
    #[error("task timed out after {0:?}")]
    TimedOut(Duration),

    /// The pending queue was at capacity when the task was submitted.
    #[error("task queue full (capacity {0})")]
    QueueFull(usize),

    /// The task was submitted during or after pool shutdown.
    #[error("pool is terminating")]
    PoolTerminating,

    /// The work unit itself failed (panicked).
    #[error("execution failed: {0}")]
    ExecutionFailed(String),
}

impl TaskError {
    /// Returns true if a retry may succeed (transient failure).
    ///
    /// Timeouts and work-unit failures are retryable; an aborted task stays
    /// aborted, and an executor-state violation will not fix itself by
    /// re-running the same attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ExecutionFailed(_) | Self::TimedOut(_))
    }

    /// Returns true if this error was produced at submission time.
    pub fn is_admission_error(&self) -> bool {
        matches!(
            self,
            Self::QueueFull(_) | Self::PoolTerminating | Self::InvalidTask(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(format!("{}", TaskError::Aborted), "task aborted");
        assert_eq!(
            format!("{}", TaskError::QueueFull(16)),
            "task queue full (capacity 16)"
        );
        assert_eq!(
            format!("{}", TaskError::PoolTerminating),
            "pool is terminating"
        );
        assert_eq!(
            format!("{}", TaskError::ExecutionFailed("boom".to_string())),
            "execution failed: boom"
        );
    }

    #[test]
    fn test_retryable_classification() {
        assert!(TaskError::ExecutionFailed("x".into()).is_retryable());
        assert!(TaskError::TimedOut(Duration::from_secs(1)).is_retryable());
        assert!(!TaskError::Aborted.is_retryable());
        assert!(!TaskError::InvalidState("busy".into()).is_retryable());
        assert!(!TaskError::PoolTerminating.is_retryable());
    }

    #[test]
    fn test_admission_classification() {
        assert!(TaskError::QueueFull(1).is_admission_error());
        assert!(TaskError::PoolTerminating.is_admission_error());
        assert!(TaskError::InvalidTask("no work".into()).is_admission_error());
        assert!(!TaskError::Aborted.is_admission_error());
        assert!(!TaskError::TimedOut(Duration::from_secs(1)).is_admission_error());
    }
}
