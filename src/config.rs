//! Configuration types for the pool and per-task options.
//!
//! [`PoolConfig`] is set once at pool construction; the executor count is
//! mutable afterwards only through the pool's explicit `resize` operation.
//! [`TaskOptions`] travel with each submitted task.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// =============================================================================
// Configuration Constants
// =============================================================================

/// Default minimum number of executors kept alive.
pub const DEFAULT_MIN_EXECUTORS: usize = 1;

/// Default pending-queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Default idle timeout before an executor above the minimum is reclaimed.
pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 30_000;

/// Fallback CPU count when detection fails.
pub const FALLBACK_EXECUTOR_COUNT: usize = 4;

/// Default batch size for short-circuiting search operations.
///
/// Smaller than the map default (the whole input) so `find`/`some`/`every`
/// can stop early without having submitted every element.
pub const DEFAULT_SEARCH_BATCH_SIZE: usize = 16;

/// Computes the default maximum executor count.
///
/// Scales with the host's available parallelism, matching what the external
/// executors can actually run concurrently.
pub fn default_max_executors() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(FALLBACK_EXECUTOR_COUNT)
}

// =============================================================================
// Priority
// =============================================================================

/// Scheduling priority for a queued task.
///
/// Priority orders the pending queue only; it never preempts a running task.
/// Tasks of equal priority run in submission order.
#[derive(
    Clone, Copy, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Priority {
    /// Background work, scheduled after everything else.
    Low,

    /// Default priority.
    #[default]
    Normal,

    /// Scheduled before normal and low priority tasks.
    High,
}

impl Priority {
    /// Returns the numeric weight used to order the pending queue.
    pub fn weight(&self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Normal => 1,
            Self::High => 2,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "Low"),
            Self::Normal => write!(f, "Normal"),
            Self::High => write!(f, "High"),
        }
    }
}

// =============================================================================
// Scheduling Strategy
// =============================================================================

/// How the pending queue orders tasks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulingStrategy {
    /// Order by descending priority weight, FIFO within a priority band.
    #[default]
    Priority,

    /// Pure insertion order; priorities are ignored.
    Fifo,
}

impl std::fmt::Display for SchedulingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Priority => write!(f, "Priority"),
            Self::Fifo => write!(f, "Fifo"),
        }
    }
}

// =============================================================================
// Pool Configuration
// =============================================================================

/// Configuration for a [`crate::pool::PoolManager`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Minimum executors kept alive while the pool is not terminating.
    pub min_executors: usize,

    /// Maximum executors the pool will ever own at once.
    pub max_executors: usize,

    /// How long an executor above the minimum may sit idle before it is
    /// reclaimed.
    pub idle_timeout: Duration,

    /// Maximum number of queued (not yet running) tasks.
    pub queue_capacity: usize,

    /// Pending-queue ordering strategy.
    pub scheduling_strategy: SchedulingStrategy,

    /// Terminate an executor after a task fails on it (after retries), so the
    /// pool replaces it with a fresh one instead of reusing it.
    pub auto_clean_on_failure: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_executors: DEFAULT_MIN_EXECUTORS,
            max_executors: default_max_executors(),
            idle_timeout: Duration::from_millis(DEFAULT_IDLE_TIMEOUT_MS),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            scheduling_strategy: SchedulingStrategy::default(),
            auto_clean_on_failure: true,
        }
    }
}

impl PoolConfig {
    /// Creates a configuration with the given executor bounds.
    pub fn new(min_executors: usize, max_executors: usize) -> Self {
        Self {
            min_executors,
            max_executors,
            ..Self::default()
        }
    }

    /// Sets the idle timeout for elastic shrink.
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Sets the pending-queue capacity.
    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    /// Sets the scheduling strategy.
    pub fn with_scheduling_strategy(mut self, strategy: SchedulingStrategy) -> Self {
        self.scheduling_strategy = strategy;
        self
    }

    /// Sets whether executors are terminated after a task fails on them.
    pub fn with_auto_clean_on_failure(mut self, auto_clean: bool) -> Self {
        self.auto_clean_on_failure = auto_clean;
        self
    }
}

// =============================================================================
// Per-Task Options
// =============================================================================

/// Options attached to a single submitted task.
#[derive(Clone, Debug, Default)]
pub struct TaskOptions {
    /// Deadline for one execution attempt. `None` means no deadline.
    pub timeout: Option<Duration>,

    /// Cancellation signal. Firing the token stops the caller's wait; it does
    /// not preempt work already running on an executor.
    pub signal: Option<CancellationToken>,

    /// Number of re-attempts after a retryable failure. Zero means a single
    /// attempt.
    pub max_retries: u32,

    /// Queue ordering priority.
    pub priority: Priority,
}

impl TaskOptions {
    /// Creates options with all defaults (no timeout, no signal, no retries,
    /// normal priority).
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-attempt deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Attaches a cancellation signal.
    pub fn with_signal(mut self, signal: CancellationToken) -> Self {
        self.signal = Some(signal);
        self
    }

    /// Sets the retry budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the queue priority.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_weights_are_ordered() {
        assert!(Priority::High.weight() > Priority::Normal.weight());
        assert!(Priority::Normal.weight() > Priority::Low.weight());
    }

    #[test]
    fn test_priority_default_is_normal() {
        assert_eq!(Priority::default(), Priority::Normal);
    }

    #[test]
    fn test_priority_display() {
        assert_eq!(format!("{}", Priority::High), "High");
        assert_eq!(format!("{}", Priority::Low), "Low");
    }

    #[test]
    fn test_pool_config_default() {
        let config = PoolConfig::default();
        assert_eq!(config.min_executors, DEFAULT_MIN_EXECUTORS);
        assert!(config.max_executors >= config.min_executors);
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert_eq!(config.scheduling_strategy, SchedulingStrategy::Priority);
        assert!(config.auto_clean_on_failure);
    }

    #[test]
    fn test_pool_config_builders() {
        let config = PoolConfig::new(2, 8)
            .with_idle_timeout(Duration::from_secs(5))
            .with_queue_capacity(64)
            .with_scheduling_strategy(SchedulingStrategy::Fifo)
            .with_auto_clean_on_failure(false);

        assert_eq!(config.min_executors, 2);
        assert_eq!(config.max_executors, 8);
        assert_eq!(config.idle_timeout, Duration::from_secs(5));
        assert_eq!(config.queue_capacity, 64);
        assert_eq!(config.scheduling_strategy, SchedulingStrategy::Fifo);
        assert!(!config.auto_clean_on_failure);
    }

    #[test]
    fn test_task_options_builders() {
        let signal = CancellationToken::new();
        let options = TaskOptions::new()
            .with_timeout(Duration::from_millis(250))
            .with_signal(signal)
            .with_max_retries(3)
            .with_priority(Priority::High);

        assert_eq!(options.timeout, Some(Duration::from_millis(250)));
        assert!(options.signal.is_some());
        assert_eq!(options.max_retries, 3);
        assert_eq!(options.priority, Priority::High);
    }

    #[test]
    fn test_default_max_executors_is_positive() {
        assert!(default_max_executors() > 0);
    }
}
