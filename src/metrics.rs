//! Execution metrics and pool statistics.
//!
//! Every completed execution attempt is appended to a bounded ring buffer,
//! oldest entry evicted first. The history backs the pool's
//! `average_execution_time` stat and can be snapshotted by hosts for
//! reporting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// Maximum retained execution records.
pub const DEFAULT_METRICS_CAPACITY: usize = 100;

// =============================================================================
// Execution Metrics
// =============================================================================

/// Record of one execution attempt.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExecutionMetrics {
    /// Wall-clock time the attempt started.
    pub started_at: DateTime<Utc>,

    /// Wall-clock time the attempt finished.
    pub finished_at: DateTime<Utc>,

    /// Elapsed execution time.
    pub duration: Duration,

    /// Whether the attempt produced a value.
    pub success: bool,

    /// Failure message when `success` is false.
    pub error_message: Option<String>,
}

// =============================================================================
// Metrics History
// =============================================================================

/// Bounded ring buffer of execution records.
///
/// Appends evict the oldest entry once the capacity is reached. All methods
/// take `&self`; the buffer is internally synchronized.
pub struct MetricsHistory {
    entries: Mutex<VecDeque<ExecutionMetrics>>,
    capacity: usize,
}

impl MetricsHistory {
    /// Creates a history bounded to `capacity` entries.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be > 0");
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Appends a record, evicting the oldest entry when full.
    pub fn record(&self, metrics: ExecutionMetrics) {
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(metrics);
    }

    /// Returns a copy of the retained records, oldest first.
    pub fn snapshot(&self) -> Vec<ExecutionMetrics> {
        self.entries
            .lock()
            .map(|entries| entries.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns the number of retained records.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    /// Returns true if no records are retained.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the maximum number of retained records.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Mean duration across retained records, `Duration::ZERO` when empty.
    pub fn average_duration(&self) -> Duration {
        let Ok(entries) = self.entries.lock() else {
            return Duration::ZERO;
        };
        if entries.is_empty() {
            return Duration::ZERO;
        }
        let total: Duration = entries.iter().map(|m| m.duration).sum();
        total / entries.len() as u32
    }
}

impl Default for MetricsHistory {
    fn default() -> Self {
        Self::new(DEFAULT_METRICS_CAPACITY)
    }
}

impl std::fmt::Debug for MetricsHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsHistory")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

// =============================================================================
// Pool Statistics
// =============================================================================

/// Point-in-time pool statistics.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Executors currently running a task.
    pub active_executors: usize,

    /// Executors waiting for work.
    pub idle_executors: usize,

    /// Tasks admitted but not yet assigned to an executor.
    pub queued_tasks: usize,

    /// Tasks resolved since the pool was created (success or failure).
    pub completed_tasks: u64,

    /// Mean execution time over the retained metrics window.
    pub average_execution_time: Duration,
}
