//! Worker records.
//!
//! A [`WorkerRecord`] is the pool's bookkeeping entry for one executor: the
//! executor capability itself plus the lifecycle data the pool needs for
//! elastic shrink. The pool is the sole owner; an executor never outlives
//! its pool's `terminate()`.

use crate::executor::Executor;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Unique identifier for a pool worker.
#[derive(Clone, Copy, Hash, Eq, PartialEq)]
pub struct WorkerId(u64);

impl WorkerId {
    pub(crate) fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the numeric value of this ID.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WorkerId({})", self.0)
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// Pool-side record of one executor.
///
/// The idle epoch is bumped every time the worker returns to the idle set.
/// The deferred idle-timeout check captures the epoch when it is scheduled
/// and only reclaims the worker if the epoch still matches - a worker that
/// was reassigned in between is left alone.
pub struct WorkerRecord {
    /// Unique worker identifier.
    pub(crate) id: WorkerId,

    /// The executor capability.
    pub(crate) executor: Arc<dyn Executor>,

    /// Incremented on every return to the idle set.
    pub(crate) idle_epoch: u64,

    /// When the worker last became idle.
    pub(crate) idle_since: Instant,
}

impl WorkerRecord {
    /// Creates a record for a freshly spawned executor.
    pub(crate) fn new(id: WorkerId, executor: Arc<dyn Executor>) -> Self {
        Self {
            id,
            executor,
            idle_epoch: 0,
            idle_since: Instant::now(),
        }
    }

    /// Returns the worker's unique identifier.
    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Returns true if the underlying executor can accept work.
    pub fn is_idle(&self) -> bool {
        self.executor.is_idle()
    }

    /// Marks the worker idle, bumping the epoch for the deferred reaper.
    pub(crate) fn mark_idle(&mut self) -> u64 {
        self.idle_epoch += 1;
        self.idle_since = Instant::now();
        self.idle_epoch
    }

    /// Terminates the underlying executor.
    pub(crate) fn terminate(&self) {
        self.executor.terminate();
    }
}

impl fmt::Debug for WorkerRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerRecord")
            .field("id", &self.id)
            .field("idle", &self.is_idle())
            .field("idle_epoch", &self.idle_epoch)
            .field("idle_for", &self.idle_since.elapsed())
            .finish()
    }
}
