//! High-level dispatch API.
//!
//! The [`Dispatcher`] builds tasks from collection operations and batches
//! them through the pool: one task per logical unit (or per batch), await
//! results, recombine in input order. It is cheap to clone; clones share the
//! same pool.
//!
//! # Concurrency Model
//!
//! Operations split their input into contiguous chunks of `batch_size`.
//! Tasks within a chunk run concurrently; chunks run sequentially, bounding
//! in-flight work to one chunk's worth of tasks. Output order always matches
//! input order regardless of completion order.
//!
//! # Example
//!
//! ```ignore
//! use taskpool::config::PoolConfig;
//! use taskpool::dispatch::{Dispatcher, DispatchOptions};
//! use taskpool::pool::PoolManager;
//!
//! let pool = PoolManager::new(PoolConfig::default())?;
//! let dispatcher = Dispatcher::new(pool);
//!
//! let options = DispatchOptions::default().with_batch_size(8);
//! let squares = dispatcher.map(vec![1, 2, 3], |x| x * x, &options).await?;
//! ```

mod batch;
mod ops;

pub use batch::{batch_task, BatchTask, TaskOutcome};

use crate::config::TaskOptions;
use crate::error::TaskError;
use crate::metrics::PoolStats;
use crate::pipeline::Pipeline;
use crate::pool::PoolManager;

// =============================================================================
// Dispatch Options
// =============================================================================

/// Options for one dispatch-API call.
#[derive(Clone, Debug, Default)]
pub struct DispatchOptions {
    /// Chunk size for fan-out operations. Defaults to the whole input for
    /// `map`-family calls and to a smaller search batch for
    /// `find`/`some`/`every`.
    pub batch_size: Option<usize>,

    /// Per-task options applied to every task the call submits.
    pub task: TaskOptions,
}

impl DispatchOptions {
    /// Creates options with all defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the chunk size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    /// Sets the per-task options.
    pub fn with_task_options(mut self, task: TaskOptions) -> Self {
        self.task = task;
        self
    }
}

impl From<TaskOptions> for DispatchOptions {
    fn from(task: TaskOptions) -> Self {
        Self {
            batch_size: None,
            task,
        }
    }
}

/// Resolves the effective chunk size for a fan-out call.
pub(crate) fn resolve_batch_size(
    requested: Option<usize>,
    input_len: usize,
) -> Result<usize, TaskError> {
    match requested {
        Some(0) => Err(TaskError::InvalidTask("batch size must be non-zero".into())),
        Some(batch_size) => Ok(batch_size),
        None => Ok(input_len.max(1)),
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Collection-oriented front end over a [`PoolManager`].
///
/// Constructed around an explicitly owned pool; there is no hidden global
/// instance. Clones are cheap and share the pool.
#[derive(Clone)]
pub struct Dispatcher {
    pool: PoolManager,
}

impl Dispatcher {
    /// Wraps a pool in a dispatcher.
    pub fn new(pool: PoolManager) -> Self {
        Self { pool }
    }

    /// Returns the underlying pool.
    pub fn pool(&self) -> &PoolManager {
        &self.pool
    }

    /// Starts a lazy pipeline over a collection.
    ///
    /// Nothing executes until `execute()` is called on the returned handle.
    pub fn pipe<T>(&self, items: Vec<T>) -> Pipeline<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        Pipeline::new(self.clone(), items)
    }

    /// Adjusts the pool's worker count. See [`PoolManager::resize`].
    pub fn resize(&self, new_size: usize) {
        self.pool.resize(new_size);
    }

    /// Returns pool statistics. See [`PoolManager::get_stats`].
    pub fn get_stats(&self) -> PoolStats {
        self.pool.get_stats()
    }

    /// Terminates the pool. See [`PoolManager::terminate`].
    pub async fn terminate(&self) {
        self.pool.terminate().await;
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher").field("pool", &self.pool).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_batch_size_defaults_to_whole_input() {
        assert_eq!(resolve_batch_size(None, 10).unwrap(), 10);
        assert_eq!(resolve_batch_size(None, 0).unwrap(), 1);
    }

    #[test]
    fn test_resolve_batch_size_explicit() {
        assert_eq!(resolve_batch_size(Some(4), 10).unwrap(), 4);
    }

    #[test]
    fn test_resolve_batch_size_zero_is_invalid() {
        assert!(matches!(
            resolve_batch_size(Some(0), 10),
            Err(TaskError::InvalidTask(_))
        ));
    }

    #[test]
    fn test_dispatch_options_builders() {
        let options = DispatchOptions::new()
            .with_batch_size(8)
            .with_task_options(TaskOptions::default().with_max_retries(1));
        assert_eq!(options.batch_size, Some(8));
        assert_eq!(options.task.max_retries, 1);
    }
}
