//! Pool manager core - struct, admission, and queue draining.
//!
//! This module contains the [`PoolManager`] struct, task admission
//! (`submit`/`execute`), the drain loop that assigns queued tasks to
//! executors, `resize`, and `get_stats`. Worker release, elastic shrink, and
//! termination are implemented in the sibling `lifecycle` module.

use super::controller::ExecutionController;
use super::queue::TaskQueue;
use super::task::{Task, TaskHandle};
use super::worker::{WorkerId, WorkerRecord};
use crate::config::{PoolConfig, TaskOptions};
use crate::error::TaskError;
use crate::executor::{
    downcast_value, work_fn, Executor, ExecutorFactory, SpawnError, TokioExecutorFactory, WorkFn,
};
use crate::metrics::{MetricsHistory, PoolStats};
use crate::telemetry::{NullTelemetrySink, PoolEvent, TelemetrySink};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

// =============================================================================
// Pool State
// =============================================================================

/// Mutable pool state, guarded by a single mutex.
///
/// The queue and the idle/busy sets are the pool's only shared mutable
/// state. The guard is never held across an await point.
pub(super) struct PoolState {
    /// Pending tasks, scheduling order.
    pub(super) queue: TaskQueue,

    /// Workers available for assignment.
    pub(super) idle: Vec<WorkerRecord>,

    /// Workers currently running a task, by ID.
    pub(super) busy: HashMap<WorkerId, WorkerRecord>,
}

impl PoolState {
    /// Total workers currently owned by the pool.
    pub(super) fn worker_count(&self) -> usize {
        self.idle.len() + self.busy.len()
    }
}

pub(super) struct PoolInner {
    pub(super) config: PoolConfig,
    pub(super) state: Mutex<PoolState>,
    pub(super) factory: Arc<dyn ExecutorFactory>,
    pub(super) telemetry: Arc<dyn TelemetrySink>,
    pub(super) metrics: Arc<MetricsHistory>,
    pub(super) shutdown: CancellationToken,
    pub(super) terminating: AtomicBool,
    pub(super) completed_tasks: AtomicU64,
    pub(super) next_worker_id: AtomicU64,
}

// =============================================================================
// Pool Manager
// =============================================================================

/// The executor pool: admission, scheduling, elastic sizing, termination.
///
/// Construct one explicitly and share it by cloning (clones refer to the same
/// pool). There is no process-wide instance; the owner decides the lifetime
/// and calls [`PoolManager::terminate`] when done.
///
/// All scheduling state lives behind one mutex with short critical sections,
/// so `submit`, `resize`, and `get_stats` may be called concurrently from any
/// task or thread. The pool must be used within a Tokio runtime.
#[derive(Clone)]
pub struct PoolManager {
    pub(super) inner: Arc<PoolInner>,
}

impl PoolManager {
    /// Creates a pool with the default executor factory and no telemetry.
    ///
    /// Fails if the factory cannot produce the initial `min_executors`.
    pub fn new(config: PoolConfig) -> Result<Self, SpawnError> {
        Self::with_factory(config, Arc::new(TokioExecutorFactory::new()))
    }

    /// Creates a pool with a custom executor factory.
    pub fn with_factory(
        config: PoolConfig,
        factory: Arc<dyn ExecutorFactory>,
    ) -> Result<Self, SpawnError> {
        Self::with_telemetry(config, factory, Arc::new(NullTelemetrySink))
    }

    /// Creates a pool with a custom executor factory and telemetry sink.
    ///
    /// # Panics
    ///
    /// Panics if `max_executors` is zero or `min_executors` exceeds
    /// `max_executors`.
    pub fn with_telemetry(
        config: PoolConfig,
        factory: Arc<dyn ExecutorFactory>,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Result<Self, SpawnError> {
        assert!(config.max_executors > 0, "max_executors must be > 0");
        assert!(
            config.min_executors <= config.max_executors,
            "min_executors must not exceed max_executors"
        );

        let queue = TaskQueue::new(config.queue_capacity, config.scheduling_strategy);
        let pool = Self {
            inner: Arc::new(PoolInner {
                config,
                state: Mutex::new(PoolState {
                    queue,
                    idle: Vec::new(),
                    busy: HashMap::new(),
                }),
                factory,
                telemetry,
                metrics: Arc::new(MetricsHistory::default()),
                shutdown: CancellationToken::new(),
                terminating: AtomicBool::new(false),
                completed_tasks: AtomicU64::new(0),
                next_worker_id: AtomicU64::new(0),
            }),
        };

        for _ in 0..pool.inner.config.min_executors {
            let worker = pool.create_worker()?;
            pool.inner
                .telemetry
                .emit(PoolEvent::WorkerSpawned { worker_id: worker.id });
            pool.lock_state().idle.push(worker);
        }

        Ok(pool)
    }

    /// Submits a type-erased work unit.
    ///
    /// Admission outcomes (`Aborted` for a pre-fired signal,
    /// `PoolTerminating`, `QueueFull`) come back through the handle already
    /// resolved; the caller's control flow is never broken by submission.
    pub fn submit(&self, work: WorkFn, options: TaskOptions) -> TaskHandle {
        let (task, handle) = Task::new(work, options);
        let task_id = task.id();

        // An already-fired signal never reaches an executor.
        if let Some(signal) = &task.options.signal {
            if signal.is_cancelled() {
                self.reject(task, TaskError::Aborted, "signal already aborted");
                return handle;
            }
        }

        if self.inner.shutdown.is_cancelled() {
            self.reject(task, TaskError::PoolTerminating, "pool terminating");
            return handle;
        }

        let (priority, queue_depth) = {
            let mut state = self.lock_state();
            if state.queue.is_full() {
                let capacity = state.queue.capacity();
                drop(state);
                self.reject(task, TaskError::QueueFull(capacity), "queue full");
                return handle;
            }
            let priority = task.options.priority;
            state.queue.push(task);
            (priority, state.queue.len())
        };

        debug!(
            task_id = %task_id,
            priority = %priority,
            queue_depth = queue_depth,
            "Task enqueued"
        );
        self.inner.telemetry.emit(PoolEvent::TaskEnqueued {
            task_id,
            priority,
            queue_depth,
        });

        self.drain();
        handle
    }

    /// Runs one typed work function on the pool and awaits its result.
    ///
    /// The argument is cloned into every retry attempt, so retries always
    /// re-run against the original payload.
    pub async fn execute<A, R, F>(
        &self,
        f: F,
        arg: A,
        options: TaskOptions,
    ) -> Result<R, TaskError>
    where
        F: Fn(A) -> R + Send + Sync + 'static,
        A: Clone + Send + Sync + 'static,
        R: Send + 'static,
    {
        let work = work_fn(Arc::new(f), arg);
        let value = self.submit(work, options).wait().await?;
        downcast_value(value)
    }

    /// Resolves a task at admission time and emits the rejection.
    fn reject(&self, task: Task, error: TaskError, reason: &str) {
        let task_id = task.id();
        warn!(task_id = %task_id, reason = reason, "Task rejected");
        self.inner.telemetry.emit(PoolEvent::TaskRejected {
            task_id,
            reason: reason.to_string(),
        });
        task.resolve(Err(error));
    }

    // =========================================================================
    // Queue Draining
    // =========================================================================

    /// Assigns queued tasks to executors until the queue is empty or no
    /// executor is available.
    ///
    /// Idle workers are preferred; a new one is created only below
    /// `max_executors`. A creation failure leaves the task queued for the
    /// next drain pass.
    pub(crate) fn drain(&self) {
        loop {
            if self.inner.shutdown.is_cancelled() {
                return;
            }

            let step = {
                let mut state = self.lock_state();
                if state.queue.is_empty() {
                    DrainStep::Stop
                } else {
                    match self.acquire_worker(&mut state) {
                        Ok(Some((worker, newly_spawned))) => {
                            let task = state.queue.pop().expect("queue is non-empty");
                            let executor = Arc::clone(&worker.executor);
                            let worker_id = worker.id;
                            state.busy.insert(worker_id, worker);
                            DrainStep::Dispatch {
                                task,
                                executor,
                                worker_id,
                                newly_spawned,
                            }
                        }
                        Ok(None) => DrainStep::Stop,
                        Err(error) => DrainStep::SpawnFailed(error),
                    }
                }
            };

            match step {
                DrainStep::Stop => return,
                DrainStep::SpawnFailed(error) => {
                    error!(error = %error, "Executor creation failed; leaving task queued");
                    self.inner.telemetry.emit(PoolEvent::WorkerSpawnFailed {
                        error: error.to_string(),
                    });
                    return;
                }
                DrainStep::Dispatch {
                    task,
                    executor,
                    worker_id,
                    newly_spawned,
                } => {
                    if newly_spawned {
                        self.inner
                            .telemetry
                            .emit(PoolEvent::WorkerSpawned { worker_id });
                    }
                    debug!(task_id = %task.id(), worker_id = %worker_id, "Task dispatched");
                    self.inner.telemetry.emit(PoolEvent::TaskStarted {
                        task_id: task.id(),
                        worker_id,
                    });
                    self.spawn_execution(task, executor, worker_id);
                }
            }
        }
    }

    /// Picks an idle worker, or creates one if the pool is under capacity.
    ///
    /// Returns `Ok(None)` when the pool is saturated (no executor available).
    fn acquire_worker(
        &self,
        state: &mut PoolState,
    ) -> Result<Option<(WorkerRecord, bool)>, SpawnError> {
        if let Some(worker) = state.idle.pop() {
            return Ok(Some((worker, false)));
        }
        if state.worker_count() >= self.inner.config.max_executors {
            return Ok(None);
        }
        self.create_worker().map(|worker| Some((worker, true)))
    }

    /// Runs one dispatched task on a detached runtime task.
    fn spawn_execution(&self, task: Task, executor: Arc<dyn Executor>, worker_id: WorkerId) {
        let pool = self.clone();
        tokio::spawn(async move {
            let controller = ExecutionController::new(
                executor,
                Arc::clone(&pool.inner.telemetry),
                Arc::clone(&pool.inner.metrics),
                pool.inner.config.auto_clean_on_failure,
            );

            let task_id = task.id();
            let clock = Instant::now();
            let result = controller.run(&task).await;
            let success = result.is_ok();

            pool.inner.completed_tasks.fetch_add(1, Ordering::Relaxed);
            pool.inner.telemetry.emit(PoolEvent::TaskCompleted {
                task_id,
                success,
                duration: clock.elapsed(),
            });

            task.resolve(result);
            pool.release_worker(worker_id);
        });
    }

    /// Creates a fresh worker record via the factory.
    pub(super) fn create_worker(&self) -> Result<WorkerRecord, SpawnError> {
        let executor = self.inner.factory.create()?;
        let id = WorkerId::new(self.inner.next_worker_id.fetch_add(1, Ordering::Relaxed));
        Ok(WorkerRecord::new(id, executor))
    }

    // =========================================================================
    // Resize and Stats
    // =========================================================================

    /// Adjusts the current worker count, clamped to
    /// `[min_executors, max_executors]`.
    ///
    /// Growth adds idle workers; shrink terminates idle workers only - a
    /// busy executor is never force-killed, so the pool may stay above the
    /// target until running tasks finish.
    pub fn resize(&self, new_size: usize) {
        if self.inner.shutdown.is_cancelled() {
            warn!("Resize ignored: pool is terminating");
            return;
        }

        let target = new_size.clamp(
            self.inner.config.min_executors,
            self.inner.config.max_executors,
        );

        let mut spawned = Vec::new();
        let mut terminated = Vec::new();
        let mut spawn_error = None;

        let (from, to) = {
            let mut state = self.lock_state();
            let from = state.worker_count();
            if target > from {
                for _ in from..target {
                    match self.create_worker() {
                        Ok(worker) => {
                            spawned.push(worker.id);
                            state.idle.push(worker);
                        }
                        Err(error) => {
                            spawn_error = Some(error);
                            break;
                        }
                    }
                }
            } else {
                while state.worker_count() > target {
                    let Some(worker) = state.idle.pop() else {
                        break;
                    };
                    worker.terminate();
                    terminated.push(worker.id);
                }
            }
            (from, state.worker_count())
        };

        for worker_id in spawned {
            self.inner
                .telemetry
                .emit(PoolEvent::WorkerSpawned { worker_id });
        }
        for worker_id in terminated {
            self.inner.telemetry.emit(PoolEvent::WorkerTerminated {
                worker_id,
                reason: "pool resized".to_string(),
            });
        }
        if let Some(error) = spawn_error {
            error!(error = %error, "Executor creation failed during resize");
            self.inner.telemetry.emit(PoolEvent::WorkerSpawnFailed {
                error: error.to_string(),
            });
        }

        tracing::info!(from = from, to = to, "Pool resized");
        self.inner.telemetry.emit(PoolEvent::PoolResized { from, to });

        self.drain();
    }

    /// Returns a point-in-time snapshot of pool statistics.
    pub fn get_stats(&self) -> PoolStats {
        let state = self.lock_state();
        PoolStats {
            active_executors: state.busy.len(),
            idle_executors: state.idle.len(),
            queued_tasks: state.queue.len(),
            completed_tasks: self.inner.completed_tasks.load(Ordering::Relaxed),
            average_execution_time: self.inner.metrics.average_duration(),
        }
    }

    /// Returns the execution metrics history.
    pub fn metrics(&self) -> Arc<MetricsHistory> {
        Arc::clone(&self.inner.metrics)
    }

    /// Returns the pool configuration.
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Returns true once termination has begun.
    pub fn is_terminating(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// Locks the pool state, recovering from a poisoned lock.
    pub(super) fn lock_state(&self) -> MutexGuard<'_, PoolState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for PoolManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock_state();
        f.debug_struct("PoolManager")
            .field("idle", &state.idle.len())
            .field("busy", &state.busy.len())
            .field("queued", &state.queue.len())
            .field("terminating", &self.is_terminating())
            .finish()
    }
}

/// Outcome of one drain iteration, computed under the state lock.
enum DrainStep {
    /// Queue empty or pool saturated; stop draining.
    Stop,
    /// Executor creation failed; the task stays queued.
    SpawnFailed(SpawnError),
    /// A task was paired with a worker.
    Dispatch {
        task: Task,
        executor: Arc<dyn Executor>,
        worker_id: WorkerId,
        newly_spawned: bool,
    },
}
