//! Worker and pool lifecycle management.
//!
//! This module handles what happens after a task finishes:
//! - releasing the worker back to the idle set (or discarding it)
//! - the deferred idle-timeout check that shrinks the pool elastically
//! - replenishing the pool to its minimum size
//! - graceful, idempotent pool termination

use super::manager::{PoolManager, PoolState};
use super::worker::WorkerId;
use crate::error::TaskError;
use crate::telemetry::PoolEvent;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// How long `terminate()` waits for busy executors to go idle.
pub const TERMINATE_GRACE_PERIOD_MS: u64 = 5_000;

/// Poll interval while waiting out the termination grace period.
pub const TERMINATE_POLL_INTERVAL_MS: u64 = 25;

impl PoolManager {
    /// Returns a worker to the pool after its task resolved.
    ///
    /// The worker goes back to the idle set only if its executor reports
    /// idle; an executor still chewing on abandoned work (or terminated by
    /// auto-clean) is discarded so it can never be handed another task.
    /// Either way the pool is replenished to `min_executors` and draining is
    /// re-triggered, since a freed worker may unblock the next queued task.
    pub(crate) fn release_worker(&self, worker_id: WorkerId) {
        let mut events = Vec::new();
        let mut reaper = None;

        {
            let mut state = self.lock_state();
            let Some(mut worker) = state.busy.remove(&worker_id) else {
                return;
            };

            if self.inner.shutdown.is_cancelled() {
                worker.terminate();
                events.push(PoolEvent::WorkerTerminated {
                    worker_id,
                    reason: "pool terminating".to_string(),
                });
            } else if !worker.is_idle() {
                events.push(PoolEvent::WorkerTerminated {
                    worker_id,
                    reason: "executor not idle on release".to_string(),
                });
                drop(worker);
            } else {
                let epoch = worker.mark_idle();
                state.idle.push(worker);
                reaper = Some((worker_id, epoch));
            }

            if !self.inner.shutdown.is_cancelled() {
                self.replenish_to_min(&mut state, &mut events);
            }
        }

        for event in events {
            self.inner.telemetry.emit(event);
        }
        if let Some((worker_id, epoch)) = reaper {
            self.schedule_idle_reaper(worker_id, epoch);
        }

        self.drain();
    }

    /// Creates workers until the pool is back at `min_executors`.
    fn replenish_to_min(&self, state: &mut PoolState, events: &mut Vec<PoolEvent>) {
        while state.worker_count() < self.inner.config.min_executors {
            match self.create_worker() {
                Ok(worker) => {
                    events.push(PoolEvent::WorkerSpawned {
                        worker_id: worker.id,
                    });
                    state.idle.push(worker);
                }
                Err(spawn_error) => {
                    error!(error = %spawn_error, "Failed to replenish pool to minimum size");
                    events.push(PoolEvent::WorkerSpawnFailed {
                        error: spawn_error.to_string(),
                    });
                    break;
                }
            }
        }
    }

    /// Schedules the deferred idle check for a worker that just went idle.
    fn schedule_idle_reaper(&self, worker_id: WorkerId, epoch: u64) {
        let pool = self.clone();
        let idle_timeout = self.inner.config.idle_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(idle_timeout).await;
            pool.reap_idle_worker(worker_id, epoch);
        });
    }

    /// Reclaims a worker whose idle timeout elapsed.
    ///
    /// Tagged re-check: the worker is only terminated if it is still in the
    /// idle set with the epoch the timer was scheduled for. A worker that
    /// was reassigned and re-idled in between carries a newer epoch and is
    /// left for its own timer.
    pub(crate) fn reap_idle_worker(&self, worker_id: WorkerId, epoch: u64) {
        let reaped = {
            let mut state = self.lock_state();
            if self.inner.shutdown.is_cancelled() {
                return;
            }
            if state.worker_count() <= self.inner.config.min_executors {
                return;
            }
            match state
                .idle
                .iter()
                .position(|worker| worker.id == worker_id && worker.idle_epoch == epoch)
            {
                Some(index) => {
                    let worker = state.idle.remove(index);
                    worker.terminate();
                    true
                }
                None => false,
            }
        };

        if reaped {
            debug!(worker_id = %worker_id, "Idle worker reclaimed");
            self.inner.telemetry.emit(PoolEvent::WorkerTerminated {
                worker_id,
                reason: "idle timeout".to_string(),
            });
        }
    }

    /// Gracefully shuts the pool down. Idempotent.
    ///
    /// Still-queued tasks are resolved with [`TaskError::PoolTerminating`]
    /// (a result, not a panic). Busy executors get a bounded grace period to
    /// go idle; whatever remains is terminated, with its in-flight work
    /// abandoned rather than preempted.
    pub async fn terminate(&self) {
        if self.inner.terminating.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.shutdown.cancel();

        info!("Pool terminating");
        self.inner.telemetry.emit(PoolEvent::PoolTerminating);

        let pending = {
            let mut state = self.lock_state();
            state.queue.drain()
        };
        let pending_count = pending.len();
        for task in pending {
            task.resolve(Err(TaskError::PoolTerminating));
        }

        let idle_ids: Vec<WorkerId> = {
            let mut state = self.lock_state();
            state
                .idle
                .drain(..)
                .map(|worker| {
                    worker.terminate();
                    worker.id
                })
                .collect()
        };
        for worker_id in idle_ids {
            self.inner.telemetry.emit(PoolEvent::WorkerTerminated {
                worker_id,
                reason: "pool terminating".to_string(),
            });
        }

        // Busy executors finish naturally through release_worker; poll until
        // they have or the grace period runs out.
        let deadline = Instant::now() + Duration::from_millis(TERMINATE_GRACE_PERIOD_MS);
        loop {
            let busy = self.lock_state().busy.len();
            if busy == 0 || Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(Duration::from_millis(TERMINATE_POLL_INTERVAL_MS)).await;
        }

        let stragglers: Vec<WorkerId> = {
            let mut state = self.lock_state();
            state
                .busy
                .drain()
                .map(|(worker_id, worker)| {
                    worker.terminate();
                    worker_id
                })
                .collect()
        };
        for worker_id in stragglers {
            self.inner.telemetry.emit(PoolEvent::WorkerTerminated {
                worker_id,
                reason: "termination grace period elapsed".to_string(),
            });
        }

        info!(pending_resolved = pending_count, "Pool terminated");
        self.inner.telemetry.emit(PoolEvent::PoolTerminated);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PoolConfig, TaskOptions};
    use crate::executor::{work_fn, TaskValue, WorkFn, WorkFuture};
    use crate::pool::PoolManager;
    use std::sync::Arc;

    fn sleeping_work(millis: u64) -> WorkFn {
        Arc::new(move || {
            let fut: WorkFuture = Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(millis)).await;
                Ok(Box::new(()) as TaskValue)
            });
            fut
        })
    }

    #[tokio::test]
    async fn test_worker_returns_to_idle_after_task() {
        let pool = PoolManager::new(PoolConfig::new(1, 2)).unwrap();
        pool.execute(|_: ()| (), (), TaskOptions::default())
            .await
            .unwrap();

        // Release runs inside the same spawned task that resolved the
        // result; give it a beat.
        tokio::time::sleep(Duration::from_millis(10)).await;
        let stats = pool.get_stats();
        assert_eq!(stats.active_executors, 0);
        assert_eq!(stats.idle_executors, 1);
    }

    #[tokio::test]
    async fn test_idle_timeout_shrinks_back_to_min() {
        let config = PoolConfig::new(1, 3).with_idle_timeout(Duration::from_millis(40));
        let pool = PoolManager::new(config).unwrap();

        // Force growth to three workers.
        let handles: Vec<_> = (0..3)
            .map(|_| pool.submit(sleeping_work(30), TaskOptions::default()))
            .collect();
        for handle in handles {
            handle.wait().await.unwrap();
        }

        tokio::time::sleep(Duration::from_millis(10)).await;
        let stats = pool.get_stats();
        assert_eq!(stats.idle_executors + stats.active_executors, 3);

        // After the idle timeout fires, only the minimum remains.
        tokio::time::sleep(Duration::from_millis(120)).await;
        let stats = pool.get_stats();
        assert_eq!(stats.idle_executors + stats.active_executors, 1);
    }

    #[tokio::test]
    async fn test_reassigned_worker_survives_stale_reap() {
        let config = PoolConfig::new(1, 2).with_idle_timeout(Duration::from_millis(500));
        let pool = PoolManager::new(config).unwrap();

        pool.execute(|_: ()| (), (), TaskOptions::default())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        // Fire a stale reap by hand: epoch 1 was consumed by the real
        // release; an older epoch must not terminate the worker.
        let worker_id = {
            let state = pool.lock_state();
            state.idle[0].id
        };
        pool.reap_idle_worker(worker_id, 0);

        let stats = pool.get_stats();
        assert_eq!(stats.idle_executors, 1);
    }

    #[tokio::test]
    async fn test_terminate_resolves_queued_tasks() {
        let pool = PoolManager::new(PoolConfig::new(1, 1)).unwrap();

        let blocker = pool.submit(sleeping_work(200), TaskOptions::default());
        let queued = pool.submit(
            work_fn(Arc::new(|_: ()| 1u32), ()),
            TaskOptions::default(),
        );
        assert_eq!(pool.get_stats().queued_tasks, 1);

        pool.terminate().await;

        assert_eq!(
            queued.wait().await.unwrap_err(),
            TaskError::PoolTerminating
        );
        // The in-flight task was given its grace period and finished.
        assert!(blocker.wait().await.is_ok());
    }

    #[tokio::test]
    async fn test_terminate_is_idempotent() {
        let pool = PoolManager::new(PoolConfig::new(1, 1)).unwrap();
        pool.terminate().await;
        pool.terminate().await;
        assert!(pool.is_terminating());
    }

    #[tokio::test]
    async fn test_submit_after_terminate_resolves_pool_terminating() {
        let pool = PoolManager::new(PoolConfig::new(1, 1)).unwrap();
        pool.terminate().await;

        let handle = pool.submit(
            work_fn(Arc::new(|_: ()| 1u32), ()),
            TaskOptions::default(),
        );
        assert_eq!(
            handle.wait().await.unwrap_err(),
            TaskError::PoolTerminating
        );
    }

    #[tokio::test]
    async fn test_terminate_clears_all_workers() {
        let pool = PoolManager::new(PoolConfig::new(2, 4)).unwrap();
        pool.terminate().await;

        let stats = pool.get_stats();
        assert_eq!(stats.idle_executors, 0);
        assert_eq!(stats.active_executors, 0);
    }
}
