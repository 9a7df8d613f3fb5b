//! Telemetry for pool observability.
//!
//! The pool emits structured events via a sink abstraction and doesn't know
//! how events are consumed—this follows the "emit, don't present" pattern.
//! Consumers (logging, metrics aggregation, UI) decide how to present or
//! aggregate them.
//!
//! # Example
//!
//! ```ignore
//! use taskpool::telemetry::{PoolEvent, TelemetrySink};
//!
//! struct LoggingSink;
//!
//! impl TelemetrySink for LoggingSink {
//!     fn emit(&self, event: PoolEvent) {
//!         tracing::info!(?event, "Pool event");
//!     }
//! }
//! ```

use crate::config::Priority;
use crate::pool::{TaskId, WorkerId};
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// Telemetry Events
// =============================================================================

/// Events emitted during pool and task lifecycle.
#[derive(Clone, Debug)]
pub enum PoolEvent {
    // -------------------------------------------------------------------------
    // Task Lifecycle Events
    // -------------------------------------------------------------------------
    /// A task was admitted to the pending queue.
    TaskEnqueued {
        task_id: TaskId,
        priority: Priority,
        queue_depth: usize,
    },

    /// A task was rejected at submission time.
    TaskRejected { task_id: TaskId, reason: String },

    /// A task was assigned to an executor and started.
    TaskStarted { task_id: TaskId, worker_id: WorkerId },

    /// A task resolved (success or failure, after retries).
    TaskCompleted {
        task_id: TaskId,
        success: bool,
        duration: Duration,
    },

    /// A failed attempt is being retried.
    TaskRetrying {
        task_id: TaskId,
        attempt: u32,
        error: String,
    },

    // -------------------------------------------------------------------------
    // Worker Lifecycle Events
    // -------------------------------------------------------------------------
    /// A new executor joined the pool.
    WorkerSpawned { worker_id: WorkerId },

    /// Executor creation failed; queued work stays pending.
    WorkerSpawnFailed { error: String },

    /// An executor left the pool.
    WorkerTerminated { worker_id: WorkerId, reason: String },

    // -------------------------------------------------------------------------
    // Pool Lifecycle Events
    // -------------------------------------------------------------------------
    /// The pool was explicitly resized.
    PoolResized { from: usize, to: usize },

    /// Shutdown started; queued tasks are being resolved as terminated.
    PoolTerminating,

    /// Shutdown finished; every executor is gone.
    PoolTerminated,
}

impl PoolEvent {
    /// Returns the task ID associated with this event, if any.
    pub fn task_id(&self) -> Option<TaskId> {
        match self {
            Self::TaskEnqueued { task_id, .. }
            | Self::TaskRejected { task_id, .. }
            | Self::TaskStarted { task_id, .. }
            | Self::TaskCompleted { task_id, .. }
            | Self::TaskRetrying { task_id, .. } => Some(*task_id),
            _ => None,
        }
    }

    /// Returns a short name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::TaskEnqueued { .. } => "task_enqueued",
            Self::TaskRejected { .. } => "task_rejected",
            Self::TaskStarted { .. } => "task_started",
            Self::TaskCompleted { .. } => "task_completed",
            Self::TaskRetrying { .. } => "task_retrying",
            Self::WorkerSpawned { .. } => "worker_spawned",
            Self::WorkerSpawnFailed { .. } => "worker_spawn_failed",
            Self::WorkerTerminated { .. } => "worker_terminated",
            Self::PoolResized { .. } => "pool_resized",
            Self::PoolTerminating => "pool_terminating",
            Self::PoolTerminated => "pool_terminated",
        }
    }
}

// =============================================================================
// Telemetry Sink Trait
// =============================================================================

/// Sink for pool telemetry events.
///
/// Implementations must be thread-safe (`Send + Sync`) as events may be
/// emitted from multiple tasks concurrently, and `emit` should be fast and
/// non-blocking.
pub trait TelemetrySink: Send + Sync {
    /// Called when a pool event occurs.
    fn emit(&self, event: PoolEvent);
}

// =============================================================================
// Built-in Sink Implementations
// =============================================================================

/// No-op sink for when telemetry is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTelemetrySink;

impl TelemetrySink for NullTelemetrySink {
    fn emit(&self, _event: PoolEvent) {
        // Intentionally empty
    }
}

/// Sink that logs events using the `tracing` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetrySink;

impl TelemetrySink for TracingTelemetrySink {
    fn emit(&self, event: PoolEvent) {
        match &event {
            PoolEvent::TaskEnqueued {
                task_id,
                priority,
                queue_depth,
            } => {
                tracing::trace!(
                    task_id = %task_id,
                    priority = %priority,
                    queue_depth = queue_depth,
                    "Task enqueued"
                );
            }
            PoolEvent::TaskRejected { task_id, reason } => {
                tracing::warn!(task_id = %task_id, reason = %reason, "Task rejected");
            }
            PoolEvent::TaskStarted { task_id, worker_id } => {
                tracing::debug!(task_id = %task_id, worker_id = %worker_id, "Task started");
            }
            PoolEvent::TaskCompleted {
                task_id,
                success,
                duration,
            } => {
                tracing::debug!(
                    task_id = %task_id,
                    success = success,
                    duration_ms = duration.as_millis(),
                    "Task completed"
                );
            }
            PoolEvent::TaskRetrying {
                task_id,
                attempt,
                error,
            } => {
                tracing::warn!(
                    task_id = %task_id,
                    attempt = attempt,
                    error = %error,
                    "Task retrying"
                );
            }
            PoolEvent::WorkerSpawned { worker_id } => {
                tracing::debug!(worker_id = %worker_id, "Worker spawned");
            }
            PoolEvent::WorkerSpawnFailed { error } => {
                tracing::error!(error = %error, "Worker spawn failed");
            }
            PoolEvent::WorkerTerminated { worker_id, reason } => {
                tracing::debug!(worker_id = %worker_id, reason = %reason, "Worker terminated");
            }
            PoolEvent::PoolResized { from, to } => {
                tracing::info!(from = from, to = to, "Pool resized");
            }
            PoolEvent::PoolTerminating => {
                tracing::info!("Pool terminating");
            }
            PoolEvent::PoolTerminated => {
                tracing::info!("Pool terminated");
            }
        }
    }
}

/// Sink that forwards events to multiple sinks.
pub struct MultiplexTelemetrySink {
    sinks: Vec<Arc<dyn TelemetrySink>>,
}

impl MultiplexTelemetrySink {
    /// Creates a new multiplex sink with the given sinks.
    pub fn new(sinks: Vec<Arc<dyn TelemetrySink>>) -> Self {
        Self { sinks }
    }

    /// Adds a sink to the multiplex.
    pub fn add_sink(&mut self, sink: Arc<dyn TelemetrySink>) {
        self.sinks.push(sink);
    }
}

impl TelemetrySink for MultiplexTelemetrySink {
    fn emit(&self, event: PoolEvent) {
        for sink in &self.sinks {
            sink.emit(event.clone());
        }
    }
}

impl std::fmt::Debug for MultiplexTelemetrySink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiplexTelemetrySink")
            .field("sink_count", &self.sinks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_null_sink() {
        let sink = NullTelemetrySink;
        // Should not panic
        sink.emit(PoolEvent::PoolTerminating);
    }

    #[test]
    fn test_tracing_sink() {
        let sink = TracingTelemetrySink;
        // Should not panic (logging may or may not be configured)
        sink.emit(PoolEvent::PoolTerminated);
    }

    #[test]
    fn test_event_task_id() {
        let id = TaskId::next();
        let event = PoolEvent::TaskCompleted {
            task_id: id,
            success: true,
            duration: Duration::from_millis(5),
        };
        assert_eq!(event.task_id(), Some(id));
        assert_eq!(PoolEvent::PoolTerminating.task_id(), None);
    }

    #[test]
    fn test_event_type_names() {
        assert_eq!(PoolEvent::PoolTerminating.event_type(), "pool_terminating");
        assert_eq!(
            PoolEvent::PoolResized { from: 1, to: 2 }.event_type(),
            "pool_resized"
        );
        assert_eq!(
            PoolEvent::TaskRejected {
                task_id: TaskId::next(),
                reason: "queue full".into()
            }
            .event_type(),
            "task_rejected"
        );
    }

    #[test]
    fn test_multiplex_sink() {
        struct CountingSink(AtomicUsize);

        impl TelemetrySink for CountingSink {
            fn emit(&self, _event: PoolEvent) {
                self.0.fetch_add(1, Ordering::Relaxed);
            }
        }

        let sink1 = Arc::new(CountingSink(AtomicUsize::new(0)));
        let sink2 = Arc::new(CountingSink(AtomicUsize::new(0)));

        let multiplex = MultiplexTelemetrySink::new(vec![
            Arc::clone(&sink1) as Arc<dyn TelemetrySink>,
            Arc::clone(&sink2) as Arc<dyn TelemetrySink>,
        ]);

        multiplex.emit(PoolEvent::PoolTerminating);

        assert_eq!(sink1.0.load(Ordering::Relaxed), 1);
        assert_eq!(sink2.0.load(Ordering::Relaxed), 1);
    }
}
