//! Executor Pool Framework
//!
//! This module provides the task scheduling and pool management engine:
//! a bounded set of executors, a priority task queue, and the per-task
//! execution controller applying timeout, cancellation, and retry semantics.
//!
//! # Architecture
//!
//! The pool follows a layered design:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       PoolManager                            │
//! │  Admission, queue draining, resize, stats, termination      │
//! ├─────────────────────────────────────────────────────────────┤
//! │                   ExecutionController                        │
//! │  Per-task wrapper: timeout/abort race, bounded retry        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐  │
//! │  │ Priority    │  │ Worker      │  │ Telemetry           │  │
//! │  │ Queue       │  │ Records     │  │ Sink                │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Core Concepts
//!
//! - **Task**: one queued unit of work plus a result future. A task is
//!   enqueued at most once and resolved exactly once.
//!
//! - **Worker**: the pool's record of one executor with its lifecycle state
//!   (idle or busy). Executors never outlive the pool's `terminate()`.
//!
//! - **Priority**: tasks are scheduled by descending priority weight with
//!   FIFO ordering inside the same priority band. Priority orders the queue;
//!   it never preempts running work.
//!
//! - **Elastic sizing**: the pool grows on demand up to `max_executors` and
//!   shrinks back toward `min_executors` when executors sit idle past the
//!   configured timeout.
//!
//! # Example
//!
//! ```ignore
//! use taskpool::config::{PoolConfig, TaskOptions};
//! use taskpool::pool::PoolManager;
//!
//! let pool = PoolManager::new(PoolConfig::new(1, 4))?;
//!
//! let value = pool
//!     .execute(|n: u64| n * 2, 21, TaskOptions::default())
//!     .await?;
//! assert_eq!(value, 42);
//!
//! pool.terminate().await;
//! ```
//!
//! # Cancellation
//!
//! Cancellation and timeout are advisory: they stop the caller's wait, not
//! the work already running on an executor. See the `Executor` contract in
//! [`crate::executor`].

mod controller;
mod lifecycle;
mod manager;
mod queue;
mod task;
mod worker;

pub use lifecycle::{TERMINATE_GRACE_PERIOD_MS, TERMINATE_POLL_INTERVAL_MS};
pub use manager::PoolManager;
pub use queue::{QueuedTask, TaskQueue};
pub use task::{Task, TaskHandle, TaskId};
pub use worker::{WorkerId, WorkerRecord};
