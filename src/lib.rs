//! TaskPool - bounded concurrent execution with lazy pipelines
//!
//! This library provides a uniform API for dispatching units of work onto a
//! bounded pool of executors, with per-task timeout, cancellation, and retry
//! semantics, plus a lazily-evaluated operation pipeline built on top of the
//! same dispatch primitive.
//!
//! # High-Level API
//!
//! For most use cases, construct a [`pool::PoolManager`] and wrap it in a
//! [`dispatch::Dispatcher`]:
//!
//! ```ignore
//! use taskpool::config::PoolConfig;
//! use taskpool::dispatch::{Dispatcher, DispatchOptions};
//! use taskpool::pool::PoolManager;
//!
//! let pool = PoolManager::new(PoolConfig::default())?;
//! let dispatcher = Dispatcher::new(pool);
//!
//! let doubled = dispatcher
//!     .map(vec![1, 2, 3], |x| x * 2, &DispatchOptions::default())
//!     .await?;
//!
//! let sum = dispatcher
//!     .pipe(vec![1, 2, 3, 4, 5])
//!     .map(|x| x * 2)
//!     .filter(|x| x % 4 == 0)
//!     .reduce(0, |acc, x| acc + x)
//!     .execute()
//!     .await?;
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod pool;
pub mod telemetry;

/// Version of the taskpool library.
///
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
