//! Lazy operation pipeline.
//!
//! A pipeline records a chain of operation descriptors against an initial
//! collection and only executes them - through the dispatch API and hence
//! the pool - when `execute()` is invoked.
//!
//! # Two-Phase Model
//!
//! **Build**: chaining calls push descriptors; nothing runs. Intermediate
//! operations (`map`, `filter`, `take`, `sort_by`, ...) return a new
//! chainable [`Pipeline`]; terminal operations (`reduce`, `find`,
//! `group_by`, `sum`, ...) return a [`TerminalPipeline`], which only
//! exposes `execute()`. Appending after a terminal operation is therefore
//! a compile error, not a runtime surprise.
//!
//! **Execute**: a single pass threads the fully materialized collection
//! through each descriptor in append order. Element-wise operations are
//! dispatched to the pool; whole-collection reorderings (`sort_by`, `take`,
//! `skip`, `reverse`, `unique`) run synchronously on the materialized
//! collection.
//!
//! Re-invoking `execute()` re-runs the whole chain from the original
//! collection. That makes it idempotent for pure functions; supplied
//! functions with side effects will run again.
//!
//! # Example
//!
//! ```ignore
//! let sum = dispatcher
//!     .pipe(vec![1, 2, 3, 4, 5])
//!     .map(|x| x * 2)
//!     .filter(|x| x % 4 == 0)
//!     .reduce(0, |acc, x| acc + x)
//!     .execute()
//!     .await?;
//! assert_eq!(sum, 12);
//! ```

mod builder;
mod operation;

pub use builder::{Pipeline, TerminalPipeline};
pub use operation::OpKind;
