//! Pipeline operation descriptors.
//!
//! Each chained call records a [`Stage`]: an [`OpKind`] tag plus the stage
//! payload. Stages are pure data until `execute()` walks them. Elements are
//! type-erased between stages; the typed pipeline handles guarantee every
//! downcast.

use crate::dispatch::{DispatchOptions, Dispatcher};
use crate::error::TaskError;
use futures::future::BoxFuture;
use std::any::Any;
use std::sync::Arc;

/// A type-erased pipeline element.
pub(crate) type PipeValue = Arc<dyn Any + Send + Sync>;

/// Future of one intermediate stage's materialized output.
pub(crate) type StageFuture = BoxFuture<'static, Result<Vec<PipeValue>, TaskError>>;

/// Future of a terminal operation's single result.
pub(crate) type TerminalFuture = BoxFuture<'static, Result<PipeValue, TaskError>>;

/// Runs one dispatched stage against the current collection.
pub(crate) type DispatchedFn =
    Arc<dyn Fn(Dispatcher, Vec<PipeValue>, DispatchOptions) -> StageFuture + Send + Sync>;

/// Runs one synchronous whole-collection stage.
pub(crate) type LocalFn = Arc<dyn Fn(Vec<PipeValue>) -> Vec<PipeValue> + Send + Sync>;

/// Runs the terminal operation, collapsing the collection to one value.
pub(crate) type TerminalFn =
    Arc<dyn Fn(Dispatcher, Vec<PipeValue>, DispatchOptions) -> TerminalFuture + Send + Sync>;

// =============================================================================
// Operation Kinds
// =============================================================================

/// Tag identifying a pipeline operation.
///
/// Terminal kinds collapse the chain to a single non-collection result and
/// must come last; the handle types enforce that statically.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
    Map,
    Filter,
    FlatMap,
    Sort,
    Take,
    Skip,
    Reverse,
    Unique,
    Reduce,
    Find,
    Some,
    Every,
    Count,
    First,
    Last,
    Sum,
    GroupBy,
}

impl OpKind {
    /// Returns true if this operation collapses the chain to a single
    /// result.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Reduce
                | Self::Find
                | Self::Some
                | Self::Every
                | Self::Count
                | Self::First
                | Self::Last
                | Self::Sum
                | Self::GroupBy
        )
    }

    /// Returns a short name for this operation.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Map => "map",
            Self::Filter => "filter",
            Self::FlatMap => "flat_map",
            Self::Sort => "sort",
            Self::Take => "take",
            Self::Skip => "skip",
            Self::Reverse => "reverse",
            Self::Unique => "unique",
            Self::Reduce => "reduce",
            Self::Find => "find",
            Self::Some => "some",
            Self::Every => "every",
            Self::Count => "count",
            Self::First => "first",
            Self::Last => "last",
            Self::Sum => "sum",
            Self::GroupBy => "group_by",
        }
    }
}

impl std::fmt::Display for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// =============================================================================
// Stage Descriptor
// =============================================================================

/// One recorded intermediate operation.
#[derive(Clone)]
pub(crate) struct Stage {
    /// Operation tag.
    pub(crate) kind: OpKind,

    /// Stage payload.
    pub(crate) op: StageOp,
}

/// Stage payload: dispatched through the pool or run locally.
#[derive(Clone)]
pub(crate) enum StageOp {
    /// Element-wise stage driven through the dispatch API.
    Dispatched(DispatchedFn),

    /// Whole-collection synchronous stage.
    Local(LocalFn),
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = match self.op {
            StageOp::Dispatched(_) => "dispatched",
            StageOp::Local(_) => "local",
        };
        write!(f, "Stage({}, {})", self.kind.name(), mode)
    }
}

// =============================================================================
// Value Helpers
// =============================================================================

/// Erases a typed element.
pub(crate) fn wrap<T: Send + Sync + 'static>(value: T) -> PipeValue {
    Arc::new(value)
}

/// Recovers a typed element, cloning only when the value is shared.
///
/// The typed handles make a mismatch impossible.
pub(crate) fn unwrap<T: Clone + Send + Sync + 'static>(value: PipeValue) -> T {
    let concrete = value
        .downcast::<T>()
        .unwrap_or_else(|_| panic!("pipeline value has unexpected type"));
    Arc::try_unwrap(concrete).unwrap_or_else(|shared| (*shared).clone())
}

/// Borrows a typed element.
pub(crate) fn peek<T: Send + Sync + 'static>(value: &PipeValue) -> &T {
    value
        .downcast_ref::<T>()
        .expect("pipeline value has unexpected type")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_classification() {
        assert!(OpKind::Reduce.is_terminal());
        assert!(OpKind::Find.is_terminal());
        assert!(OpKind::Sum.is_terminal());
        assert!(OpKind::GroupBy.is_terminal());
        assert!(!OpKind::Map.is_terminal());
        assert!(!OpKind::Filter.is_terminal());
        assert!(!OpKind::Sort.is_terminal());
        assert!(!OpKind::Reverse.is_terminal());
    }

    #[test]
    fn test_op_kind_names() {
        assert_eq!(OpKind::Map.name(), "map");
        assert_eq!(OpKind::FlatMap.name(), "flat_map");
        assert_eq!(OpKind::GroupBy.name(), "group_by");
        assert_eq!(format!("{}", OpKind::Reduce), "reduce");
    }

    #[test]
    fn test_wrap_unwrap_roundtrip() {
        let value = wrap(42u64);
        assert_eq!(peek::<u64>(&value), &42);
        assert_eq!(unwrap::<u64>(value), 42);
    }

    #[test]
    fn test_unwrap_clones_shared_value() {
        let value = wrap("shared".to_string());
        let alias = Arc::clone(&value);
        assert_eq!(unwrap::<String>(value), "shared");
        assert_eq!(peek::<String>(&alias), "shared");
    }

    #[test]
    #[should_panic(expected = "pipeline value has unexpected type")]
    fn test_unwrap_wrong_type_panics() {
        let value = wrap(1u8);
        let _: String = unwrap(value);
    }
}
