//! Pipeline handles: the chainable builder and the terminal handle.
//!
//! [`Pipeline<T>`] is the chainable phase - every intermediate call consumes
//! the handle and returns a new one typed by the current element type.
//! Terminal calls return a [`TerminalPipeline<R>`], which only knows how to
//! `execute()`; the type system rejects any append after a terminal
//! operation.

use super::operation::{
    peek, unwrap, wrap, OpKind, PipeValue, Stage, StageFuture, StageOp, TerminalFn,
    TerminalFuture,
};
use crate::config::TaskOptions;
use crate::dispatch::{DispatchOptions, Dispatcher};
use crate::error::TaskError;
use indexmap::IndexMap;
use std::cmp::Ordering;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;

/// Rebuilds the source collection for one execution pass.
type SourceFn = Arc<dyn Fn() -> Vec<PipeValue> + Send + Sync>;

/// Threads the materialized collection through every recorded stage.
async fn run_stages(
    dispatcher: &Dispatcher,
    source: &SourceFn,
    stages: &[Stage],
    options: &TaskOptions,
) -> Result<Vec<PipeValue>, TaskError> {
    let mut values = (source.as_ref())();
    let dispatch_options = DispatchOptions::from(options.clone());

    for stage in stages {
        values = match &stage.op {
            StageOp::Dispatched(run) => {
                (run.as_ref())(dispatcher.clone(), values, dispatch_options.clone()).await?
            }
            StageOp::Local(run) => (run.as_ref())(values),
        };
        tracing::trace!(
            operation = stage.kind.name(),
            size = values.len(),
            "Pipeline stage materialized"
        );
    }

    Ok(values)
}

// =============================================================================
// Chainable Pipeline
// =============================================================================

/// A lazy chain of operations over a collection of `T`.
///
/// Nothing executes until [`Pipeline::execute`]. Each call consumes the
/// handle and returns a new one, so a half-built chain can never be
/// observed mid-mutation.
pub struct Pipeline<T> {
    dispatcher: Dispatcher,
    source: SourceFn,
    stages: Vec<Stage>,
    options: TaskOptions,
    _element: PhantomData<fn() -> T>,
}

impl<T> Clone for Pipeline<T> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: self.dispatcher.clone(),
            source: Arc::clone(&self.source),
            stages: self.stages.clone(),
            options: self.options.clone(),
            _element: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for Pipeline<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("operations", &self.operation_names())
            .finish()
    }
}

impl<T> Pipeline<T> {
    /// Returns the recorded operation names, in append order.
    pub fn operation_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.kind.name()).collect()
    }
}

impl<T: Clone + Send + Sync + 'static> Pipeline<T> {
    /// Records a pipeline over `items`. Called via [`Dispatcher::pipe`].
    pub(crate) fn new(dispatcher: Dispatcher, items: Vec<T>) -> Self {
        let source: SourceFn =
            Arc::new(move || items.iter().cloned().map(wrap).collect::<Vec<PipeValue>>());
        Self {
            dispatcher,
            source,
            stages: Vec::new(),
            options: TaskOptions::default(),
            _element: PhantomData,
        }
    }

    /// Sets the per-task options applied to every dispatched stage.
    pub fn with_options(mut self, options: TaskOptions) -> Self {
        self.options = options;
        self
    }

    /// Appends a stage, moving to the new element type.
    fn chain<U>(mut self, kind: OpKind, op: StageOp) -> Pipeline<U> {
        self.stages.push(Stage { kind, op });
        Pipeline {
            dispatcher: self.dispatcher,
            source: self.source,
            stages: self.stages,
            options: self.options,
            _element: PhantomData,
        }
    }

    /// Seals the chain with a terminal operation.
    fn seal<R>(self, kind: OpKind, terminal: TerminalFn) -> TerminalPipeline<R> {
        TerminalPipeline {
            dispatcher: self.dispatcher,
            source: self.source,
            stages: self.stages,
            options: self.options,
            kind,
            terminal,
            _result: PhantomData,
        }
    }

    // =========================================================================
    // Intermediate Operations
    // =========================================================================

    /// Transforms every element, dispatched through the pool.
    pub fn map<U, F>(self, f: F) -> Pipeline<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        let op = StageOp::Dispatched(Arc::new(
            move |dispatcher: Dispatcher, values: Vec<PipeValue>, options: DispatchOptions| {
                let f = Arc::clone(&f);
                let fut: StageFuture = Box::pin(async move {
                    dispatcher
                        .map(
                            values,
                            move |value: PipeValue| wrap((f.as_ref())(unwrap::<T>(value))),
                            &options,
                        )
                        .await
                });
                fut
            },
        ));
        self.chain(OpKind::Map, op)
    }

    /// Keeps the elements matching `predicate`, dispatched through the pool.
    pub fn filter<F>(self, predicate: F) -> Pipeline<T>
    where
        F: Fn(T) -> bool + Send + Sync + 'static,
    {
        let predicate = Arc::new(predicate);
        let op = StageOp::Dispatched(Arc::new(
            move |dispatcher: Dispatcher, values: Vec<PipeValue>, options: DispatchOptions| {
                let predicate = Arc::clone(&predicate);
                let fut: StageFuture = Box::pin(async move {
                    dispatcher
                        .filter(
                            values,
                            move |value: PipeValue| (predicate.as_ref())(unwrap::<T>(value)),
                            &options,
                        )
                        .await
                });
                fut
            },
        ));
        self.chain(OpKind::Filter, op)
    }

    /// Transforms every element into a collection and flattens, in order.
    pub fn flat_map<U, F>(self, f: F) -> Pipeline<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(T) -> Vec<U> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        let op = StageOp::Dispatched(Arc::new(
            move |dispatcher: Dispatcher, values: Vec<PipeValue>, options: DispatchOptions| {
                let f = Arc::clone(&f);
                let fut: StageFuture = Box::pin(async move {
                    dispatcher
                        .flat_map(
                            values,
                            move |value: PipeValue| {
                                (f.as_ref())(unwrap::<T>(value))
                                    .into_iter()
                                    .map(wrap)
                                    .collect::<Vec<PipeValue>>()
                            },
                            &options,
                        )
                        .await
                });
                fut
            },
        ));
        self.chain(OpKind::FlatMap, op)
    }

    /// Sorts by a comparator. Stable; runs on the materialized collection.
    pub fn sort_by<F>(self, compare: F) -> Pipeline<T>
    where
        F: Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    {
        let op = StageOp::Local(Arc::new(move |mut values: Vec<PipeValue>| {
            values.sort_by(|a, b| compare(peek::<T>(a), peek::<T>(b)));
            values
        }));
        self.chain(OpKind::Sort, op)
    }

    /// Sorts by the natural order of `T`.
    pub fn sort(self) -> Pipeline<T>
    where
        T: Ord,
    {
        self.sort_by(|a, b| a.cmp(b))
    }

    /// Keeps the first `count` elements.
    pub fn take(self, count: usize) -> Pipeline<T> {
        let op = StageOp::Local(Arc::new(move |mut values: Vec<PipeValue>| {
            values.truncate(count);
            values
        }));
        self.chain(OpKind::Take, op)
    }

    /// Drops the first `count` elements.
    pub fn skip(self, count: usize) -> Pipeline<T> {
        let op = StageOp::Local(Arc::new(move |values: Vec<PipeValue>| {
            values.into_iter().skip(count).collect()
        }));
        self.chain(OpKind::Skip, op)
    }

    /// Reverses the collection.
    pub fn reverse(self) -> Pipeline<T> {
        let op = StageOp::Local(Arc::new(|mut values: Vec<PipeValue>| {
            values.reverse();
            values
        }));
        self.chain(OpKind::Reverse, op)
    }

    /// Drops duplicate elements, keeping first occurrences in order.
    pub fn unique(self) -> Pipeline<T>
    where
        T: PartialEq,
    {
        let op = StageOp::Local(Arc::new(|values: Vec<PipeValue>| {
            let mut seen: Vec<PipeValue> = Vec::with_capacity(values.len());
            for value in values {
                let duplicate = seen
                    .iter()
                    .any(|kept| peek::<T>(kept) == peek::<T>(&value));
                if !duplicate {
                    seen.push(value);
                }
            }
            seen
        }));
        self.chain(OpKind::Unique, op)
    }

    // =========================================================================
    // Terminal Operations
    // =========================================================================

    /// Folds left-to-right, strictly sequentially, through the pool.
    pub fn reduce<Acc, F>(self, init: Acc, f: F) -> TerminalPipeline<Acc>
    where
        Acc: Clone + Send + Sync + 'static,
        F: Fn(Acc, T) -> Acc + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        let terminal: TerminalFn = Arc::new(
            move |dispatcher: Dispatcher, values: Vec<PipeValue>, options: DispatchOptions| {
                let f = Arc::clone(&f);
                let init = init.clone();
                let fut: TerminalFuture = Box::pin(async move {
                    let acc = dispatcher
                        .reduce(
                            values,
                            init,
                            move |acc: Acc, value: PipeValue| {
                                (f.as_ref())(acc, unwrap::<T>(value))
                            },
                            &options,
                        )
                        .await?;
                    Ok(wrap(acc))
                });
                fut
            },
        );
        self.seal(OpKind::Reduce, terminal)
    }

    /// Finds the first element matching `predicate`.
    pub fn find<F>(self, predicate: F) -> TerminalPipeline<Option<T>>
    where
        F: Fn(T) -> bool + Send + Sync + 'static,
    {
        let predicate = Arc::new(predicate);
        let terminal: TerminalFn = Arc::new(
            move |dispatcher: Dispatcher, values: Vec<PipeValue>, options: DispatchOptions| {
                let predicate = Arc::clone(&predicate);
                let fut: TerminalFuture = Box::pin(async move {
                    let found = dispatcher
                        .find(
                            values,
                            move |value: PipeValue| (predicate.as_ref())(unwrap::<T>(value)),
                            &options,
                        )
                        .await?;
                    Ok(wrap(found.map(unwrap::<T>)))
                });
                fut
            },
        );
        self.seal(OpKind::Find, terminal)
    }

    /// True if any element matches `predicate`.
    pub fn some<F>(self, predicate: F) -> TerminalPipeline<bool>
    where
        F: Fn(T) -> bool + Send + Sync + 'static,
    {
        let predicate = Arc::new(predicate);
        let terminal: TerminalFn = Arc::new(
            move |dispatcher: Dispatcher, values: Vec<PipeValue>, options: DispatchOptions| {
                let predicate = Arc::clone(&predicate);
                let fut: TerminalFuture = Box::pin(async move {
                    let any = dispatcher
                        .some(
                            values,
                            move |value: PipeValue| (predicate.as_ref())(unwrap::<T>(value)),
                            &options,
                        )
                        .await?;
                    Ok(wrap(any))
                });
                fut
            },
        );
        self.seal(OpKind::Some, terminal)
    }

    /// True if every element matches `predicate`.
    pub fn every<F>(self, predicate: F) -> TerminalPipeline<bool>
    where
        F: Fn(T) -> bool + Send + Sync + 'static,
    {
        let predicate = Arc::new(predicate);
        let terminal: TerminalFn = Arc::new(
            move |dispatcher: Dispatcher, values: Vec<PipeValue>, options: DispatchOptions| {
                let predicate = Arc::clone(&predicate);
                let fut: TerminalFuture = Box::pin(async move {
                    let all = dispatcher
                        .every(
                            values,
                            move |value: PipeValue| (predicate.as_ref())(unwrap::<T>(value)),
                            &options,
                        )
                        .await?;
                    Ok(wrap(all))
                });
                fut
            },
        );
        self.seal(OpKind::Every, terminal)
    }

    /// Number of elements after the intermediate stages.
    pub fn count(self) -> TerminalPipeline<usize> {
        let terminal: TerminalFn = Arc::new(
            move |_dispatcher: Dispatcher, values: Vec<PipeValue>, _options: DispatchOptions| {
                let fut: TerminalFuture = Box::pin(async move { Ok(wrap(values.len())) });
                fut
            },
        );
        self.seal(OpKind::Count, terminal)
    }

    /// First element, if any.
    pub fn first(self) -> TerminalPipeline<Option<T>> {
        let terminal: TerminalFn = Arc::new(
            move |_dispatcher: Dispatcher, values: Vec<PipeValue>, _options: DispatchOptions| {
                let fut: TerminalFuture = Box::pin(async move {
                    Ok(wrap(values.into_iter().next().map(unwrap::<T>)))
                });
                fut
            },
        );
        self.seal(OpKind::First, terminal)
    }

    /// Last element, if any.
    pub fn last(self) -> TerminalPipeline<Option<T>> {
        let terminal: TerminalFn = Arc::new(
            move |_dispatcher: Dispatcher, values: Vec<PipeValue>, _options: DispatchOptions| {
                let fut: TerminalFuture = Box::pin(async move {
                    Ok(wrap(values.into_iter().last().map(unwrap::<T>)))
                });
                fut
            },
        );
        self.seal(OpKind::Last, terminal)
    }

    /// Sum of the elements, folded sequentially through the pool.
    pub fn sum(self) -> TerminalPipeline<T>
    where
        T: Default + std::ops::Add<Output = T>,
    {
        let terminal: TerminalFn = Arc::new(
            move |dispatcher: Dispatcher, values: Vec<PipeValue>, options: DispatchOptions| {
                let fut: TerminalFuture = Box::pin(async move {
                    let total = dispatcher
                        .reduce(
                            values,
                            T::default(),
                            |acc: T, value: PipeValue| acc + unwrap::<T>(value),
                            &options,
                        )
                        .await?;
                    Ok(wrap(total))
                });
                fut
            },
        );
        self.seal(OpKind::Sum, terminal)
    }

    /// Groups elements by key, keys in first-seen order.
    pub fn group_by<K, F>(self, key_fn: F) -> TerminalPipeline<IndexMap<K, Vec<T>>>
    where
        K: Hash + Eq + Clone + Send + Sync + 'static,
        F: Fn(T) -> K + Send + Sync + 'static,
    {
        let key_fn = Arc::new(key_fn);
        let terminal: TerminalFn = Arc::new(
            move |dispatcher: Dispatcher, values: Vec<PipeValue>, options: DispatchOptions| {
                let key_fn = Arc::clone(&key_fn);
                let fut: TerminalFuture = Box::pin(async move {
                    let groups = dispatcher
                        .group_by(
                            values,
                            move |value: PipeValue| (key_fn.as_ref())(unwrap::<T>(value)),
                            &options,
                        )
                        .await?;
                    let typed: IndexMap<K, Vec<T>> = groups
                        .into_iter()
                        .map(|(key, members)| {
                            (key, members.into_iter().map(unwrap::<T>).collect())
                        })
                        .collect();
                    Ok(wrap(typed))
                });
                fut
            },
        );
        self.seal(OpKind::GroupBy, terminal)
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Runs the recorded chain and returns the resulting collection.
    ///
    /// Each call re-materializes from the original collection, so a
    /// pipeline can be executed repeatedly.
    pub async fn execute(&self) -> Result<Vec<T>, TaskError> {
        let values =
            run_stages(&self.dispatcher, &self.source, &self.stages, &self.options).await?;
        Ok(values.into_iter().map(unwrap::<T>).collect())
    }
}

// =============================================================================
// Terminal Pipeline
// =============================================================================

/// A sealed pipeline whose chain ends in a terminal operation.
///
/// Only `execute()` is available; the chain cannot be extended further.
pub struct TerminalPipeline<R> {
    dispatcher: Dispatcher,
    source: SourceFn,
    stages: Vec<Stage>,
    options: TaskOptions,
    kind: OpKind,
    terminal: TerminalFn,
    _result: PhantomData<fn() -> R>,
}

impl<R> Clone for TerminalPipeline<R> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: self.dispatcher.clone(),
            source: Arc::clone(&self.source),
            stages: self.stages.clone(),
            options: self.options.clone(),
            kind: self.kind,
            terminal: Arc::clone(&self.terminal),
            _result: PhantomData,
        }
    }
}

impl<R> std::fmt::Debug for TerminalPipeline<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalPipeline")
            .field("operations", &self.operation_names())
            .finish()
    }
}

impl<R> TerminalPipeline<R> {
    /// Returns the recorded operation names including the terminal, in
    /// append order.
    pub fn operation_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> =
            self.stages.iter().map(|stage| stage.kind.name()).collect();
        names.push(self.kind.name());
        names
    }

    /// Returns the terminal operation's kind.
    pub fn terminal_kind(&self) -> OpKind {
        self.kind
    }
}

impl<R: Clone + Send + Sync + 'static> TerminalPipeline<R> {
    /// Runs the recorded chain including the terminal operation.
    ///
    /// Each call re-materializes from the original collection, so the same
    /// handle can be executed repeatedly.
    pub async fn execute(&self) -> Result<R, TaskError> {
        let values =
            run_stages(&self.dispatcher, &self.source, &self.stages, &self.options).await?;
        let dispatch_options = DispatchOptions::from(self.options.clone());
        let result =
            (self.terminal.as_ref())(self.dispatcher.clone(), values, dispatch_options).await?;
        Ok(unwrap::<R>(result))
    }
}
