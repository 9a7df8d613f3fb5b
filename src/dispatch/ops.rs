//! Collection operations over the pool.
//!
//! Every operation here is built from one primitive: submit one task per
//! logical unit, await the results, recombine in input order. Within a chunk
//! tasks run concurrently; chunks run sequentially.
//!
//! Short-circuiting operations (`find`, `find_index`, `some`, `every`) use a
//! smaller default batch so they can stop early. The short-circuit is
//! cooperative: the batch that produced a hit is still awaited in full, and
//! in-flight siblings are never cancelled.

use super::{resolve_batch_size, DispatchOptions, Dispatcher};
use crate::config::{TaskOptions, DEFAULT_SEARCH_BATCH_SIZE};
use crate::error::TaskError;
use crate::executor::{downcast_value, work_fn};
use crate::pool::TaskHandle;
use indexmap::IndexMap;
use std::hash::Hash;
use std::sync::Arc;

impl Dispatcher {
    /// Runs one function on the pool and awaits its result.
    ///
    /// This is the primitive the collection operations are built on. The
    /// raw error surfaces after the task's retry budget is exhausted.
    pub async fn run<A, R, F>(&self, f: F, arg: A, options: TaskOptions) -> Result<R, TaskError>
    where
        F: Fn(A) -> R + Send + Sync + 'static,
        A: Clone + Send + Sync + 'static,
        R: Send + 'static,
    {
        self.pool().execute(f, arg, options).await
    }

    /// Applies `f` to every element, preserving input order.
    ///
    /// The input is split into contiguous chunks of `batch_size` (default:
    /// the whole input). Tasks within a chunk run concurrently; chunks run
    /// sequentially, bounding in-flight concurrency to one chunk.
    pub async fn map<A, R, F>(
        &self,
        items: Vec<A>,
        f: F,
        options: &DispatchOptions,
    ) -> Result<Vec<R>, TaskError>
    where
        A: Clone + Send + Sync + 'static,
        R: Send + 'static,
        F: Fn(A) -> R + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        let batch_size = resolve_batch_size(options.batch_size, items.len())?;
        let mut results = Vec::with_capacity(items.len());

        for chunk in items.chunks(batch_size) {
            let handles: Vec<TaskHandle> = chunk
                .iter()
                .map(|item| {
                    self.pool()
                        .submit(work_fn(Arc::clone(&f), item.clone()), options.task.clone())
                })
                .collect();

            // Awaiting in submission order keeps the output aligned with the
            // input regardless of completion order.
            for handle in handles {
                results.push(downcast_value::<R>(handle.wait().await?)?);
            }
        }

        Ok(results)
    }

    /// Keeps the elements for which `predicate` returns true, preserving
    /// relative order.
    pub async fn filter<A, F>(
        &self,
        items: Vec<A>,
        predicate: F,
        options: &DispatchOptions,
    ) -> Result<Vec<A>, TaskError>
    where
        A: Clone + Send + Sync + 'static,
        F: Fn(A) -> bool + Send + Sync + 'static,
    {
        let keep = self.map(items.clone(), predicate, options).await?;
        Ok(items
            .into_iter()
            .zip(keep)
            .filter(|(_, keep)| *keep)
            .map(|(item, _)| item)
            .collect())
    }

    /// Folds the collection left-to-right, strictly sequentially.
    ///
    /// Each step's accumulator feeds the next step's task; there is no
    /// parallel reduction tree, so `f` needs no associativity contract.
    pub async fn reduce<A, Acc, F>(
        &self,
        items: Vec<A>,
        init: Acc,
        f: F,
        options: &DispatchOptions,
    ) -> Result<Acc, TaskError>
    where
        A: Clone + Send + Sync + 'static,
        Acc: Clone + Send + Sync + 'static,
        F: Fn(Acc, A) -> Acc + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        let mut acc = init;
        for item in items {
            let step = Arc::clone(&f);
            acc = self
                .pool()
                .execute(
                    move |(acc, item): (Acc, A)| (step.as_ref())(acc, item),
                    (acc, item),
                    options.task.clone(),
                )
                .await?;
        }
        Ok(acc)
    }

    /// Folds the collection right-to-left, strictly sequentially.
    pub async fn reduce_right<A, Acc, F>(
        &self,
        items: Vec<A>,
        init: Acc,
        f: F,
        options: &DispatchOptions,
    ) -> Result<Acc, TaskError>
    where
        A: Clone + Send + Sync + 'static,
        Acc: Clone + Send + Sync + 'static,
        F: Fn(Acc, A) -> Acc + Send + Sync + 'static,
    {
        let mut reversed = items;
        reversed.reverse();
        self.reduce(reversed, init, f, options).await
    }

    /// Runs `f` on every element for its side effects.
    pub async fn for_each<A, F>(
        &self,
        items: Vec<A>,
        f: F,
        options: &DispatchOptions,
    ) -> Result<(), TaskError>
    where
        A: Clone + Send + Sync + 'static,
        F: Fn(A) + Send + Sync + 'static,
    {
        self.map(items, f, options).await?;
        Ok(())
    }

    /// Returns the first element satisfying `predicate`, if any.
    pub async fn find<A, F>(
        &self,
        items: Vec<A>,
        predicate: F,
        options: &DispatchOptions,
    ) -> Result<Option<A>, TaskError>
    where
        A: Clone + Send + Sync + 'static,
        F: Fn(A) -> bool + Send + Sync + 'static,
    {
        let index = self.search(&items, Arc::new(predicate), options).await?;
        Ok(index.map(|index| items[index].clone()))
    }

    /// Returns the index of the first element satisfying `predicate`.
    pub async fn find_index<A, F>(
        &self,
        items: Vec<A>,
        predicate: F,
        options: &DispatchOptions,
    ) -> Result<Option<usize>, TaskError>
    where
        A: Clone + Send + Sync + 'static,
        F: Fn(A) -> bool + Send + Sync + 'static,
    {
        self.search(&items, Arc::new(predicate), options).await
    }

    /// Returns true if any element satisfies `predicate`.
    pub async fn some<A, F>(
        &self,
        items: Vec<A>,
        predicate: F,
        options: &DispatchOptions,
    ) -> Result<bool, TaskError>
    where
        A: Clone + Send + Sync + 'static,
        F: Fn(A) -> bool + Send + Sync + 'static,
    {
        Ok(self
            .search(&items, Arc::new(predicate), options)
            .await?
            .is_some())
    }

    /// Returns true if every element satisfies `predicate`.
    pub async fn every<A, F>(
        &self,
        items: Vec<A>,
        predicate: F,
        options: &DispatchOptions,
    ) -> Result<bool, TaskError>
    where
        A: Clone + Send + Sync + 'static,
        F: Fn(A) -> bool + Send + Sync + 'static,
    {
        let predicate = Arc::new(predicate);
        let negated = move |item: A| !(predicate.as_ref())(item);
        Ok(self
            .search(&items, Arc::new(negated), options)
            .await?
            .is_none())
    }

    /// Applies `f` to every element and flattens the results in order.
    pub async fn flat_map<A, R, F>(
        &self,
        items: Vec<A>,
        f: F,
        options: &DispatchOptions,
    ) -> Result<Vec<R>, TaskError>
    where
        A: Clone + Send + Sync + 'static,
        R: Send + 'static,
        F: Fn(A) -> Vec<R> + Send + Sync + 'static,
    {
        Ok(self
            .map(items, f, options)
            .await?
            .into_iter()
            .flatten()
            .collect())
    }

    /// Groups elements by the key `key_fn` computes for each.
    ///
    /// Keys appear in first-seen order; elements within a group keep their
    /// relative input order.
    pub async fn group_by<A, K, F>(
        &self,
        items: Vec<A>,
        key_fn: F,
        options: &DispatchOptions,
    ) -> Result<IndexMap<K, Vec<A>>, TaskError>
    where
        A: Clone + Send + Sync + 'static,
        K: Hash + Eq + Send + 'static,
        F: Fn(A) -> K + Send + Sync + 'static,
    {
        let keys = self.map(items.clone(), key_fn, options).await?;
        let mut groups: IndexMap<K, Vec<A>> = IndexMap::new();
        for (key, item) in keys.into_iter().zip(items) {
            groups.entry(key).or_default().push(item);
        }
        Ok(groups)
    }

    /// Splits elements into `(matching, non_matching)` by `predicate`,
    /// preserving relative order within each part.
    pub async fn partition<A, F>(
        &self,
        items: Vec<A>,
        predicate: F,
        options: &DispatchOptions,
    ) -> Result<(Vec<A>, Vec<A>), TaskError>
    where
        A: Clone + Send + Sync + 'static,
        F: Fn(A) -> bool + Send + Sync + 'static,
    {
        let flags = self.map(items.clone(), predicate, options).await?;
        let mut matching = Vec::new();
        let mut non_matching = Vec::new();
        for (item, flag) in items.into_iter().zip(flags) {
            if flag {
                matching.push(item);
            } else {
                non_matching.push(item);
            }
        }
        Ok((matching, non_matching))
    }

    /// Counts the elements satisfying `predicate`.
    pub async fn count<A, F>(
        &self,
        items: Vec<A>,
        predicate: F,
        options: &DispatchOptions,
    ) -> Result<usize, TaskError>
    where
        A: Clone + Send + Sync + 'static,
        F: Fn(A) -> bool + Send + Sync + 'static,
    {
        let flags = self.map(items, predicate, options).await?;
        Ok(flags.into_iter().filter(|flag| *flag).count())
    }

    /// Shared scan for the short-circuiting operations.
    ///
    /// Processes the input in search-sized batches and returns the index of
    /// the first hit. The hit's batch is awaited in full - siblings already
    /// in flight are never cancelled - but later batches are never
    /// submitted.
    async fn search<A, F>(
        &self,
        items: &[A],
        predicate: Arc<F>,
        options: &DispatchOptions,
    ) -> Result<Option<usize>, TaskError>
    where
        A: Clone + Send + Sync + 'static,
        F: Fn(A) -> bool + Send + Sync + 'static + ?Sized,
    {
        let batch_size = match options.batch_size {
            Some(0) => {
                return Err(TaskError::InvalidTask("batch size must be non-zero".into()))
            }
            Some(batch_size) => batch_size,
            None => DEFAULT_SEARCH_BATCH_SIZE,
        };

        let mut offset = 0;
        for chunk in items.chunks(batch_size) {
            let handles: Vec<TaskHandle> = chunk
                .iter()
                .map(|item| {
                    self.pool().submit(
                        work_fn(Arc::clone(&predicate), item.clone()),
                        options.task.clone(),
                    )
                })
                .collect();

            let mut matched = None;
            for (index, handle) in handles.into_iter().enumerate() {
                let hit: bool = downcast_value(handle.wait().await?)?;
                if hit && matched.is_none() {
                    matched = Some(offset + index);
                }
            }
            if matched.is_some() {
                return Ok(matched);
            }
            offset += chunk.len();
        }

        Ok(None)
    }
}
