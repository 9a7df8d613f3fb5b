//! Pending-task priority queue.
//!
//! Tasks are ordered by descending priority weight; the monotonic sequence
//! number breaks ties so tasks of equal priority leave in submission order.
//! Under [`SchedulingStrategy::Fifo`] every task gets the same weight and
//! insertion order wins outright.

use super::task::Task;
use crate::config::SchedulingStrategy;
use std::collections::BinaryHeap;

/// A task wrapped with its queue ordering key.
///
/// Ordered by weight (higher first), then by sequence number (older first)
/// so the max-heap yields FIFO order within a priority band.
pub struct QueuedTask {
    /// The enveloped task.
    pub(crate) task: Task,
    /// Priority weight captured at admission.
    pub(crate) weight: u8,
    /// Monotonic sequence number for FIFO ordering within the same weight.
    pub(crate) sequence: u64,
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.weight == other.weight && self.sequence == other.sequence
    }
}

impl Eq for QueuedTask {}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedTask {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Higher weight first, then lower sequence (older) first
        match self.weight.cmp(&other.weight) {
            std::cmp::Ordering::Equal => other.sequence.cmp(&self.sequence),
            other_ordering => other_ordering,
        }
    }
}

impl std::fmt::Debug for QueuedTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuedTask")
            .field("task_id", &self.task.id())
            .field("weight", &self.weight)
            .field("sequence", &self.sequence)
            .finish()
    }
}

/// Bounded priority queue of pending tasks.
pub struct TaskQueue {
    heap: BinaryHeap<QueuedTask>,
    capacity: usize,
    strategy: SchedulingStrategy,
    sequence: u64,
}

impl TaskQueue {
    /// Creates a queue bounded to `capacity` pending tasks.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize, strategy: SchedulingStrategy) -> Self {
        assert!(capacity > 0, "capacity must be > 0");
        Self {
            heap: BinaryHeap::new(),
            capacity,
            strategy,
            sequence: 0,
        }
    }

    /// Admits a task.
    ///
    /// Callers check [`TaskQueue::is_full`] first; pushing into a full queue
    /// is a logic error guarded here.
    pub fn push(&mut self, task: Task) {
        debug_assert!(!self.is_full(), "push into full queue");
        let weight = match self.strategy {
            SchedulingStrategy::Priority => task.options.priority.weight(),
            SchedulingStrategy::Fifo => 0,
        };
        let sequence = self.sequence;
        self.sequence += 1;
        self.heap.push(QueuedTask {
            task,
            weight,
            sequence,
        });
    }

    /// Removes and returns the highest-priority task, oldest first on ties.
    pub fn pop(&mut self) -> Option<Task> {
        self.heap.pop().map(|queued| queued.task)
    }

    /// Removes every pending task, in scheduling order.
    pub fn drain(&mut self) -> Vec<Task> {
        let mut drained = Vec::with_capacity(self.heap.len());
        while let Some(queued) = self.heap.pop() {
            drained.push(queued.task);
        }
        drained
    }

    /// Returns the number of pending tasks.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Returns true if no tasks are pending.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Returns true if the queue is at capacity.
    pub fn is_full(&self) -> bool {
        self.heap.len() >= self.capacity
    }

    /// Returns the queue capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("len", &self.heap.len())
            .field("capacity", &self.capacity)
            .field("strategy", &self.strategy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Priority, TaskOptions};
    use crate::executor::{TaskValue, WorkFn, WorkFuture};
    use std::sync::Arc;

    fn test_task(priority: Priority) -> Task {
        let work: WorkFn = Arc::new(|| {
            let fut: WorkFuture = Box::pin(async { Ok(Box::new(()) as TaskValue) });
            fut
        });
        let (task, _handle) = Task::new(work, TaskOptions::default().with_priority(priority));
        task
    }

    #[test]
    #[should_panic(expected = "capacity must be > 0")]
    fn test_queue_zero_capacity() {
        TaskQueue::new(0, SchedulingStrategy::Priority);
    }

    #[test]
    fn test_queue_orders_by_priority() {
        let mut queue = TaskQueue::new(16, SchedulingStrategy::Priority);
        queue.push(test_task(Priority::Low));
        queue.push(test_task(Priority::High));
        queue.push(test_task(Priority::Normal));

        let first = queue.pop().unwrap();
        assert_eq!(first.options.priority, Priority::High);
        let second = queue.pop().unwrap();
        assert_eq!(second.options.priority, Priority::Normal);
        let third = queue.pop().unwrap();
        assert_eq!(third.options.priority, Priority::Low);
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_queue_fifo_within_same_priority() {
        let mut queue = TaskQueue::new(16, SchedulingStrategy::Priority);
        let first = test_task(Priority::Normal);
        let second = test_task(Priority::Normal);
        let first_id = first.id();
        let second_id = second.id();

        queue.push(first);
        queue.push(second);

        assert_eq!(queue.pop().unwrap().id(), first_id);
        assert_eq!(queue.pop().unwrap().id(), second_id);
    }

    #[test]
    fn test_fifo_strategy_ignores_priority() {
        let mut queue = TaskQueue::new(16, SchedulingStrategy::Fifo);
        let low = test_task(Priority::Low);
        let high = test_task(Priority::High);
        let low_id = low.id();

        queue.push(low);
        queue.push(high);

        // Insertion order wins even though High outweighs Low
        assert_eq!(queue.pop().unwrap().id(), low_id);
    }

    #[test]
    fn test_queue_capacity_tracking() {
        let mut queue = TaskQueue::new(2, SchedulingStrategy::Priority);
        assert!(queue.is_empty());
        assert!(!queue.is_full());

        queue.push(test_task(Priority::Normal));
        queue.push(test_task(Priority::Normal));
        assert_eq!(queue.len(), 2);
        assert!(queue.is_full());

        queue.pop();
        assert!(!queue.is_full());
    }

    #[test]
    fn test_queue_drain_preserves_scheduling_order() {
        let mut queue = TaskQueue::new(16, SchedulingStrategy::Priority);
        queue.push(test_task(Priority::Low));
        queue.push(test_task(Priority::High));
        queue.push(test_task(Priority::Normal));

        let drained = queue.drain();
        assert!(queue.is_empty());
        assert_eq!(drained.len(), 3);
        assert_eq!(drained[0].options.priority, Priority::High);
        assert_eq!(drained[1].options.priority, Priority::Normal);
        assert_eq!(drained[2].options.priority, Priority::Low);
    }
}
