//! Integration tests for the high-level dispatch API.
//!
//! These tests drive the collection operations end to end through a real
//! pool: order preservation under concurrency, batching bounds, sequential
//! reduction, cooperative short-circuit, and the batch/parallel failure
//! contracts.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use taskpool::config::{PoolConfig, TaskOptions};
use taskpool::dispatch::{batch_task, BatchTask, DispatchOptions, Dispatcher};
use taskpool::error::TaskError;
use taskpool::pool::PoolManager;
use tokio_util::sync::CancellationToken;

// =============================================================================
// Test Helpers
// =============================================================================

fn dispatcher_with(min: usize, max: usize) -> Dispatcher {
    Dispatcher::new(PoolManager::new(PoolConfig::new(min, max)).unwrap())
}

// =============================================================================
// Integration Tests
// =============================================================================

#[tokio::test]
async fn test_map_output_matches_input_positionally() {
    let dispatcher = dispatcher_with(1, 4);
    let input: Vec<i64> = (0..50).collect();

    let output = dispatcher
        .map(
            input.clone(),
            |x: i64| x * x,
            &DispatchOptions::default().with_batch_size(8),
        )
        .await
        .unwrap();

    assert_eq!(output.len(), input.len());
    for (i, value) in output.iter().enumerate() {
        assert_eq!(*value, (i as i64) * (i as i64));
    }
}

#[tokio::test]
async fn test_map_with_varied_completion_times_keeps_order() {
    let dispatcher = dispatcher_with(2, 4);

    // Later elements finish sooner; output must still match input order.
    let output = dispatcher
        .map(
            vec![40u64, 30, 20, 10, 0],
            |delay: u64| {
                std::thread::sleep(Duration::from_millis(delay));
                delay
            },
            &DispatchOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(output, vec![40, 30, 20, 10, 0]);
}

#[tokio::test]
async fn test_batching_bounds_in_flight_concurrency() {
    let dispatcher = dispatcher_with(4, 4);
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let in_flight_clone = Arc::clone(&in_flight);
    let peak_clone = Arc::clone(&peak);

    dispatcher
        .map(
            (0..12).collect::<Vec<i32>>(),
            move |_| {
                let current = in_flight_clone.fetch_add(1, Ordering::SeqCst) + 1;
                peak_clone.fetch_max(current, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(15));
                in_flight_clone.fetch_sub(1, Ordering::SeqCst);
            },
            &DispatchOptions::default().with_batch_size(2),
        )
        .await
        .unwrap();

    // Chunks are sequential, so at most one chunk's worth runs at once.
    assert!(peak.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn test_partition_property() {
    let dispatcher = dispatcher_with(1, 4);
    let items: Vec<i32> = (0..40).collect();

    let (matching, non_matching) = dispatcher
        .partition(items.clone(), |x: i32| x % 2 == 0, &DispatchOptions::default())
        .await
        .unwrap();

    assert_eq!(matching.len() + non_matching.len(), items.len());
    assert!(matching.iter().all(|x| x % 2 == 0));
    assert!(non_matching.iter().all(|x| x % 2 != 0));
}

#[tokio::test]
async fn test_reduce_order_sensitivity_end_to_end() {
    let dispatcher = dispatcher_with(1, 4);
    let concatenated = dispatcher
        .reduce(
            vec!["a", "b", "c", "d"],
            String::new(),
            |acc: String, s: &str| acc + s,
            &DispatchOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(concatenated, "abcd");
}

#[tokio::test]
async fn test_short_circuit_does_not_cancel_batch_siblings() {
    let dispatcher = dispatcher_with(2, 4);
    let evaluated = Arc::new(AtomicUsize::new(0));
    let evaluated_clone = Arc::clone(&evaluated);

    let options = DispatchOptions::default().with_batch_size(4);
    let index = dispatcher
        .find_index(
            (0..32).collect::<Vec<i32>>(),
            move |x| {
                evaluated_clone.fetch_add(1, Ordering::SeqCst);
                x == 0
            },
            &options,
        )
        .await
        .unwrap();

    assert_eq!(index, Some(0));
    // The whole first batch ran (cooperative short-circuit), nothing more.
    assert_eq!(evaluated.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_batch_mixed_outcomes_scenario() {
    let dispatcher = dispatcher_with(1, 4);
    let tasks: Vec<BatchTask<i32>> = vec![
        batch_task(|| -> i32 { panic!("boom") }),
        batch_task(|| 5),
    ];

    let outcomes = dispatcher
        .batch(tasks, &DispatchOptions::default())
        .await
        .unwrap();

    assert_eq!(outcomes.len(), 2);
    assert!(!outcomes[0].success);
    assert!(outcomes[0].error.as_deref().unwrap().contains("panic"));
    assert!(outcomes[0].result.is_none());
    assert!(outcomes[1].success);
    assert_eq!(outcomes[1].result, Some(5));
}

#[tokio::test]
async fn test_parallel_rethrows_with_all_messages() {
    let dispatcher = dispatcher_with(1, 4);
    let tasks: Vec<BatchTask<i32>> = vec![
        batch_task(|| 1),
        batch_task(|| -> i32 { panic!("alpha") }),
        batch_task(|| 3),
        batch_task(|| -> i32 { panic!("beta") }),
    ];

    let error = dispatcher
        .parallel(tasks, &DispatchOptions::default())
        .await
        .unwrap_err();

    let TaskError::ExecutionFailed(message) = error else {
        panic!("expected ExecutionFailed");
    };
    // Two failures joined into one message.
    assert_eq!(message.matches("panicked").count(), 2);
}

#[tokio::test]
async fn test_run_applies_timeout() {
    let dispatcher = dispatcher_with(1, 2);
    let result: Result<(), _> = dispatcher
        .run(
            |_: ()| std::thread::sleep(Duration::from_secs(5)),
            (),
            TaskOptions::default().with_timeout(Duration::from_millis(30)),
        )
        .await;
    assert_eq!(
        result.unwrap_err(),
        TaskError::TimedOut(Duration::from_millis(30))
    );
}

#[tokio::test]
async fn test_run_retries_then_succeeds() {
    let dispatcher = dispatcher_with(1, 2);
    let attempts = Arc::new(AtomicUsize::new(0));
    let attempts_clone = Arc::clone(&attempts);

    let value = dispatcher
        .run(
            move |_: ()| {
                if attempts_clone.fetch_add(1, Ordering::SeqCst) < 2 {
                    panic!("transient");
                }
                99u32
            },
            (),
            TaskOptions::default().with_max_retries(3),
        )
        .await
        .unwrap();

    assert_eq!(value, 99);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_abort_signal_stops_the_wait() {
    let dispatcher = dispatcher_with(1, 2);
    let signal = CancellationToken::new();
    let signal_clone = signal.clone();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        signal_clone.cancel();
    });

    let result: Result<(), _> = dispatcher
        .run(
            |_: ()| std::thread::sleep(Duration::from_secs(5)),
            (),
            TaskOptions::default().with_signal(signal),
        )
        .await;
    assert_eq!(result.unwrap_err(), TaskError::Aborted);
}

#[tokio::test]
async fn test_group_by_and_count_compose() {
    let dispatcher = dispatcher_with(1, 4);
    let words = vec![
        "ant".to_string(),
        "bee".to_string(),
        "ape".to_string(),
        "bat".to_string(),
        "cow".to_string(),
    ];

    let groups = dispatcher
        .group_by(
            words.clone(),
            |word: String| word.chars().next().unwrap(),
            &DispatchOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(groups.keys().copied().collect::<Vec<char>>(), vec!['a', 'b', 'c']);

    let count = dispatcher
        .count(
            words,
            |word: String| word.starts_with('a'),
            &DispatchOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(count, 2);
}

#[tokio::test]
async fn test_stats_reflect_dispatch_activity() {
    let dispatcher = dispatcher_with(1, 2);
    dispatcher
        .map(
            (0..5).collect::<Vec<i32>>(),
            |x| x + 1,
            &DispatchOptions::default(),
        )
        .await
        .unwrap();

    let stats = dispatcher.get_stats();
    assert_eq!(stats.completed_tasks, 5);
    assert_eq!(stats.queued_tasks, 0);

    dispatcher.terminate().await;
    let stats = dispatcher.get_stats();
    assert_eq!(stats.active_executors + stats.idle_executors, 0);
}
