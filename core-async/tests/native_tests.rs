//! Integration tests for the runtime facade as the archiver uses it:
//! bounded worker pools, cooperative shutdown and shared state.

use core_async::sync::{broadcast, CancellationToken, Mutex, Semaphore};
use core_async::task::{self, JoinSet};
use core_async::time::{self, sleep_in_slices, sleep_or_cancel, Duration, Instant};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[core_async::test]
async fn test_task_spawn() {
    let handle = task::spawn(async { 42 });
    assert_eq!(handle.await.unwrap(), 42);
}

#[core_async::test]
async fn test_spawn_blocking() {
    let handle = task::spawn_blocking(|| {
        std::thread::sleep(std::time::Duration::from_millis(10));
        100
    });
    assert_eq!(handle.await.unwrap(), 100);
}

#[core_async::test]
async fn test_timeout_failure() {
    let result = time::timeout(Duration::from_millis(10), async {
        time::sleep(Duration::from_millis(200)).await;
        42
    })
    .await;
    assert!(result.is_err());
}

#[core_async::test]
async fn test_semaphore_bounds_join_set() {
    let permits = Arc::new(Semaphore::new(3));
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let mut set = JoinSet::new();

    for i in 0..10u64 {
        let permit = Arc::clone(&permits).acquire_owned().await.unwrap();
        let running = Arc::clone(&running);
        let peak = Arc::clone(&peak);
        set.spawn(async move {
            let _permit = permit;
            let now = running.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            time::sleep(Duration::from_millis(5 + (i % 3) * 5)).await;
            running.fetch_sub(1, Ordering::SeqCst);
            i
        });
    }

    let mut finished = Vec::new();
    while let Some(joined) = set.join_next().await {
        finished.push(joined.unwrap());
    }
    finished.sort_unstable();

    assert_eq!(finished, (0..10).collect::<Vec<_>>());
    assert!(peak.load(Ordering::SeqCst) <= 3);
}

#[core_async::test]
async fn test_child_token_follows_parent() {
    let parent = CancellationToken::new();
    let child = parent.child_token();

    let waiter = task::spawn(async move {
        child.cancelled().await;
        true
    });

    parent.cancel();
    assert!(waiter.await.unwrap());
}

#[core_async::test]
async fn test_cancelled_sleep_returns_promptly() {
    let token = CancellationToken::new();
    let canceller = token.clone();
    task::spawn(async move {
        time::sleep(Duration::from_millis(20)).await;
        canceller.cancel();
    });

    let start = Instant::now();
    assert!(!sleep_or_cancel(Duration::from_secs(30), &token).await);
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[core_async::test]
async fn test_sliced_sleep_completes() {
    let token = CancellationToken::new();
    let start = Instant::now();
    assert!(sleep_in_slices(Duration::from_millis(30), Duration::from_millis(10), &token).await);
    assert!(start.elapsed() >= Duration::from_millis(30));
}

#[core_async::test]
async fn test_shared_mutex_across_tasks() {
    let counter = Arc::new(Mutex::new(0u32));
    let mut set = JoinSet::new();
    for _ in 0..8 {
        let counter = Arc::clone(&counter);
        set.spawn(async move {
            *counter.lock().await += 1;
        });
    }
    while set.join_next().await.is_some() {}
    assert_eq!(*counter.lock().await, 8);
}

#[core_async::test]
async fn test_broadcast_reaches_every_subscriber() {
    let (tx, mut first) = broadcast::channel(4);
    let mut second = tx.subscribe();

    tx.send("pass-completed").unwrap();

    assert_eq!(first.recv().await.unwrap(), "pass-completed");
    assert_eq!(second.recv().await.unwrap(), "pass-completed");
}

#[test]
fn test_block_on_and_multi_thread_runtime() {
    assert_eq!(core_async::runtime::block_on(async { 7 }), 7);

    let runtime = core_async::runtime::multi_thread(2).unwrap();
    let value = runtime.block_on(async { task::spawn(async { 9 }).await.unwrap() });
    assert_eq!(value, 9);
}
