// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Concurrency tests: single-flight refresh within a process and deferred refresh on Tokio.

use std::convert::Infallible;
use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::poll;
use recall::{
    CacheConfig, CacheEntry, ClockControl, FetchRequest, MemoryStorage, MethodCache, MethodId, Owner, QueueDispatcher, Storage,
    TokioDispatcher,
};
use recall_store::testing::MockStorage;
use tokio::sync::{Barrier, Notify};

const TASKS: usize = 10;
const SLOW: MethodId = MethodId::new("slow_sum");

fn slow_request(cache: &MethodCache<MemoryStorage>, calls: &Arc<AtomicUsize>, deferred: bool) -> FetchRequest<u64> {
    let calls = Arc::clone(calls);
    cache
        .request(Owner::of_type("Warehouse"), SLOW)
        .ttl(Duration::from_secs(3600))
        .refresh_async(deferred)
        .compute(move || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok::<_, Infallible>(1234)
            }
        })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_blocking_fetches_compute_once() {
    let cache = MethodCache::new(CacheConfig::memory().generational(false).build());
    let calls = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(TASKS));

    let handles: Vec<_> = (0..TASKS)
        .map(|_| {
            let cache = cache.clone();
            let calls = Arc::clone(&calls);
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                let result = cache.cached_result(slow_request(&cache, &calls, false));
                barrier.wait().await;
                result.fetch().await
            })
        })
        .collect();

    for handle in handles {
        let value = handle.await.unwrap().unwrap();
        // Callers arriving during the refresh see the placeholder holding the default.
        assert!(value == 1234 || value == 0, "unexpected value {value}");
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let result = cache.cached_result(slow_request(&cache, &calls, false));
    assert_eq!(result.fetch().await.unwrap(), 1234);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_deferred_fetches_enqueue_once() {
    let queue = QueueDispatcher::new();
    let cache = MethodCache::new(CacheConfig::memory().generational(false).dispatcher(queue.clone()).build());
    let calls = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(TASKS));

    let handles: Vec<_> = (0..TASKS)
        .map(|_| {
            let cache = cache.clone();
            let calls = Arc::clone(&calls);
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                let result = cache.cached_result(slow_request(&cache, &calls, true));
                barrier.wait().await;
                result.fetch().await
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), 0);
    }

    assert_eq!(queue.len(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn tokio_dispatcher_refreshes_in_background() {
    let cache = MethodCache::new(CacheConfig::memory().dispatcher(TokioDispatcher::new()).build());
    let calls = Arc::new(AtomicUsize::new(0));
    let result = cache.cached_result(slow_request(&cache, &calls, true));

    assert_eq!(result.fetch().await.unwrap(), 0);

    let refreshed = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let value = result.fetch().await.unwrap();
            if value == 1234 {
                return value;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    assert_eq!(refreshed, 1234);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn contended_fetch_waits_and_serves_placeholder_of_failed_refresh() {
    let control = ClockControl::new();
    let storage = MockStorage::new();
    let cache = MethodCache::new(
        CacheConfig::builder(storage.clone())
            .clock(control.to_clock())
            .generational(false)
            .build(),
    );
    let calls = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Notify::new());

    let compute = {
        let calls = Arc::clone(&calls);
        let gate = Arc::clone(&gate);
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            let gate = Arc::clone(&gate);
            async move {
                gate.notified().await;
                Err::<u64, _>(std::io::Error::other("feed offline"))
            }
        }
    };
    let request = || {
        cache
            .request(Owner::of_type("Ticker"), MethodId::new("last"))
            .ttl(Duration::from_secs(60))
            .compute(compute.clone())
    };
    let leader = cache.cached_result(request());
    let follower = cache.cached_result(request());

    // A value that expired just now.
    let key = leader.key().await.unwrap();
    let stale = CacheEntry::new(7_u64, control.system_time()).encode().unwrap();
    storage.set(key.as_str(), stale, None).await.unwrap();

    let mut leader_fetch = pin!(leader.fetch());
    assert!(poll!(&mut leader_fetch).is_pending());
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // The leader's placeholder goes stale while its computation is still running.
    control.advance(Duration::from_secs(61));

    let mut follower_fetch = pin!(follower.fetch());
    assert!(poll!(&mut follower_fetch).is_pending());
    assert!(poll!(&mut follower_fetch).is_pending());

    gate.notify_one();
    let error = leader_fetch.await.unwrap_err();
    assert!(error.computation_as::<std::io::Error>().is_some());

    assert_eq!(follower_fetch.await.unwrap(), 7);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
