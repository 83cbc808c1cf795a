// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for the fetch algorithm against a recording mock backend.

use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::{Duration, SystemTime};

use recall::{CacheConfig, CacheEntry, CacheKey, ClockControl, Error, MethodCache, MethodId, Owner, QueueDispatcher};
use recall_store::testing::{MockStorage, StorageOp};

type TestResult = Result<(), Error>;

const ANSWER: MethodId = MethodId::new("answer");
const TTL: Duration = Duration::from_secs(60);

fn block_on<F: std::future::Future>(f: F) -> F::Output {
    futures::executor::block_on(f)
}

fn start() -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000)
}

fn cache(storage: &MockStorage, control: &ClockControl) -> MethodCache<MockStorage> {
    MethodCache::new(
        CacheConfig::builder(storage.clone())
            .clock(control.to_clock())
            .default_ttl(TTL)
            .generational(false)
            .build(),
    )
}

/// A computation returning 42, 43, 44, ... on successive calls.
fn sequence(calls: &Arc<AtomicU32>) -> impl Fn() -> futures::future::BoxFuture<'static, Result<Option<u32>, Infallible>> + Send + Sync + 'static {
    let calls = Arc::clone(calls);
    move || {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move { Ok(Some(42 + n)) })
    }
}

fn set_entries(storage: &MockStorage, key: &CacheKey) -> Vec<CacheEntry<Option<u32>>> {
    storage
        .writes()
        .into_iter()
        .filter_map(|op| match op {
            StorageOp::Set { key: k, value, ttl } if k == key.as_str() => {
                assert_eq!(ttl, None, "result entries never carry a backend ttl");
                Some(CacheEntry::decode(key, &value).unwrap())
            }
            _ => None,
        })
        .collect()
}

#[test]
fn walkthrough_of_cold_fresh_and_stale_calls() -> TestResult {
    let storage = MockStorage::new();
    let control = ClockControl::new_at(start());
    let cache = cache(&storage, &control);
    let calls = Arc::new(AtomicU32::new(0));

    let result = cache.cached_result(
        cache
            .request(Owner::of_type("Oracle"), ANSWER)
            .ttl(TTL)
            .compute(sequence(&calls)),
    );
    let key = block_on(result.key())?;

    // Call 1: cold.
    assert!(!block_on(result.exist())?);
    assert_eq!(block_on(result.fetch())?, Some(42));
    let entries = set_entries(&storage, &key);
    assert_eq!(entries.last().unwrap(), &CacheEntry::new(Some(42), start() + TTL));

    // Call 2: fresh, no writes.
    storage.clear_operations();
    control.advance(Duration::from_secs(10));
    assert_eq!(block_on(result.fetch())?, Some(42));
    assert!(storage.writes().is_empty());

    // Call 3: stale; the old value is extended before the recomputation overwrites it.
    control.advance(Duration::from_secs(60));
    assert_eq!(block_on(result.fetch())?, Some(43));
    let t70 = start() + Duration::from_secs(70);
    assert_eq!(
        set_entries(&storage, &key),
        vec![CacheEntry::new(Some(42), t70 + TTL), CacheEntry::new(Some(43), t70 + TTL)]
    );

    // Fresh until the new expiry.
    control.advance(Duration::from_secs(59));
    assert_eq!(block_on(result.fetch())?, Some(43));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    Ok(())
}

#[test]
fn deferred_refresh_serves_stale_value_and_enqueues_once() -> TestResult {
    let storage = MockStorage::new();
    let control = ClockControl::new_at(start());
    let queue = QueueDispatcher::new();
    let cache = MethodCache::new(
        CacheConfig::builder(storage.clone())
            .clock(control.to_clock())
            .dispatcher(queue.clone())
            .generational(false)
            .build(),
    );
    let calls = Arc::new(AtomicU32::new(0));

    let blocking = cache.cached_result(
        cache
            .request(Owner::of_type("Oracle"), MethodId::new("parallel"))
            .ttl(TTL)
            .compute(sequence(&calls)),
    );
    assert_eq!(block_on(blocking.fetch())?, Some(42));

    control.advance(Duration::from_secs(71));
    let deferred = cache.cached_result(
        cache
            .request(Owner::of_type("Oracle"), MethodId::new("parallel"))
            .ttl(TTL)
            .refresh_async(true)
            .compute(sequence(&calls)),
    );

    assert_eq!(block_on(deferred.fetch())?, Some(42));
    assert_eq!(block_on(deferred.fetch())?, Some(42));
    assert_eq!(queue.len(), 1);
    assert_eq!(queue.pending_keys(), vec![block_on(deferred.key())?]);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    for (_, outcome) in block_on(queue.run_all()) {
        outcome?;
    }
    assert_eq!(block_on(deferred.fetch())?, Some(43));
    Ok(())
}

#[test]
fn failed_refresh_serves_last_good_value_for_one_window() -> TestResult {
    let storage = MockStorage::new();
    let control = ClockControl::new_at(start());
    let cache = cache(&storage, &control);
    let calls = Arc::new(AtomicUsize::new(0));
    let failing = Arc::new(std::sync::atomic::AtomicBool::new(false));

    let request = {
        let calls = Arc::clone(&calls);
        let failing = Arc::clone(&failing);
        cache.request(Owner::of_type("Weather"), MethodId::new("forecast")).compute(move || {
            calls.fetch_add(1, Ordering::SeqCst);
            let fail = failing.load(Ordering::SeqCst);
            async move {
                if fail {
                    Err(std::io::Error::other("upstream down"))
                } else {
                    Ok("sunny".to_string())
                }
            }
        })
    };
    let result = cache.cached_result(request);

    assert_eq!(block_on(result.fetch())?, "sunny");

    failing.store(true, Ordering::SeqCst);
    control.advance(TTL);
    let error = block_on(result.fetch()).unwrap_err();
    assert_eq!(error.computation_as::<std::io::Error>().unwrap().to_string(), "upstream down");
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    control.advance(TTL - Duration::from_secs(1));
    assert_eq!(block_on(result.fetch())?, "sunny");
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    // The window has elapsed; the next caller retries.
    failing.store(false, Ordering::SeqCst);
    control.advance(Duration::from_secs(1));
    assert_eq!(block_on(result.fetch())?, "sunny");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    Ok(())
}

#[test]
fn storage_failures_propagate() {
    let storage = MockStorage::new();
    let control = ClockControl::new_at(start());
    let cache = cache(&storage, &control);
    let result = cache.cached_result(
        cache
            .request(Owner::of_type("Oracle"), ANSWER)
            .compute(|| async { Ok::<_, Infallible>(1_u8) }),
    );

    storage.fail_when(|op| matches!(op, StorageOp::Get(_)));
    assert!(block_on(result.fetch()).unwrap_err().is_storage());

    storage.fail_when(|op| matches!(op, StorageOp::Exist(_)));
    assert!(matches!(block_on(result.exist()), Err(Error::Storage(_))));

    // A failed placeholder write releases the guard, so the next call can refresh.
    storage.fail_when(StorageOp::is_write);
    assert!(block_on(result.fetch()).unwrap_err().is_storage());
    storage.clear_failures();
    assert_eq!(block_on(result.fetch()).unwrap(), 1);
}

#[test]
fn keys_discriminate_instances_but_not_type_level_calls() -> TestResult {
    let storage = MockStorage::new();
    let control = ClockControl::new_at(start());
    let cache = cache(&storage, &control);

    let key_for = |owner: Owner| {
        let request = cache
            .request(owner, ANSWER)
            .args(&(1_u8, "x"))
            .unwrap()
            .compute(|| async { Ok::<_, Infallible>(0_u8) });
        block_on(cache.cached_result(request).key())
    };

    assert_ne!(
        key_for(Owner::instance("Account", &1_u64)?)?,
        key_for(Owner::instance("Account", &2_u64)?)?
    );
    assert_eq!(key_for(Owner::of_type("Account"))?, key_for(Owner::of_type("Account"))?);
    assert_ne!(key_for(Owner::of_type("Account"))?, key_for(Owner::instance("Account", &1_u64)?)?);
    Ok(())
}

#[test]
fn advancing_the_generation_turns_entries_into_misses() -> TestResult {
    let storage = MockStorage::new();
    let control = ClockControl::new_at(start());
    let queue = QueueDispatcher::new();
    let cache = MethodCache::new(
        CacheConfig::builder(storage.clone())
            .clock(control.to_clock())
            .dispatcher(queue.clone())
            .build(),
    );
    let calls = Arc::new(AtomicU32::new(0));
    let owner = Owner::instance("Report", "q3")?;

    let request = |deferred: bool| {
        cache
            .request(owner.clone(), ANSWER)
            .args(&("EMEA",))
            .unwrap()
            .refresh_async(deferred)
            .compute(sequence(&calls))
    };

    assert_eq!(block_on(cache.fetch(request(false)))?, Some(42));
    assert!(block_on(cache.cached_result(request(false)).exist())?);

    block_on(cache.clear_all(&owner, ANSWER))?;

    // Previously cached entries are unreachable: the default comes back immediately stale.
    assert!(!block_on(cache.cached_result(request(true)).exist())?);
    assert_eq!(block_on(cache.fetch(request(true)))?, None);
    assert_eq!(queue.len(), 1);
    Ok(())
}
