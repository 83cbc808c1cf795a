// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Per-key refresh guards.
//!
//! Guards serialize refreshes of one key within this process only. Across processes the
//! placeholder entry written by the refresher is the only coordination, and it is a soft
//! lock: two processes that race past the staleness check can both refresh.

use std::collections::HashMap;
use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::CacheKey;

const PRUNE_THRESHOLD: usize = 64;

/// A try-acquire flag plus a wakeup for callers that lost the race.
#[derive(Debug, Default)]
pub(crate) struct KeyGuard {
    held: AtomicBool,
    released: Notify,
}

impl KeyGuard {
    /// Claims the guard without blocking.
    pub(crate) fn try_acquire(self: &Arc<Self>) -> Option<RefreshPermit> {
        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RefreshPermit { guard: Arc::clone(self) })
    }

    pub(crate) fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }

    /// Waits until the current holder releases the guard.
    ///
    /// Returns immediately when the guard is free.
    pub(crate) async fn wait_released(&self) {
        let mut notified = pin!(self.released.notified());
        notified.as_mut().enable();
        if self.is_held() {
            notified.await;
        }
    }
}

/// Proof that the holder is the designated refresher for a key.
///
/// Dropping the permit releases the guard and wakes every waiter, whether the refresh
/// succeeded, failed, panicked or was cancelled.
#[derive(Debug)]
pub(crate) struct RefreshPermit {
    guard: Arc<KeyGuard>,
}

impl Drop for RefreshPermit {
    fn drop(&mut self) {
        self.guard.held.store(false, Ordering::Release);
        self.guard.released.notify_waiters();
    }
}

/// Maps keys to the guards of refreshes currently in progress.
///
/// Entries are weak so a guard lives only while some caller is on the stale path for its
/// key. Dead slots are pruned as the table grows.
#[derive(Debug, Default)]
pub(crate) struct GuardTable {
    guards: Mutex<HashMap<CacheKey, Weak<KeyGuard>>>,
}

impl GuardTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns the live guard for `key`, creating it if needed.
    pub(crate) fn guard(&self, key: &CacheKey) -> Arc<KeyGuard> {
        let mut guards = self.guards.lock();

        if let Some(existing) = guards.get(key).and_then(Weak::upgrade) {
            return existing;
        }

        if guards.len() >= PRUNE_THRESHOLD {
            guards.retain(|_, guard| guard.strong_count() > 0);
        }

        let guard = Arc::new(KeyGuard::default());
        guards.insert(key.clone(), Arc::downgrade(&guard));
        guard
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.guards.lock().len()
    }
}
