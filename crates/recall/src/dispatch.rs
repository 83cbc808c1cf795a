// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Deferred refresh jobs and the dispatchers that run them.

use std::collections::VecDeque;
use std::fmt::{self, Debug};
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::Mutex;

use crate::{CacheKey, Error};

/// A unit of deferred work that recomputes one cache entry and overwrites it.
///
/// A failing job logs the failure with its key and records it through the cache's
/// telemetry, so dispatchers are free to discard the result of [`run`](Self::run).
pub struct RefreshJob {
    key: CacheKey,
    work: BoxFuture<'static, Result<(), Error>>,
}

impl RefreshJob {
    /// Creates a job targeting `key`.
    pub fn new(key: CacheKey, work: BoxFuture<'static, Result<(), Error>>) -> Self {
        Self { key, work }
    }

    /// Returns the key this job refreshes.
    #[must_use]
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Runs the job to completion.
    ///
    /// # Errors
    ///
    /// Returns the storage or computation failure that stopped the refresh.
    pub async fn run(self) -> Result<(), Error> {
        self.work.await
    }
}

impl Debug for RefreshJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshJob").field("key", &self.key).finish_non_exhaustive()
    }
}

/// Runs refresh jobs outside the caller's task.
///
/// Enqueueing is fire-and-forget: it must not wait for the job or for the queue to drain.
/// Delivery may be at-least-once; a refresh that runs twice only rewrites the same entry.
pub trait JobDispatcher: Send + Sync + Debug {
    /// Hands `job` over for deferred execution.
    fn enqueue(&self, job: RefreshJob);
}

impl<D> JobDispatcher for Arc<D>
where
    D: JobDispatcher + ?Sized,
{
    fn enqueue(&self, job: RefreshJob) {
        (**self).enqueue(job);
    }
}

/// Spawns each job as a Tokio task.
#[cfg(any(feature = "rt-tokio", test))]
#[derive(Debug, Clone, Default)]
pub struct TokioDispatcher {
    handle: Option<tokio::runtime::Handle>,
}

#[cfg(any(feature = "rt-tokio", test))]
impl TokioDispatcher {
    /// Creates a dispatcher that spawns onto the runtime current at enqueue time.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a dispatcher that always spawns onto `handle`.
    #[must_use]
    pub fn with_handle(handle: tokio::runtime::Handle) -> Self {
        Self { handle: Some(handle) }
    }
}

#[cfg(any(feature = "rt-tokio", test))]
impl JobDispatcher for TokioDispatcher {
    /// # Panics
    ///
    /// Panics when created with [`TokioDispatcher::new`] and called outside a Tokio runtime.
    fn enqueue(&self, job: RefreshJob) {
        let work = async move {
            let _outcome = job.run().await;
        };
        match &self.handle {
            Some(handle) => drop(handle.spawn(work)),
            None => drop(tokio::spawn(work)),
        }
    }
}

/// Holds jobs in memory until they are drained explicitly.
///
/// Useful where refreshes should run at a point the application chooses, such as the end
/// of a batch, and in tests that need to observe exactly which refreshes were requested.
/// All clones share the same queue.
///
/// # Examples
///
/// ```
/// use recall::{CacheKey, JobDispatcher, QueueDispatcher, RefreshJob};
/// # use recall::{ArgsDigest, MethodId, Owner};
///
/// # futures::executor::block_on(async {
/// let queue = QueueDispatcher::new();
/// # let key = CacheKey::build(&Owner::of_type("Doc"), MethodId::new("run"), None, &ArgsDigest::empty());
/// queue.enqueue(RefreshJob::new(key, Box::pin(async { Ok(()) })));
/// assert_eq!(queue.len(), 1);
///
/// let outcomes = queue.run_all().await;
/// assert!(outcomes[0].1.is_ok());
/// assert!(queue.is_empty());
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct QueueDispatcher {
    jobs: Arc<Mutex<VecDeque<RefreshJob>>>,
}

impl QueueDispatcher {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of pending jobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    /// Returns `true` when no jobs are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }

    /// Returns the keys of the pending jobs in enqueue order.
    #[must_use]
    pub fn pending_keys(&self) -> Vec<CacheKey> {
        self.jobs.lock().iter().map(|job| job.key().clone()).collect()
    }

    /// Removes the oldest pending job.
    #[must_use]
    pub fn pop(&self) -> Option<RefreshJob> {
        self.jobs.lock().pop_front()
    }

    /// Runs every pending job in order and returns each job's key with its outcome.
    ///
    /// Jobs enqueued while draining are run too.
    pub async fn run_all(&self) -> Vec<(CacheKey, Result<(), Error>)> {
        let mut outcomes = Vec::new();
        while let Some(job) = self.pop() {
            let key = job.key().clone();
            outcomes.push((key, job.run().await));
        }
        outcomes
    }
}

impl JobDispatcher for QueueDispatcher {
    fn enqueue(&self, job: RefreshJob) {
        self.jobs.lock().push_back(job);
    }
}
