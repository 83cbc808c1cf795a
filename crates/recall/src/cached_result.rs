// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The fetch algorithm for one cached call.

use std::fmt::{self, Debug};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use recall_store::Storage;
use serde::{Serialize, de::DeserializeOwned};

use crate::entry::expires_after;
use crate::guard::RefreshPermit;
use crate::method_cache::CacheInner;
use crate::telemetry::CacheActivity;
use crate::telemetry::CacheOperation;
use crate::{ArgsDigest, CacheEntry, CacheKey, ComputeError, Error, MethodId, Owner, RefreshJob};

/// The wrapped computation, callable any number of times.
pub type Computation<V> = Arc<dyn Fn() -> BoxFuture<'static, Result<V, ComputeError>> + Send + Sync>;

/// How a stale entry is recomputed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RefreshMode {
    /// The caller that finds the entry stale recomputes it and waits for the new value.
    #[default]
    Blocking,
    /// The caller returns the stale value and hands the recomputation to a job dispatcher.
    Deferred,
}

/// Everything captured about one call: who, what, with which arguments, and how to
/// recompute it.
///
/// Created through [`MethodCache::request`](crate::MethodCache::request) and immutable
/// afterwards.
pub struct FetchRequest<V> {
    pub(crate) owner: Owner,
    pub(crate) method: MethodId,
    pub(crate) args: ArgsDigest,
    pub(crate) ttl: Duration,
    pub(crate) default: V,
    pub(crate) refresh: RefreshMode,
    pub(crate) compute: Computation<V>,
}

impl<V> FetchRequest<V> {
    /// Returns the receiver of the call.
    #[must_use]
    pub fn owner(&self) -> &Owner {
        &self.owner
    }

    /// Returns the called method.
    #[must_use]
    pub fn method(&self) -> MethodId {
        self.method
    }

    /// Returns the digest of the call's arguments.
    #[must_use]
    pub fn args(&self) -> &ArgsDigest {
        &self.args
    }

    /// Returns how long a computed value stays fresh.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the value served when nothing has been cached yet.
    #[must_use]
    pub fn default_value(&self) -> &V {
        &self.default
    }

    /// Returns how stale entries are recomputed.
    #[must_use]
    pub fn refresh_mode(&self) -> RefreshMode {
        self.refresh
    }
}

impl<V: Debug> Debug for FetchRequest<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchRequest")
            .field("owner", &self.owner)
            .field("method", &self.method)
            .field("args", &self.args)
            .field("ttl", &self.ttl)
            .field("default", &self.default)
            .field("refresh", &self.refresh)
            .finish_non_exhaustive()
    }
}

/// Builder for [`FetchRequest`].
///
/// # Examples
///
/// ```
/// use std::convert::Infallible;
/// use std::time::Duration;
///
/// use recall::{CacheConfig, MethodCache, MethodId, Owner};
///
/// # fn main() -> Result<(), recall::Error> {
/// let cache = MethodCache::new(CacheConfig::memory().build());
///
/// let request = cache
///     .request(Owner::of_type("Prices"), MethodId::new("quote"))
///     .ttl(Duration::from_secs(60))
///     .args(&("EUR", "USD"))?
///     .compute(|| async { Ok::<_, Infallible>(Some(1.08_f64)) });
///
/// assert_eq!(request.ttl(), Duration::from_secs(60));
/// assert_eq!(request.default_value(), &None);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct FetchRequestBuilder<V> {
    owner: Owner,
    method: MethodId,
    args: ArgsDigest,
    ttl: Duration,
    default: V,
    refresh: RefreshMode,
}

impl<V> FetchRequestBuilder<V> {
    pub(crate) fn new(owner: Owner, method: MethodId, ttl: Duration, default: V) -> Self {
        Self {
            owner,
            method,
            args: ArgsDigest::empty(),
            ttl,
            default,
            refresh: RefreshMode::Blocking,
        }
    }

    /// Sets how long a computed value stays fresh, overriding the configured default.
    #[must_use]
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sets the value served when nothing has been cached yet.
    #[must_use]
    pub fn default(mut self, default: V) -> Self {
        self.default = default;
        self
    }

    /// Digests the call's arguments into the cache key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encode`] if the arguments cannot be serialized.
    pub fn args<A>(mut self, args: &A) -> Result<Self, Error>
    where
        A: Serialize + ?Sized,
    {
        self.args = ArgsDigest::of(args)?;
        Ok(self)
    }

    /// Uses an argument digest computed elsewhere.
    #[must_use]
    pub fn args_digest(mut self, args: ArgsDigest) -> Self {
        self.args = args;
        self
    }

    /// Chooses deferred refresh (`true`) or blocking refresh (`false`, the default).
    #[must_use]
    pub fn refresh_async(mut self, enabled: bool) -> Self {
        self.refresh = if enabled { RefreshMode::Deferred } else { RefreshMode::Blocking };
        self
    }

    /// Freezes the request with the computation that produces fresh values.
    pub fn compute<F, Fut, E>(self, compute: F) -> FetchRequest<V>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        E: Into<ComputeError> + 'static,
        V: 'static,
    {
        self.computation(Arc::new(move || {
            let fut = compute();
            Box::pin(async move { fut.await.map_err(Into::into) })
        }))
    }

    /// Freezes the request with an already boxed computation.
    pub fn computation(self, compute: Computation<V>) -> FetchRequest<V> {
        FetchRequest {
            owner: self.owner,
            method: self.method,
            args: self.args,
            ttl: self.ttl,
            default: self.default,
            refresh: self.refresh,
            compute,
        }
    }
}

/// One cached call, ready to be fetched.
///
/// `fetch` serves fresh entries without any locking or writes. A stale or missing entry is
/// refreshed by exactly one caller in this process; the refresher first rewrites the stale
/// value with a new expiry so that other readers, including other processes sharing the
/// storage, keep using it while the refresh runs. That rewrite is a soft lock only: two
/// processes that find the entry stale at the same moment may both refresh it.
pub struct CachedResult<S, V> {
    cache: Arc<CacheInner<S>>,
    request: FetchRequest<V>,
}

impl<S, V> CachedResult<S, V> {
    pub(crate) fn new(cache: Arc<CacheInner<S>>, request: FetchRequest<V>) -> Self {
        Self { cache, request }
    }

    /// Returns the request this result was created from.
    #[must_use]
    pub fn request(&self) -> &FetchRequest<V> {
        &self.request
    }
}

impl<S, V> CachedResult<S, V>
where
    S: Storage + 'static,
    V: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Returns the storage key of this call under the current generation.
    ///
    /// # Errors
    ///
    /// Returns an error if the generation lookup fails.
    pub async fn key(&self) -> Result<CacheKey, Error> {
        self.cache
            .key(&self.request.owner, self.request.method, &self.request.args)
            .await
    }

    /// Returns `true` if an entry is stored for this call, fresh or not.
    ///
    /// With generational keys the key needs the method's current generation token, and a
    /// method that has no token yet gets one written to storage. This is the only write
    /// `exist` can cause.
    ///
    /// # Errors
    ///
    /// Returns an error if the generation lookup or the storage backend fails.
    pub async fn exist(&self) -> Result<bool, Error> {
        let key = self.key().await?;
        self.cache.exist(&key).await
    }

    /// Returns the cached value, refreshing it first if it is stale.
    ///
    /// A value computed by this call is returned as is. A call that finds another task of
    /// this process already refreshing the same key waits for it and then returns whatever
    /// is stored, which may still be the stale value.
    ///
    /// # Errors
    ///
    /// Storage failures always propagate. A failure of the computation propagates in
    /// [`RefreshMode::Blocking`]; the stale value written before the computation stays in
    /// storage, so later callers are served it until the ttl elapses again.
    /// [`Error::NoDispatcher`] is returned for a deferred refresh without a dispatcher.
    pub async fn fetch(&self) -> Result<V, Error> {
        let clock = &self.cache.config.clock;
        let start = clock.instant();
        let key = self.key().await?;

        let now = clock.system_time();
        let (entry, found) = self.get_wrapped(&key, now).await?;

        if entry.is_fresh(now) {
            self.cache
                .record(CacheOperation::Fetch, CacheActivity::Hit, &key, Some(clock.elapsed_since(start)));
            return Ok(entry.into_value());
        }

        let activity = if found { CacheActivity::Stale } else { CacheActivity::Miss };
        self.cache.record(CacheOperation::Fetch, activity, &key, None);

        let guard = self.cache.guards.guard(&key);
        if let Some(permit) = guard.try_acquire() {
            return self.refresh(key, permit).await;
        }

        self.cache.record(CacheOperation::Fetch, CacheActivity::Contended, &key, None);
        guard.wait_released().await;
        drop(guard);

        let (entry, _) = self.get_wrapped(&key, clock.system_time()).await?;
        Ok(entry.into_value())
    }

    /// Reads the stored entry, treating a missing one as the default value expiring now.
    async fn get_wrapped(&self, key: &CacheKey, now: std::time::SystemTime) -> Result<(CacheEntry<V>, bool), Error> {
        Ok(match self.cache.read(key).await? {
            Some(entry) => (entry, true),
            None => (CacheEntry::new(self.request.default.clone(), now), false),
        })
    }

    async fn refresh(&self, key: CacheKey, _permit: RefreshPermit) -> Result<V, Error> {
        let clock = &self.cache.config.clock;
        let now = clock.system_time();

        // Another refresher may have finished between our read and acquiring the permit.
        let (current, _) = self.get_wrapped(&key, now).await?;
        if current.is_fresh(now) {
            return Ok(current.into_value());
        }

        let dispatcher = match self.request.refresh {
            RefreshMode::Blocking => None,
            RefreshMode::Deferred => Some(self.cache.config.dispatcher.clone().ok_or(Error::NoDispatcher)?),
        };

        let stale = current.into_value();
        let placeholder = CacheEntry::new(stale.clone(), expires_after(now, self.request.ttl));
        self.cache.write(&key, &placeholder).await?;

        if let Some(dispatcher) = dispatcher {
            dispatcher.enqueue(self.refresh_job(key.clone()));
            self.cache.record(CacheOperation::Refresh, CacheActivity::RefreshEnqueued, &key, None);
            return Ok(stale);
        }

        let timed = clock.timed((self.request.compute)()).await;
        let value = match timed.result {
            Ok(value) => value,
            Err(e) => {
                self.cache
                    .record(CacheOperation::Refresh, CacheActivity::Error, &key, Some(timed.duration));
                return Err(Error::Computation(e));
            }
        };

        let entry = CacheEntry::new(value.clone(), expires_after(clock.system_time(), self.request.ttl));
        self.cache.write(&key, &entry).await?;
        self.cache
            .record(CacheOperation::Refresh, CacheActivity::Refreshed, &key, Some(timed.duration));
        Ok(value)
    }

    fn refresh_job(&self, key: CacheKey) -> RefreshJob {
        let cache = Arc::clone(&self.cache);
        let compute = Arc::clone(&self.request.compute);
        let ttl = self.request.ttl;
        let target = key.clone();

        RefreshJob::new(
            key,
            Box::pin(async move {
                let clock = &cache.config.clock;
                let timed = clock.timed(compute()).await;
                let outcome = match timed.result {
                    Ok(value) => {
                        let entry = CacheEntry::new(value, expires_after(clock.system_time(), ttl));
                        cache.write(&target, &entry).await
                    }
                    Err(e) => Err(Error::Computation(e)),
                };

                match &outcome {
                    Ok(()) => cache.record(CacheOperation::Refresh, CacheActivity::Refreshed, &target, Some(timed.duration)),
                    Err(e) => {
                        tracing::error!(
                            cache.name = cache.config.name,
                            cache.key = %target,
                            error = %e.chain(),
                            "deferred cache refresh failed"
                        );
                        cache.record(CacheOperation::Refresh, CacheActivity::Error, &target, Some(timed.duration));
                    }
                }
                outcome
            }),
        )
    }
}

impl<S, V: Debug> Debug for CachedResult<S, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedResult")
            .field("cache", &self.cache.config.name)
            .field("request", &self.request)
            .finish()
    }
}
