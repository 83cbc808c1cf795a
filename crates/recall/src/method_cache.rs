// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{self, Debug};
use std::sync::Arc;
use std::time::Duration;

use recall_store::Storage;
use serde::{Serialize, de::DeserializeOwned};

use crate::guard::GuardTable;
use crate::telemetry::{CacheActivity, CacheOperation};
use crate::{
    ArgsDigest, CacheConfig, CacheEntry, CacheKey, CachedMethodBuilder, CachedResult, Error, FetchRequest, FetchRequestBuilder,
    MethodId, Owner,
};

pub(crate) struct CacheInner<S> {
    pub(crate) config: CacheConfig<S>,
    pub(crate) guards: GuardTable,
}

impl<S> CacheInner<S> {
    #[allow(unused_variables, reason = "recording is a no-op without the logs or metrics feature")]
    pub(crate) fn record(&self, operation: CacheOperation, activity: CacheActivity, key: &CacheKey, duration: Option<Duration>) {
        #[cfg(any(feature = "logs", feature = "metrics", test))]
        if let Some(telemetry) = &self.config.telemetry {
            telemetry.record(self.config.name, operation, activity, key, duration);
        }
    }
}

impl<S: Storage> CacheInner<S> {
    pub(crate) async fn key(&self, owner: &Owner, method: MethodId, args: &ArgsDigest) -> Result<CacheKey, Error> {
        let generation = if self.config.generational {
            Some(self.config.generations.current(owner, method).await?)
        } else {
            None
        };
        Ok(CacheKey::build(owner, method, generation.as_ref(), args))
    }

    pub(crate) async fn read<V>(&self, key: &CacheKey) -> Result<Option<CacheEntry<V>>, Error>
    where
        V: DeserializeOwned,
    {
        match self.config.storage.get(key.as_str()).await? {
            Some(bytes) => CacheEntry::decode(key, &bytes).map(Some),
            None => Ok(None),
        }
    }

    pub(crate) async fn exist(&self, key: &CacheKey) -> Result<bool, Error> {
        let timed = self.config.clock.timed(self.config.storage.exist(key.as_str())).await;
        let (activity, outcome) = match timed.result {
            Ok(true) => (CacheActivity::Hit, Ok(true)),
            Ok(false) => (CacheActivity::Miss, Ok(false)),
            Err(e) => (CacheActivity::Error, Err(e.into())),
        };
        self.record(CacheOperation::Exist, activity, key, Some(timed.duration));
        outcome
    }

    pub(crate) async fn write<V>(&self, key: &CacheKey, entry: &CacheEntry<V>) -> Result<(), Error>
    where
        V: Serialize,
    {
        let bytes = entry.encode()?;
        self.config.storage.set(key.as_str(), bytes, None).await?;
        Ok(())
    }
}

/// Entry point for caching method results.
///
/// A `MethodCache` owns a [`CacheConfig`] and the per-key refresh guards of this process.
/// Cloning is cheap and every clone shares both, so one instance should serve all cached
/// methods that use the same storage.
///
/// # Examples
///
/// ```
/// use std::convert::Infallible;
/// use std::time::Duration;
///
/// use recall::{CacheConfig, MethodCache, MethodId, Owner};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), recall::Error> {
/// let cache = MethodCache::new(CacheConfig::memory().build());
///
/// let request = cache
///     .request(Owner::instance("Account", &1001_u64)?, MethodId::new("balance"))
///     .ttl(Duration::from_secs(30))
///     .compute(|| async { Ok::<_, Infallible>(250_i64) });
///
/// let balance = cache.cached_result(request).fetch().await?;
/// assert_eq!(balance, 250);
/// # Ok(())
/// # }
/// ```
pub struct MethodCache<S> {
    inner: Arc<CacheInner<S>>,
}

impl<S> Clone for MethodCache<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> MethodCache<S> {
    /// Creates a cache from a finished configuration.
    #[must_use]
    pub fn new(config: CacheConfig<S>) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                config,
                guards: GuardTable::new(),
            }),
        }
    }

    pub(crate) fn inner(&self) -> &Arc<CacheInner<S>> {
        &self.inner
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &CacheConfig<S> {
        &self.inner.config
    }

    /// Starts describing a call of `method` on `owner` whose default value is `V::default()`.
    pub fn request<V>(&self, owner: Owner, method: MethodId) -> FetchRequestBuilder<V>
    where
        V: Default,
    {
        self.request_or(owner, method, V::default())
    }

    /// Starts describing a call of `method` on `owner` with an explicit default value.
    pub fn request_or<V>(&self, owner: Owner, method: MethodId, default: V) -> FetchRequestBuilder<V> {
        FetchRequestBuilder::new(owner, method, self.inner.config.default_ttl, default)
    }

    /// Binds a request to this cache.
    pub fn cached_result<V>(&self, request: FetchRequest<V>) -> CachedResult<S, V> {
        CachedResult::new(Arc::clone(&self.inner), request)
    }

    /// Starts building a reusable cached wrapper around `func`.
    pub fn method<A, V, F, Fut, E>(&self, owner: Owner, method: MethodId, func: F) -> CachedMethodBuilder<S, A, V, F>
    where
        V: Default,
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        self.method_or(owner, method, func, V::default())
    }

    /// Like [`method`](Self::method), with an explicit default value for result types that
    /// do not implement [`Default`].
    pub fn method_or<A, V, F, Fut, E>(&self, owner: Owner, method: MethodId, func: F, default: V) -> CachedMethodBuilder<S, A, V, F>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        CachedMethodBuilder::new(self.clone(), owner, method, func, default)
    }
}

impl<S> MethodCache<S>
where
    S: Storage + 'static,
{
    /// Fetches a request in one step.
    ///
    /// # Errors
    ///
    /// See [`CachedResult::fetch`].
    pub async fn fetch<V>(&self, request: FetchRequest<V>) -> Result<V, Error>
    where
        V: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
    {
        self.cached_result(request).fetch().await
    }

    /// Invalidates cached results of `method` on `owner`.
    ///
    /// With generational keys this advances the generation, which orphans the results for
    /// every argument list at once and ignores `args`. Otherwise only the entry for `args`
    /// is deleted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encode`] if `args` cannot be serialized, or the failure of the
    /// generation store or storage backend.
    pub async fn clear<A>(&self, owner: &Owner, method: MethodId, args: &A) -> Result<(), Error>
    where
        A: Serialize + ?Sized,
    {
        let inner = &self.inner;
        let args = ArgsDigest::of(args)?;
        let clock = &inner.config.clock;

        if inner.config.generational {
            let timed = clock.timed(inner.config.generations.advance(owner, method)).await;
            return match timed.result {
                Ok(token) => {
                    let key = CacheKey::build(owner, method, Some(&token), &args);
                    inner.record(CacheOperation::Clear, CacheActivity::Cleared, &key, Some(timed.duration));
                    Ok(())
                }
                Err(e) => {
                    let key = CacheKey::build(owner, method, None, &args);
                    inner.record(CacheOperation::Clear, CacheActivity::Error, &key, Some(timed.duration));
                    Err(e)
                }
            };
        }

        let key = CacheKey::build(owner, method, None, &args);
        let timed = clock.timed(inner.config.storage.delete(key.as_str())).await;
        match timed.result {
            Ok(()) => {
                inner.record(CacheOperation::Clear, CacheActivity::Cleared, &key, Some(timed.duration));
                Ok(())
            }
            Err(e) => {
                inner.record(CacheOperation::Clear, CacheActivity::Error, &key, Some(timed.duration));
                Err(e.into())
            }
        }
    }

    /// Invalidates every cached result of `method` on `owner` by advancing its generation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::GenerationalDisabled`] when the cache does not use generational
    /// keys, or the failure of the generation store.
    pub async fn clear_all(&self, owner: &Owner, method: MethodId) -> Result<(), Error> {
        if !self.inner.config.generational {
            return Err(Error::GenerationalDisabled);
        }
        self.inner.config.generations.advance(owner, method).await?;
        Ok(())
    }
}

impl<S> Debug for MethodCache<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodCache")
            .field("config", &self.inner.config)
            .field("guards", &self.inner.guards)
            .finish()
    }
}
