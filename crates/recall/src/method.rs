// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! A reusable cached wrapper around an async function.

use std::fmt::{self, Debug};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use recall_store::Storage;
use serde::{Serialize, de::DeserializeOwned};

use crate::{ArgsDigest, ComputeError, Error, MethodCache, MethodId, Owner, RefreshMode};

/// An async function whose results are cached per argument list.
///
/// This is the explicit replacement for intercepting a method: build it once for an
/// (owner, method) pair and route every call through [`call`](Self::call).
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
/// let word_count = cache
///     .method(Owner::of_type("Text"), MethodId::new("word_count"), |text: String| async move {
///         Ok::<_, Infallible>(text.split_whitespace().count())
///     })
///     .ttl(Duration::from_secs(600))
///     .build();
///
/// assert_eq!(word_count.call("to be or not".to_string()).await?, 4);
/// assert!(word_count.exist(&"to be or not".to_string()).await?);
/// # Ok(())
/// # }
/// ```
pub struct CachedMethod<S, A, V, F> {
    cache: MethodCache<S>,
    owner: Owner,
    method: MethodId,
    ttl: Duration,
    default: V,
    refresh: RefreshMode,
    func: Arc<F>,
    _args: PhantomData<fn(A)>,
}

impl<S, A, V, F, Fut, E> CachedMethod<S, A, V, F>
where
    S: Storage + 'static,
    A: Serialize + Clone + Send + Sync + 'static,
    V: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<V, E>> + Send + 'static,
    E: Into<ComputeError> + 'static,
{
    /// Returns the cached result for `args`, computing it if needed.
    ///
    /// # Errors
    ///
    /// See [`CachedResult::fetch`](crate::CachedResult::fetch).
    pub async fn call(&self, args: A) -> Result<V, Error> {
        let digest = ArgsDigest::of(&args)?;
        let func = Arc::clone(&self.func);

        let request = self
            .cache
            .request_or(self.owner.clone(), self.method, self.default.clone())
            .ttl(self.ttl)
            .args_digest(digest)
            .refresh_async(self.refresh == RefreshMode::Deferred)
            .compute(move || func(args.clone()));

        self.cache.cached_result(request).fetch().await
    }

    /// Returns `true` if a result is stored for `args`, fresh or not.
    ///
    /// With generational keys a method without a generation token gets one written to
    /// storage before the lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if `args` cannot be serialized or the backend fails.
    pub async fn exist(&self, args: &A) -> Result<bool, Error> {
        let inner = self.cache.inner();
        let key = inner.key(&self.owner, self.method, &ArgsDigest::of(args)?).await?;
        inner.exist(&key).await
    }

    /// Invalidates cached results, see [`MethodCache::clear`].
    ///
    /// # Errors
    ///
    /// See [`MethodCache::clear`].
    pub async fn clear(&self, args: &A) -> Result<(), Error> {
        self.cache.clear(&self.owner, self.method, args).await
    }

    /// Returns the owner this method is bound to.
    #[must_use]
    pub fn owner(&self) -> &Owner {
        &self.owner
    }

    /// Returns the method identifier.
    #[must_use]
    pub fn method(&self) -> MethodId {
        self.method
    }
}

impl<S, A, V: Debug, F> Debug for CachedMethod<S, A, V, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedMethod")
            .field("owner", &self.owner)
            .field("method", &self.method)
            .field("ttl", &self.ttl)
            .field("default", &self.default)
            .field("refresh", &self.refresh)
            .finish_non_exhaustive()
    }
}

/// Builder for [`CachedMethod`], created by [`MethodCache::method`].
pub struct CachedMethodBuilder<S, A, V, F> {
    cache: MethodCache<S>,
    owner: Owner,
    method: MethodId,
    ttl: Duration,
    default: V,
    refresh: RefreshMode,
    func: F,
    _args: PhantomData<fn(A)>,
}

impl<S, A, V, F> CachedMethodBuilder<S, A, V, F> {
    pub(crate) fn new(cache: MethodCache<S>, owner: Owner, method: MethodId, func: F, default: V) -> Self {
        let ttl = cache.config().default_ttl();
        Self {
            cache,
            owner,
            method,
            ttl,
            default,
            refresh: RefreshMode::Blocking,
            func,
            _args: PhantomData,
        }
    }

    /// Sets how long results stay fresh.
    #[must_use]
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sets the value served before anything has been cached.
    #[must_use]
    pub fn default(mut self, default: V) -> Self {
        self.default = default;
        self
    }

    /// Selects deferred (`true`) or blocking (`false`) refresh.
    #[must_use]
    pub fn refresh_async(mut self, enabled: bool) -> Self {
        self.refresh = if enabled { RefreshMode::Deferred } else { RefreshMode::Blocking };
        self
    }

    /// Finishes the wrapper.
    #[must_use]
    pub fn build(self) -> CachedMethod<S, A, V, F> {
        CachedMethod {
            cache: self.cache,
            owner: self.owner,
            method: self.method,
            ttl: self.ttl,
            default: self.default,
            refresh: self.refresh,
            func: Arc::new(self.func),
            _args: PhantomData,
        }
    }
}

impl<S, A, V: Debug, F> Debug for CachedMethodBuilder<S, A, V, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedMethodBuilder")
            .field("owner", &self.owner)
            .field("method", &self.method)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
