// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Method-level result caching with stampede protection.
//!
//! `recall` caches the results of expensive, deterministic async computations in a shared
//! key-value store. A result is identified by its owner (a type, or an instance digest),
//! the method, an optional generation token, and a digest of the arguments. It provides:
//!
//! - A lock-free fast path: a fresh entry is returned with one storage read and no writes
//! - At most one refresh per key within a process, with other callers waiting or being
//!   served the stale value
//! - Blocking refresh, or deferred refresh through a [`JobDispatcher`]
//! - Generational invalidation of every result of a method without enumerating keys
//! - `tracing` logs and optional OpenTelemetry metrics; failed deferred refreshes are always logged
//!
//! # Freshness and Staleness
//!
//! Every stored [`CacheEntry`] carries its own expiry. Entries are written to the backend
//! without a backend ttl, so an expired entry stays readable and is used as a best-effort
//! value while it is being refreshed. A key that was never computed is treated like an
//! entry holding the request's default value that has just expired.
//!
//! When a caller finds an entry stale and wins the per-key guard, it first rewrites the
//! stale value with a new expiry. Readers in this and other processes then take the fast
//! path until the refresh completes. If the computation fails, that placeholder stays in
//! place for one ttl, so failures are not retried in a tight loop.
//!
//! The placeholder is not a distributed lock. Two processes that observe the same stale
//! entry at the same moment can both refresh it; both write an equally valid value.
//!
//! # Examples
//!
//! ```
//! use std::convert::Infallible;
//! use std::time::Duration;
//!
//! use recall::{CacheConfig, MethodCache, MethodId, Owner};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), recall::Error> {
//! let cache = MethodCache::new(
//!     CacheConfig::memory()
//!         .default_ttl(Duration::from_secs(60))
//!         .build(),
//! );
//!
//! let request = cache
//!     .request(Owner::of_type("Inventory"), MethodId::new("stock_level"))
//!     .args(&("sku-123",))?
//!     .compute(|| async { Ok::<_, Infallible>(17_u32) });
//!
//! let result = cache.cached_result(request);
//! assert!(!result.exist().await?);
//! assert_eq!(result.fetch().await?, 17);
//! assert!(result.exist().await?);
//! # Ok(())
//! # }
//! ```
//!
//! # Deferred Refresh
//!
//! ```
//! use std::convert::Infallible;
//!
//! use recall::{CacheConfig, MethodCache, MethodId, Owner, QueueDispatcher};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), recall::Error> {
//! let jobs = QueueDispatcher::new();
//! let cache = MethodCache::new(CacheConfig::memory().dispatcher(jobs.clone()).build());
//!
//! let request = cache
//!     .request(Owner::of_type("Feed"), MethodId::new("headlines"))
//!     .refresh_async(true)
//!     .compute(|| async { Ok::<_, Infallible>(vec!["news".to_string()]) });
//! let result = cache.cached_result(request);
//!
//! // Nothing cached yet: the default is served and a refresh is queued.
//! assert!(result.fetch().await?.is_empty());
//! assert_eq!(jobs.len(), 1);
//!
//! jobs.run_all().await;
//! assert_eq!(result.fetch().await?, vec!["news".to_string()]);
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - `memory` (default): re-exports [`MemoryStorage`] and enables [`CacheConfig::memory`]
//! - `rt-tokio` (default): enables [`TokioDispatcher`]
//! - `logs`: structured `tracing` events for every cache decision
//! - `metrics`: OpenTelemetry counters and histograms
//! - `test-util`: re-exports `MockStorage` for failure injection

mod cached_result;
mod clock;
mod config;
mod digest;
mod dispatch;
mod entry;
pub mod error;
mod generation;
mod guard;
mod key;
mod method;
mod method_cache;
mod telemetry;

#[doc(inline)]
pub use cached_result::{CachedResult, Computation, FetchRequest, FetchRequestBuilder, RefreshMode};
#[doc(inline)]
pub use clock::{Clock, ClockControl};
#[doc(inline)]
pub use config::{CacheConfig, CacheConfigBuilder, DEFAULT_TTL};
#[doc(inline)]
pub use digest::{ArgsDigest, digest};
#[cfg(any(feature = "rt-tokio", test))]
#[doc(inline)]
pub use dispatch::TokioDispatcher;
#[doc(inline)]
pub use dispatch::{JobDispatcher, QueueDispatcher, RefreshJob};
#[doc(inline)]
pub use entry::CacheEntry;
#[doc(inline)]
pub use error::{ComputeError, Error, Result};
#[doc(inline)]
pub use generation::{GenerationStore, GenerationToken, StorageGenerations};
#[doc(inline)]
pub use key::{CacheKey, MethodId, Owner};
#[doc(inline)]
pub use method::{CachedMethod, CachedMethodBuilder};
#[doc(inline)]
pub use method_cache::MethodCache;
#[cfg(feature = "memory")]
#[doc(inline)]
pub use recall_memory::MemoryStorage;
#[doc(inline)]
pub use recall_store::Storage;
#[cfg(any(feature = "test-util", test))]
#[doc(inline)]
pub use recall_store::testing::{MockStorage, StorageOp};
#[doc(inline)]
pub use telemetry::CacheTelemetry;
#[doc(inline)]
pub use telemetry::config::TelemetryConfig;
