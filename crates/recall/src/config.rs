// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Cache configuration and its builder.

use std::fmt::{self, Debug};
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "memory")]
use recall_memory::MemoryStorage;
use recall_store::Storage;

use crate::telemetry::CacheTelemetry;
use crate::{Clock, GenerationStore, JobDispatcher, StorageGenerations, TelemetryConfig};

/// Ttl applied to requests that do not set their own: 24 hours.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

const DEFAULT_NAME: &str = "recall";

/// Settings shared by every cached method served from one [`MethodCache`](crate::MethodCache).
///
/// A configuration is constructed explicitly and injected, never read from global state,
/// and it cannot change after [`build`](CacheConfigBuilder::build).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use recall::{CacheConfig, MemoryStorage};
///
/// let config = CacheConfig::builder(MemoryStorage::new())
///     .default_ttl(Duration::from_secs(300))
///     .generational(false)
///     .build();
///
/// assert_eq!(config.default_ttl(), Duration::from_secs(300));
/// assert!(!config.is_generational());
/// ```
pub struct CacheConfig<S> {
    pub(crate) storage: S,
    pub(crate) default_ttl: Duration,
    pub(crate) generational: bool,
    pub(crate) generations: Arc<dyn GenerationStore>,
    pub(crate) dispatcher: Option<Arc<dyn JobDispatcher>>,
    pub(crate) clock: Clock,
    pub(crate) name: &'static str,
    pub(crate) telemetry: Option<CacheTelemetry>,
}

impl<S> CacheConfig<S> {
    /// Starts building a configuration over `storage`.
    pub fn builder(storage: S) -> CacheConfigBuilder<S> {
        CacheConfigBuilder::new(storage)
    }

    /// Returns the storage backend.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Returns the ttl used when a request does not set one.
    #[must_use]
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Returns `true` when generation tokens are folded into cache keys.
    #[must_use]
    pub fn is_generational(&self) -> bool {
        self.generational
    }

    /// Returns `true` when deferred refreshes can be dispatched.
    #[must_use]
    pub fn has_dispatcher(&self) -> bool {
        self.dispatcher.is_some()
    }

    /// Returns the clock used for freshness decisions.
    #[must_use]
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Returns the name reported in telemetry.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

#[cfg(feature = "memory")]
impl CacheConfig<MemoryStorage> {
    /// Starts building a configuration over a fresh in-memory backend.
    #[must_use]
    pub fn memory() -> CacheConfigBuilder<MemoryStorage> {
        CacheConfigBuilder::new(MemoryStorage::new())
    }
}

impl<S> Debug for CacheConfig<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheConfig")
            .field("name", &self.name)
            .field("default_ttl", &self.default_ttl)
            .field("generational", &self.generational)
            .field("generations", &self.generations)
            .field("dispatcher", &self.dispatcher)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

/// Builder for [`CacheConfig`].
pub struct CacheConfigBuilder<S> {
    storage: S,
    default_ttl: Duration,
    generational: bool,
    generations: Option<Arc<dyn GenerationStore>>,
    dispatcher: Option<Arc<dyn JobDispatcher>>,
    clock: Clock,
    name: &'static str,
    telemetry: Option<CacheTelemetry>,
}

impl<S> CacheConfigBuilder<S> {
    fn new(storage: S) -> Self {
        Self {
            storage,
            default_ttl: DEFAULT_TTL,
            generational: true,
            generations: None,
            dispatcher: None,
            clock: Clock::system(),
            name: DEFAULT_NAME,
            telemetry: None,
        }
    }

    /// Sets the ttl used when a request does not set one.
    #[must_use]
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Enables or disables generation tokens in cache keys. Enabled by default.
    #[must_use]
    pub fn generational(mut self, enabled: bool) -> Self {
        self.generational = enabled;
        self
    }

    /// Replaces the default generation store, which keeps tokens in the cache's own storage.
    #[must_use]
    pub fn generations(mut self, generations: impl GenerationStore + 'static) -> Self {
        self.generations = Some(Arc::new(generations));
        self
    }

    /// Sets the dispatcher that runs deferred refreshes.
    ///
    /// Without one, fetches that request a deferred refresh fail with
    /// [`Error::NoDispatcher`](crate::Error::NoDispatcher).
    #[must_use]
    pub fn dispatcher(mut self, dispatcher: impl JobDispatcher + 'static) -> Self {
        self.dispatcher = Some(Arc::new(dispatcher));
        self
    }

    /// Sets the clock used for freshness decisions.
    #[must_use]
    pub fn clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Sets the name reported in telemetry.
    #[must_use]
    pub fn name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Enables telemetry.
    #[must_use]
    pub fn telemetry(mut self, config: TelemetryConfig) -> Self {
        self.telemetry = Some(config.build());
        self
    }
}

impl<S> CacheConfigBuilder<S>
where
    S: Storage + Clone + 'static,
{
    /// Finalizes the configuration.
    #[must_use]
    pub fn build(self) -> CacheConfig<S> {
        let generations = self
            .generations
            .unwrap_or_else(|| Arc::new(StorageGenerations::new(self.storage.clone())));

        CacheConfig {
            storage: self.storage,
            default_ttl: self.default_ttl,
            generational: self.generational,
            generations,
            dispatcher: self.dispatcher,
            clock: self.clock,
            name: self.name,
            telemetry: self.telemetry,
        }
    }
}

impl<S> Debug for CacheConfigBuilder<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheConfigBuilder")
            .field("name", &self.name)
            .field("default_ttl", &self.default_ttl)
            .field("generational", &self.generational)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use recall_store::testing::MockStorage;

    use super::*;
    use crate::QueueDispatcher;

    #[test]
    fn defaults() {
        let config = CacheConfig::builder(MockStorage::new()).build();
        assert_eq!(config.default_ttl(), DEFAULT_TTL);
        assert!(config.is_generational());
        assert!(!config.has_dispatcher());
        assert_eq!(config.name(), "recall");
        assert!(config.telemetry.is_none());
    }

    #[test]
    fn builder_overrides() {
        let config = CacheConfig::builder(MockStorage::new())
            .default_ttl(Duration::from_secs(1))
            .generational(false)
            .dispatcher(QueueDispatcher::new())
            .name("catalog")
            .telemetry(TelemetryConfig::new())
            .build();

        assert_eq!(config.default_ttl(), Duration::from_secs(1));
        assert!(!config.is_generational());
        assert!(config.has_dispatcher());
        assert_eq!(config.name(), "catalog");
        assert!(config.telemetry.is_some());
    }

    #[test]
    fn debug_omits_storage() {
        let config = CacheConfig::builder(MockStorage::new()).build();
        let rendered = format!("{config:?}");
        assert!(rendered.contains("CacheConfig"));
        assert!(rendered.contains("StorageGenerations"));
    }
}
