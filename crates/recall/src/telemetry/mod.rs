// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Cache telemetry integration with OpenTelemetry and `tracing`.
//!
//! With the `logs` feature every cache decision can be emitted as a structured `tracing`
//! event; with the `metrics` feature it is counted and timed through an OpenTelemetry
//! meter. Without either feature recording compiles down to nothing.

#[cfg(any(feature = "logs", feature = "metrics", test))]
use std::sync::Arc;

#[cfg(any(feature = "logs", feature = "metrics", test))]
use cache::CacheTelemetryInner;
#[cfg(any(feature = "logs", test))]
use opentelemetry::logs::Severity;

pub(crate) mod attributes;
#[cfg(any(feature = "logs", feature = "metrics", test))]
pub(crate) mod cache;
pub(crate) mod config;
#[cfg(any(feature = "metrics", test))]
pub(crate) mod metrics;
#[cfg(test)]
pub(crate) mod testing;

/// Records cache decisions as logs and metrics.
///
/// Built from a [`TelemetryConfig`](crate::TelemetryConfig) and shared by every clone of a
/// [`MethodCache`](crate::MethodCache).
#[derive(Clone, Debug, Default)]
pub struct CacheTelemetry {
    #[cfg(any(feature = "logs", feature = "metrics", test))]
    inner: Arc<CacheTelemetryInner>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CacheOperation {
    Fetch,
    Refresh,
    Exist,
    Clear,
}

impl CacheOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fetch => "cache.fetch",
            Self::Refresh => "cache.refresh",
            Self::Exist => "cache.exist",
            Self::Clear => "cache.clear",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CacheActivity {
    Hit,
    Miss,
    Stale,
    Refreshed,
    RefreshEnqueued,
    Contended,
    Cleared,
    Error,
}

impl CacheActivity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "cache.hit",
            Self::Miss => "cache.miss",
            Self::Stale => "cache.stale",
            Self::Refreshed => "cache.refreshed",
            Self::RefreshEnqueued => "cache.refresh_enqueued",
            Self::Contended => "cache.contended",
            Self::Cleared => "cache.cleared",
            Self::Error => "cache.error",
        }
    }

    #[cfg(any(feature = "logs", test))]
    pub fn severity(self) -> Severity {
        match self {
            Self::Hit | Self::Miss | Self::Contended => Severity::Debug,
            Self::Stale | Self::Refreshed | Self::RefreshEnqueued | Self::Cleared => Severity::Info,
            Self::Error => Severity::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_operation_as_str() {
        assert_eq!(CacheOperation::Fetch.as_str(), "cache.fetch");
        assert_eq!(CacheOperation::Refresh.as_str(), "cache.refresh");
        assert_eq!(CacheOperation::Exist.as_str(), "cache.exist");
        assert_eq!(CacheOperation::Clear.as_str(), "cache.clear");
    }

    #[test]
    fn cache_activity_as_str() {
        assert_eq!(CacheActivity::Hit.as_str(), "cache.hit");
        assert_eq!(CacheActivity::Miss.as_str(), "cache.miss");
        assert_eq!(CacheActivity::Stale.as_str(), "cache.stale");
        assert_eq!(CacheActivity::Refreshed.as_str(), "cache.refreshed");
        assert_eq!(CacheActivity::RefreshEnqueued.as_str(), "cache.refresh_enqueued");
        assert_eq!(CacheActivity::Contended.as_str(), "cache.contended");
        assert_eq!(CacheActivity::Cleared.as_str(), "cache.cleared");
        assert_eq!(CacheActivity::Error.as_str(), "cache.error");
    }

    #[test]
    fn cache_activity_severity() {
        assert_eq!(CacheActivity::Hit.severity(), Severity::Debug);
        assert_eq!(CacheActivity::Contended.severity(), Severity::Debug);
        assert_eq!(CacheActivity::Stale.severity(), Severity::Info);
        assert_eq!(CacheActivity::RefreshEnqueued.severity(), Severity::Info);
        assert_eq!(CacheActivity::Error.severity(), Severity::Error);
    }
}
