// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Telemetry configuration for cached methods.

#[cfg(any(feature = "logs", feature = "metrics", test))]
use std::sync::Arc;

#[cfg(any(feature = "metrics", test))]
use opentelemetry::metrics::MeterProvider;

use crate::telemetry::CacheTelemetry;
#[cfg(any(feature = "logs", feature = "metrics", test))]
use crate::telemetry::cache::CacheTelemetryInner;
#[cfg(any(feature = "metrics", test))]
use crate::telemetry::metrics::Instruments;

/// Configuration for cache telemetry.
///
/// Use the builder methods to enable logs and/or metrics, then pass this to
/// [`CacheConfigBuilder::telemetry`](crate::CacheConfigBuilder::telemetry).
///
/// # Examples
///
/// ```
/// # #[cfg(all(feature = "logs", feature = "metrics", feature = "memory"))]
/// # {
/// use opentelemetry_sdk::metrics::SdkMeterProvider;
/// use recall::{CacheConfig, MethodCache, TelemetryConfig};
///
/// let provider = SdkMeterProvider::builder().build();
///
/// let telemetry = TelemetryConfig::new().with_logs().with_metrics(&provider);
/// let cache = MethodCache::new(CacheConfig::memory().name("orders").telemetry(telemetry).build());
/// assert_eq!(cache.config().name(), "orders");
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct TelemetryConfig {
    #[cfg(any(feature = "logs", test))]
    logs_enabled: bool,
    #[cfg(any(feature = "metrics", test))]
    instruments: Option<Instruments>,
}

impl TelemetryConfig {
    /// Creates a new telemetry configuration with everything disabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables structured logging of cache decisions through `tracing`.
    #[cfg(any(feature = "logs", test))]
    #[must_use]
    pub fn with_logs(self) -> Self {
        Self {
            logs_enabled: true,
            ..self
        }
    }

    /// Enables OpenTelemetry metrics using the provided meter provider.
    #[cfg(any(feature = "metrics", test))]
    #[must_use]
    pub fn with_metrics(mut self, provider: &dyn MeterProvider) -> Self {
        self.instruments = Some(Instruments::new(provider));
        self
    }

    /// Builds the telemetry collector from this configuration.
    #[must_use]
    pub(crate) fn build(self) -> CacheTelemetry {
        #[cfg(not(any(feature = "logs", feature = "metrics", test)))]
        {
            CacheTelemetry {}
        }

        #[cfg(any(feature = "logs", feature = "metrics", test))]
        {
            CacheTelemetry {
                inner: Arc::new(CacheTelemetryInner {
                    #[cfg(any(feature = "logs", test))]
                    logging_enabled: self.logs_enabled,
                    #[cfg(any(feature = "metrics", test))]
                    instruments: self.instruments,
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::testing::{LogCapture, MetricTester};
    use crate::telemetry::{CacheActivity, CacheOperation, attributes};
    use crate::{ArgsDigest, CacheKey, MethodId, Owner};

    fn key() -> CacheKey {
        CacheKey::build(&Owner::of_type("Cfg"), MethodId::new("m"), None, &ArgsDigest::empty())
    }

    #[test]
    fn default_config_records_nothing() {
        let telemetry = TelemetryConfig::new().build();
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());

        telemetry.record("cfg", CacheOperation::Fetch, CacheActivity::Miss, &key(), None);

        assert!(capture.output().is_empty());
    }

    #[test]
    fn with_logs_emits_events() {
        let telemetry = TelemetryConfig::new().with_logs().build();
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());

        telemetry.record("cfg", CacheOperation::Fetch, CacheActivity::Miss, &key(), None);

        capture.assert_contains(CacheActivity::Miss.as_str());
    }

    #[test]
    fn with_metrics_counts_events() {
        let tester = MetricTester::new();
        let telemetry = TelemetryConfig::new().with_metrics(tester.meter_provider()).build();

        telemetry.record("cfg", CacheOperation::Exist, CacheActivity::Hit, &key(), None);

        tester.assert_attributes_contain(&[opentelemetry::KeyValue::new(attributes::CACHE_OPERATION_NAME, "cache.exist")]);
    }
}
