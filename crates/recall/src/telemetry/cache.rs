// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Cache telemetry implementation and recording.

use std::time::Duration;

#[cfg(any(feature = "metrics", test))]
use opentelemetry::KeyValue;

use crate::CacheKey;
#[cfg(any(feature = "metrics", test))]
use crate::telemetry::{attributes, metrics::Instruments};
use crate::telemetry::{CacheActivity, CacheOperation, CacheTelemetry};

#[derive(Clone, Debug, Default)]
pub(crate) struct CacheTelemetryInner {
    #[cfg(any(feature = "logs", test))]
    pub(crate) logging_enabled: bool,
    #[cfg(any(feature = "metrics", test))]
    pub(crate) instruments: Option<Instruments>,
}

impl CacheTelemetry {
    /// Records one cache decision.
    ///
    /// Metrics carry the cache name, operation and activity only; the key is logged but
    /// never used as a metric attribute.
    #[inline]
    #[allow(unused_variables, reason = "key and name are unused when only some features are enabled")]
    pub(crate) fn record(
        &self,
        cache_name: &'static str,
        operation: CacheOperation,
        activity: CacheActivity,
        key: &CacheKey,
        duration: Option<Duration>,
    ) {
        #[cfg(any(feature = "metrics", test))]
        if let Some(instruments) = &self.inner.instruments {
            instruments.record(
                &[
                    KeyValue::new(attributes::CACHE_NAME, cache_name),
                    KeyValue::new(attributes::CACHE_OPERATION_NAME, operation.as_str()),
                    KeyValue::new(attributes::CACHE_ACTIVITY_NAME, activity.as_str()),
                ],
                duration,
            );
        }

        #[cfg(any(feature = "logs", test))]
        if self.inner.logging_enabled {
            Self::emit(cache_name, operation, activity, key, duration);
        }
    }

    #[cfg(any(feature = "logs", test))]
    fn emit(cache_name: &'static str, operation: CacheOperation, activity: CacheActivity, key: &CacheKey, duration: Option<Duration>) {
        use opentelemetry::logs::Severity;

        let op = operation.as_str();
        let act = activity.as_str();
        let key = key.as_str();
        let duration_ns = duration.map(|d| d.as_nanos());

        // Tracing level must be constant, so the macro picks the level per arm.
        // Field names must match constants in attributes.rs.
        macro_rules! emit_event {
            ($level:ident) => {
                tracing::$level!(
                    cache.name = cache_name,
                    cache.operation = op,
                    cache.activity = act,
                    cache.key = key,
                    cache.duration_ns = ?duration_ns,
                    "cache.event"
                )
            };
        }

        match activity.severity() {
            Severity::Error => emit_event!(error),
            Severity::Info => emit_event!(info),
            Severity::Debug => emit_event!(debug),
            _ => {}
        }
    }
}
