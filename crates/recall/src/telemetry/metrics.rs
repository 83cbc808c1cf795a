// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! OpenTelemetry instruments for cache decisions.

use std::time::Duration;

use opentelemetry::{
    InstrumentationScope, KeyValue,
    metrics::{Counter, Histogram, MeterProvider},
};

const METER_NAME: &str = "recall";
const EVENT_COUNT: &str = "cache.event.count";
const OPERATION_DURATION: &str = "cache.operation.duration";

/// The counter and histogram that every recorded decision feeds.
#[derive(Clone, Debug)]
pub(crate) struct Instruments {
    events: Counter<u64>,
    duration: Histogram<f64>,
}

impl Instruments {
    pub(crate) fn new(provider: &dyn MeterProvider) -> Self {
        let meter = provider.meter_with_scope(
            InstrumentationScope::builder(METER_NAME)
                .with_version(env!("CARGO_PKG_VERSION"))
                .build(),
        );

        Self {
            events: meter
                .u64_counter(EVENT_COUNT)
                .with_description("Cache decisions by operation and activity")
                .with_unit("{event}")
                .build(),
            duration: meter
                .f64_histogram(OPERATION_DURATION)
                .with_description("Time spent in storage calls and computations")
                .with_unit("s")
                .build(),
        }
    }

    /// Counts one decision and, when it was timed, records its duration.
    pub(crate) fn record(&self, attributes: &[KeyValue], duration: Option<Duration>) {
        self.events.add(1, attributes);
        if let Some(duration) = duration {
            self.duration.record(duration.as_secs_f64(), attributes);
        }
    }
}
