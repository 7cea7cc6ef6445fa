use std::time::Duration;

use once_cell::sync::Lazy;
use opentelemetry::metrics::{Counter, Histogram};
use opentelemetry::{KeyValue, global};

use crate::check::Status;

// Instruments are no-ops unless telemetry installed an OTLP meter provider.
pub struct Metrics {
    check_runs_total: Counter<u64>,
    last_seen_seconds: Histogram<f64>,
}

static METRICS: Lazy<Metrics> = Lazy::new(|| {
    let meter = global::meter("check_ttn_gateway");

    let check_runs_total = meter
        .u64_counter("ttn_check_runs_total")
        .with_description("Completed gateway checks by resulting status")
        .build();

    let last_seen_seconds = meter
        .f64_histogram("ttn_check_last_seen_seconds")
        .with_description("Time since the gateway was last seen")
        .with_unit("s")
        .build();

    Metrics {
        check_runs_total,
        last_seen_seconds,
    }
});

pub fn record_verdict(status: Status) {
    METRICS
        .check_runs_total
        .add(1, &[KeyValue::new("status", status.label())]);
}

pub fn record_last_seen_age(age: Duration) {
    METRICS.last_seen_seconds.record(age.as_secs_f64(), &[]);
}
