//! Metric instrument factories.
//!
//! Instruments come from the `"timerec"` meter on the globally registered
//! `MeterProvider`. Without an OTLP endpoint the global provider is a no-op,
//! so recording is always safe.

use opentelemetry::metrics::{Counter, Histogram, Meter};

fn meter() -> Meter {
    opentelemetry::global::meter("timerec")
}

/// Counter: reconciliation passes.
/// Labels: `result` ("ok" | "failed" | "cancelled").
pub fn reconcile_passes() -> Counter<u64> {
    meter()
        .u64_counter("timerec.reconcile.passes")
        .with_description("Number of reconciliation passes")
        .build()
}

/// Counter: individual check results.
/// Labels: `check`, `result` ("ok" | "requeue" | "failed").
pub fn check_outcomes() -> Counter<u64> {
    meter()
        .u64_counter("timerec.reconcile.checks")
        .with_description("Number of reconciliation check results")
        .build()
}

/// Counter: notifications handed to the notifier.
/// Labels: `kind`, `result` ("ok" | "error").
pub fn notifications() -> Counter<u64> {
    meter()
        .u64_counter("timerec.notifications")
        .with_description("Number of notifications sent")
        .build()
}

/// Counter: activity lifecycle transitions.
/// Labels: `from`, `to` ("idle" | "active").
pub fn activity_transitions() -> Counter<u64> {
    meter()
        .u64_counter("timerec.activity.transitions")
        .with_description("Number of activity state transitions")
        .build()
}

/// Counter: records persisted by job completion.
pub fn records_saved() -> Counter<u64> {
    meter()
        .u64_counter("timerec.records.saved")
        .with_description("Number of time records saved")
        .build()
}

/// Histogram: reconciliation pass duration in milliseconds.
pub fn pass_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("timerec.reconcile.duration_ms")
        .with_description("Reconciliation pass duration in milliseconds")
        .with_unit("ms")
        .build()
}
