//! Smoke test against a running OTLP collector.
//!
//! Run with:
//! ```sh
//! cargo test --test telemetry_smoke_test -- --ignored --nocapture
//! ```

use std::sync::Arc;
use std::time::Duration;

use timerec::engine::{Providers, Reconciler};
use timerec::model::User;
use timerec::state::State;
use timerec::telemetry::{TelemetryConfig, init_telemetry};
use tokio_util::sync::CancellationToken;

#[tokio::test]
#[ignore] // Requires an OTLP collector on localhost:4317
async fn reconcile_pass_exports_spans_and_metrics() {
    let guard = init_telemetry(TelemetryConfig {
        endpoint: Some("http://localhost:4317".to_string()),
        service_name: "timerec-smoke-test".to_string(),
        ..Default::default()
    })
    .expect("failed to init telemetry");
    assert!(guard.is_exporting());

    let (providers, state, _notifier) = Providers::in_memory();
    state.upsert_user(User::new("smoke")).await.unwrap();
    let reconciler = Arc::new(Reconciler::with_default_checks(&providers, chrono_tz::UTC));

    let report = reconciler.run_pass(&CancellationToken::new()).await.unwrap();
    assert_eq!(report.users, 1);

    guard.force_flush();
    tokio::time::sleep(Duration::from_secs(2)).await;
}
