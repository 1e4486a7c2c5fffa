//! Logging and OpenTelemetry setup.
//!
//! `timerec` always logs to stderr through `tracing`. When `OTEL_ENDPOINT`
//! is set, reconcile spans, the counters in [`metrics`] and log events are
//! also exported over OTLP/gRPC, tagged with the crate version.

pub mod metrics;
pub mod spans;

use opentelemetry::KeyValue;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig as _;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::logs::SdkLoggerProvider;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

use crate::error::{Error, Result};

pub struct TelemetryConfig {
    /// OTLP gRPC endpoint, e.g. `http://localhost:4317`. `None` keeps
    /// everything local.
    pub endpoint: Option<String>,
    pub service_name: String,
    /// Filter directive used when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            service_name: "timerec".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// The three OTLP pipelines. They are built together or not at all.
struct Exporters {
    traces: SdkTracerProvider,
    metrics: SdkMeterProvider,
    logs: SdkLoggerProvider,
}

impl Exporters {
    fn build(endpoint: &str, service_name: String) -> Result<Self> {
        let resource = Resource::builder()
            .with_service_name(service_name)
            .with_attribute(KeyValue::new(
                opentelemetry_semantic_conventions::resource::SERVICE_VERSION,
                env!("CARGO_PKG_VERSION"),
            ))
            .build();

        let spans = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint)
            .build()
            .map_err(|e| exporter_error("span", e))?;
        let traces = SdkTracerProvider::builder()
            .with_batch_exporter(spans)
            .with_resource(resource.clone())
            .build();

        let counters = opentelemetry_otlp::MetricExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint)
            .build()
            .map_err(|e| exporter_error("metric", e))?;
        let metrics = SdkMeterProvider::builder()
            .with_periodic_exporter(counters)
            .with_resource(resource.clone())
            .build();

        let records = opentelemetry_otlp::LogExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint)
            .build()
            .map_err(|e| exporter_error("log", e))?;
        let logs = SdkLoggerProvider::builder()
            .with_batch_exporter(records)
            .with_resource(resource)
            .build();

        Ok(Self {
            traces,
            metrics,
            logs,
        })
    }

    fn flush(&self) {
        let _ = self.traces.force_flush();
        let _ = self.metrics.force_flush();
        let _ = self.logs.force_flush();
    }

    // Logs first so shutdown messages from the other two still go out.
    fn shutdown(self) {
        let _ = self.logs.shutdown();
        let _ = self.metrics.shutdown();
        let _ = self.traces.shutdown();
    }
}

fn exporter_error(signal: &str, e: impl std::fmt::Display) -> Error {
    Error::Backend(format!("failed to create OTLP {signal} exporter: {e}"))
}

/// Keeps the exporters alive; flushes and shuts them down on drop. Hold it
/// in `main` for as long as the process runs.
pub struct TelemetryGuard {
    exporters: Option<Exporters>,
}

impl TelemetryGuard {
    pub fn is_exporting(&self) -> bool {
        self.exporters.is_some()
    }

    pub fn force_flush(&self) {
        if let Some(exporters) = &self.exporters {
            exporters.flush();
        }
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(exporters) = self.exporters.take() {
            exporters.shutdown();
        }
    }
}

/// Install the global subscriber, plus OTLP export when an endpoint is set.
///
/// # Errors
///
/// Fails if an exporter cannot be built or a global subscriber is already
/// installed.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let Some(endpoint) = config.endpoint else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .map_err(subscriber_error)?;
        return Ok(TelemetryGuard { exporters: None });
    };

    let exporters = Exporters::build(&endpoint, config.service_name)?;
    opentelemetry::global::set_meter_provider(exporters.metrics.clone());

    let trace_layer =
        tracing_opentelemetry::layer().with_tracer(exporters.traces.tracer("timerec"));
    let log_layer =
        opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge::new(&exporters.logs);

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().compact())
        .with(trace_layer)
        .with(log_layer)
        .try_init()
        .map_err(subscriber_error)?;

    Ok(TelemetryGuard {
        exporters: Some(exporters),
    })
}

fn subscriber_error(e: impl std::fmt::Display) -> Error {
    Error::Config(format!("failed to init tracing subscriber: {e}"))
}
