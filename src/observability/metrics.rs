//! OpenTelemetry metrics for the write-behind cache.
//!
//! Key metrics:
//! - storage_flush_total: Counter for committed batches
//! - storage_flush_failures_total: Counter for rolled-back batches
//! - storage_flush_batch_size: Histogram of operations per committed batch
//! - storage_flush_latency_seconds: Histogram of batch commit latency
//!
//! Instruments are created on the global meter provider. The library never
//! replaces a provider the embedding host installed.

use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::{global, KeyValue};
use opentelemetry_sdk::metrics::SdkMeterProvider;
use std::sync::OnceLock;
use std::time::Duration;

/// Global metrics instance.
static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Storage metrics registry.
#[derive(Debug)]
pub struct Metrics {
    /// Total number of committed flush batches.
    pub flush_total: Counter<u64>,
    /// Total number of flush batches rolled back.
    pub flush_failures_total: Counter<u64>,
    /// Operations per committed batch.
    pub flush_batch_size: Histogram<u64>,
    /// Time from transaction start to commit.
    pub flush_latency: Histogram<f64>,
}

impl Metrics {
    fn new(meter: &Meter) -> Self {
        Self {
            flush_total: meter
                .u64_counter("storage_flush_total")
                .with_description("Total number of committed flush batches")
                .with_unit("1")
                .init(),
            flush_failures_total: meter
                .u64_counter("storage_flush_failures_total")
                .with_description("Total number of flush batches rolled back")
                .with_unit("1")
                .init(),
            flush_batch_size: meter
                .u64_histogram("storage_flush_batch_size")
                .with_description("Pending operations applied per batch")
                .with_unit("1")
                .init(),
            flush_latency: meter
                .f64_histogram("storage_flush_latency_seconds")
                .with_description("Batch latency from transaction start to commit")
                .with_unit("s")
                .init(),
        }
    }
}

/// Initialize the metrics system on the current global meter provider.
///
/// A host that exports metrics installs its provider before this runs;
/// without one, recording is a no-op. Subsequent calls are ignored.
pub fn init_metrics() {
    init_metrics_with_provider(None);
}

/// Initialize the metrics system, first installing `provider` globally if
/// one is given.
///
/// This should be called once at startup. Subsequent calls are ignored,
/// including their provider.
pub fn init_metrics_with_provider(provider: Option<SdkMeterProvider>) {
    METRICS.get_or_init(|| {
        if let Some(provider) = provider {
            global::set_meter_provider(provider);
            tracing::info!("Meter provider installed");
        }

        let meter = global::meter("storage_manager");
        Metrics::new(&meter)
    });
}

/// Get the global metrics instance, if initialized.
pub fn metrics() -> Option<&'static Metrics> {
    METRICS.get()
}

/// Record a committed batch.
pub fn record_flush(table: &str, operations: usize, latency: Duration) {
    if let Some(m) = METRICS.get() {
        let attrs = [KeyValue::new("table", table.to_string())];
        m.flush_total.add(1, &attrs);
        m.flush_batch_size.record(operations as u64, &attrs);
        m.flush_latency.record(latency.as_secs_f64(), &attrs);
    }
}

/// Record a rolled-back batch.
pub fn record_flush_failure(table: &str) {
    if let Some(m) = METRICS.get() {
        let attrs = [KeyValue::new("table", table.to_string())];
        m.flush_failures_total.add(1, &attrs);
    }
}
