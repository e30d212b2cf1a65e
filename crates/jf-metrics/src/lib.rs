use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::{info, warn};

pub const ITEMS_PROCESSED_TOTAL: &str = "jf_items_processed_total";
pub const BATCH_DURATION_SECONDS: &str = "jf_batch_duration_seconds";
pub const ROW_CACHE_LOOKUPS_TOTAL: &str = "jf_api_row_cache_lookups_total";

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Starts a Prometheus exporter on `0.0.0.0:<port>`. Must run inside a Tokio
/// runtime. Later calls return the first handle.
pub fn init_metrics(port: u16) -> Option<&'static PrometheusHandle> {
    if let Some(existing) = PROMETHEUS_HANDLE.get() {
        return Some(existing);
    }

    let (recorder, exporter) = match PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .build()
    {
        Ok(parts) => parts,
        Err(err) => {
            warn!(error = %err, metrics_port = port, "failed to build prometheus exporter");
            return None;
        }
    };

    let handle = recorder.handle();
    if metrics::set_global_recorder(recorder).is_err() {
        warn!(metrics_port = port, "a metrics recorder is already installed");
        return None;
    }

    tokio::spawn(async move {
        // ExporterError implements neither Debug nor Display in 0.15.
        if exporter.await.is_err() {
            warn!("prometheus exporter stopped");
        }
    });

    describe_counter!(ITEMS_PROCESSED_TOTAL, "Feed items handled, by outcome");
    describe_histogram!(BATCH_DURATION_SECONDS, "Wall time of one ingestion batch");
    describe_counter!(ROW_CACHE_LOOKUPS_TOTAL, "API row cache lookups, by result");

    let _ = PROMETHEUS_HANDLE.set(handle);
    info!(metrics_port = port, "started prometheus exporter");
    PROMETHEUS_HANDLE.get()
}

/// `outcome` is one of `inserted`, `skipped_duplicate`, `failed`, `malformed`.
pub fn record_item_outcome(outcome: &'static str) {
    counter!(ITEMS_PROCESSED_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_batch_duration(elapsed: Duration) {
    histogram!(BATCH_DURATION_SECONDS).record(elapsed.as_secs_f64());
}

pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!(ROW_CACHE_LOOKUPS_TOTAL, "result" => result).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_exporter_is_a_no_op() {
        record_item_outcome("inserted");
        record_batch_duration(Duration::from_millis(5));
        record_cache_lookup(true);
        assert!(PROMETHEUS_HANDLE.get().is_none());
    }
}
