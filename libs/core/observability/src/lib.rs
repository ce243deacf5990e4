//! Observability utilities for the migration cost estimator.
//!
//! This crate provides:
//! - A process-wide Prometheus recorder
//! - Estimation-specific metrics (cache hits, fetch failures, fallbacks,
//!   unmapped SKUs, run durations)
//!
//! Recording is a no-op until [`init_metrics`] installs the recorder, so
//! library code can record unconditionally.
//!
//! # Example
//!
//! ```rust,ignore
//! use observability::{init_metrics, render_metrics, EstimationMetrics};
//!
//! init_metrics()?;
//! EstimationMetrics::record_cache_hit("aws");
//! println!("{}", render_metrics());
//! ```

pub mod estimation;

pub use estimation::{EstimationMetrics, EstimationTimer};

// Re-export metrics macros for convenience
pub use metrics::{counter, gauge, histogram};

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tracing::info;

static METRICS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the Prometheus metrics recorder.
///
/// Subsequent calls return the handle created by the first one.
pub fn init_metrics() -> Result<&'static PrometheusHandle, BuildError> {
    METRICS_HANDLE.get_or_try_init(|| {
        let handle = PrometheusBuilder::new().install_recorder()?;

        info!("Prometheus metrics recorder initialized");
        register_metric_descriptions();

        Ok(handle)
    })
}

/// Get the metrics handle (must call init_metrics first)
pub fn get_metrics_handle() -> Option<&'static PrometheusHandle> {
    METRICS_HANDLE.get()
}

/// Render metrics in the Prometheus text exposition format
pub fn render_metrics() -> String {
    match get_metrics_handle() {
        Some(handle) => handle.render(),
        None => "# Metrics not initialized\n".to_string(),
    }
}

fn register_metric_descriptions() {
    use metrics::describe_counter;
    use metrics::describe_gauge;
    use metrics::describe_histogram;

    describe_counter!(
        "pricing_cache_lookups_total",
        "Pricing cache lookups by source and result (hit, miss)"
    );
    describe_counter!(
        "pricing_cache_write_errors_total",
        "Pricing cache writes that failed and were skipped"
    );
    describe_counter!(
        "pricing_fetch_total",
        "Live pricing fetches by source and status"
    );
    describe_histogram!(
        "pricing_fetch_duration_seconds",
        "Live pricing fetch duration in seconds"
    );
    describe_counter!(
        "pricing_resolutions_total",
        "Pricing resolutions by source and provenance"
    );
    describe_counter!(
        "estimation_unmapped_skus_total",
        "Resources whose SKU fell back to a category default"
    );
    describe_counter!(
        "estimation_runs_total",
        "Cost estimation runs by outcome"
    );
    describe_histogram!(
        "estimation_duration_seconds",
        "End-to-end estimation duration in seconds"
    );
    describe_gauge!(
        "estimation_resources_last_run",
        "Resources estimated in the last run"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_metrics_is_idempotent() {
        let first = init_metrics().expect("recorder installs once");
        let second = init_metrics().expect("second call reuses handle");
        assert!(std::ptr::eq(first, second));
        assert!(get_metrics_handle().is_some());
    }
}
