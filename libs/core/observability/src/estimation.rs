//! Metrics for pricing resolution and cost estimation.

use metrics::{counter, gauge, histogram};
use std::time::Instant;

/// Estimation metrics recorder
pub struct EstimationMetrics;

impl EstimationMetrics {
    // =========================================================================
    // Cache Metrics
    // =========================================================================

    /// Record a valid cache entry served for a pricing source
    pub fn record_cache_hit(source: &str) {
        counter!("pricing_cache_lookups_total", "source" => source.to_string(), "result" => "hit")
            .increment(1);
    }

    /// Record a cache miss (absent, stale or corrupt entry)
    pub fn record_cache_miss(source: &str) {
        counter!("pricing_cache_lookups_total", "source" => source.to_string(), "result" => "miss")
            .increment(1);
    }

    /// Record a cache write that failed and was skipped
    pub fn record_cache_write_error(source: &str) {
        counter!("pricing_cache_write_errors_total", "source" => source.to_string()).increment(1);
    }

    // =========================================================================
    // Fetch Metrics
    // =========================================================================

    /// Record a successful live fetch
    pub fn record_fetch_success(source: &str, entries: usize, duration_secs: f64) {
        counter!("pricing_fetch_total", "source" => source.to_string(), "status" => "success")
            .increment(1);
        histogram!("pricing_fetch_duration_seconds", "source" => source.to_string())
            .record(duration_secs);

        tracing::debug!(
            source = source,
            entries = entries,
            duration_secs = duration_secs,
            "Live pricing fetch succeeded"
        );
    }

    /// Record a failed live fetch; `kind` is a short error classifier
    pub fn record_fetch_failure(source: &str, kind: &str, duration_secs: f64) {
        counter!(
            "pricing_fetch_total",
            "source" => source.to_string(),
            "status" => "failed",
            "kind" => kind.to_string()
        )
        .increment(1);
        histogram!("pricing_fetch_duration_seconds", "source" => source.to_string())
            .record(duration_secs);
    }

    /// Record which tier of the fallback chain served a source
    pub fn record_resolution(source: &str, provenance: &str) {
        counter!(
            "pricing_resolutions_total",
            "source" => source.to_string(),
            "provenance" => provenance.to_string()
        )
        .increment(1);
    }

    // =========================================================================
    // Estimation Metrics
    // =========================================================================

    /// Record a resource whose SKU fell back to the category default
    pub fn record_unmapped_sku(category: &str) {
        counter!("estimation_unmapped_skus_total", "category" => category.to_string())
            .increment(1);
    }

    /// Record a mapped target SKU that had no catalog price and was costed
    /// at the category default
    pub fn record_missing_target_price(category: &str) {
        counter!("estimation_missing_target_prices_total", "category" => category.to_string())
            .increment(1);
    }

    /// Record a finished estimation run
    pub fn record_estimation_completed(resources: usize, duration_secs: f64) {
        counter!("estimation_runs_total", "outcome" => "completed").increment(1);
        histogram!("estimation_duration_seconds").record(duration_secs);
        gauge!("estimation_resources_last_run").set(resources as f64);

        tracing::info!(
            resources = resources,
            duration_secs = duration_secs,
            "Estimation run completed"
        );
    }

    /// Record an estimation run rejected before any work began
    pub fn record_estimation_rejected(reason: &str) {
        counter!("estimation_runs_total", "outcome" => "rejected").increment(1);

        tracing::warn!(reason = reason, "Estimation run rejected");
    }
}

/// Timer guard for a single live fetch.
///
/// Call [`EstimationTimer::success`] or [`EstimationTimer::failure`]; a timer
/// dropped without either counts as an `abandoned` failure.
pub struct EstimationTimer {
    start: Instant,
    source: String,
    finished: bool,
}

impl EstimationTimer {
    /// Start timing a fetch for `source`
    pub fn start(source: &str) -> Self {
        Self {
            start: Instant::now(),
            source: source.to_string(),
            finished: false,
        }
    }

    /// Seconds elapsed since the timer started
    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    /// Record a successful fetch
    pub fn success(mut self, entries: usize) {
        self.finished = true;
        EstimationMetrics::record_fetch_success(&self.source, entries, self.elapsed_secs());
    }

    /// Record a failed fetch
    pub fn failure(mut self, kind: &str) {
        self.finished = true;
        EstimationMetrics::record_fetch_failure(&self.source, kind, self.elapsed_secs());
    }
}

impl Drop for EstimationTimer {
    fn drop(&mut self) {
        if !self.finished {
            EstimationMetrics::record_fetch_failure(&self.source, "abandoned", self.elapsed_secs());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        EstimationMetrics::record_cache_hit("aws");
        EstimationMetrics::record_cache_miss("azure");
        EstimationMetrics::record_unmapped_sku("compute");
        EstimationMetrics::record_missing_target_price("relational_db");
        EstimationMetrics::record_resolution("exchange_rates", "fallback");
    }

    #[test]
    fn test_timer_finishes_once() {
        let timer = EstimationTimer::start("aws");
        assert!(timer.elapsed_secs() >= 0.0);
        timer.success(12);

        let timer = EstimationTimer::start("azure");
        timer.failure("timeout");
    }
}
