//! End-to-end estimation run: validate → resolve prices → estimate →
//! aggregate.

use chrono::{DateTime, Utc};
use observability::EstimationMetrics;
use rust_decimal::Decimal;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::aggregator::{aggregate, Discount, BASE_CURRENCY};
use crate::catalog::PricingCatalog;
use crate::error::{PricingError, PricingResult};
use crate::estimator::CostEstimator;
use crate::mapping::{SkuMapping, SkuOverride};
use crate::models::{Confidence, CostSummary, LineItem, ResourceRecord, SourceProvenance};
use crate::resolver::PricingResolver;
use crate::status::{AnalysisStage, StatusTracker};

/// Inputs of one estimation run
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub resources: Vec<ResourceRecord>,
    pub discount_percent: Decimal,
    pub overrides: Vec<SkuOverride>,
    pub estimated_storage_gb: u32,
    /// Also report the summary in this currency
    pub currency: Option<String>,
}

impl AnalysisRequest {
    pub fn new(resources: Vec<ResourceRecord>) -> Self {
        Self {
            resources,
            discount_percent: Decimal::ZERO,
            overrides: Vec::new(),
            estimated_storage_gb: 100,
            currency: None,
        }
    }

    pub fn with_discount(mut self, percent: Decimal) -> Self {
        self.discount_percent = percent;
        self
    }

    pub fn with_overrides(mut self, overrides: Vec<SkuOverride>) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_storage_gb(mut self, gb: u32) -> Self {
        self.estimated_storage_gb = gb;
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }
}

/// Everything a report writer needs
#[derive(Debug, Clone, Serialize)]
pub struct EstimationReport {
    pub job_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub line_items: Vec<LineItem>,
    pub summary: CostSummary,
    /// `summary` rescaled into the requested currency, when one was asked for
    #[serde(skip_serializing_if = "Option::is_none")]
    pub converted_summary: Option<CostSummary>,
    pub pricing_sources: Vec<SourceProvenance>,
    pub low_confidence_count: usize,
}

/// Read a discovered inventory: a JSON array of [`ResourceRecord`]s
pub fn load_inventory(path: &Path) -> PricingResult<Vec<ResourceRecord>> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        PricingError::InvalidInput(format!("cannot read inventory {}: {e}", path.display()))
    })?;
    let resources: Vec<ResourceRecord> = serde_json::from_str(&raw).map_err(|e| {
        PricingError::InvalidInput(format!("malformed inventory {}: {e}", path.display()))
    })?;

    if let Some(blank) = resources.iter().position(|r| r.id.trim().is_empty()) {
        return Err(PricingError::InvalidInput(format!(
            "inventory record {blank} has an empty id"
        )));
    }

    info!(path = %path.display(), resources = resources.len(), "Loaded inventory");
    Ok(resources)
}

fn validate_currency(code: &str) -> PricingResult<String> {
    let code = code.trim().to_uppercase();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(PricingError::InvalidInput(format!(
            "currency must be a three-letter ISO code, got '{code}'"
        )));
    }
    Ok(code)
}

pub struct EstimationPipeline {
    resolver: Arc<PricingResolver>,
    mapping: SkuMapping,
}

impl EstimationPipeline {
    pub fn new(resolver: Arc<PricingResolver>, mapping: SkuMapping) -> Self {
        Self { resolver, mapping }
    }

    /// Run one linear pass. Invalid input is rejected before any pricing
    /// work begins; nothing below the resolver can fail the run.
    #[instrument(skip_all, fields(job_id = %tracker.job_id(), resources = request.resources.len()))]
    pub async fn run(
        &self,
        request: AnalysisRequest,
        tracker: &StatusTracker,
    ) -> PricingResult<EstimationReport> {
        let started = Instant::now();

        let (discount, mapping, currency) = match self.validate(&request) {
            Ok(validated) => validated,
            Err(e) => {
                EstimationMetrics::record_estimation_rejected(&e.to_string());
                tracker.fail(e.to_string());
                return Err(e);
            }
        };

        tracker.set_stage(AnalysisStage::ResolvingPrices);
        let catalog = self.resolver.resolve_catalog().await;

        tracker.set_stage(AnalysisStage::EstimatingCosts);
        let line_items = CostEstimator::new(&catalog, &mapping, request.estimated_storage_gb)
            .estimate(&request.resources);

        tracker.set_stage(AnalysisStage::Aggregating);
        let summary = aggregate(&line_items, discount);
        let converted_summary = currency.and_then(|code| convert(&summary, &catalog, &code));

        let low_confidence_count = line_items
            .iter()
            .filter(|item| item.confidence == Confidence::Low)
            .count();

        let report = EstimationReport {
            job_id: tracker.job_id(),
            generated_at: Utc::now(),
            line_items,
            summary,
            converted_summary,
            pricing_sources: catalog.sources().to_vec(),
            low_confidence_count,
        };

        tracker.complete();
        EstimationMetrics::record_estimation_completed(
            report.line_items.len(),
            started.elapsed().as_secs_f64(),
        );
        info!(
            grand_total = %report.summary.grand_total,
            low_confidence = low_confidence_count,
            "Estimation finished"
        );

        Ok(report)
    }

    fn validate(
        &self,
        request: &AnalysisRequest,
    ) -> PricingResult<(Discount, SkuMapping, Option<String>)> {
        let discount = Discount::new(request.discount_percent)?;
        let mapping = self.mapping.clone().with_overrides(&request.overrides)?;
        let currency = request
            .currency
            .as_deref()
            .map(validate_currency)
            .transpose()?
            .filter(|code| code != BASE_CURRENCY);
        Ok((discount, mapping, currency))
    }
}

/// Unknown currencies are reported in USD only
fn convert(summary: &CostSummary, catalog: &PricingCatalog, currency: &str) -> Option<CostSummary> {
    match catalog.exchange_rate(currency) {
        Some(rate) => Some(summary.converted(currency, rate)),
        None => {
            warn!(currency = currency, "No exchange rate available, reporting in USD only");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCacheStore;
    use crate::catalog::ResolvedFragment;
    use crate::fetchers::{FetcherRegistry, MockPricingFetcher};
    use crate::models::{PricingFragment, PricingSource, Provenance, ResourceCategory};
    use crate::status::AnalysisState;
    use std::time::Duration;

    fn offline_pipeline() -> EstimationPipeline {
        let resolver = PricingResolver::new(
            Arc::new(InMemoryCacheStore::new()),
            FetcherRegistry::new(),
            Duration::from_secs(3600),
            Duration::from_secs(1),
        );
        EstimationPipeline::new(Arc::new(resolver), SkuMapping::with_defaults())
    }

    fn inventory() -> Vec<ResourceRecord> {
        vec![
            ResourceRecord::new("vm-web", ResourceCategory::Compute, "standard_b1s"),
            ResourceRecord::new("sa-logs", ResourceCategory::BlockStorage, "Standard_LRS")
                .with_access_tier("Hot"),
            ResourceRecord::new("sql-main", ResourceCategory::RelationalDb, "standard_s1"),
        ]
    }

    #[test]
    fn test_scenario_catalog_fixture() {
        let fixture = PricingFragment::new()
            .with_price(ResourceCategory::Compute, "t3.nano", Decimal::new(759, 2))
            .with_price(ResourceCategory::BlockStorage, "standard", Decimal::new(23, 3))
            .with_price(ResourceCategory::RelationalDb, "db.t3.medium", Decimal::new(300, 1));
        let catalog = PricingCatalog::from_resolved(vec![ResolvedFragment {
            source: PricingSource::TargetRetail,
            fragment: fixture.clone(),
            upstream: fixture,
            provenance: Provenance::Live,
            fetched_at: Utc::now(),
        }]);
        let mapping = SkuMapping::with_defaults();

        let items = CostEstimator::new(&catalog, &mapping, 100).estimate(&inventory());
        let summary = aggregate(&items, Discount::none());

        let targets: Vec<_> = items.iter().map(|i| i.target_sku.as_str()).collect();
        assert_eq!(targets, vec!["t3.nano", "standard", "db.t3.medium"]);
        assert!(items.iter().all(|i| i.confidence == Confidence::High));

        let costs: Vec<_> = items.iter().map(|i| i.monthly_cost).collect();
        assert_eq!(
            costs,
            vec![Decimal::new(759, 2), Decimal::new(230, 2), Decimal::new(300, 1)]
        );
        assert_eq!(summary.grand_total, Decimal::new(3989, 2));
        assert_eq!(summary.compute_total, Decimal::new(759, 2));
        assert_eq!(summary.block_storage_total, Decimal::new(230, 2));
        assert_eq!(summary.relational_db_total, Decimal::new(300, 1));
    }

    #[tokio::test]
    async fn test_offline_run_completes_with_fallback_prices() {
        let pipeline = offline_pipeline();
        let tracker = StatusTracker::new();

        let report = pipeline
            .run(AnalysisRequest::new(inventory()).with_discount(Decimal::from(20)), &tracker)
            .await
            .unwrap();

        assert_eq!(report.line_items.len(), 3);
        let sum: Decimal = report.line_items.iter().map(|i| i.monthly_cost).sum();
        assert_eq!(report.summary.grand_total, sum);
        assert_eq!(report.summary.discount_percent, Decimal::from(20));
        assert!(report.summary.source_total.is_some());
        assert!(report
            .pricing_sources
            .iter()
            .all(|s| s.provenance == Provenance::Fallback));
        assert_eq!(report.job_id, tracker.job_id());
        assert_eq!(tracker.current().state, AnalysisState::Completed);
        assert_eq!(tracker.current().stage, AnalysisStage::Aggregating);
    }

    #[tokio::test]
    async fn test_invalid_discount_rejected_before_resolution() {
        let mut fetcher = MockPricingFetcher::new();
        fetcher.expect_source().return_const(PricingSource::TargetRetail);
        fetcher.expect_fetch().times(0);
        let mut registry = FetcherRegistry::new();
        registry.register(Arc::new(fetcher));
        let resolver = PricingResolver::new(
            Arc::new(InMemoryCacheStore::new()),
            registry,
            Duration::from_secs(3600),
            Duration::from_secs(1),
        );
        let pipeline = EstimationPipeline::new(Arc::new(resolver), SkuMapping::with_defaults());
        let tracker = StatusTracker::new();

        let result = pipeline
            .run(AnalysisRequest::new(inventory()).with_discount(Decimal::from(150)), &tracker)
            .await;

        assert!(matches!(result, Err(PricingError::InvalidInput(_))));
        let status = tracker.current();
        assert_eq!(status.state, AnalysisState::Error);
        assert_eq!(status.stage, AnalysisStage::Validating);
    }

    #[tokio::test]
    async fn test_invalid_override_rejected() {
        let pipeline = offline_pipeline();
        let request = AnalysisRequest::new(inventory()).with_overrides(vec![SkuOverride {
            category: ResourceCategory::Compute,
            source_sku: "Standard_B1ms".to_string(),
            target_sku: "".to_string(),
            target_category: None,
        }]);

        let result = pipeline.run(request, &StatusTracker::new()).await;
        assert!(matches!(result, Err(PricingError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_currency_conversion() {
        let pipeline = offline_pipeline();

        let report = pipeline
            .run(AnalysisRequest::new(inventory()).with_currency("eur"), &StatusTracker::new())
            .await
            .unwrap();

        let converted = report.converted_summary.unwrap();
        assert_eq!(converted.currency, "EUR");
        assert_eq!(
            converted.grand_total,
            (report.summary.grand_total * Decimal::new(85, 2)).round_dp(2)
        );

        let report = pipeline
            .run(AnalysisRequest::new(inventory()).with_currency("USD"), &StatusTracker::new())
            .await
            .unwrap();
        assert!(report.converted_summary.is_none());

        let report = pipeline
            .run(AnalysisRequest::new(inventory()).with_currency("JPY"), &StatusTracker::new())
            .await
            .unwrap();
        assert!(report.converted_summary.is_none());
    }

    #[tokio::test]
    async fn test_malformed_currency_rejected() {
        let pipeline = offline_pipeline();
        let result = pipeline
            .run(AnalysisRequest::new(inventory()).with_currency("euro"), &StatusTracker::new())
            .await;
        assert!(matches!(result, Err(PricingError::InvalidInput(_))));
    }

    #[test]
    fn test_load_inventory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inventory.json");
        std::fs::write(
            &path,
            r#"[
                {"id": "vm-1", "name": "web", "category": "compute", "sku": "Standard_B2s", "os_type": "linux"},
                {"id": "st-1", "category": "block_storage", "sku": "Standard_LRS", "access_tier": "Cool"}
            ]"#,
        )
        .unwrap();

        let resources = load_inventory(&path).unwrap();
        assert_eq!(resources.len(), 2);
        assert_eq!(resources[1].display_name(), "st-1");

        std::fs::write(&path, r#"[{"id": " ", "category": "compute"}]"#).unwrap();
        assert!(matches!(load_inventory(&path), Err(PricingError::InvalidInput(_))));

        std::fs::write(&path, r#"[{"id": "x", "category": "mainframe"}]"#).unwrap();
        let err = load_inventory(&path).unwrap_err();
        assert!(err.to_string().contains("malformed inventory"));
    }

    #[test]
    fn test_report_serializes_decimals_as_strings() {
        let fixture = PricingFragment::new().with_price(ResourceCategory::Compute, "t3.micro", Decimal::new(759, 2));
        let catalog = PricingCatalog::from_resolved(vec![ResolvedFragment::layered(
            PricingSource::TargetRetail,
            fixture,
            Provenance::Live,
            Utc::now(),
        )]);
        let mapping = SkuMapping::with_defaults();
        let items = CostEstimator::new(&catalog, &mapping, 100).estimate(&inventory()[..1]);

        let json = serde_json::to_value(&items[0]).unwrap();
        assert_eq!(json["monthly_cost"], "7.59");
        assert_eq!(json["confidence"], "high");
        assert_eq!(json["provenance"], "live");
        assert_eq!(json["category"], "compute");
    }
}
