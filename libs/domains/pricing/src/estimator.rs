//! Per-resource cost estimation.

use observability::EstimationMetrics;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::catalog::PricingCatalog;
use crate::mapping::{MappedSku, SkuMapping};
use crate::models::{
    normalize_sku, CloudProvider, Confidence, LineItem, PricingUnit, Provenance, ResourceCategory,
    ResourceRecord, UnitPrice,
};

/// Access tier assumed for storage records that report none
pub const DEFAULT_ACCESS_TIER: &str = "hot";

/// Turns discovered resources into line items, one per record
pub struct CostEstimator<'a> {
    catalog: &'a PricingCatalog,
    mapping: &'a SkuMapping,
    estimated_storage_gb: u32,
}

impl<'a> CostEstimator<'a> {
    pub fn new(catalog: &'a PricingCatalog, mapping: &'a SkuMapping, estimated_storage_gb: u32) -> Self {
        Self {
            catalog,
            mapping,
            estimated_storage_gb,
        }
    }

    pub fn estimate(&self, resources: &[ResourceRecord]) -> Vec<LineItem> {
        resources.iter().map(|r| self.estimate_one(r)).collect()
    }

    /// Storage maps by access tier, everything else by SKU
    fn lookup_key(record: &ResourceRecord) -> String {
        match record.category {
            ResourceCategory::BlockStorage => normalize_sku(
                record
                    .attributes
                    .access_tier
                    .as_deref()
                    .filter(|tier| !tier.trim().is_empty())
                    .unwrap_or(DEFAULT_ACCESS_TIER),
            ),
            _ => normalize_sku(&record.sku),
        }
    }

    pub fn estimate_one(&self, record: &ResourceRecord) -> LineItem {
        self.assess(record).0
    }

    fn assess(&self, record: &ResourceRecord) -> (LineItem, Option<PriceGap>) {
        let key = Self::lookup_key(record);
        let MappedSku {
            target_sku,
            category: priced_as,
            mut confidence,
        } = self.mapping.map(&key, record.category);
        let sku_mapped = confidence == Confidence::High;

        let (monthly_cost, provenance, priced_exactly) =
            match self
                .catalog
                .price_or_default(CloudProvider::Aws, priced_as, &target_sku)
            {
                Some(lookup) => match line_cost(lookup.entry.price, self.estimated_storage_gb) {
                    Some(cost) => {
                        if lookup.used_default {
                            debug!(target_sku = %target_sku, "Target SKU not in catalog, using category default price");
                        }
                        (cost, lookup.entry.provenance, !lookup.used_default)
                    }
                    None => {
                        warn!(
                            resource_id = %record.id,
                            target_sku = %target_sku,
                            price = %lookup.entry.price.amount,
                            "Target price overflows the line cost, costing at zero"
                        );
                        (Decimal::ZERO, Provenance::Fallback, false)
                    }
                },
                None => {
                    warn!(
                        resource_id = %record.id,
                        category = %priced_as,
                        "No target price or category default, costing at zero"
                    );
                    (Decimal::ZERO, Provenance::Fallback, false)
                }
            };

        let gap = match (sku_mapped, priced_exactly) {
            (false, _) => Some(PriceGap::UnmappedSku),
            (true, false) => Some(PriceGap::MissingTargetPrice),
            (true, true) => None,
        };

        match gap {
            Some(PriceGap::UnmappedSku) => {
                warn!(
                    resource_id = %record.id,
                    category = %record.category,
                    source_sku = %record.sku,
                    target_sku = %target_sku,
                    "SKU routed to category default"
                );
                EstimationMetrics::record_unmapped_sku(&record.category.to_string());
            }
            Some(PriceGap::MissingTargetPrice) => {
                warn!(
                    resource_id = %record.id,
                    category = %priced_as,
                    source_sku = %record.sku,
                    target_sku = %target_sku,
                    "Mapped target SKU has no price, costed at category default"
                );
                EstimationMetrics::record_missing_target_price(&priced_as.to_string());
            }
            None => {}
        }
        if gap.is_some() {
            confidence = Confidence::Low;
        }

        let uses_gb = record.category.pricing_unit() == PricingUnit::GbMonth
            || priced_as.pricing_unit() == PricingUnit::GbMonth;

        let item = LineItem {
            resource_id: record.id.clone(),
            resource_name: record.display_name().to_string(),
            category: record.category,
            source_sku: record.sku.clone(),
            target_sku,
            confidence,
            monthly_cost,
            provenance,
            source_monthly_cost: self.source_cost(record, &key),
            estimated_gb: uses_gb.then_some(self.estimated_storage_gb),
        };
        (item, gap)
    }

    /// List price of the resource as it runs today, on the source provider
    fn source_cost(&self, record: &ResourceRecord, key: &str) -> Option<Decimal> {
        if record.category == ResourceCategory::Other {
            return None;
        }

        let lookup = self
            .catalog
            .price_or_default(CloudProvider::Azure, record.category, key)?;
        line_cost(lookup.entry.price, self.estimated_storage_gb)
    }
}

/// Why a line item fell to low confidence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PriceGap {
    /// No mapping entry; routed to the category's default target
    UnmappedSku,
    /// Mapped, but the target had no usable catalog price
    MissingTargetPrice,
}

/// Monthly cost of one unit price, `None` when the product overflows
fn line_cost(price: UnitPrice, gb: u32) -> Option<Decimal> {
    match price.unit {
        PricingUnit::GbMonth => price
            .amount
            .checked_mul(Decimal::from(gb))
            .map(|cost| cost.round_dp(2)),
        PricingUnit::Month => Some(price.amount),
    }
}
