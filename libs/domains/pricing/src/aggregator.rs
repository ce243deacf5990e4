//! Discount adjustment and line-item aggregation.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::{PricingError, PricingResult};
use crate::models::{CostSummary, LineItem, ResourceCategory};

/// Currency every line item is priced in
pub const BASE_CURRENCY: &str = "USD";

/// A negotiated commitment discount in percent, within `[0, 100]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Discount(Decimal);

impl Discount {
    pub fn new(percent: Decimal) -> PricingResult<Self> {
        if percent < Decimal::ZERO || percent > Decimal::ONE_HUNDRED {
            return Err(PricingError::InvalidInput(format!(
                "discount must be within 0..=100 percent, got {percent}"
            )));
        }
        Ok(Self(percent))
    }

    pub fn none() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn percent(&self) -> Decimal {
        self.0
    }
}

/// `source_total * (1 - pct / 100)`
pub fn adjust(source_total: Decimal, discount: Discount) -> Decimal {
    if discount.0.is_zero() {
        return source_total;
    }
    source_total * (Decimal::ONE - discount.0 / Decimal::ONE_HUNDRED)
}

/// Roll line items up into a summary.
///
/// `grand_total` is the exact sum of `monthly_cost`; the discount only
/// touches the source-side totals.
pub fn aggregate(line_items: &[LineItem], discount: Discount) -> CostSummary {
    let subtotal = |category: ResourceCategory| -> Decimal {
        line_items
            .iter()
            .filter(|item| item.category == category)
            .map(|item| item.monthly_cost)
            .sum()
    };

    let grand_total: Decimal = line_items.iter().map(|item| item.monthly_cost).sum();

    let known_source: Vec<Decimal> = line_items
        .iter()
        .filter_map(|item| item.source_monthly_cost)
        .collect();
    let source_total = (!known_source.is_empty()).then(|| known_source.iter().copied().sum::<Decimal>());

    let discounted_source_total = source_total.map(|total| adjust(total, discount));
    let target_total = Some(grand_total);
    let savings_amount = discounted_source_total.map(|discounted| discounted - grand_total);
    let savings_percent = match (savings_amount, discounted_source_total) {
        (Some(savings), Some(discounted)) if !discounted.is_zero() => {
            Some((savings / discounted * Decimal::ONE_HUNDRED).round_dp(2))
        }
        _ => None,
    };

    CostSummary {
        resource_count: line_items.len(),
        currency: BASE_CURRENCY.to_string(),
        compute_total: subtotal(ResourceCategory::Compute),
        block_storage_total: subtotal(ResourceCategory::BlockStorage),
        relational_db_total: subtotal(ResourceCategory::RelationalDb),
        app_runtime_total: subtotal(ResourceCategory::AppRuntime),
        other_total: subtotal(ResourceCategory::Other),
        grand_total,
        source_total,
        discount_percent: discount.percent(),
        discounted_source_total,
        target_total,
        savings_amount,
        savings_percent,
    }
}
