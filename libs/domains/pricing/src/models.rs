use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{Display, EnumIter, EnumString};

/// Cloud provider enumeration
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CloudProvider {
    /// Source side: resources are discovered here
    Azure,
    /// Target side: the equivalent estimate is priced here
    Aws,
}

/// Estimation category of a discovered resource
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResourceCategory {
    Compute,
    BlockStorage,
    RelationalDb,
    AppRuntime,
    Other,
}

impl ResourceCategory {
    /// Unit the catalog prices this category in
    pub fn pricing_unit(&self) -> PricingUnit {
        match self {
            ResourceCategory::BlockStorage => PricingUnit::GbMonth,
            _ => PricingUnit::Month,
        }
    }

    pub fn is_storage(&self) -> bool {
        matches!(self, ResourceCategory::BlockStorage)
    }
}

/// Pricing unit enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PricingUnit {
    /// Monthly USD per resource
    Month,
    /// USD per GB per month
    GbMonth,
}

/// Which tier of the fallback chain produced a price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Provenance {
    Live,
    Cached,
    Fallback,
}

/// How trustworthy a SKU mapping is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Confidence {
    /// Explicit table or override entry
    High,
    /// Routed to a category default
    Low,
}

/// Upstream pricing source, one per live API
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
pub enum PricingSource {
    /// Target-provider retail prices (AWS Price List)
    #[serde(rename = "aws")]
    #[strum(serialize = "aws")]
    TargetRetail,
    /// Source-provider retail prices (Azure Retail Prices)
    #[serde(rename = "azure")]
    #[strum(serialize = "azure")]
    SourceRetail,
    /// USD exchange rates
    #[serde(rename = "exchange_rates")]
    #[strum(serialize = "exchange_rates")]
    ExchangeRates,
}

impl PricingSource {
    pub const ALL: [PricingSource; 3] = [
        PricingSource::TargetRetail,
        PricingSource::SourceRetail,
        PricingSource::ExchangeRates,
    ];

    /// Cache key and log label for this source
    pub fn service_name(&self) -> &'static str {
        match self {
            PricingSource::TargetRetail => "aws",
            PricingSource::SourceRetail => "azure",
            PricingSource::ExchangeRates => "exchange_rates",
        }
    }

    /// Provider whose price tables this source feeds, if any
    pub fn provider(&self) -> Option<CloudProvider> {
        match self {
            PricingSource::TargetRetail => Some(CloudProvider::Aws),
            PricingSource::SourceRetail => Some(CloudProvider::Azure),
            PricingSource::ExchangeRates => None,
        }
    }
}

/// Lowercase SKU → unit price
pub type PriceTable = BTreeMap<String, Decimal>;

/// Normalized output of one pricing source.
///
/// SKU keys are stored lowercase and currency codes uppercase.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PricingFragment {
    #[serde(default)]
    pub prices: BTreeMap<ResourceCategory, PriceTable>,
    #[serde(default)]
    pub exchange_rates: BTreeMap<String, Decimal>,
}

impl PricingFragment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_price(&mut self, category: ResourceCategory, sku: &str, price: Decimal) {
        self.prices
            .entry(category)
            .or_default()
            .insert(normalize_sku(sku), price);
    }

    pub fn with_price(mut self, category: ResourceCategory, sku: &str, price: Decimal) -> Self {
        self.insert_price(category, sku, price);
        self
    }

    pub fn insert_rate(&mut self, currency: &str, rate: Decimal) {
        self.exchange_rates
            .insert(currency.trim().to_uppercase(), rate);
    }

    pub fn with_rate(mut self, currency: &str, rate: Decimal) -> Self {
        self.insert_rate(currency, rate);
        self
    }

    pub fn price(&self, category: ResourceCategory, sku: &str) -> Option<Decimal> {
        self.prices
            .get(&category)
            .and_then(|table| table.get(&normalize_sku(sku)))
            .copied()
    }

    pub fn rate(&self, currency: &str) -> Option<Decimal> {
        self.exchange_rates
            .get(&currency.trim().to_uppercase())
            .copied()
    }

    /// Merge `overrides` into this fragment; on key collisions the override wins
    pub fn merge(&mut self, overrides: PricingFragment) {
        for (category, table) in overrides.prices {
            self.prices.entry(category).or_default().extend(table);
        }
        self.exchange_rates.extend(overrides.exchange_rates);
    }

    /// Total number of prices and rates
    pub fn len(&self) -> usize {
        self.prices.values().map(BTreeMap::len).sum::<usize>() + self.exchange_rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Canonical lookup form of a SKU or tier string
pub fn normalize_sku(sku: &str) -> String {
    sku.trim().to_lowercase()
}

/// Operating system of a compute resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum OsType {
    #[default]
    Linux,
    Windows,
}

/// Category-specific attributes reported by discovery
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceAttributes {
    /// Compute: guest operating system
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_type: Option<OsType>,
    /// Block storage: access tier (Hot, Cool, Archive)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_tier: Option<String>,
    /// Relational DB: allocated size in bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size_bytes: Option<u64>,
    /// App runtime / storage: resource kind reported by the provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// One discovered source-provider resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub category: ResourceCategory,
    /// Source-provider size or tier, e.g. `Standard_B2s`
    #[serde(default)]
    pub sku: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub resource_group: String,
    #[serde(default, flatten)]
    pub attributes: ResourceAttributes,
}

impl ResourceRecord {
    pub fn new(id: impl Into<String>, category: ResourceCategory, sku: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            category,
            sku: sku.into(),
            location: String::new(),
            resource_group: String::new(),
            attributes: ResourceAttributes::default(),
        }
    }

    pub fn with_access_tier(mut self, tier: impl Into<String>) -> Self {
        self.attributes.access_tier = Some(tier.into());
        self
    }

    /// Name for display, falling back to the id
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// A unit price with its unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitPrice {
    pub amount: Decimal,
    pub unit: PricingUnit,
}

/// Provenance record for one resolved pricing source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceProvenance {
    pub source: PricingSource,
    pub provenance: Provenance,
    pub fetched_at: DateTime<Utc>,
    pub entries: usize,
}

/// One resource's estimated monthly cost
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub resource_id: String,
    pub resource_name: String,
    pub category: ResourceCategory,
    pub source_sku: String,
    /// Target SKU or service class the resource maps to
    pub target_sku: String,
    pub confidence: Confidence,
    /// Target-side monthly cost in USD, never discounted
    pub monthly_cost: Decimal,
    pub provenance: Provenance,
    /// Source-side monthly cost in USD at list price, when known
    pub source_monthly_cost: Option<Decimal>,
    /// Storage size assumed for GB-priced categories
    pub estimated_gb: Option<u32>,
}

/// Subscription-wide rollup of line items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostSummary {
    pub resource_count: usize,
    pub currency: String,
    pub compute_total: Decimal,
    pub block_storage_total: Decimal,
    pub relational_db_total: Decimal,
    pub app_runtime_total: Decimal,
    pub other_total: Decimal,
    pub grand_total: Decimal,
    pub source_total: Option<Decimal>,
    pub discount_percent: Decimal,
    pub discounted_source_total: Option<Decimal>,
    pub target_total: Option<Decimal>,
    pub savings_amount: Option<Decimal>,
    /// `None` when the discounted source total is zero
    pub savings_percent: Option<Decimal>,
}

impl CostSummary {
    pub fn subtotal(&self, category: ResourceCategory) -> Decimal {
        match category {
            ResourceCategory::Compute => self.compute_total,
            ResourceCategory::BlockStorage => self.block_storage_total,
            ResourceCategory::RelationalDb => self.relational_db_total,
            ResourceCategory::AppRuntime => self.app_runtime_total,
            ResourceCategory::Other => self.other_total,
        }
    }

    /// Rescale every money field by `rate` (USD → `currency`).
    ///
    /// Percentages are unit-free and carried over unchanged.
    pub fn converted(&self, currency: &str, rate: Decimal) -> CostSummary {
        let scale = |amount: Decimal| (amount * rate).round_dp(2);
        CostSummary {
            resource_count: self.resource_count,
            currency: currency.trim().to_uppercase(),
            compute_total: scale(self.compute_total),
            block_storage_total: scale(self.block_storage_total),
            relational_db_total: scale(self.relational_db_total),
            app_runtime_total: scale(self.app_runtime_total),
            other_total: scale(self.other_total),
            grand_total: scale(self.grand_total),
            source_total: self.source_total.map(scale),
            discount_percent: self.discount_percent,
            discounted_source_total: self.discounted_source_total.map(scale),
            target_total: self.target_total.map(scale),
            savings_amount: self.savings_amount.map(scale),
            savings_percent: self.savings_percent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_fragment_keys_are_normalized() {
        let fragment = PricingFragment::new()
            .with_price(ResourceCategory::Compute, " Standard_B1s ", Decimal::new(759, 2))
            .with_rate("eur", Decimal::new(85, 2));

        assert_eq!(
            fragment.price(ResourceCategory::Compute, "STANDARD_B1S"),
            Some(Decimal::new(759, 2))
        );
        assert_eq!(fragment.rate("EUR"), Some(Decimal::new(85, 2)));
        assert_eq!(fragment.len(), 2);
    }

    #[test]
    fn test_merge_override_wins() {
        let mut base = PricingFragment::new()
            .with_price(ResourceCategory::Compute, "t3.micro", Decimal::new(759, 2))
            .with_price(ResourceCategory::Compute, "t3.small", Decimal::new(1518, 2));
        let live = PricingFragment::new()
            .with_price(ResourceCategory::Compute, "t3.micro", Decimal::new(800, 2))
            .with_price(ResourceCategory::RelationalDb, "db.t3.micro", Decimal::new(1152, 2));

        base.merge(live);

        assert_eq!(base.price(ResourceCategory::Compute, "t3.micro"), Some(Decimal::new(800, 2)));
        assert_eq!(base.price(ResourceCategory::Compute, "t3.small"), Some(Decimal::new(1518, 2)));
        assert_eq!(
            base.price(ResourceCategory::RelationalDb, "db.t3.micro"),
            Some(Decimal::new(1152, 2))
        );
    }

    #[test]
    fn test_fragment_json_round_trip() {
        let fragment = PricingFragment::new()
            .with_price(ResourceCategory::BlockStorage, "standard", Decimal::new(23, 3))
            .with_rate("GBP", Decimal::new(73, 2));

        let json = serde_json::to_string(&fragment).unwrap();
        assert!(json.contains("\"block_storage\""));
        let parsed: PricingFragment = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, fragment);
    }

    #[test]
    fn test_resource_record_flattened_attributes() {
        let json = r#"{
            "id": "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Storage/storageAccounts/logs",
            "name": "logs",
            "category": "block_storage",
            "sku": "Standard_LRS",
            "location": "eastus",
            "resource_group": "rg",
            "access_tier": "Cool"
        }"#;

        let record: ResourceRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.category, ResourceCategory::BlockStorage);
        assert_eq!(record.attributes.access_tier.as_deref(), Some("Cool"));
        assert_eq!(record.display_name(), "logs");
    }

    #[test]
    fn test_pricing_source_names() {
        assert_eq!(PricingSource::TargetRetail.to_string(), "aws");
        assert_eq!(PricingSource::from_str("exchange_rates").unwrap(), PricingSource::ExchangeRates);
        assert_eq!(PricingSource::SourceRetail.provider(), Some(CloudProvider::Azure));
        assert_eq!(PricingSource::ExchangeRates.provider(), None);
    }

    #[test]
    fn test_os_type_parses_case_insensitively() {
        assert_eq!(OsType::from_str("Windows").unwrap(), OsType::Windows);
        assert_eq!(ResourceCategory::from_str("relational_db").unwrap(), ResourceCategory::RelationalDb);
    }
}
