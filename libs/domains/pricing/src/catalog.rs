//! Unified, immutable pricing catalog built once per estimation run.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::defaults::{fallback_fragment, DEFAULT_SKU};
use crate::models::{
    normalize_sku, CloudProvider, PricingFragment, PricingSource, Provenance, ResourceCategory,
    SourceProvenance, UnitPrice,
};

/// Lookup key of a catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PriceKey {
    pub provider: CloudProvider,
    pub category: ResourceCategory,
    pub sku: String,
}

impl PriceKey {
    pub fn new(provider: CloudProvider, category: ResourceCategory, sku: &str) -> Self {
        Self {
            provider,
            category,
            sku: normalize_sku(sku),
        }
    }
}

/// One priced SKU with its provenance
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CatalogEntry {
    pub price: UnitPrice,
    pub provenance: Provenance,
    /// When the underlying fragment was fetched (or compiled in, for fallback)
    pub freshness: DateTime<Utc>,
}

/// Output of resolving a single pricing source.
///
/// `fragment` is the static default table with `upstream` (the cached or
/// live data, empty for fallback) merged on top.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFragment {
    pub source: PricingSource,
    pub fragment: PricingFragment,
    pub upstream: PricingFragment,
    pub provenance: Provenance,
    pub fetched_at: DateTime<Utc>,
}

impl ResolvedFragment {
    /// Layer `upstream` over the source's static defaults
    pub fn layered(
        source: PricingSource,
        upstream: PricingFragment,
        provenance: Provenance,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        let mut fragment = fallback_fragment(source);
        fragment.merge(upstream.clone());
        Self {
            source,
            fragment,
            upstream,
            provenance,
            fetched_at,
        }
    }

    /// Static defaults only
    pub fn fallback(source: PricingSource, resolved_at: DateTime<Utc>) -> Self {
        Self::layered(source, PricingFragment::new(), Provenance::Fallback, resolved_at)
    }

    /// Provenance of one price: defaults that no upstream value replaced
    /// stay `fallback`
    pub fn price_provenance(&self, category: ResourceCategory, sku: &str) -> Provenance {
        if self.upstream.price(category, sku).is_some() {
            self.provenance
        } else {
            Provenance::Fallback
        }
    }

    pub fn rate_provenance(&self, currency: &str) -> Provenance {
        if self.upstream.rate(currency).is_some() {
            self.provenance
        } else {
            Provenance::Fallback
        }
    }

    pub fn summary(&self) -> SourceProvenance {
        SourceProvenance {
            source: self.source,
            provenance: self.provenance,
            fetched_at: self.fetched_at,
            entries: self.fragment.len(),
        }
    }
}

/// A looked-up price, flagging whether the category default was used
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceLookup {
    pub entry: CatalogEntry,
    pub used_default: bool,
}

/// Exchange rate with provenance
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RateEntry {
    pub rate: Decimal,
    pub provenance: Provenance,
    pub freshness: DateTime<Utc>,
}

/// `(provider, category, sku) → UnitPrice` plus USD exchange rates
#[derive(Debug, Clone, Default)]
pub struct PricingCatalog {
    entries: BTreeMap<PriceKey, CatalogEntry>,
    exchange_rates: BTreeMap<String, RateEntry>,
    sources: Vec<SourceProvenance>,
}

impl PricingCatalog {
    /// Build a catalog from resolved fragments.
    ///
    /// Price tables land under the provider the source feeds; exchange rates
    /// are accepted from any fragment.
    pub fn from_resolved(resolved: impl IntoIterator<Item = ResolvedFragment>) -> Self {
        let mut catalog = PricingCatalog::default();

        for item in resolved {
            catalog.sources.push(item.summary());

            if let Some(provider) = item.source.provider() {
                for (category, table) in &item.fragment.prices {
                    let unit = category.pricing_unit();
                    for (sku, amount) in table {
                        catalog.entries.insert(
                            PriceKey::new(provider, *category, sku),
                            CatalogEntry {
                                price: UnitPrice {
                                    amount: *amount,
                                    unit,
                                },
                                provenance: item.price_provenance(*category, sku),
                                freshness: item.fetched_at,
                            },
                        );
                    }
                }
            }

            for (currency, rate) in &item.fragment.exchange_rates {
                catalog.exchange_rates.insert(
                    currency.to_uppercase(),
                    RateEntry {
                        rate: *rate,
                        provenance: item.rate_provenance(currency),
                        freshness: item.fetched_at,
                    },
                );
            }
        }

        catalog.sources.sort_by_key(|s| s.source);
        catalog
    }

    /// Exact lookup
    pub fn get(
        &self,
        provider: CloudProvider,
        category: ResourceCategory,
        sku: &str,
    ) -> Option<&CatalogEntry> {
        self.entries.get(&PriceKey::new(provider, category, sku))
    }

    /// Lookup falling back to the category `default` entry
    pub fn price_or_default(
        &self,
        provider: CloudProvider,
        category: ResourceCategory,
        sku: &str,
    ) -> Option<PriceLookup> {
        if let Some(entry) = self.get(provider, category, sku) {
            return Some(PriceLookup {
                entry: *entry,
                used_default: false,
            });
        }

        self.get(provider, category, DEFAULT_SKU)
            .map(|entry| PriceLookup {
                entry: *entry,
                used_default: true,
            })
    }

    /// USD → `currency` rate; USD itself is always 1
    pub fn exchange_rate(&self, currency: &str) -> Option<Decimal> {
        let code = currency.trim().to_uppercase();
        if code == "USD" {
            return Some(Decimal::ONE);
        }
        self.exchange_rates.get(&code).map(|r| r.rate)
    }

    pub fn exchange_rates(&self) -> impl Iterator<Item = (&String, &RateEntry)> {
        self.exchange_rates.iter()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&PriceKey, &CatalogEntry)> {
        self.entries.iter()
    }

    pub fn sources(&self) -> &[SourceProvenance] {
        &self.sources
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.exchange_rates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PricingUnit;

    fn resolved(source: PricingSource, fragment: PricingFragment, provenance: Provenance) -> ResolvedFragment {
        ResolvedFragment {
            source,
            fragment: fragment.clone(),
            upstream: fragment,
            provenance,
            fetched_at: Utc::now(),
        }
    }

    fn sample_catalog() -> PricingCatalog {
        let aws = PricingFragment::new()
            .with_price(ResourceCategory::Compute, "t3.micro", Decimal::new(759, 2))
            .with_price(ResourceCategory::Compute, DEFAULT_SKU, Decimal::new(3037, 2))
            .with_price(ResourceCategory::BlockStorage, "standard", Decimal::new(23, 3));
        let azure = PricingFragment::new()
            .with_price(ResourceCategory::Compute, "standard_b1ms", Decimal::new(1518, 2));
        let rates = PricingFragment::new().with_rate("EUR", Decimal::new(85, 2));

        PricingCatalog::from_resolved(vec![
            resolved(PricingSource::ExchangeRates, rates, Provenance::Fallback),
            resolved(PricingSource::TargetRetail, aws, Provenance::Live),
            resolved(PricingSource::SourceRetail, azure, Provenance::Cached),
        ])
    }

    #[test]
    fn test_entries_keyed_by_provider() {
        let catalog = sample_catalog();

        let entry = catalog
            .get(CloudProvider::Aws, ResourceCategory::Compute, "T3.Micro")
            .unwrap();
        assert_eq!(entry.price.amount, Decimal::new(759, 2));
        assert_eq!(entry.provenance, Provenance::Live);

        assert!(catalog
            .get(CloudProvider::Azure, ResourceCategory::Compute, "t3.micro")
            .is_none());
        assert_eq!(
            catalog
                .get(CloudProvider::Azure, ResourceCategory::Compute, "Standard_B1ms")
                .unwrap()
                .provenance,
            Provenance::Cached
        );
    }

    #[test]
    fn test_storage_priced_per_gb_month() {
        let catalog = sample_catalog();
        let entry = catalog
            .get(CloudProvider::Aws, ResourceCategory::BlockStorage, "standard")
            .unwrap();
        assert_eq!(entry.price.unit, PricingUnit::GbMonth);
    }

    #[test]
    fn test_price_or_default() {
        let catalog = sample_catalog();

        let exact = catalog
            .price_or_default(CloudProvider::Aws, ResourceCategory::Compute, "t3.micro")
            .unwrap();
        assert!(!exact.used_default);

        let fallback = catalog
            .price_or_default(CloudProvider::Aws, ResourceCategory::Compute, "x9.mega")
            .unwrap();
        assert!(fallback.used_default);
        assert_eq!(fallback.entry.price.amount, Decimal::new(3037, 2));

        assert!(catalog
            .price_or_default(CloudProvider::Aws, ResourceCategory::RelationalDb, "db.t3.micro")
            .is_none());
    }

    #[test]
    fn test_exchange_rates() {
        let catalog = sample_catalog();
        assert_eq!(catalog.exchange_rate("usd"), Some(Decimal::ONE));
        assert_eq!(catalog.exchange_rate("eur"), Some(Decimal::new(85, 2)));
        assert_eq!(catalog.exchange_rate("JPY"), None);
    }

    #[test]
    fn test_sources_sorted() {
        let catalog = sample_catalog();
        let order: Vec<_> = catalog.sources().iter().map(|s| s.source).collect();
        assert_eq!(
            order,
            vec![
                PricingSource::TargetRetail,
                PricingSource::SourceRetail,
                PricingSource::ExchangeRates
            ]
        );
        assert_eq!(catalog.sources()[0].entries, 3);
    }
}
