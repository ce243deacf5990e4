//! Live pricing source fetchers
//!
//! One fetcher per upstream API. Each produces a normalized
//! [`PricingFragment`] or a [`FetchError`]; fetchers share nothing, so one
//! failing source never affects another.

pub mod aws;
pub mod azure;
pub mod exchange;

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::PricingConfig;
use crate::error::{FetchError, FetchResult};
use crate::models::{PricingFragment, PricingSource, PricingUnit, ResourceCategory};

pub use aws::AwsPriceListFetcher;
pub use azure::AzureRetailFetcher;
pub use exchange::ExchangeRateFetcher;

/// Hours used for every hourly → monthly conversion
pub const HOURS_PER_MONTH: u32 = 730;

/// Monthly instance prices above this (USD) are treated as anomalies
pub const MAX_MONTHLY_INSTANCE_PRICE: i64 = 10_000;

/// Storage prices above this (USD per GB-month) are treated as anomalies
pub const MAX_GB_MONTH_PRICE: i64 = 1;

/// Exchange rates must fall strictly inside `(0, MAX_EXCHANGE_RATE)`
pub const MAX_EXCHANGE_RATE: i64 = 10_000;

/// Convert an hourly price to a monthly one, rounded to cents.
///
/// `None` when the product overflows `Decimal`.
pub fn hourly_to_monthly(hourly: Decimal) -> Option<Decimal> {
    hourly
        .checked_mul(Decimal::from(HOURS_PER_MONTH))
        .map(|monthly| monthly.round_dp(2))
}

/// Whether a parsed price is positive and under its category's ceiling
pub fn is_plausible_price(category: ResourceCategory, price: Decimal) -> bool {
    if price <= Decimal::ZERO {
        return false;
    }
    match category.pricing_unit() {
        PricingUnit::GbMonth => price <= Decimal::from(MAX_GB_MONTH_PRICE),
        PricingUnit::Month => price <= Decimal::from(MAX_MONTHLY_INSTANCE_PRICE),
    }
}

pub fn is_plausible_rate(rate: Decimal) -> bool {
    rate > Decimal::ZERO && rate < Decimal::from(MAX_EXCHANGE_RATE)
}

/// Number of prices and rates in `fragment` that fail the plausibility bounds
pub fn count_implausible(fragment: &PricingFragment) -> usize {
    let prices = fragment
        .prices
        .iter()
        .flat_map(|(category, table)| table.values().map(move |price| (*category, *price)))
        .filter(|(category, price)| !is_plausible_price(*category, *price))
        .count();
    let rates = fragment
        .exchange_rates
        .values()
        .filter(|rate| !is_plausible_rate(**rate))
        .count();
    prices + rates
}

/// A single upstream pricing API
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PricingFetcher: Send + Sync {
    /// The source this fetcher feeds
    fn source(&self) -> PricingSource;

    /// Fetch and normalize current prices, bounded by `timeout`
    async fn fetch(&self, timeout: Duration) -> FetchResult<PricingFragment>;
}

/// Registered fetchers, at most one per source
#[derive(Default, Clone)]
pub struct FetcherRegistry {
    fetchers: HashMap<PricingSource, Arc<dyn PricingFetcher>>,
}

impl FetcherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the three live fetchers described by `config`
    pub fn from_config(config: &PricingConfig) -> FetchResult<Self> {
        let client = build_client(config.fetch_timeout())?;

        let mut registry = Self::new();
        registry.register(Arc::new(AwsPriceListFetcher::new(
            client.clone(),
            config.aws.clone(),
        )));
        registry.register(Arc::new(AzureRetailFetcher::new(
            client.clone(),
            config.azure.clone(),
        )));
        registry.register(Arc::new(ExchangeRateFetcher::new(
            client,
            config.exchange_rate_url.clone(),
        )));
        Ok(registry)
    }

    /// Register a fetcher, replacing any previous one for the same source
    pub fn register(&mut self, fetcher: Arc<dyn PricingFetcher>) {
        self.fetchers.insert(fetcher.source(), fetcher);
    }

    pub fn get(&self, source: PricingSource) -> Option<Arc<dyn PricingFetcher>> {
        self.fetchers.get(&source).cloned()
    }

    pub fn sources(&self) -> Vec<PricingSource> {
        let mut sources: Vec<_> = self.fetchers.keys().copied().collect();
        sources.sort();
        sources
    }

    pub fn len(&self) -> usize {
        self.fetchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fetchers.is_empty()
    }
}

/// Shared HTTP client; requests also carry a per-call timeout
pub fn build_client(timeout: Duration) -> FetchResult<Client> {
    Ok(Client::builder()
        .timeout(timeout)
        .user_agent(concat!("migration-estimator/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// GET `url` and decode a JSON body, mapping failures onto [`FetchError`]
pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    timeout: Duration,
) -> FetchResult<T> {
    debug!(url = url, "Requesting pricing data");

    let response = client.get(url).timeout(timeout).send().await?;

    if !response.status().is_success() {
        return Err(FetchError::Status(response.status().as_u16()));
    }

    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| FetchError::Parse(e.to_string()))
}
