//! USD exchange-rate fetcher

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{info, warn};

use super::{get_json, is_plausible_rate, PricingFetcher};
use crate::error::{FetchError, FetchResult};
use crate::models::{PricingFragment, PricingSource};

#[derive(Debug, Deserialize)]
pub struct ExchangeRateResponse {
    #[serde(default)]
    pub base: Option<String>,
    #[serde(default)]
    pub rates: BTreeMap<String, f64>,
}

pub struct ExchangeRateFetcher {
    client: Client,
    url: String,
}

impl ExchangeRateFetcher {
    pub fn new(client: Client, url: String) -> Self {
        Self { client, url }
    }
}

/// Keep plausible rates only; a non-USD base invalidates the whole response
pub fn parse_rates(response: &ExchangeRateResponse) -> FetchResult<PricingFragment> {
    if let Some(base) = response.base.as_deref() {
        if !base.eq_ignore_ascii_case("USD") {
            return Err(FetchError::Parse(format!("expected USD base, got {base}")));
        }
    }

    let mut fragment = PricingFragment::new();
    let mut rejected = 0;

    for (code, raw) in &response.rates {
        match Decimal::from_f64(*raw) {
            Some(rate) if is_plausible_rate(rate) => fragment.insert_rate(code, rate),
            _ => rejected += 1,
        }
    }

    if rejected > 0 {
        warn!(rejected = rejected, "Discarded implausible exchange rates");
    }

    Ok(fragment)
}

#[async_trait]
impl PricingFetcher for ExchangeRateFetcher {
    fn source(&self) -> PricingSource {
        PricingSource::ExchangeRates
    }

    async fn fetch(&self, timeout: Duration) -> FetchResult<PricingFragment> {
        let response: ExchangeRateResponse = get_json(&self.client, &self.url, timeout).await?;
        let fragment = parse_rates(&response)?;

        if fragment.is_empty() {
            return Err(FetchError::Empty);
        }

        info!(rates = fragment.len(), "Fetched exchange rates");
        Ok(fragment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_rates_filters_anomalies() {
        let response: ExchangeRateResponse = serde_json::from_value(json!({
            "base": "USD",
            "rates": { "USD": 1, "EUR": 0.92, "XXX": 0, "VES": 36500000.0 }
        }))
        .unwrap();

        let fragment = parse_rates(&response).unwrap();

        assert_eq!(fragment.rate("eur"), Some(Decimal::new(92, 2)));
        assert_eq!(fragment.rate("USD"), Some(Decimal::ONE));
        assert_eq!(fragment.rate("XXX"), None);
        assert_eq!(fragment.rate("VES"), None);
    }

    #[test]
    fn test_parse_rates_rejects_other_base() {
        let response = ExchangeRateResponse {
            base: Some("EUR".to_string()),
            rates: BTreeMap::from([("USD".to_string(), 1.08)]),
        };
        assert!(matches!(parse_rates(&response), Err(FetchError::Parse(_))));
    }

    #[tokio::test]
    async fn test_fetch_reads_rates() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v4/latest/USD")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "base": "USD", "rates": { "GBP": 0.79, "CAD": 1.37 } }).to_string())
            .create_async()
            .await;

        let fetcher = ExchangeRateFetcher::new(Client::new(), format!("{}/v4/latest/USD", server.url()));
        let fragment = fetcher.fetch(Duration::from_secs(5)).await.unwrap();

        mock.assert_async().await;
        assert_eq!(fragment.rate("CAD"), Some(Decimal::new(137, 2)));
    }

    #[tokio::test]
    async fn test_fetch_empty_rates() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/v4/latest/USD")
            .with_status(200)
            .with_body(json!({ "base": "USD", "rates": {} }).to_string())
            .create_async()
            .await;

        let fetcher = ExchangeRateFetcher::new(Client::new(), format!("{}/v4/latest/USD", server.url()));
        assert!(matches!(
            fetcher.fetch(Duration::from_secs(5)).await,
            Err(FetchError::Empty)
        ));
    }
}
