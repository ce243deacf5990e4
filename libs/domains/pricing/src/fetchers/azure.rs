//! Azure Retail Prices fetcher (source provider)
//!
//! https://learn.microsoft.com/en-us/rest/api/cost-management/retail-prices/azure-retail-prices

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{get_json, hourly_to_monthly, is_plausible_price, PricingFetcher};
use crate::config::AzurePricingConfig;
use crate::error::{FetchError, FetchResult};
use crate::models::{PricingFragment, PricingSource, ResourceCategory};

const API_VERSION: &str = "2023-01-01-preview";

#[derive(Debug, Deserialize)]
pub struct AzurePriceResponse {
    #[serde(rename = "Items", default)]
    pub items: Vec<AzurePriceItem>,
    #[serde(rename = "NextPageLink")]
    pub next_page_link: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzurePriceItem {
    #[serde(default)]
    pub arm_sku_name: Option<String>,
    #[serde(default)]
    pub sku_name: String,
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub meter_name: String,
    #[serde(rename = "type", default)]
    pub price_type: String,
    #[serde(default)]
    pub unit_of_measure: String,
    #[serde(default)]
    pub tier_minimum_units: f64,
    pub unit_price: f64,
}

impl AzurePriceItem {
    fn decimal_price(&self) -> Option<Decimal> {
        Decimal::from_f64(self.unit_price)
    }
}

pub struct AzureRetailFetcher {
    client: Client,
    config: AzurePricingConfig,
}

impl AzureRetailFetcher {
    pub fn new(client: Client, config: AzurePricingConfig) -> Self {
        Self { client, config }
    }

    fn vm_filter(&self) -> String {
        format!(
            "serviceName eq 'Virtual Machines' and armRegionName eq '{}' and priceType eq 'Consumption'",
            self.config.region
        )
    }

    fn storage_filter(&self) -> String {
        format!(
            "serviceName eq 'Storage' and armRegionName eq '{}' and priceType eq 'Consumption'",
            self.config.region
        )
    }

    /// Run one filtered query, following `NextPageLink` up to the page cap
    async fn fetch_items(&self, filter: &str, timeout: Duration) -> FetchResult<Vec<AzurePriceItem>> {
        let mut url = format!(
            "{}?api-version={}&$filter={}",
            self.config.api_url,
            API_VERSION,
            urlencoding::encode(filter)
        );
        let mut items = Vec::new();

        for page in 1..=self.config.max_pages.max(1) {
            let response: AzurePriceResponse = get_json(&self.client, &url, timeout).await?;
            debug!(page = page, items = response.items.len(), "Fetched Azure pricing page");
            items.extend(response.items);

            match response.next_page_link {
                Some(next) if !next.is_empty() => url = next,
                _ => break,
            }
        }

        Ok(items)
    }
}

#[async_trait]
impl PricingFetcher for AzureRetailFetcher {
    fn source(&self) -> PricingSource {
        PricingSource::SourceRetail
    }

    async fn fetch(&self, timeout: Duration) -> FetchResult<PricingFragment> {
        info!(region = %self.config.region, "Fetching Azure retail prices");

        let vm_items = self.fetch_items(&self.vm_filter(), timeout).await;
        let storage_items = self.fetch_items(&self.storage_filter(), timeout).await;

        // Either query alone still yields usable prices
        let (vm_items, storage_items) = match (vm_items, storage_items) {
            (Err(e), Err(_)) => return Err(e),
            (Ok(vm_items), Err(e)) => {
                warn!(error = %e, "Azure storage prices unavailable");
                (vm_items, Vec::new())
            }
            (Err(e), Ok(storage_items)) => {
                warn!(error = %e, "Azure VM prices unavailable");
                (Vec::new(), storage_items)
            }
            (Ok(vm_items), Ok(storage_items)) => (vm_items, storage_items),
        };

        let fragment = parse_retail_items(&vm_items, &storage_items);
        if fragment.is_empty() {
            return Err(FetchError::Empty);
        }

        info!(entries = fragment.len(), "Parsed Azure retail prices");
        Ok(fragment)
    }
}

/// Normalize VM and storage retail items into a source-side fragment.
///
/// The first accepted item per SKU or tier wins.
pub fn parse_retail_items(
    vm_items: &[AzurePriceItem],
    storage_items: &[AzurePriceItem],
) -> PricingFragment {
    let mut fragment = PricingFragment::new();
    let mut rejected = 0usize;

    for item in vm_items {
        let Some(sku) = item.arm_sku_name.as_deref().filter(|s| !s.is_empty()) else {
            continue;
        };
        let product = item.product_name.to_lowercase();
        let sku_name = item.sku_name.to_lowercase();
        if item.price_type != "Consumption"
            || product.contains("windows")
            || sku_name.contains("spot")
            || sku_name.contains("low priority")
        {
            continue;
        }
        if fragment.price(ResourceCategory::Compute, sku).is_some() {
            continue;
        }

        match item.decimal_price().and_then(hourly_to_monthly) {
            Some(monthly) if is_plausible_price(ResourceCategory::Compute, monthly) => {
                fragment.insert_price(ResourceCategory::Compute, sku, monthly);
            }
            _ => {
                rejected += 1;
                debug!(sku = sku, unit_price = item.unit_price, "Rejected Azure VM price");
            }
        }
    }

    for item in storage_items {
        if !item.sku_name.contains("LRS") || item.tier_minimum_units > 0.0 {
            continue;
        }
        let meter = item.meter_name.to_lowercase();
        if !meter.contains("data stored") {
            continue;
        }
        let tier = if meter.contains("hot") {
            "hot"
        } else if meter.contains("cool") {
            "cool"
        } else if meter.contains("archive") {
            "archive"
        } else {
            "standard_lrs"
        };
        if fragment.price(ResourceCategory::BlockStorage, tier).is_some() {
            continue;
        }

        match item.decimal_price() {
            Some(price) if is_plausible_price(ResourceCategory::BlockStorage, price) => {
                fragment.insert_price(ResourceCategory::BlockStorage, tier, price);
            }
            _ => {
                rejected += 1;
                debug!(tier = tier, unit_price = item.unit_price, "Rejected Azure storage price");
            }
        }
    }

    if rejected > 0 {
        warn!(rejected = rejected, "Discarded implausible Azure prices");
    }

    fragment
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn vm(sku: &str, product: &str, sku_name: &str, price: f64) -> AzurePriceItem {
        AzurePriceItem {
            arm_sku_name: Some(sku.to_string()),
            sku_name: sku_name.to_string(),
            product_name: product.to_string(),
            meter_name: sku_name.to_string(),
            price_type: "Consumption".to_string(),
            unit_of_measure: "1 Hour".to_string(),
            tier_minimum_units: 0.0,
            unit_price: price,
        }
    }

    fn storage(sku_name: &str, meter: &str, price: f64) -> AzurePriceItem {
        AzurePriceItem {
            arm_sku_name: None,
            sku_name: sku_name.to_string(),
            product_name: "General Block Blob v2".to_string(),
            meter_name: meter.to_string(),
            price_type: "Consumption".to_string(),
            unit_of_measure: "1 GB/Month".to_string(),
            tier_minimum_units: 0.0,
            unit_price: price,
        }
    }

    #[test]
    fn test_parse_skips_windows_and_spot() {
        let items = vec![
            vm("Standard_B1s", "Virtual Machines BS Series Windows", "B1s", 0.0126),
            vm("Standard_B1s", "Virtual Machines BS Series", "B1s Spot", 0.0021),
            vm("Standard_B1s", "Virtual Machines BS Series", "B1s", 0.0104),
            vm("Standard_B2s", "Virtual Machines BS Series", "B2s", 0.0416),
        ];

        let fragment = parse_retail_items(&items, &[]);

        assert_eq!(fragment.price(ResourceCategory::Compute, "standard_b1s"), Some(Decimal::new(759, 2)));
        assert_eq!(fragment.price(ResourceCategory::Compute, "standard_b2s"), Some(Decimal::new(3037, 2)));
        assert_eq!(fragment.len(), 2);
    }

    #[test]
    fn test_parse_rejects_anomalies() {
        let items = vec![
            vm("Standard_Free", "Virtual Machines", "Free", 0.0),
            vm("Standard_Huge", "Virtual Machines", "Huge", 50.0),
        ];
        let storage_items = vec![storage("Hot LRS", "Hot LRS Data Stored", 2.5)];

        assert!(parse_retail_items(&items, &storage_items).is_empty());
    }

    #[test]
    fn test_parse_rejects_overflowing_hourly_price() {
        let items = vec![
            vm("Standard_Broken", "Virtual Machines", "Broken", 1e27),
            vm("Standard_B1s", "Virtual Machines BS Series", "B1s", 0.0104),
        ];

        let fragment = parse_retail_items(&items, &[]);

        assert_eq!(fragment.price(ResourceCategory::Compute, "standard_broken"), None);
        assert_eq!(fragment.price(ResourceCategory::Compute, "standard_b1s"), Some(Decimal::new(759, 2)));
        assert_eq!(fragment.len(), 1);
    }

    #[test]
    fn test_parse_storage_tiers() {
        let items = vec![
            storage("Hot LRS", "Hot LRS Data Stored", 0.0208),
            storage("Cool LRS", "Cool LRS Data Stored", 0.0152),
            storage("Hot GRS", "Hot GRS Data Stored", 0.0458),
            storage("Hot LRS", "Hot Read Operations", 0.0044),
        ];

        let fragment = parse_retail_items(&[], &items);

        assert_eq!(fragment.price(ResourceCategory::BlockStorage, "hot"), Some(Decimal::new(208, 4)));
        assert_eq!(fragment.price(ResourceCategory::BlockStorage, "cool"), Some(Decimal::new(152, 4)));
        assert_eq!(fragment.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_follows_next_page_link() {
        let mut server = mockito::Server::new_async().await;
        let base = server.url();

        let first_page = server
            .mock("GET", "/api/retail/prices")
            .match_query(Matcher::Regex("Virtual".to_string()))
            .with_status(200)
            .with_body(
                json!({
                    "Items": [{
                        "armSkuName": "Standard_B1s",
                        "skuName": "B1s",
                        "productName": "Virtual Machines BS Series",
                        "meterName": "B1s",
                        "type": "Consumption",
                        "unitOfMeasure": "1 Hour",
                        "unitPrice": 0.0104
                    }],
                    "NextPageLink": format!("{base}/next-page")
                })
                .to_string(),
            )
            .create_async()
            .await;

        let second_page = server
            .mock("GET", "/next-page")
            .with_status(200)
            .with_body(
                json!({
                    "Items": [{
                        "armSkuName": "Standard_D2s_v3",
                        "skuName": "D2s v3",
                        "productName": "Virtual Machines DSv3 Series",
                        "meterName": "D2s v3",
                        "type": "Consumption",
                        "unitOfMeasure": "1 Hour",
                        "unitPrice": 0.096
                    }],
                    "NextPageLink": null
                })
                .to_string(),
            )
            .create_async()
            .await;

        let storage_page = server
            .mock("GET", "/api/retail/prices")
            .match_query(Matcher::Regex("Storage".to_string()))
            .with_status(200)
            .with_body(json!({ "Items": [], "NextPageLink": null }).to_string())
            .create_async()
            .await;

        let fetcher = AzureRetailFetcher::new(
            Client::new(),
            AzurePricingConfig {
                api_url: format!("{base}/api/retail/prices"),
                ..AzurePricingConfig::default()
            },
        );

        let fragment = fetcher.fetch(Duration::from_secs(5)).await.unwrap();

        first_page.assert_async().await;
        second_page.assert_async().await;
        storage_page.assert_async().await;
        assert_eq!(
            fragment.price(ResourceCategory::Compute, "standard_d2s_v3"),
            Some(Decimal::new(7008, 2))
        );
        assert_eq!(fragment.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_non_success_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/retail/prices")
            .match_query(Matcher::Any)
            .with_status(503)
            .create_async()
            .await;

        let fetcher = AzureRetailFetcher::new(
            Client::new(),
            AzurePricingConfig {
                api_url: format!("{}/api/retail/prices", server.url()),
                ..AzurePricingConfig::default()
            },
        );

        let err = fetcher.fetch(Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(err, FetchError::Status(503)));
    }

    #[tokio::test]
    async fn test_fetch_keeps_vm_prices_when_storage_fails() {
        let mut server = mockito::Server::new_async().await;

        let vm_page = server
            .mock("GET", "/api/retail/prices")
            .match_query(Matcher::Regex("Virtual".to_string()))
            .with_status(200)
            .with_body(
                json!({
                    "Items": [{
                        "armSkuName": "Standard_B1s",
                        "skuName": "B1s",
                        "productName": "Virtual Machines BS Series",
                        "meterName": "B1s",
                        "type": "Consumption",
                        "unitOfMeasure": "1 Hour",
                        "unitPrice": 0.0104
                    }],
                    "NextPageLink": null
                })
                .to_string(),
            )
            .create_async()
            .await;

        let storage_page = server
            .mock("GET", "/api/retail/prices")
            .match_query(Matcher::Regex("Storage".to_string()))
            .with_status(500)
            .create_async()
            .await;

        let fetcher = AzureRetailFetcher::new(
            Client::new(),
            AzurePricingConfig {
                api_url: format!("{}/api/retail/prices", server.url()),
                ..AzurePricingConfig::default()
            },
        );

        let fragment = fetcher.fetch(Duration::from_secs(5)).await.unwrap();

        vm_page.assert_async().await;
        storage_page.assert_async().await;
        assert_eq!(
            fragment.price(ResourceCategory::Compute, "standard_b1s"),
            Some(Decimal::new(759, 2))
        );
        assert_eq!(fragment.len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_empty_result() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/retail/prices")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!({ "Items": [] }).to_string())
            .expect_at_least(1)
            .create_async()
            .await;

        let fetcher = AzureRetailFetcher::new(
            Client::new(),
            AzurePricingConfig {
                api_url: format!("{}/api/retail/prices", server.url()),
                ..AzurePricingConfig::default()
            },
        );

        let err = fetcher.fetch(Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(err, FetchError::Empty));
    }
}
