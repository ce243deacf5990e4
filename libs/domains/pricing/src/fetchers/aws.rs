//! AWS Price List fetcher (target provider)
//!
//! Reads the public regional offer files and joins `products` to on-demand
//! price dimensions. The offers are large, so they are fetched concurrently
//! and each one is cut off on its own deadline.
//! https://docs.aws.amazon.com/awsaccountbilling/latest/aboutv2/using-ppslong.html

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{get_json, hourly_to_monthly, is_plausible_price, PricingFetcher};
use crate::config::AwsPricingConfig;
use crate::error::{FetchError, FetchResult};
use crate::models::{PricingFragment, PricingSource, ResourceCategory};

const EC2_OFFER: &str = "AmazonEC2";
const RDS_OFFER: &str = "AmazonRDS";
const S3_OFFER: &str = "AmazonS3";

/// Share of the caller's budget an offer may use, so a slow offer is
/// abandoned before the caller's own deadline drops the finished ones
const OFFER_BUDGET_SHARE: f64 = 0.9;

type OfferParser = fn(&OfferFile, &mut PricingFragment) -> usize;

#[derive(Debug, Default, Deserialize)]
pub struct OfferFile {
    #[serde(default)]
    pub products: HashMap<String, OfferProduct>,
    #[serde(default)]
    pub terms: OfferTerms,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferProduct {
    #[serde(default)]
    pub product_family: String,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OfferTerms {
    /// product sku → offer term code → term
    #[serde(rename = "OnDemand", default)]
    pub on_demand: HashMap<String, HashMap<String, OfferTerm>>,
}

#[derive(Debug, Deserialize)]
pub struct OfferTerm {
    #[serde(rename = "priceDimensions", default)]
    pub price_dimensions: HashMap<String, PriceDimension>,
}

#[derive(Debug, Deserialize)]
pub struct PriceDimension {
    #[serde(default)]
    pub unit: String,
    #[serde(rename = "beginRange", default)]
    pub begin_range: Option<String>,
    #[serde(rename = "pricePerUnit", default)]
    pub price_per_unit: HashMap<String, String>,
}

impl OfferFile {
    fn attr<'a>(product: &'a OfferProduct, key: &str) -> &'a str {
        product.attributes.get(key).map(String::as_str).unwrap_or("")
    }

    /// First-tier on-demand USD price of a product
    fn on_demand_usd(&self, sku: &str) -> Option<Decimal> {
        self.terms
            .on_demand
            .get(sku)?
            .values()
            .flat_map(|term| term.price_dimensions.values())
            .filter(|dim| matches!(dim.begin_range.as_deref(), None | Some("0")))
            .find_map(|dim| dim.price_per_unit.get("USD"))
            .and_then(|raw| Decimal::from_str(raw.trim()).ok())
    }
}

/// Keep the cheapest plausible price per key so duplicate products resolve
/// deterministically
fn insert_lowest(
    fragment: &mut PricingFragment,
    category: ResourceCategory,
    key: &str,
    price: Decimal,
    rejected: &mut usize,
) {
    if !is_plausible_price(category, price) {
        *rejected += 1;
        debug!(sku = key, price = %price, "Rejected AWS price");
        return;
    }
    match fragment.price(category, key) {
        Some(existing) if existing <= price => {}
        _ => fragment.insert_price(category, key, price),
    }
}

/// EC2 Linux, shared tenancy, no pre-installed software, capacity `Used`
pub fn parse_ec2(offer: &OfferFile, fragment: &mut PricingFragment) -> usize {
    let mut rejected = 0;
    for (sku, product) in &offer.products {
        let instance_type = OfferFile::attr(product, "instanceType");
        if instance_type.is_empty()
            || OfferFile::attr(product, "operatingSystem") != "Linux"
            || OfferFile::attr(product, "tenancy") != "Shared"
            || OfferFile::attr(product, "preInstalledSw") != "NA"
            || OfferFile::attr(product, "capacitystatus") != "Used"
        {
            continue;
        }
        let Some(hourly) = offer.on_demand_usd(sku) else {
            continue;
        };
        match hourly_to_monthly(hourly) {
            Some(monthly) => insert_lowest(
                fragment,
                ResourceCategory::Compute,
                instance_type,
                monthly,
                &mut rejected,
            ),
            None => {
                rejected += 1;
                debug!(sku = instance_type, hourly = %hourly, "Rejected overflowing AWS price");
            }
        }
    }
    rejected
}

/// RDS PostgreSQL Single-AZ instances
pub fn parse_rds(offer: &OfferFile, fragment: &mut PricingFragment) -> usize {
    let mut rejected = 0;
    for (sku, product) in &offer.products {
        let instance_type = OfferFile::attr(product, "instanceType");
        if instance_type.is_empty()
            || OfferFile::attr(product, "databaseEngine") != "PostgreSQL"
            || OfferFile::attr(product, "deploymentOption") != "Single-AZ"
        {
            continue;
        }
        let Some(hourly) = offer.on_demand_usd(sku) else {
            continue;
        };
        match hourly_to_monthly(hourly) {
            Some(monthly) => insert_lowest(
                fragment,
                ResourceCategory::RelationalDb,
                instance_type,
                monthly,
                &mut rejected,
            ),
            None => {
                rejected += 1;
                debug!(sku = instance_type, hourly = %hourly, "Rejected overflowing AWS price");
            }
        }
    }
    rejected
}

/// S3 storage class → catalog tier key
fn s3_tier(volume_type: &str) -> Option<&'static str> {
    let volume_type = volume_type.to_lowercase();
    if volume_type.contains("deep archive") {
        Some("deep_archive")
    } else if volume_type.contains("glacier") {
        Some("cold")
    } else if volume_type.contains("infrequent access") && !volume_type.contains("one zone") {
        Some("infrequent_access")
    } else if volume_type == "standard" {
        Some("standard")
    } else {
        None
    }
}

/// S3 per-GB-month storage prices for the standard, IA and Glacier classes
pub fn parse_s3(offer: &OfferFile, fragment: &mut PricingFragment) -> usize {
    let mut rejected = 0;
    for (sku, product) in &offer.products {
        if product.product_family != "Storage" {
            continue;
        }
        let Some(tier) = s3_tier(OfferFile::attr(product, "volumeType")) else {
            continue;
        };
        if let Some(price) = offer.on_demand_usd(sku) {
            insert_lowest(fragment, ResourceCategory::BlockStorage, tier, price, &mut rejected);
        }
    }
    rejected
}

pub struct AwsPriceListFetcher {
    client: Client,
    config: AwsPricingConfig,
}

impl AwsPriceListFetcher {
    pub fn new(client: Client, config: AwsPricingConfig) -> Self {
        Self { client, config }
    }

    fn offer_url(&self, offer: &str) -> String {
        format!(
            "{}/offers/v1.0/aws/{}/current/{}/index.json",
            self.config.api_url.trim_end_matches('/'),
            offer,
            self.config.region
        )
    }
}

#[async_trait]
impl PricingFetcher for AwsPriceListFetcher {
    fn source(&self) -> PricingSource {
        PricingSource::TargetRetail
    }

    /// Offers are fetched independently; the source fails only when every
    /// offer fails or nothing usable was parsed
    async fn fetch(&self, timeout: Duration) -> FetchResult<PricingFragment> {
        info!(region = %self.config.region, "Fetching AWS price list offers");

        let parsers: [(&str, OfferParser); 3] = [
            (EC2_OFFER, parse_ec2),
            (RDS_OFFER, parse_rds),
            (S3_OFFER, parse_s3),
        ];
        let deadline = timeout.mul_f64(OFFER_BUDGET_SHARE);

        let downloads = parsers.iter().map(|(offer, _)| {
            let url = self.offer_url(offer);
            async move {
                tokio::time::timeout(deadline, get_json::<OfferFile>(&self.client, &url, deadline))
                    .await
                    .unwrap_or(Err(FetchError::Timeout(deadline)))
            }
        });
        let results = join_all(downloads).await;

        let mut fragment = PricingFragment::new();
        let mut first_error = None;
        let mut rejected = 0;

        for ((offer, parse), result) in parsers.into_iter().zip(results) {
            match result {
                Ok(file) => {
                    rejected += parse(&file, &mut fragment);
                    debug!(offer = offer, products = file.products.len(), "Parsed AWS offer");
                }
                Err(e) => {
                    warn!(offer = offer, error = %e, "AWS offer fetch failed");
                    first_error.get_or_insert(e);
                }
            }
        }

        if rejected > 0 {
            warn!(rejected = rejected, "Discarded implausible AWS prices");
        }

        if fragment.is_empty() {
            return Err(first_error.unwrap_or(FetchError::Empty));
        }

        info!(entries = fragment.len(), "Parsed AWS price list");
        Ok(fragment)
    }
}
