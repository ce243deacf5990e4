//! Pricing and estimation configuration

use core_config::{env_optional, env_or_default, env_parse, ConfigError, FromEnv};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::time::Duration;

pub const AZURE_RETAIL_PRICES_URL: &str = "https://prices.azure.com/api/retail/prices";
pub const AWS_PRICE_LIST_URL: &str = "https://pricing.us-east-1.amazonaws.com";
pub const EXCHANGE_RATE_URL: &str = "https://api.exchangerate-api.com/v4/latest/USD";

/// Source-provider (Azure) retail API settings
#[derive(Debug, Clone, PartialEq)]
pub struct AzurePricingConfig {
    pub api_url: String,
    pub region: String,
    /// Upper bound on `NextPageLink` pages followed per query
    pub max_pages: usize,
}

impl Default for AzurePricingConfig {
    fn default() -> Self {
        Self {
            api_url: AZURE_RETAIL_PRICES_URL.to_string(),
            region: "eastus".to_string(),
            max_pages: 3,
        }
    }
}

/// Target-provider (AWS) price list settings
#[derive(Debug, Clone, PartialEq)]
pub struct AwsPricingConfig {
    pub api_url: String,
    pub region: String,
}

impl Default for AwsPricingConfig {
    fn default() -> Self {
        Self {
            api_url: AWS_PRICE_LIST_URL.to_string(),
            region: "us-east-1".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PricingConfig {
    pub cache_dir: PathBuf,
    pub cache_ttl_hours: u64,
    pub fetch_timeout_secs: u64,
    /// When false no live fetchers are registered and every source resolves
    /// from cache or fallback
    pub live_fetch: bool,
    pub estimated_storage_gb: u32,
    pub discount_percent: Decimal,
    pub sku_overrides_path: Option<PathBuf>,
    pub exchange_rate_url: String,
    pub azure: AzurePricingConfig,
    pub aws: AwsPricingConfig,
}

fn default_cache_dir() -> PathBuf {
    std::env::temp_dir().join("cloud_migration_pricing")
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            cache_ttl_hours: 6,
            fetch_timeout_secs: 15,
            live_fetch: true,
            estimated_storage_gb: 100,
            discount_percent: Decimal::ZERO,
            sku_overrides_path: None,
            exchange_rate_url: EXCHANGE_RATE_URL.to_string(),
            azure: AzurePricingConfig::default(),
            aws: AwsPricingConfig::default(),
        }
    }
}

impl PricingConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_hours * 3600)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

impl FromEnv for PricingConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = PricingConfig::default();

        Ok(PricingConfig {
            cache_dir: env_optional("PRICING_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_dir),
            cache_ttl_hours: env_parse("PRICING_CACHE_TTL_HOURS", defaults.cache_ttl_hours)?,
            fetch_timeout_secs: env_parse(
                "PRICING_FETCH_TIMEOUT_SECS",
                defaults.fetch_timeout_secs,
            )?,
            live_fetch: env_parse("PRICING_LIVE_FETCH", defaults.live_fetch)?,
            estimated_storage_gb: env_parse(
                "ESTIMATED_STORAGE_GB",
                defaults.estimated_storage_gb,
            )?,
            discount_percent: env_parse("DISCOUNT_PERCENT", defaults.discount_percent)?,
            sku_overrides_path: env_optional("SKU_OVERRIDES_PATH").map(PathBuf::from),
            exchange_rate_url: env_or_default("EXCHANGE_RATE_API_URL", EXCHANGE_RATE_URL),
            azure: AzurePricingConfig {
                api_url: env_or_default("AZURE_PRICING_API_URL", AZURE_RETAIL_PRICES_URL),
                region: env_or_default("AZURE_PRICING_REGION", &defaults.azure.region),
                max_pages: env_parse("AZURE_PRICING_MAX_PAGES", defaults.azure.max_pages)?,
            },
            aws: AwsPricingConfig {
                api_url: env_or_default("AWS_PRICING_API_URL", AWS_PRICE_LIST_URL),
                region: env_or_default("AWS_PRICING_REGION", &defaults.aws.region),
            },
        })
    }
}
