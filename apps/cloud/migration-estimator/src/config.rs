//! Configuration for the migration estimator

use core_config::{Environment, FromEnv};
use domain_pricing::PricingConfig;
use eyre::Result;

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub pricing: PricingConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            environment: Environment::from_env(),
            pricing: <PricingConfig as FromEnv>::from_env()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        temp_env::with_vars(
            [
                ("APP_ENV", Some("production")),
                ("PRICING_LIVE_FETCH", Some("false")),
                ("ESTIMATED_STORAGE_GB", Some("250")),
            ],
            || {
                let config = Config::from_env().unwrap();
                assert!(config.environment.is_production());
                assert!(!config.pricing.live_fetch);
                assert_eq!(config.pricing.estimated_storage_gb, 250);
            },
        );
    }

    #[test]
    fn test_bad_pricing_value_is_an_error() {
        temp_env::with_var("PRICING_CACHE_TTL_HOURS", Some("six"), || {
            let err = Config::from_env().unwrap_err();
            assert!(err.to_string().contains("PRICING_CACHE_TTL_HOURS"));
        });
    }
}
