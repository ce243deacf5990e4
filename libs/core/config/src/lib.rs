pub mod tracing;

use std::env;
use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;

/// Configuration error type
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse environment variable '{key}': {details}")]
    ParseError { key: String, details: String },
}

/// Runtime environment of the estimator (selects log format and verbosity)
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn from_env() -> Self {
        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        if app_env.eq_ignore_ascii_case("production") {
            Environment::Production
        } else {
            Environment::Development
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }
}

/// Trait for configuration that can be loaded from environment variables
pub trait FromEnv: Sized {
    fn from_env() -> Result<Self, ConfigError>;
}

/// Load an environment variable, falling back to `default` when unset
pub fn env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Load an optional environment variable; empty values count as unset
pub fn env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse an environment variable into `T`, using `default` when unset.
///
/// A set but unparsable value is an error rather than a silent fallback.
pub fn env_parse<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match env_optional(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::ParseError {
            key: key.to_string(),
            details: e.to_string(),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_defaults_to_development() {
        temp_env::with_var_unset("APP_ENV", || {
            let env = Environment::from_env();
            assert_eq!(env, Environment::Development);
            assert!(env.is_development());
            assert!(!env.is_production());
        });
    }

    #[test]
    fn test_environment_production_case_insensitive() {
        temp_env::with_var("APP_ENV", Some("PRODUCTION"), || {
            assert_eq!(Environment::from_env(), Environment::Production);
        });

        temp_env::with_var("APP_ENV", Some("staging"), || {
            assert_eq!(Environment::from_env(), Environment::Development);
        });
    }

    #[test]
    fn test_env_or_default() {
        temp_env::with_var("CACHE_DIR_TEST", Some("/var/cache/prices"), || {
            assert_eq!(env_or_default("CACHE_DIR_TEST", "/tmp"), "/var/cache/prices");
        });

        temp_env::with_var_unset("CACHE_DIR_TEST", || {
            assert_eq!(env_or_default("CACHE_DIR_TEST", "/tmp"), "/tmp");
        });
    }

    #[test]
    fn test_env_optional_treats_blank_as_unset() {
        temp_env::with_var("OVERRIDES_PATH_TEST", Some("   "), || {
            assert_eq!(env_optional("OVERRIDES_PATH_TEST"), None);
        });

        temp_env::with_var("OVERRIDES_PATH_TEST", Some("overrides.json"), || {
            assert_eq!(
                env_optional("OVERRIDES_PATH_TEST").as_deref(),
                Some("overrides.json")
            );
        });
    }

    #[test]
    fn test_env_parse_uses_default_when_unset() {
        temp_env::with_var_unset("TTL_HOURS_TEST", || {
            let ttl: u32 = env_parse("TTL_HOURS_TEST", 6).unwrap();
            assert_eq!(ttl, 6);
        });
    }

    #[test]
    fn test_env_parse_reads_value() {
        temp_env::with_var("TTL_HOURS_TEST", Some(" 12 "), || {
            let ttl: u32 = env_parse("TTL_HOURS_TEST", 6).unwrap();
            assert_eq!(ttl, 12);
        });
    }

    #[test]
    fn test_env_parse_rejects_garbage() {
        temp_env::with_var("TTL_HOURS_TEST", Some("six"), || {
            let result: Result<u32, _> = env_parse("TTL_HOURS_TEST", 6);
            match result {
                Err(ConfigError::ParseError { key, .. }) => assert_eq!(key, "TTL_HOURS_TEST"),
                other => panic!("expected parse error, got {:?}", other),
            }
        });
    }
}
