//! Source SKU → target SKU mapping tables.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};
use validator::Validate;

use crate::defaults::DEFAULT_SKU;
use crate::error::{PricingError, PricingResult};
use crate::models::{normalize_sku, Confidence, ResourceCategory};

/// Target SKU or service class used by the `other` category
pub const UNMAPPED_TARGET: &str = "unmapped";

fn validate_not_blank(value: &str) -> Result<(), validator::ValidationError> {
    if value.trim().is_empty() {
        return Err(validator::ValidationError::new("blank"));
    }
    Ok(())
}

/// Caller-supplied mapping entry, merged over the defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct SkuOverride {
    pub category: ResourceCategory,
    #[validate(length(min = 1), custom(function = "validate_not_blank"))]
    pub source_sku: String,
    #[validate(length(min = 1), custom(function = "validate_not_blank"))]
    pub target_sku: String,
    /// Price the target in another category's table
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_category: Option<ResourceCategory>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct MappingTarget {
    target_sku: String,
    category: ResourceCategory,
}

/// Result of mapping one source SKU
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedSku {
    pub target_sku: String,
    /// Catalog category the target is priced in
    pub category: ResourceCategory,
    pub confidence: Confidence,
}

/// Per-category `source_sku → target` tables with a `default` entry each
#[derive(Debug, Clone)]
pub struct SkuMapping {
    tables: BTreeMap<ResourceCategory, BTreeMap<String, MappingTarget>>,
}

const COMPUTE: &[(&str, &str)] = &[
    ("standard_b1s", "t3.nano"),
    ("standard_b1ms", "t3.micro"),
    ("standard_b2s", "t3.small"),
    ("standard_b2ms", "t3.medium"),
    ("standard_b4ms", "t3.large"),
    ("standard_d2s_v3", "m5.large"),
    ("standard_d4s_v3", "m5.xlarge"),
    ("standard_d8s_v3", "m5.2xlarge"),
    ("standard_a1_v2", "t3.small"),
    ("standard_f2s_v2", "c5.large"),
    ("standard_e2s_v3", "r5.large"),
    (DEFAULT_SKU, "t3.medium"),
];

const RELATIONAL_DB: &[(&str, &str)] = &[
    ("basic", "db.t3.micro"),
    ("standard_s0", "db.t3.small"),
    ("standard_s1", "db.t3.medium"),
    ("standard_s2", "db.m5.large"),
    ("gp_gen5_2", "db.r5.large"),
    ("gp_gen5_4", "db.r5.xlarge"),
    (DEFAULT_SKU, "db.t3.micro"),
];

const BLOCK_STORAGE: &[(&str, &str)] = &[
    ("hot", "standard"),
    ("cool", "infrequent_access"),
    ("archive", "cold"),
    (DEFAULT_SKU, "standard"),
];

const APP_RUNTIME: &[(&str, &str)] = &[
    ("free", "typical_app"),
    ("shared", "typical_app"),
    ("basic_b1", "typical_app"),
    ("standard_s1", "typical_app"),
    ("premium_p1v2", "typical_app"),
    (DEFAULT_SKU, "typical_app"),
];

const OTHER: &[(&str, &str)] = &[(DEFAULT_SKU, UNMAPPED_TARGET)];

impl Default for SkuMapping {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl SkuMapping {
    /// The built-in tables
    pub fn with_defaults() -> Self {
        let mut tables = BTreeMap::new();
        for (category, rows) in [
            (ResourceCategory::Compute, COMPUTE),
            (ResourceCategory::RelationalDb, RELATIONAL_DB),
            (ResourceCategory::BlockStorage, BLOCK_STORAGE),
            (ResourceCategory::AppRuntime, APP_RUNTIME),
            (ResourceCategory::Other, OTHER),
        ] {
            let table: BTreeMap<_, _> = rows
                .iter()
                .map(|(source, target)| {
                    (
                        source.to_string(),
                        MappingTarget {
                            target_sku: target.to_string(),
                            category,
                        },
                    )
                })
                .collect();
            tables.insert(category, table);
        }
        Self { tables }
    }

    /// Merge validated overrides over the current tables; overrides win
    pub fn with_overrides(mut self, overrides: &[SkuOverride]) -> PricingResult<Self> {
        for entry in overrides {
            entry.validate()?;
        }

        for entry in overrides {
            let source = normalize_sku(&entry.source_sku);
            debug!(
                category = %entry.category,
                source_sku = %source,
                target_sku = %entry.target_sku,
                "Applying SKU override"
            );
            self.tables.entry(entry.category).or_default().insert(
                source,
                MappingTarget {
                    target_sku: normalize_sku(&entry.target_sku),
                    category: entry.target_category.unwrap_or(entry.category),
                },
            );
        }

        Ok(self)
    }

    /// Read a JSON array of [`SkuOverride`] records
    pub fn load_overrides(path: &Path) -> PricingResult<Vec<SkuOverride>> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PricingError::InvalidInput(format!(
                "cannot read SKU overrides {}: {e}",
                path.display()
            ))
        })?;
        let overrides: Vec<SkuOverride> = serde_json::from_str(&raw).map_err(|e| {
            PricingError::InvalidInput(format!(
                "malformed SKU overrides {}: {e}",
                path.display()
            ))
        })?;

        for entry in &overrides {
            entry.validate()?;
        }

        info!(path = %path.display(), count = overrides.len(), "Loaded SKU overrides");
        Ok(overrides)
    }

    /// Map a source SKU (or storage access tier).
    ///
    /// Unknown SKUs route to the category default with low confidence.
    pub fn map(&self, source_sku: &str, category: ResourceCategory) -> MappedSku {
        let key = normalize_sku(source_sku);
        let table = self.tables.get(&category);

        if key != DEFAULT_SKU {
            if let Some(target) = table.and_then(|t| t.get(&key)) {
                return MappedSku {
                    target_sku: target.target_sku.clone(),
                    category: target.category,
                    confidence: Confidence::High,
                };
            }
        }

        match table.and_then(|t| t.get(DEFAULT_SKU)) {
            Some(target) => MappedSku {
                target_sku: target.target_sku.clone(),
                category: target.category,
                confidence: Confidence::Low,
            },
            None => MappedSku {
                target_sku: DEFAULT_SKU.to_string(),
                category,
                confidence: Confidence::Low,
            },
        }
    }
}
