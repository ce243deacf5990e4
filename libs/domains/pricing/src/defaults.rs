//! Compiled-in fallback price tables.
//!
//! The resolver is the only consumer: it serves these when a source has no
//! valid cache entry and its live fetch fails, and merges live results on top
//! of them so SKUs the live API omits keep a price.

use rust_decimal::Decimal;

use crate::models::{PricingFragment, PricingSource, ResourceCategory};

/// Key of the per-category catch-all price and mapping
pub const DEFAULT_SKU: &str = "default";

/// `(sku, cents-scaled amount, scale)` rows
type Rows = &'static [(&'static str, i64, u32)];

const AWS_COMPUTE: Rows = &[
    ("t3.nano", 380, 2),
    ("t3.micro", 759, 2),
    ("t3.small", 1518, 2),
    ("t3.medium", 3037, 2),
    ("t3.large", 6074, 2),
    ("m5.large", 6935, 2),
    ("m5.xlarge", 13870, 2),
    ("m5.2xlarge", 27740, 2),
    ("c5.large", 6130, 2),
    ("r5.large", 8760, 2),
    (DEFAULT_SKU, 3037, 2),
];

const AWS_RDS: Rows = &[
    ("db.t3.micro", 1152, 2),
    ("db.t3.small", 2906, 2),
    ("db.t3.medium", 5811, 2),
    ("db.t3.large", 11623, 2),
    ("db.m5.large", 12774, 2),
    ("db.r5.large", 14000, 2),
    ("db.r5.xlarge", 28000, 2),
    (DEFAULT_SKU, 1152, 2),
];

const AWS_S3: Rows = &[
    ("standard", 23, 3),
    ("infrequent_access", 125, 4),
    ("cold", 4, 3),
    ("deep_archive", 99, 5),
    (DEFAULT_SKU, 23, 3),
];

const AWS_APP: Rows = &[
    ("typical_app", 850, 2),
    ("low_usage", 500, 2),
    ("medium_usage", 1500, 2),
    ("high_usage", 5000, 2),
    (DEFAULT_SKU, 850, 2),
];

const AWS_OTHER: Rows = &[(DEFAULT_SKU, 0, 0)];

const AZURE_VM: Rows = &[
    ("standard_b1s", 759, 2),
    ("standard_b1ms", 1518, 2),
    ("standard_b2s", 3037, 2),
    ("standard_b2ms", 6074, 2),
    ("standard_b4ms", 12147, 2),
    ("standard_d2s_v3", 9636, 2),
    ("standard_d4s_v3", 19272, 2),
    ("standard_d8s_v3", 38544, 2),
    (DEFAULT_SKU, 5000, 2),
];

const AZURE_STORAGE: Rows = &[
    ("standard_lrs", 208, 4),
    ("standard_grs", 416, 4),
    ("premium_lrs", 15, 2),
    ("hot", 208, 4),
    ("cool", 108, 4),
    ("archive", 99, 5),
    (DEFAULT_SKU, 208, 4),
];

const AZURE_SQL: Rows = &[
    ("basic", 500, 2),
    ("standard_s0", 1500, 2),
    ("standard_s1", 3000, 2),
    ("standard_s2", 7500, 2),
    ("premium_p1", 46500, 2),
    ("gp_gen5_2", 42000, 2),
    (DEFAULT_SKU, 5000, 2),
];

const AZURE_APP: Rows = &[
    ("free", 0, 0),
    ("shared", 949, 2),
    ("basic_b1", 1314, 2),
    ("standard_s1", 5694, 2),
    ("premium_p1v2", 8541, 2),
    (DEFAULT_SKU, 2500, 2),
];

const EXCHANGE_RATES: Rows = &[
    ("USD", 1, 0),
    ("EUR", 85, 2),
    ("GBP", 73, 2),
    ("CAD", 125, 2),
    ("AUD", 135, 2),
];

fn load(fragment: &mut PricingFragment, category: ResourceCategory, rows: Rows) {
    for (sku, amount, scale) in rows {
        fragment.insert_price(category, sku, Decimal::new(*amount, *scale));
    }
}

/// Static fallback fragment for `source`
pub fn fallback_fragment(source: PricingSource) -> PricingFragment {
    let mut fragment = PricingFragment::new();

    match source {
        PricingSource::TargetRetail => {
            load(&mut fragment, ResourceCategory::Compute, AWS_COMPUTE);
            load(&mut fragment, ResourceCategory::RelationalDb, AWS_RDS);
            load(&mut fragment, ResourceCategory::BlockStorage, AWS_S3);
            load(&mut fragment, ResourceCategory::AppRuntime, AWS_APP);
            load(&mut fragment, ResourceCategory::Other, AWS_OTHER);
        }
        PricingSource::SourceRetail => {
            load(&mut fragment, ResourceCategory::Compute, AZURE_VM);
            load(&mut fragment, ResourceCategory::BlockStorage, AZURE_STORAGE);
            load(&mut fragment, ResourceCategory::RelationalDb, AZURE_SQL);
            load(&mut fragment, ResourceCategory::AppRuntime, AZURE_APP);
        }
        PricingSource::ExchangeRates => {
            for (code, amount, scale) in EXCHANGE_RATES {
                fragment.insert_rate(code, Decimal::new(*amount, *scale));
            }
        }
    }

    fragment
}
