//! Pricing Domain
//!
//! Cross-cloud pricing resolution and migration cost estimation: discovered
//! Azure resources in, an equivalent AWS monthly estimate out.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐
//! │   Pipeline   │  ← validate → resolve → estimate → aggregate, status
//! └──────┬───────┘
//!        │
//! ┌──────▼───────┐   ┌─────────────┐
//! │   Resolver   │──►│  Fetchers   │  ← AWS price list, Azure retail, FX
//! └──────┬───────┘   └─────────────┘
//!        │  cache → live → defaults
//! ┌──────▼───────┐   ┌─────────────┐
//! │   Catalog    │◄──│ Cache store │  ← file or in-memory
//! └──────┬───────┘   └─────────────┘
//!        │
//! ┌──────▼───────┐
//! │  Estimator   │  ← SKU mapping, one line item per resource
//! └──────┬───────┘
//!        │
//! ┌──────▼───────┐
//! │  Aggregator  │  ← discount, totals, savings
//! └──────────────┘
//! ```

pub mod aggregator;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod defaults;
pub mod error;
pub mod estimator;
pub mod fetchers;
pub mod mapping;
pub mod models;
pub mod pipeline;
pub mod resolver;
pub mod status;

// Re-export commonly used types
pub use aggregator::{adjust, aggregate, Discount};
pub use cache::{CacheEntry, CacheStatus, FileCacheStore, InMemoryCacheStore, PricingCacheStore};
pub use catalog::{CatalogEntry, PriceKey, PricingCatalog, ResolvedFragment};
pub use config::PricingConfig;
pub use error::{CacheError, FetchError, PricingError, PricingResult};
pub use estimator::CostEstimator;
pub use fetchers::{FetcherRegistry, PricingFetcher};
pub use mapping::{MappedSku, SkuMapping, SkuOverride};
pub use models::{
    CloudProvider, Confidence, CostSummary, LineItem, PricingFragment, PricingSource, PricingUnit,
    Provenance, ResourceAttributes, ResourceCategory, ResourceRecord, SourceProvenance, UnitPrice,
};
pub use pipeline::{load_inventory, AnalysisRequest, EstimationPipeline, EstimationReport};
pub use resolver::PricingResolver;
pub use status::{AnalysisStage, AnalysisState, AnalysisStatus, StatusTracker};
