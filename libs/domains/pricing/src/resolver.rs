//! Pricing resolution: cache → live fetch → static defaults.
//!
//! The resolver never fails. Every fetch or cache problem degrades to the
//! next tier, and the last tier is compiled in.

use chrono::Utc;
use futures::future::join_all;
use observability::{EstimationMetrics, EstimationTimer};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::cache::{FileCacheStore, PricingCacheStore};
use crate::catalog::{PricingCatalog, ResolvedFragment};
use crate::config::PricingConfig;
use crate::error::FetchError;
use crate::fetchers::FetcherRegistry;
use crate::models::{PricingFragment, PricingSource, Provenance};

pub struct PricingResolver {
    cache: Arc<dyn PricingCacheStore>,
    fetchers: FetcherRegistry,
    cache_ttl: Duration,
    fetch_timeout: Duration,
}

impl PricingResolver {
    pub fn new(
        cache: Arc<dyn PricingCacheStore>,
        fetchers: FetcherRegistry,
        cache_ttl: Duration,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            cache,
            fetchers,
            cache_ttl,
            fetch_timeout,
        }
    }

    /// File-backed cache plus the live fetchers, unless live fetching is
    /// disabled or the HTTP client cannot be built
    pub fn from_config(config: &PricingConfig) -> Self {
        let fetchers = if config.live_fetch {
            FetcherRegistry::from_config(config).unwrap_or_else(|e| {
                warn!(error = %e, "Could not build pricing HTTP client, live fetching disabled");
                FetcherRegistry::new()
            })
        } else {
            info!("Live pricing fetch disabled");
            FetcherRegistry::new()
        };
        info!(
            live_sources = ?fetchers.sources(),
            cache_dir = %config.cache_dir.display(),
            "Pricing resolver configured"
        );

        Self::new(
            Arc::new(FileCacheStore::new(config.cache_dir.clone())),
            fetchers,
            config.cache_ttl(),
            config.fetch_timeout(),
        )
    }

    pub fn cache(&self) -> &dyn PricingCacheStore {
        self.cache.as_ref()
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    /// Resolve one source through the full fallback chain
    pub async fn resolve(&self, source: PricingSource) -> ResolvedFragment {
        self.resolve_with(source, false).await
    }

    /// Resolve one source skipping the cache tier
    pub async fn refresh(&self, source: PricingSource) -> ResolvedFragment {
        self.resolve_with(source, true).await
    }

    /// Resolve every source concurrently and build the catalog
    pub async fn resolve_catalog(&self) -> PricingCatalog {
        self.catalog(false).await
    }

    /// Like [`resolve_catalog`](Self::resolve_catalog) but bypasses valid
    /// cache entries
    pub async fn refresh_catalog(&self) -> PricingCatalog {
        self.catalog(true).await
    }

    async fn catalog(&self, force_refresh: bool) -> PricingCatalog {
        let resolved = join_all(
            PricingSource::ALL
                .iter()
                .map(|source| self.resolve_with(*source, force_refresh)),
        )
        .await;

        let catalog = PricingCatalog::from_resolved(resolved);
        info!(
            entries = catalog.len(),
            force_refresh = force_refresh,
            "Pricing catalog resolved"
        );
        catalog
    }

    async fn resolve_with(&self, source: PricingSource, force_refresh: bool) -> ResolvedFragment {
        let resolved = match self.from_cache(source, force_refresh) {
            Some(resolved) => resolved,
            None => match self.from_live(source).await {
                Some(resolved) => resolved,
                None => ResolvedFragment::fallback(source, Utc::now()),
            },
        };

        EstimationMetrics::record_resolution(source.service_name(), &resolved.provenance.to_string());
        debug!(
            source = source.service_name(),
            provenance = %resolved.provenance,
            entries = resolved.fragment.len(),
            "Resolved pricing source"
        );
        resolved
    }

    fn from_cache(&self, source: PricingSource, force_refresh: bool) -> Option<ResolvedFragment> {
        let service = source.service_name();
        if force_refresh {
            debug!(source = service, "Skipping cache on forced refresh");
            return None;
        }

        match self.cache.load_entry(service, self.cache_ttl) {
            Some(entry) => {
                EstimationMetrics::record_cache_hit(service);
                Some(ResolvedFragment::layered(
                    source,
                    entry.payload,
                    Provenance::Cached,
                    entry.fetched_at,
                ))
            }
            None => {
                EstimationMetrics::record_cache_miss(service);
                None
            }
        }
    }

    async fn from_live(&self, source: PricingSource) -> Option<ResolvedFragment> {
        let service = source.service_name();
        let Some(fetcher) = self.fetchers.get(source) else {
            debug!(source = service, "No live fetcher registered");
            return None;
        };

        let timer = EstimationTimer::start(service);
        let outcome = tokio::time::timeout(self.fetch_timeout, fetcher.fetch(self.fetch_timeout))
            .await
            .unwrap_or(Err(FetchError::Timeout(self.fetch_timeout)))
            .and_then(non_empty);

        match outcome {
            Ok(fragment) => {
                timer.success(fragment.len());
                self.cache.save(service, &fragment);
                Some(ResolvedFragment::layered(
                    source,
                    fragment,
                    Provenance::Live,
                    Utc::now(),
                ))
            }
            Err(e) => {
                timer.failure(e.kind());
                warn!(source = service, error = %e, "Live pricing fetch failed, using static defaults");
                None
            }
        }
    }
}

fn non_empty(fragment: PricingFragment) -> Result<PricingFragment, FetchError> {
    if fragment.is_empty() {
        Err(FetchError::Empty)
    } else {
        Ok(fragment)
    }
}
