//! Pricing cache store.
//!
//! Entries are keyed by source service name and judged purely by age. Every
//! read failure degrades to a miss and every write failure is logged and
//! skipped, so the cache can never fail an estimation.

use chrono::{DateTime, Utc};
use observability::EstimationMetrics;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::CacheError;
use crate::fetchers::count_implausible;
use crate::models::PricingFragment;

/// A cached fragment and the moment it was fetched
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub service_name: String,
    pub payload: PricingFragment,
    pub fetched_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(service_name: &str, payload: PricingFragment, fetched_at: DateTime<Utc>) -> Self {
        Self {
            service_name: service_name.to_string(),
            payload,
            fetched_at,
        }
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        is_fresh(self.fetched_at, now, ttl)
    }
}

/// `0 <= now - fetched_at < ttl`; a timestamp in the future is never fresh
fn is_fresh(fetched_at: DateTime<Utc>, now: DateTime<Utc>, ttl: Duration) -> bool {
    match (now - fetched_at).to_std() {
        Ok(age) => age < ttl,
        Err(_) => false,
    }
}

/// Cache state of one source, as shown by `cache-status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum CacheStatus {
    Valid { fetched_at: DateTime<Utc> },
    Stale { fetched_at: DateTime<Utc> },
    Missing,
}

/// Persistence for fetched pricing fragments.
///
/// Implementors supply the raw typed operations; the lenient `load`, `save`
/// and `is_valid` contract is provided on top of them.
pub trait PricingCacheStore: Send + Sync {
    fn read_entry(&self, service: &str) -> Result<Option<CacheEntry>, CacheError>;

    fn write_entry(&self, entry: &CacheEntry) -> Result<(), CacheError>;

    /// Timestamp of the stored entry without decoding its payload
    fn fetched_at(&self, service: &str) -> Result<Option<DateTime<Utc>>, CacheError> {
        Ok(self.read_entry(service)?.map(|entry| entry.fetched_at))
    }

    /// Valid entry for `service`, or `None` on absence, corruption or staleness.
    ///
    /// A payload holding any price or rate outside the plausibility bounds
    /// counts as corrupt.
    fn load_entry(&self, service: &str, ttl: Duration) -> Option<CacheEntry> {
        match self.read_entry(service) {
            Ok(Some(entry)) if entry.is_valid_at(Utc::now(), ttl) => {
                match count_implausible(&entry.payload) {
                    0 => Some(entry),
                    implausible => {
                        warn!(
                            service = service,
                            implausible = implausible,
                            "Ignoring cache entry with implausible prices"
                        );
                        None
                    }
                }
            }
            Ok(Some(entry)) => {
                debug!(service = service, fetched_at = %entry.fetched_at, "Cache entry is stale");
                None
            }
            Ok(None) => {
                debug!(service = service, "No cache entry");
                None
            }
            Err(e) => {
                warn!(service = service, error = %e, "Ignoring unreadable cache entry");
                None
            }
        }
    }

    fn load(&self, service: &str, ttl: Duration) -> Option<PricingFragment> {
        self.load_entry(service, ttl).map(|entry| entry.payload)
    }

    /// Best-effort write; failures are logged and counted, never returned
    fn save(&self, service: &str, fragment: &PricingFragment) {
        let entry = CacheEntry::new(service, fragment.clone(), Utc::now());
        match self.write_entry(&entry) {
            Ok(()) => debug!(service = service, entries = fragment.len(), "Cached pricing fragment"),
            Err(e) => {
                warn!(service = service, error = %e, "Failed to persist pricing cache, continuing");
                EstimationMetrics::record_cache_write_error(service);
            }
        }
    }

    fn is_valid(&self, service: &str, ttl: Duration) -> bool {
        matches!(self.status(service, ttl), CacheStatus::Valid { .. })
    }

    fn status(&self, service: &str, ttl: Duration) -> CacheStatus {
        match self.fetched_at(service) {
            Ok(Some(fetched_at)) if is_fresh(fetched_at, Utc::now(), ttl) => {
                CacheStatus::Valid { fetched_at }
            }
            Ok(Some(fetched_at)) => CacheStatus::Stale { fetched_at },
            Ok(None) => CacheStatus::Missing,
            Err(e) => {
                debug!(service = service, error = %e, "Cache entry unreadable");
                CacheStatus::Missing
            }
        }
    }
}

/// One `<service>_pricing.json` file per source.
///
/// The file body is the serialized fragment and its mtime is the fetch time,
/// so `write_entry` always stamps the current time regardless of
/// `entry.fetched_at`.
#[derive(Debug, Clone)]
pub struct FileCacheStore {
    dir: PathBuf,
}

impl FileCacheStore {
    /// The directory is created on first write
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, service: &str) -> PathBuf {
        self.dir.join(format!("{service}_pricing.json"))
    }

    fn io_error(service: &str, source: io::Error) -> CacheError {
        CacheError::Io {
            service: service.to_string(),
            source,
        }
    }
}

impl PricingCacheStore for FileCacheStore {
    fn read_entry(&self, service: &str) -> Result<Option<CacheEntry>, CacheError> {
        let path = self.path_for(service);

        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Self::io_error(service, e)),
        };

        let payload: PricingFragment =
            serde_json::from_str(&raw).map_err(|e| CacheError::Corrupt {
                service: service.to_string(),
                details: e.to_string(),
            })?;

        let fetched_at = self
            .fetched_at(service)?
            .ok_or_else(|| Self::io_error(service, io::Error::from(io::ErrorKind::NotFound)))?;

        Ok(Some(CacheEntry {
            service_name: service.to_string(),
            payload,
            fetched_at,
        }))
    }

    fn write_entry(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        let service = entry.service_name.as_str();

        fs::create_dir_all(&self.dir).map_err(|e| Self::io_error(service, e))?;

        let body = serde_json::to_vec_pretty(&entry.payload).map_err(|e| CacheError::Corrupt {
            service: service.to_string(),
            details: e.to_string(),
        })?;

        // Write-then-rename so readers never observe a half-written file
        let path = self.path_for(service);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, body).map_err(|e| Self::io_error(service, e))?;
        fs::rename(&tmp, &path).map_err(|e| Self::io_error(service, e))?;

        Ok(())
    }

    fn fetched_at(&self, service: &str) -> Result<Option<DateTime<Utc>>, CacheError> {
        match fs::metadata(self.path_for(service)) {
            Ok(meta) => {
                let modified = meta.modified().map_err(|e| Self::io_error(service, e))?;
                Ok(Some(DateTime::<Utc>::from(modified)))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::io_error(service, e)),
        }
    }
}

/// Process-local store for tests and embedding
#[derive(Debug, Default)]
pub struct InMemoryCacheStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plant an entry with an explicit fetch time
    pub fn insert_at(&self, service: &str, payload: PricingFragment, fetched_at: DateTime<Utc>) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(service.to_string(), CacheEntry::new(service, payload, fetched_at));
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PricingCacheStore for InMemoryCacheStore {
    fn read_entry(&self, service: &str) -> Result<Option<CacheEntry>, CacheError> {
        Ok(self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(service)
            .cloned())
    }

    fn write_entry(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(entry.service_name.clone(), entry.clone());
        Ok(())
    }
}
