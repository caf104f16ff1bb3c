//! # Metric Store
//!
//! Durable persistence of the full metric collection plus a short-lived read cache.
//!
//! The whole collection is serialized under one key of a [`BlobStore`]. Mutation is
//! copy-then-replace: writers read the collection, append, and write it back whole.
//! Readers never see a partial write and never block on writers.
//!
//! Writers always read the backend, never the cache. Every successful write bumps a
//! generation counter, and a reader only caches what it read if no write completed
//! since it started.

use crate::cache::TtlCache;
use crate::config::AnalyticsConfig;
use crate::error::{AnalyticsError, Result};
use crate::metric::{MetricRecord, MetricType};
use crate::range::DateRange;
use crate::seed;
use chrono::{DateTime, Utc};
use farm_persistence::BlobStore;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shape of a cached query
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum QueryKey {
    All,
    ByType(MetricType, Option<DateRange>),
    ByDateRange(DateRange, Option<Vec<MetricType>>),
    ByCategory(String, Option<DateRange>),
}

/// Document written under the collection key
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredCollection {
    records: Vec<MetricRecord>,
    last_updated: DateTime<Utc>,
}

/// Collection read from the backend, and whether it may be cached
struct Snapshot {
    records: Vec<MetricRecord>,
    cacheable: bool,
    /// Write generation observed before the read
    generation: u64,
}

struct StoreInner {
    backend: Arc<dyn BlobStore>,
    key: String,
    cache: TtlCache<QueryKey, Vec<MetricRecord>>,
    write_lock: Mutex<()>,
    /// Bumped on every successful write; guards cache inserts against stale reads
    generation: parking_lot::Mutex<u64>,
    seed_enabled: bool,
    seed_days: u32,
    max_range_days: i64,
}

/// Sole owner of the persisted metric collection
///
/// Cheap to clone; clones share the backend, the cache and the writer lock.
#[derive(Clone)]
pub struct MetricStore {
    inner: Arc<StoreInner>,
}

impl fmt::Debug for MetricStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricStore")
            .field("backend", &self.inner.backend.name())
            .field("key", &self.inner.key)
            .field("cached_queries", &self.inner.cache.len())
            .finish()
    }
}

impl MetricStore {
    /// Create a store over `backend`
    pub fn new(backend: Arc<dyn BlobStore>, config: &AnalyticsConfig) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                backend,
                key: config.storage.collection_key.clone(),
                cache: TtlCache::with_max_entries(config.cache.ttl(), config.cache.max_entries),
                write_lock: Mutex::new(()),
                generation: parking_lot::Mutex::new(0),
                seed_enabled: config.seed.enabled,
                seed_days: config.seed.days,
                max_range_days: config.query.max_range_days,
            }),
        }
    }

    /// Widest date range accepted by queries (days)
    pub fn max_range_days(&self) -> i64 {
        self.inner.max_range_days
    }

    fn generation(&self) -> u64 {
        *self.inner.generation.lock()
    }

    /// Cache `records` under `key` unless a write completed after `generation` was read
    fn cache_if_current(&self, key: QueryKey, records: Vec<MetricRecord>, generation: u64) {
        let current = self.inner.generation.lock();
        if *current != generation {
            tracing::debug!("Not caching {:?}: collection changed during the read", key);
            return;
        }

        self.inner.cache.insert(key, records);
    }

    /// Read and decode the collection; `None` when nothing was ever written
    async fn load(&self) -> Result<Option<Vec<MetricRecord>>> {
        let Some(raw) = self.inner.backend.read(&self.inner.key).await? else {
            return Ok(None);
        };

        let stored: StoredCollection = serde_json::from_str(&raw)?;
        Ok(Some(stored.records))
    }

    /// Generate and persist sample data; caller holds the writer lock
    async fn seed_locked(&self) -> Vec<MetricRecord> {
        let records = seed::sample_records(self.inner.seed_days, Utc::now());
        tracing::info!(
            "Seeding empty metric store with {} sample records ({} days)",
            records.len(),
            self.inner.seed_days
        );

        if !self.save_all(&records).await {
            tracing::warn!("Sample data could not be persisted; serving it from memory only");
        }

        records
    }

    async fn snapshot(&self) -> Snapshot {
        let generation = self.generation();
        if let Some(records) = self.inner.cache.get(&QueryKey::All) {
            tracing::debug!("Cache hit for full collection");
            return Snapshot { records, cacheable: true, generation };
        }

        match self.load().await {
            Ok(Some(records)) => {
                self.cache_if_current(QueryKey::All, records.clone(), generation);
                Snapshot { records, cacheable: true, generation }
            }
            Ok(None) if self.inner.seed_enabled => {
                let _guard = self.inner.write_lock.lock().await;
                // Writers are excluded from here on
                let generation = self.generation();
                // Another caller may have seeded while we waited for the lock
                match self.load().await {
                    Ok(Some(records)) => {
                        self.cache_if_current(QueryKey::All, records.clone(), generation);
                        Snapshot { records, cacheable: true, generation }
                    }
                    Ok(None) => {
                        let records = self.seed_locked().await;
                        Snapshot { records, cacheable: true, generation: self.generation() }
                    }
                    Err(e) => {
                        tracing::warn!("Failed to read metric collection: {}", e);
                        Snapshot { records: Vec::new(), cacheable: false, generation }
                    }
                }
            }
            Ok(None) => {
                self.cache_if_current(QueryKey::All, Vec::new(), generation);
                Snapshot { records: Vec::new(), cacheable: true, generation }
            }
            Err(e) => {
                tracing::warn!("Failed to read metric collection, serving empty result: {}", e);
                Snapshot { records: Vec::new(), cacheable: false, generation }
            }
        }
    }

    /// Full collection in insertion order
    ///
    /// Never fails: a backend read failure yields an empty list. The first read of a
    /// store that has never been written seeds it with sample data when enabled.
    pub async fn get_all(&self) -> Vec<MetricRecord> {
        self.snapshot().await.records
    }

    /// Replace the persisted collection with `records`
    ///
    /// Returns `false` when the backend write fails; the previous collection and the
    /// cache are left untouched in that case.
    pub async fn save_all(&self, records: &[MetricRecord]) -> bool {
        let document = StoredCollection { records: records.to_vec(), last_updated: Utc::now() };

        let json = match serde_json::to_string(&document) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!("Failed to serialize metric collection: {}", e);
                return false;
            }
        };

        match self.inner.backend.write(&self.inner.key, &json).await {
            Ok(()) => {
                let mut generation = self.inner.generation.lock();
                *generation += 1;
                self.inner.cache.clear();
                self.inner.cache.insert(QueryKey::All, document.records);
                drop(generation);
                tracing::debug!("Saved {} metric records", records.len());
                true
            }
            Err(e) => {
                tracing::error!("Failed to save {} metric records: {}", records.len(), e);
                false
            }
        }
    }

    /// Collection to append to; caller holds the writer lock
    ///
    /// Always reads the backend. Unlike [`get_all`](Self::get_all) a read failure is an
    /// error here, so a writer never replaces stored data with a degraded empty read.
    async fn records_for_write(&self) -> Result<Vec<MetricRecord>> {
        match self.load().await? {
            Some(records) => Ok(records),
            None if self.inner.seed_enabled => Ok(self.seed_locked().await),
            None => Ok(Vec::new()),
        }
    }

    /// Validate and append one record
    ///
    /// Adding a record whose id is already stored is a no-op that returns the record.
    pub async fn add(&self, record: MetricRecord) -> Result<MetricRecord> {
        record.validate()?;

        let _guard = self.inner.write_lock.lock().await;
        let mut records = self.records_for_write().await?;
        if records.iter().any(|r| r.id == record.id) {
            tracing::debug!("Record {} already stored, skipping", record.id);
            return Ok(record);
        }
        records.push(record.clone());

        if !self.save_all(&records).await {
            return Err(AnalyticsError::storage(format!(
                "failed to persist {} record {}",
                record.metric_type, record.id
            )));
        }

        Ok(record)
    }

    /// Append previously exported records, skipping ids already stored
    ///
    /// Every record is validated before anything is written. Returns how many were added.
    pub async fn import(&self, records: Vec<MetricRecord>) -> Result<usize> {
        for record in &records {
            record.validate()?;
        }

        let _guard = self.inner.write_lock.lock().await;
        let mut existing = self.records_for_write().await?;
        let mut seen: HashSet<_> = existing.iter().map(|r| r.id).collect();

        let before = existing.len();
        existing.extend(records.into_iter().filter(|r| seen.insert(r.id)));
        let imported = existing.len() - before;

        if imported == 0 {
            return Ok(0);
        }

        if !self.save_all(&existing).await {
            return Err(AnalyticsError::storage(format!("failed to persist {imported} imported records")));
        }

        tracing::info!("Imported {} metric records", imported);
        Ok(imported)
    }

    /// Run a filtered, time-ascending query through the cache
    async fn query<F>(&self, key: QueryKey, filter: F) -> Vec<MetricRecord>
    where
        F: Fn(&MetricRecord) -> bool,
    {
        if let Some(records) = self.inner.cache.get(&key) {
            tracing::debug!("Cache hit for {:?}", key);
            return records;
        }

        let snapshot = self.snapshot().await;
        let mut records: Vec<_> = snapshot.records.into_iter().filter(|r| filter(r)).collect();
        records.sort_by_key(|r| r.timestamp);

        if snapshot.cacheable {
            self.cache_if_current(key, records.clone(), snapshot.generation);
        }

        records
    }

    fn check_range(&self, range: Option<&DateRange>) -> Result<()> {
        match range {
            Some(range) => range.validate(self.inner.max_range_days),
            None => Ok(()),
        }
    }

    /// Records of one type, optionally within a date range
    pub async fn get_by_type(
        &self,
        metric_type: MetricType,
        range: Option<&DateRange>,
    ) -> Result<Vec<MetricRecord>> {
        self.check_range(range)?;

        let key = QueryKey::ByType(metric_type, range.copied());
        Ok(self
            .query(key, |r| r.metric_type == metric_type && range.map_or(true, |rg| r.is_within(rg)))
            .await)
    }

    /// Records within `[start, end]`, optionally restricted to some types
    pub async fn get_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        types: Option<&[MetricType]>,
    ) -> Result<Vec<MetricRecord>> {
        let range = DateRange { start, end };
        range.validate(self.inner.max_range_days)?;

        let key = QueryKey::ByDateRange(range, types.map(<[MetricType]>::to_vec));
        Ok(self
            .query(key, |r| r.is_within(&range) && types.map_or(true, |t| t.contains(&r.metric_type)))
            .await)
    }

    /// Records of one category, optionally within a date range
    pub async fn get_by_category(
        &self,
        category: &str,
        range: Option<&DateRange>,
    ) -> Result<Vec<MetricRecord>> {
        self.check_range(range)?;

        let key = QueryKey::ByCategory(category.to_string(), range.copied());
        Ok(self
            .query(key, |r| r.category == category && range.map_or(true, |rg| r.is_within(rg)))
            .await)
    }

    /// Number of stored records
    pub async fn count(&self) -> usize {
        self.snapshot().await.records.len()
    }

    /// Number of query results currently cached
    pub fn cached_queries(&self) -> usize {
        self.inner.cache.len()
    }

    /// Drop every cached query
    pub fn invalidate_cache(&self) {
        self.inner.cache.clear();
    }
}
