//! End-to-end tests across tracker, store, backend and queries

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use farm_persistence::{BlobStore, InMemoryBlobStore};
use tempfile::TempDir;

use crate::config::{AnalyticsConfig, IngestionConfig};
use crate::export::{AnalyticsExport, ExportFormat};
use crate::ingestion::EventTracker;
use crate::metric::{Metadata, MetricType};
use crate::range::DateRange;
use crate::storage::MetricStore;
use crate::{init_analytics, AnalyticsEngine};

fn local_config(dir: &TempDir) -> AnalyticsConfig {
    let mut config = AnalyticsConfig::default();
    config.storage.base_path = dir.path().to_path_buf();
    config.seed.enabled = false;
    config.ingestion.batch_size = 4;
    config
}

/// Backend that takes a while to write and records how many writes overlap
struct SlowBlobStore {
    inner: InMemoryBlobStore,
    delay: Duration,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl SlowBlobStore {
    fn new(delay: Duration) -> Self {
        Self {
            inner: InMemoryBlobStore::new(),
            delay,
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl BlobStore for SlowBlobStore {
    async fn read(&self, key: &str) -> farm_persistence::Result<Option<String>> {
        self.inner.read(key).await
    }

    async fn write(&self, key: &str, value: &str) -> farm_persistence::Result<()> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;
        let result = self.inner.write(key, value).await;

        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn name(&self) -> &'static str {
        "slow"
    }
}

async fn wait_until<F: Fn() -> bool>(condition: F) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[cfg(test)]
#[allow(clippy::module_inception)]
mod integration_tests {
    use super::*;

    #[tokio::test]
    async fn test_tracked_events_survive_restart() {
        let dir = TempDir::new().unwrap();

        let analytics = init_analytics(local_config(&dir)).await.unwrap();
        let tracker = analytics.tracker();
        tracker.track_user_registration("u-1", "farmer").unwrap();
        tracker.track_page_view("/", Some("u-1")).unwrap();
        tracker.track_page_view("/cart", Some("u-1")).unwrap();
        tracker.track_order_created("o-1", 150.0).unwrap();
        tracker.track_payment_approval("p-1", 150.0).unwrap();
        analytics.shutdown().await.unwrap();

        let reopened = init_analytics(local_config(&dir)).await.unwrap();
        assert_eq!(reopened.store().count().await, 7);

        let range = DateRange::last_days(1, Utc::now() + chrono::Duration::minutes(1)).unwrap();
        let summary = reopened.query_engine().get_dashboard_summary(&range).await.unwrap();
        assert_eq!(summary.new_registrations, 1.0);
        assert_eq!(summary.active_users, 1.0);
        assert_eq!(summary.total_orders, 1.0);
        assert_eq!(summary.total_revenue, 150.0);
        assert_eq!(summary.payment_approvals, 1.0);
        assert_eq!(summary.average_order_value, 150.0);
        assert_eq!(summary.conversion_rate, 100.0);

        assert!(dir.path().join("farm_analytics_metrics.json").exists());
    }

    #[tokio::test]
    async fn test_sample_data_seeded_once() {
        let dir = TempDir::new().unwrap();
        let mut config = local_config(&dir);
        config.seed.enabled = true;
        config.seed.days = 7;

        let first = init_analytics(config.clone()).await.unwrap();
        let seeded = first.store().get_all().await;
        assert!(!seeded.is_empty());
        assert!(seeded.iter().all(|r| r.metadata.get("sample").is_some()));

        let second = init_analytics(config).await.unwrap();
        let reread = second.store().get_all().await;
        assert_eq!(
            reread.iter().map(|r| r.id).collect::<Vec<_>>(),
            seeded.iter().map(|r| r.id).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn test_cache_entry_expires_after_ttl() {
        let backend = InMemoryBlobStore::new();
        let mut config = AnalyticsConfig::default();
        config.seed.enabled = false;
        config.cache.ttl_secs = 1;

        let writer = MetricStore::new(Arc::new(backend.clone()), &config);
        writer
            .add(crate::metric::MetricRecord::new(MetricType::Revenue, 10.0, Utc::now()).unwrap())
            .await
            .unwrap();

        let store = MetricStore::new(Arc::new(backend.clone()), &config);
        let reads_before = backend.read_count();

        store.get_by_type(MetricType::Revenue, None).await.unwrap();
        store.get_by_type(MetricType::Revenue, None).await.unwrap();
        assert_eq!(backend.read_count(), reads_before + 1);

        tokio::time::sleep(Duration::from_millis(1_100)).await;
        let records = store.get_by_type(MetricType::Revenue, None).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(backend.read_count(), reads_before + 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_flushes_never_interleave() {
        let slow = Arc::new(SlowBlobStore::new(Duration::from_millis(15)));
        let mut config = AnalyticsConfig::default();
        config.seed.enabled = false;
        config.ingestion =
            IngestionConfig { batch_size: 3, flush_interval_ms: 10, buffer_capacity: 1_000 };

        let engine = AnalyticsEngine::with_backend(config, slow.clone() as Arc<dyn BlobStore>).unwrap();
        for i in 0..30 {
            engine.tracker().track_event(MetricType::OrdersCount, f64::from(i), Metadata::new()).unwrap();
            if i % 4 == 0 {
                tokio::task::yield_now().await;
            }
        }
        engine.shutdown().await.unwrap();

        let values: Vec<f64> = engine.store().get_all().await.iter().map(|r| r.value).collect();
        let expected: Vec<f64> = (0..30).map(f64::from).collect();
        assert_eq!(values, expected);
        assert_eq!(slow.max_active.load(Ordering::SeqCst), 1);
        assert_eq!(engine.tracker().stats().persisted, 30);
    }

    #[tokio::test]
    async fn test_timer_retries_after_backend_recovers() {
        let backend = InMemoryBlobStore::new();
        let mut config = AnalyticsConfig::default();
        config.seed.enabled = false;
        let store = MetricStore::new(Arc::new(backend.clone()), &config);
        let tracker = EventTracker::new(
            store.clone(),
            IngestionConfig { batch_size: 10, flush_interval_ms: 30, buffer_capacity: 100 },
        );

        backend.set_fail_writes(true);
        for _ in 0..3 {
            tracker.track(MetricType::PaymentSubmissions).unwrap();
        }
        wait_until(|| tracker.stats().failed_flushes >= 1).await;
        assert_eq!(tracker.pending(), 3);

        backend.set_fail_writes(false);
        wait_until(|| tracker.pending() == 0 && tracker.stats().flushes == 1).await;
        assert_eq!(store.count().await, 3);
    }

    #[tokio::test]
    async fn test_export_files_round_trip() {
        let dir = TempDir::new().unwrap();
        let analytics = init_analytics(local_config(&dir)).await.unwrap();
        for i in 0..5 {
            analytics.tracker().track_material_purchase(&format!("mat-{i}"), 2.0, 40.0).unwrap();
        }
        analytics.shutdown().await.unwrap();

        let queries = analytics.query_engine();
        let csv = queries.export_analytics(ExportFormat::Csv, None).await.unwrap().render().unwrap();
        assert_eq!(csv.lines().count(), 11);

        let json = queries.export_analytics(ExportFormat::Json, None).await.unwrap().render().unwrap();
        let other = TempDir::new().unwrap();
        let target = init_analytics(local_config(&other)).await.unwrap();
        let imported = target
            .query_engine()
            .import_analytics(AnalyticsExport::from_json(&json).unwrap())
            .await
            .unwrap();
        assert_eq!(imported, 10);

        let mut original = analytics.store().get_all().await;
        let mut restored = target.store().get_all().await;
        original.sort_by_key(|r| r.id);
        restored.sort_by_key(|r| r.id);
        assert_eq!(original, restored);
    }
}
