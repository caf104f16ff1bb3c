//! # Event Ingestion
//!
//! Fire-and-forget event tracking for the rest of the application.
//!
//! Tracked events land in a bounded in-memory buffer and are persisted in batches,
//! either as soon as a full batch is buffered or after the flush interval. A failed
//! flush puts its whole batch back at the head of the buffer. Records of that batch
//! already written are skipped on retry, since the store ignores ids it already has.
//! Order is FIFO except that retries go before newer events.

use crate::buffer::EventBuffer;
use crate::config::IngestionConfig;
use crate::error::{AnalyticsError, Result};
use crate::metric::{Metadata, MetricRecord, MetricType};
use crate::storage::MetricStore;
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Observable state of the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrackerState {
    Idle,
    Buffering,
    Flushing,
}

/// Counters since the tracker was created
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestionStats {
    pub tracked: u64,
    pub persisted: u64,
    pub flushes: u64,
    pub failed_flushes: u64,
    pub requeued: u64,
}

#[derive(Debug, Default)]
struct IngestionCounters {
    tracked: AtomicU64,
    persisted: AtomicU64,
    flushes: AtomicU64,
    failed_flushes: AtomicU64,
    requeued: AtomicU64,
}

struct TrackerInner {
    store: MetricStore,
    config: IngestionConfig,
    buffer: parking_lot::Mutex<EventBuffer<MetricRecord>>,
    /// Held for the whole drain → persist → requeue sequence
    flush_lock: tokio::sync::Mutex<()>,
    flushing: AtomicBool,
    timer: parking_lot::Mutex<Option<JoinHandle<()>>>,
    counters: IngestionCounters,
}

/// Batch drained for a flush; goes back to the buffer head unless marked persisted
struct InFlightBatch<'a> {
    inner: &'a TrackerInner,
    batch: Option<Vec<MetricRecord>>,
}

impl InFlightBatch<'_> {
    fn records(&self) -> &[MetricRecord] {
        self.batch.as_deref().unwrap_or(&[])
    }

    fn persisted(mut self) -> usize {
        self.inner.flushing.store(false, Ordering::SeqCst);
        self.batch.take().map_or(0, |b| b.len())
    }
}

impl Drop for InFlightBatch<'_> {
    fn drop(&mut self) {
        if let Some(batch) = self.batch.take() {
            let n = batch.len() as u64;
            self.inner.buffer.lock().requeue_front(batch);
            self.inner.counters.requeued.fetch_add(n, Ordering::Relaxed);
            self.inner.flushing.store(false, Ordering::SeqCst);
        }
    }
}

/// Buffers tracked events and flushes them into a [`MetricStore`]
///
/// Cheap to clone; clones share one buffer. Tracking spawns background tasks and so
/// must be called from within a tokio runtime.
#[derive(Clone)]
pub struct EventTracker {
    inner: Arc<TrackerInner>,
}

impl fmt::Debug for EventTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventTracker")
            .field("state", &self.state())
            .field("pending", &self.pending())
            .field("config", &self.inner.config)
            .finish()
    }
}

fn metadata(value: serde_json::Value) -> Metadata {
    match value {
        serde_json::Value::Object(map) => map,
        _ => Metadata::new(),
    }
}

fn require_finite(what: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(AnalyticsError::validation(format!("{what} must be a finite number, got {value}")))
    }
}

impl EventTracker {
    pub fn new(store: MetricStore, config: IngestionConfig) -> Self {
        let buffer = EventBuffer::new(config.buffer_capacity);
        Self {
            inner: Arc::new(TrackerInner {
                store,
                config,
                buffer: parking_lot::Mutex::new(buffer),
                flush_lock: tokio::sync::Mutex::new(()),
                flushing: AtomicBool::new(false),
                timer: parking_lot::Mutex::new(None),
                counters: IngestionCounters::default(),
            }),
        }
    }

    /// Record an event now
    ///
    /// Never waits on persistence. Invalid values are rejected here rather than
    /// failing later in a background flush.
    pub fn track_event(&self, metric_type: MetricType, value: f64, metadata: Metadata) -> Result<()> {
        let record = MetricRecord::new(metric_type, value, Utc::now())?.with_metadata(metadata);

        let len = {
            let mut buffer = self.inner.buffer.lock();
            let capacity = buffer.capacity();
            buffer.push(record).map_err(|_| AnalyticsError::BufferFull { capacity })?
        };
        self.inner.counters.tracked.fetch_add(1, Ordering::Relaxed);

        if len >= self.inner.config.batch_size {
            self.spawn_flush();
        } else {
            self.schedule_flush();
        }

        Ok(())
    }

    /// Record one occurrence of `metric_type`
    pub fn track(&self, metric_type: MetricType) -> Result<()> {
        self.track_event(metric_type, 1.0, Metadata::new())
    }

    pub fn track_page_view(&self, page: &str, user_id: Option<&str>) -> Result<()> {
        self.track_event(
            MetricType::ActiveUsers,
            1.0,
            metadata(json!({ "page": page, "userId": user_id })),
        )
    }

    pub fn track_user_registration(&self, user_id: &str, role: &str) -> Result<()> {
        self.track_event(
            MetricType::Registrations,
            1.0,
            metadata(json!({ "userId": user_id, "role": role })),
        )
    }

    /// Records the order count and the order value
    pub fn track_order_created(&self, order_id: &str, amount: f64) -> Result<()> {
        require_finite("order amount", amount)?;
        let context = metadata(json!({ "orderId": order_id, "amount": amount }));
        self.track_event(MetricType::OrdersCount, 1.0, context.clone())?;
        self.track_event(MetricType::OrdersValue, amount, context)
    }

    /// Records the quantity sold and the revenue it brought
    pub fn track_material_purchase(&self, material_id: &str, quantity: f64, amount: f64) -> Result<()> {
        require_finite("purchase quantity", quantity)?;
        require_finite("purchase amount", amount)?;
        let context = metadata(json!({ "materialId": material_id, "quantity": quantity, "amount": amount }));
        self.track_event(MetricType::MaterialsSold, quantity, context.clone())?;
        self.track_event(MetricType::MaterialsRevenue, amount, context)
    }

    pub fn track_upload_submission(&self, upload_id: &str) -> Result<()> {
        self.track_event(MetricType::UploadsCount, 1.0, metadata(json!({ "uploadId": upload_id })))
    }

    pub fn track_upload_approval(&self, upload_id: &str) -> Result<()> {
        self.track_event(MetricType::UploadsApproved, 1.0, metadata(json!({ "uploadId": upload_id })))
    }

    pub fn track_payment_submission(&self, payment_id: &str, amount: f64) -> Result<()> {
        require_finite("payment amount", amount)?;
        self.track_event(
            MetricType::PaymentSubmissions,
            1.0,
            metadata(json!({ "paymentId": payment_id, "amount": amount })),
        )
    }

    /// Records the approval and books the amount as revenue
    pub fn track_payment_approval(&self, payment_id: &str, amount: f64) -> Result<()> {
        require_finite("payment amount", amount)?;
        let context = metadata(json!({ "paymentId": payment_id, "amount": amount }));
        self.track_event(MetricType::PaymentApprovals, 1.0, context.clone())?;
        self.track_event(MetricType::Revenue, amount, context)
    }

    fn spawn_flush(&self) {
        let tracker = self.clone();
        tokio::spawn(async move {
            if let Err(e) = tracker.flush().await {
                tracing::debug!("Background flush did not complete: {}", e);
            }
        });
    }

    /// Arm the flush timer unless one is already pending
    fn schedule_flush(&self) {
        let mut timer = self.inner.timer.lock();
        if timer.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let tracker = self.clone();
        let delay = self.inner.config.flush_interval();
        *timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // No await past this point, so aborting the timer never cuts into a flush
            tracker.inner.timer.lock().take();
            tracker.spawn_flush();
        }));
    }

    fn cancel_timer(&self) {
        if let Some(handle) = self.inner.timer.lock().take() {
            handle.abort();
        }
    }

    async fn persist(&self, records: &[MetricRecord]) -> Result<()> {
        for record in records {
            self.inner.store.add(record.clone()).await?;
        }
        Ok(())
    }

    /// Persist up to one batch from the head of the buffer
    ///
    /// Flushes never interleave. On failure the whole batch returns to the head of the
    /// buffer and the error is returned. Returns the number of events persisted.
    pub async fn flush(&self) -> Result<usize> {
        let _guard = self.inner.flush_lock.lock().await;

        self.inner.flushing.store(true, Ordering::SeqCst);
        let batch = self.inner.buffer.lock().drain_front(self.inner.config.batch_size);
        if batch.is_empty() {
            self.inner.flushing.store(false, Ordering::SeqCst);
            return Ok(0);
        }

        let in_flight = InFlightBatch { inner: &self.inner, batch: Some(batch) };
        let size = in_flight.records().len();

        let result = self.persist(in_flight.records()).await;
        if let Err(e) = result {
            drop(in_flight);
            self.inner.counters.failed_flushes.fetch_add(1, Ordering::Relaxed);
            tracing::warn!("Flush of {} events failed, requeued for retry: {}", size, e);
            self.schedule_flush();
            return Err(e);
        }

        let persisted = in_flight.persisted();
        self.inner.counters.persisted.fetch_add(persisted as u64, Ordering::Relaxed);
        self.inner.counters.flushes.fetch_add(1, Ordering::Relaxed);
        self.cancel_timer();

        let remaining = self.pending();
        if remaining >= self.inner.config.batch_size {
            self.spawn_flush();
        } else if remaining > 0 {
            self.schedule_flush();
        }

        tracing::debug!("Flushed {} events ({} still buffered)", persisted, remaining);
        Ok(persisted)
    }

    /// Flush everything still buffered and stop the timer
    ///
    /// Fails with a storage error naming how many events are left when a flush fails.
    pub async fn shutdown(&self) -> Result<()> {
        self.cancel_timer();

        loop {
            if let Err(e) = self.flush().await {
                self.cancel_timer();
                let remaining = self.pending();
                tracing::error!("Shutdown flush failed with {} events still buffered: {}", remaining, e);
                return Err(AnalyticsError::storage(format!(
                    "{remaining} events left buffered after shutdown flush: {e}"
                )));
            }

            // Holding the flush lock means no background flush is mid-batch
            let _idle = self.inner.flush_lock.lock().await;
            if self.pending() == 0 {
                break;
            }
        }

        self.cancel_timer();
        tracing::info!(
            "Event tracker shut down ({} events persisted in total)",
            self.inner.counters.persisted.load(Ordering::Relaxed)
        );
        Ok(())
    }

    /// Number of buffered events
    pub fn pending(&self) -> usize {
        self.inner.buffer.lock().len()
    }

    pub fn state(&self) -> TrackerState {
        if self.inner.flushing.load(Ordering::SeqCst) {
            TrackerState::Flushing
        } else if self.pending() > 0 {
            TrackerState::Buffering
        } else {
            TrackerState::Idle
        }
    }

    pub fn stats(&self) -> IngestionStats {
        let c = &self.inner.counters;
        IngestionStats {
            tracked: c.tracked.load(Ordering::Relaxed),
            persisted: c.persisted.load(Ordering::Relaxed),
            flushes: c.flushes.load(Ordering::Relaxed),
            failed_flushes: c.failed_flushes.load(Ordering::Relaxed),
            requeued: c.requeued.load(Ordering::Relaxed),
        }
    }

    pub fn config(&self) -> &IngestionConfig {
        &self.inner.config
    }
}
