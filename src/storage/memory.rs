//! In-memory storage sink.
//!
//! Records are keyed by order id in a `DashMap`. Concurrent writes are
//! bounded; a write that finds no free slot is rejected as throughput
//! exceeded instead of queueing. An optional per-write latency simulates a
//! slow backend.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::Semaphore;

use crate::config::StorageConfig;
use crate::storage::{DeliveryRecord, StorageSink, StoreError};

#[derive(Debug)]
pub struct InMemoryStore {
    records: DashMap<String, DeliveryRecord>,
    writers: Semaphore,
    latency: Duration,
    closed: AtomicBool,
}

impl InMemoryStore {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            records: DashMap::new(),
            writers: Semaphore::new(config.max_concurrent_writes.max(1)),
            latency: Duration::from_millis(config.simulated_latency_ms),
            closed: AtomicBool::new(false),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(&StorageConfig::default())
    }
}

#[async_trait]
impl StorageSink for InMemoryStore {
    async fn put(&self, record: DeliveryRecord) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::TransientFailure("store is closed".to_string()));
        }

        let _slot = self.writers.try_acquire().map_err(|_| {
            StoreError::ThroughputExceeded("all write slots are busy".to_string())
        })?;

        if !self.latency.is_zero() {
            tracing::warn!(
                order_id = %record.order_id,
                delay_ms = self.latency.as_millis() as u64,
                "Simulating slow storage write"
            );
            tokio::time::sleep(self.latency).await;
        }

        match self.records.entry(record.order_id.clone()) {
            Entry::Occupied(_) => Err(StoreError::Fatal(format!(
                "order '{}' already exists",
                record.order_id
            ))),
            Entry::Vacant(slot) => {
                tracing::info!(
                    record_id = %record.id,
                    order_id = %record.order_id,
                    "Delivery stored"
                );
                slot.insert(record);
                Ok(())
            }
        }
    }

    async fn get(&self, order_id: &str) -> Option<DeliveryRecord> {
        self.records.get(order_id).map(|r| r.value().clone())
    }

    fn is_healthy(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.writers.close();
            tracing::info!(records = self.records.len(), "Storage closed");
        }
    }
}
