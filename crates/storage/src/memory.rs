//! In-process metric store

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use teamboard_protocol::{Metric, MetricFields, MetricId, MetricQuery};
use tracing::trace;

use crate::{MetricStore, StoreError, next_timestamp, store_now};

/// Metric store held in process memory
///
/// Every operation takes the lock once, so each one is atomic on its own.
/// The store can be switched offline to simulate a lost backend.
pub struct MemoryStore {
    records: RwLock<HashMap<MetricId, Metric>>,
    online: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            online: AtomicBool::new(true),
        }
    }

    /// Toggle simulated connectivity
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store is offline".to_string()))
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricStore for MemoryStore {
    async fn insert(&self, fields: MetricFields) -> Result<Metric, StoreError> {
        self.check_online()?;

        let metric = fields.into_metric(MetricId::new(), store_now());
        self.records.write().insert(metric.id, metric.clone());
        trace!("Inserted metric {}", metric.id);
        Ok(metric)
    }

    async fn find(&self, query: &MetricQuery) -> Result<Vec<Metric>, StoreError> {
        self.check_online()?;

        let records = self.records.read();
        Ok(query.apply(records.values()))
    }

    async fn get(&self, id: MetricId) -> Result<Option<Metric>, StoreError> {
        self.check_online()?;

        Ok(self.records.read().get(&id).cloned())
    }

    async fn replace(
        &self,
        id: MetricId,
        fields: MetricFields,
    ) -> Result<Option<Metric>, StoreError> {
        self.check_online()?;

        let mut records = self.records.write();
        let Some(existing) = records.get_mut(&id) else {
            return Ok(None);
        };

        let timestamp = next_timestamp(existing.timestamp);
        *existing = fields.into_metric(id, timestamp);
        Ok(Some(existing.clone()))
    }

    async fn delete(&self, id: MetricId) -> Result<bool, StoreError> {
        self.check_online()?;

        Ok(self.records.write().remove(&id).is_some())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check_online()
    }
}
