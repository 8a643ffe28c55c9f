//! Store contract for metric records

use async_trait::async_trait;
use chrono::{DateTime, Duration, SubsecRound, Utc};
use teamboard_protocol::{Metric, MetricFields, MetricId, MetricQuery};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Persistence operations behind the metrics API
///
/// Each method is a single store-level operation. A missing record is
/// reported through `Option`/`bool`, never as an error. Concurrent
/// replaces of the same id resolve to last write wins.
#[async_trait]
pub trait MetricStore: Send + Sync {
    /// Store a new record, assigning `id` and `timestamp`
    async fn insert(&self, fields: MetricFields) -> Result<Metric, StoreError>;

    /// Records matching `query`, newest first, at most `query.limit`
    async fn find(&self, query: &MetricQuery) -> Result<Vec<Metric>, StoreError>;

    async fn get(&self, id: MetricId) -> Result<Option<Metric>, StoreError>;

    /// Replace all mutable fields and refresh `timestamp`
    async fn replace(&self, id: MetricId, fields: MetricFields)
    -> Result<Option<Metric>, StoreError>;

    /// Returns `false` when no record had this id
    async fn delete(&self, id: MetricId) -> Result<bool, StoreError>;

    /// Round-trip to the backing store
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Current time at the precision every backend can hold (microseconds)
pub fn store_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Timestamp for a rewrite of a record last written at `previous`
///
/// Always strictly after `previous`, even when the clock has not moved
/// past it at microsecond precision.
pub fn next_timestamp(previous: DateTime<Utc>) -> DateTime<Utc> {
    store_now().max(previous + Duration::microseconds(1))
}
