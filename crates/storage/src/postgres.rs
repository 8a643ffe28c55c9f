use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Executor, Pool, Postgres, QueryBuilder, postgres::PgPoolOptions};
use std::time::Duration;
use teamboard_protocol::{Metric, MetricFields, MetricId, MetricQuery};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{MetricStore, StoreError, store_now};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS metrics (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL,
    team TEXT NOT NULL,
    role TEXT NOT NULL,
    timestamp TIMESTAMPTZ NOT NULL
);

CREATE INDEX IF NOT EXISTS metrics_timestamp_idx ON metrics (timestamp DESC, id DESC);
"#;

const COLUMNS: &str = "id, name, team, role, timestamp";

/// Row as stored in the `metrics` table
#[derive(Debug, Clone, sqlx::FromRow)]
struct MetricRow {
    id: Uuid,
    name: String,
    team: String,
    role: String,
    timestamp: DateTime<Utc>,
}

impl From<MetricRow> for Metric {
    fn from(row: MetricRow) -> Self {
        Metric {
            id: row.id.into(),
            name: row.name,
            team: row.team,
            role: row.role,
            timestamp: row.timestamp,
        }
    }
}

/// Postgres-backed metric store
#[derive(Clone)]
pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    pub async fn connect(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await?;

        info!("Connected to Postgres ({} max connections)", max_connections);
        Ok(Self { pool })
    }

    /// Build a store on an existing pool
    pub fn from_pool(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Create the `metrics` table and its index if missing
    pub async fn bootstrap(&self) -> Result<(), StoreError> {
        self.pool.execute(SCHEMA).await?;
        Ok(())
    }
}

/// Compile a typed query into parameterised SQL
///
/// Values only ever travel as bind parameters.
fn select_query(query: &MetricQuery) -> QueryBuilder<'_, Postgres> {
    let mut qb = QueryBuilder::new(format!("SELECT {COLUMNS} FROM metrics WHERE TRUE"));

    if let Some(name) = &query.name {
        qb.push(" AND name = ").push_bind(name);
    }
    if let Some(team) = &query.team {
        qb.push(" AND team = ").push_bind(team);
    }
    if let Some(role) = &query.role {
        qb.push(" AND role = ").push_bind(role);
    }
    if let Some(start) = query.start {
        qb.push(" AND timestamp >= ").push_bind(start);
    }
    if let Some(end) = query.end {
        qb.push(" AND timestamp <= ").push_bind(end);
    }

    qb.push(" ORDER BY timestamp DESC, id DESC LIMIT ")
        .push_bind(query.limit as i64);
    qb
}

#[async_trait]
impl MetricStore for PgStore {
    async fn insert(&self, fields: MetricFields) -> Result<Metric, StoreError> {
        let row: MetricRow = sqlx::query_as(&format!(
            "INSERT INTO metrics ({COLUMNS}) VALUES ($1, $2, $3, $4, $5) RETURNING {COLUMNS}"
        ))
        .bind(*MetricId::new().as_uuid())
        .bind(&fields.name)
        .bind(&fields.team)
        .bind(&fields.role)
        .bind(store_now())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn find(&self, query: &MetricQuery) -> Result<Vec<Metric>, StoreError> {
        let mut qb = select_query(query);
        debug!("Metric query: {}", qb.sql());

        let rows: Vec<MetricRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get(&self, id: MetricId) -> Result<Option<Metric>, StoreError> {
        let row: Option<MetricRow> =
            sqlx::query_as(&format!("SELECT {COLUMNS} FROM metrics WHERE id = $1"))
                .bind(*id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(Into::into))
    }

    async fn replace(
        &self,
        id: MetricId,
        fields: MetricFields,
    ) -> Result<Option<Metric>, StoreError> {
        // Single statement: the strictly-later timestamp is computed against
        // the row's own previous value.
        let row: Option<MetricRow> = sqlx::query_as(&format!(
            "UPDATE metrics SET name = $2, team = $3, role = $4, \
             timestamp = GREATEST($5, timestamp + INTERVAL '1 microsecond') \
             WHERE id = $1 RETURNING {COLUMNS}"
        ))
        .bind(*id.as_uuid())
        .bind(&fields.name)
        .bind(&fields.team)
        .bind(&fields.role)
        .bind(store_now())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn delete(&self, id: MetricId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM metrics WHERE id = $1")
            .bind(*id.as_uuid())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
