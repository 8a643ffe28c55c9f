//! teamboard storage - metric record stores
//!
//! This crate provides:
//! - `MetricStore`: the store contract the API service is written against
//! - `MemoryStore`: an in-process store, used for tests and local runs
//! - `PgStore`: a PostgreSQL store (sqlx) with native query compilation

mod engine;
mod memory;
pub mod postgres;

pub use engine::*;
pub use memory::*;
pub use postgres::PgStore;
