//! teamboard protocol - shared wire types
//!
//! This crate defines the data structures exchanged between the API service
//! and its clients:
//! - `Metric`: the stored team-member record
//! - `MetricPayload`: the body of create/update requests
//! - `MetricFilter`/`MetricQuery`: list filters and their compiled form
//! - `StatusReport`: the health check response
//! - `ErrorBody`: the error envelope for every non-2xx response
//!
//! All structures use serde with the camelCase field names of the HTTP API.

mod filter;
mod metric;
mod status;
mod validation;

pub use filter::*;
pub use metric::*;
pub use status::*;
pub use validation::*;
