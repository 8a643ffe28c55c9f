//! teamboard client library
//!
//! - `api`: typed HTTP client for the metrics API
//! - `dashboard`: list/form view state machine
//! - `status`: cancellable status poller backing the status widget

pub mod api;
pub mod config;
pub mod dashboard;
pub mod status;

pub use api::{ApiClient, ClientError, MetricsApi};
pub use config::ClientConfig;
pub use dashboard::{Dashboard, DashboardState, FormState, Rejected, SubmitCommand, ViewState};
pub use status::{StatusPoller, StatusView};
