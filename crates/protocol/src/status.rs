//! Health check and error envelopes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Store connectivity as reported by the status endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreState {
    Connected,
    Disconnected,
}

/// Overall service health
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    Healthy,
    Degraded,
}

/// Body of `GET /api/status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub status: Health,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub store: StoreState,
}

impl StatusReport {
    /// Fold liveness and store connectivity into a report
    ///
    /// The service is live by virtue of answering, so only the store flag
    /// decides between healthy and degraded.
    pub fn new(store_connected: bool, timestamp: DateTime<Utc>) -> Self {
        if store_connected {
            Self {
                status: Health::Healthy,
                timestamp,
                message: Some("Backend is running!".to_string()),
                store: StoreState::Connected,
            }
        } else {
            Self {
                status: Health::Degraded,
                timestamp,
                message: Some("Store unreachable".to_string()),
                store: StoreState::Disconnected,
            }
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == Health::Healthy
    }
}

/// Error envelope for every 4xx/5xx response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
}

impl ErrorBody {
    pub fn new(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
        }
    }
}
