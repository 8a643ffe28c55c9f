//! Typed client for the metrics API

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use teamboard_protocol::{
    DeleteAck, ErrorBody, Metric, MetricFilter, MetricId, MetricPayload, StatusReport,
};
use thiserror::Error;
use tracing::debug;

use crate::config::ClientConfig;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{message} ({status})")]
    Api {
        status: u16,
        code: String,
        message: String,
    },
}

impl ClientError {
    /// HTTP status of an API-level failure
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Transport(e) => e.status().map(|s| s.as_u16()),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Machine-readable error code from the response body, if any
    pub fn code(&self) -> Option<&str> {
        match self {
            ClientError::Api { code, .. } => Some(code),
            ClientError::Transport(_) => None,
        }
    }
}

/// Operations the dashboard needs from the API
#[async_trait]
pub trait MetricsApi: Send + Sync {
    async fn status(&self) -> Result<StatusReport, ClientError>;

    async fn list(&self, filter: &MetricFilter) -> Result<Vec<Metric>, ClientError>;

    async fn get(&self, id: MetricId) -> Result<Metric, ClientError>;

    async fn create(&self, payload: &MetricPayload) -> Result<Metric, ClientError>;

    async fn update(&self, id: MetricId, payload: &MetricPayload) -> Result<Metric, ClientError>;

    async fn delete(&self, id: MetricId) -> Result<DeleteAck, ClientError>;
}

/// HTTP implementation of [`MetricsApi`]
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Decode a success body, or turn an error body into [`ClientError::Api`]
async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp.json().await?);
    }

    let text = resp.text().await.unwrap_or_default();
    let (code, message) = match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => (body.code, body.error),
        Err(_) => (
            "unknown".to_string(),
            status
                .canonical_reason()
                .unwrap_or("Unexpected response")
                .to_string(),
        ),
    };

    debug!("API error {}: {} ({})", status, message, code);
    Err(ClientError::Api {
        status: status.as_u16(),
        code,
        message,
    })
}

#[async_trait]
impl MetricsApi for ApiClient {
    async fn status(&self) -> Result<StatusReport, ClientError> {
        let resp = self.http.get(self.url("/api/status")).send().await?;
        decode(resp).await
    }

    async fn list(&self, filter: &MetricFilter) -> Result<Vec<Metric>, ClientError> {
        let resp = self
            .http
            .get(self.url("/api/metrics"))
            .query(filter)
            .send()
            .await?;
        decode(resp).await
    }

    async fn get(&self, id: MetricId) -> Result<Metric, ClientError> {
        let resp = self
            .http
            .get(self.url(&format!("/api/metrics/{id}")))
            .send()
            .await?;
        decode(resp).await
    }

    async fn create(&self, payload: &MetricPayload) -> Result<Metric, ClientError> {
        let resp = self
            .http
            .post(self.url("/api/metrics"))
            .json(payload)
            .send()
            .await?;
        decode(resp).await
    }

    async fn update(&self, id: MetricId, payload: &MetricPayload) -> Result<Metric, ClientError> {
        let resp = self
            .http
            .put(self.url(&format!("/api/metrics/{id}")))
            .json(payload)
            .send()
            .await?;
        decode(resp).await
    }

    async fn delete(&self, id: MetricId) -> Result<DeleteAck, ClientError> {
        let resp = self
            .http
            .delete(self.url(&format!("/api/metrics/{id}")))
            .send()
            .await?;
        decode(resp).await
    }
}
