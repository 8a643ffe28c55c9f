//! Prometheus metrics

use crate::config::MonitoringConfig;
use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Request metrics for the API service
///
/// Each instance owns its registry, so several contexts (as in tests) can
/// coexist in one process.
pub struct Metrics {
    registry: Registry,

    // Counters
    pub requests: IntCounterVec,
    pub store_faults: IntCounter,

    // Histograms
    pub request_duration: HistogramVec,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let requests = IntCounterVec::new(
            Opts::new("teamboard_requests_total", "Total API requests"),
            &["route", "status"],
        )?;

        let store_faults = IntCounter::with_opts(Opts::new(
            "teamboard_store_faults_total",
            "Requests that failed on a store fault",
        ))?;

        let request_duration = HistogramVec::new(
            HistogramOpts::new(
                "teamboard_request_duration_seconds",
                "Request duration in seconds",
            ),
            &["route"],
        )?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(store_faults.clone()))?;
        registry.register(Box::new(request_duration.clone()))?;

        Ok(Self {
            registry,
            requests,
            store_faults,
            request_duration,
        })
    }

    /// Record one finished request
    pub fn observe(&self, route: &str, status: u16, elapsed_secs: f64) {
        let class = match status {
            200..=299 => "2xx",
            400..=499 => "4xx",
            500..=599 => "5xx",
            _ => "other",
        };

        self.requests.with_label_values(&[route, class]).inc();
        self.request_duration
            .with_label_values(&[route])
            .observe(elapsed_secs);

        if status >= 500 {
            self.store_faults.inc();
        }
    }

    /// Text exposition of every registered metric
    pub fn encode(&self) -> Vec<u8> {
        let mut buffer = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&self.registry.gather(), &mut buffer) {
            error!("Failed to encode metrics: {}", e);
        }
        buffer
    }
}

/// Middleware recording per-route counts and latency
pub async fn track(State(metrics): State<Arc<Metrics>>, request: Request, next: Next) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let start = Instant::now();
    let response = next.run(request).await;

    metrics.observe(
        &route,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );
    response
}

/// Start the metrics server
pub fn start_server(config: &MonitoringConfig, metrics: Arc<Metrics>) -> JoinHandle<()> {
    let bind = config.prometheus_bind;
    let enabled = config.prometheus_enabled;

    tokio::spawn(async move {
        if !enabled {
            info!("Prometheus metrics disabled");
            return;
        }

        use bytes::Bytes;
        use http_body_util::Full;
        use hyper::{Response, server::conn::http1, service::service_fn};
        use hyper_util::rt::TokioIo;

        let listener = match tokio::net::TcpListener::bind(bind).await {
            Ok(l) => l,
            Err(e) => {
                error!("Failed to bind metrics server: {}", e);
                return;
            }
        };

        info!("Prometheus metrics server listening on {}", bind);

        loop {
            let (stream, _) = match listener.accept().await {
                Ok(r) => r,
                Err(e) => {
                    error!("Metrics accept error: {}", e);
                    continue;
                }
            };

            let io = TokioIo::new(stream);
            let metrics = metrics.clone();

            tokio::spawn(async move {
                let service = service_fn(move |_req| {
                    let body = metrics.encode();
                    async move {
                        Response::builder()
                            .header("Content-Type", "text/plain; version=0.0.4")
                            .body(Full::new(Bytes::from(body)))
                    }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    error!("Metrics connection error: {}", e);
                }
            });
        }
    })
}
