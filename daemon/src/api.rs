//! HTTP API for teamboard
//!
//! Provides:
//! - `GET /api/status`: liveness and store connectivity
//! - `/api/metrics`: create and filtered list
//! - `/api/metrics/:id`: read, replace and delete by id

use crate::error::ApiError;
use crate::metrics;
use crate::state::AppContext;
use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{HeaderValue, Method, StatusCode, header::CONTENT_TYPE},
    middleware,
    response::IntoResponse,
    routing::get,
};
use chrono::Utc;
use std::time::Duration;
use teamboard_protocol::{
    DeleteAck, Metric, MetricFilter, MetricId, MetricPayload, StatusReport,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{debug, info, warn};

/// Build the API router over an application context
pub fn router(ctx: AppContext) -> Result<Router> {
    let cors = cors_layer(&ctx.config.server.allowed_origins)?;

    let app = Router::new()
        .route("/api/status", get(get_status))
        .route("/api/metrics", get(list_metrics).post(create_metric))
        .route(
            "/api/metrics/:id",
            get(get_metric).put(update_metric).delete(delete_metric),
        )
        .route_layer(middleware::from_fn_with_state(
            ctx.metrics.clone(),
            metrics::track,
        ))
        .layer(cors)
        .with_state(ctx);

    Ok(app)
}

fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    let origins = origins
        .iter()
        .map(|o| HeaderValue::from_str(o).with_context(|| format!("invalid CORS origin {o:?}")))
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(Duration::from_secs(60 * 60)))
}

fn parse_id(raw: &str) -> Result<MetricId, ApiError> {
    Ok(raw.parse::<MetricId>()?)
}

async fn get_status(State(ctx): State<AppContext>) -> Json<StatusReport> {
    let connected = match tokio::time::timeout(ctx.config.store.ping_timeout(), ctx.store.ping()).await
    {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            warn!("Store ping failed: {}", e);
            false
        }
        Err(_) => {
            warn!("Store ping timed out");
            false
        }
    };

    Json(StatusReport::new(connected, Utc::now()))
}

async fn create_metric(
    State(ctx): State<AppContext>,
    payload: Result<Json<MetricPayload>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;
    let fields = payload.validate()?;

    let metric = ctx.store.insert(fields).await?;
    info!("Created metric {}", metric.id);
    Ok((StatusCode::CREATED, Json(metric)))
}

async fn list_metrics(
    State(ctx): State<AppContext>,
    filter: Result<Query<MetricFilter>, QueryRejection>,
) -> Result<Json<Vec<Metric>>, ApiError> {
    let Query(filter) = filter?;
    let query = filter.compile()?;

    let metrics = ctx.store.find(&query).await?;
    debug!("Listed {} metrics for {:?}", metrics.len(), query);
    Ok(Json(metrics))
}

async fn get_metric(
    State(ctx): State<AppContext>,
    id: Result<Path<String>, PathRejection>,
) -> Result<Json<Metric>, ApiError> {
    let Path(id) = id?;
    let id = parse_id(&id)?;

    ctx.store
        .get(id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

async fn update_metric(
    State(ctx): State<AppContext>,
    id: Result<Path<String>, PathRejection>,
    payload: Result<Json<MetricPayload>, JsonRejection>,
) -> Result<Json<Metric>, ApiError> {
    let Path(id) = id?;
    let id = parse_id(&id)?;
    let Json(payload) = payload?;
    let fields = payload.validate()?;

    let metric = ctx.store.replace(id, fields).await?.ok_or(ApiError::NotFound)?;
    info!("Updated metric {}", metric.id);
    Ok(Json(metric))
}

async fn delete_metric(
    State(ctx): State<AppContext>,
    id: Result<Path<String>, PathRejection>,
) -> Result<Json<DeleteAck>, ApiError> {
    let Path(id) = id?;
    let id = parse_id(&id)?;

    if !ctx.store.delete(id).await? {
        return Err(ApiError::NotFound);
    }

    info!("Deleted metric {}", id);
    Ok(Json(DeleteAck::new(id)))
}
