//! Health checks, metrics, and monitoring endpoints.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use tracing::instrument;

use crate::state::AppState;

// ============================================================================
// Health Checks
// ============================================================================

/// GET /health - Basic health check
pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /ready - Ready once at least one protocol has codecs and handlers
pub async fn ready_handler(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    let serving = state
        .protocols()
        .into_iter()
        .any(|p| !state.context.dispatcher().operations(p).is_empty());
    if serving {
        (StatusCode::OK, "Ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "Not ready")
    }
}

// ============================================================================
// Metrics
// ============================================================================

/// GET /metrics - Prometheus metrics endpoint
#[instrument(skip(handle))]
pub async fn metrics_handler(Extension(handle): Extension<PrometheusHandle>) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        handle.render(),
    )
        .into_response()
}

/// GET /api/metrics - JSON snapshot of request statistics and the enabled
/// protocols
#[instrument(skip(state))]
pub async fn api_metrics_handler(Extension(state): Extension<Arc<AppState>>) -> Json<serde_json::Value> {
    let registry = state.context.registry();
    let protocols: serde_json::Map<String, serde_json::Value> = registry
        .protocols()
        .map(|p| {
            let versions: Vec<String> = registry.supported_versions(p).iter().map(|v| v.to_string()).collect();
            let operations: Vec<String> = state
                .context
                .dispatcher()
                .operations(p)
                .iter()
                .map(|o| o.to_string())
                .collect();
            (
                p.to_string(),
                json!({ "versions": versions, "operations": operations }),
            )
        })
        .collect();

    Json(json!({
        "metrics": state.metrics.snapshot(),
        "protocols": protocols,
    }))
}
