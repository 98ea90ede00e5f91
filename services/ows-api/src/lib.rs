//! OGC web service gateway library.
//!
//! Exposes the router, state and backends so integration tests can drive
//! the service without a socket.

pub mod backends;
pub mod config;
pub mod handlers;
pub mod metrics;
pub mod state;
pub mod streaming;

use std::sync::Arc;

use axum::{extract::Extension, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use state::AppState;

/// Every route of the service.
pub fn build_router(state: Arc<AppState>, prometheus: PrometheusHandle) -> Router {
    Router::new()
        // OWS endpoints
        .route("/ows", get(handlers::ows_get_handler).post(handlers::ows_post_handler))
        .route(
            "/services/:service",
            get(handlers::service_get_handler).post(handlers::service_post_handler),
        )
        // WMTS RESTful binding
        .route("/wmts/rest/*path", get(handlers::wmts_rest_handler))
        // Health and metrics
        .route("/health", get(handlers::health_handler))
        .route("/ready", get(handlers::ready_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .route("/api/metrics", get(handlers::api_metrics_handler))
        .layer(Extension(state))
        .layer(Extension(prometheus))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
}
