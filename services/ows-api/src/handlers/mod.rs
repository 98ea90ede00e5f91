//! HTTP request handlers.
//!
//! - `ows`: OWS KVP, XML and RESTful endpoints
//! - `health`: health checks, Prometheus metrics and monitoring

pub mod health;
pub mod ows;

pub use health::{api_metrics_handler, health_handler, metrics_handler, ready_handler};
pub use ows::{
    ows_get_handler, ows_post_handler, service_get_handler, service_post_handler, wmts_rest_handler,
};
