//! OWS endpoints: KVP over GET, XML or form bodies over POST, the
//! per-service paths and the WMTS RESTful binding.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Extension, Path, RawQuery},
    http::{header, HeaderMap},
    response::Response,
};
use ows_common::{KvpMap, OwsError, Protocol};
use ows_protocol::{RawRequest, WmtsRestPath};
use tracing::{debug, instrument};

use crate::state::AppState;
use crate::streaming::{fault_response, serve};

/// GET /ows?SERVICE=...&REQUEST=...
#[instrument(skip(state, query))]
pub async fn ows_get_handler(Extension(state): Extension<Arc<AppState>>, RawQuery(query): RawQuery) -> Response {
    match KvpMap::parse(query.as_deref().unwrap_or("")) {
        Ok(kvp) => serve(state, RawRequest::Kvp(kvp)).await,
        Err(e) => fault_response(&e),
    }
}

/// POST /ows with an XML, SOAP or form-encoded body.
#[instrument(skip(state, headers, body))]
pub async fn ows_post_handler(Extension(state): Extension<Arc<AppState>>, headers: HeaderMap, body: Bytes) -> Response {
    match raw_from_body(&headers, body) {
        Ok(raw) => serve(state, raw).await,
        Err(e) => fault_response(&e),
    }
}

/// GET /services/:service?REQUEST=... with `SERVICE` taken from the path
/// when the query leaves it out.
#[instrument(skip(state, query))]
pub async fn service_get_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(service): Path<String>,
    RawQuery(query): RawQuery,
) -> Response {
    let mut kvp = match KvpMap::parse(query.as_deref().unwrap_or("")) {
        Ok(kvp) => kvp,
        Err(e) => return fault_response(&e),
    };
    match service_from_path(&service) {
        Ok(protocol) => {
            kvp.set_default("SERVICE", protocol.as_str());
        }
        Err(e) => return fault_response(&e),
    }
    serve(state, RawRequest::Kvp(kvp)).await
}

/// POST /services/:service
#[instrument(skip(state, headers, body))]
pub async fn service_post_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(service): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let protocol = match service_from_path(&service) {
        Ok(protocol) => protocol,
        Err(e) => return fault_response(&e),
    };
    match raw_from_body(&headers, body) {
        Ok(RawRequest::Kvp(mut kvp)) => {
            kvp.set_default("SERVICE", protocol.as_str());
            serve(state, RawRequest::Kvp(kvp)).await
        }
        // XML requests name their service on the root element.
        Ok(raw) => serve(state, raw).await,
        Err(e) => fault_response(&e),
    }
}

/// GET /wmts/rest/{layer}/{style}[/{time}]/{tms}/{matrix}/{row}/{col}.{ext}
#[instrument(skip(state))]
pub async fn wmts_rest_handler(Extension(state): Extension<Arc<AppState>>, Path(path): Path<String>) -> Response {
    match WmtsRestPath::parse(&path) {
        Ok(rest) => {
            debug!(layer = %rest.layer, matrix = %rest.tile_matrix, row = rest.tile_row, col = rest.tile_col, "RESTful GetTile");
            serve(state, RawRequest::Kvp(rest.into_kvp())).await
        }
        Err(e) => fault_response(&e),
    }
}

fn service_from_path(service: &str) -> Result<Protocol, OwsError> {
    service.parse()
}

/// Form-encoded bodies are KVP, anything else is treated as XML.
fn raw_from_body(headers: &HeaderMap, body: Bytes) -> Result<RawRequest, OwsError> {
    let form = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/x-www-form-urlencoded"));

    if form {
        let text = std::str::from_utf8(&body)
            .map_err(|_| OwsError::MalformedRequest("Form body is not UTF-8".to_string()))?;
        return Ok(RawRequest::Kvp(KvpMap::parse(text)?));
    }
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(OwsError::MalformedRequest("Empty request body".to_string()));
    }
    Ok(RawRequest::Xml(body))
}
