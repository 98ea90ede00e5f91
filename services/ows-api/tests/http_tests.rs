//! End-to-end tests through the HTTP router.

use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use metrics_exporter_prometheus::PrometheusBuilder;
use tower::ServiceExt;

use ows_api::config::ServiceConfig;
use ows_api::state::AppState;
use test_utils::{assert_xml_contains, temp_file_with};

fn test_config(tile_root: &Path) -> ServiceConfig {
    let yaml = format!(
        r#"
service:
  title: Test Gateway
  online_resource: http://localhost/ows
features:
  types:
    - name: Road
      title: Roads
      properties:
        - name: name
      geometry: geom
      features:
        - id: r1
          properties:
            name: A1
          point: [1.0, 50.0]
tiles:
  root: {}
  layers:
    - identifier: relief
      title: Relief
      max_zoom: 3
"#,
        tile_root.display()
    );
    let file = temp_file_with(&yaml, ".yaml");
    ServiceConfig::load(file.path()).unwrap()
}

fn app(tile_root: &Path) -> Router {
    let state = Arc::new(AppState::new(test_config(tile_root)).unwrap());
    let handle = PrometheusBuilder::new().build_recorder().handle();
    ows_api::build_router(state, handle)
}

async fn get(app: Router, uri: &str) -> (StatusCode, String, Vec<u8>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    read(response).await
}

async fn read(response: axum::response::Response) -> (StatusCode, String, Vec<u8>) {
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, content_type, body.to_vec())
}

fn text(body: &[u8]) -> String {
    String::from_utf8_lossy(body).into_owned()
}

#[tokio::test]
async fn test_health_and_ready() {
    let root = tempfile::tempdir().unwrap();
    let (status, _, body) = get(app(root.path()), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"OK");

    let (status, _, body) = get(app(root.path()), "/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"Ready");
}

#[tokio::test]
async fn test_wfs_capabilities_negotiates_highest_version() {
    let root = tempfile::tempdir().unwrap();
    let (status, content_type, body) = get(app(root.path()), "/ows?SERVICE=WFS&REQUEST=GetCapabilities").await;

    assert_eq!(status, StatusCode::OK);
    assert!(content_type.contains("xml"), "content type {}", content_type);
    assert_xml_contains!(
        text(&body),
        "<wfs:WFS_Capabilities",
        r#"version="2.0.0""#,
        "Road</wfs:Name>",
        "Test Gateway"
    );
}

#[tokio::test]
async fn test_accept_versions_picks_older_codec() {
    let root = tempfile::tempdir().unwrap();
    let (status, _, body) = get(
        app(root.path()),
        "/ows?SERVICE=WFS&REQUEST=GetCapabilities&ACCEPTVERSIONS=1.1.0,1.0.0",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_xml_contains!(text(&body), r#"version="1.1.0""#);
}

#[tokio::test]
async fn test_service_path_fills_in_service() {
    let root = tempfile::tempdir().unwrap();
    let (status, _, body) = get(app(root.path()), "/services/wfs?REQUEST=GetCapabilities").await;
    assert_eq!(status, StatusCode::OK);
    assert_xml_contains!(text(&body), "WFS_Capabilities");

    let (status, _, body) = get(app(root.path()), "/services/wcs?REQUEST=GetCapabilities").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_xml_contains!(text(&body), r#"exceptionCode="NoApplicableCode""#);
}

#[tokio::test]
async fn test_missing_service_is_a_fault() {
    let root = tempfile::tempdir().unwrap();
    let (status, _, body) = get(app(root.path()), "/ows?REQUEST=GetCapabilities").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_xml_contains!(
        text(&body),
        "ows:ExceptionReport",
        r#"exceptionCode="MissingParameterValue""#,
        r#"locator="SERVICE""#
    );
}

#[tokio::test]
async fn test_unsupported_operation_is_a_fault() {
    let root = tempfile::tempdir().unwrap();
    let (status, _, body) = get(app(root.path()), "/ows?SERVICE=WFS&VERSION=2.0.0&REQUEST=Transaction").await;

    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
    assert_xml_contains!(text(&body), r#"exceptionCode="OperationNotSupported""#);
}

#[tokio::test]
async fn test_xml_post_capabilities() {
    let root = tempfile::tempdir().unwrap();
    let request = Request::builder()
        .method("POST")
        .uri("/ows")
        .header(header::CONTENT_TYPE, "text/xml")
        .body(Body::from(
            r#"<GetCapabilities xmlns="http://www.opengis.net/wfs/2.0" service="WFS"/>"#,
        ))
        .unwrap();
    let (status, _, body) = read(app(root.path()).oneshot(request).await.unwrap()).await;

    assert_eq!(status, StatusCode::OK);
    assert_xml_contains!(text(&body), "<wfs:WFS_Capabilities");
}

#[tokio::test]
async fn test_empty_post_body_is_a_fault() {
    let root = tempfile::tempdir().unwrap();
    let request = Request::builder()
        .method("POST")
        .uri("/ows")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = read(app(root.path()).oneshot(request).await.unwrap()).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_xml_contains!(text(&body), "ows:ExceptionReport");
}

#[tokio::test]
async fn test_wmts_rest_tile() {
    let root = tempfile::tempdir().unwrap();
    let dir = root.path().join("relief/default/WebMercatorQuad/2/1");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("3.png"), b"\x89PNG tile").unwrap();

    let (status, content_type, body) = get(app(root.path()), "/wmts/rest/relief/default/WebMercatorQuad/2/1/3.png").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type, "image/png");
    assert_eq!(body, b"\x89PNG tile");
}

#[tokio::test]
async fn test_wmts_tile_out_of_range() {
    let root = tempfile::tempdir().unwrap();
    let (status, _, body) = get(
        app(root.path()),
        "/ows?SERVICE=WMTS&REQUEST=GetTile&VERSION=1.0.0&LAYER=relief&STYLE=default&FORMAT=image/png\
         &TILEMATRIXSET=WebMercatorQuad&TILEMATRIX=1&TILEROW=5&TILECOL=0",
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_xml_contains!(text(&body), r#"exceptionCode="TileOutOfRange""#, r#"locator="TILEROW""#);
}

#[tokio::test]
async fn test_api_metrics_lists_protocols() {
    let root = tempfile::tempdir().unwrap();
    let (status, content_type, body) = get(app(root.path()), "/api/metrics").await;

    assert_eq!(status, StatusCode::OK);
    assert!(content_type.starts_with("application/json"));
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let operations = json["protocols"]["WFS"]["operations"].as_array().unwrap();
    assert!(operations.iter().any(|o| o == "GetFeature"));
    assert!(json["metrics"].is_object());
}
