//! Common test fixtures: raw requests and canonical responses that
//! represent typical gateway traffic.

use bytes::Bytes;
use ows_common::{BoundingBox, KvpMap};
use ows_protocol::request::QName;
use ows_protocol::response::{
    Capabilities, CapabilitiesContents, Feature, FeatureCollection, FeatureTypeInfo,
    LockFeatureResult, Point, ServiceMetadata,
};
use ows_protocol::{CanonicalResponse, Document, RawRequest};

/// Well-known identifiers used across tests.
pub mod ids {
    pub const SENSOR_PROCEDURE: &str = "urn:ogc:object:Sensor:latlon:foobarnator";
    pub const TML_FORMAT: &str = "text/xml;subtype=\"TML/1.0\"";
    pub const SENSORML_FORMAT: &str = "text/xml;subtype=\"sensorML/1.0.1\"";
    pub const APP_NAMESPACE: &str = "http://example.org/app";
    pub const TIMESTAMP: &str = "2024-05-01T12:00:00Z";
}

/// A KVP request from an unencoded `key=value&...` string.
///
/// Values are taken literally, so they may contain `;` and quotes.
pub fn kvp(query: &str) -> RawRequest {
    RawRequest::Kvp(KvpMap::from_pairs(
        query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| pair.split_once('=').unwrap_or((pair, ""))),
    ))
}

/// An XML (or SOAP) request body.
pub fn xml(document: impl Into<String>) -> RawRequest {
    RawRequest::Xml(Bytes::from(document.into()))
}

pub fn road() -> QName {
    QName::new(Some("app"), "Road", Some(ids::APP_NAMESPACE))
}

pub fn service_metadata() -> ServiceMetadata {
    ServiceMetadata {
        title: "Test Gateway".into(),
        abstract_text: Some("Gateway under test".into()),
        keywords: vec!["roads".into()],
        provider_name: "Example".into(),
        online_resource: "http://localhost:8080/ows".into(),
        ..Default::default()
    }
}

pub fn wfs_capabilities() -> CanonicalResponse {
    CanonicalResponse::Capabilities(Capabilities {
        service: service_metadata(),
        operations: vec![
            "GetCapabilities".into(),
            "DescribeFeatureType".into(),
            "GetFeature".into(),
            "LockFeature".into(),
        ],
        update_sequence: None,
        sections: Vec::new(),
        contents: CapabilitiesContents::FeatureTypes(vec![FeatureTypeInfo {
            name: road(),
            title: "Roads".into(),
            abstract_text: None,
            default_crs: "urn:ogc:def:crs:EPSG::4326".into(),
            wgs84_bbox: Some(BoundingBox::new(-10.0, 40.0, 5.0, 52.0)),
        }]),
    })
}

/// `count` road features with ids `r1..=rN`.
pub fn feature_collection(count: usize) -> CanonicalResponse {
    let features = (1..=count)
        .map(|i| Feature {
            type_name: road(),
            id: format!("r{}", i),
            properties: vec![("name".into(), format!("Road {}", i))],
            geometry: Some((
                "geom".into(),
                Point {
                    x: i as f64,
                    y: 50.0,
                    srs_name: Some("urn:ogc:def:crs:EPSG::4326".into()),
                },
            )),
        })
        .collect();
    CanonicalResponse::FeatureCollection(FeatureCollection {
        features,
        number_matched: Some(count as u64),
        timestamp: ids::TIMESTAMP.into(),
    })
}

pub fn lock_result(locked: &[&str]) -> CanonicalResponse {
    CanonicalResponse::LockFeature(LockFeatureResult {
        lock_id: "lock-1".into(),
        locked: locked.iter().map(|s| s.to_string()).collect(),
        not_locked: Vec::new(),
    })
}

/// A pre-encoded TML document as a DescribeSensor handler would return it.
pub fn sensor_document() -> CanonicalResponse {
    CanonicalResponse::Document(Document::new(
        ids::TML_FORMAT,
        format!(
            "<tml:system xmlns:tml=\"http://www.opengis.net/tml\"><tml:identification>{}</tml:identification></tml:system>",
            ids::SENSOR_PROCEDURE
        ),
    ))
}
