//! SOS DescribeSensor and GetObservation through both bindings.

use std::sync::Arc;

use ows_common::{OwsError, Protocol};
use ows_protocol::request::DescribeSensor;
use ows_protocol::{
    BufferSink, CanonicalRequest, Disposition, Handler, RawRequest, RequestCodec, RequestEnvelope,
    RequestPayload, ServiceContext, SosCodec, VersionRegistry,
};
use test_utils::fixtures::{self, ids, kvp, xml};
use test_utils::handlers::{dispatcher, Recording};
use test_utils::read_request_document;

fn decode(raw: RawRequest) -> Result<CanonicalRequest, OwsError> {
    SosCodec::new().decode(RequestEnvelope::read(raw)?)
}

fn describe_sensor_kvp() -> RawRequest {
    kvp(&format!(
        "SERVICE=SOS&VERSION=1.0.0&REQUEST=DescribeSensor&PROCEDURE={}&OUTPUTFORMAT={}",
        ids::SENSOR_PROCEDURE,
        ids::TML_FORMAT
    ))
}

// ============================================================================
// DescribeSensor
// ============================================================================

#[test]
fn test_describe_sensor_kvp() {
    let request = decode(describe_sensor_kvp()).unwrap();
    assert_eq!(
        request.payload,
        RequestPayload::DescribeSensor(DescribeSensor {
            procedure: ids::SENSOR_PROCEDURE.into(),
            output_format: ids::TML_FORMAT.into(),
        })
    );
}

#[test]
fn test_describe_sensor_kvp_round_trip() {
    let codec = SosCodec::new();
    let original = decode(describe_sensor_kvp()).unwrap();

    let encoded = codec.encode_request_kvp(&original).unwrap();
    assert_eq!(encoded.get("OUTPUTFORMAT"), Some(ids::TML_FORMAT));

    // Through the percent-encoded wire form and back.
    let query = encoded.to_query_string().unwrap();
    let reparsed = ows_common::KvpMap::parse(&query).unwrap();
    let decoded = decode(RawRequest::Kvp(reparsed)).unwrap();
    assert_eq!(decoded, original);
}

#[test]
fn test_describe_sensor_xml() {
    let request = decode(xml(format!(
        r#"<sos:DescribeSensor xmlns:sos="http://www.opengis.net/sos/1.0" service="SOS"
                version="1.0.0" outputFormat='{}'>
              <sos:procedure>{}</sos:procedure>
            </sos:DescribeSensor>"#,
        ids::SENSORML_FORMAT,
        ids::SENSOR_PROCEDURE
    )))
    .unwrap();
    let RequestPayload::DescribeSensor(describe) = request.payload else {
        panic!("expected DescribeSensor");
    };
    assert_eq!(describe.output_format, ids::SENSORML_FORMAT);
    assert_eq!(describe.procedure, ids::SENSOR_PROCEDURE);
}

#[test]
fn test_describe_sensor_missing_procedure() {
    let err = decode(kvp(&format!(
        "SERVICE=SOS&VERSION=1.0.0&REQUEST=DescribeSensor&OUTPUTFORMAT={}",
        ids::TML_FORMAT
    )))
    .unwrap_err();
    assert!(matches!(err, OwsError::MissingParameter(ref p) if p == "PROCEDURE"));
}

#[test]
fn test_describe_sensor_document_passes_through() {
    let recording = Recording::new(fixtures::sensor_document());
    let ctx = ServiceContext::new(
        VersionRegistry::with_default_codecs().unwrap(),
        dispatcher(vec![(
            Protocol::Sos,
            "DescribeSensor",
            recording.clone() as Arc<dyn Handler>,
        )]),
    );

    let mut sink = BufferSink::new();
    let outcome = ctx.process(describe_sensor_kvp(), &mut sink);

    assert_eq!(outcome.disposition, Disposition::Sent);
    assert_eq!(recording.calls(), 1);
    let head = sink.head.clone().unwrap();
    assert_eq!(head.status, 200);
    assert_eq!(head.content_type, ids::TML_FORMAT);
    assert!(sink.body_str().contains(ids::SENSOR_PROCEDURE));
}

// ============================================================================
// GetObservation
// ============================================================================

#[test]
fn test_get_observation_xml_document() {
    let doc = read_request_document("ows-protocol", "sos_get_observation.xml");
    let request = decode(xml(doc)).unwrap();
    let RequestPayload::GetObservation(obs) = request.payload else {
        panic!("expected GetObservation");
    };

    assert_eq!(obs.offering, "TEMPERATURE");
    assert_eq!(
        obs.event_time.as_deref(),
        Some("2024-05-01T00:00:00Z/2024-05-02T00:00:00Z")
    );
    assert_eq!(obs.procedures, vec![ids::SENSOR_PROCEDURE]);
    assert_eq!(obs.response_format, r#"text/xml;subtype="om/1.0.0""#);
    assert_eq!(obs.srs_name.as_deref(), Some("urn:ogc:def:crs:EPSG::4326"));
}

#[test]
fn test_get_observation_requires_observed_property() {
    let err = decode(kvp(
        "SERVICE=SOS&VERSION=1.0.0&REQUEST=GetObservation&OFFERING=TEMPERATURE&RESPONSEFORMAT=text/xml",
    ))
    .unwrap_err();
    assert!(matches!(err, OwsError::MissingParameter(ref p) if p == "OBSERVEDPROPERTY"));
}

#[test]
fn test_sos_fault_uses_ows_1_1() {
    let ctx = ServiceContext::new(VersionRegistry::with_default_codecs().unwrap(), dispatcher(vec![]));
    let mut sink = BufferSink::new();
    let outcome = ctx.process(describe_sensor_kvp(), &mut sink);

    // No handler registered.
    let fault = outcome.fault().unwrap();
    assert_eq!(fault.exception_code.as_str(), "OperationNotSupported");
    assert_eq!(sink.head.clone().unwrap().status, 501);
    assert!(sink
        .body_str()
        .contains(r#"<ows:ExceptionReport xmlns:ows="http://www.opengis.net/ows/1.1" version="1.0.0""#));
}
