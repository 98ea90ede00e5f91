//! Error to fault mapping and fault encoding per protocol version.

use std::io;

use ows_common::{fault_from_error, map_to_fault, ExceptionCode, HandlerError, OwsError, OwsFault, Protocol};
use ows_protocol::{CswCodec, RequestCodec, SosCodec, WfsCodec, WmtsCodec, WpsCodec};
use test_utils::assert_xml_contains;

fn every_error() -> Vec<OwsError> {
    vec![
        OwsError::MalformedRequest("bad".into()),
        OwsError::missing("TYPENAME"),
        OwsError::invalid_value("COUNT", "not a number"),
        OwsError::InvalidVersionFormat("x.y".into()),
        OwsError::UnsupportedVersion("9.0.0".into()),
        OwsError::VersionNegotiationFailed("9.0.0".into()),
        OwsError::UnknownOperation {
            protocol: Protocol::Wfs,
            operation: "Transaction".into(),
        },
        OwsError::UnknownProtocol("WMS".into()),
        OwsError::DuplicateRegistration("WFS GetFeature".into()),
        HandlerError::new("handler failed").into(),
        OwsError::Internal("oops".into()),
        OwsError::ClientDisconnected,
    ]
}

fn render(codec: &dyn RequestCodec, fault: &OwsFault) -> String {
    let mut out = Vec::new();
    codec.encode_fault(fault, &mut out).unwrap();
    String::from_utf8(out).unwrap()
}

// ============================================================================
// Mapping
// ============================================================================

#[test]
fn test_every_error_maps_to_a_fault() {
    for error in every_error() {
        let fault = map_to_fault(&error);
        assert!(!fault.exception_code.as_str().is_empty(), "{:?}", error);
        assert_eq!(fault.message, error.to_string());
    }
}

#[test]
fn test_mapping_is_stable() {
    for error in every_error() {
        assert_eq!(map_to_fault(&error), map_to_fault(&error));
    }
}

#[test]
fn test_expected_codes() {
    let codes: Vec<ExceptionCode> = every_error().iter().map(|e| map_to_fault(e).exception_code).collect();
    assert_eq!(
        codes,
        vec![
            ExceptionCode::InvalidRequest,
            ExceptionCode::MissingParameterValue,
            ExceptionCode::InvalidParameterValue,
            ExceptionCode::InvalidParameterValue,
            ExceptionCode::InvalidParameterValue,
            ExceptionCode::VersionNegotiationFailed,
            ExceptionCode::OperationNotSupported,
            ExceptionCode::NoApplicableCode,
            ExceptionCode::NoApplicableCode,
            ExceptionCode::NoApplicableCode,
            ExceptionCode::NoApplicableCode,
            ExceptionCode::NoApplicableCode,
        ]
    );
}

#[test]
fn test_foreign_error_is_no_applicable_code() {
    let err = io::Error::new(io::ErrorKind::Other, "disk on fire");
    let fault = fault_from_error(&err);
    assert_eq!(fault.exception_code, ExceptionCode::NoApplicableCode);
    assert_eq!(fault.locator, None);
    assert_eq!(fault.message, "disk on fire");
}

#[test]
fn test_gateway_error_behind_dyn_keeps_mapping() {
    let err = OwsError::missing("PROCEDURE");
    let fault = fault_from_error(&err);
    assert_eq!(fault.exception_code, ExceptionCode::MissingParameterValue);
    assert_eq!(fault.locator.as_deref(), Some("PROCEDURE"));
}

#[test]
fn test_custom_handler_code_passes_through() {
    let err: OwsError = HandlerError::new("row 99 out of range")
        .with_code(ExceptionCode::Custom("TileOutOfRange".into()))
        .with_locator("TILEROW")
        .into();
    let fault = map_to_fault(&err);
    assert_eq!(fault.exception_code.as_str(), "TileOutOfRange");
    assert_eq!(fault.exception_code.http_status(), 400);
}

// ============================================================================
// Encoding per protocol version
// ============================================================================

#[test]
fn test_fault_envelopes_per_codec() {
    let fault = OwsFault::new(ExceptionCode::InvalidParameterValue, "bad value").with_locator("X");

    assert_xml_contains!(
        render(&WfsCodec::v1_0_0(), &fault),
        r#"<ServiceExceptionReport xmlns="http://www.opengis.net/ogc" version="1.2.0">"#,
        r#"<ServiceException code="InvalidParameterValue" locator="X">bad value</ServiceException>"#
    );
    assert_xml_contains!(
        render(&WfsCodec::v1_1_0(), &fault),
        r#"xmlns:ows="http://www.opengis.net/ows" version="1.0.0""#
    );
    assert_xml_contains!(
        render(&WfsCodec::v2_0_0(), &fault),
        r#"xmlns:ows="http://www.opengis.net/ows/1.1" version="2.0.0""#
    );
    assert_xml_contains!(
        render(&CswCodec::new(), &fault),
        r#"xmlns:ows="http://www.opengis.net/ows" version="1.2.0""#
    );
    for codec in [
        Box::new(SosCodec::new()) as Box<dyn RequestCodec>,
        Box::new(WmtsCodec::new()),
        Box::new(WpsCodec::new()),
    ] {
        assert_xml_contains!(
            render(codec.as_ref(), &fault),
            r#"xmlns:ows="http://www.opengis.net/ows/1.1" version="1.0.0""#,
            r#"<ows:Exception exceptionCode="InvalidParameterValue" locator="X">"#
        );
    }
}

#[test]
fn test_fault_text_is_escaped() {
    let fault = OwsFault::new(ExceptionCode::NoApplicableCode, "a < b & c");
    assert_xml_contains!(
        render(&WfsCodec::v2_0_0(), &fault),
        "<ows:ExceptionText>a &lt; b &amp; c</ows:ExceptionText>"
    );
}
