//! WFS decoding and encoding across versions and bindings.

use std::sync::Arc;

use ows_common::{OwsError, Protocol};
use ows_protocol::request::{LockFeature, QuerySelection};
use ows_protocol::{
    BufferSink, CanonicalRequest, Handler, RawRequest, RequestCodec, RequestEnvelope, RequestPayload,
    ServiceContext, VersionRegistry, WfsCodec,
};
use test_utils::fixtures::{self, kvp, xml};
use test_utils::handlers::{dispatcher, Recording};
use test_utils::{assert_xml_contains, read_request_document};

fn decode(codec: &WfsCodec, raw: RawRequest) -> Result<CanonicalRequest, OwsError> {
    codec.decode(RequestEnvelope::read(raw)?)
}

fn lock(request: CanonicalRequest) -> LockFeature {
    match request.payload {
        RequestPayload::LockFeature(lock) => lock,
        other => panic!("expected LockFeature, got {:?}", other),
    }
}

// ============================================================================
// LockFeature
// ============================================================================

#[test]
fn test_lock_feature_2_0_kvp_defaults() {
    let request = decode(
        &WfsCodec::v2_0_0(),
        kvp("SERVICE=WFS&VERSION=2.0.0&REQUEST=LockFeature&TYPENAMES=app:Road"),
    )
    .unwrap();
    assert_eq!(request.handle, None);

    let lock = lock(request);
    assert!(!lock.lock_all);
    assert_eq!(lock.queries.len(), 1);
    assert_eq!(lock.existing_lock_id, None);
    assert_eq!(lock.expiry_in_seconds, None);
}

#[test]
fn test_lock_feature_missing_typename_every_version() {
    for codec in [WfsCodec::v1_0_0(), WfsCodec::v1_1_0(), WfsCodec::v2_0_0()] {
        let query = format!(
            "SERVICE=WFS&VERSION={}&REQUEST=LockFeature",
            codec.version()
        );
        let err = decode(&codec, kvp(&query)).unwrap_err();
        assert!(
            matches!(err, OwsError::MissingParameter(_)),
            "{}: {:?}",
            codec.version(),
            err
        );
    }
}

#[test]
fn test_lock_feature_1_1_xml_document() {
    let doc = read_request_document("ows-protocol", "wfs11_lock_feature.xml");
    let lock = lock(decode(&WfsCodec::v1_1_0(), xml(doc)).unwrap());

    assert!(lock.lock_all);
    assert_eq!(lock.expiry_in_seconds, Some(300));
    let query = &lock.queries[0];
    assert_eq!(query.type_names[0], fixtures::road());
    assert_eq!(query.selection, QuerySelection::FeatureIds(vec!["r1".into()]));
}

#[test]
fn test_lock_feature_kvp_round_trip() {
    let codec = WfsCodec::v2_0_0();
    let original = decode(
        &codec,
        kvp("SERVICE=WFS&VERSION=2.0.0&REQUEST=LockFeature&TYPENAMES=app:Road\
             &NAMESPACES=xmlns(app,http://example.org/app)&RESOURCEID=r1,r2\
             &LOCKACTION=ALL&EXPIRY=120"),
    )
    .unwrap();

    let encoded = codec.encode_request_kvp(&original).unwrap();
    let decoded = decode(&codec, RawRequest::Kvp(encoded)).unwrap();
    assert_eq!(decoded, original);
}

// ============================================================================
// GetFeature
// ============================================================================

#[test]
fn test_get_feature_soap_document() {
    let doc = read_request_document("ows-protocol", "wfs20_get_feature_soap.xml");
    let request = decode(&WfsCodec::v2_0_0(), xml(doc)).unwrap();

    assert_eq!(request.handle.as_deref(), Some("soap-get"));
    let RequestPayload::GetFeature(get) = request.payload else {
        panic!("expected GetFeature");
    };
    assert_eq!(get.max_features, Some(2));
    assert_eq!(
        get.queries[0].selection,
        QuerySelection::FeatureIds(vec!["r1".into(), "r2".into()])
    );
}

#[test]
fn test_get_feature_missing_typename() {
    let err = decode(
        &WfsCodec::v1_1_0(),
        kvp("SERVICE=WFS&VERSION=1.1.0&REQUEST=GetFeature&MAXFEATURES=3"),
    )
    .unwrap_err();
    assert!(matches!(err, OwsError::MissingParameter(ref p) if p == "TYPENAME"));
}

#[test]
fn test_get_feature_round_trip_every_version() {
    for codec in [WfsCodec::v1_0_0(), WfsCodec::v1_1_0(), WfsCodec::v2_0_0()] {
        let query = format!(
            "SERVICE=WFS&VERSION={}&REQUEST=GetFeature&TYPENAME=(Road)(River)&BBOX=0,0,10,10",
            codec.version()
        );
        let original = decode(&codec, kvp(&query)).unwrap();
        let encoded = codec.encode_request_kvp(&original).unwrap();
        let decoded = decode(&codec, RawRequest::Kvp(encoded)).unwrap();
        assert_eq!(decoded, original, "{}", codec.version());
    }
}

// ============================================================================
// End to end
// ============================================================================

#[test]
fn test_handler_sees_canonical_request_for_each_version() {
    let recording = Recording::new(fixtures::lock_result(&["r1"]));
    let ctx = ServiceContext::new(
        VersionRegistry::with_default_codecs().unwrap(),
        dispatcher(vec![(Protocol::Wfs, "LockFeature", recording.clone() as Arc<dyn Handler>)]),
    );

    let mut v100 = BufferSink::new();
    ctx.process(
        kvp("SERVICE=WFS&VERSION=1.0.0&REQUEST=LockFeature&TYPENAME=Road&FEATUREID=r1&EXPIRY=1"),
        &mut v100,
    );
    let mut v200 = BufferSink::new();
    ctx.process(
        kvp("SERVICE=WFS&VERSION=2.0.0&REQUEST=LockFeature&TYPENAMES=Road&RESOURCEID=r1&EXPIRY=60"),
        &mut v200,
    );

    let requests = recording.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].payload, requests[1].payload);

    assert_xml_contains!(v100.body_str(), "<WFS_LockFeatureResponse", r#"<ogc:FeatureId fid="r1"/>"#);
    assert_xml_contains!(v200.body_str(), r#"lockId="lock-1""#, r#"<fes:ResourceId rid="r1"/>"#);
}

#[test]
fn test_wfs_1_0_fault_is_pre_ows_with_status_200() {
    let ctx = ServiceContext::new(VersionRegistry::with_default_codecs().unwrap(), dispatcher(vec![]));
    let mut sink = BufferSink::new();
    ctx.process(
        kvp("SERVICE=WFS&VERSION=1.0.0&REQUEST=GetFeature"),
        &mut sink,
    );

    let head = sink.head.clone().expect("fault head");
    assert_eq!(head.status, 200);
    assert_eq!(head.content_type, "application/vnd.ogc.se_xml");
    assert_xml_contains!(
        sink.body_str(),
        r#"<ServiceExceptionReport xmlns="http://www.opengis.net/ogc" version="1.2.0">"#,
        r#"code="MissingParameterValue" locator="TYPENAME""#
    );
}
