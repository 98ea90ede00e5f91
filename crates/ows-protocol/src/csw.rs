//! OGC CSW 2.0.2 codec.

use std::io::Write;

use ows_common::{KvpMap, OwsError, OwsResult, Protocol, ProtocolVersion};

use crate::capabilities::{AllowedValues, OwsSections, OwsVersion};
use crate::codec::{
    decode_get_capabilities, encode_get_capabilities_kvp, kvp_header, unencodable, unencodable_request,
    unknown_operation, RequestCodec,
};
use crate::envelope::{RequestBody, RequestEnvelope};
use crate::exceptions::FaultEnvelope;
use crate::namespaces;
use crate::request::{CanonicalRequest, ElementSetName, GetRecordById, RequestPayload};
use crate::response::{Capabilities, CanonicalResponse, Record, RecordsResult};
use crate::xml::XmlWriter;

const OUTPUT_FORMATS: &[&str] = &["application/xml", "text/xml"];

#[derive(Debug, Default)]
pub struct CswCodec;

impl CswCodec {
    pub const VERSION: ProtocolVersion = ProtocolVersion::new(2, 0, 2);

    pub fn new() -> Self {
        Self
    }
}

impl RequestCodec for CswCodec {
    fn protocol(&self) -> Protocol {
        Protocol::Csw
    }

    fn version(&self) -> ProtocolVersion {
        Self::VERSION
    }

    fn decode(&self, envelope: RequestEnvelope) -> OwsResult<CanonicalRequest> {
        let payload = match (envelope.operation.as_str(), &envelope.body) {
            ("GetCapabilities", _) => RequestPayload::GetCapabilities(decode_get_capabilities(&envelope)),
            ("GetRecordById", RequestBody::Kvp(kvp)) => {
                let ids = kvp.list("ID");
                if ids.is_empty() {
                    return Err(OwsError::missing("ID"));
                }
                RequestPayload::GetRecordById(validated(GetRecordById {
                    ids,
                    element_set_name: kvp
                        .get("ELEMENTSETNAME")
                        .map(|v| ElementSetName::parse(v, "ELEMENTSETNAME"))
                        .transpose()?
                        .unwrap_or_default(),
                    output_format: kvp.get("OUTPUTFORMAT").map(str::to_string),
                    output_schema: kvp.get("OUTPUTSCHEMA").map(str::to_string),
                })?)
            }
            ("GetRecordById", RequestBody::Xml(root)) => {
                let ids = root.children_text("Id");
                if ids.is_empty() {
                    return Err(OwsError::missing("Id"));
                }
                RequestPayload::GetRecordById(validated(GetRecordById {
                    ids,
                    element_set_name: root
                        .child_text("ElementSetName")
                        .map(|v| ElementSetName::parse(v, "ElementSetName"))
                        .transpose()?
                        .unwrap_or_default(),
                    output_format: root.attr("outputFormat").map(str::to_string),
                    output_schema: root.attr("outputSchema").map(str::to_string),
                })?)
            }
            _ => return Err(unknown_operation(&envelope)),
        };
        Ok(CanonicalRequest::new(Protocol::Csw, Self::VERSION, envelope.handle, payload))
    }

    fn encode(&self, response: &CanonicalResponse, sink: &mut dyn Write) -> OwsResult<()> {
        match response {
            CanonicalResponse::Capabilities(caps) => write_capabilities(caps, sink),
            CanonicalResponse::Records(result) => write_records(result, sink),
            other => Err(unencodable(self, other)),
        }
    }

    fn fault_envelope(&self) -> FaultEnvelope {
        FaultEnvelope::Ows100 { version: "1.2.0" }
    }

    fn encode_request_kvp(&self, request: &CanonicalRequest) -> OwsResult<KvpMap> {
        let mut kvp = kvp_header(self, request);
        match &request.payload {
            RequestPayload::GetCapabilities(caps) => encode_get_capabilities_kvp(&mut kvp, caps),
            RequestPayload::GetRecordById(get) => {
                kvp.insert("ID", get.ids.join(","));
                kvp.insert("ELEMENTSETNAME", get.element_set_name.as_str());
                if let Some(format) = &get.output_format {
                    kvp.insert("OUTPUTFORMAT", format.as_str());
                }
                if let Some(schema) = &get.output_schema {
                    kvp.insert("OUTPUTSCHEMA", schema.as_str());
                }
            }
            _ => return Err(unencodable_request(self, request)),
        }
        Ok(kvp)
    }
}

/// Only the CSW record schema is produced, as XML.
fn validated(request: GetRecordById) -> OwsResult<GetRecordById> {
    if let Some(format) = &request.output_format {
        if !OUTPUT_FORMATS.contains(&format.as_str()) {
            return Err(OwsError::invalid_value(
                "outputFormat",
                format!("'{}' is not supported", format),
            ));
        }
    }
    if let Some(schema) = &request.output_schema {
        if schema != namespaces::CSW_202 {
            return Err(OwsError::invalid_value(
                "outputSchema",
                format!("'{}' is not supported", schema),
            ));
        }
    }
    Ok(request)
}

fn write_capabilities(caps: &Capabilities, sink: &mut dyn Write) -> OwsResult<()> {
    let mut w = XmlWriter::new(sink);
    w.declaration()?;
    let mut attrs = vec![
        ("xmlns:csw", namespaces::CSW_202),
        ("xmlns:ows", namespaces::OWS_100),
        ("xmlns:ogc", namespaces::OGC),
        ("xmlns:xlink", namespaces::XLINK),
        ("version", "2.0.2"),
    ];
    if let Some(seq) = caps.update_sequence.as_deref() {
        attrs.push(("updateSequence", seq));
    }
    w.start("csw:Capabilities", &attrs)?;

    OwsSections {
        ows: OwsVersion::V100,
        service_type: "CSW",
        versions: &["2.0.2"],
        capabilities: caps,
    }
    .write(
        &mut w,
        &[
            AllowedValues {
                name: "outputFormat",
                values: OUTPUT_FORMATS,
            },
            AllowedValues {
                name: "outputSchema",
                values: &[namespaces::CSW_202],
            },
        ],
    )?;

    if caps.includes("Filter_Capabilities") {
        w.start("ogc:Filter_Capabilities", &[])?;
        w.start("ogc:Spatial_Capabilities", &[])?;
        w.start("ogc:GeometryOperands", &[])?;
        w.simple("ogc:GeometryOperand", "gml:Envelope")?;
        w.end("ogc:GeometryOperands")?;
        w.start("ogc:SpatialOperators", &[])?;
        w.empty("ogc:SpatialOperator", &[("name", "BBOX")])?;
        w.end("ogc:SpatialOperators")?;
        w.end("ogc:Spatial_Capabilities")?;
        w.start("ogc:Id_Capabilities", &[])?;
        w.empty("ogc:EID", &[])?;
        w.end("ogc:Id_Capabilities")?;
        w.end("ogc:Filter_Capabilities")?;
    }

    w.end("csw:Capabilities")?;
    w.finish()
}

fn write_records(result: &RecordsResult, sink: &mut dyn Write) -> OwsResult<()> {
    let mut w = XmlWriter::new(sink);
    w.declaration()?;
    w.start(
        "csw:GetRecordByIdResponse",
        &[
            ("xmlns:csw", namespaces::CSW_202),
            ("xmlns:dc", namespaces::DC),
            ("xmlns:dct", namespaces::DCT),
            ("xmlns:ows", namespaces::OWS_100),
        ],
    )?;

    let element = match result.element_set {
        ElementSetName::Brief => "csw:BriefRecord",
        ElementSetName::Summary => "csw:SummaryRecord",
        ElementSetName::Full => "csw:Record",
    };
    for record in &result.records {
        write_record(&mut w, element, result.element_set, record)?;
    }

    w.end("csw:GetRecordByIdResponse")?;
    w.finish()
}

fn write_record(w: &mut XmlWriter<'_>, element: &str, set: ElementSetName, record: &Record) -> OwsResult<()> {
    w.start(element, &[])?;
    w.simple("dc:identifier", &record.identifier)?;
    w.simple("dc:title", &record.title)?;
    w.simple("dc:type", &record.record_type)?;

    if set != ElementSetName::Brief {
        for subject in &record.subjects {
            w.simple("dc:subject", subject)?;
        }
        w.optional("dct:modified", record.modified.as_deref())?;
        w.optional("dct:abstract", record.abstract_text.as_deref())?;
    }

    if let Some(bbox) = &record.bbox {
        let crs = bbox.crs.as_deref().unwrap_or("urn:ogc:def:crs:EPSG::4326");
        w.start("ows:BoundingBox", &[("crs", crs)])?;
        w.simple("ows:LowerCorner", &bbox.lower_corner())?;
        w.simple("ows:UpperCorner", &bbox.upper_corner())?;
        w.end("ows:BoundingBox")?;
    }
    w.end(element)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::RawRequest;
    use bytes::Bytes;
    use ows_common::BoundingBox;

    fn decode(raw: RawRequest) -> OwsResult<CanonicalRequest> {
        CswCodec::new().decode(RequestEnvelope::read(raw)?)
    }

    fn record() -> Record {
        Record {
            identifier: "rec-1".into(),
            title: "Roads".into(),
            record_type: "dataset".into(),
            abstract_text: Some("Road network".into()),
            subjects: vec!["transport".into()],
            modified: Some("2024-01-01".into()),
            bbox: Some(BoundingBox::new(-10.0, 40.0, 5.0, 52.0)),
        }
    }

    #[test]
    fn test_get_record_by_id_kvp() {
        let kvp = KvpMap::parse("SERVICE=CSW&REQUEST=GetRecordById&VERSION=2.0.2&ID=a,b&ELEMENTSETNAME=full").unwrap();
        let request = decode(RawRequest::Kvp(kvp)).unwrap();
        let RequestPayload::GetRecordById(get) = request.payload else {
            panic!("expected GetRecordById");
        };
        assert_eq!(get.ids, vec!["a", "b"]);
        assert_eq!(get.element_set_name, ElementSetName::Full);
    }

    #[test]
    fn test_get_record_by_id_missing_id() {
        let kvp = KvpMap::parse("SERVICE=CSW&REQUEST=GetRecordById&VERSION=2.0.2").unwrap();
        assert!(matches!(
            decode(RawRequest::Kvp(kvp)).unwrap_err(),
            OwsError::MissingParameter(ref p) if p == "ID"
        ));
    }

    #[test]
    fn test_unsupported_output_schema() {
        let doc = r#"<csw:GetRecordById xmlns:csw="http://www.opengis.net/cat/csw/2.0.2" service="CSW" version="2.0.2"
                outputSchema="http://www.isotc211.org/2005/gmd">
              <csw:Id>rec-1</csw:Id>
            </csw:GetRecordById>"#;
        let err = decode(RawRequest::Xml(Bytes::from(doc))).unwrap_err();
        assert!(matches!(err, OwsError::InvalidParameterValue { ref param, .. } if param == "outputSchema"));
    }

    #[test]
    fn test_brief_records_omit_summary_fields() {
        let render = |set| {
            let mut out = Vec::new();
            CswCodec::new()
                .encode(
                    &CanonicalResponse::Records(RecordsResult {
                        element_set: set,
                        records: vec![record()],
                    }),
                    &mut out,
                )
                .unwrap();
            String::from_utf8(out).unwrap()
        };

        let brief = render(ElementSetName::Brief);
        assert!(brief.contains("<csw:BriefRecord>"));
        assert!(!brief.contains("dc:subject"));

        let summary = render(ElementSetName::Summary);
        assert!(summary.contains("<dc:subject>transport</dc:subject>"));
        assert!(summary.contains("<ows:LowerCorner>-10 40</ows:LowerCorner>"));
    }
}
