//! OGC SOS 1.0.0 codec.

use std::io::Write;

use ows_common::{KvpMap, OwsError, OwsResult, Protocol, ProtocolVersion};

use crate::capabilities::{AllowedValues, OwsSections, OwsVersion};
use crate::codec::{
    decode_get_capabilities, encode_get_capabilities_kvp, kvp_header, unencodable, unencodable_request,
    unknown_operation, write_document, RequestCodec,
};
use crate::envelope::{RequestBody, RequestEnvelope};
use crate::exceptions::FaultEnvelope;
use crate::namespaces;
use crate::request::{CanonicalRequest, DescribeSensor, GetObservation, RequestPayload};
use crate::response::{
    Capabilities, CanonicalResponse, CapabilitiesContents, ObservationCollection, OfferingInfo,
};
use crate::xml::{XmlElement, XmlWriter};

#[derive(Debug, Default)]
pub struct SosCodec;

impl SosCodec {
    pub const VERSION: ProtocolVersion = ProtocolVersion::new(1, 0, 0);

    pub fn new() -> Self {
        Self
    }
}

impl RequestCodec for SosCodec {
    fn protocol(&self) -> Protocol {
        Protocol::Sos
    }

    fn version(&self) -> ProtocolVersion {
        Self::VERSION
    }

    fn decode(&self, envelope: RequestEnvelope) -> OwsResult<CanonicalRequest> {
        let payload = match (envelope.operation.as_str(), &envelope.body) {
            ("GetCapabilities", _) => RequestPayload::GetCapabilities(decode_get_capabilities(&envelope)),
            ("DescribeSensor", RequestBody::Kvp(kvp)) => RequestPayload::DescribeSensor(DescribeSensor {
                procedure: kvp.require("PROCEDURE")?.to_string(),
                output_format: kvp.require("OUTPUTFORMAT")?.to_string(),
            }),
            ("DescribeSensor", RequestBody::Xml(root)) => RequestPayload::DescribeSensor(DescribeSensor {
                procedure: required_text(root, "procedure")?,
                output_format: root
                    .attr("outputFormat")
                    .map(str::to_string)
                    .ok_or_else(|| OwsError::missing("outputFormat"))?,
            }),
            ("GetObservation", RequestBody::Kvp(kvp)) => RequestPayload::GetObservation(observation_from_kvp(kvp)?),
            ("GetObservation", RequestBody::Xml(root)) => RequestPayload::GetObservation(observation_from_xml(root)?),
            _ => return Err(unknown_operation(&envelope)),
        };
        Ok(CanonicalRequest::new(Protocol::Sos, Self::VERSION, envelope.handle, payload))
    }

    fn encode(&self, response: &CanonicalResponse, sink: &mut dyn Write) -> OwsResult<()> {
        match response {
            CanonicalResponse::Capabilities(caps) => write_capabilities(caps, sink),
            CanonicalResponse::Document(doc) => write_document(doc, sink),
            CanonicalResponse::Observations(collection) => write_observations(collection, sink),
            other => Err(unencodable(self, other)),
        }
    }

    fn fault_envelope(&self) -> FaultEnvelope {
        FaultEnvelope::Ows110 { version: "1.0.0" }
    }

    fn encode_request_kvp(&self, request: &CanonicalRequest) -> OwsResult<KvpMap> {
        let mut kvp = kvp_header(self, request);
        match &request.payload {
            RequestPayload::GetCapabilities(caps) => encode_get_capabilities_kvp(&mut kvp, caps),
            RequestPayload::DescribeSensor(describe) => {
                kvp.insert("PROCEDURE", describe.procedure.as_str());
                kvp.insert("OUTPUTFORMAT", describe.output_format.as_str());
            }
            RequestPayload::GetObservation(obs) => {
                kvp.insert("OFFERING", obs.offering.as_str());
                kvp.insert("OBSERVEDPROPERTY", obs.observed_properties.join(","));
                kvp.insert("PROCEDURE", obs.procedures.join(","));
                if let Some(time) = &obs.event_time {
                    kvp.insert("EVENTTIME", time.as_str());
                }
                kvp.insert("FEATUREOFINTEREST", obs.features_of_interest.join(","));
                kvp.insert("RESPONSEFORMAT", obs.response_format.as_str());
                if let Some(model) = &obs.result_model {
                    kvp.insert("RESULTMODEL", model.as_str());
                }
                if let Some(mode) = &obs.response_mode {
                    kvp.insert("RESPONSEMODE", mode.as_str());
                }
                if let Some(srs) = &obs.srs_name {
                    kvp.insert("SRSNAME", srs.as_str());
                }
            }
            _ => return Err(unencodable_request(self, request)),
        }
        Ok(kvp)
    }
}

fn required_text(element: &XmlElement, name: &str) -> OwsResult<String> {
    element
        .child_text(name)
        .map(str::to_string)
        .ok_or_else(|| OwsError::missing(name))
}

fn observation_from_kvp(kvp: &KvpMap) -> OwsResult<GetObservation> {
    let observed_properties = kvp.list("OBSERVEDPROPERTY");
    if observed_properties.is_empty() {
        return Err(OwsError::missing("OBSERVEDPROPERTY"));
    }

    Ok(GetObservation {
        offering: kvp.require("OFFERING")?.to_string(),
        observed_properties,
        procedures: kvp.list("PROCEDURE"),
        event_time: kvp.get("EVENTTIME").map(str::to_string),
        features_of_interest: kvp.list("FEATUREOFINTEREST"),
        response_format: kvp.require("RESPONSEFORMAT")?.to_string(),
        result_model: kvp.get("RESULTMODEL").map(str::to_string),
        response_mode: kvp.get("RESPONSEMODE").map(str::to_string),
        srs_name: kvp.get("SRSNAME").map(str::to_string),
    })
}

fn observation_from_xml(root: &XmlElement) -> OwsResult<GetObservation> {
    let observed_properties = root.children_text("observedProperty");
    if observed_properties.is_empty() {
        return Err(OwsError::missing("observedProperty"));
    }

    let features_of_interest = root
        .child("featureOfInterest")
        .map(|foi| foi.children_text("ObjectID"))
        .unwrap_or_default();

    Ok(GetObservation {
        offering: required_text(root, "offering")?,
        observed_properties,
        procedures: root.children_text("procedure"),
        event_time: root.child("eventTime").map(event_time_from_xml).transpose()?,
        features_of_interest,
        response_format: required_text(root, "responseFormat")?,
        result_model: root.child_text("resultModel").map(str::to_string),
        response_mode: root.child_text("responseMode").map(str::to_string),
        srs_name: root.attr("srsName").map(str::to_string),
    })
}

/// `ogc:TM_Equals/gml:TimeInstant` becomes an instant, `ogc:TM_During/
/// gml:TimePeriod` a `begin/end` period.
fn event_time_from_xml(event_time: &XmlElement) -> OwsResult<String> {
    let operator = event_time
        .elements()
        .next()
        .ok_or_else(|| OwsError::invalid_value("eventTime", "empty temporal filter"))?;

    if let Some(instant) = operator.child("TimeInstant") {
        return instant
            .child_text("timePosition")
            .map(str::to_string)
            .ok_or_else(|| OwsError::missing("timePosition"));
    }
    if let Some(period) = operator.child("TimePeriod") {
        let begin = period
            .child_text("beginPosition")
            .ok_or_else(|| OwsError::missing("beginPosition"))?;
        let end = period
            .child_text("endPosition")
            .ok_or_else(|| OwsError::missing("endPosition"))?;
        return Ok(format!("{}/{}", begin, end));
    }
    Err(OwsError::invalid_value(
        "eventTime",
        format!("unsupported temporal operand in {}", operator.local_name),
    ))
}

fn write_capabilities(caps: &Capabilities, sink: &mut dyn Write) -> OwsResult<()> {
    let mut w = XmlWriter::new(sink);
    w.declaration()?;
    let mut attrs = vec![
        ("xmlns:sos", namespaces::SOS_100),
        ("xmlns:ows", namespaces::OWS_110),
        ("xmlns:gml", namespaces::GML),
        ("xmlns:xlink", namespaces::XLINK),
        ("version", "1.0.0"),
    ];
    if let Some(seq) = caps.update_sequence.as_deref() {
        attrs.push(("updateSequence", seq));
    }
    w.start("sos:Capabilities", &attrs)?;

    OwsSections {
        ows: OwsVersion::V110,
        service_type: "OGC:SOS",
        versions: &["1.0.0"],
        capabilities: caps,
    }
    .write(
        &mut w,
        &[AllowedValues {
            name: "service",
            values: &["SOS"],
        }],
    )?;

    if caps.includes("Contents") {
        w.start("sos:Contents", &[])?;
        w.start("sos:ObservationOfferingList", &[])?;
        if let CapabilitiesContents::Offerings(offerings) = &caps.contents {
            for offering in offerings {
                write_offering(&mut w, offering)?;
            }
        }
        w.end("sos:ObservationOfferingList")?;
        w.end("sos:Contents")?;
    }

    w.end("sos:Capabilities")?;
    w.finish()
}

fn write_offering(w: &mut XmlWriter<'_>, offering: &OfferingInfo) -> OwsResult<()> {
    w.start("sos:ObservationOffering", &[("gml:id", offering.identifier.as_str())])?;
    w.simple("gml:name", &offering.name)?;
    if let Some(bbox) = &offering.bbox {
        let srs = bbox.crs.as_deref().unwrap_or("urn:ogc:def:crs:EPSG::4326");
        w.start("gml:boundedBy", &[])?;
        w.start("gml:Envelope", &[("srsName", srs)])?;
        w.simple("gml:lowerCorner", &bbox.lower_corner())?;
        w.simple("gml:upperCorner", &bbox.upper_corner())?;
        w.end("gml:Envelope")?;
        w.end("gml:boundedBy")?;
    }
    if offering.time_begin.is_some() || offering.time_end.is_some() {
        w.start("sos:time", &[])?;
        w.start("gml:TimePeriod", &[])?;
        w.simple("gml:beginPosition", offering.time_begin.as_deref().unwrap_or(""))?;
        w.simple("gml:endPosition", offering.time_end.as_deref().unwrap_or(""))?;
        w.end("gml:TimePeriod")?;
        w.end("sos:time")?;
    }
    for procedure in &offering.procedures {
        w.empty("sos:procedure", &[("xlink:href", procedure.as_str())])?;
    }
    for property in &offering.observed_properties {
        w.empty("sos:observedProperty", &[("xlink:href", property.as_str())])?;
    }
    for foi in &offering.features_of_interest {
        w.empty("sos:featureOfInterest", &[("xlink:href", foi.as_str())])?;
    }
    for format in &offering.response_formats {
        w.simple("sos:responseFormat", format)?;
    }
    w.end("sos:ObservationOffering")
}

fn write_observations(collection: &ObservationCollection, sink: &mut dyn Write) -> OwsResult<()> {
    let mut w = XmlWriter::new(sink);
    w.declaration()?;
    w.start(
        "om:ObservationCollection",
        &[
            ("xmlns:om", namespaces::OM_100),
            ("xmlns:gml", namespaces::GML),
            ("xmlns:swe", namespaces::SWE_101),
            ("xmlns:xlink", namespaces::XLINK),
            ("xmlns:xsi", namespaces::XSI),
            ("gml:id", collection.offering.as_str()),
        ],
    )?;

    if collection.observations.is_empty() {
        w.empty("om:member", &[("xlink:href", "urn:ogc:def:nil:OGC:inapplicable")])?;
    }
    for obs in &collection.observations {
        w.start("om:member", &[])?;
        w.start("om:Observation", &[])?;
        w.start("om:samplingTime", &[])?;
        w.start("gml:TimeInstant", &[])?;
        w.simple("gml:timePosition", &obs.sampling_time)?;
        w.end("gml:TimeInstant")?;
        w.end("om:samplingTime")?;
        w.empty("om:procedure", &[("xlink:href", obs.procedure.as_str())])?;
        w.empty("om:observedProperty", &[("xlink:href", obs.observed_property.as_str())])?;
        w.empty("om:featureOfInterest", &[("xlink:href", obs.feature_of_interest.as_str())])?;
        w.text_element(
            "om:result",
            &[("xsi:type", "gml:MeasureType"), ("uom", obs.uom.as_str())],
            &obs.value.to_string(),
        )?;
        w.end("om:Observation")?;
        w.end("om:member")?;
    }

    w.end("om:ObservationCollection")?;
    w.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::RawRequest;
    use crate::response::Observation;
    use bytes::Bytes;

    fn decode(raw: RawRequest) -> OwsResult<CanonicalRequest> {
        SosCodec::new().decode(RequestEnvelope::read(raw)?)
    }

    #[test]
    fn test_describe_sensor_xml() {
        let doc = r#"<DescribeSensor xmlns="http://www.opengis.net/sos/1.0" service="SOS" version="1.0.0"
                outputFormat="text/xml;subtype=&quot;sensorML/1.0.1&quot;">
              <procedure>urn:ogc:object:Sensor:latlon:foobarnator</procedure>
            </DescribeSensor>"#;
        let request = decode(RawRequest::Xml(Bytes::from(doc))).unwrap();
        assert_eq!(
            request.payload,
            RequestPayload::DescribeSensor(DescribeSensor {
                procedure: "urn:ogc:object:Sensor:latlon:foobarnator".into(),
                output_format: "text/xml;subtype=\"sensorML/1.0.1\"".into(),
            })
        );
    }

    #[test]
    fn test_describe_sensor_missing_procedure() {
        let kvp = KvpMap::parse("SERVICE=SOS&REQUEST=DescribeSensor&VERSION=1.0.0&OUTPUTFORMAT=text/xml").unwrap();
        assert!(matches!(
            decode(RawRequest::Kvp(kvp)).unwrap_err(),
            OwsError::MissingParameter(ref p) if p == "PROCEDURE"
        ));
    }

    #[test]
    fn test_get_observation_xml_period() {
        let doc = r#"<GetObservation xmlns="http://www.opengis.net/sos/1.0" xmlns:ogc="http://www.opengis.net/ogc"
                xmlns:gml="http://www.opengis.net/gml" service="SOS" version="1.0.0" srsName="EPSG:4326">
              <offering>WEATHER</offering>
              <eventTime>
                <ogc:TM_During>
                  <ogc:PropertyName>om:samplingTime</ogc:PropertyName>
                  <gml:TimePeriod>
                    <gml:beginPosition>2024-01-01T00:00:00Z</gml:beginPosition>
                    <gml:endPosition>2024-01-02T00:00:00Z</gml:endPosition>
                  </gml:TimePeriod>
                </ogc:TM_During>
              </eventTime>
              <observedProperty>urn:ogc:def:property:temperature</observedProperty>
              <responseFormat>text/xml;subtype="om/1.0.0"</responseFormat>
            </GetObservation>"#;
        let request = decode(RawRequest::Xml(Bytes::from(doc))).unwrap();
        let RequestPayload::GetObservation(obs) = request.payload else {
            panic!("expected GetObservation");
        };
        assert_eq!(obs.offering, "WEATHER");
        assert_eq!(obs.event_time.as_deref(), Some("2024-01-01T00:00:00Z/2024-01-02T00:00:00Z"));
        assert_eq!(obs.srs_name.as_deref(), Some("EPSG:4326"));
        assert!(obs.procedures.is_empty());
    }

    #[test]
    fn test_get_observation_requires_observed_property() {
        let kvp = KvpMap::parse(
            "SERVICE=SOS&REQUEST=GetObservation&VERSION=1.0.0&OFFERING=WEATHER&RESPONSEFORMAT=text/xml",
        )
        .unwrap();
        assert!(matches!(
            decode(RawRequest::Kvp(kvp)).unwrap_err(),
            OwsError::MissingParameter(ref p) if p == "OBSERVEDPROPERTY"
        ));
    }

    #[test]
    fn test_observation_encoding() {
        let collection = ObservationCollection {
            offering: "WEATHER".into(),
            observations: vec![Observation {
                procedure: "urn:ogc:object:Sensor:latlon:foobarnator".into(),
                observed_property: "urn:ogc:def:property:temperature".into(),
                feature_of_interest: "station-1".into(),
                sampling_time: "2024-01-01T00:00:00Z".into(),
                value: 21.5,
                uom: "Cel".into(),
            }],
        };
        let mut out = Vec::new();
        SosCodec::new()
            .encode(&CanonicalResponse::Observations(collection), &mut out)
            .unwrap();
        let xml = String::from_utf8(out).unwrap();
        assert!(xml.contains(r#"<om:result xsi:type="gml:MeasureType" uom="Cel">21.5</om:result>"#));
        assert!(xml.contains("<gml:timePosition>2024-01-01T00:00:00Z</gml:timePosition>"));
    }
}
