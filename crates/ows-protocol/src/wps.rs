//! OGC WPS 1.0.0 codec.

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
use crate::request::{
    CanonicalRequest, DataInput, DescribeProcess, Execute, InputValue, RequestPayload, ResponseForm,
};
use crate::response::{
    Capabilities, CanonicalResponse, CapabilitiesContents, ExecuteResult, ParameterDescription,
    ProcessDescription, ProcessStatus,
};
use crate::xml::{XmlElement, XmlWriter};

#[derive(Debug, Default)]
pub struct WpsCodec;

impl WpsCodec {
    pub const VERSION: ProtocolVersion = ProtocolVersion::new(1, 0, 0);

    pub fn new() -> Self {
        Self
    }
}

impl RequestCodec for WpsCodec {
    fn protocol(&self) -> Protocol {
        Protocol::Wps
    }

    fn version(&self) -> ProtocolVersion {
        Self::VERSION
    }

    fn decode(&self, envelope: RequestEnvelope) -> OwsResult<CanonicalRequest> {
        let payload = match (envelope.operation.as_str(), &envelope.body) {
            ("GetCapabilities", _) => RequestPayload::GetCapabilities(decode_get_capabilities(&envelope)),
            ("DescribeProcess", RequestBody::Kvp(kvp)) => RequestPayload::DescribeProcess(DescribeProcess {
                identifiers: required_list(kvp.list("IDENTIFIER"), "IDENTIFIER")?,
            }),
            ("DescribeProcess", RequestBody::Xml(root)) => RequestPayload::DescribeProcess(DescribeProcess {
                identifiers: required_list(root.children_text("Identifier"), "Identifier")?,
            }),
            ("Execute", RequestBody::Kvp(kvp)) => RequestPayload::Execute(execute_from_kvp(kvp)?),
            ("Execute", RequestBody::Xml(root)) => RequestPayload::Execute(execute_from_xml(root)?),
            _ => return Err(unknown_operation(&envelope)),
        };
        Ok(CanonicalRequest::new(Protocol::Wps, Self::VERSION, envelope.handle, payload))
    }

    fn encode(&self, response: &CanonicalResponse, sink: &mut dyn Write) -> OwsResult<()> {
        match response {
            CanonicalResponse::Capabilities(caps) => write_capabilities(caps, sink),
            CanonicalResponse::ProcessDescriptions(processes) => write_descriptions(processes, sink),
            CanonicalResponse::ExecuteResponse(result) => write_execute_response(result, sink),
            CanonicalResponse::Document(doc) => write_document(doc, sink),
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
            RequestPayload::DescribeProcess(describe) => {
                kvp.insert("IDENTIFIER", describe.identifiers.join(","));
            }
            RequestPayload::Execute(execute) => encode_execute_kvp(&mut kvp, execute)?,
            _ => return Err(unencodable_request(self, request)),
        }
        Ok(kvp)
    }
}

fn required_list(values: Vec<String>, param: &str) -> OwsResult<Vec<String>> {
    if values.is_empty() {
        return Err(OwsError::missing(param));
    }
    Ok(values)
}

// === KVP ===

fn execute_from_kvp(kvp: &KvpMap) -> OwsResult<Execute> {
    let inputs = match kvp.get("DATAINPUTS") {
        Some(raw) => parse_data_inputs(raw)?,
        None => Vec::new(),
    };

    let response_form = match (kvp.get("RESPONSEDOCUMENT"), kvp.get("RAWDATAOUTPUT")) {
        (Some(_), Some(_)) => {
            return Err(OwsError::invalid_value(
                "RawDataOutput",
                "ResponseDocument and RawDataOutput are mutually exclusive",
            ))
        }
        (None, Some(raw)) => ResponseForm::Raw {
            output: strip_attributes(raw).to_string(),
        },
        (document, None) => ResponseForm::Document {
            store: kvp.flag("STOREEXECUTERESPONSE")?.unwrap_or(false),
            status: kvp.flag("STATUS")?.unwrap_or(false),
            lineage: kvp.flag("LINEAGE")?.unwrap_or(false),
            outputs: document
                .map(|doc| {
                    doc.split(';')
                        .map(strip_attributes)
                        .filter(|id| !id.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        },
    };

    Ok(Execute {
        identifier: kvp.require("IDENTIFIER")?.to_string(),
        inputs,
        response_form,
    })
}

/// Output identifier without its `@attribute=value` suffixes.
fn strip_attributes(value: &str) -> &str {
    value.split('@').next().unwrap_or("").trim()
}

/// Parse `DataInputs=id=value@attr=v;id2=@xlink:href=http://...`.
pub fn parse_data_inputs(raw: &str) -> OwsResult<Vec<DataInput>> {
    raw.split(';')
        .filter(|entry| !entry.trim().is_empty())
        .map(|entry| {
            let (identifier, rest) = entry.split_once('=').ok_or_else(|| {
                OwsError::invalid_value("DataInputs", format!("'{}' is not of the form id=value", entry))
            })?;
            let identifier = identifier.trim();
            if identifier.is_empty() {
                return Err(OwsError::invalid_value("DataInputs", "empty input identifier"));
            }

            let mut parts = rest.split('@');
            let value = parts.next().unwrap_or("").to_string();
            let mut attributes = Vec::new();
            let mut href = None;
            for attribute in parts {
                let (name, attr_value) = attribute.split_once('=').ok_or_else(|| {
                    OwsError::invalid_value("DataInputs", format!("attribute '{}' has no value", attribute))
                })?;
                if name.eq_ignore_ascii_case("xlink:href") || name.eq_ignore_ascii_case("href") {
                    href = Some(attr_value.to_string());
                } else {
                    attributes.push((name.to_string(), attr_value.to_string()));
                }
            }

            let value = match href {
                Some(href) => InputValue::Reference { href, attributes },
                None => InputValue::Literal { value, attributes },
            };
            Ok(DataInput {
                identifier: identifier.to_string(),
                value,
            })
        })
        .collect()
}

fn encode_execute_kvp(kvp: &mut KvpMap, execute: &Execute) -> OwsResult<()> {
    kvp.insert("IDENTIFIER", execute.identifier.as_str());

    let mut entries = Vec::with_capacity(execute.inputs.len());
    for input in &execute.inputs {
        let entry = match &input.value {
            InputValue::Literal { value, attributes } => {
                format!("{}={}{}", input.identifier, value, attribute_suffix(attributes))
            }
            InputValue::Reference { href, attributes } => format!(
                "{}=@xlink:href={}{}",
                input.identifier,
                href,
                attribute_suffix(attributes)
            ),
            InputValue::Complex { .. } => {
                return Err(OwsError::invalid_value(
                    "DataInputs",
                    format!("complex input '{}' has no KVP encoding", input.identifier),
                ))
            }
        };
        entries.push(entry);
    }
    kvp.insert("DATAINPUTS", entries.join(";"));

    match &execute.response_form {
        ResponseForm::Raw { output } => kvp.insert("RAWDATAOUTPUT", output.as_str()),
        ResponseForm::Document {
            store,
            status,
            lineage,
            outputs,
        } => {
            kvp.insert("RESPONSEDOCUMENT", outputs.join(";"));
            for (key, set) in [("STOREEXECUTERESPONSE", store), ("STATUS", status), ("LINEAGE", lineage)] {
                if *set {
                    kvp.insert(key, "true");
                }
            }
        }
    }
    Ok(())
}

fn attribute_suffix(attributes: &[(String, String)]) -> String {
    attributes
        .iter()
        .map(|(name, value)| format!("@{}={}", name, value))
        .collect()
}

// === XML ===

fn execute_from_xml(root: &XmlElement) -> OwsResult<Execute> {
    let identifier = root
        .child_text("Identifier")
        .ok_or_else(|| OwsError::missing("Identifier"))?
        .to_string();

    let mut inputs = Vec::new();
    if let Some(data_inputs) = root.child("DataInputs") {
        for input in data_inputs.children_named("Input") {
            inputs.push(input_from_xml(input)?);
        }
    }

    let response_form = match root.child("ResponseForm") {
        None => ResponseForm::default(),
        Some(form) => match (form.child("ResponseDocument"), form.child("RawDataOutput")) {
            (Some(_), Some(_)) => {
                return Err(OwsError::invalid_value(
                    "ResponseForm",
                    "ResponseDocument and RawDataOutput are mutually exclusive",
                ))
            }
            (None, Some(raw)) => ResponseForm::Raw {
                output: raw
                    .child_text("Identifier")
                    .ok_or_else(|| OwsError::missing("Identifier"))?
                    .to_string(),
            },
            (Some(doc), None) => ResponseForm::Document {
                store: xml_flag(doc, "storeExecuteResponse")?,
                status: xml_flag(doc, "status")?,
                lineage: xml_flag(doc, "lineage")?,
                outputs: doc
                    .children_named("Output")
                    .filter_map(|o| o.child_text("Identifier"))
                    .map(str::to_string)
                    .collect(),
            },
            (None, None) => ResponseForm::default(),
        },
    };

    Ok(Execute {
        identifier,
        inputs,
        response_form,
    })
}

fn input_from_xml(input: &XmlElement) -> OwsResult<DataInput> {
    let identifier = input
        .child_text("Identifier")
        .ok_or_else(|| OwsError::missing("Identifier"))?
        .to_string();

    let value = if let Some(reference) = input.child("Reference") {
        let href = reference
            .attr_ns(namespaces::XLINK, "href")
            .or_else(|| reference.attr("href"))
            .ok_or_else(|| OwsError::missing("href"))?;
        InputValue::Reference {
            href: href.to_string(),
            attributes: plain_attributes(reference, &["href"]),
        }
    } else {
        let data = input.child("Data").ok_or_else(|| OwsError::missing("Data"))?;
        if let Some(literal) = data.child("LiteralData") {
            InputValue::Literal {
                value: literal.text().to_string(),
                attributes: plain_attributes(literal, &[]),
            }
        } else if let Some(complex) = data.child("ComplexData") {
            let xml = match complex.elements().next() {
                Some(content) => content.to_xml_string()?,
                None => complex.text().to_string(),
            };
            InputValue::Complex { xml }
        } else {
            return Err(OwsError::invalid_value(
                identifier.as_str(),
                "Data holds neither LiteralData nor ComplexData",
            ));
        }
    };

    Ok(DataInput { identifier, value })
}

fn plain_attributes(element: &XmlElement, skip: &[&str]) -> Vec<(String, String)> {
    element
        .attributes
        .iter()
        .filter(|a| a.namespace.is_none() && !skip.contains(&a.local_name.as_str()))
        .map(|a| (a.local_name.clone(), a.value.clone()))
        .collect()
}

fn xml_flag(element: &XmlElement, name: &str) -> OwsResult<bool> {
    match element.attr(name) {
        None => Ok(false),
        Some("true") | Some("1") => Ok(true),
        Some("false") | Some("0") => Ok(false),
        Some(other) => Err(OwsError::invalid_value(name, format!("'{}' is not a boolean", other))),
    }
}

// === Responses ===

fn write_capabilities(caps: &Capabilities, sink: &mut dyn Write) -> OwsResult<()> {
    let mut w = XmlWriter::new(sink);
    w.declaration()?;
    let mut attrs = vec![
        ("xmlns:wps", namespaces::WPS_100),
        ("xmlns:ows", namespaces::OWS_110),
        ("xmlns:xlink", namespaces::XLINK),
        ("service", "WPS"),
        ("version", "1.0.0"),
        ("xml:lang", "en-US"),
    ];
    if let Some(seq) = caps.update_sequence.as_deref() {
        attrs.push(("updateSequence", seq));
    }
    w.start("wps:Capabilities", &attrs)?;

    OwsSections {
        ows: OwsVersion::V110,
        service_type: "WPS",
        versions: &["1.0.0"],
        capabilities: caps,
    }
    .write(
        &mut w,
        &[AllowedValues {
            name: "language",
            values: &["en-US"],
        }],
    )?;

    if caps.includes("ProcessOfferings") || caps.includes("Contents") {
        w.start("wps:ProcessOfferings", &[])?;
        if let CapabilitiesContents::Processes(processes) = &caps.contents {
            for process in processes {
                w.start("wps:Process", &[("wps:processVersion", process.process_version.as_str())])?;
                w.simple("ows:Identifier", &process.identifier)?;
                w.simple("ows:Title", &process.title)?;
                w.optional("ows:Abstract", process.abstract_text.as_deref())?;
                w.end("wps:Process")?;
            }
        }
        w.end("wps:ProcessOfferings")?;
    }

    w.start("wps:Languages", &[])?;
    w.start("wps:Default", &[])?;
    w.simple("ows:Language", "en-US")?;
    w.end("wps:Default")?;
    w.start("wps:Supported", &[])?;
    w.simple("ows:Language", "en-US")?;
    w.end("wps:Supported")?;
    w.end("wps:Languages")?;

    w.end("wps:Capabilities")?;
    w.finish()
}

fn write_descriptions(processes: &[ProcessDescription], sink: &mut dyn Write) -> OwsResult<()> {
    let mut w = XmlWriter::new(sink);
    w.declaration()?;
    w.start(
        "wps:ProcessDescriptions",
        &[
            ("xmlns:wps", namespaces::WPS_100),
            ("xmlns:ows", namespaces::OWS_110),
            ("service", "WPS"),
            ("version", "1.0.0"),
            ("xml:lang", "en-US"),
        ],
    )?;

    for process in processes {
        let store = if process.store_supported { "true" } else { "false" };
        let status = if process.status_supported { "true" } else { "false" };
        w.start(
            "ProcessDescription",
            &[
                ("wps:processVersion", process.brief.process_version.as_str()),
                ("storeSupported", store),
                ("statusSupported", status),
            ],
        )?;
        w.simple("ows:Identifier", &process.brief.identifier)?;
        w.simple("ows:Title", &process.brief.title)?;
        w.optional("ows:Abstract", process.brief.abstract_text.as_deref())?;

        w.start("DataInputs", &[])?;
        for input in &process.inputs {
            let min = input.min_occurs.to_string();
            let max = input.max_occurs.to_string();
            w.start("Input", &[("minOccurs", min.as_str()), ("maxOccurs", max.as_str())])?;
            write_parameter(&mut w, input, "LiteralData")?;
            w.empty("ows:AnyValue", &[])?;
            w.end("LiteralData")?;
            w.end("Input")?;
        }
        w.end("DataInputs")?;

        w.start("ProcessOutputs", &[])?;
        for output in &process.outputs {
            w.start("Output", &[])?;
            write_parameter(&mut w, output, "LiteralOutput")?;
            w.end("LiteralOutput")?;
            w.end("Output")?;
        }
        w.end("ProcessOutputs")?;

        w.end("ProcessDescription")?;
    }

    w.end("wps:ProcessDescriptions")?;
    w.finish()
}

/// Identifier and title, then opens the literal element and writes its
/// data type. The caller closes `literal`.
fn write_parameter(w: &mut XmlWriter<'_>, param: &ParameterDescription, literal: &str) -> OwsResult<()> {
    w.simple("ows:Identifier", &param.identifier)?;
    w.simple("ows:Title", &param.title)?;
    w.start(literal, &[])?;
    let reference = format!("http://www.w3.org/TR/xmlschema-2/#{}", param.data_type);
    w.text_element(
        "ows:DataType",
        &[("ows:reference", reference.as_str())],
        &param.data_type,
    )
}

fn write_execute_response(result: &ExecuteResult, sink: &mut dyn Write) -> OwsResult<()> {
    let mut w = XmlWriter::new(sink);
    w.declaration()?;
    w.start(
        "wps:ExecuteResponse",
        &[
            ("xmlns:wps", namespaces::WPS_100),
            ("xmlns:ows", namespaces::OWS_110),
            ("xmlns:xlink", namespaces::XLINK),
            ("service", "WPS"),
            ("version", "1.0.0"),
            ("xml:lang", "en-US"),
        ],
    )?;

    w.start(
        "wps:Process",
        &[("wps:processVersion", result.process.process_version.as_str())],
    )?;
    w.simple("ows:Identifier", &result.process.identifier)?;
    w.simple("ows:Title", &result.process.title)?;
    w.end("wps:Process")?;

    w.start("wps:Status", &[("creationTime", result.creation_time.as_str())])?;
    match &result.status {
        ProcessStatus::Succeeded(message) => w.simple("wps:ProcessSucceeded", message)?,
        ProcessStatus::Failed(message) => {
            w.start("wps:ProcessFailed", &[])?;
            w.start("ows:ExceptionReport", &[("version", "1.0.0")])?;
            w.start("ows:Exception", &[("exceptionCode", "NoApplicableCode")])?;
            w.simple("ows:ExceptionText", message)?;
            w.end("ows:Exception")?;
            w.end("ows:ExceptionReport")?;
            w.end("wps:ProcessFailed")?;
        }
    }
    w.end("wps:Status")?;

    if let Some(lineage) = &result.lineage {
        w.start("wps:DataInputs", &[])?;
        for (identifier, value) in lineage {
            w.start("wps:Input", &[])?;
            w.simple("ows:Identifier", identifier)?;
            w.start("wps:Data", &[])?;
            w.simple("wps:LiteralData", value)?;
            w.end("wps:Data")?;
            w.end("wps:Input")?;
        }
        w.end("wps:DataInputs")?;
    }

    if !result.outputs.is_empty() {
        w.start("wps:ProcessOutputs", &[])?;
        for output in &result.outputs {
            w.start("wps:Output", &[])?;
            w.simple("ows:Identifier", &output.identifier)?;
            w.simple("ows:Title", &output.title)?;
            w.start("wps:Data", &[])?;
            w.text_element(
                "wps:LiteralData",
                &[("dataType", output.data_type.as_str())],
                &output.value,
            )?;
            w.end("wps:Data")?;
            w.end("wps:Output")?;
        }
        w.end("wps:ProcessOutputs")?;
    }

    w.end("wps:ExecuteResponse")?;
    w.finish()
}
