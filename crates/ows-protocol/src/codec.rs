//! The per protocol-version codec contract.

use std::io::Write;

use ows_common::{KvpMap, OwsError, OwsFault, OwsResult, Protocol, ProtocolVersion};

use crate::envelope::{RequestBody, RequestEnvelope};
use crate::exceptions::FaultEnvelope;
use crate::request::{CanonicalRequest, GetCapabilities};
use crate::response::{CanonicalResponse, Document};

/// Translates between one protocol version's wire syntax and the canonical
/// model.
pub trait RequestCodec: Send + Sync {
    fn protocol(&self) -> Protocol;

    fn version(&self) -> ProtocolVersion;

    /// Decode the body of a request whose version was negotiated to
    /// [`RequestCodec::version`].
    fn decode(&self, envelope: RequestEnvelope) -> OwsResult<CanonicalRequest>;

    /// Content type of the encoded `response`.
    fn content_type(&self, response: &CanonicalResponse) -> String {
        match response {
            CanonicalResponse::Document(doc) => doc.content_type.clone(),
            _ => "text/xml".to_string(),
        }
    }

    /// Stream `response` in this version's element structure.
    fn encode(&self, response: &CanonicalResponse, sink: &mut dyn Write) -> OwsResult<()>;

    fn fault_envelope(&self) -> FaultEnvelope;

    fn encode_fault(&self, fault: &OwsFault, sink: &mut dyn Write) -> OwsResult<()> {
        self.fault_envelope().write(fault, sink)
    }

    /// Client-side KVP encoding of a canonical request.
    fn encode_request_kvp(&self, request: &CanonicalRequest) -> OwsResult<KvpMap>;
}

/// Copy a pre-encoded document to the sink.
pub fn write_document(doc: &Document, sink: &mut dyn Write) -> OwsResult<()> {
    sink.write_all(&doc.body)?;
    sink.flush()?;
    Ok(())
}

/// A handler returned a result this codec has no encoding for.
pub fn unencodable(codec: &dyn RequestCodec, response: &CanonicalResponse) -> OwsError {
    OwsError::Internal(format!(
        "{} {} cannot encode a {} response",
        codec.protocol(),
        codec.version(),
        response.kind()
    ))
}

/// The request holds a payload that this codec does not produce.
pub fn unencodable_request(codec: &dyn RequestCodec, request: &CanonicalRequest) -> OwsError {
    OwsError::UnknownOperation {
        protocol: codec.protocol(),
        operation: request.operation.to_string(),
    }
}

/// Shared start of every KVP request encoding.
pub fn kvp_header(codec: &dyn RequestCodec, request: &CanonicalRequest) -> KvpMap {
    let mut kvp = KvpMap::new();
    kvp.insert("SERVICE", codec.protocol().as_str());
    kvp.insert("REQUEST", request.operation.as_str());
    if request.operation.as_str() != "GetCapabilities" {
        kvp.insert("VERSION", request.version.to_string());
    }
    kvp
}

/// Operation is not one the codec knows.
pub fn unknown_operation(envelope: &RequestEnvelope) -> OwsError {
    OwsError::UnknownOperation {
        protocol: envelope.protocol,
        operation: envelope.operation.clone(),
    }
}

/// GetCapabilities parameters, identical across the OWS based services.
pub fn decode_get_capabilities(envelope: &RequestEnvelope) -> GetCapabilities {
    match &envelope.body {
        RequestBody::Kvp(kvp) => GetCapabilities {
            accept_versions: envelope.accept_versions.clone(),
            sections: kvp.list("SECTIONS"),
            update_sequence: kvp.get("UPDATESEQUENCE").map(str::to_string),
            accept_formats: kvp.list("ACCEPTFORMATS"),
        },
        RequestBody::Xml(root) => GetCapabilities {
            accept_versions: envelope.accept_versions.clone(),
            sections: root
                .child("Sections")
                .map(|s| s.children_text("Section"))
                .unwrap_or_default(),
            update_sequence: root.attr("updateSequence").map(str::to_string),
            accept_formats: root
                .child("AcceptFormats")
                .map(|f| f.children_text("OutputFormat"))
                .unwrap_or_default(),
        },
    }
}

pub fn encode_get_capabilities_kvp(kvp: &mut KvpMap, request: &GetCapabilities) {
    if !request.accept_versions.is_empty() {
        kvp.insert("ACCEPTVERSIONS", request.accept_versions.join(","));
    }
    if !request.sections.is_empty() {
        kvp.insert("SECTIONS", request.sections.join(","));
    }
    if let Some(update_sequence) = &request.update_sequence {
        kvp.insert("UPDATESEQUENCE", update_sequence.as_str());
    }
    if !request.accept_formats.is_empty() {
        kvp.insert("ACCEPTFORMATS", request.accept_formats.join(","));
    }
}
