//! Reads the routing information of a request before a codec is chosen.
//!
//! The envelope names the protocol, the operation and the version(s) the
//! client asked for. Everything else stays in the body for the codec of the
//! negotiated version.

use bytes::Bytes;
use ows_common::kvp::split_list;
use ows_common::{KvpMap, OwsError, OwsResult, Protocol};

use crate::xml::{SoapVersion, XmlElement};

/// A request as it arrived on the wire.
#[derive(Debug, Clone)]
pub enum RawRequest {
    Kvp(KvpMap),
    Xml(Bytes),
}

impl RawRequest {
    /// Protocol and version as far as they can be read without failing,
    /// used to pick a fault format when the envelope itself is broken.
    pub fn fault_hint(&self) -> (Option<Protocol>, Option<String>) {
        match self {
            RawRequest::Kvp(kvp) => (
                kvp.get("SERVICE").and_then(|s| s.parse().ok()),
                kvp.get("VERSION").map(str::to_string),
            ),
            RawRequest::Xml(_) => (None, None),
        }
    }
}

#[derive(Debug, Clone)]
pub enum RequestBody {
    Kvp(KvpMap),
    /// Operation root element, SOAP envelope already removed.
    Xml(XmlElement),
}

#[derive(Debug, Clone)]
pub struct RequestEnvelope {
    pub protocol: Protocol,
    pub operation: String,
    /// Raw `VERSION` / `version` value.
    pub version: Option<String>,
    /// `AcceptVersions` of a GetCapabilities request, in client order.
    pub accept_versions: Vec<String>,
    pub handle: Option<String>,
    pub soap: Option<SoapVersion>,
    pub body: RequestBody,
}

impl RequestEnvelope {
    pub fn read(raw: RawRequest) -> OwsResult<Self> {
        match raw {
            RawRequest::Kvp(kvp) => Self::from_kvp(kvp),
            RawRequest::Xml(bytes) => Self::from_xml(&bytes),
        }
    }

    fn from_kvp(kvp: KvpMap) -> OwsResult<Self> {
        let protocol: Protocol = kvp.require("SERVICE")?.parse()?;
        let operation = kvp.require("REQUEST")?.trim().to_string();
        let version = kvp.get("VERSION").map(|v| v.trim().to_string());
        let accept_versions = kvp.list("ACCEPTVERSIONS");

        Ok(Self {
            protocol,
            operation,
            version,
            accept_versions,
            handle: None,
            soap: None,
            body: RequestBody::Kvp(kvp),
        })
    }

    fn from_xml(bytes: &[u8]) -> OwsResult<Self> {
        let (root, soap) = XmlElement::parse(bytes)?.unwrap_soap()?;

        let protocol = match root.attr("service") {
            Some(service) => service.parse()?,
            None => root
                .namespace
                .as_deref()
                .and_then(Protocol::from_namespace)
                .ok_or_else(|| {
                    OwsError::UnknownProtocol(
                        root.namespace.clone().unwrap_or_else(|| root.name.clone()),
                    )
                })?,
        };

        let accept_versions = root
            .child("AcceptVersions")
            .map(|av| av.children_text("Version"))
            .unwrap_or_default()
            .iter()
            .flat_map(|v| split_list(v))
            .collect();

        Ok(Self {
            protocol,
            operation: root.local_name.clone(),
            version: root.attr("version").map(str::to_string),
            accept_versions,
            handle: root.attr("handle").map(str::to_string),
            soap,
            body: RequestBody::Xml(root),
        })
    }

    pub fn is_get_capabilities(&self) -> bool {
        self.operation == "GetCapabilities"
    }
}
