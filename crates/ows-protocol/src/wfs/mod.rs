//! OGC WFS codecs for versions 1.0.0, 1.1.0 and 2.0.0.
//!
//! The three versions share one canonical model and differ in parameter
//! names, units and response element structure:
//!
//! | | 1.0.0 | 1.1.0 | 2.0.0 |
//! |---|---|---|---|
//! | type names | `TYPENAME` | `TYPENAME` | `TYPENAMES` |
//! | identifiers | `FEATUREID` | `FEATUREID` | `RESOURCEID` |
//! | page size | `MAXFEATURES` | `MAXFEATURES` | `COUNT` |
//! | lock expiry | minutes | minutes | seconds |
//! | GML | 2.1.2 | 3.1.1 | 3.2 |

mod encode;
mod kvp;
mod xml;

use std::io::Write;

use ows_common::{KvpMap, OwsResult, Protocol, ProtocolVersion};

use crate::codec::{decode_get_capabilities, RequestCodec};
use crate::envelope::{RequestBody, RequestEnvelope};
use crate::exceptions::FaultEnvelope;
use crate::namespaces;
use crate::request::{CanonicalRequest, RequestPayload};
use crate::response::CanonicalResponse;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WfsVersion {
    V100,
    V110,
    V200,
}

impl WfsVersion {
    pub fn protocol_version(self) -> ProtocolVersion {
        match self {
            WfsVersion::V100 => ProtocolVersion::new(1, 0, 0),
            WfsVersion::V110 => ProtocolVersion::new(1, 1, 0),
            WfsVersion::V200 => ProtocolVersion::new(2, 0, 0),
        }
    }

    fn type_names_key(self) -> &'static str {
        match self {
            WfsVersion::V200 => "TYPENAMES",
            _ => "TYPENAME",
        }
    }

    fn ids_key(self) -> &'static str {
        match self {
            WfsVersion::V200 => "RESOURCEID",
            _ => "FEATUREID",
        }
    }

    fn max_features_key(self) -> &'static str {
        match self {
            WfsVersion::V200 => "COUNT",
            _ => "MAXFEATURES",
        }
    }

    fn namespaces_key(self) -> &'static str {
        match self {
            WfsVersion::V200 => "NAMESPACES",
            _ => "NAMESPACE",
        }
    }

    /// Lock expiry is given in minutes before 2.0.
    fn expiry_unit_seconds(self) -> u64 {
        match self {
            WfsVersion::V200 => 1,
            _ => 60,
        }
    }

    fn gml_namespace(self) -> &'static str {
        match self {
            WfsVersion::V200 => namespaces::GML_32,
            _ => namespaces::GML,
        }
    }

    fn wfs_namespace(self) -> &'static str {
        match self {
            WfsVersion::V200 => namespaces::WFS_20,
            _ => namespaces::WFS,
        }
    }

    /// Content type of GML feature collections and application schemas.
    fn gml_content_type(self) -> &'static str {
        match self {
            WfsVersion::V100 => "text/xml; subtype=gml/2.1.2",
            WfsVersion::V110 => "text/xml; subtype=gml/3.1.1",
            WfsVersion::V200 => "application/gml+xml; version=3.2",
        }
    }
}

#[derive(Debug, Clone)]
pub struct WfsCodec {
    version: WfsVersion,
}

impl WfsCodec {
    pub fn new(version: WfsVersion) -> Self {
        Self { version }
    }

    pub fn v1_0_0() -> Self {
        Self::new(WfsVersion::V100)
    }

    pub fn v1_1_0() -> Self {
        Self::new(WfsVersion::V110)
    }

    pub fn v2_0_0() -> Self {
        Self::new(WfsVersion::V200)
    }

    pub fn wfs_version(&self) -> WfsVersion {
        self.version
    }
}

impl RequestCodec for WfsCodec {
    fn protocol(&self) -> Protocol {
        Protocol::Wfs
    }

    fn version(&self) -> ProtocolVersion {
        self.version.protocol_version()
    }

    fn decode(&self, envelope: RequestEnvelope) -> OwsResult<CanonicalRequest> {
        let payload = match &envelope.body {
            _ if envelope.is_get_capabilities() => {
                RequestPayload::GetCapabilities(decode_get_capabilities(&envelope))
            }
            RequestBody::Kvp(params) => kvp::decode(self.version, &envelope, params)?,
            RequestBody::Xml(root) => xml::decode(self.version, &envelope, root)?,
        };
        Ok(CanonicalRequest::new(
            Protocol::Wfs,
            self.version(),
            envelope.handle,
            payload,
        ))
    }

    fn content_type(&self, response: &CanonicalResponse) -> String {
        match response {
            CanonicalResponse::Document(doc) => doc.content_type.clone(),
            CanonicalResponse::FeatureSchema(_) | CanonicalResponse::FeatureCollection(_) => {
                self.version.gml_content_type().to_string()
            }
            _ => "text/xml".to_string(),
        }
    }

    fn encode(&self, response: &CanonicalResponse, sink: &mut dyn Write) -> OwsResult<()> {
        encode::write(self, response, sink)
    }

    fn fault_envelope(&self) -> FaultEnvelope {
        match self.version {
            WfsVersion::V100 => FaultEnvelope::PreOws { version: "1.2.0" },
            WfsVersion::V110 => FaultEnvelope::Ows100 { version: "1.0.0" },
            WfsVersion::V200 => FaultEnvelope::Ows110 { version: "2.0.0" },
        }
    }

    fn encode_request_kvp(&self, request: &CanonicalRequest) -> OwsResult<KvpMap> {
        kvp::encode(self, request)
    }
}
