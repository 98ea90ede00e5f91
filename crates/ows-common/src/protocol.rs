//! Service families and operation names.

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::OwsError;

/// OGC service family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    Wfs,
    Wms,
    Wps,
    Sos,
    Wmts,
    Csw,
}

impl Protocol {
    pub const ALL: [Protocol; 6] = [
        Protocol::Wfs,
        Protocol::Wms,
        Protocol::Wps,
        Protocol::Sos,
        Protocol::Wmts,
        Protocol::Csw,
    ];

    /// Value of the `SERVICE` parameter for this family.
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Wfs => "WFS",
            Protocol::Wms => "WMS",
            Protocol::Wps => "WPS",
            Protocol::Sos => "SOS",
            Protocol::Wmts => "WMTS",
            Protocol::Csw => "CSW",
        }
    }

    /// Identify the service family from the namespace of a request's root
    /// element.
    ///
    /// OWS common namespaces are shared by several services and do not map
    /// to a family; callers fall back to the `service` attribute for those.
    pub fn from_namespace(ns: &str) -> Option<Protocol> {
        match ns {
            "http://www.opengis.net/wfs" | "http://www.opengis.net/wfs/2.0" => Some(Protocol::Wfs),
            "http://www.opengis.net/wms" => Some(Protocol::Wms),
            "http://www.opengis.net/wps/1.0.0" => Some(Protocol::Wps),
            "http://www.opengis.net/sos/1.0" => Some(Protocol::Sos),
            "http://www.opengis.net/wmts/1.0" => Some(Protocol::Wmts),
            "http://www.opengis.net/cat/csw/2.0.2" => Some(Protocol::Csw),
            _ => None,
        }
    }
}

impl FromStr for Protocol {
    type Err = OwsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Protocol::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| OwsError::UnknownProtocol(s.to_string()))
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-sensitive operation identifier, e.g. `GetFeature`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationName(String);

impl OperationName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for OperationName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for OperationName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl Borrow<str> for OperationName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
