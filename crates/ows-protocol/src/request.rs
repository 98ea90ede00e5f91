//! Canonical, version-independent request model.
//!
//! Every codec decodes its wire syntax into these types; handlers never see
//! KVP maps or XML.

use std::collections::BTreeMap;
use std::fmt;

use ows_common::{BoundingBox, OperationName, OwsError, OwsResult, Protocol, ProtocolVersion};

/// A decoded request with its negotiated version.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRequest {
    pub protocol: Protocol,
    pub version: ProtocolVersion,
    pub operation: OperationName,
    pub handle: Option<String>,
    pub payload: RequestPayload,
}

impl CanonicalRequest {
    pub fn new(
        protocol: Protocol,
        version: ProtocolVersion,
        handle: Option<String>,
        payload: RequestPayload,
    ) -> Self {
        Self {
            protocol,
            version,
            operation: OperationName::from(payload.operation_name()),
            handle,
            payload,
        }
    }
}

/// Operation specific parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestPayload {
    GetCapabilities(GetCapabilities),
    DescribeFeatureType(DescribeFeatureType),
    GetFeature(GetFeature),
    LockFeature(LockFeature),
    DescribeSensor(DescribeSensor),
    GetObservation(GetObservation),
    GetTile(GetTile),
    GetFeatureInfo(GetFeatureInfo),
    DescribeProcess(DescribeProcess),
    Execute(Execute),
    GetRecordById(GetRecordById),
}

impl RequestPayload {
    pub fn operation_name(&self) -> &'static str {
        match self {
            RequestPayload::GetCapabilities(_) => "GetCapabilities",
            RequestPayload::DescribeFeatureType(_) => "DescribeFeatureType",
            RequestPayload::GetFeature(_) => "GetFeature",
            RequestPayload::LockFeature(_) => "LockFeature",
            RequestPayload::DescribeSensor(_) => "DescribeSensor",
            RequestPayload::GetObservation(_) => "GetObservation",
            RequestPayload::GetTile(_) => "GetTile",
            RequestPayload::GetFeatureInfo(_) => "GetFeatureInfo",
            RequestPayload::DescribeProcess(_) => "DescribeProcess",
            RequestPayload::Execute(_) => "Execute",
            RequestPayload::GetRecordById(_) => "GetRecordById",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetCapabilities {
    pub accept_versions: Vec<String>,
    pub sections: Vec<String>,
    pub update_sequence: Option<String>,
    pub accept_formats: Vec<String>,
}

// === WFS ===

/// A feature type name with its namespace binding.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QName {
    pub prefix: Option<String>,
    pub local_name: String,
    pub namespace: Option<String>,
}

impl QName {
    pub fn new(prefix: Option<&str>, local_name: &str, namespace: Option<&str>) -> Self {
        Self {
            prefix: prefix.map(str::to_string),
            local_name: local_name.to_string(),
            namespace: namespace.map(str::to_string),
        }
    }

    /// Parse `prefix:local`, resolving the prefix with `resolve`.
    pub fn parse(value: &str, resolve: impl Fn(&str) -> Option<String>) -> Self {
        match value.trim().split_once(':') {
            Some((prefix, local)) => Self {
                namespace: resolve(prefix),
                prefix: Some(prefix.to_string()),
                local_name: local.to_string(),
            },
            None => Self {
                prefix: None,
                local_name: value.trim().to_string(),
                namespace: resolve(""),
            },
        }
    }

    /// Two names denote the same type when namespaces match (if both are
    /// known) and local names are equal.
    pub fn matches(&self, other: &QName) -> bool {
        if self.local_name != other.local_name {
            return false;
        }
        match (&self.namespace, &other.namespace) {
            (Some(a), Some(b)) => a == b,
            _ => self.prefix == other.prefix || self.prefix.is_none() || other.prefix.is_none(),
        }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.prefix {
            Some(prefix) => write!(f, "{}:{}", prefix, self.local_name),
            None => f.write_str(&self.local_name),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescribeFeatureType {
    /// Empty means all feature types.
    pub type_names: Vec<QName>,
    pub output_format: Option<String>,
}

/// How a query selects features.
#[derive(Debug, Clone, PartialEq)]
pub enum QuerySelection {
    All,
    FeatureIds(Vec<String>),
    /// Filter document, carried as serialized XML.
    Filter(String),
    Bbox(BoundingBox),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub type_names: Vec<QName>,
    pub selection: QuerySelection,
    pub srs_name: Option<String>,
    pub property_names: Vec<String>,
    pub handle: Option<String>,
}

impl Query {
    pub fn new(type_names: Vec<QName>, selection: QuerySelection) -> Self {
        Self {
            type_names,
            selection,
            srs_name: None,
            property_names: Vec::new(),
            handle: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResultType {
    #[default]
    Results,
    Hits,
}

impl ResultType {
    pub fn parse(value: &str, param: &str) -> OwsResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "results" => Ok(ResultType::Results),
            "hits" => Ok(ResultType::Hits),
            _ => Err(OwsError::invalid_value(
                param,
                format!("'{}' is not one of results, hits", value),
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResultType::Results => "results",
            ResultType::Hits => "hits",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GetFeature {
    pub queries: Vec<Query>,
    pub output_format: Option<String>,
    pub max_features: Option<u64>,
    pub start_index: Option<u64>,
    pub result_type: ResultType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LockFeature {
    pub queries: Vec<Query>,
    /// `true` only for `LOCKACTION=ALL`.
    pub lock_all: bool,
    pub existing_lock_id: Option<String>,
    pub expiry_in_seconds: Option<u64>,
}

// === SOS ===

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescribeSensor {
    pub procedure: String,
    pub output_format: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetObservation {
    pub offering: String,
    pub observed_properties: Vec<String>,
    pub procedures: Vec<String>,
    /// Instant or `begin/end` period in ISO 8601.
    pub event_time: Option<String>,
    pub features_of_interest: Vec<String>,
    pub response_format: String,
    pub result_model: Option<String>,
    pub response_mode: Option<String>,
    pub srs_name: Option<String>,
}

// === WMTS ===

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetTile {
    pub layer: String,
    pub style: String,
    pub format: String,
    pub tile_matrix_set: String,
    pub tile_matrix: String,
    pub tile_row: u32,
    pub tile_col: u32,
    /// Sample dimension values keyed by upper-cased identifier.
    pub dimensions: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetFeatureInfo {
    pub tile: GetTile,
    pub i: u32,
    pub j: u32,
    pub info_format: String,
}

// === WPS ===

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescribeProcess {
    /// Process identifiers; `ALL` requests every process.
    pub identifiers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputValue {
    Literal {
        value: String,
        attributes: Vec<(String, String)>,
    },
    Reference {
        href: String,
        attributes: Vec<(String, String)>,
    },
    /// Inline complex data, serialized XML.
    Complex { xml: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataInput {
    pub identifier: String,
    pub value: InputValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseForm {
    Document {
        store: bool,
        status: bool,
        lineage: bool,
        outputs: Vec<String>,
    },
    Raw {
        output: String,
    },
}

impl Default for ResponseForm {
    fn default() -> Self {
        ResponseForm::Document {
            store: false,
            status: false,
            lineage: false,
            outputs: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execute {
    pub identifier: String,
    pub inputs: Vec<DataInput>,
    pub response_form: ResponseForm,
}

// === CSW ===

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ElementSetName {
    Brief,
    #[default]
    Summary,
    Full,
}

impl ElementSetName {
    pub fn parse(value: &str, param: &str) -> OwsResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "brief" => Ok(ElementSetName::Brief),
            "summary" => Ok(ElementSetName::Summary),
            "full" => Ok(ElementSetName::Full),
            _ => Err(OwsError::invalid_value(
                param,
                format!("'{}' is not one of brief, summary, full", value),
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ElementSetName::Brief => "brief",
            ElementSetName::Summary => "summary",
            ElementSetName::Full => "full",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetRecordById {
    pub ids: Vec<String>,
    pub element_set_name: ElementSetName,
    pub output_format: Option<String>,
    pub output_schema: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_follows_payload() {
        let request = CanonicalRequest::new(
            Protocol::Sos,
            ProtocolVersion::new(1, 0, 0),
            None,
            RequestPayload::DescribeSensor(DescribeSensor {
                procedure: "urn:ogc:object:Sensor:latlon:foobarnator".into(),
                output_format: "text/xml;subtype=\"sensorML/1.0.1\"".into(),
            }),
        );
        assert_eq!(request.operation.as_str(), "DescribeSensor");
    }

    #[test]
    fn test_qname_parse_and_match() {
        let resolve = |p: &str| (p == "app").then(|| "http://www.deegree.org/app".to_string());
        let a = QName::parse("app:Road", resolve);
        assert_eq!(a.to_string(), "app:Road");
        assert_eq!(a.namespace.as_deref(), Some("http://www.deegree.org/app"));

        let b = QName::new(Some("x"), "Road", Some("http://www.deegree.org/app"));
        assert!(a.matches(&b));
        let c = QName::new(Some("app"), "Road", Some("urn:other"));
        assert!(!a.matches(&c));
        let bare = QName::new(None, "Road", None);
        assert!(a.matches(&bare));
    }

    #[test]
    fn test_result_type_parse() {
        assert_eq!(ResultType::parse("HITS", "RESULTTYPE").unwrap(), ResultType::Hits);
        assert!(ResultType::parse("count", "RESULTTYPE").is_err());
    }
}
