//! Canonical results returned by handlers and encoded by codecs.

use bytes::Bytes;

use ows_common::{BoundingBox, OperationName, TileMatrixSet};

use crate::request::{ElementSetName, QName};

#[derive(Debug, Clone, PartialEq)]
pub enum CanonicalResponse {
    Capabilities(Capabilities),
    /// Pre-encoded payload passed through unchanged.
    Document(Document),
    FeatureSchema(FeatureSchema),
    FeatureCollection(FeatureCollection),
    LockFeature(LockFeatureResult),
    Observations(ObservationCollection),
    ProcessDescriptions(Vec<ProcessDescription>),
    ExecuteResponse(ExecuteResult),
    Records(RecordsResult),
}

impl CanonicalResponse {
    pub fn kind(&self) -> &'static str {
        match self {
            CanonicalResponse::Capabilities(_) => "Capabilities",
            CanonicalResponse::Document(_) => "Document",
            CanonicalResponse::FeatureSchema(_) => "FeatureSchema",
            CanonicalResponse::FeatureCollection(_) => "FeatureCollection",
            CanonicalResponse::LockFeature(_) => "LockFeature",
            CanonicalResponse::Observations(_) => "Observations",
            CanonicalResponse::ProcessDescriptions(_) => "ProcessDescriptions",
            CanonicalResponse::ExecuteResponse(_) => "ExecuteResponse",
            CanonicalResponse::Records(_) => "Records",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub content_type: String,
    pub body: Bytes,
}

impl Document {
    pub fn new(content_type: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            content_type: content_type.into(),
            body: body.into(),
        }
    }
}

// === Capabilities ===

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceMetadata {
    pub title: String,
    pub abstract_text: Option<String>,
    pub keywords: Vec<String>,
    pub fees: Option<String>,
    pub access_constraints: Option<String>,
    pub provider_name: String,
    pub provider_site: Option<String>,
    /// Base URL advertised for every operation's DCP.
    pub online_resource: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Capabilities {
    pub service: ServiceMetadata,
    /// Operations offered for this protocol.
    pub operations: Vec<OperationName>,
    pub update_sequence: Option<String>,
    /// Requested sections; empty means all.
    pub sections: Vec<String>,
    pub contents: CapabilitiesContents,
}

impl Capabilities {
    /// Whether `section` was requested (case-insensitive; `All` selects everything).
    pub fn includes(&self, section: &str) -> bool {
        self.sections.is_empty()
            || self
                .sections
                .iter()
                .any(|s| s.eq_ignore_ascii_case(section) || s.eq_ignore_ascii_case("All"))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CapabilitiesContents {
    None,
    FeatureTypes(Vec<FeatureTypeInfo>),
    Offerings(Vec<OfferingInfo>),
    Layers {
        layers: Vec<LayerInfo>,
        tile_matrix_sets: Vec<TileMatrixSet>,
        /// Base URL of the RESTful tile binding, advertised as `ResourceURL`.
        rest_endpoint: Option<String>,
    },
    Processes(Vec<ProcessBrief>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTypeInfo {
    pub name: QName,
    pub title: String,
    pub abstract_text: Option<String>,
    pub default_crs: String,
    pub wgs84_bbox: Option<BoundingBox>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OfferingInfo {
    pub identifier: String,
    pub name: String,
    pub procedures: Vec<String>,
    pub observed_properties: Vec<String>,
    pub features_of_interest: Vec<String>,
    pub time_begin: Option<String>,
    pub time_end: Option<String>,
    pub response_formats: Vec<String>,
    pub bbox: Option<BoundingBox>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayerInfo {
    pub identifier: String,
    pub title: String,
    pub abstract_text: Option<String>,
    pub styles: Vec<StyleInfo>,
    pub formats: Vec<String>,
    pub info_formats: Vec<String>,
    pub tile_matrix_set_links: Vec<String>,
    pub wgs84_bbox: BoundingBox,
    pub dimensions: Vec<DimensionInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleInfo {
    pub identifier: String,
    pub title: String,
    pub is_default: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionInfo {
    pub identifier: String,
    pub default: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessBrief {
    pub identifier: String,
    pub title: String,
    pub abstract_text: Option<String>,
    pub process_version: String,
}

// === WFS ===

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyType {
    String,
    Integer,
    Double,
    Point,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDescription {
    pub name: String,
    pub property_type: PropertyType,
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureTypeDescription {
    pub name: QName,
    pub properties: Vec<PropertyDescription>,
}

/// Feature types of one namespace, encoded as one XML schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSchema {
    pub target_namespace: String,
    pub target_prefix: String,
    pub feature_types: Vec<FeatureTypeDescription>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub srs_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub type_name: QName,
    pub id: String,
    /// Simple properties in schema order.
    pub properties: Vec<(String, String)>,
    pub geometry: Option<(String, Point)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
    /// Total matches before paging, when known.
    pub number_matched: Option<u64>,
    /// Timestamp supplied by the handler, ISO 8601.
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockFeatureResult {
    pub lock_id: String,
    pub locked: Vec<String>,
    pub not_locked: Vec<String>,
}

// === SOS ===

#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub procedure: String,
    pub observed_property: String,
    pub feature_of_interest: String,
    pub sampling_time: String,
    pub value: f64,
    pub uom: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObservationCollection {
    pub offering: String,
    pub observations: Vec<Observation>,
}

// === WPS ===

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterDescription {
    pub identifier: String,
    pub title: String,
    pub data_type: String,
    pub min_occurs: u32,
    pub max_occurs: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessDescription {
    pub brief: ProcessBrief,
    pub inputs: Vec<ParameterDescription>,
    pub outputs: Vec<ParameterDescription>,
    pub store_supported: bool,
    pub status_supported: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputValue {
    pub identifier: String,
    pub title: String,
    pub data_type: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessStatus {
    Succeeded(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecuteResult {
    pub process: ProcessBrief,
    pub creation_time: String,
    pub status: ProcessStatus,
    pub outputs: Vec<OutputValue>,
    /// Echoed inputs when lineage was requested, as `(identifier, value)`.
    pub lineage: Option<Vec<(String, String)>>,
}

// === CSW ===

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub identifier: String,
    pub title: String,
    pub record_type: String,
    pub abstract_text: Option<String>,
    pub subjects: Vec<String>,
    pub modified: Option<String>,
    pub bbox: Option<BoundingBox>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordsResult {
    pub element_set: ElementSetName,
    pub records: Vec<Record>,
}
