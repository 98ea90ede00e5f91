//! Service configuration loading and types.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ows_common::{BoundingBox, Protocol, ProtocolVersion};
use ows_protocol::response::ServiceMetadata;
use serde::{Deserialize, Serialize};

/// Gateway configuration loaded from a YAML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub service: ServiceSection,

    /// Capabilities update sequence.
    pub update_sequence: Option<String>,

    /// Fixed HTTP status for every fault instead of the per-code one.
    pub fault_status: Option<u16>,

    /// Enabled protocols and their versions. Absent means every built-in
    /// codec; an empty version list enables every version of that protocol.
    pub protocols: Option<BTreeMap<Protocol, Vec<String>>>,

    pub features: FeaturesConfig,
    pub sensors: SensorsConfig,
    pub tiles: TilesConfig,

    /// Enabled WPS processes by identifier. Empty enables all.
    pub processes: Vec<String>,

    pub records: Vec<RecordConfig>,
}

impl ServiceConfig {
    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        // If the file doesn't exist, run with defaults
        if !path.exists() {
            tracing::warn!("Config file {:?} does not exist, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {:?}", path))?;
        let mut config: ServiceConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {:?}", path))?;

        // Relative paths are relative to the config file.
        if let Some(dir) = path.parent() {
            config.resolve_paths(dir);
        }

        tracing::info!(
            feature_types = config.features.types.len(),
            offerings = config.sensors.offerings.len(),
            layers = config.tiles.layers.len(),
            records = config.records.len(),
            "Loaded config from {:?}",
            path
        );
        Ok(config)
    }

    fn resolve_paths(&mut self, dir: &Path) {
        if self.tiles.root.is_relative() {
            self.tiles.root = dir.join(&self.tiles.root);
        }
        for description in &mut self.sensors.descriptions {
            if let Some(file) = &description.file {
                if file.is_relative() {
                    description.file = Some(dir.join(file));
                }
            }
        }
    }

    /// Versions to keep for `protocol`: `None` keeps all, an empty set
    /// disables the protocol.
    pub fn enabled_versions(&self, protocol: Protocol) -> Result<Option<BTreeSet<ProtocolVersion>>> {
        let Some(protocols) = &self.protocols else {
            return Ok(None);
        };
        match protocols.get(&protocol) {
            None => Ok(Some(BTreeSet::new())),
            Some(versions) if versions.is_empty() => Ok(None),
            Some(versions) => versions
                .iter()
                .map(|v| {
                    v.parse::<ProtocolVersion>()
                        .with_context(|| format!("Invalid {} version in config: {}", protocol, v))
                })
                .collect::<Result<BTreeSet<_>>>()
                .map(Some),
        }
    }
}

/// Service identification and provider, shared by every capabilities
/// document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSection {
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub keywords: Vec<String>,
    pub fees: Option<String>,
    pub access_constraints: Option<String>,
    pub provider_name: String,
    pub provider_site: Option<String>,
    /// Base URL clients use to reach the gateway.
    pub online_resource: String,
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            title: "OWS Gateway".to_string(),
            abstract_text: None,
            keywords: Vec::new(),
            fees: None,
            access_constraints: None,
            provider_name: "OWS Gateway".to_string(),
            provider_site: None,
            online_resource: "http://localhost:8080/ows".to_string(),
        }
    }
}

impl From<&ServiceSection> for ServiceMetadata {
    fn from(section: &ServiceSection) -> Self {
        ServiceMetadata {
            title: section.title.clone(),
            abstract_text: section.abstract_text.clone(),
            keywords: section.keywords.clone(),
            fees: section.fees.clone(),
            access_constraints: section.access_constraints.clone(),
            provider_name: section.provider_name.clone(),
            provider_site: section.provider_site.clone(),
            online_resource: section.online_resource.clone(),
        }
    }
}

// ============================================================================
// WFS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeaturesConfig {
    /// Application schema namespace of every feature type.
    pub namespace: String,
    pub prefix: String,
    /// Lock lifetime when a LockFeature request names no expiry.
    pub lock_expiry_seconds: u64,
    /// Upper bound on features returned by one GetFeature.
    pub max_features: u64,
    pub types: Vec<FeatureTypeConfig>,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            namespace: "http://example.org/app".to_string(),
            prefix: "app".to_string(),
            lock_expiry_seconds: 300,
            max_features: 1000,
            types: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureTypeConfig {
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, rename = "abstract")]
    pub abstract_text: Option<String>,
    #[serde(default = "default_crs")]
    pub crs: String,
    #[serde(default)]
    pub bbox: Option<BoundingBox>,
    #[serde(default)]
    pub properties: Vec<PropertyConfig>,
    /// Name of the point geometry property, if any.
    #[serde(default)]
    pub geometry: Option<String>,
    #[serde(default)]
    pub features: Vec<FeatureConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyConfig {
    pub name: String,
    #[serde(default, rename = "type")]
    pub property_type: PropertyKind,
    #[serde(default)]
    pub optional: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    #[default]
    String,
    Integer,
    Double,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    pub id: String,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    /// `[x, y]` in the type's CRS.
    #[serde(default)]
    pub point: Option<[f64; 2]>,
}

fn default_crs() -> String {
    "urn:ogc:def:crs:EPSG::4326".to_string()
}

// ============================================================================
// SOS
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorsConfig {
    pub offerings: Vec<OfferingConfig>,
    pub descriptions: Vec<SensorDescriptionConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferingConfig {
    pub identifier: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub procedures: Vec<String>,
    #[serde(default)]
    pub observed_properties: Vec<String>,
    #[serde(default)]
    pub features_of_interest: Vec<String>,
    #[serde(default)]
    pub response_formats: Vec<String>,
    #[serde(default)]
    pub bbox: Option<BoundingBox>,
    #[serde(default)]
    pub observations: Vec<ObservationConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationConfig {
    pub procedure: String,
    pub observed_property: String,
    pub feature_of_interest: String,
    /// ISO 8601 sampling time.
    pub time: String,
    pub value: f64,
    pub uom: String,
}

/// A sensor description document in one output format, inline or on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorDescriptionConfig {
    pub procedure: String,
    pub format: String,
    #[serde(default)]
    pub document: Option<String>,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

// ============================================================================
// WMTS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TilesConfig {
    /// Tiles are read from `{root}/{layer}/{style}/{set}/{matrix}/{row}/{col}.{ext}`.
    pub root: PathBuf,
    /// Base URL of the RESTful binding, advertised in capabilities.
    pub rest_endpoint: Option<String>,
    pub layers: Vec<LayerConfig>,
}

impl Default for TilesConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("tiles"),
            rest_endpoint: None,
            layers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerConfig {
    pub identifier: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, rename = "abstract")]
    pub abstract_text: Option<String>,
    #[serde(default = "default_styles")]
    pub styles: Vec<String>,
    #[serde(default = "default_formats")]
    pub formats: Vec<String>,
    #[serde(default)]
    pub info_formats: Vec<String>,
    #[serde(default = "default_tile_matrix_sets")]
    pub tile_matrix_sets: Vec<String>,
    #[serde(default = "default_max_zoom")]
    pub max_zoom: u32,
    #[serde(default)]
    pub bbox: Option<BoundingBox>,
    /// Values of the `TIME` dimension, oldest first. The last one is the
    /// default.
    #[serde(default)]
    pub times: Vec<String>,
}

fn default_styles() -> Vec<String> {
    vec!["default".to_string()]
}

fn default_formats() -> Vec<String> {
    vec!["image/png".to_string()]
}

fn default_tile_matrix_sets() -> Vec<String> {
    vec!["WebMercatorQuad".to_string()]
}

fn default_max_zoom() -> u32 {
    18
}

// ============================================================================
// CSW
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordConfig {
    pub identifier: String,
    pub title: String,
    #[serde(default = "default_record_type", rename = "type")]
    pub record_type: String,
    #[serde(default, rename = "abstract")]
    pub abstract_text: Option<String>,
    #[serde(default)]
    pub subjects: Vec<String>,
    #[serde(default)]
    pub modified: Option<String>,
    #[serde(default)]
    pub bbox: Option<BoundingBox>,
}

fn default_record_type() -> String {
    "dataset".to_string()
}
