//! WMTS: pre-rendered tiles on disk and point feature info.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use ows_common::{BoundingBox, ExceptionCode, HandlerError, OwsError, OwsResult, TileMatrix, TileMatrixSet};
use ows_protocol::request::{GetFeatureInfo, GetTile};
use ows_protocol::response::{CapabilitiesContents, DimensionInfo, LayerInfo, StyleInfo};
use ows_protocol::wmts::format_extension;
use ows_protocol::{CanonicalRequest, CanonicalResponse, Document, Handler, RequestPayload};
use serde_json::json;
use tracing::{debug, info, warn};

use super::unexpected;
use crate::config::{LayerConfig, TilesConfig};

/// Metres per degree at the equator, for CRS84 scale denominators.
const METERS_PER_DEGREE: f64 = 111319.49079327357;
/// Standardized rendering pixel size in metres.
const PIXEL_SIZE: f64 = 0.00028;
const EARTH_RADIUS: f64 = 6378137.0;

struct Layer {
    config: LayerConfig,
    sets: BTreeMap<String, TileMatrixSet>,
}

pub struct TileDirectory {
    root: PathBuf,
    rest_endpoint: Option<String>,
    layers: Vec<Layer>,
}

/// A validated GetTile request.
struct ResolvedTile<'a> {
    layer: &'a Layer,
    matrix: &'a TileMatrix,
    set: &'a TileMatrixSet,
    time: Option<&'a str>,
}

impl TileDirectory {
    pub fn from_config(config: &TilesConfig) -> Result<Self> {
        let mut layers = Vec::with_capacity(config.layers.len());
        for layer in &config.layers {
            let mut sets = BTreeMap::new();
            for id in &layer.tile_matrix_sets {
                let Some(set) = TileMatrixSet::well_known(id, layer.max_zoom) else {
                    bail!("Layer {} references unknown tile matrix set {}", layer.identifier, id);
                };
                sets.insert(id.clone(), set);
            }
            layers.push(Layer {
                config: layer.clone(),
                sets,
            });
        }

        if !config.root.is_dir() {
            warn!(root = %config.root.display(), "Tile root does not exist, every GetTile will fail");
        }
        info!(layers = layers.len(), root = %config.root.display(), "Loaded tile directory");
        Ok(Self {
            root: config.root.clone(),
            rest_endpoint: config.rest_endpoint.clone(),
            layers,
        })
    }

    pub fn capabilities_contents(&self) -> CapabilitiesContents {
        let layers = self.layers.iter().map(Layer::info).collect();

        // One set per identifier, the deepest any layer uses.
        let mut sets: BTreeMap<&str, &TileMatrixSet> = BTreeMap::new();
        for set in self.layers.iter().flat_map(|l| l.sets.values()) {
            let deeper = sets
                .get(set.identifier.as_str())
                .map_or(true, |s| s.tile_matrices.len() < set.tile_matrices.len());
            if deeper {
                sets.insert(&set.identifier, set);
            }
        }

        CapabilitiesContents::Layers {
            layers,
            tile_matrix_sets: sets.into_values().cloned().collect(),
            rest_endpoint: self.rest_endpoint.clone(),
        }
    }

    fn resolve<'a>(&'a self, tile: &'a GetTile) -> OwsResult<ResolvedTile<'a>> {
        let layer = self
            .layers
            .iter()
            .find(|l| l.config.identifier == tile.layer)
            .ok_or_else(|| OwsError::invalid_value("LAYER", format!("Unknown layer: {}", tile.layer)))?;
        let config = &layer.config;

        if !config.styles.contains(&tile.style) {
            return Err(OwsError::invalid_value(
                "STYLE",
                format!("Layer {} has no style {}", tile.layer, tile.style),
            ));
        }
        if !config.formats.contains(&tile.format) {
            return Err(OwsError::invalid_value(
                "FORMAT",
                format!("Layer {} is not available as {}", tile.layer, tile.format),
            ));
        }
        let set = layer.sets.get(&tile.tile_matrix_set).ok_or_else(|| {
            OwsError::invalid_value(
                "TILEMATRIXSET",
                format!("Layer {} is not tiled in {}", tile.layer, tile.tile_matrix_set),
            )
        })?;
        let matrix = set.get_matrix(&tile.tile_matrix).ok_or_else(|| {
            OwsError::invalid_value(
                "TILEMATRIX",
                format!("{} has no tile matrix {}", set.identifier, tile.tile_matrix),
            )
        })?;

        if !matrix.contains_tile(tile.tile_row, 0) {
            return Err(out_of_range("TileOutOfRange", "TILEROW", tile.tile_row, matrix.matrix_height));
        }
        if !matrix.contains_tile(0, tile.tile_col) {
            return Err(out_of_range("TileOutOfRange", "TILECOL", tile.tile_col, matrix.matrix_width));
        }

        let time = if config.times.is_empty() {
            None
        } else {
            match tile.dimensions.get("TIME") {
                Some(time) if config.times.contains(time) => Some(time.as_str()),
                Some(time) => {
                    return Err(OwsError::invalid_value(
                        "TIME",
                        format!("Layer {} has no time {}", tile.layer, time),
                    ))
                }
                None => config.times.last().map(String::as_str),
            }
        };

        Ok(ResolvedTile {
            layer,
            matrix,
            set,
            time,
        })
    }

    fn tile_path(&self, tile: &GetTile, resolved: &ResolvedTile<'_>) -> PathBuf {
        let mut path = self.root.join(&tile.layer).join(&tile.style);
        if let Some(time) = resolved.time {
            path.push(time);
        }
        path.push(&tile.tile_matrix_set);
        path.push(&tile.tile_matrix);
        path.push(tile.tile_row.to_string());
        path.push(format!("{}.{}", tile.tile_col, format_extension(&tile.format)));
        path
    }

    pub fn get_tile(&self, tile: &GetTile) -> OwsResult<Document> {
        let resolved = self.resolve(tile)?;
        let path = self.tile_path(tile, &resolved);
        debug!(path = %path.display(), "Reading tile");

        let body = std::fs::read(&path).map_err(|e| {
            HandlerError::new(format!(
                "Tile {}/{}/{} of {} is not available",
                tile.tile_matrix, tile.tile_row, tile.tile_col, tile.layer
            ))
            .with_code(ExceptionCode::NoApplicableCode)
            .with_source(e)
        })?;
        Ok(Document::new(tile.format.clone(), body))
    }

    pub fn feature_info(&self, request: &GetFeatureInfo) -> OwsResult<Document> {
        let tile = &request.tile;
        let resolved = self.resolve(tile)?;
        let matrix = resolved.matrix;

        if !matrix.contains_pixel(request.i, 0) {
            return Err(out_of_range("PointIJOutOfRange", "I", request.i, matrix.tile_width));
        }
        if !matrix.contains_pixel(0, request.j) {
            return Err(out_of_range("PointIJOutOfRange", "J", request.j, matrix.tile_height));
        }
        if !resolved.layer.config.info_formats.contains(&request.info_format) {
            return Err(OwsError::invalid_value(
                "INFOFORMAT",
                format!("Layer {} does not offer {}", tile.layer, request.info_format),
            ));
        }

        let (lon, lat) = pixel_position(resolved.set, matrix, tile, request.i, request.j);
        let info = json!({
            "layer": tile.layer,
            "style": tile.style,
            "tileMatrixSet": tile.tile_matrix_set,
            "tileMatrix": tile.tile_matrix,
            "tileRow": tile.tile_row,
            "tileCol": tile.tile_col,
            "i": request.i,
            "j": request.j,
            "time": resolved.time,
            "longitude": lon,
            "latitude": lat,
        });

        let body = if request.info_format.contains("json") {
            serde_json::to_vec(&info).map_err(|e| HandlerError::new("Failed to serialize feature info").with_source(e))?
        } else {
            let mut text = String::new();
            if let Some(fields) = info.as_object() {
                for (key, value) in fields {
                    text.push_str(&format!("{} = {}\n", key, value));
                }
            }
            text.into_bytes()
        };
        Ok(Document::new(request.info_format.clone(), body))
    }
}

impl Layer {
    fn info(&self) -> LayerInfo {
        let config = &self.config;
        let dimensions = if config.times.is_empty() {
            Vec::new()
        } else {
            vec![DimensionInfo {
                identifier: "Time".to_string(),
                default: config.times.last().cloned().unwrap_or_default(),
                values: config.times.clone(),
            }]
        };
        LayerInfo {
            identifier: config.identifier.clone(),
            title: if config.title.is_empty() {
                config.identifier.clone()
            } else {
                config.title.clone()
            },
            abstract_text: config.abstract_text.clone(),
            styles: config
                .styles
                .iter()
                .enumerate()
                .map(|(index, style)| StyleInfo {
                    identifier: style.clone(),
                    title: style.clone(),
                    is_default: index == 0,
                })
                .collect(),
            formats: config.formats.clone(),
            info_formats: config.info_formats.clone(),
            tile_matrix_set_links: config.tile_matrix_sets.clone(),
            wgs84_bbox: config
                .bbox
                .clone()
                .unwrap_or_else(|| BoundingBox::new(-180.0, -90.0, 180.0, 90.0)),
            dimensions,
        }
    }
}

fn out_of_range(code: &str, locator: &str, value: u32, limit: u32) -> OwsError {
    HandlerError::new(format!("{} {} is outside 0..{}", locator, value, limit))
        .with_code(ExceptionCode::Custom(code.to_string()))
        .with_locator(locator)
        .into()
}

/// Longitude and latitude of the centre of pixel `i`/`j`.
fn pixel_position(set: &TileMatrixSet, matrix: &TileMatrix, tile: &GetTile, i: u32, j: u32) -> (f64, f64) {
    let geographic = !set.supported_crs.contains("3857");
    let meters_per_unit = if geographic { METERS_PER_DEGREE } else { 1.0 };
    let span = matrix.scale_denominator * PIXEL_SIZE / meters_per_unit;

    let (left, top) = matrix.top_left_corner;
    let x = left + (f64::from(tile.tile_col) * f64::from(matrix.tile_width) + f64::from(i) + 0.5) * span;
    let y = top - (f64::from(tile.tile_row) * f64::from(matrix.tile_height) + f64::from(j) + 0.5) * span;

    if geographic {
        (x, y)
    } else {
        let lon = (x / EARTH_RADIUS).to_degrees();
        let lat = (2.0 * (y / EARTH_RADIUS).exp().atan() - std::f64::consts::FRAC_PI_2).to_degrees();
        (lon, lat)
    }
}

pub fn get_tile(tiles: Arc<TileDirectory>) -> Arc<dyn Handler> {
    Arc::new(move |request: CanonicalRequest| -> OwsResult<CanonicalResponse> {
        match &request.payload {
            RequestPayload::GetTile(tile) => Ok(CanonicalResponse::Document(tiles.get_tile(tile)?)),
            _ => Err(unexpected(&request)),
        }
    })
}

pub fn get_feature_info(tiles: Arc<TileDirectory>) -> Arc<dyn Handler> {
    Arc::new(move |request: CanonicalRequest| -> OwsResult<CanonicalResponse> {
        match &request.payload {
            RequestPayload::GetFeatureInfo(info) => Ok(CanonicalResponse::Document(tiles.feature_info(info)?)),
            _ => Err(unexpected(&request)),
        }
    })
}
