//! WMTS tile matrix sets.

use serde::{Deserialize, Serialize};

use crate::BoundingBox;

/// Scale denominator of zoom level 0 for the 256px quad-tree sets.
const QUAD_SCALE_DENOMINATOR: f64 = 559082264.0287178;

/// A single tile matrix (zoom level) definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileMatrix {
    pub identifier: String,
    pub scale_denominator: f64,
    /// Top-left corner coordinates in the set's CRS axis order.
    pub top_left_corner: (f64, f64),
    pub tile_width: u32,
    pub tile_height: u32,
    /// Number of tile columns
    pub matrix_width: u32,
    /// Number of tile rows
    pub matrix_height: u32,
}

impl TileMatrix {
    /// Whether `row`/`col` address a tile inside this matrix.
    pub fn contains_tile(&self, row: u32, col: u32) -> bool {
        row < self.matrix_height && col < self.matrix_width
    }

    /// Whether pixel `i`/`j` lies inside one tile of this matrix.
    pub fn contains_pixel(&self, i: u32, j: u32) -> bool {
        i < self.tile_width && j < self.tile_height
    }
}

/// A complete tile matrix set definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileMatrixSet {
    pub identifier: String,
    /// CRS URN advertised as `ows:SupportedCRS`.
    pub supported_crs: String,
    pub bounding_box: BoundingBox,
    pub well_known_scale_set: Option<String>,
    pub tile_matrices: Vec<TileMatrix>,
}

impl TileMatrixSet {
    /// Get a tile matrix by identifier.
    pub fn get_matrix(&self, identifier: &str) -> Option<&TileMatrix> {
        self.tile_matrices
            .iter()
            .find(|m| m.identifier == identifier)
    }

    /// Look up one of the built-in sets by identifier.
    pub fn well_known(identifier: &str, max_zoom: u32) -> Option<TileMatrixSet> {
        match identifier {
            "WebMercatorQuad" => Some(web_mercator_tile_matrix_set(max_zoom)),
            "WorldCRS84Quad" => Some(wgs84_tile_matrix_set(max_zoom)),
            _ => None,
        }
    }
}

/// Web Mercator (Google/OSM) quad tree, levels `0..=max_zoom`.
pub fn web_mercator_tile_matrix_set(max_zoom: u32) -> TileMatrixSet {
    let max_extent = 20037508.342789244;

    let tile_matrices = (0..=max_zoom.min(22))
        .map(|z| {
            let n = 2u32.pow(z);
            TileMatrix {
                identifier: z.to_string(),
                scale_denominator: QUAD_SCALE_DENOMINATOR / n as f64,
                top_left_corner: (-max_extent, max_extent),
                tile_width: 256,
                tile_height: 256,
                matrix_width: n,
                matrix_height: n,
            }
        })
        .collect();

    TileMatrixSet {
        identifier: "WebMercatorQuad".to_string(),
        supported_crs: "urn:ogc:def:crs:EPSG::3857".to_string(),
        bounding_box: BoundingBox::new(-max_extent, -max_extent, max_extent, max_extent),
        well_known_scale_set: Some(
            "http://www.opengis.net/def/wkss/OGC/1.0/GoogleMapsCompatible".to_string(),
        ),
        tile_matrices,
    }
}

/// Geographic quad tree with two columns at level 0.
pub fn wgs84_tile_matrix_set(max_zoom: u32) -> TileMatrixSet {
    let tile_matrices = (0..=max_zoom.min(22))
        .map(|z| {
            let n_rows = 2u32.pow(z);
            TileMatrix {
                identifier: z.to_string(),
                scale_denominator: QUAD_SCALE_DENOMINATOR / 2.0 / n_rows as f64,
                top_left_corner: (-180.0, 90.0),
                tile_width: 256,
                tile_height: 256,
                matrix_width: n_rows * 2,
                matrix_height: n_rows,
            }
        })
        .collect();

    TileMatrixSet {
        identifier: "WorldCRS84Quad".to_string(),
        supported_crs: "urn:ogc:def:crs:OGC:1.3:CRS84".to_string(),
        bounding_box: BoundingBox::new(-180.0, -90.0, 180.0, 90.0),
        well_known_scale_set: Some(
            "http://www.opengis.net/def/wkss/OGC/1.0/GoogleCRS84Quad".to_string(),
        ),
        tile_matrices,
    }
}
