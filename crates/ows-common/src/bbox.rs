//! Bounding box types and operations.

use serde::{Deserialize, Serialize};

/// A bounding box with an optional CRS identifier.
///
/// Coordinates are kept in the axis order they were given in; no axis
/// swapping or reprojection happens here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crs: Option<String>,
}

impl BoundingBox {
    /// Create a new bounding box from corner coordinates.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
            crs: None,
        }
    }

    pub fn with_crs(mut self, crs: impl Into<String>) -> Self {
        self.crs = Some(crs.into());
        self
    }

    /// Parse a KVP `BBOX` value: `minx,miny,maxx,maxy[,crs]`.
    pub fn from_kvp_string(s: &str) -> Result<Self, BboxParseError> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 && parts.len() != 5 {
            return Err(BboxParseError::InvalidFormat(s.to_string()));
        }

        let number = |p: &str| -> Result<f64, BboxParseError> {
            p.parse()
                .map_err(|_| BboxParseError::InvalidNumber(p.to_string()))
        };

        let bbox = Self::new(
            number(parts[0])?,
            number(parts[1])?,
            number(parts[2])?,
            number(parts[3])?,
        );
        if bbox.min_x > bbox.max_x || bbox.min_y > bbox.max_y {
            return Err(BboxParseError::InvertedCorners(s.to_string()));
        }

        Ok(match parts.get(4) {
            Some(crs) if !crs.is_empty() => bbox.with_crs(*crs),
            _ => bbox,
        })
    }

    /// Parse GML/OWS corner pairs such as `"7.0 50.0"` and `"8.0 51.0"`.
    pub fn from_corners(lower: &str, upper: &str) -> Result<Self, BboxParseError> {
        let pair = |s: &str| -> Result<(f64, f64), BboxParseError> {
            let coords: Vec<&str> = s.split_whitespace().collect();
            if coords.len() != 2 {
                return Err(BboxParseError::InvalidFormat(s.to_string()));
            }
            let x = coords[0]
                .parse()
                .map_err(|_| BboxParseError::InvalidNumber(coords[0].to_string()))?;
            let y = coords[1]
                .parse()
                .map_err(|_| BboxParseError::InvalidNumber(coords[1].to_string()))?;
            Ok((x, y))
        };
        let (min_x, min_y) = pair(lower)?;
        let (max_x, max_y) = pair(upper)?;
        Ok(Self::new(min_x, min_y, max_x, max_y))
    }

    /// KVP form, including the CRS when known.
    pub fn to_kvp_string(&self) -> String {
        let mut s = format!("{},{},{},{}", self.min_x, self.min_y, self.max_x, self.max_y);
        if let Some(crs) = &self.crs {
            s.push(',');
            s.push_str(crs);
        }
        s
    }

    pub fn lower_corner(&self) -> String {
        format!("{} {}", self.min_x, self.min_y)
    }

    pub fn upper_corner(&self) -> String {
        format!("{} {}", self.max_x, self.max_y)
    }

    /// Width of the bounding box in coordinate units.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Height of the bounding box in coordinate units.
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Check if this bbox intersects another.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    /// Check if a point is contained within this bbox.
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BboxParseError {
    #[error("Invalid BBOX format: {0}. Expected 'minx,miny,maxx,maxy[,crs]'")]
    InvalidFormat(String),

    #[error("Invalid number in BBOX: {0}")]
    InvalidNumber(String),

    #[error("BBOX minimum exceeds maximum: {0}")]
    InvertedCorners(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kvp_bbox() {
        let bbox = BoundingBox::from_kvp_string("-125.0,24.0,-66.0,50.0").unwrap();
        assert_eq!(bbox.min_x, -125.0);
        assert_eq!(bbox.min_y, 24.0);
        assert_eq!(bbox.max_x, -66.0);
        assert_eq!(bbox.max_y, 50.0);
        assert_eq!(bbox.crs, None);
    }

    #[test]
    fn test_parse_kvp_bbox_with_crs() {
        let bbox =
            BoundingBox::from_kvp_string("7.0,50.0,8.0,51.0,urn:ogc:def:crs:EPSG::4326").unwrap();
        assert_eq!(bbox.crs.as_deref(), Some("urn:ogc:def:crs:EPSG::4326"));
        assert_eq!(bbox.to_kvp_string(), "7,50,8,51,urn:ogc:def:crs:EPSG::4326");
    }
}
