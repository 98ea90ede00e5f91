//! OGC WMTS 1.0.0 codec.
//!
//! Supports the KVP, RESTful and XML/SOAP request encodings. Tiles and
//! feature info are returned by handlers as pre-encoded documents.

use std::collections::BTreeMap;
use std::io::Write;

use ows_common::{KvpMap, OwsError, OwsResult, Protocol, ProtocolVersion, TileMatrixSet};

use crate::capabilities::{write_wgs84_bbox, AllowedValues, OwsSections, OwsVersion};
use crate::codec::{
    decode_get_capabilities, encode_get_capabilities_kvp, kvp_header, unencodable, unknown_operation,
    write_document, RequestCodec,
};
use crate::envelope::{RequestBody, RequestEnvelope};
use crate::exceptions::FaultEnvelope;
use crate::namespaces;
use crate::request::{CanonicalRequest, GetFeatureInfo, GetTile, RequestPayload};
use crate::response::{Capabilities, CanonicalResponse, CapabilitiesContents, LayerInfo};
use crate::xml::{XmlElement, XmlWriter};

const DEFAULT_STYLE: &str = "default";
const DEFAULT_FORMAT: &str = "image/png";
const DEFAULT_INFO_FORMAT: &str = "text/plain";

#[derive(Debug, Default)]
pub struct WmtsCodec;

impl WmtsCodec {
    pub const VERSION: ProtocolVersion = ProtocolVersion::new(1, 0, 0);

    pub fn new() -> Self {
        Self
    }

    fn decode_kvp(&self, envelope: &RequestEnvelope, kvp: &KvpMap) -> OwsResult<RequestPayload> {
        match envelope.operation.as_str() {
            "GetCapabilities" => Ok(RequestPayload::GetCapabilities(decode_get_capabilities(envelope))),
            "GetTile" => Ok(RequestPayload::GetTile(tile_from_kvp(kvp)?)),
            "GetFeatureInfo" => Ok(RequestPayload::GetFeatureInfo(GetFeatureInfo {
                tile: tile_from_kvp(kvp)?,
                i: kvp.require_value("I")?,
                j: kvp.require_value("J")?,
                info_format: kvp
                    .get("INFOFORMAT")
                    .unwrap_or(DEFAULT_INFO_FORMAT)
                    .to_string(),
            })),
            _ => Err(unknown_operation(envelope)),
        }
    }

    fn decode_xml(&self, envelope: &RequestEnvelope, root: &XmlElement) -> OwsResult<RequestPayload> {
        match envelope.operation.as_str() {
            "GetCapabilities" => Ok(RequestPayload::GetCapabilities(decode_get_capabilities(envelope))),
            "GetTile" => Ok(RequestPayload::GetTile(tile_from_xml(root)?)),
            "GetFeatureInfo" => {
                let tile = root
                    .child("GetTile")
                    .ok_or_else(|| OwsError::missing("GetTile"))?;
                Ok(RequestPayload::GetFeatureInfo(GetFeatureInfo {
                    tile: tile_from_xml(tile)?,
                    i: xml_number(root, "I")?,
                    j: xml_number(root, "J")?,
                    info_format: root
                        .child_text("InfoFormat")
                        .unwrap_or(DEFAULT_INFO_FORMAT)
                        .to_string(),
                }))
            }
            _ => Err(unknown_operation(envelope)),
        }
    }

    fn write_capabilities(&self, caps: &Capabilities, sink: &mut dyn Write) -> OwsResult<()> {
        let mut w = XmlWriter::new(sink);
        w.declaration()?;
        let mut attrs = vec![
            ("xmlns", namespaces::WMTS_100),
            ("xmlns:ows", namespaces::OWS_110),
            ("xmlns:xlink", namespaces::XLINK),
            ("xmlns:gml", namespaces::GML),
            ("version", "1.0.0"),
        ];
        if let Some(seq) = caps.update_sequence.as_deref() {
            attrs.push(("updateSequence", seq));
        }
        w.start("Capabilities", &attrs)?;

        OwsSections {
            ows: OwsVersion::V110,
            service_type: "OGC WMTS",
            versions: &["1.0.0"],
            capabilities: caps,
        }
        .write(
            &mut w,
            &[AllowedValues {
                name: "GetEncoding",
                values: &["KVP", "RESTful", "SOAP"],
            }],
        )?;

        if caps.includes("Contents") {
            w.start("Contents", &[])?;
            if let CapabilitiesContents::Layers {
                layers,
                tile_matrix_sets,
                rest_endpoint,
            } = &caps.contents
            {
                for layer in layers {
                    write_layer(&mut w, layer, rest_endpoint.as_deref())?;
                }
                for tms in tile_matrix_sets {
                    write_tile_matrix_set(&mut w, tms)?;
                }
            }
            w.end("Contents")?;
        }

        w.end("Capabilities")?;
        w.finish()
    }
}

impl RequestCodec for WmtsCodec {
    fn protocol(&self) -> Protocol {
        Protocol::Wmts
    }

    fn version(&self) -> ProtocolVersion {
        Self::VERSION
    }

    fn decode(&self, envelope: RequestEnvelope) -> OwsResult<CanonicalRequest> {
        let payload = match &envelope.body {
            RequestBody::Kvp(kvp) => self.decode_kvp(&envelope, kvp)?,
            RequestBody::Xml(root) => self.decode_xml(&envelope, root)?,
        };
        Ok(CanonicalRequest::new(Protocol::Wmts, Self::VERSION, envelope.handle, payload))
    }

    fn encode(&self, response: &CanonicalResponse, sink: &mut dyn Write) -> OwsResult<()> {
        match response {
            CanonicalResponse::Capabilities(caps) => self.write_capabilities(caps, sink),
            CanonicalResponse::Document(doc) => write_document(doc, sink),
            other => Err(unencodable(self, other)),
        }
    }

    fn fault_envelope(&self) -> FaultEnvelope {
        FaultEnvelope::Ows110 { version: "1.0.0" }
    }

    fn encode_request_kvp(&self, request: &CanonicalRequest) -> OwsResult<KvpMap> {
        let mut kvp = kvp_header(self, request);
        match &request.payload {
            RequestPayload::GetCapabilities(caps) => encode_get_capabilities_kvp(&mut kvp, caps),
            RequestPayload::GetTile(tile) => tile_to_kvp(&mut kvp, tile),
            RequestPayload::GetFeatureInfo(info) => {
                tile_to_kvp(&mut kvp, &info.tile);
                kvp.insert("I", info.i.to_string());
                kvp.insert("J", info.j.to_string());
                kvp.insert("INFOFORMAT", info.info_format.as_str());
            }
            _ => return Err(crate::codec::unencodable_request(self, request)),
        }
        Ok(kvp)
    }
}

fn tile_from_kvp(kvp: &KvpMap) -> OwsResult<GetTile> {
    let dimensions = kvp
        .iter()
        .filter(|(key, _)| *key == "TIME" || *key == "ELEVATION" || key.starts_with("DIM_"))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();

    Ok(GetTile {
        layer: kvp.require("LAYER")?.to_string(),
        style: kvp.get("STYLE").unwrap_or(DEFAULT_STYLE).to_string(),
        format: kvp.get("FORMAT").unwrap_or(DEFAULT_FORMAT).to_string(),
        tile_matrix_set: kvp.require("TILEMATRIXSET")?.to_string(),
        tile_matrix: kvp.require("TILEMATRIX")?.to_string(),
        tile_row: kvp.require_value("TILEROW")?,
        tile_col: kvp.require_value("TILECOL")?,
        dimensions,
    })
}

fn tile_to_kvp(kvp: &mut KvpMap, tile: &GetTile) {
    kvp.insert("LAYER", tile.layer.as_str());
    kvp.insert("STYLE", tile.style.as_str());
    kvp.insert("FORMAT", tile.format.as_str());
    kvp.insert("TILEMATRIXSET", tile.tile_matrix_set.as_str());
    kvp.insert("TILEMATRIX", tile.tile_matrix.as_str());
    kvp.insert("TILEROW", tile.tile_row.to_string());
    kvp.insert("TILECOL", tile.tile_col.to_string());
    for (name, value) in &tile.dimensions {
        kvp.insert(name, value.as_str());
    }
}

fn tile_from_xml(element: &XmlElement) -> OwsResult<GetTile> {
    let required = |name: &str| {
        element
            .child_text(name)
            .map(str::to_string)
            .ok_or_else(|| OwsError::missing(name))
    };

    let mut dimensions = BTreeMap::new();
    for dim in element.children_named("DimensionNameValue") {
        let name = dim
            .attr("name")
            .ok_or_else(|| OwsError::missing("DimensionNameValue@name"))?;
        dimensions.insert(name.to_ascii_uppercase(), dim.text().to_string());
    }

    Ok(GetTile {
        layer: required("Layer")?,
        style: element.child_text("Style").unwrap_or(DEFAULT_STYLE).to_string(),
        format: element.child_text("Format").unwrap_or(DEFAULT_FORMAT).to_string(),
        tile_matrix_set: required("TileMatrixSet")?,
        tile_matrix: required("TileMatrix")?,
        tile_row: xml_number(element, "TileRow")?,
        tile_col: xml_number(element, "TileCol")?,
        dimensions,
    })
}

fn xml_number(element: &XmlElement, name: &str) -> OwsResult<u32> {
    let raw = element.child_text(name).ok_or_else(|| OwsError::missing(name))?;
    raw.parse()
        .map_err(|_| OwsError::invalid_value(name, format!("'{}' is not a non-negative integer", raw)))
}

fn write_layer(w: &mut XmlWriter<'_>, layer: &LayerInfo, rest_endpoint: Option<&str>) -> OwsResult<()> {
    w.start("Layer", &[])?;
    w.simple("ows:Title", &layer.title)?;
    w.optional("ows:Abstract", layer.abstract_text.as_deref())?;
    write_wgs84_bbox(w, &layer.wgs84_bbox)?;
    w.simple("ows:Identifier", &layer.identifier)?;

    for style in &layer.styles {
        let is_default = if style.is_default { "true" } else { "false" };
        w.start("Style", &[("isDefault", is_default)])?;
        w.simple("ows:Title", &style.title)?;
        w.simple("ows:Identifier", &style.identifier)?;
        w.end("Style")?;
    }
    for format in &layer.formats {
        w.simple("Format", format)?;
    }
    for format in &layer.info_formats {
        w.simple("InfoFormat", format)?;
    }
    for dim in &layer.dimensions {
        w.start("Dimension", &[])?;
        w.simple("ows:Identifier", &dim.identifier)?;
        w.simple("Default", &dim.default)?;
        for value in &dim.values {
            w.simple("Value", value)?;
        }
        w.end("Dimension")?;
    }
    for link in &layer.tile_matrix_set_links {
        w.start("TileMatrixSetLink", &[])?;
        w.simple("TileMatrixSet", link)?;
        w.end("TileMatrixSetLink")?;
    }

    if let Some(base) = rest_endpoint {
        let time = if layer.dimensions.iter().any(|d| d.identifier.eq_ignore_ascii_case("time")) {
            "{Time}/"
        } else {
            ""
        };
        for format in &layer.formats {
            let template = format!(
                "{}/{}/{{Style}}/{}{{TileMatrixSet}}/{{TileMatrix}}/{{TileRow}}/{{TileCol}}.{}",
                base.trim_end_matches('/'),
                layer.identifier,
                time,
                format_extension(format)
            );
            w.empty(
                "ResourceURL",
                &[
                    ("format", format.as_str()),
                    ("resourceType", "tile"),
                    ("template", template.as_str()),
                ],
            )?;
        }
    }
    w.end("Layer")
}

fn write_tile_matrix_set(w: &mut XmlWriter<'_>, tms: &TileMatrixSet) -> OwsResult<()> {
    w.start("TileMatrixSet", &[])?;
    w.simple("ows:Identifier", &tms.identifier)?;
    w.start("ows:BoundingBox", &[("crs", tms.supported_crs.as_str())])?;
    w.simple("ows:LowerCorner", &tms.bounding_box.lower_corner())?;
    w.simple("ows:UpperCorner", &tms.bounding_box.upper_corner())?;
    w.end("ows:BoundingBox")?;
    w.simple("ows:SupportedCRS", &tms.supported_crs)?;
    w.optional("WellKnownScaleSet", tms.well_known_scale_set.as_deref())?;

    for matrix in &tms.tile_matrices {
        w.start("TileMatrix", &[])?;
        w.simple("ows:Identifier", &matrix.identifier)?;
        w.simple("ScaleDenominator", &matrix.scale_denominator.to_string())?;
        w.simple(
            "TopLeftCorner",
            &format!("{} {}", matrix.top_left_corner.0, matrix.top_left_corner.1),
        )?;
        w.simple("TileWidth", &matrix.tile_width.to_string())?;
        w.simple("TileHeight", &matrix.tile_height.to_string())?;
        w.simple("MatrixWidth", &matrix.matrix_width.to_string())?;
        w.simple("MatrixHeight", &matrix.matrix_height.to_string())?;
        w.end("TileMatrix")?;
    }
    w.end("TileMatrixSet")
}

/// File extension used by the RESTful binding for a tile format.
pub fn format_extension(format: &str) -> &str {
    match format {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        other => other.rsplit('/').next().unwrap_or(other),
    }
}

/// RESTful URL path parameters for WMTS.
#[derive(Debug, Clone)]
pub struct WmtsRestPath {
    pub layer: String,
    pub style: String,
    pub tile_matrix_set: String,
    pub tile_matrix: String,
    pub tile_row: u32,
    pub tile_col: u32,
    pub format: String,
    pub time: Option<String>,
}

impl WmtsRestPath {
    /// Parse a RESTful WMTS URL path.
    ///
    /// Expected formats:
    /// - /{layer}/{style}/{TileMatrixSet}/{TileMatrix}/{TileRow}/{TileCol}.{format}
    /// - /{layer}/{style}/{time}/{TileMatrixSet}/{TileMatrix}/{TileRow}/{TileCol}.{format}
    pub fn parse(path: &str) -> OwsResult<Self> {
        let parts: Vec<&str> = path.trim_matches('/').split('/').collect();

        let (layer, style, time, tms_idx) = match parts.len() {
            6 => (parts[0], parts[1], None, 2),
            7 => (parts[0], parts[1], Some(parts[2].to_string()), 3),
            _ => {
                return Err(OwsError::MalformedRequest(format!(
                    "Invalid RESTful tile path: {}",
                    path
                )))
            }
        };

        let tile_row: u32 = parts[tms_idx + 2]
            .parse()
            .map_err(|_| OwsError::invalid_value("TileRow", format!("Invalid tile row: {}", parts[tms_idx + 2])))?;

        // Last part is TileCol.format
        let last = parts[tms_idx + 3];
        let (tile_col, extension) = last
            .rsplit_once('.')
            .ok_or_else(|| OwsError::invalid_value("TileCol", "Missing format extension"))?;
        let tile_col: u32 = tile_col
            .parse()
            .map_err(|_| OwsError::invalid_value("TileCol", format!("Invalid tile column: {}", tile_col)))?;

        let format = match extension {
            "png" => "image/png".to_string(),
            "jpg" | "jpeg" => "image/jpeg".to_string(),
            "webp" => "image/webp".to_string(),
            other => other.to_string(),
        };

        Ok(Self {
            layer: layer.to_string(),
            style: style.to_string(),
            tile_matrix_set: parts[tms_idx].to_string(),
            tile_matrix: parts[tms_idx + 1].to_string(),
            tile_row,
            tile_col,
            format,
            time,
        })
    }

    /// The equivalent KVP GetTile request, decoded by the regular codec.
    pub fn into_kvp(self) -> KvpMap {
        let mut kvp = KvpMap::new();
        kvp.insert("SERVICE", "WMTS");
        kvp.insert("REQUEST", "GetTile");
        kvp.insert("VERSION", "1.0.0");
        kvp.insert("LAYER", self.layer);
        kvp.insert("STYLE", self.style);
        kvp.insert("FORMAT", self.format);
        kvp.insert("TILEMATRIXSET", self.tile_matrix_set);
        kvp.insert("TILEMATRIX", self.tile_matrix);
        kvp.insert("TILEROW", self.tile_row.to_string());
        kvp.insert("TILECOL", self.tile_col.to_string());
        if let Some(time) = self.time {
            kvp.insert("TIME", time);
        }
        kvp
    }
}
