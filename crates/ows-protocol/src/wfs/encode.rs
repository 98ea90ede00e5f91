//! WFS response documents for each version.

use std::collections::BTreeMap;
use std::io::Write;

use ows_common::OwsResult;

use super::{WfsCodec, WfsVersion};
use crate::capabilities::{write_wgs84_bbox, AllowedValues, OwsSections, OwsVersion};
use crate::codec::{unencodable, write_document};
use crate::namespaces;
use crate::request::QName;
use crate::response::{
    Capabilities, CanonicalResponse, CapabilitiesContents, Feature, FeatureCollection, FeatureSchema,
    FeatureTypeInfo, LockFeatureResult, Point, PropertyType,
};
use crate::xml::XmlWriter;

pub(super) fn write(codec: &WfsCodec, response: &CanonicalResponse, sink: &mut dyn Write) -> OwsResult<()> {
    let version = codec.wfs_version();
    match response {
        CanonicalResponse::Capabilities(caps) if version == WfsVersion::V100 => {
            write_capabilities_100(caps, sink)
        }
        CanonicalResponse::Capabilities(caps) => write_capabilities(version, caps, sink),
        CanonicalResponse::FeatureSchema(schema) => write_schema(version, schema, sink),
        CanonicalResponse::FeatureCollection(collection) => {
            write_feature_collection(version, collection, sink)
        }
        CanonicalResponse::LockFeature(result) => write_lock_result(version, result, sink),
        CanonicalResponse::Document(doc) => write_document(doc, sink),
        other => Err(unencodable(codec, other)),
    }
}

fn feature_types(caps: &Capabilities) -> &[FeatureTypeInfo] {
    match &caps.contents {
        CapabilitiesContents::FeatureTypes(types) => types,
        _ => &[],
    }
}

/// `xmlns:prefix` declaration for a qualified name, if it has a namespace.
fn declaration(name: &QName) -> Option<(String, &str)> {
    let uri = name.namespace.as_deref()?;
    let key = match &name.prefix {
        Some(prefix) => format!("xmlns:{}", prefix),
        None => "xmlns".to_string(),
    };
    Some((key, uri))
}

fn fmt_coord(value: f64) -> String {
    format!("{}", value)
}

// === Capabilities ===

const OPERATIONS_100: &[&str] = &["GetCapabilities", "DescribeFeatureType", "GetFeature", "LockFeature"];

fn write_capabilities_100(caps: &Capabilities, sink: &mut dyn Write) -> OwsResult<()> {
    let service = &caps.service;
    let href = service.online_resource.as_str();

    let mut w = XmlWriter::new(sink);
    w.declaration()?;
    let mut attrs = vec![
        ("xmlns", namespaces::WFS),
        ("xmlns:ogc", namespaces::OGC),
        ("version", "1.0.0"),
    ];
    if let Some(seq) = caps.update_sequence.as_deref() {
        attrs.push(("updateSequence", seq));
    }
    w.start("WFS_Capabilities", &attrs)?;

    w.start("Service", &[])?;
    w.simple("Name", "WFS")?;
    w.simple("Title", &service.title)?;
    w.optional("Abstract", service.abstract_text.as_deref())?;
    if !service.keywords.is_empty() {
        w.simple("Keywords", &service.keywords.join(", "))?;
    }
    w.simple("OnlineResource", href)?;
    w.simple("Fees", service.fees.as_deref().unwrap_or("NONE"))?;
    w.simple(
        "AccessConstraints",
        service.access_constraints.as_deref().unwrap_or("NONE"),
    )?;
    w.end("Service")?;

    w.start("Capability", &[])?;
    w.start("Request", &[])?;
    for operation in caps
        .operations
        .iter()
        .filter(|op| OPERATIONS_100.contains(&op.as_str()))
    {
        let name = operation.as_str();
        w.start(name, &[])?;
        match name {
            "DescribeFeatureType" => {
                w.start("SchemaDescriptionLanguage", &[])?;
                w.empty("XMLSCHEMA", &[])?;
                w.end("SchemaDescriptionLanguage")?;
            }
            "GetFeature" => {
                w.start("ResultFormat", &[])?;
                w.empty("GML2", &[])?;
                w.end("ResultFormat")?;
            }
            _ => {}
        }
        for method in ["Get", "Post"] {
            w.start("DCPType", &[])?;
            w.start("HTTP", &[])?;
            w.empty(method, &[("onlineResource", href)])?;
            w.end("HTTP")?;
            w.end("DCPType")?;
        }
        w.end(name)?;
    }
    w.end("Request")?;
    w.end("Capability")?;

    w.start("FeatureTypeList", &[])?;
    w.start("Operations", &[])?;
    w.empty("Query", &[])?;
    w.empty("Lock", &[])?;
    w.end("Operations")?;
    for feature_type in feature_types(caps) {
        let decl = declaration(&feature_type.name);
        let attrs: Vec<(&str, &str)> = decl.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        w.start("FeatureType", &attrs)?;
        w.simple("Name", &feature_type.name.to_string())?;
        w.simple("Title", &feature_type.title)?;
        w.optional("Abstract", feature_type.abstract_text.as_deref())?;
        w.simple("SRS", &feature_type.default_crs)?;
        if let Some(bbox) = &feature_type.wgs84_bbox {
            let (minx, miny, maxx, maxy) = (
                fmt_coord(bbox.min_x),
                fmt_coord(bbox.min_y),
                fmt_coord(bbox.max_x),
                fmt_coord(bbox.max_y),
            );
            w.empty(
                "LatLongBoundingBox",
                &[
                    ("minx", minx.as_str()),
                    ("miny", miny.as_str()),
                    ("maxx", maxx.as_str()),
                    ("maxy", maxy.as_str()),
                ],
            )?;
        }
        w.end("FeatureType")?;
    }
    w.end("FeatureTypeList")?;

    w.start("ogc:Filter_Capabilities", &[])?;
    w.start("ogc:Spatial_Capabilities", &[])?;
    w.start("ogc:Spatial_Operators", &[])?;
    w.empty("ogc:BBOX", &[])?;
    w.end("ogc:Spatial_Operators")?;
    w.end("ogc:Spatial_Capabilities")?;
    w.start("ogc:Scalar_Capabilities", &[])?;
    w.empty("ogc:Logical_Operators", &[])?;
    w.end("ogc:Scalar_Capabilities")?;
    w.end("ogc:Filter_Capabilities")?;

    w.end("WFS_Capabilities")?;
    w.finish()
}

fn write_capabilities(version: WfsVersion, caps: &Capabilities, sink: &mut dyn Write) -> OwsResult<()> {
    let (ows, ows_ns, filter_prefix, filter_ns, version_str) = match version {
        WfsVersion::V200 => (OwsVersion::V110, namespaces::OWS_110, "fes", namespaces::FES_20, "2.0.0"),
        _ => (OwsVersion::V100, namespaces::OWS_100, "ogc", namespaces::OGC, "1.1.0"),
    };
    let filter_decl = format!("xmlns:{}", filter_prefix);

    let mut w = XmlWriter::new(sink);
    w.declaration()?;
    let mut attrs = vec![
        ("xmlns:wfs", version.wfs_namespace()),
        ("xmlns:ows", ows_ns),
        (filter_decl.as_str(), filter_ns),
        ("xmlns:gml", version.gml_namespace()),
        ("xmlns:xlink", namespaces::XLINK),
        ("version", version_str),
    ];
    if let Some(seq) = caps.update_sequence.as_deref() {
        attrs.push(("updateSequence", seq));
    }
    w.start("wfs:WFS_Capabilities", &attrs)?;

    OwsSections {
        ows,
        service_type: "WFS",
        versions: &[version_str],
        capabilities: caps,
    }
    .write(
        &mut w,
        &[AllowedValues {
            name: "outputFormat",
            values: &[version.gml_content_type()],
        }],
    )?;

    if caps.includes("FeatureTypeList") {
        w.start("wfs:FeatureTypeList", &[])?;
        if version == WfsVersion::V110 {
            w.start("wfs:Operations", &[])?;
            w.simple("wfs:Operation", "Query")?;
            w.simple("wfs:Operation", "Lock")?;
            w.end("wfs:Operations")?;
        }
        let crs_element = match version {
            WfsVersion::V200 => "wfs:DefaultCRS",
            _ => "wfs:DefaultSRS",
        };
        for feature_type in feature_types(caps) {
            let decl = declaration(&feature_type.name);
            let attrs: Vec<(&str, &str)> = decl.iter().map(|(k, v)| (k.as_str(), *v)).collect();
            w.start("wfs:FeatureType", &attrs)?;
            w.simple("wfs:Name", &feature_type.name.to_string())?;
            w.simple("wfs:Title", &feature_type.title)?;
            w.optional("wfs:Abstract", feature_type.abstract_text.as_deref())?;
            w.simple(crs_element, &feature_type.default_crs)?;
            if let Some(bbox) = &feature_type.wgs84_bbox {
                write_wgs84_bbox(&mut w, bbox)?;
            }
            w.end("wfs:FeatureType")?;
        }
        w.end("wfs:FeatureTypeList")?;
    }

    if caps.includes("Filter_Capabilities") {
        match version {
            WfsVersion::V200 => write_fes_capabilities(&mut w)?,
            _ => write_ogc_filter_capabilities(&mut w)?,
        }
    }

    w.end("wfs:WFS_Capabilities")?;
    w.finish()
}

fn write_ogc_filter_capabilities(w: &mut XmlWriter<'_>) -> OwsResult<()> {
    w.start("ogc:Filter_Capabilities", &[])?;
    w.start("ogc:Spatial_Capabilities", &[])?;
    w.start("ogc:GeometryOperands", &[])?;
    w.simple("ogc:GeometryOperand", "gml:Envelope")?;
    w.end("ogc:GeometryOperands")?;
    w.start("ogc:SpatialOperators", &[])?;
    w.empty("ogc:SpatialOperator", &[("name", "BBOX")])?;
    w.end("ogc:SpatialOperators")?;
    w.end("ogc:Spatial_Capabilities")?;
    w.start("ogc:Scalar_Capabilities", &[])?;
    w.empty("ogc:LogicalOperators", &[])?;
    w.end("ogc:Scalar_Capabilities")?;
    w.start("ogc:Id_Capabilities", &[])?;
    w.empty("ogc:FID", &[])?;
    w.empty("ogc:EID", &[])?;
    w.end("ogc:Id_Capabilities")?;
    w.end("ogc:Filter_Capabilities")
}

fn write_fes_capabilities(w: &mut XmlWriter<'_>) -> OwsResult<()> {
    w.start("fes:Filter_Capabilities", &[])?;
    w.start("fes:Conformance", &[])?;
    for (name, supported) in [
        ("ImplementsQuery", "TRUE"),
        ("ImplementsAdHocQuery", "TRUE"),
        ("ImplementsResourceId", "TRUE"),
        ("ImplementsMinSpatialFilter", "TRUE"),
        ("ImplementsFunctions", "FALSE"),
    ] {
        w.start("fes:Constraint", &[("name", name)])?;
        w.empty("ows:NoValues", &[])?;
        w.simple("ows:DefaultValue", supported)?;
        w.end("fes:Constraint")?;
    }
    w.end("fes:Conformance")?;
    w.start("fes:Id_Capabilities", &[])?;
    w.empty("fes:ResourceIdentifier", &[("name", "fes:ResourceId")])?;
    w.end("fes:Id_Capabilities")?;
    w.start("fes:Spatial_Capabilities", &[])?;
    w.start("fes:GeometryOperands", &[])?;
    w.empty("fes:GeometryOperand", &[("name", "gml:Envelope")])?;
    w.end("fes:GeometryOperands")?;
    w.start("fes:SpatialOperators", &[])?;
    w.empty("fes:SpatialOperator", &[("name", "BBOX")])?;
    w.end("fes:SpatialOperators")?;
    w.end("fes:Spatial_Capabilities")?;
    w.end("fes:Filter_Capabilities")
}

// === DescribeFeatureType ===

fn write_schema(version: WfsVersion, schema: &FeatureSchema, sink: &mut dyn Write) -> OwsResult<()> {
    let (gml_location, substitution_group) = match version {
        WfsVersion::V100 => ("http://schemas.opengis.net/gml/2.1.2/feature.xsd", "gml:_Feature"),
        WfsVersion::V110 => ("http://schemas.opengis.net/gml/3.1.1/base/gml.xsd", "gml:_Feature"),
        WfsVersion::V200 => ("http://schemas.opengis.net/gml/3.2.1/gml.xsd", "gml:AbstractFeature"),
    };
    let prefix_decl = format!("xmlns:{}", schema.target_prefix);

    let mut w = XmlWriter::new(sink);
    w.declaration()?;
    w.start(
        "xsd:schema",
        &[
            ("xmlns:xsd", namespaces::XSD),
            ("xmlns:gml", version.gml_namespace()),
            (prefix_decl.as_str(), schema.target_namespace.as_str()),
            ("targetNamespace", schema.target_namespace.as_str()),
            ("elementFormDefault", "qualified"),
        ],
    )?;
    w.empty(
        "xsd:import",
        &[
            ("namespace", version.gml_namespace()),
            ("schemaLocation", gml_location),
        ],
    )?;

    for feature_type in &schema.feature_types {
        let local = feature_type.name.local_name.as_str();
        let type_name = format!("{}Type", local);
        let qualified_type = format!("{}:{}", schema.target_prefix, type_name);
        w.empty(
            "xsd:element",
            &[
                ("name", local),
                ("type", qualified_type.as_str()),
                ("substitutionGroup", substitution_group),
            ],
        )?;

        w.start("xsd:complexType", &[("name", type_name.as_str())])?;
        w.start("xsd:complexContent", &[])?;
        w.start("xsd:extension", &[("base", "gml:AbstractFeatureType")])?;
        w.start("xsd:sequence", &[])?;
        for property in &feature_type.properties {
            let xsd_type = match property.property_type {
                PropertyType::String => "xsd:string",
                PropertyType::Integer => "xsd:integer",
                PropertyType::Double => "xsd:double",
                PropertyType::Point => "gml:PointPropertyType",
            };
            let mut attrs = vec![("name", property.name.as_str()), ("type", xsd_type)];
            if property.optional {
                attrs.push(("minOccurs", "0"));
            }
            w.empty("xsd:element", &attrs)?;
        }
        w.end("xsd:sequence")?;
        w.end("xsd:extension")?;
        w.end("xsd:complexContent")?;
        w.end("xsd:complexType")?;
    }

    w.end("xsd:schema")?;
    w.finish()
}

// === GetFeature ===

fn write_feature_collection(
    version: WfsVersion,
    collection: &FeatureCollection,
    sink: &mut dyn Write,
) -> OwsResult<()> {
    // Feature namespaces are declared once on the root, in sorted order.
    let mut bindings: BTreeMap<String, &str> = BTreeMap::new();
    for feature in &collection.features {
        if let Some((key, uri)) = declaration(&feature.type_name) {
            bindings.entry(key).or_insert(uri);
        }
    }

    let returned = collection.features.len().to_string();
    let matched = match (version, collection.number_matched) {
        (WfsVersion::V200, None) => "unknown".to_string(),
        // 1.1 reports a hits count through numberOfFeatures.
        (WfsVersion::V110, Some(n)) if collection.features.is_empty() => n.to_string(),
        (WfsVersion::V110, _) => returned.clone(),
        (_, Some(n)) => n.to_string(),
        (_, None) => returned.clone(),
    };

    let mut attrs = vec![
        ("xmlns:wfs", version.wfs_namespace()),
        ("xmlns:gml", version.gml_namespace()),
    ];
    attrs.extend(bindings.iter().map(|(k, v)| (k.as_str(), *v)));
    match version {
        WfsVersion::V100 => {}
        WfsVersion::V110 => {
            attrs.push(("numberOfFeatures", matched.as_str()));
            attrs.push(("timeStamp", collection.timestamp.as_str()));
        }
        WfsVersion::V200 => {
            attrs.push(("numberMatched", matched.as_str()));
            attrs.push(("numberReturned", returned.as_str()));
            attrs.push(("timeStamp", collection.timestamp.as_str()));
        }
    }

    let mut w = XmlWriter::new(sink);
    w.declaration()?;
    w.start("wfs:FeatureCollection", &attrs)?;
    let member = match version {
        WfsVersion::V200 => "wfs:member",
        _ => "gml:featureMember",
    };
    for feature in &collection.features {
        w.start(member, &[])?;
        write_feature(&mut w, version, feature)?;
        w.end(member)?;
    }
    w.end("wfs:FeatureCollection")?;
    w.finish()
}

fn write_feature(w: &mut XmlWriter<'_>, version: WfsVersion, feature: &Feature) -> OwsResult<()> {
    let element = feature.type_name.to_string();
    let qualify = |local: &str| match &feature.type_name.prefix {
        Some(prefix) => format!("{}:{}", prefix, local),
        None => local.to_string(),
    };

    let id_attr = match version {
        WfsVersion::V100 => "fid",
        _ => "gml:id",
    };
    w.start(&element, &[(id_attr, feature.id.as_str())])?;
    for (name, value) in &feature.properties {
        w.simple(&qualify(name), value)?;
    }
    if let Some((name, point)) = &feature.geometry {
        let property = qualify(name);
        w.start(&property, &[])?;
        write_point(w, version, &format!("{}.{}", feature.id, name), point)?;
        w.end(&property)?;
    }
    w.end(&element)
}

fn write_point(w: &mut XmlWriter<'_>, version: WfsVersion, gml_id: &str, point: &Point) -> OwsResult<()> {
    let mut attrs = Vec::new();
    if version == WfsVersion::V200 {
        attrs.push(("gml:id", gml_id));
    }
    if let Some(srs) = point.srs_name.as_deref() {
        attrs.push(("srsName", srs));
    }
    w.start("gml:Point", &attrs)?;
    match version {
        WfsVersion::V100 => w.simple(
            "gml:coordinates",
            &format!("{},{}", fmt_coord(point.x), fmt_coord(point.y)),
        )?,
        _ => w.simple(
            "gml:pos",
            &format!("{} {}", fmt_coord(point.x), fmt_coord(point.y)),
        )?,
    }
    w.end("gml:Point")
}

// === LockFeature ===

fn write_lock_result(version: WfsVersion, result: &LockFeatureResult, sink: &mut dyn Write) -> OwsResult<()> {
    let mut w = XmlWriter::new(sink);
    w.declaration()?;
    match version {
        WfsVersion::V100 => {
            w.start(
                "WFS_LockFeatureResponse",
                &[("xmlns", namespaces::WFS), ("xmlns:ogc", namespaces::OGC)],
            )?;
            w.simple("LockId", &result.lock_id)?;
            write_lock_ids(&mut w, "FeaturesLocked", "ogc:FeatureId", "fid", &result.locked)?;
            write_lock_ids(&mut w, "FeaturesNotLocked", "ogc:FeatureId", "fid", &result.not_locked)?;
            w.end("WFS_LockFeatureResponse")?;
        }
        WfsVersion::V110 => {
            w.start(
                "wfs:LockFeatureResponse",
                &[("xmlns:wfs", namespaces::WFS), ("xmlns:ogc", namespaces::OGC)],
            )?;
            w.simple("wfs:LockId", &result.lock_id)?;
            write_lock_ids(&mut w, "wfs:FeaturesLocked", "ogc:FeatureId", "fid", &result.locked)?;
            write_lock_ids(&mut w, "wfs:FeaturesNotLocked", "ogc:FeatureId", "fid", &result.not_locked)?;
            w.end("wfs:LockFeatureResponse")?;
        }
        WfsVersion::V200 => {
            w.start(
                "wfs:LockFeatureResponse",
                &[
                    ("xmlns:wfs", namespaces::WFS_20),
                    ("xmlns:fes", namespaces::FES_20),
                    ("lockId", result.lock_id.as_str()),
                ],
            )?;
            write_lock_ids(&mut w, "wfs:FeaturesLocked", "fes:ResourceId", "rid", &result.locked)?;
            write_lock_ids(&mut w, "wfs:FeaturesNotLocked", "fes:ResourceId", "rid", &result.not_locked)?;
            w.end("wfs:LockFeatureResponse")?;
        }
    }
    w.finish()
}

fn write_lock_ids(
    w: &mut XmlWriter<'_>,
    wrapper: &str,
    element: &str,
    attr: &str,
    ids: &[String],
) -> OwsResult<()> {
    if ids.is_empty() {
        return Ok(());
    }
    w.start(wrapper, &[])?;
    for id in ids {
        w.empty(element, &[(attr, id.as_str())])?;
    }
    w.end(wrapper)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::RequestCodec;
    use crate::response::{FeatureTypeDescription, PropertyDescription, ServiceMetadata};
    use ows_common::BoundingBox;

    fn render(codec: WfsCodec, response: &CanonicalResponse) -> String {
        let mut out = Vec::new();
        codec.encode(response, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn road() -> QName {
        QName::new(Some("app"), "Road", Some("http://example.org/app"))
    }

    fn capabilities() -> CanonicalResponse {
        CanonicalResponse::Capabilities(Capabilities {
            service: ServiceMetadata {
                title: "Roads".into(),
                provider_name: "Example".into(),
                online_resource: "http://localhost:8080/ows".into(),
                ..Default::default()
            },
            operations: vec!["GetCapabilities".into(), "GetFeature".into()],
            update_sequence: Some("7".into()),
            sections: vec![],
            contents: CapabilitiesContents::FeatureTypes(vec![FeatureTypeInfo {
                name: road(),
                title: "Roads".into(),
                abstract_text: None,
                default_crs: "urn:ogc:def:crs:EPSG::4326".into(),
                wgs84_bbox: Some(BoundingBox::new(-10.0, 40.0, 5.0, 52.0)),
            }]),
        })
    }

    fn collection(number_matched: Option<u64>) -> CanonicalResponse {
        CanonicalResponse::FeatureCollection(FeatureCollection {
            features: vec![Feature {
                type_name: road(),
                id: "r1".into(),
                properties: vec![("name".into(), "A1 & A2".into())],
                geometry: Some((
                    "geom".into(),
                    Point {
                        x: 7.5,
                        y: 51.0,
                        srs_name: Some("urn:ogc:def:crs:EPSG::4326".into()),
                    },
                )),
            }],
            number_matched,
            timestamp: "2024-05-01T12:00:00Z".into(),
        })
    }

    #[test]
    fn test_capabilities_1_0_is_pre_ows() {
        let xml = render(WfsCodec::v1_0_0(), &capabilities());
        assert!(xml.contains(r#"<WFS_Capabilities xmlns="http://www.opengis.net/wfs""#));
        assert!(xml.contains(r#"updateSequence="7""#));
        assert!(xml.contains(r#"<Get onlineResource="http://localhost:8080/ows"/>"#));
        assert!(xml.contains(r#"<LatLongBoundingBox minx="-10" miny="40" maxx="5" maxy="52"/>"#));
        assert!(!xml.contains("ows:"));
    }

    #[test]
    fn test_capabilities_2_0() {
        let xml = render(WfsCodec::v2_0_0(), &capabilities());
        assert!(xml.contains(r#"xmlns:wfs="http://www.opengis.net/wfs/2.0""#));
        assert!(xml.contains("<ows:ServiceTypeVersion>2.0.0</ows:ServiceTypeVersion>"));
        assert!(xml.contains(r#"<wfs:FeatureType xmlns:app="http://example.org/app">"#));
        assert!(xml.contains("<wfs:DefaultCRS>urn:ogc:def:crs:EPSG::4326</wfs:DefaultCRS>"));
        assert!(xml.contains(r#"<fes:Constraint name="ImplementsResourceId">"#));
    }

    #[test]
    fn test_feature_collection_per_version() {
        let v100 = render(WfsCodec::v1_0_0(), &collection(None));
        assert!(v100.contains(r#"<app:Road fid="r1">"#));
        assert!(v100.contains("<gml:coordinates>7.5,51</gml:coordinates>"));
        assert!(v100.contains("<app:name>A1 &amp; A2</app:name>"));

        let v110 = render(WfsCodec::v1_1_0(), &collection(Some(40)));
        assert!(v110.contains(r#"numberOfFeatures="1""#));
        assert!(v110.contains("<gml:featureMember>"));
        assert!(v110.contains("<gml:pos>7.5 51</gml:pos>"));

        let v200 = render(WfsCodec::v2_0_0(), &collection(None));
        assert!(v200.contains(r#"numberMatched="unknown" numberReturned="1""#));
        assert!(v200.contains("<wfs:member>"));
        assert!(v200.contains(r#"<gml:Point gml:id="r1.geom""#));
    }

    #[test]
    fn test_hits_count_in_1_1() {
        let xml = render(
            WfsCodec::v1_1_0(),
            &CanonicalResponse::FeatureCollection(FeatureCollection {
                features: vec![],
                number_matched: Some(12),
                timestamp: "2024-05-01T12:00:00Z".into(),
            }),
        );
        assert!(xml.contains(r#"numberOfFeatures="12""#));
    }

    #[test]
    fn test_schema() {
        let schema = CanonicalResponse::FeatureSchema(FeatureSchema {
            target_namespace: "http://example.org/app".into(),
            target_prefix: "app".into(),
            feature_types: vec![FeatureTypeDescription {
                name: road(),
                properties: vec![
                    PropertyDescription {
                        name: "name".into(),
                        property_type: PropertyType::String,
                        optional: true,
                    },
                    PropertyDescription {
                        name: "geom".into(),
                        property_type: PropertyType::Point,
                        optional: false,
                    },
                ],
            }],
        });
        let xml = render(WfsCodec::v2_0_0(), &schema);
        assert!(xml.contains(
            r#"<xsd:element name="Road" type="app:RoadType" substitutionGroup="gml:AbstractFeature"/>"#
        ));
        assert!(xml.contains(r#"<xsd:element name="name" type="xsd:string" minOccurs="0"/>"#));
        assert!(xml.contains(r#"<xsd:element name="geom" type="gml:PointPropertyType"/>"#));
    }

    #[test]
    fn test_lock_response_per_version() {
        let result = CanonicalResponse::LockFeature(LockFeatureResult {
            lock_id: "lock-1".into(),
            locked: vec!["r1".into()],
            not_locked: vec![],
        });

        let v100 = render(WfsCodec::v1_0_0(), &result);
        assert!(v100.contains("<LockId>lock-1</LockId>"));
        assert!(v100.contains(r#"<ogc:FeatureId fid="r1"/>"#));
        assert!(!v100.contains("FeaturesNotLocked"));

        let v200 = render(WfsCodec::v2_0_0(), &result);
        assert!(v200.contains(r#"lockId="lock-1""#));
        assert!(v200.contains(r#"<fes:ResourceId rid="r1"/>"#));
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let response = collection(Some(3));
        assert_eq!(
            render(WfsCodec::v2_0_0(), &response),
            render(WfsCodec::v2_0_0(), &response)
        );
    }
}
