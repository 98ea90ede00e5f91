//! XML (and SOAP) binding of the WFS operations.

use ows_common::{OwsError, OwsResult};

use super::kvp::lock_action;
use super::WfsVersion;
use crate::codec::unknown_operation;
use crate::envelope::RequestEnvelope;
use crate::request::{
    DescribeFeatureType, GetFeature, LockFeature, QName, Query, QuerySelection, RequestPayload,
    ResultType,
};
use crate::xml::XmlElement;

pub(super) fn decode(
    version: WfsVersion,
    envelope: &RequestEnvelope,
    root: &XmlElement,
) -> OwsResult<RequestPayload> {
    match envelope.operation.as_str() {
        "DescribeFeatureType" => Ok(RequestPayload::DescribeFeatureType(DescribeFeatureType {
            type_names: root
                .children_named("TypeName")
                .map(|t| resolve_qname(t.text(), t, &[root]))
                .collect(),
            output_format: root.attr("outputFormat").map(str::to_string),
        })),
        "GetFeature" => {
            let queries = root
                .children_named("Query")
                .map(|q| query(version, root, q))
                .collect::<OwsResult<Vec<_>>>()?;
            if queries.is_empty() {
                return Err(OwsError::missing("Query"));
            }

            let max_key = match version {
                WfsVersion::V200 => "count",
                _ => "maxFeatures",
            };
            Ok(RequestPayload::GetFeature(GetFeature {
                queries,
                output_format: root.attr("outputFormat").map(str::to_string),
                max_features: number_attr(root, max_key)?,
                start_index: match version {
                    WfsVersion::V200 => number_attr(root, "startIndex")?,
                    _ => None,
                },
                result_type: match version {
                    WfsVersion::V100 => ResultType::Results,
                    _ => root
                        .attr("resultType")
                        .map(|v| ResultType::parse(v, "resultType"))
                        .transpose()?
                        .unwrap_or_default(),
                },
            }))
        }
        "LockFeature" => {
            // 1.x wraps each selection in wfs:Lock, 2.0 in wfs:Query.
            let element = match version {
                WfsVersion::V200 => "Query",
                _ => "Lock",
            };
            let queries = root
                .children_named(element)
                .map(|q| query(version, root, q))
                .collect::<OwsResult<Vec<_>>>()?;
            let existing_lock_id = match version {
                WfsVersion::V200 => root.attr("lockId").map(str::to_string),
                _ => None,
            };
            if queries.is_empty() && existing_lock_id.is_none() {
                return Err(OwsError::missing(element));
            }

            Ok(RequestPayload::LockFeature(LockFeature {
                queries,
                lock_all: lock_action(root.attr("lockAction"), "lockAction")?,
                existing_lock_id,
                expiry_in_seconds: number_attr(root, "expiry")?
                    .map(|e| e.saturating_mul(version.expiry_unit_seconds())),
            }))
        }
        _ => Err(unknown_operation(envelope)),
    }
}

fn query(version: WfsVersion, root: &XmlElement, element: &XmlElement) -> OwsResult<Query> {
    let attr = match version {
        WfsVersion::V200 => "typeNames",
        _ => "typeName",
    };
    let names = element.attr(attr).ok_or_else(|| OwsError::missing(attr))?;
    let type_names = names
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|n| !n.is_empty())
        .map(|n| resolve_qname(n, element, &[root]))
        .collect();

    let selection = match element.child("Filter") {
        Some(filter) => filter_selection(filter)?,
        None => QuerySelection::All,
    };

    Ok(Query {
        type_names,
        selection,
        srs_name: element.attr("srsName").map(str::to_string),
        property_names: element.children_text("PropertyName"),
        handle: element.attr("handle").map(str::to_string),
    })
}

/// A filter made only of identifier predicates becomes an id selection;
/// anything else is kept as a filter document.
fn filter_selection(filter: &XmlElement) -> OwsResult<QuerySelection> {
    let ids: Option<Vec<String>> = filter
        .elements()
        .map(|e| feature_id(e).map(str::to_string))
        .collect();
    match ids {
        Some(ids) if !ids.is_empty() => Ok(QuerySelection::FeatureIds(ids)),
        _ => Ok(QuerySelection::Filter(filter.to_xml_string()?)),
    }
}

fn feature_id(element: &XmlElement) -> Option<&str> {
    match element.local_name.as_str() {
        "FeatureId" => element.attr("fid"),
        "GmlObjectId" => element
            .attributes
            .iter()
            .find(|a| a.local_name == "id" && a.namespace.is_some())
            .map(|a| a.value.trim()),
        "ResourceId" => element.attr("rid"),
        _ => None,
    }
}

fn resolve_qname(value: &str, element: &XmlElement, ancestors: &[&XmlElement]) -> QName {
    QName::parse(value, |prefix| {
        element
            .resolve_prefix(ancestors, prefix)
            .map(str::to_string)
    })
}

fn number_attr(element: &XmlElement, name: &str) -> OwsResult<Option<u64>> {
    element
        .attr(name)
        .map(|v| {
            v.parse().map_err(|_| {
                OwsError::invalid_value(name, format!("'{}' is not a non-negative integer", v))
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::RequestCodec;
    use crate::envelope::RawRequest;
    use crate::wfs::WfsCodec;
    use bytes::Bytes;

    fn decode(codec: WfsCodec, doc: &'static str) -> OwsResult<RequestPayload> {
        codec
            .decode(RequestEnvelope::read(RawRequest::Xml(Bytes::from(doc)))?)
            .map(|r| r.payload)
    }

    #[test]
    fn test_get_feature_2_0() {
        let doc = r#"<wfs:GetFeature xmlns:wfs="http://www.opengis.net/wfs/2.0"
                xmlns:fes="http://www.opengis.net/fes/2.0" xmlns:app="http://example.org/app"
                service="WFS" version="2.0.0" count="10" startIndex="20" resultType="hits">
              <wfs:Query typeNames="app:Road" srsName="urn:ogc:def:crs:EPSG::4326">
                <fes:Filter>
                  <fes:ResourceId rid="r1"/>
                  <fes:ResourceId rid="r2"/>
                </fes:Filter>
              </wfs:Query>
            </wfs:GetFeature>"#;
        let RequestPayload::GetFeature(get) = decode(WfsCodec::v2_0_0(), doc).unwrap() else {
            panic!("expected GetFeature");
        };
        assert_eq!(get.max_features, Some(10));
        assert_eq!(get.start_index, Some(20));
        assert_eq!(get.result_type, ResultType::Hits);
        let query = &get.queries[0];
        assert_eq!(
            query.type_names[0],
            QName::new(Some("app"), "Road", Some("http://example.org/app"))
        );
        assert_eq!(
            query.selection,
            QuerySelection::FeatureIds(vec!["r1".into(), "r2".into()])
        );
        assert_eq!(query.srs_name.as_deref(), Some("urn:ogc:def:crs:EPSG::4326"));
    }

    #[test]
    fn test_filter_kept_as_document() {
        let doc = r#"<wfs:GetFeature xmlns:wfs="http://www.opengis.net/wfs"
                xmlns:ogc="http://www.opengis.net/ogc" service="WFS" version="1.1.0">
              <wfs:Query typeName="Road">
                <ogc:Filter>
                  <ogc:PropertyIsEqualTo>
                    <ogc:PropertyName>name</ogc:PropertyName>
                    <ogc:Literal>A1</ogc:Literal>
                  </ogc:PropertyIsEqualTo>
                </ogc:Filter>
              </wfs:Query>
            </wfs:GetFeature>"#;
        let RequestPayload::GetFeature(get) = decode(WfsCodec::v1_1_0(), doc).unwrap() else {
            panic!("expected GetFeature");
        };
        let QuerySelection::Filter(filter) = &get.queries[0].selection else {
            panic!("expected a filter");
        };
        assert!(filter.starts_with(r#"<ogc:Filter xmlns:ogc="http://www.opengis.net/ogc">"#));
        assert!(filter.contains("<ogc:Literal>A1</ogc:Literal>"));
    }

    #[test]
    fn test_lock_feature_1_1() {
        let doc = r#"<wfs:LockFeature xmlns:wfs="http://www.opengis.net/wfs"
                xmlns:ogc="http://www.opengis.net/ogc" service="WFS" version="1.1.0"
                expiry="2" lockAction="SOME">
              <wfs:Lock typeName="Road" handle="first">
                <ogc:Filter><ogc:FeatureId fid="r1"/></ogc:Filter>
              </wfs:Lock>
            </wfs:LockFeature>"#;
        let RequestPayload::LockFeature(lock) = decode(WfsCodec::v1_1_0(), doc).unwrap() else {
            panic!("expected LockFeature");
        };
        assert!(!lock.lock_all);
        assert_eq!(lock.expiry_in_seconds, Some(120));
        assert_eq!(lock.queries[0].handle.as_deref(), Some("first"));
        assert_eq!(
            lock.queries[0].selection,
            QuerySelection::FeatureIds(vec!["r1".into()])
        );
    }

    #[test]
    fn test_lock_feature_without_lock_elements() {
        let doc = r#"<wfs:LockFeature xmlns:wfs="http://www.opengis.net/wfs" service="WFS" version="1.0.0"/>"#;
        let err = decode(WfsCodec::v1_0_0(), doc).unwrap_err();
        assert!(matches!(err, OwsError::MissingParameter(ref p) if p == "Lock"));
    }

    #[test]
    fn test_describe_feature_type() {
        let doc = r#"<wfs:DescribeFeatureType xmlns:wfs="http://www.opengis.net/wfs/2.0"
                xmlns:app="http://example.org/app" service="WFS" version="2.0.0">
              <wfs:TypeName>app:Road</wfs:TypeName>
            </wfs:DescribeFeatureType>"#;
        let RequestPayload::DescribeFeatureType(describe) = decode(WfsCodec::v2_0_0(), doc).unwrap()
        else {
            panic!("expected DescribeFeatureType");
        };
        assert_eq!(
            describe.type_names[0].namespace.as_deref(),
            Some("http://example.org/app")
        );
    }

    #[test]
    fn test_bad_count() {
        let doc = r#"<wfs:GetFeature xmlns:wfs="http://www.opengis.net/wfs/2.0" service="WFS"
                version="2.0.0" count="many"><wfs:Query typeNames="Road"/></wfs:GetFeature>"#;
        let err = decode(WfsCodec::v2_0_0(), doc).unwrap_err();
        assert!(matches!(err, OwsError::InvalidParameterValue { ref param, .. } if param == "count"));
    }
}
