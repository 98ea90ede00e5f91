//! WFS feature catalogue: DescribeFeatureType and GetFeature over the
//! feature types of the configuration.

use std::sync::Arc;

use ows_common::{BoundingBox, ExceptionCode, HandlerError, OwsError, OwsResult, ProtocolVersion};
use ows_protocol::request::{GetFeature, QName, Query, QuerySelection, ResultType};
use ows_protocol::response::{
    Feature, FeatureCollection, FeatureSchema, FeatureTypeDescription, FeatureTypeInfo, Point,
    PropertyDescription, PropertyType,
};
use ows_protocol::{CanonicalRequest, CanonicalResponse, Handler, RequestPayload};
use tracing::debug;

use super::{timestamp_now, unexpected};
use crate::config::{FeaturesConfig, PropertyKind};

/// One feature type and its features.
#[derive(Debug, Clone)]
pub struct StoredType {
    pub info: FeatureTypeInfo,
    pub description: FeatureTypeDescription,
    pub features: Vec<Feature>,
}

/// In-memory feature types, read-only after startup.
#[derive(Debug, Clone)]
pub struct FeatureStore {
    namespace: String,
    prefix: String,
    max_features: u64,
    types: Vec<StoredType>,
}

impl FeatureStore {
    pub fn from_config(config: &FeaturesConfig) -> Self {
        let types = config
            .types
            .iter()
            .map(|ty| {
                let name = QName::new(Some(&config.prefix), &ty.name, Some(&config.namespace));
                let mut properties: Vec<PropertyDescription> = ty
                    .properties
                    .iter()
                    .map(|p| PropertyDescription {
                        name: p.name.clone(),
                        property_type: match p.property_type {
                            PropertyKind::String => PropertyType::String,
                            PropertyKind::Integer => PropertyType::Integer,
                            PropertyKind::Double => PropertyType::Double,
                        },
                        optional: p.optional,
                    })
                    .collect();
                if let Some(geometry) = &ty.geometry {
                    properties.push(PropertyDescription {
                        name: geometry.clone(),
                        property_type: PropertyType::Point,
                        optional: true,
                    });
                }

                let features = ty
                    .features
                    .iter()
                    .map(|f| Feature {
                        type_name: name.clone(),
                        id: f.id.clone(),
                        // Schema order, skipping properties a feature lacks.
                        properties: ty
                            .properties
                            .iter()
                            .filter_map(|p| f.properties.get(&p.name).map(|v| (p.name.clone(), v.clone())))
                            .collect(),
                        geometry: match (&ty.geometry, f.point) {
                            (Some(geometry), Some([x, y])) => Some((
                                geometry.clone(),
                                Point {
                                    x,
                                    y,
                                    srs_name: Some(ty.crs.clone()),
                                },
                            )),
                            _ => None,
                        },
                    })
                    .collect();

                StoredType {
                    info: FeatureTypeInfo {
                        name: name.clone(),
                        title: if ty.title.is_empty() { ty.name.clone() } else { ty.title.clone() },
                        abstract_text: ty.abstract_text.clone(),
                        default_crs: ty.crs.clone(),
                        wgs84_bbox: ty.bbox.clone(),
                    },
                    description: FeatureTypeDescription { name, properties },
                    features,
                }
            })
            .collect();

        Self {
            namespace: config.namespace.clone(),
            prefix: config.prefix.clone(),
            max_features: config.max_features,
            types,
        }
    }

    pub fn feature_type_infos(&self) -> Vec<FeatureTypeInfo> {
        self.types.iter().map(|t| t.info.clone()).collect()
    }

    /// Resolve requested type names; unknown names are an
    /// `InvalidParameterValue` on the version's type name parameter.
    pub fn resolve(&self, names: &[QName], version: ProtocolVersion) -> OwsResult<Vec<&StoredType>> {
        names
            .iter()
            .map(|name| {
                self.types
                    .iter()
                    .find(|t| t.info.name.matches(name))
                    .ok_or_else(|| OwsError::invalid_value(type_names_param(version), format!("Unknown feature type: {}", name)))
            })
            .collect()
    }

    /// Features a query selects, in store order.
    ///
    /// A query without type names (a pure id query) searches every type.
    pub fn select(&self, query: &Query, version: ProtocolVersion) -> OwsResult<Vec<&Feature>> {
        let types = if query.type_names.is_empty() {
            self.types.iter().collect()
        } else {
            self.resolve(&query.type_names, version)?
        };

        let candidates = types.into_iter().flat_map(|t| t.features.iter());
        let selected = match &query.selection {
            QuerySelection::All => candidates.collect(),
            QuerySelection::FeatureIds(ids) => candidates.filter(|f| ids.contains(&f.id)).collect(),
            QuerySelection::Bbox(bbox) => candidates.filter(|f| in_bbox(f, bbox)).collect(),
            QuerySelection::Filter(_) => {
                return Err(HandlerError::new("Filter expressions are not evaluated by this service")
                    .with_code(ExceptionCode::OptionNotSupported)
                    .with_locator("FILTER")
                    .into())
            }
        };
        Ok(selected)
    }

    /// Ids of every feature any of `queries` selects, without duplicates.
    pub fn select_ids(&self, queries: &[Query], version: ProtocolVersion) -> OwsResult<Vec<String>> {
        let mut ids: Vec<String> = Vec::new();
        for query in queries {
            for feature in self.select(query, version)? {
                if !ids.contains(&feature.id) {
                    ids.push(feature.id.clone());
                }
            }
        }
        Ok(ids)
    }

    fn describe(&self, type_names: &[QName], version: ProtocolVersion) -> OwsResult<FeatureSchema> {
        let types = if type_names.is_empty() {
            self.types.iter().collect()
        } else {
            self.resolve(type_names, version)?
        };
        Ok(FeatureSchema {
            target_namespace: self.namespace.clone(),
            target_prefix: self.prefix.clone(),
            feature_types: types.into_iter().map(|t| t.description.clone()).collect(),
        })
    }

    fn get_feature(&self, get: &GetFeature, version: ProtocolVersion) -> OwsResult<FeatureCollection> {
        let mut matched: Vec<Feature> = Vec::new();
        for query in &get.queries {
            for feature in self.select(query, version)? {
                matched.push(project(feature, &query.property_names));
            }
        }

        let total = matched.len() as u64;
        let limit = get.max_features.unwrap_or(self.max_features).min(self.max_features);
        let start = get.start_index.unwrap_or(0);
        debug!(total, start, limit, "Features selected");

        let features = match get.result_type {
            ResultType::Hits => Vec::new(),
            ResultType::Results => matched
                .into_iter()
                .skip(start as usize)
                .take(limit as usize)
                .collect(),
        };
        Ok(FeatureCollection {
            features,
            number_matched: Some(total),
            timestamp: timestamp_now(),
        })
    }
}

fn type_names_param(version: ProtocolVersion) -> &'static str {
    if version.major >= 2 {
        "TYPENAMES"
    } else {
        "TYPENAME"
    }
}

fn in_bbox(feature: &Feature, bbox: &BoundingBox) -> bool {
    feature
        .geometry
        .as_ref()
        .is_some_and(|(_, point)| bbox.contains_point(point.x, point.y))
}

/// Keep only the requested properties; geometry is kept when named or when
/// no properties were requested.
fn project(feature: &Feature, property_names: &[String]) -> Feature {
    if property_names.is_empty() {
        return feature.clone();
    }
    let wanted = |name: &str| {
        property_names
            .iter()
            .any(|p| p == name || p.rsplit(':').next() == Some(name))
    };
    Feature {
        type_name: feature.type_name.clone(),
        id: feature.id.clone(),
        properties: feature
            .properties
            .iter()
            .filter(|(name, _)| wanted(name))
            .cloned()
            .collect(),
        geometry: feature.geometry.clone().filter(|(name, _)| wanted(name)),
    }
}

pub fn describe_feature_type(store: Arc<FeatureStore>) -> Arc<dyn Handler> {
    Arc::new(move |request: CanonicalRequest| -> OwsResult<CanonicalResponse> {
        match &request.payload {
            RequestPayload::DescribeFeatureType(describe) => Ok(CanonicalResponse::FeatureSchema(
                store.describe(&describe.type_names, request.version)?,
            )),
            _ => Err(unexpected(&request)),
        }
    })
}

pub fn get_feature(store: Arc<FeatureStore>) -> Arc<dyn Handler> {
    Arc::new(move |request: CanonicalRequest| -> OwsResult<CanonicalResponse> {
        match &request.payload {
            RequestPayload::GetFeature(get) => Ok(CanonicalResponse::FeatureCollection(
                store.get_feature(get, request.version)?,
            )),
            _ => Err(unexpected(&request)),
        }
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::{FeatureConfig, FeatureTypeConfig, PropertyConfig};
    use std::collections::BTreeMap;

    pub(crate) fn roads_config() -> FeaturesConfig {
        let road = |id: &str, name: &str, x: f64| FeatureConfig {
            id: id.to_string(),
            properties: BTreeMap::from([("name".to_string(), name.to_string())]),
            point: Some([x, 50.0]),
        };
        FeaturesConfig {
            types: vec![FeatureTypeConfig {
                name: "Road".into(),
                title: "Roads".into(),
                abstract_text: None,
                crs: "urn:ogc:def:crs:EPSG::4326".into(),
                bbox: None,
                properties: vec![PropertyConfig {
                    name: "name".into(),
                    property_type: PropertyKind::String,
                    optional: false,
                }],
                geometry: Some("geom".into()),
                features: vec![road("r1", "A1", 1.0), road("r2", "A2", 2.0), road("r3", "A3", 3.0)],
            }],
            ..Default::default()
        }
    }

    fn v2() -> ProtocolVersion {
        ProtocolVersion::new(2, 0, 0)
    }

    fn query(selection: QuerySelection) -> Query {
        Query::new(vec![QName::new(Some("app"), "Road", None)], selection)
    }

    fn get(queries: Vec<Query>) -> GetFeature {
        GetFeature {
            queries,
            output_format: None,
            max_features: None,
            start_index: None,
            result_type: ResultType::Results,
        }
    }

    #[test]
    fn test_select_by_ids_and_bbox() {
        let store = FeatureStore::from_config(&roads_config());
        let ids = store
            .select(&query(QuerySelection::FeatureIds(vec!["r2".into()])), v2())
            .unwrap();
        assert_eq!(ids.len(), 1);

        let boxed = store
            .select(&query(QuerySelection::Bbox(BoundingBox::new(1.5, 40.0, 3.5, 60.0))), v2())
            .unwrap();
        let ids: Vec<&str> = boxed.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["r2", "r3"]);
    }

    #[test]
    fn test_unknown_type_uses_version_parameter() {
        let store = FeatureStore::from_config(&roads_config());
        let unknown = Query::new(vec![QName::new(None, "River", None)], QuerySelection::All);
        let err = store.select(&unknown, ProtocolVersion::new(1, 1, 0)).unwrap_err();
        assert!(matches!(err, OwsError::InvalidParameterValue { ref param, .. } if param == "TYPENAME"));
    }

    #[test]
    fn test_filters_are_not_evaluated() {
        let store = FeatureStore::from_config(&roads_config());
        let err = store.select(&query(QuerySelection::Filter("<fes:Filter/>".into())), v2()).unwrap_err();
        let OwsError::Handler(err) = err else {
            panic!("expected handler error");
        };
        assert_eq!(err.code, Some(ExceptionCode::OptionNotSupported));
    }

    #[test]
    fn test_paging_and_hits() {
        let store = FeatureStore::from_config(&roads_config());
        let mut request = get(vec![query(QuerySelection::All)]);
        request.start_index = Some(1);
        request.max_features = Some(1);
        let page = store.get_feature(&request, v2()).unwrap();
        assert_eq!(page.features.len(), 1);
        assert_eq!(page.features[0].id, "r2");
        assert_eq!(page.number_matched, Some(3));

        request.result_type = ResultType::Hits;
        let hits = store.get_feature(&request, v2()).unwrap();
        assert!(hits.features.is_empty());
        assert_eq!(hits.number_matched, Some(3));
    }

    #[test]
    fn test_property_projection() {
        let store = FeatureStore::from_config(&roads_config());
        let mut only_name = query(QuerySelection::All);
        only_name.property_names = vec!["app:name".into()];
        let collection = store.get_feature(&get(vec![only_name]), v2()).unwrap();
        assert!(collection.features[0].geometry.is_none());
        assert_eq!(collection.features[0].properties, vec![("name".to_string(), "A1".to_string())]);
    }

    #[test]
    fn test_describe_all_types() {
        let store = FeatureStore::from_config(&roads_config());
        let schema = store.describe(&[], v2()).unwrap();
        assert_eq!(schema.target_prefix, "app");
        assert_eq!(schema.feature_types[0].properties.len(), 2);
        assert_eq!(schema.feature_types[0].properties[1].property_type, PropertyType::Point);
    }
}
