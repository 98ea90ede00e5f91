//! KVP binding of the WFS operations.

use std::collections::BTreeSet;

use ows_common::{BoundingBox, KvpMap, OwsError, OwsResult};

use super::{WfsCodec, WfsVersion};
use crate::codec::{encode_get_capabilities_kvp, kvp_header, unencodable_request, unknown_operation};
use crate::envelope::RequestEnvelope;
use crate::request::{
    CanonicalRequest, DescribeFeatureType, GetFeature, LockFeature, QName, Query, QuerySelection,
    RequestPayload, ResultType,
};

pub(super) fn decode(
    version: WfsVersion,
    envelope: &RequestEnvelope,
    kvp: &KvpMap,
) -> OwsResult<RequestPayload> {
    let bindings = namespace_bindings(version, kvp)?;
    let resolve = |prefix: &str| {
        bindings
            .iter()
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.clone())
    };

    match envelope.operation.as_str() {
        "DescribeFeatureType" => {
            let key = type_names_param(version, kvp);
            Ok(RequestPayload::DescribeFeatureType(DescribeFeatureType {
                type_names: kvp.list(key).iter().map(|n| QName::parse(n, resolve)).collect(),
                output_format: kvp.get("OUTPUTFORMAT").map(str::to_string),
            }))
        }
        "GetFeature" => Ok(RequestPayload::GetFeature(GetFeature {
            queries: queries(version, kvp, &resolve)?,
            output_format: kvp.get("OUTPUTFORMAT").map(str::to_string),
            max_features: kvp.parse_value(version.max_features_key())?,
            start_index: match version {
                WfsVersion::V200 => kvp.parse_value("STARTINDEX")?,
                _ => None,
            },
            result_type: match version {
                WfsVersion::V100 => ResultType::Results,
                _ => kvp
                    .get("RESULTTYPE")
                    .map(|v| ResultType::parse(v, "RESULTTYPE"))
                    .transpose()?
                    .unwrap_or_default(),
            },
        })),
        "LockFeature" => {
            let existing_lock_id = match version {
                WfsVersion::V200 => kvp.get("LOCKID").map(str::to_string),
                _ => None,
            };
            // Renewing an existing lock needs no query.
            let queries = match queries(version, kvp, &resolve) {
                Err(OwsError::MissingParameter(_)) if existing_lock_id.is_some() => Vec::new(),
                other => other?,
            };
            let expiry: Option<u64> = kvp.parse_value("EXPIRY")?;

            Ok(RequestPayload::LockFeature(LockFeature {
                queries,
                lock_all: lock_action(kvp.get("LOCKACTION"), "LOCKACTION")?,
                existing_lock_id,
                expiry_in_seconds: expiry.map(|e| e.saturating_mul(version.expiry_unit_seconds())),
            }))
        }
        _ => Err(unknown_operation(envelope)),
    }
}

/// `LOCKACTION` / `lockAction`: `ALL` locks all or nothing, `SOME` (and the
/// default) locks what it can.
pub(super) fn lock_action(value: Option<&str>, param: &str) -> OwsResult<bool> {
    match value {
        None => Ok(false),
        Some(v) if v.eq_ignore_ascii_case("ALL") => Ok(true),
        Some(v) if v.eq_ignore_ascii_case("SOME") => Ok(false),
        Some(v) => Err(OwsError::invalid_value(
            param,
            format!("'{}' is not one of ALL, SOME", v),
        )),
    }
}

/// 2.0 accepts the 1.x `TYPENAME` spelling as an alias.
fn type_names_param(version: WfsVersion, kvp: &KvpMap) -> &'static str {
    let key = version.type_names_key();
    if !kvp.contains(key) && kvp.contains("TYPENAME") {
        "TYPENAME"
    } else {
        key
    }
}

/// Parse `xmlns(p=uri),xmlns(q=uri)`. 2.0 separates prefix and URI with a
/// comma instead; both are accepted. A binding without prefix declares the
/// default namespace.
fn namespace_bindings(version: WfsVersion, kvp: &KvpMap) -> OwsResult<Vec<(String, String)>> {
    let key = version.namespaces_key();
    let Some(value) = kvp.get(key) else {
        return Ok(Vec::new());
    };

    let malformed = || OwsError::invalid_value(key, format!("'{}' is not a list of xmlns(...) bindings", value));
    let mut bindings = Vec::new();
    let mut rest = value.trim();
    while !rest.is_empty() {
        let body = rest.strip_prefix("xmlns(").ok_or_else(malformed)?;
        let end = body.find(')').ok_or_else(malformed)?;
        let binding = &body[..end];
        let (prefix, uri) = binding
            .split_once(|c| c == '=' || c == ',')
            .unwrap_or(("", binding));
        bindings.push((prefix.trim().to_string(), uri.trim().to_string()));
        rest = body[end + 1..].trim_start_matches(',').trim();
    }
    Ok(bindings)
}

fn queries(
    version: WfsVersion,
    kvp: &KvpMap,
    resolve: &impl Fn(&str) -> Option<String>,
) -> OwsResult<Vec<Query>> {
    let type_key = type_names_param(version, kvp);
    let type_lists: Vec<Vec<String>> = kvp
        .lists(type_key)
        .into_iter()
        .filter(|l| !l.is_empty())
        .collect();
    let ids_key = version.ids_key();
    let id_lists = kvp.lists(ids_key);
    let filters = kvp.groups("FILTER");
    let bbox = kvp
        .get("BBOX")
        .map(|v| BoundingBox::from_kvp_string(v).map_err(|e| OwsError::invalid_value("BBOX", e.to_string())))
        .transpose()?;

    let given: Vec<&str> = [
        (ids_key, !id_lists.is_empty()),
        ("FILTER", !filters.is_empty()),
        ("BBOX", bbox.is_some()),
    ]
    .into_iter()
    .filter(|(_, present)| *present)
    .map(|(key, _)| key)
    .collect();
    if given.len() > 1 {
        return Err(OwsError::invalid_value(
            given[1],
            format!("{} and {} are mutually exclusive", given[0], given[1]),
        ));
    }

    if type_lists.is_empty() {
        if id_lists.is_empty() {
            return Err(OwsError::missing(version.type_names_key()));
        }
        let ids = id_lists.into_iter().flatten().collect();
        return Ok(vec![Query::new(Vec::new(), QuerySelection::FeatureIds(ids))]);
    }

    let count = type_lists.len();
    let selections: Vec<QuerySelection> = if !id_lists.is_empty() {
        per_query(ids_key, id_lists, count)?
            .into_iter()
            .map(QuerySelection::FeatureIds)
            .collect()
    } else if !filters.is_empty() {
        per_query("FILTER", filters, count)?
            .into_iter()
            .map(QuerySelection::Filter)
            .collect()
    } else {
        vec![bbox.map(QuerySelection::Bbox).unwrap_or(QuerySelection::All); count]
    };

    let property_lists = kvp.lists("PROPERTYNAME");
    let property_names = if property_lists.is_empty() {
        vec![Vec::new(); count]
    } else {
        per_query("PROPERTYNAME", property_lists, count)?
    };

    let srs_name = match version {
        WfsVersion::V100 => None,
        _ => kvp.get("SRSNAME").map(str::to_string),
    };

    Ok(type_lists
        .into_iter()
        .zip(selections)
        .zip(property_names)
        .map(|((names, selection), property_names)| Query {
            type_names: names.iter().map(|n| QName::parse(n, resolve)).collect(),
            selection,
            srs_name: srs_name.clone(),
            property_names,
            handle: None,
        })
        .collect())
}

/// One group per query, or a single group shared by all of them.
fn per_query<T: Clone>(key: &str, groups: Vec<T>, queries: usize) -> OwsResult<Vec<T>> {
    match groups.len() {
        n if n == queries => Ok(groups),
        1 => Ok(vec![groups[0].clone(); queries]),
        n => Err(OwsError::invalid_value(
            key,
            format!("{} groups given for {} queries", n, queries),
        )),
    }
}

pub(super) fn encode(codec: &WfsCodec, request: &CanonicalRequest) -> OwsResult<KvpMap> {
    let version = codec.wfs_version();
    let mut kvp = kvp_header(codec, request);
    match &request.payload {
        RequestPayload::GetCapabilities(caps) => {
            // No AcceptVersions before OWS Common.
            if version == WfsVersion::V100 {
                kvp.insert("VERSION", "1.0.0");
            }
            encode_get_capabilities_kvp(&mut kvp, caps);
        }
        RequestPayload::DescribeFeatureType(describe) => {
            if !describe.type_names.is_empty() {
                kvp.insert(version.type_names_key(), join(&describe.type_names));
                insert_namespaces(version, &mut kvp, describe.type_names.iter());
            }
            if let Some(format) = &describe.output_format {
                kvp.insert("OUTPUTFORMAT", format.as_str());
            }
        }
        RequestPayload::GetFeature(get) => {
            encode_queries(version, &mut kvp, &get.queries)?;
            if let Some(format) = &get.output_format {
                kvp.insert("OUTPUTFORMAT", format.as_str());
            }
            if let Some(max) = get.max_features {
                kvp.insert(version.max_features_key(), max.to_string());
            }
            if let (WfsVersion::V200, Some(start)) = (version, get.start_index) {
                kvp.insert("STARTINDEX", start.to_string());
            }
            if version != WfsVersion::V100 && get.result_type == ResultType::Hits {
                kvp.insert("RESULTTYPE", get.result_type.as_str());
            }
        }
        RequestPayload::LockFeature(lock) => {
            if !lock.queries.is_empty() {
                encode_queries(version, &mut kvp, &lock.queries)?;
            }
            if lock.lock_all {
                kvp.insert("LOCKACTION", "ALL");
            }
            if let (WfsVersion::V200, Some(lock_id)) = (version, &lock.existing_lock_id) {
                kvp.insert("LOCKID", lock_id.as_str());
            }
            if let Some(seconds) = lock.expiry_in_seconds {
                let expiry = seconds.div_ceil(version.expiry_unit_seconds());
                kvp.insert("EXPIRY", expiry.to_string());
            }
        }
        _ => return Err(unencodable_request(codec, request)),
    }
    Ok(kvp)
}

fn encode_queries(version: WfsVersion, kvp: &mut KvpMap, queries: &[Query]) -> OwsResult<()> {
    let typed: Vec<&Query> = queries.iter().filter(|q| !q.type_names.is_empty()).collect();
    if !typed.is_empty() {
        let groups: Vec<String> = typed.iter().map(|q| join(&q.type_names)).collect();
        kvp.insert(version.type_names_key(), grouped(&groups));
        insert_namespaces(version, kvp, typed.iter().flat_map(|q| q.type_names.iter()));
    }

    let mut ids = Vec::new();
    let mut filters = Vec::new();
    let mut bbox = None;
    for query in queries {
        match &query.selection {
            QuerySelection::All => {}
            QuerySelection::FeatureIds(list) => ids.push(list.join(",")),
            QuerySelection::Filter(filter) => filters.push(filter.clone()),
            QuerySelection::Bbox(b) => bbox = Some(b),
        }
    }
    let kinds = [!ids.is_empty(), !filters.is_empty(), bbox.is_some()]
        .iter()
        .filter(|k| **k)
        .count();
    if kinds > 1 {
        return Err(OwsError::invalid_value(
            "selection",
            "queries mixing identifiers, filters and bounding boxes have no KVP form",
        ));
    }
    if !ids.is_empty() {
        kvp.insert(version.ids_key(), grouped(&ids));
    }
    if !filters.is_empty() {
        kvp.insert("FILTER", grouped(&filters));
    }
    if let Some(bbox) = bbox {
        kvp.insert("BBOX", bbox.to_kvp_string());
    }

    if queries.iter().any(|q| !q.property_names.is_empty()) {
        let groups: Vec<String> = queries.iter().map(|q| q.property_names.join(",")).collect();
        kvp.insert("PROPERTYNAME", grouped(&groups));
    }
    if version != WfsVersion::V100 {
        if let Some(srs) = queries.iter().find_map(|q| q.srs_name.as_deref()) {
            kvp.insert("SRSNAME", srs);
        }
    }
    Ok(())
}

fn join(names: &[QName]) -> String {
    names.iter().map(QName::to_string).collect::<Vec<_>>().join(",")
}

/// `a` for a single group, `(a)(b)` otherwise.
fn grouped(groups: &[String]) -> String {
    match groups {
        [single] => single.clone(),
        _ => groups.iter().map(|g| format!("({})", g)).collect(),
    }
}

fn insert_namespaces<'a>(version: WfsVersion, kvp: &mut KvpMap, names: impl Iterator<Item = &'a QName>) {
    let bindings: BTreeSet<(&str, &str)> = names
        .filter_map(|n| Some((n.prefix.as_deref().unwrap_or(""), n.namespace.as_deref()?)))
        .collect();
    if bindings.is_empty() {
        return;
    }
    let separator = match version {
        WfsVersion::V200 => ",",
        _ => "=",
    };
    let value = bindings
        .iter()
        .map(|(prefix, uri)| match *prefix {
            "" => format!("xmlns({})", uri),
            prefix => format!("xmlns({}{}{})", prefix, separator, uri),
        })
        .collect::<Vec<_>>()
        .join(",");
    kvp.insert(version.namespaces_key(), value);
}
