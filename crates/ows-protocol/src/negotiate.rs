//! Version negotiation.

use std::collections::BTreeSet;

use ows_common::{OwsError, OwsResult, ProtocolVersion};

/// Pick the version to serve a request with.
///
/// - no requested version: the highest supported one
/// - an exact match: that version
/// - otherwise the highest supported version below the requested one, or
///   the lowest supported version when the request is older than all of them
///
/// Fails only when nothing is supported.
pub fn negotiate(
    requested: Option<ProtocolVersion>,
    supported: &BTreeSet<ProtocolVersion>,
) -> OwsResult<ProtocolVersion> {
    let highest = supported.iter().next_back().copied();
    let lowest = supported.iter().next().copied();

    let chosen = match requested {
        None => highest,
        Some(requested) if supported.contains(&requested) => Some(requested),
        Some(requested) => supported.range(..requested).next_back().copied().or(lowest),
    };

    chosen.ok_or_else(|| {
        OwsError::UnsupportedVersion(
            requested
                .map(|v| v.to_string())
                .unwrap_or_else(|| "(none)".to_string()),
        )
    })
}

/// OWS 1.1 `AcceptVersions` negotiation: the first listed version that is
/// supported wins. An empty list behaves like an absent version.
pub fn negotiate_accept_versions(
    accept: &[String],
    supported: &BTreeSet<ProtocolVersion>,
) -> OwsResult<ProtocolVersion> {
    if accept.is_empty() {
        return negotiate(None, supported);
    }

    for candidate in accept {
        let version: ProtocolVersion = candidate.parse()?;
        if supported.contains(&version) {
            return Ok(version);
        }
    }
    Err(OwsError::VersionNegotiationFailed(accept.join(", ")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn versions(list: &[&str]) -> BTreeSet<ProtocolVersion> {
        list.iter().map(|v| v.parse().unwrap()).collect()
    }

    fn v(s: &str) -> ProtocolVersion {
        s.parse().unwrap()
    }

    #[test]
    fn test_negotiate_examples() {
        let supported = versions(&["1.0.0", "1.1.0", "2.0.0"]);
        assert_eq!(negotiate(Some(v("1.5.0")), &supported).unwrap(), v("1.1.0"));
        assert_eq!(negotiate(None, &supported).unwrap(), v("2.0.0"));
        assert_eq!(negotiate(Some(v("0.5.0")), &supported).unwrap(), v("1.0.0"));
        assert_eq!(negotiate(Some(v("1.1.0")), &supported).unwrap(), v("1.1.0"));
        assert_eq!(negotiate(Some(v("9.0.0")), &supported).unwrap(), v("2.0.0"));
    }

    #[test]
    fn test_negotiate_empty_set() {
        let err = negotiate(Some(v("1.0.0")), &BTreeSet::new()).unwrap_err();
        assert!(matches!(err, OwsError::UnsupportedVersion(_)));
        let err = negotiate(None, &BTreeSet::new()).unwrap_err();
        assert!(matches!(err, OwsError::UnsupportedVersion(_)));
    }

    #[test]
    fn test_accept_versions_first_supported_wins() {
        let supported = versions(&["1.1.0", "2.0.0"]);
        let accept = vec!["3.0.0".to_string(), "1.1.0".to_string(), "2.0.0".to_string()];
        assert_eq!(negotiate_accept_versions(&accept, &supported).unwrap(), v("1.1.0"));
    }

    #[test]
    fn test_accept_versions_none_supported() {
        let supported = versions(&["1.0.0"]);
        let accept = vec!["2.0.0".to_string()];
        let err = negotiate_accept_versions(&accept, &supported).unwrap_err();
        assert!(matches!(err, OwsError::VersionNegotiationFailed(_)));
    }

    #[test]
    fn test_accept_versions_malformed_entry() {
        let supported = versions(&["1.0.0"]);
        let accept = vec!["1.0".to_string()];
        let err = negotiate_accept_versions(&accept, &supported).unwrap_err();
        assert!(matches!(err, OwsError::InvalidVersionFormat(_)));
    }

    #[test]
    fn test_accept_versions_empty_is_absent() {
        let supported = versions(&["1.0.0", "2.0.0"]);
        assert_eq!(negotiate_accept_versions(&[], &supported).unwrap(), v("2.0.0"));
    }
}
