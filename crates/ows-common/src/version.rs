//! OGC protocol versions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::OwsError;

/// A `major.minor.patch` protocol version such as `1.1.0`.
///
/// Ordering compares the three components numerically, so `1.10.0` sorts
/// after `1.9.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProtocolVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ProtocolVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl FromStr for ProtocolVersion {
    type Err = OwsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || OwsError::InvalidVersionFormat(s.to_string());

        let mut parts = s.trim().split('.');
        let mut next = || -> Result<u32, OwsError> {
            let part = parts.next().ok_or_else(invalid)?;
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            part.parse().map_err(|_| invalid())
        };

        let version = Self::new(next()?, next()?, next()?);
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(version)
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl TryFrom<String> for ProtocolVersion {
    type Error = OwsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ProtocolVersion> for String {
    fn from(version: ProtocolVersion) -> Self {
        version.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version() {
        let v: ProtocolVersion = "1.1.0".parse().unwrap();
        assert_eq!(v, ProtocolVersion::new(1, 1, 0));
        assert_eq!(v.to_string(), "1.1.0");
    }

    #[test]
    fn test_parse_version_trims_whitespace() {
        let v: ProtocolVersion = " 2.0.0 ".parse().unwrap();
        assert_eq!(v, ProtocolVersion::new(2, 0, 0));
    }

    #[test]
    fn test_malformed_versions() {
        for input in ["", "1", "1.0", "1.0.0.0", "a.b.c", "1..0", "1.0.-1", "v1.0.0", "1.0.0 beta"] {
            let err = input.parse::<ProtocolVersion>().unwrap_err();
            assert!(
                matches!(err, OwsError::InvalidVersionFormat(ref s) if s == input),
                "expected InvalidVersionFormat for {:?}, got {:?}",
                input,
                err
            );
        }
    }

    #[test]
    fn test_version_ordering_is_numeric() {
        let a: ProtocolVersion = "1.9.0".parse().unwrap();
        let b: ProtocolVersion = "1.10.0".parse().unwrap();
        assert!(a < b);
        assert!(ProtocolVersion::new(1, 1, 0) < ProtocolVersion::new(2, 0, 0));
        assert!(ProtocolVersion::new(1, 0, 1) > ProtocolVersion::new(1, 0, 0));
    }

    #[test]
    fn test_string_conversions() {
        let v = ProtocolVersion::try_from("2.0.2".to_string()).unwrap();
        assert_eq!(v, ProtocolVersion::new(2, 0, 2));
        assert_eq!(String::from(v), "2.0.2");
        assert!(ProtocolVersion::try_from("2.0".to_string()).is_err());
    }
}
