//! OWS exception codes and the error-to-fault mapping.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::OwsError;

/// Wire-level exception code of an OWS exception report.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum ExceptionCode {
    OperationNotSupported,
    MissingParameterValue,
    InvalidParameterValue,
    VersionNegotiationFailed,
    InvalidUpdateSequence,
    OptionNotSupported,
    InvalidRequest,
    NoApplicableCode,
    /// Service specific codes such as `TileOutOfRange`.
    Custom(String),
}

impl ExceptionCode {
    pub fn as_str(&self) -> &str {
        match self {
            ExceptionCode::OperationNotSupported => "OperationNotSupported",
            ExceptionCode::MissingParameterValue => "MissingParameterValue",
            ExceptionCode::InvalidParameterValue => "InvalidParameterValue",
            ExceptionCode::VersionNegotiationFailed => "VersionNegotiationFailed",
            ExceptionCode::InvalidUpdateSequence => "InvalidUpdateSequence",
            ExceptionCode::OptionNotSupported => "OptionNotSupported",
            ExceptionCode::InvalidRequest => "InvalidRequest",
            ExceptionCode::NoApplicableCode => "NoApplicableCode",
            ExceptionCode::Custom(code) => code,
        }
    }

    /// A custom code with no text cannot be reported.
    pub fn is_blank(&self) -> bool {
        matches!(self, ExceptionCode::Custom(code) if code.trim().is_empty())
    }

    /// HTTP status reported alongside an OWS exception report.
    pub fn http_status(&self) -> u16 {
        match self {
            ExceptionCode::OperationNotSupported | ExceptionCode::OptionNotSupported => 501,
            ExceptionCode::NoApplicableCode => 500,
            _ => 400,
        }
    }
}

impl FromStr for ExceptionCode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "OperationNotSupported" => ExceptionCode::OperationNotSupported,
            "MissingParameterValue" => ExceptionCode::MissingParameterValue,
            "InvalidParameterValue" => ExceptionCode::InvalidParameterValue,
            "VersionNegotiationFailed" => ExceptionCode::VersionNegotiationFailed,
            "InvalidUpdateSequence" => ExceptionCode::InvalidUpdateSequence,
            "OptionNotSupported" => ExceptionCode::OptionNotSupported,
            "InvalidRequest" => ExceptionCode::InvalidRequest,
            "NoApplicableCode" => ExceptionCode::NoApplicableCode,
            other if other.trim().is_empty() => ExceptionCode::NoApplicableCode,
            other => ExceptionCode::Custom(other.to_string()),
        })
    }
}

impl From<String> for ExceptionCode {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(code) => code,
            Err(never) => match never {},
        }
    }
}

impl From<ExceptionCode> for String {
    fn from(code: ExceptionCode) -> Self {
        code.as_str().to_string()
    }
}

impl fmt::Display for ExceptionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A protocol-independent exception, ready to be encoded by a codec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwsFault {
    pub exception_code: ExceptionCode,
    pub locator: Option<String>,
    pub message: String,
}

impl OwsFault {
    pub fn new(exception_code: ExceptionCode, message: impl Into<String>) -> Self {
        Self {
            exception_code,
            locator: None,
            message: message.into(),
        }
    }

    pub fn with_locator(mut self, locator: impl Into<String>) -> Self {
        self.locator = Some(locator.into());
        self
    }
}

/// Map any gateway error to the fault reported on the wire.
///
/// Total: every variant yields a fault. `DuplicateRegistration` and
/// `ClientDisconnected` never reach a client, but still map to
/// `NoApplicableCode`.
pub fn map_to_fault(error: &OwsError) -> OwsFault {
    let message = error.to_string();
    match error {
        OwsError::MalformedRequest(_) => OwsFault::new(ExceptionCode::InvalidRequest, message),
        OwsError::MissingParameter(param) => {
            OwsFault::new(ExceptionCode::MissingParameterValue, message).with_locator(param.clone())
        }
        OwsError::InvalidParameterValue { param, .. } => {
            OwsFault::new(ExceptionCode::InvalidParameterValue, message).with_locator(param.clone())
        }
        OwsError::InvalidVersionFormat(_) | OwsError::UnsupportedVersion(_) => {
            OwsFault::new(ExceptionCode::InvalidParameterValue, message).with_locator("version")
        }
        OwsError::VersionNegotiationFailed(_) => {
            OwsFault::new(ExceptionCode::VersionNegotiationFailed, message)
                .with_locator("AcceptVersions")
        }
        OwsError::UnknownOperation { operation, .. } => {
            OwsFault::new(ExceptionCode::OperationNotSupported, message)
                .with_locator(operation.clone())
        }
        OwsError::Handler(handler) => OwsFault {
            exception_code: handler
                .code
                .clone()
                .filter(|code| !code.is_blank())
                .unwrap_or(ExceptionCode::NoApplicableCode),
            locator: handler.locator.clone(),
            message,
        },
        OwsError::UnknownProtocol(_)
        | OwsError::DuplicateRegistration(_)
        | OwsError::Internal(_)
        | OwsError::ClientDisconnected => OwsFault::new(ExceptionCode::NoApplicableCode, message),
    }
}

/// Catch-all mapping for errors from outside the gateway taxonomy.
///
/// Gateway errors keep their specific mapping; anything else becomes
/// `NoApplicableCode` with the error's message and no locator.
pub fn fault_from_error(error: &(dyn std::error::Error + 'static)) -> OwsFault {
    match error.downcast_ref::<OwsError>() {
        Some(ows) => map_to_fault(ows),
        None => OwsFault::new(ExceptionCode::NoApplicableCode, error.to_string()),
    }
}

impl From<&OwsError> for OwsFault {
    fn from(error: &OwsError) -> Self {
        map_to_fault(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;
    use crate::protocol::Protocol;

    #[test]
    fn test_missing_parameter_maps_with_locator() {
        let fault = map_to_fault(&OwsError::missing("TYPENAME"));
        assert_eq!(fault.exception_code, ExceptionCode::MissingParameterValue);
        assert_eq!(fault.locator.as_deref(), Some("TYPENAME"));
    }

    #[test]
    fn test_version_errors_locate_version() {
        let fault = map_to_fault(&OwsError::UnsupportedVersion("3.0.0".into()));
        assert_eq!(fault.exception_code, ExceptionCode::InvalidParameterValue);
        assert_eq!(fault.locator.as_deref(), Some("version"));

        let fault = map_to_fault(&OwsError::InvalidVersionFormat("x".into()));
        assert_eq!(fault.exception_code, ExceptionCode::InvalidParameterValue);
        assert_eq!(fault.locator.as_deref(), Some("version"));
    }

    #[test]
    fn test_unknown_operation_maps_to_operation_not_supported() {
        let fault = map_to_fault(&OwsError::UnknownOperation {
            protocol: Protocol::Wfs,
            operation: "Transaction".into(),
        });
        assert_eq!(fault.exception_code, ExceptionCode::OperationNotSupported);
        assert_eq!(fault.locator.as_deref(), Some("Transaction"));
        assert_eq!(fault.exception_code.http_status(), 501);
    }

    #[test]
    fn test_handler_error_keeps_own_code() {
        let err: OwsError = HandlerError::new("tile row 99 outside matrix")
            .with_code(ExceptionCode::Custom("TileOutOfRange".into()))
            .with_locator("TileRow")
            .into();
        let fault = map_to_fault(&err);
        assert_eq!(fault.exception_code.as_str(), "TileOutOfRange");
        assert_eq!(fault.locator.as_deref(), Some("TileRow"));
        assert_eq!(fault.message, "tile row 99 outside matrix");
    }

    #[test]
    fn test_handler_error_defaults_to_no_applicable_code() {
        let err: OwsError = HandlerError::new("backend down").into();
        let fault = map_to_fault(&err);
        assert_eq!(fault.exception_code, ExceptionCode::NoApplicableCode);
        assert_eq!(fault.locator, None);
    }

    #[test]
    fn test_blank_handler_code_becomes_no_applicable_code() {
        for code in ["", "  "] {
            let err: OwsError = HandlerError::new("x")
                .with_code(ExceptionCode::Custom(code.into()))
                .with_locator("LAYER")
                .into();
            let fault = map_to_fault(&err);
            assert_eq!(fault.exception_code, ExceptionCode::NoApplicableCode);
            assert_eq!(fault.locator.as_deref(), Some("LAYER"));
        }
        assert_eq!(ExceptionCode::from(String::new()), ExceptionCode::NoApplicableCode);
    }

    #[test]
    fn test_catch_all_for_foreign_errors() {
        let err = std::io::Error::new(std::io::ErrorKind::Other, "socket exploded");
        let fault = fault_from_error(&err);
        assert_eq!(fault.exception_code, ExceptionCode::NoApplicableCode);
        assert_eq!(fault.message, "socket exploded");
        assert_eq!(fault.locator, None);
    }

    #[test]
    fn test_catch_all_prefers_gateway_mapping() {
        let err = OwsError::missing("REQUEST");
        let fault = fault_from_error(&err);
        assert_eq!(fault.exception_code, ExceptionCode::MissingParameterValue);
    }

    #[test]
    fn test_exception_code_parse_roundtrip() {
        let code: ExceptionCode = "VersionNegotiationFailed".parse().unwrap();
        assert_eq!(code, ExceptionCode::VersionNegotiationFailed);
        let custom: ExceptionCode = "PointIJOutOfRange".parse().unwrap();
        assert_eq!(custom, ExceptionCode::Custom("PointIJOutOfRange".into()));
    }
}
