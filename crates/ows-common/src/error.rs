//! Error types for the OWS gateway.

use std::io;

use thiserror::Error;

use crate::fault::ExceptionCode;
use crate::protocol::Protocol;

/// Result type alias using OwsError.
pub type OwsResult<T> = Result<T, OwsError>;

/// Every failure a request can run into between the wire and a handler.
///
/// Conversion to a wire fault happens once, at the boundary, through
/// [`crate::fault::map_to_fault`].
#[derive(Debug, Error)]
pub enum OwsError {
    // === Decoding ===
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameterValue { param: String, message: String },

    // === Versioning ===
    #[error("Invalid version format: '{0}'")]
    InvalidVersionFormat(String),

    #[error("Version {0} is not supported")]
    UnsupportedVersion(String),

    #[error("None of the accepted versions [{0}] is supported")]
    VersionNegotiationFailed(String),

    // === Routing ===
    #[error("Operation '{operation}' is not supported by {protocol}")]
    UnknownOperation {
        protocol: Protocol,
        operation: String,
    },

    #[error("Unknown service: {0}")]
    UnknownProtocol(String),

    #[error("Duplicate registration: {0}")]
    DuplicateRegistration(String),

    // === Handling ===
    #[error(transparent)]
    Handler(#[from] HandlerError),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Client disconnected")]
    ClientDisconnected,
}

impl OwsError {
    pub fn invalid_value(param: impl Into<String>, message: impl Into<String>) -> Self {
        OwsError::InvalidParameterValue {
            param: param.into(),
            message: message.into(),
        }
    }

    pub fn missing(param: impl Into<String>) -> Self {
        OwsError::MissingParameter(param.into())
    }

    /// Short, stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            OwsError::MalformedRequest(_) => "malformed_request",
            OwsError::MissingParameter(_) => "missing_parameter",
            OwsError::InvalidParameterValue { .. } => "invalid_parameter_value",
            OwsError::InvalidVersionFormat(_) => "invalid_version_format",
            OwsError::UnsupportedVersion(_) => "unsupported_version",
            OwsError::VersionNegotiationFailed(_) => "version_negotiation_failed",
            OwsError::UnknownOperation { .. } => "unknown_operation",
            OwsError::UnknownProtocol(_) => "unknown_protocol",
            OwsError::DuplicateRegistration(_) => "duplicate_registration",
            OwsError::Handler(_) => "handler_error",
            OwsError::Internal(_) => "internal",
            OwsError::ClientDisconnected => "client_disconnected",
        }
    }

    pub fn is_client_disconnect(&self) -> bool {
        matches!(self, OwsError::ClientDisconnected)
    }
}

/// Failure reported by a protocol handler.
///
/// Handlers may name a specific exception code and locator; without one the
/// failure is reported as `NoApplicableCode`.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HandlerError {
    pub code: Option<ExceptionCode>,
    pub locator: Option<String>,
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            locator: None,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_code(mut self, code: ExceptionCode) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_locator(mut self, locator: impl Into<String>) -> Self {
        self.locator = Some(locator.into());
        self
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

// Writes fail with these kinds once the peer has gone away.
impl From<io::Error> for OwsError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted => OwsError::ClientDisconnected,
            _ => OwsError::Internal(err.to_string()),
        }
    }
}
