//! GetCapabilities for every service family.

use ows_common::{ExceptionCode, HandlerError, OperationName, OwsResult};
use ows_protocol::response::{Capabilities, CapabilitiesContents, ServiceMetadata};
use ows_protocol::{CanonicalRequest, CanonicalResponse, Handler, RequestPayload};

use super::unexpected;
use crate::config::ServiceConfig;

/// Answers GetCapabilities from the service section of the configuration
/// and the contents of one backend.
pub struct CapabilitiesHandler {
    service: ServiceMetadata,
    update_sequence: Option<String>,
    operations: Vec<OperationName>,
    contents: CapabilitiesContents,
}

impl CapabilitiesHandler {
    pub fn new(config: &ServiceConfig, operations: Vec<OperationName>, contents: CapabilitiesContents) -> Self {
        Self {
            service: ServiceMetadata::from(&config.service),
            update_sequence: config.update_sequence.clone(),
            operations,
            contents,
        }
    }
}

impl Handler for CapabilitiesHandler {
    fn handle(&self, request: CanonicalRequest) -> OwsResult<CanonicalResponse> {
        let RequestPayload::GetCapabilities(get) = &request.payload else {
            return Err(unexpected(&request));
        };

        // A client that has seen a newer document than ours is confused.
        if let (Some(theirs), Some(ours)) = (&get.update_sequence, &self.update_sequence) {
            if theirs.as_str() > ours.as_str() {
                return Err(HandlerError::new(format!(
                    "updateSequence {} is newer than the server's {}",
                    theirs, ours
                ))
                .with_code(ExceptionCode::InvalidUpdateSequence)
                .with_locator("updateSequence")
                .into());
            }
        }

        Ok(CanonicalResponse::Capabilities(Capabilities {
            service: self.service.clone(),
            operations: self.operations.clone(),
            update_sequence: self.update_sequence.clone(),
            sections: get.sections.clone(),
            contents: self.contents.clone(),
        }))
    }
}
