//! Routing of decoded requests to operation handlers.

use std::collections::HashMap;
use std::sync::Arc;

use ows_common::{OperationName, OwsError, OwsResult, Protocol};
use tracing::debug;

use crate::request::CanonicalRequest;
use crate::response::CanonicalResponse;

/// Business logic for one operation.
///
/// Handlers only ever see version-independent requests and may be called
/// from many threads at once.
pub trait Handler: Send + Sync {
    fn handle(&self, request: CanonicalRequest) -> OwsResult<CanonicalResponse>;
}

impl<F> Handler for F
where
    F: Fn(CanonicalRequest) -> OwsResult<CanonicalResponse> + Send + Sync,
{
    fn handle(&self, request: CanonicalRequest) -> OwsResult<CanonicalResponse> {
        self(request)
    }
}

#[derive(Clone, Default)]
pub struct Dispatcher {
    handlers: HashMap<(Protocol, OperationName), Arc<dyn Handler>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        protocol: Protocol,
        operation: impl Into<OperationName>,
        handler: Arc<dyn Handler>,
    ) -> OwsResult<()> {
        let key = (protocol, operation.into());
        if self.handlers.contains_key(&key) {
            return Err(OwsError::DuplicateRegistration(format!(
                "{} {} already has a handler",
                key.0, key.1
            )));
        }
        self.handlers.insert(key, handler);
        Ok(())
    }

    /// Call the handler for the request's operation exactly once. Handler
    /// errors are returned unchanged.
    pub fn dispatch(&self, request: CanonicalRequest) -> OwsResult<CanonicalResponse> {
        let key = (request.protocol, request.operation.clone());
        let handler = self
            .handlers
            .get(&key)
            .ok_or_else(|| OwsError::UnknownOperation {
                protocol: request.protocol,
                operation: request.operation.to_string(),
            })?;

        debug!(
            protocol = %request.protocol,
            operation = %request.operation,
            version = %request.version,
            "Dispatching request"
        );
        handler.handle(request)
    }

    /// Operations with a handler for `protocol`, sorted by name.
    pub fn operations(&self, protocol: Protocol) -> Vec<OperationName> {
        let mut operations: Vec<OperationName> = self
            .handlers
            .keys()
            .filter(|(p, _)| *p == protocol)
            .map(|(_, op)| op.clone())
            .collect();
        operations.sort();
        operations
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<String> = self
            .handlers
            .keys()
            .map(|(p, op)| format!("{} {}", p, op))
            .collect();
        keys.sort();
        f.debug_struct("Dispatcher").field("handlers", &keys).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{DescribeProcess, RequestPayload};
    use crate::response::Document;
    use ows_common::{HandlerError, ProtocolVersion};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn describe_process() -> CanonicalRequest {
        CanonicalRequest::new(
            Protocol::Wps,
            ProtocolVersion::new(1, 0, 0),
            None,
            RequestPayload::DescribeProcess(DescribeProcess {
                identifiers: vec!["Echo".into()],
            }),
        )
    }

    #[test]
    fn test_unknown_operation() {
        let dispatcher = Dispatcher::new();
        let err = dispatcher.dispatch(describe_process()).unwrap_err();
        assert!(matches!(
            err,
            OwsError::UnknownOperation { protocol: Protocol::Wps, ref operation } if operation == "DescribeProcess"
        ));
    }

    #[test]
    fn test_duplicate_handler() {
        let mut dispatcher = Dispatcher::new();
        let handler: Arc<dyn Handler> =
            Arc::new(|_req: CanonicalRequest| -> OwsResult<CanonicalResponse> {
                Ok(CanonicalResponse::Document(Document::new("text/plain", "x")))
            });
        dispatcher
            .register(Protocol::Wps, "DescribeProcess", handler.clone())
            .unwrap();
        let err = dispatcher
            .register(Protocol::Wps, "DescribeProcess", handler)
            .unwrap_err();
        assert!(matches!(err, OwsError::DuplicateRegistration(_)));
    }

    #[test]
    fn test_handler_called_once_and_error_unchanged() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut dispatcher = Dispatcher::new();
        dispatcher
            .register(
                Protocol::Wps,
                "DescribeProcess",
                Arc::new(move |_req: CanonicalRequest| -> OwsResult<CanonicalResponse> {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(HandlerError::new("backend down").with_locator("Echo").into())
                }),
            )
            .unwrap();

        let err = dispatcher.dispatch(describe_process()).unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        match err {
            OwsError::Handler(h) => {
                assert_eq!(h.message, "backend down");
                assert_eq!(h.locator.as_deref(), Some("Echo"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_operations_sorted() {
        let mut dispatcher = Dispatcher::new();
        let handler: Arc<dyn Handler> =
            Arc::new(|_req: CanonicalRequest| -> OwsResult<CanonicalResponse> {
                Ok(CanonicalResponse::Document(Document::new("text/plain", "")))
            });
        dispatcher.register(Protocol::Wps, "Execute", handler.clone()).unwrap();
        dispatcher.register(Protocol::Wps, "DescribeProcess", handler.clone()).unwrap();
        dispatcher.register(Protocol::Sos, "GetObservation", handler).unwrap();
        let ops: Vec<String> = dispatcher
            .operations(Protocol::Wps)
            .iter()
            .map(|o| o.to_string())
            .collect();
        assert_eq!(ops, vec!["DescribeProcess", "Execute"]);
    }
}
