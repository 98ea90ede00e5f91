//! Stub operation handlers.

use std::sync::{Arc, Mutex};

use ows_common::{OwsError, OwsResult, Protocol};
use ows_protocol::{CanonicalRequest, CanonicalResponse, Dispatcher, Handler};

/// Always answers with a clone of `response`.
pub fn respond_with(response: CanonicalResponse) -> Arc<dyn Handler> {
    Arc::new(move |_: CanonicalRequest| -> OwsResult<CanonicalResponse> { Ok(response.clone()) })
}

/// Always fails with the error `make` builds.
pub fn fail_with<F>(make: F) -> Arc<dyn Handler>
where
    F: Fn() -> OwsError + Send + Sync + 'static,
{
    Arc::new(move |_: CanonicalRequest| -> OwsResult<CanonicalResponse> { Err(make()) })
}

/// Records every request it receives and answers with `response`.
pub struct Recording {
    response: CanonicalResponse,
    requests: Mutex<Vec<CanonicalRequest>>,
}

impl Recording {
    pub fn new(response: CanonicalResponse) -> Arc<Self> {
        Arc::new(Self {
            response,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<CanonicalRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }
}

impl Handler for Recording {
    fn handle(&self, request: CanonicalRequest) -> OwsResult<CanonicalResponse> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        Ok(self.response.clone())
    }
}

/// A dispatcher with the given handlers registered.
pub fn dispatcher(entries: Vec<(Protocol, &str, Arc<dyn Handler>)>) -> Dispatcher {
    let mut dispatcher = Dispatcher::new();
    for (protocol, operation, handler) in entries {
        dispatcher
            .register(protocol, operation, handler)
            .expect("duplicate handler in test setup");
    }
    dispatcher
}
