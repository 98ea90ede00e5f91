//! The request pipeline: envelope → negotiation → decode → dispatch → encode.
//!
//! [`ServiceContext::process`] drives one request through its lifecycle and
//! always ends in one of three ways: the response was sent, a fault was
//! produced (and delivered when the sink still allowed it), or the client
//! went away and the request was abandoned.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use ows_common::{map_to_fault, OwsError, OwsFault, OwsResult, Protocol, ProtocolVersion};
use tracing::{debug, error, warn};

use crate::codec::RequestCodec;
use crate::dispatch::Dispatcher;
use crate::envelope::{RawRequest, RequestEnvelope};
use crate::exceptions::FaultEnvelope;
use crate::negotiate::{negotiate, negotiate_accept_versions};
use crate::registry::VersionRegistry;
use crate::sink::{ResponseHead, ResponseSink};

/// Lifecycle stages of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Received,
    Decoding,
    DecodeFailed,
    Decoded,
    Negotiating,
    NegotiateFailed,
    Negotiated,
    Dispatching,
    HandlerFailed,
    Handled,
    Encoding,
    EncodeFailed,
    Sent,
    Abandoned,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Received => "RECEIVED",
            Stage::Decoding => "DECODING",
            Stage::DecodeFailed => "DECODE_FAILED",
            Stage::Decoded => "DECODED",
            Stage::Negotiating => "NEGOTIATING",
            Stage::NegotiateFailed => "NEGOTIATE_FAILED",
            Stage::Negotiated => "NEGOTIATED",
            Stage::Dispatching => "DISPATCHING",
            Stage::HandlerFailed => "HANDLER_FAILED",
            Stage::Handled => "HANDLED",
            Stage::Encoding => "ENCODING",
            Stage::EncodeFailed => "ENCODE_FAILED",
            Stage::Sent => "SENT",
            Stage::Abandoned => "ABANDONED",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Stage::DecodeFailed | Stage::NegotiateFailed | Stage::HandlerFailed | Stage::EncodeFailed
        )
    }

    /// Whether the lifecycle may move from `self` to `next`.
    ///
    /// The payload is decoded by the negotiated codec, so a decode failure
    /// can also follow `Negotiated`. Every failure may be followed by the
    /// encoding of its fault.
    pub fn can_advance_to(&self, next: Stage) -> bool {
        use Stage::*;
        if next == Abandoned {
            return !matches!(self, Sent | Abandoned);
        }
        match self {
            Received => next == Decoding,
            Decoding => matches!(next, DecodeFailed | Decoded),
            Decoded => next == Negotiating,
            Negotiating => matches!(next, NegotiateFailed | Negotiated),
            Negotiated => matches!(next, Dispatching | DecodeFailed),
            Dispatching => matches!(next, HandlerFailed | Handled),
            Handled => next == Encoding,
            Encoding => matches!(next, EncodeFailed | Sent),
            DecodeFailed | NegotiateFailed | HandlerFailed | EncodeFailed => next == Encoding,
            Sent | Abandoned => false,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stages a request has gone through, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lifecycle {
    stages: Vec<Stage>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            stages: vec![Stage::Received],
        }
    }

    pub fn current(&self) -> Stage {
        self.stages.last().copied().unwrap_or(Stage::Received)
    }

    pub fn advance(&mut self, next: Stage) {
        debug_assert!(
            self.current().can_advance_to(next),
            "invalid lifecycle transition {} -> {}",
            self.current(),
            next
        );
        self.stages.push(next);
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// How a request ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    Sent,
    Faulted {
        failed_at: Stage,
        fault: OwsFault,
        /// `false` when the fault could not be written, e.g. because part
        /// of the response had already been delivered.
        delivered: bool,
    },
    Abandoned {
        at: Stage,
    },
}

#[derive(Debug, Clone)]
pub struct Outcome {
    pub protocol: Option<Protocol>,
    pub operation: Option<String>,
    pub version: Option<ProtocolVersion>,
    pub lifecycle: Lifecycle,
    pub disposition: Disposition,
}

impl Outcome {
    /// Label for the `outcome` metric dimension.
    pub fn label(&self) -> &'static str {
        match self.disposition {
            Disposition::Sent => "sent",
            Disposition::Faulted { .. } => "fault",
            Disposition::Abandoned { .. } => "abandoned",
        }
    }

    pub fn fault(&self) -> Option<&OwsFault> {
        match &self.disposition {
            Disposition::Faulted { fault, .. } => Some(fault),
            _ => None,
        }
    }
}

/// Everything needed to serve requests: the codec registry, the handler
/// table and the fault policy. Immutable once built.
#[derive(Debug, Clone)]
pub struct ServiceContext {
    registry: VersionRegistry,
    dispatcher: Dispatcher,
    fault_status: Option<u16>,
}

impl ServiceContext {
    pub fn new(registry: VersionRegistry, dispatcher: Dispatcher) -> Self {
        Self {
            registry,
            dispatcher,
            fault_status: None,
        }
    }

    /// Answer every fault with this HTTP status instead of the per-code one.
    pub fn with_fault_status(mut self, status: Option<u16>) -> Self {
        self.fault_status = status;
        self
    }

    pub fn registry(&self) -> &VersionRegistry {
        &self.registry
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Run one request to completion, writing the response or fault to
    /// `sink`.
    pub fn process<S: ResponseSink>(&self, raw: RawRequest, sink: &mut S) -> Outcome {
        let hint = raw.fault_hint();
        let mut run = Run {
            ctx: self,
            lifecycle: Lifecycle::new(),
            protocol: hint.0,
            operation: None,
            version: None,
            codec: None,
        };

        let disposition = run.execute(raw, hint.1, sink);
        Outcome {
            protocol: run.protocol,
            operation: run.operation,
            version: run.version,
            lifecycle: run.lifecycle,
            disposition,
        }
    }

    /// Version negotiation for an envelope, including `AcceptVersions` of
    /// GetCapabilities.
    fn negotiate(&self, envelope: &RequestEnvelope) -> OwsResult<ProtocolVersion> {
        let supported = self.registry.supported_versions(envelope.protocol);
        if supported.is_empty() {
            return Err(OwsError::UnknownProtocol(envelope.protocol.to_string()));
        }
        if envelope.is_get_capabilities() && !envelope.accept_versions.is_empty() {
            return negotiate_accept_versions(&envelope.accept_versions, &supported);
        }
        let requested = envelope
            .version
            .as_deref()
            .map(str::parse::<ProtocolVersion>)
            .transpose()?;
        negotiate(requested, &supported)
    }

    /// Best codec to report a fault with when negotiation did not produce
    /// one: nearest match to what the client asked for, if anything.
    fn fault_codec(&self, protocol: Option<Protocol>, version: Option<&str>) -> Option<Arc<dyn RequestCodec>> {
        let protocol = protocol?;
        let supported = self.registry.supported_versions(protocol);
        let requested = version.and_then(|v| v.trim().parse().ok());
        let version = negotiate(requested, &supported).ok()?;
        self.registry.codec_for(protocol, version).ok()
    }
}

/// State of one request while it moves through the pipeline.
struct Run<'a> {
    ctx: &'a ServiceContext,
    lifecycle: Lifecycle,
    protocol: Option<Protocol>,
    operation: Option<String>,
    version: Option<ProtocolVersion>,
    codec: Option<Arc<dyn RequestCodec>>,
}

impl Run<'_> {
    fn execute<S: ResponseSink>(&mut self, raw: RawRequest, hinted_version: Option<String>, sink: &mut S) -> Disposition {
        // DECODING: routing information only.
        self.lifecycle.advance(Stage::Decoding);
        let envelope = match RequestEnvelope::read(raw) {
            Ok(envelope) => envelope,
            Err(err) => {
                self.codec = self.ctx.fault_codec(self.protocol, hinted_version.as_deref());
                return self.fail(Stage::DecodeFailed, err, sink);
            }
        };
        self.protocol = Some(envelope.protocol);
        self.operation = Some(envelope.operation.clone());
        self.lifecycle.advance(Stage::Decoded);

        // NEGOTIATING
        self.lifecycle.advance(Stage::Negotiating);
        let negotiated = self
            .ctx
            .negotiate(&envelope)
            .and_then(|version| Ok((version, self.ctx.registry.codec_for(envelope.protocol, version)?)));
        let codec = match negotiated {
            Ok((version, codec)) => {
                self.version = Some(version);
                codec
            }
            Err(err) => {
                self.codec = self.ctx.fault_codec(Some(envelope.protocol), None);
                return self.fail(Stage::NegotiateFailed, err, sink);
            }
        };
        self.codec = Some(codec.clone());
        self.lifecycle.advance(Stage::Negotiated);
        debug!(
            protocol = %envelope.protocol,
            operation = %envelope.operation,
            requested = envelope.version.as_deref().unwrap_or("-"),
            negotiated = %codec.version(),
            "Version negotiated"
        );

        // Payload decoding by the negotiated codec.
        let request = match codec.decode(envelope) {
            Ok(request) => request,
            Err(err) => return self.fail(Stage::DecodeFailed, err, sink),
        };

        // DISPATCHING
        self.lifecycle.advance(Stage::Dispatching);
        let dispatched = panic::catch_unwind(AssertUnwindSafe(|| self.ctx.dispatcher.dispatch(request)))
            .unwrap_or_else(|payload| Err(OwsError::Internal(format!("Handler panicked: {}", panic_message(&*payload)))));
        let response = match dispatched {
            Ok(response) => response,
            Err(err) => return self.fail(Stage::HandlerFailed, err, sink),
        };
        self.lifecycle.advance(Stage::Handled);

        // ENCODING
        self.lifecycle.advance(Stage::Encoding);
        let head = ResponseHead::ok(codec.content_type(&response));
        let written = sink
            .begin(head)
            .map_err(OwsError::from)
            .and_then(|_| codec.encode(&response, sink));
        match written {
            Ok(()) => {
                self.lifecycle.advance(Stage::Sent);
                Disposition::Sent
            }
            Err(err) => self.fail(Stage::EncodeFailed, err, sink),
        }
    }

    /// Route a failure through the fault mapper and one attempt at encoding
    /// the fault.
    fn fail<S: ResponseSink>(&mut self, stage: Stage, err: OwsError, sink: &mut S) -> Disposition {
        if err.is_client_disconnect() {
            return self.abandon(sink);
        }
        self.lifecycle.advance(stage);

        let fault = map_to_fault(&err);
        if fault.exception_code.http_status() >= 500 {
            error!(stage = %stage, error = %err, code = %fault.exception_code, "Request failed");
        } else {
            debug!(stage = %stage, error = %err, code = %fault.exception_code, "Request rejected");
        }

        if !sink.reset() {
            warn!(stage = %stage, "Response already partially sent, fault not delivered");
            return Disposition::Faulted {
                failed_at: stage,
                fault,
                delivered: false,
            };
        }

        self.lifecycle.advance(Stage::Encoding);
        let envelope = self
            .codec
            .as_ref()
            .map(|codec| codec.fault_envelope())
            .unwrap_or(FaultEnvelope::DEFAULT);
        let head = ResponseHead {
            status: self.ctx.fault_status.unwrap_or_else(|| envelope.http_status(&fault)),
            content_type: envelope.content_type().to_string(),
        };

        let codec = self.codec.clone();
        let written = sink.begin(head).map_err(OwsError::from).and_then(|_| match &codec {
            Some(codec) => codec.encode_fault(&fault, sink),
            None => envelope.write(&fault, sink),
        });

        match written {
            Ok(()) => {
                self.lifecycle.advance(Stage::Sent);
                Disposition::Faulted {
                    failed_at: stage,
                    fault,
                    delivered: true,
                }
            }
            Err(write_err) if write_err.is_client_disconnect() => self.abandon(sink),
            Err(write_err) => {
                error!(error = %write_err, "Failed to encode fault");
                self.lifecycle.advance(Stage::EncodeFailed);
                Disposition::Faulted {
                    failed_at: stage,
                    fault,
                    delivered: false,
                }
            }
        }
    }

    fn abandon<S: ResponseSink>(&mut self, sink: &mut S) -> Disposition {
        let at = self.lifecycle.current();
        self.lifecycle.advance(Stage::Abandoned);
        sink.reset();
        debug!(stage = %at, "Client disconnected, request abandoned");
        Disposition::Abandoned { at }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown cause")
}
