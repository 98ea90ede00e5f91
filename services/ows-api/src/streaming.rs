//! Bridges the blocking request pipeline to a streamed HTTP response.
//!
//! The pipeline runs on a blocking worker and writes into a [`ChannelSink`].
//! Body bytes are buffered until a chunk is full, then the head is committed
//! and chunks go through a bounded channel to the response body. Until the
//! first commit the whole response can still be replaced by a fault.

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use ows_common::{map_to_fault, OwsError};
use ows_protocol::{Disposition, FaultEnvelope, Outcome, RawRequest, ResponseHead, ResponseSink};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use crate::state::AppState;

/// Body bytes held back before the head is committed.
pub const CHUNK_SIZE: usize = 16 * 1024;
/// Chunks in flight between the worker and the connection.
const CHANNEL_DEPTH: usize = 2;

type Chunk = Result<Bytes, io::Error>;

pub struct ChannelSink {
    head_tx: Option<oneshot::Sender<ResponseHead>>,
    body_tx: mpsc::Sender<Chunk>,
    head: Option<ResponseHead>,
    buffer: Vec<u8>,
    committed: bool,
}

impl ChannelSink {
    pub fn new(head_tx: oneshot::Sender<ResponseHead>, body_tx: mpsc::Sender<Chunk>) -> Self {
        Self {
            head_tx: Some(head_tx),
            body_tx,
            head: None,
            buffer: Vec::with_capacity(CHUNK_SIZE),
            committed: false,
        }
    }

    /// Whether any part of the response has been handed to the connection.
    pub fn is_committed(&self) -> bool {
        self.committed
    }

    fn commit(&mut self) -> io::Result<()> {
        if self.committed {
            return Ok(());
        }
        let head = self
            .head
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "body written before response head"))?;
        let head_tx = self
            .head_tx
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "response head already sent"))?;
        head_tx.send(head).map_err(|_| disconnected())?;
        self.committed = true;
        Ok(())
    }

    fn send_buffer(&mut self) -> io::Result<()> {
        self.commit()?;
        if self.buffer.is_empty() {
            return Ok(());
        }
        let chunk = Bytes::from(std::mem::replace(&mut self.buffer, Vec::with_capacity(CHUNK_SIZE)));
        self.body_tx.blocking_send(Ok(chunk)).map_err(|_| disconnected())
    }

    /// Commit the head and deliver whatever is still buffered.
    pub fn finish(mut self) -> io::Result<()> {
        if self.head.is_none() && !self.committed {
            return Ok(());
        }
        self.send_buffer()
    }

    /// End a committed response with an error so the client sees a broken
    /// body instead of a truncated document.
    pub fn abort(self) {
        let _ = self
            .body_tx
            .blocking_send(Err(io::Error::new(io::ErrorKind::Other, "response aborted")));
    }
}

fn disconnected() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "client disconnected")
}

impl Write for ChannelSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        if self.buffer.len() >= CHUNK_SIZE {
            self.send_buffer()?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ResponseSink for ChannelSink {
    fn begin(&mut self, head: ResponseHead) -> io::Result<()> {
        if self.committed {
            return Err(io::Error::new(io::ErrorKind::Other, "response head already sent"));
        }
        self.head = Some(head);
        Ok(())
    }

    fn reset(&mut self) -> bool {
        if self.committed {
            return false;
        }
        self.head = None;
        self.buffer.clear();
        true
    }
}

/// Run `raw` through the pipeline on a blocking worker and stream the result.
pub async fn serve(state: Arc<AppState>, raw: RawRequest) -> Response {
    let (head_tx, head_rx) = oneshot::channel();
    let (body_tx, body_rx) = mpsc::channel::<Chunk>(CHANNEL_DEPTH);

    let context = state.context.clone();
    let metrics = state.metrics.clone();
    metrics.request_started();

    let worker = tokio::task::spawn_blocking(move || {
        let started = Instant::now();
        let mut sink = ChannelSink::new(head_tx, body_tx);
        let mut outcome = context.process(raw, &mut sink);
        settle(sink, &mut outcome);
        metrics.record_outcome(&outcome, started.elapsed());

        match &outcome.disposition {
            Disposition::Sent => debug!(
                protocol = ?outcome.protocol,
                operation = ?outcome.operation,
                version = ?outcome.version,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Request served"
            ),
            Disposition::Faulted { failed_at, fault, .. } => debug!(
                protocol = ?outcome.protocol,
                operation = ?outcome.operation,
                stage = %failed_at,
                code = %fault.exception_code,
                "Request faulted"
            ),
            Disposition::Abandoned { at } => info!(
                protocol = ?outcome.protocol,
                operation = ?outcome.operation,
                stage = %at,
                "Client disconnected, request abandoned"
            ),
        }
    });

    let head = match head_rx.await {
        Ok(head) => head,
        Err(_) => {
            // The worker ended without producing a head.
            return match worker.await {
                Err(e) => {
                    error!(error = %e, "Request worker failed");
                    fault_response(&OwsError::Internal(format!("Request worker failed: {}", e)))
                }
                // Abandoned: nobody is left to read a response.
                Ok(()) => fault_response(&OwsError::Internal("No response produced".to_string())),
            };
        }
    };

    let stream = futures::stream::unfold(body_rx, |mut rx| async move { rx.recv().await.map(|chunk| (chunk, rx)) });
    build_response(head, Body::from_stream(stream))
}

/// Flush or abort the sink once the pipeline is done with it. A client that
/// goes away during the final flush turns the outcome into an abandonment.
fn settle(sink: ChannelSink, outcome: &mut Outcome) {
    let abandoned = matches!(outcome.disposition, Disposition::Abandoned { .. });
    let undelivered = matches!(outcome.disposition, Disposition::Faulted { delivered: false, .. });
    if undelivered {
        sink.abort();
    } else if !abandoned {
        // Small responses are only flushed here.
        if let Err(e) = sink.finish() {
            if OwsError::from(e).is_client_disconnect() {
                outcome.disposition = Disposition::Abandoned {
                    at: outcome.lifecycle.current(),
                };
            }
        }
    }
}

fn build_response(head: ResponseHead, body: Body) -> Response {
    let status = StatusCode::from_u16(head.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = Response::new(body);
    *response.status_mut() = status;
    if let Ok(value) = HeaderValue::from_str(&head.content_type) {
        response.headers_mut().insert(header::CONTENT_TYPE, value);
    }
    response
}

/// A fault for a request that never reached the pipeline, in the default
/// exception report format.
pub fn fault_response(err: &OwsError) -> Response {
    let fault = map_to_fault(err);
    let envelope = FaultEnvelope::DEFAULT;
    let mut body = Vec::new();
    if let Err(e) = envelope.write(&fault, &mut body) {
        error!(error = %e, "Failed to encode fault");
        return (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response();
    }
    build_response(
        ResponseHead {
            status: envelope.http_status(&fault),
            content_type: envelope.content_type().to_string(),
        },
        Body::from(body),
    )
}
