//! Destinations for encoded responses.

use std::io::{self, Write};

/// Status line and content type announced before the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: u16,
    pub content_type: String,
}

impl ResponseHead {
    pub fn ok(content_type: impl Into<String>) -> Self {
        Self {
            status: 200,
            content_type: content_type.into(),
        }
    }
}

/// A body writer that is told the response head first.
pub trait ResponseSink: Write {
    fn begin(&mut self, head: ResponseHead) -> io::Result<()>;

    /// Drop the head and any body bytes not yet delivered so a fault can be
    /// written instead. Returns `false` once bytes have reached the client.
    fn reset(&mut self) -> bool;
}

/// In-memory sink.
#[derive(Debug, Default)]
pub struct BufferSink {
    pub head: Option<ResponseHead>,
    pub body: Vec<u8>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn body_str(&self) -> &str {
        std::str::from_utf8(&self.body).unwrap_or("")
    }
}

impl Write for BufferSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ResponseSink for BufferSink {
    fn begin(&mut self, head: ResponseHead) -> io::Result<()> {
        self.head = Some(head);
        Ok(())
    }

    fn reset(&mut self) -> bool {
        self.head = None;
        self.body.clear();
        true
    }
}
