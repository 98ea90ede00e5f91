//! Response sinks that fail in controlled ways.

use std::io::{self, Write};

use ows_protocol::{ResponseHead, ResponseSink};

/// Accepts `limit` body bytes, then fails every write with `BrokenPipe` as
/// a socket does when the peer went away.
#[derive(Debug)]
pub struct DisconnectingSink {
    limit: usize,
    pub head: Option<ResponseHead>,
    pub body: Vec<u8>,
}

impl DisconnectingSink {
    pub fn after(limit: usize) -> Self {
        Self {
            limit,
            head: None,
            body: Vec::new(),
        }
    }
}

impl Write for DisconnectingSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let room = self.limit.saturating_sub(self.body.len());
        if room == 0 {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer closed"));
        }
        let n = room.min(buf.len());
        self.body.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ResponseSink for DisconnectingSink {
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

/// Commits (as if sent to the client) everything written so far once the
/// body exceeds `commit_after` bytes; from then on `reset` fails. Writes
/// beyond `fail_after` bytes fail with a non-disconnect error.
#[derive(Debug)]
pub struct CommittingSink {
    commit_after: usize,
    fail_after: usize,
    committed: bool,
    pub head: Option<ResponseHead>,
    pub body: Vec<u8>,
}

impl CommittingSink {
    pub fn new(commit_after: usize, fail_after: usize) -> Self {
        Self {
            commit_after,
            fail_after,
            committed: false,
            head: None,
            body: Vec::new(),
        }
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }
}

impl Write for CommittingSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.body.len() + buf.len() > self.fail_after {
            return Err(io::Error::new(io::ErrorKind::Other, "storage full"));
        }
        self.body.extend_from_slice(buf);
        if self.body.len() > self.commit_after {
            self.committed = true;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ResponseSink for CommittingSink {
    fn begin(&mut self, head: ResponseHead) -> io::Result<()> {
        self.head = Some(head);
        Ok(())
    }

    fn reset(&mut self) -> bool {
        if self.committed {
            return false;
        }
        self.head = None;
        self.body.clear();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnecting_sink() {
        let mut sink = DisconnectingSink::after(4);
        assert_eq!(sink.write(b"abcdef").unwrap(), 4);
        let err = sink.write(b"g").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn test_committing_sink() {
        let mut sink = CommittingSink::new(2, 100);
        sink.write_all(b"ab").unwrap();
        assert!(sink.reset());
        sink.write_all(b"abc").unwrap();
        assert!(sink.is_committed());
        assert!(!sink.reset());
    }
}
