//! Read framing - collects socket reads into one request frame
//!
//! A frame is complete once the header separator has arrived. Whatever
//! bytes came with it are the body; there is no length-based framing.

use super::{find, CRLF, HEADER_END};
use crate::{Error, Result};
use bytes::{Bytes, BytesMut};

/// Where the framer is in the current request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// No CRLF seen yet
    AwaitingRequestLine,
    /// Request line complete, header separator not seen yet
    AwaitingHeaders,
    /// Header separator seen; the buffered bytes form the frame
    AwaitingBody,
}

/// Incremental request framer with a hard size limit
#[derive(Debug)]
pub struct RequestFramer {
    buf: BytesMut,
    state: FrameState,
    max_size: usize,
}

impl RequestFramer {
    /// Create a framer that rejects frames larger than `max_size` bytes
    pub fn new(max_size: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(max_size.min(8192)),
            state: FrameState::AwaitingRequestLine,
            max_size,
        }
    }

    /// Current state
    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Number of bytes buffered for the current frame
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Feed bytes from one read.
    ///
    /// Returns `Ok(Some(frame))` once the frame is complete and resets for
    /// the next one, `Ok(None)` when more bytes are needed.
    pub fn feed(&mut self, data: &[u8]) -> Result<Option<Bytes>> {
        let size = self.buf.len() + data.len();
        if size > self.max_size {
            self.reset();
            return Err(Error::RequestTooLarge {
                size,
                limit: self.max_size,
            });
        }
        self.buf.extend_from_slice(data);

        loop {
            match self.state {
                FrameState::AwaitingRequestLine => {
                    if find(&self.buf, CRLF).is_none() {
                        return Ok(None);
                    }
                    self.state = FrameState::AwaitingHeaders;
                }
                FrameState::AwaitingHeaders => {
                    if find(&self.buf, HEADER_END).is_none() {
                        return Ok(None);
                    }
                    self.state = FrameState::AwaitingBody;
                }
                FrameState::AwaitingBody => {
                    self.state = FrameState::AwaitingRequestLine;
                    return Ok(Some(self.buf.split().freeze()));
                }
            }
        }
    }

    /// Drop any partial frame
    pub fn reset(&mut self) {
        self.buf.clear();
        self.state = FrameState::AwaitingRequestLine;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_read() {
        let mut framer = RequestFramer::new(8192);
        let frame = framer
            .feed(b"GET / HTTP/1.1\r\nHost: x\r\n\r\nbody")
            .unwrap()
            .unwrap();

        assert_eq!(&frame[..], b"GET / HTTP/1.1\r\nHost: x\r\n\r\nbody");
        assert_eq!(framer.state(), FrameState::AwaitingRequestLine);
        assert_eq!(framer.buffered(), 0);
    }

    #[test]
    fn test_split_reads() {
        let mut framer = RequestFramer::new(8192);

        assert!(framer.feed(b"GET /users HT").unwrap().is_none());
        assert_eq!(framer.state(), FrameState::AwaitingRequestLine);

        assert!(framer.feed(b"TP/1.1\r\nHost: x\r").unwrap().is_none());
        assert_eq!(framer.state(), FrameState::AwaitingHeaders);

        let frame = framer.feed(b"\n\r\n").unwrap().unwrap();
        assert_eq!(&frame[..], b"GET /users HTTP/1.1\r\nHost: x\r\n\r\n");
        assert_eq!(framer.state(), FrameState::AwaitingRequestLine);
    }

    #[test]
    fn test_frame_parses() {
        let mut framer = RequestFramer::new(8192);
        framer.feed(b"POST /items?id=3 HTTP/1.1\r\n").unwrap();
        let frame = framer.feed(b"A: b\r\n\r\npayload").unwrap().unwrap();

        let req = crate::parser::parse_request(&frame).unwrap();
        assert_eq!(req.path, "/items");
        assert_eq!(req.query.get("id"), Some("3"));
        assert_eq!(&req.body[..], b"payload");
    }

    #[test]
    fn test_too_large() {
        let mut framer = RequestFramer::new(16);
        assert!(framer.feed(b"GET / HTTP").unwrap().is_none());

        let err = framer.feed(b"/1.1\r\nHost: x").unwrap_err();
        assert!(matches!(err, Error::RequestTooLarge { size: 23, limit: 16 }));
        assert_eq!(framer.buffered(), 0);
        assert_eq!(framer.state(), FrameState::AwaitingRequestLine);
    }

    #[test]
    fn test_exact_limit_allowed() {
        let raw = b"GET / HTTP/1.1\r\n\r\n";
        let mut framer = RequestFramer::new(raw.len());
        assert!(framer.feed(raw).unwrap().is_some());
    }
}
