//! Request Framing
//!
//! TCP is a stream protocol: one read may carry half a request, or several.
//! `RequestBuffer` accumulates the bytes read from one connection and hands
//! them out one request at a time.
//!
//! ## Framing Rules
//!
//! - A request ends at `\n` (the terminator stays attached; the parser trims it).
//! - The buffer never holds more than its capacity. When it fills up
//!   without a newline, everything buffered becomes one request and the
//!   rest of that line, terminator included, is discarded as it arrives.
//! - After end of stream, leftover bytes form a final request, and once the
//!   buffer is drained every further request is empty.
//!
//! Only bytes actually read are ever appended, so nothing from an earlier,
//! longer request can leak into a later one.

use bytes::{Bytes, BytesMut};

/// Logical capacity of a connection's request buffer, and therefore the
/// longest request the server accepts.
pub const REQUEST_BUFFER_CAPACITY: usize = 256;

/// Per-connection accumulator for partially received requests.
#[derive(Debug)]
pub struct RequestBuffer {
    buf: BytesMut,
    capacity: usize,
    eof: bool,
    /// Dropping input up to the next newline after a truncated request
    discarding: bool,
}

impl Default for RequestBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestBuffer {
    /// Creates a buffer with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(REQUEST_BUFFER_CAPACITY)
    }

    /// Creates a buffer holding at most `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            capacity,
            eof: false,
            discarding: false,
        }
    }

    /// How many more bytes may be appended.
    pub fn spare(&self) -> usize {
        self.capacity.saturating_sub(self.buf.len())
    }

    /// Appends freshly read bytes. Anything beyond the spare room is dropped.
    pub fn extend(&mut self, mut bytes: &[u8]) {
        if self.discarding {
            match bytes.iter().position(|&b| b == b'\n') {
                Some(pos) => {
                    bytes = &bytes[pos + 1..];
                    self.discarding = false;
                }
                None => return,
            }
        }
        let n = bytes.len().min(self.spare());
        self.buf.extend_from_slice(&bytes[..n]);
    }

    /// Records that the peer closed its side of the stream.
    pub fn mark_eof(&mut self) {
        self.eof = true;
    }

    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Returns true if [`next_request`](Self::next_request) would yield something.
    pub fn has_request(&self) -> bool {
        self.eof || self.buf.len() >= self.capacity || self.newline().is_some()
    }

    /// Removes and returns the next complete request.
    pub fn next_request(&mut self) -> Option<Bytes> {
        if let Some(pos) = self.newline() {
            return Some(self.buf.split_to(pos + 1).freeze());
        }
        if self.buf.len() >= self.capacity {
            self.discarding = true;
            return Some(self.buf.split().freeze());
        }
        if self.eof {
            return Some(self.buf.split().freeze());
        }
        None
    }

    fn newline(&self) -> Option<usize> {
        self.buf.iter().position(|&b| b == b'\n')
    }
}
