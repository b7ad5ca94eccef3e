//! Wire Reply Types
//!
//! This module defines the replies the server writes back to clients.
//! The protocol is line oriented: every reply is its payload followed by a
//! single `\n`. There are no type prefixes and no length headers, so a
//! client reads replies with a plain line reader.
//!
//! ## Examples
//!
//! Value: `bar\n`
//! Missing value: `\n`
//! Ok: `OK\n`
//! Integer: `2\n`
//! Error: `ERR value is not an integer or out of range\n`

use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

/// The terminator appended to every reply
pub const LF: u8 = b'\n';

/// Fixed reply texts
pub mod text {
    pub const OK: &str = "OK";
    pub const SET_ERROR: &str = "ERROR";
    pub const NOT_AN_INTEGER: &str = "ERR value is not an integer or out of range";
}

/// A single reply line.
///
/// Replies are produced by the command handler and serialized by the
/// connection just before they are queued for writing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// A stored value, an echoed request, or the empty line.
    /// Format: `<bytes>\n`
    Value(Bytes),

    /// Acknowledgement of a successful SET.
    /// Format: `OK\n`
    Ok,

    /// A decimal integer (DEL counts, INCR results).
    /// Format: `<integer>\n`
    Integer(i64),

    /// A fixed error text.
    /// Format: `<message>\n`
    Error(&'static str),
}

impl Reply {
    /// Creates a value reply.
    ///
    /// # Example
    /// ```
    /// use selectkv::protocol::types::Reply;
    /// let reply = Reply::value("bar");
    /// assert_eq!(&reply.serialize()[..], b"bar\n");
    /// ```
    pub fn value(data: impl Into<Bytes>) -> Self {
        Reply::Value(data.into())
    }

    /// The empty line, used for missing keys and some malformed requests.
    pub fn empty() -> Self {
        Reply::Value(Bytes::new())
    }

    /// Creates an integer reply.
    pub fn integer(n: i64) -> Self {
        Reply::Integer(n)
    }

    /// Creates an error reply from one of the fixed texts.
    pub fn error(message: &'static str) -> Self {
        Reply::Error(message)
    }

    /// Serializes the reply to bytes for sending over the wire.
    pub fn serialize(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.serialize_into(&mut buf);
        buf.freeze()
    }

    /// Serializes the reply into an existing buffer.
    ///
    /// Connections use this to append straight onto their outbound queue.
    pub fn serialize_into(&self, buf: &mut BytesMut) {
        match self {
            Reply::Value(data) => buf.extend_from_slice(data),
            Reply::Ok => buf.extend_from_slice(text::OK.as_bytes()),
            Reply::Integer(n) => buf.extend_from_slice(n.to_string().as_bytes()),
            Reply::Error(message) => buf.extend_from_slice(message.as_bytes()),
        }
        buf.put_u8(LF);
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Value(data) => match std::str::from_utf8(data) {
                Ok(s) => write!(f, "\"{}\"", s),
                Err(_) => write!(f, "(binary data, {} bytes)", data.len()),
            },
            Reply::Ok => write!(f, "{}", text::OK),
            Reply::Integer(n) => write!(f, "(integer) {}", n),
            Reply::Error(message) => write!(f, "(error) {}", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_serialize() {
        assert_eq!(&Reply::value("bar").serialize()[..], b"bar\n");
    }

    #[test]
    fn test_empty_serialize() {
        assert_eq!(&Reply::empty().serialize()[..], b"\n");
    }

    #[test]
    fn test_ok_serialize() {
        assert_eq!(&Reply::Ok.serialize()[..], b"OK\n");
    }

    #[test]
    fn test_integer_serialize() {
        assert_eq!(&Reply::integer(1).serialize()[..], b"1\n");
        assert_eq!(&Reply::integer(-42).serialize()[..], b"-42\n");
    }

    #[test]
    fn test_error_serialize() {
        let reply = Reply::error(text::NOT_AN_INTEGER);
        assert_eq!(
            &reply.serialize()[..],
            b"ERR value is not an integer or out of range\n"
        );
    }

    #[test]
    fn test_serialize_into_appends() {
        let mut buf = BytesMut::new();
        Reply::Ok.serialize_into(&mut buf);
        Reply::integer(0).serialize_into(&mut buf);
        assert_eq!(&buf[..], b"OK\n0\n");
    }
}
