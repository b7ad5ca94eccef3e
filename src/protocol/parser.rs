//! Request Parser
//!
//! This module turns one framed request into a [`Command`].
//!
//! ## Grammar
//!
//! ```text
//! <KEYWORD> [<arg1> [<arg2>]]
//! ```
//!
//! Tokens are separated by single spaces. There is no quoting and no
//! escaping. Keywords are case-sensitive and must match the whole first
//! token. Anything that is not a known keyword is echoed back.
//!
//! ## How the Parser Works
//!
//! 1. Trailing whitespace and control bytes (`\n`, `\r`, `\0`, ...) are trimmed.
//! 2. An empty request or the disconnect sentinel short-circuits to a close.
//! 3. Invalid UTF-8 falls back to [`Command::Echo`] with the raw bytes.
//! 4. Otherwise the first token selects the command and the following
//!    tokens fill its arguments. Extra tokens are ignored.
//!
//! Parsing never fails: missing arguments produce [`Command::Malformed`],
//! which the command handler answers with a command-specific reply.

use bytes::Bytes;
use std::fmt;

/// The legacy request that means "this peer has nothing more to say".
pub const DISCONNECT_SENTINEL: &str = "foo de fafa";

/// Keywords that take arguments. Used to report which command was malformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Get,
    Set,
    Del,
    Incr,
}

impl Keyword {
    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::Get => "GET",
            Keyword::Set => "SET",
            Keyword::Del => "DEL",
            Keyword::Incr => "INCR",
        }
    }
}

/// A parsed request.
///
/// A command only lives for the duration of one dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `GET key`
    Get { key: String },

    /// `SET key value`
    Set { key: String, value: String },

    /// `DEL key`
    Delete { key: String },

    /// `INCR key`
    Increment { key: String },

    /// `QUIT`
    Quit,

    /// The disconnect sentinel.
    SentinelClose,

    /// A request with no payload, including end of stream.
    Empty,

    /// Unrecognized input, echoed back verbatim.
    Echo(Bytes),

    /// A known keyword with missing arguments.
    Malformed(Keyword),
}

impl Command {
    /// Parses one request.
    ///
    /// `raw` is the request exactly as framed by the connection, including
    /// its line terminator if it had one.
    ///
    /// # Example
    ///
    /// ```
    /// use selectkv::protocol::Command;
    /// use bytes::Bytes;
    ///
    /// let cmd = Command::parse(Bytes::from_static(b"SET foo bar\n"));
    /// assert_eq!(cmd, Command::Set { key: "foo".into(), value: "bar".into() });
    /// ```
    pub fn parse(raw: Bytes) -> Command {
        let end = trimmed_len(&raw);
        if end == 0 {
            return Command::Empty;
        }
        let raw = raw.slice(..end);

        let text = match std::str::from_utf8(&raw) {
            Ok(text) => text,
            Err(_) => return Command::Echo(raw.clone()),
        };

        if text == DISCONNECT_SENTINEL {
            return Command::SentinelClose;
        }

        let mut tokens = text.split(' ');
        let keyword = tokens.next().unwrap_or_default();
        let mut next_arg = || tokens.next().filter(|t| !t.is_empty()).map(str::to_owned);

        match keyword {
            "GET" => match next_arg() {
                Some(key) => Command::Get { key },
                None => Command::Malformed(Keyword::Get),
            },
            "SET" => match (next_arg(), next_arg()) {
                (Some(key), Some(value)) => Command::Set { key, value },
                _ => Command::Malformed(Keyword::Set),
            },
            "DEL" => match next_arg() {
                Some(key) => Command::Delete { key },
                None => Command::Malformed(Keyword::Del),
            },
            "INCR" => match next_arg() {
                Some(key) => Command::Increment { key },
                None => Command::Malformed(Keyword::Incr),
            },
            "QUIT" => Command::Quit,
            _ => Command::Echo(raw.clone()),
        }
    }

    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Get { .. } => "GET",
            Command::Set { .. } => "SET",
            Command::Delete { .. } => "DEL",
            Command::Increment { .. } => "INCR",
            Command::Quit => "QUIT",
            Command::SentinelClose => "SENTINEL",
            Command::Empty => "EMPTY",
            Command::Echo(_) => "ECHO",
            Command::Malformed(keyword) => keyword.as_str(),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Get { key } | Command::Delete { key } | Command::Increment { key } => {
                write!(f, "{} {}", self.name(), key)
            }
            Command::Set { key, value } => write!(f, "SET {} {}", key, value),
            Command::Echo(raw) => write!(f, "ECHO ({} bytes)", raw.len()),
            Command::Malformed(keyword) => write!(f, "{} (missing arguments)", keyword.as_str()),
            _ => write!(f, "{}", self.name()),
        }
    }
}

/// Length of `raw` once trailing whitespace and control bytes are removed.
fn trimmed_len(raw: &[u8]) -> usize {
    raw.iter()
        .rposition(|b| !(b.is_ascii_whitespace() || b.is_ascii_control()))
        .map_or(0, |i| i + 1)
}
