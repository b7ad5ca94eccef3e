//! Line Protocol Implementation
//!
//! This module provides the text protocol spoken between clients and the server.
//!
//! ## Overview
//!
//! Requests are short space-separated lines (`GET key`, `SET key value`,
//! `DEL key`, `INCR key`, `QUIT`). Replies are single lines terminated by `\n`.
//! Input is newline-agnostic: trailing whitespace is trimmed before parsing.
//!
//! ## Modules
//!
//! - `types`: Defines the `Reply` enum and serialization
//! - `parser`: Turns a framed request into a `Command`
//!
//! ## Example
//!
//! ```
//! use selectkv::protocol::{Command, Reply};
//! use bytes::Bytes;
//!
//! let cmd = Command::parse(Bytes::from_static(b"GET name\n"));
//! assert_eq!(cmd, Command::Get { key: "name".into() });
//!
//! let reply = Reply::value("Ariz");
//! assert_eq!(&reply.serialize()[..], b"Ariz\n");
//! ```

pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use parser::{Command, Keyword, DISCONNECT_SENTINEL};
pub use types::Reply;
