//! Command Handler Module
//!
//! This module executes parsed commands against the storage engine and
//! decides what goes back on the wire.
//!
//! ## Replies
//!
//! | Command | Reply |
//! |---|---|
//! | `GET k` | value, or the empty line when `k` is missing |
//! | `SET k v` | `OK` |
//! | `SET` with missing arguments | `ERROR` |
//! | `DEL k` | `1` if removed, `0` if absent |
//! | `DEL` with no key | the empty line |
//! | `INCR k` | the new value, or `ERR value is not an integer or out of range` |
//! | `QUIT`, sentinel, empty request | no reply, the connection closes |
//! | anything else | the request echoed back |
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CommandHandler                          │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │   Command   │───>│  execute()  │───>│   Outcome   │     │
//! │  └─────────────┘    └──────┬──────┘    └─────────────┘     │
//! │                            │                                │
//! │                            ▼                                │
//! │                      StorageEngine                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use crate::protocol::types::text;
use crate::protocol::{Command, Keyword, Reply};
use crate::storage::{StorageEngine, StorageStats};
use std::fmt;
use tracing::trace;

/// Why a command asked for its connection to be closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The client sent `QUIT`
    Quit,
    /// The client sent the disconnect sentinel
    Sentinel,
    /// The client sent an empty request or closed its side
    EmptyRequest,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::Quit => write!(f, "quit"),
            CloseReason::Sentinel => write!(f, "disconnect sentinel"),
            CloseReason::EmptyRequest => write!(f, "empty request"),
        }
    }
}

/// The result of executing one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Write this reply back on the same connection
    Reply(Reply),
    /// Close the connection without replying
    Close(CloseReason),
}

/// Executes commands against the store it owns.
#[derive(Debug, Default)]
pub struct CommandHandler {
    /// The storage engine
    storage: StorageEngine,
}

impl CommandHandler {
    /// Creates a new command handler with the given storage engine.
    pub fn new(storage: StorageEngine) -> Self {
        Self { storage }
    }

    /// Executes a command and returns what the connection should do next.
    ///
    /// The store is only mutated once a command's arguments are known to
    /// be complete.
    pub fn execute(&mut self, command: Command) -> Outcome {
        trace!(command = %command, "Executing command");

        let reply = match command {
            Command::Get { key } => self.cmd_get(&key),
            Command::Set { key, value } => self.cmd_set(key, value),
            Command::Delete { key } => self.cmd_del(&key),
            Command::Increment { key } => self.cmd_incr(&key),
            Command::Echo(raw) => Reply::Value(raw),
            Command::Malformed(keyword) => Self::malformed(keyword),
            Command::Quit => return Outcome::Close(CloseReason::Quit),
            Command::SentinelClose => return Outcome::Close(CloseReason::Sentinel),
            Command::Empty => return Outcome::Close(CloseReason::EmptyRequest),
        };

        Outcome::Reply(reply)
    }

    /// Read-only access to the store.
    pub fn storage(&self) -> &StorageEngine {
        &self.storage
    }

    /// Returns the store's operation counters.
    pub fn stats(&self) -> StorageStats {
        self.storage.stats()
    }

    /// GET key
    fn cmd_get(&mut self, key: &str) -> Reply {
        match self.storage.get(key) {
            Some(value) => Reply::value(value.to_owned()),
            None => Reply::empty(),
        }
    }

    /// SET key value
    fn cmd_set(&mut self, key: String, value: String) -> Reply {
        self.storage.set(key, value);
        Reply::Ok
    }

    /// DEL key
    fn cmd_del(&mut self, key: &str) -> Reply {
        Reply::integer(self.storage.delete(key) as i64)
    }

    /// INCR key
    fn cmd_incr(&mut self, key: &str) -> Reply {
        match self.storage.incr(key) {
            Ok(n) => Reply::integer(n),
            Err(_) => Reply::error(text::NOT_AN_INTEGER),
        }
    }

    fn malformed(keyword: Keyword) -> Reply {
        match keyword {
            Keyword::Set => Reply::error(text::SET_ERROR),
            Keyword::Get | Keyword::Del | Keyword::Incr => Reply::empty(),
        }
    }
}
