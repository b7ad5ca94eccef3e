//! # selectkv - A Single-Threaded In-Memory Key-Value Server
//!
//! selectkv serves a tiny line protocol over TCP from one thread. A single
//! event loop multiplexes the listening socket and every client socket by
//! readiness, so one slow client never holds up another and the store needs
//! no synchronization at all.
//!
//! ## Features
//!
//! - **Line Protocol**: `GET`, `SET`, `DEL`, `INCR`, `QUIT`; anything else is echoed
//! - **One Thread**: all sockets and the store live on a current-thread Tokio runtime
//! - **Non-blocking**: reads and writes are `try_read` / `try_write`; only the
//!   readiness wait suspends
//! - **Line Framing**: requests split across packets are reassembled, pipelined
//!   requests are served one per readiness event
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                         selectkv (one thread)                       │
//! │                                                                     │
//! │  ┌──────────────────────────────────────────────────────────────┐   │
//! │  │                       EventLoop                              │   │
//! │  │  listener + HashMap<ConnectionId, Connection>                │   │
//! │  └───────────────┬───────────────────────────────┬──────────────┘   │
//! │                  │ request bytes                 │ reply bytes      │
//! │                  ▼                               │                  │
//! │  ┌─────────────┐    ┌─────────────────┐    ┌─────┴───────┐          │
//! │  │  Command    │───>│ CommandHandler  │───>│   Reply     │          │
//! │  │  Parser     │    └────────┬────────┘    └─────────────┘          │
//! │  └─────────────┘             │                                      │
//! │                              ▼                                      │
//! │                  ┌────────────────────────┐                         │
//! │                  │    StorageEngine       │                         │
//! │                  │ HashMap<String,String> │                         │
//! │                  └────────────────────────┘                         │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use selectkv::server::EventLoop;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let server = EventLoop::bind("127.0.0.1:3000").await?;
//!     server.run().await;
//!     Ok(())
//! }
//! ```
//!
//! ```text
//! $ nc localhost 3000
//! SET foo bar
//! OK
//! GET foo
//! bar
//! INCR counter
//! 1
//! foo de fafa
//! ```
//!
//! ## Module Overview
//!
//! - [`protocol`]: request parser and reply types
//! - [`storage`]: the single-owner key-value store
//! - [`commands`]: executes commands against the store
//! - [`connection`]: per-client buffers and non-blocking socket I/O
//! - [`server`]: the readiness event loop
//! - [`config`]: command-line configuration

pub mod commands;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod server;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::{CommandHandler, Outcome};
pub use config::Config;
pub use connection::{Connection, ConnectionStats};
pub use protocol::{Command, Reply};
pub use server::{EventLoop, ServerError};
pub use storage::StorageEngine;

/// The default port the server listens on
pub const DEFAULT_PORT: u16 = 3000;

/// The default host the server binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of selectkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
