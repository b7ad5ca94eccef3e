//! Connection Module
//!
//! This module manages individual client connections.
//! Connections are not tasks: every accepted socket becomes a
//! [`Connection`] value owned by the event loop, which services all of
//! them from one thread.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Event Loop                            │
//! │                  (server::event_loop)                       │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │
//!                        │ readable / writable
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Connection                             │
//! │                                                             │
//! │  ┌─────────────┐    ┌──────────────┐    ┌─────────────┐     │
//! │  │ try_read    │───>│ RequestBuffer│───>│ one request │     │
//! │  └─────────────┘    └──────────────┘    └─────────────┘     │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐                         │
//! │  │ reply bytes │───>│ try_write   │                         │
//! │  └─────────────┘    └─────────────┘                         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Non-blocking I/O**: every socket call is a `try_read` / `try_write`
//! - **Line Framing**: requests split across reads are reassembled
//! - **Pipelining**: buffered requests are dispatched one per readiness event
//! - **Statistics**: Tracks connection and command metrics

pub mod buffer;
pub mod handler;

// Re-export commonly used types
pub use buffer::{RequestBuffer, REQUEST_BUFFER_CAPACITY};
pub use handler::{
    Connection, ConnectionError, ConnectionId, ConnectionStats, Disconnect, Ready,
};
