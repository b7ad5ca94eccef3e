//! Command Handler Module
//!
//! This module implements the command processing layer.
//! It receives parsed commands, executes them against the storage engine,
//! and returns either a reply or a request to close the connection.
//!
//! ## Architecture
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │ Request Parser  │  (protocol module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (this module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ StorageEngine   │  (storage module)
//! └─────────────────┘
//! ```
//!
//! ## Supported Commands
//!
//! - `GET key`, `SET key value`, `DEL key`, `INCR key`
//! - `QUIT` and the `foo de fafa` sentinel close the connection
//! - anything else is echoed back

pub mod handler;

// Re-export the main command handler
pub use handler::{CloseReason, CommandHandler, Outcome};
