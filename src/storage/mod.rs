//! Storage Engine Module
//!
//! This module provides the in-memory key-value store.
//!
//! The store is a plain `HashMap<String, String>` owned by the event loop.
//! Because the server runs on a single thread, no locking is needed and
//! every command sees the effects of all commands processed before it.
//!
//! ## Example
//!
//! ```
//! use selectkv::storage::StorageEngine;
//!
//! let mut engine = StorageEngine::new();
//! engine.set("name".to_string(), "Ariz".to_string());
//! assert_eq!(engine.get("name"), Some("Ariz"));
//! ```

pub mod engine;

// Re-export commonly used types
pub use engine::{StorageEngine, StorageError, StorageStats};
