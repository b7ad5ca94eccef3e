//! Single-Owner Storage Engine
//!
//! This module implements the in-memory store behind the server.
//! It maps UTF-8 keys to UTF-8 values and supports four operations:
//! `get`, `set`, `delete` and `incr`.
//!
//! ## Design Decisions
//!
//! 1. **One owner**: The engine is owned by the event loop and every method
//!    takes `&self` or `&mut self`. There are no locks and no atomics.
//! 2. **Validate, then mutate**: `incr` parses the current value before it
//!    writes anything, so a failed increment leaves the map untouched.
//! 3. **No persistence**: The map is created empty and dies with the process.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌──────────────┐   &mut   ┌──────────────────────────┐
//! │  Event Loop  │─────────>│      StorageEngine       │
//! │ (one thread) │          │  HashMap<String, String> │
//! └──────────────┘          └──────────────────────────┘
//! ```
//!
//! Commands run one at a time, so a read-modify-write such as `incr` is
//! atomic with respect to every other command.

use std::collections::HashMap;
use thiserror::Error;

/// Errors returned by storage operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The stored value is not a base-10 integer, or the result overflows.
    #[error("value is not an integer or out of range")]
    NotAnInteger,
}

/// Operation counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StorageStats {
    /// Number of keys currently stored
    pub keys: usize,
    /// Total GET operations
    pub gets: u64,
    /// Total SET operations
    pub sets: u64,
    /// Total DEL operations
    pub deletes: u64,
    /// Total INCR operations, successful or not
    pub increments: u64,
}

/// The in-memory key-value store.
///
/// # Example
///
/// ```
/// use selectkv::storage::StorageEngine;
///
/// let mut engine = StorageEngine::new();
///
/// engine.set("name".to_string(), "Ariz".to_string());
/// assert_eq!(engine.get("name"), Some("Ariz"));
///
/// assert_eq!(engine.incr("visits"), Ok(1));
/// assert_eq!(engine.incr("visits"), Ok(2));
///
/// assert!(engine.delete("name"));
/// assert_eq!(engine.get("name"), None);
/// ```
#[derive(Debug, Default)]
pub struct StorageEngine {
    data: HashMap<String, String>,
    stats: StorageStats,
}

impl StorageEngine {
    /// Creates an empty storage engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the value for a key.
    pub fn get(&mut self, key: &str) -> Option<&str> {
        self.stats.gets += 1;
        self.data.get(key).map(String::as_str)
    }

    /// Sets a key-value pair, overwriting any previous value.
    ///
    /// # Returns
    ///
    /// Returns `true` if a new key was created, `false` if an existing key was updated.
    pub fn set(&mut self, key: String, value: String) -> bool {
        self.stats.sets += 1;
        self.data.insert(key, value).is_none()
    }

    /// Deletes a key.
    ///
    /// # Returns
    ///
    /// Returns `true` if the key was deleted, `false` if it didn't exist.
    pub fn delete(&mut self, key: &str) -> bool {
        self.stats.deletes += 1;
        self.data.remove(key).is_some()
    }

    /// Increments an integer value by 1.
    ///
    /// A missing key is created with the value `1`. An existing value must
    /// parse as a base-10 `i64`; otherwise nothing is written.
    pub fn incr(&mut self, key: &str) -> Result<i64, StorageError> {
        self.stats.increments += 1;

        let new_value = match self.data.get(key) {
            Some(current) => current
                .parse::<i64>()
                .ok()
                .and_then(|n| n.checked_add(1))
                .ok_or(StorageError::NotAnInteger)?,
            None => 1,
        };

        self.data.insert(key.to_string(), new_value.to_string());
        Ok(new_value)
    }

    /// Returns the number of stored keys.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns a snapshot of the operation counters.
    pub fn stats(&self) -> StorageStats {
        StorageStats {
            keys: self.data.len(),
            ..self.stats
        }
    }
}
