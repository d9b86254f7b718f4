#![warn(missing_docs)]
//! Anchor history persistence.
//!
//! The whole history is one JSON blob stored under [`STORAGE_KEY`] in a
//! [`KeyValueStore`]. Every mutation is a full read-modify-write of that blob.

mod history;
mod kv;

pub use history::{AnchorHistoryStore, StoreConfig, STORAGE_KEY};
pub use kv::{JsonFileStore, KeyValueStore, MemoryStore};

use thiserror::Error;

/// Errors raised by the history store and its backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend I/O failed.
    #[error("failed to access anchor history storage: {0}")]
    Io(#[from] std::io::Error),
    /// The stored blob is not valid history JSON.
    #[error("failed to parse anchor history: {0}")]
    Parse(#[from] serde_json::Error),
    /// The key cannot be mapped onto the backend.
    #[error("invalid storage key '{0}'")]
    InvalidKey(String),
}
