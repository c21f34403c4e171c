//! Cache backing-store port
//!
//! The match cache never touches storage directly; it goes through
//! [`CachePort`], a synchronous string key-value interface. Operations must
//! not block on network I/O: cache reads and writes happen inline with
//! request handling.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheStoreError {
    /// Write rejected because the store is full
    #[error("Storage quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Store cannot be used at all (e.g. a poisoned lock)
    #[error("Cache storage unavailable: {0}")]
    Unavailable(String),
}

/// Synchronous key-value storage for serialized cache entries
pub trait CachePort: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, CacheStoreError>;

    /// Replace the value stored under `key`
    fn set(&self, key: &str, value: String) -> Result<(), CacheStoreError>;

    /// Remove `key`; removing a missing key is not an error
    fn delete(&self, key: &str) -> Result<(), CacheStoreError>;

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, CacheStoreError>;
}
