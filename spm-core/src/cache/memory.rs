//! Process-local cache store

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::port::{CachePort, CacheStoreError};

/// In-memory [`CachePort`] with an optional byte quota
///
/// The quota counts key and value bytes, mirroring the way browser storage
/// refuses writes once full.
#[derive(Debug, Default)]
pub struct MemoryCachePort {
    entries: Mutex<HashMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemoryCachePort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            quota_bytes: Some(quota_bytes),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, String>>, CacheStoreError> {
        self.entries
            .lock()
            .map_err(|_| CacheStoreError::Unavailable("memory cache lock poisoned".to_string()))
    }
}

impl CachePort for MemoryCachePort {
    fn get(&self, key: &str) -> Result<Option<String>, CacheStoreError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> Result<(), CacheStoreError> {
        let mut entries = self.lock()?;

        if let Some(quota) = self.quota_bytes {
            let used: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let needed = key.len() + value.len();
            if used + needed > quota {
                return Err(CacheStoreError::QuotaExceeded(format!(
                    "{} bytes needed, {} of {} in use",
                    needed, used, quota
                )));
            }
        }

        entries.insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), CacheStoreError> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, CacheStoreError> {
        Ok(self
            .lock()?
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }
}
