//! File-backed cache store
//!
//! One JSON document per key. File names are the sha256 of the key, so any
//! key (including the JSON tag fingerprint) maps to a safe file name; the
//! original key is stored inside the document for prefix scans.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::warn;

use super::port::{CachePort, CacheStoreError};

#[derive(Serialize, Deserialize)]
struct StoredValue {
    key: String,
    value: String,
}

/// [`CachePort`] storing entries as files under a directory
#[derive(Debug, Clone)]
pub struct FileCachePort {
    dir: PathBuf,
}

impl FileCachePort {
    /// Use `dir` for cache files, creating it if missing
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, CacheStoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.dir.join(format!("{:x}.json", digest))
    }

    fn read_stored(path: &Path) -> Result<Option<StoredValue>, CacheStoreError> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl CachePort for FileCachePort {
    fn get(&self, key: &str) -> Result<Option<String>, CacheStoreError> {
        Ok(Self::read_stored(&self.path_for(key))?
            .filter(|stored| stored.key == key)
            .map(|stored| stored.value))
    }

    fn set(&self, key: &str, value: String) -> Result<(), CacheStoreError> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_string(&StoredValue {
            key: key.to_string(),
            value,
        })?;

        // Write then rename so readers never observe a half-written entry
        fs::write(&tmp, body)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), CacheStoreError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, CacheStoreError> {
        let mut keys = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            match Self::read_stored(&path) {
                Ok(Some(stored)) if stored.key.starts_with(prefix) => keys.push(stored.key),
                Ok(_) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable cache file"),
            }
        }

        Ok(keys)
    }
}
