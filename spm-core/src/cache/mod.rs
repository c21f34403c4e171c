//! Local match cache
//!
//! Remembers the markers a remote query returned for an (actor, tag
//! fingerprint, page) triple so a revisit renders without waiting on the
//! network. Entries carry the remote total count; a caller that knows a newer
//! count passes it in and gets the stale data back together with a refresh
//! signal.
//!
//! The cache is best-effort. Storage failures are logged and swallowed: a
//! failed write degrades to "no cache", a failed or corrupt read to a miss.

mod file;
mod memory;
mod port;

pub use file::FileCachePort;
pub use memory::MemoryCachePort;
pub use port::{CachePort, CacheStoreError};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::marker::{MarkerRecord, PageKey};

/// Namespace prefix shared by every cache key
pub const CACHE_PREFIX: &str = "marker-cache-";

/// Entries older than this are expired
pub const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);

/// Stored cache record
///
/// `data` holds the markers exactly as the remote query returned them for
/// `tag_fingerprint`; rule-specific post-filters run after the read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub actor_id: String,
    pub tag_fingerprint: String,
    #[serde(default)]
    pub page_key: Option<PageKey>,
    /// Remote total for the query, used as the staleness tripwire
    pub count: u64,
    pub data: Vec<MarkerRecord>,
    #[serde(default)]
    pub ratings: HashMap<String, u8>,
    pub timestamp_ms: i64,
    #[serde(default)]
    pub marker_digest: String,
}

/// Result of a cache read
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheLookup {
    /// `None` on a miss
    pub data: Option<Vec<MarkerRecord>>,
    pub ratings: HashMap<String, u8>,
    /// Stored remote total, when an entry was found
    pub count: Option<u64>,
    pub is_from_cache: bool,
    pub should_refresh: bool,
}

impl CacheLookup {
    fn miss() -> Self {
        Self {
            should_refresh: true,
            ..Default::default()
        }
    }

    fn hit(entry: CacheEntry, should_refresh: bool) -> Self {
        Self {
            count: Some(entry.count),
            data: Some(entry.data),
            ratings: entry.ratings,
            is_from_cache: true,
            should_refresh,
        }
    }
}

/// Serialised sorted, deduplicated tag ids
///
/// Input order never matters: `["b","a"]` and `["a","b"]` fingerprint alike.
pub fn tag_fingerprint(tag_ids: &[String]) -> String {
    let mut ids: Vec<&str> = tag_ids.iter().map(String::as_str).collect();
    ids.sort_unstable();
    ids.dedup();
    serde_json::to_string(&ids).unwrap_or_else(|_| "[]".to_string())
}

/// Storage key for an actor, tag set and optional page
pub fn cache_key(actor_id: &str, tag_ids: &[String], page: Option<PageKey>) -> String {
    let mut key = format!("{}{}-{}", CACHE_PREFIX, actor_id, tag_fingerprint(tag_ids));
    if let Some(page) = page {
        key.push_str(&format!("-p{}-{}", page.page, page.per_page));
    }
    key
}

/// sha256 hex digest over the sorted marker ids
pub fn marker_digest<'a>(ids: impl IntoIterator<Item = &'a str>) -> String {
    let mut ids: Vec<&str> = ids.into_iter().collect();
    ids.sort_unstable();
    ids.dedup();

    let mut hasher = Sha256::new();
    for id in ids {
        hasher.update(id.as_bytes());
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Match cache over an injected [`CachePort`]
#[derive(Clone)]
pub struct MatchCache {
    port: Arc<dyn CachePort>,
    ttl: Duration,
}

impl MatchCache {
    pub fn new(port: Arc<dyn CachePort>) -> Self {
        Self::with_ttl(port, DEFAULT_TTL)
    }

    pub fn with_ttl(port: Arc<dyn CachePort>, ttl: Duration) -> Self {
        Self { port, ttl }
    }

    /// Process-local cache with the default TTL
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryCachePort::new()))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up the entry for `actor_id` and `tag_ids`
    ///
    /// When `expected_count` differs from the stored count, the stored data
    /// is still returned but `should_refresh` is set.
    pub fn get(
        &self,
        actor_id: &str,
        tag_ids: &[String],
        expected_count: Option<u64>,
        page: Option<PageKey>,
    ) -> CacheLookup {
        self.get_at(actor_id, tag_ids, expected_count, page, now_ms())
    }

    /// [`MatchCache::get`] evaluated at an explicit clock reading
    pub fn get_at(
        &self,
        actor_id: &str,
        tag_ids: &[String],
        expected_count: Option<u64>,
        page: Option<PageKey>,
        now_ms: i64,
    ) -> CacheLookup {
        let key = cache_key(actor_id, tag_ids, page);
        let Some(entry) = self.read_entry(&key, now_ms) else {
            return CacheLookup::miss();
        };

        let stale = expected_count.is_some_and(|expected| expected != entry.count);
        if stale {
            debug!(
                key = %key,
                cached = entry.count,
                expected = ?expected_count,
                "Cached count differs from remote count"
            );
        } else {
            debug!(key = %key, markers = entry.data.len(), "Cache hit");
        }

        CacheLookup::hit(entry, stale)
    }

    /// Look up an entry and compare its marker set against `expected_ids`
    ///
    /// Catches edits that leave the total count unchanged. Entries written
    /// without a digest always ask for a refresh.
    pub fn get_with_ids(
        &self,
        actor_id: &str,
        tag_ids: &[String],
        expected_ids: &[String],
        page: Option<PageKey>,
    ) -> CacheLookup {
        let key = cache_key(actor_id, tag_ids, page);
        let Some(entry) = self.read_entry(&key, now_ms()) else {
            return CacheLookup::miss();
        };

        let expected = marker_digest(expected_ids.iter().map(String::as_str));
        let stale = entry.marker_digest != expected;
        if stale {
            debug!(key = %key, "Cached marker set differs from remote marker set");
        }

        CacheLookup::hit(entry, stale)
    }

    /// Replace the entry for `actor_id` and `tag_ids` with a fresh timestamp
    ///
    /// Returns `false` when the write failed; the failure is logged and the
    /// caller carries on uncached.
    pub fn set(
        &self,
        actor_id: &str,
        tag_ids: &[String],
        count: u64,
        data: Vec<MarkerRecord>,
        ratings: HashMap<String, u8>,
        page: Option<PageKey>,
    ) -> bool {
        self.set_at(actor_id, tag_ids, count, data, ratings, page, now_ms())
    }

    /// [`MatchCache::set`] with an explicit timestamp
    #[allow(clippy::too_many_arguments)]
    pub fn set_at(
        &self,
        actor_id: &str,
        tag_ids: &[String],
        count: u64,
        data: Vec<MarkerRecord>,
        ratings: HashMap<String, u8>,
        page: Option<PageKey>,
        timestamp_ms: i64,
    ) -> bool {
        let key = cache_key(actor_id, tag_ids, page);
        let entry = CacheEntry {
            actor_id: actor_id.to_string(),
            tag_fingerprint: tag_fingerprint(tag_ids),
            page_key: page,
            count,
            marker_digest: marker_digest(data.iter().map(|m| m.id.as_str())),
            data,
            ratings,
            timestamp_ms,
        };

        let body = match serde_json::to_string(&entry) {
            Ok(body) => body,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to serialize cache entry");
                return false;
            }
        };

        match self.port.set(&key, body) {
            Ok(()) => {
                debug!(key = %key, count, markers = entry.data.len(), "Cache entry stored");
                true
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Cache write failed, continuing uncached");
                false
            }
        }
    }

    /// Delete one entry
    pub fn clear(&self, actor_id: &str, tag_ids: &[String], page: Option<PageKey>) {
        let key = cache_key(actor_id, tag_ids, page);
        if let Err(e) = self.port.delete(&key) {
            warn!(key = %key, error = %e, "Failed to delete cache entry");
        }
    }

    /// Delete every entry under [`CACHE_PREFIX`]; returns how many were removed
    pub fn clear_all(&self) -> usize {
        let keys = match self.port.keys_with_prefix(CACHE_PREFIX) {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "Failed to list cache entries");
                return 0;
            }
        };

        let mut removed = 0;
        for key in keys {
            match self.port.delete(&key) {
                Ok(()) => removed += 1,
                Err(e) => warn!(key = %key, error = %e, "Failed to delete cache entry"),
            }
        }
        debug!(removed, "Cache cleared");
        removed
    }

    /// Load a live entry, evicting it if expired or unreadable
    fn read_entry(&self, key: &str, now_ms: i64) -> Option<CacheEntry> {
        let raw = match self.port.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(key = %key, "Cache miss");
                return None;
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Cache read failed, treating as miss");
                return None;
            }
        };

        let entry: CacheEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key = %key, error = %e, "Evicting unreadable cache entry");
                self.evict(key);
                return None;
            }
        };

        let age_ms = now_ms.saturating_sub(entry.timestamp_ms);
        if age_ms > self.ttl.as_millis() as i64 {
            debug!(key = %key, age_ms, "Evicting expired cache entry");
            self.evict(key);
            return None;
        }

        Some(entry)
    }

    fn evict(&self, key: &str) {
        if let Err(e) = self.port.delete(key) {
            warn!(key = %key, error = %e, "Failed to evict cache entry");
        }
    }
}

impl std::fmt::Debug for MatchCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchCache").field("ttl", &self.ttl).finish()
    }
}
