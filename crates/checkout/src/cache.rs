//! Persistent local cache.
//!
//! A scoped key/value store whose entries expire after a time-to-live. An
//! expired or deleted entry reads as absent.
//!
//! - [`MemoryCache`] keeps entries in a `moka` cache with per-entry expiry.
//! - [`FileCache`] keeps entries in a JSON file so they survive restarts.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moka::Expiry;
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

/// Well-known cache keys.
pub mod keys {
    /// Totals returned when the shipping information was saved.
    pub const PAYMENT_TOTALS: &str = "PAYMENT_TOTALS";
    /// Id of the cart being checked out.
    pub const CART_ID: &str = "CART_ID";
}

/// Errors from cache storage.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Reading or writing the backing file failed.
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored data could not be encoded or decoded.
    #[error("Cache serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Key/value store with per-entry time-to-live.
#[async_trait]
pub trait LocalCache: Send + Sync {
    /// Value under `key`, or `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError>;

    /// Store `value` under `key` for `ttl`. A zero `ttl` deletes the key.
    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), CacheError>;

    /// Remove `key`. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

// =============================================================================
// MemoryCache
// =============================================================================

#[derive(Clone)]
struct TimedValue {
    value: Value,
    ttl: Duration,
}

struct PerEntryTtl;

impl Expiry<String, TimedValue> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &TimedValue,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &TimedValue,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-process cache. Entries are lost when the process exits.
#[derive(Clone)]
pub struct MemoryCache {
    entries: Cache<String, TimedValue>,
}

impl MemoryCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(1000)
                .expire_after(PerEntryTtl)
                .build(),
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocalCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        Ok(self.entries.get(key).await.map(|entry| entry.value))
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), CacheError> {
        if ttl.is_zero() {
            return self.delete(key).await;
        }
        self.entries
            .insert(key.to_string(), TimedValue { value, ttl })
            .await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.invalidate(key).await;
        Ok(())
    }
}

// =============================================================================
// FileCache
// =============================================================================

/// A stored value and the moment it stops being valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub value: Value,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Cache persisted as a JSON object in a single file.
///
/// Every operation reads the file and writes it back under a lock, so one
/// process is the only writer. A missing file is an empty cache.
pub struct FileCache {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileCache {
    /// Cache backed by `path`. The file is created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Backing file location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All live entries, expired ones dropped.
    ///
    /// # Errors
    ///
    /// Returns `CacheError` if the file cannot be read or parsed.
    pub async fn entries(&self) -> Result<BTreeMap<String, CacheEntry>, CacheError> {
        let _guard = self.lock.lock().await;
        let now = Utc::now();
        let mut entries = self.load().await?;
        entries.retain(|_, entry| !entry.is_expired(now));
        Ok(entries)
    }

    /// Remove every entry.
    ///
    /// # Errors
    ///
    /// Returns `CacheError` if the file cannot be removed.
    pub async fn clear(&self) -> Result<(), CacheError> {
        let _guard = self.lock.lock().await;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn load(&self) -> Result<BTreeMap<String, CacheEntry>, CacheError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn store(&self, entries: &BTreeMap<String, CacheEntry>) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec_pretty(entries)?;
        tokio::fs::write(&self.path, bytes).await?;
        Ok(())
    }
}

#[async_trait]
impl LocalCache for FileCache {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let _guard = self.lock.lock().await;
        let entries = self.load().await?;

        Ok(match entries.get(key) {
            Some(entry) if entry.is_expired(Utc::now()) => {
                debug!("Cache entry expired");
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        })
    }

    #[instrument(skip(self, value), fields(path = %self.path.display()))]
    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), CacheError> {
        if ttl.is_zero() {
            return self.delete(key).await;
        }

        let _guard = self.lock.lock().await;
        let now = Utc::now();
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let mut entries = self.load().await?;
        entries.retain(|_, entry| !entry.is_expired(now));
        entries.insert(key.to_string(), CacheEntry { value, expires_at });
        self.store(&entries).await
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        if entries.remove(key).is_some() {
            self.store(&entries).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn test_memory_cache_set_get_delete() {
        let cache = MemoryCache::new();
        assert!(cache.get(keys::CART_ID).await.unwrap().is_none());

        cache.set(keys::CART_ID, json!("cart-1"), HOUR).await.unwrap();
        assert_eq!(cache.get(keys::CART_ID).await.unwrap(), Some(json!("cart-1")));

        cache.delete(keys::CART_ID).await.unwrap();
        assert!(cache.get(keys::CART_ID).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_cache_zero_ttl_deletes() {
        let cache = MemoryCache::new();
        cache.set("k", json!(1), HOUR).await.unwrap();
        cache.set("k", json!(2), Duration::ZERO).await.unwrap();
        assert!(cache.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_cache_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let cache = FileCache::new(&path);
        cache
            .set(keys::PAYMENT_TOTALS, json!({"grand_total": "10.00"}), HOUR)
            .await
            .unwrap();
        drop(cache);

        let reopened = FileCache::new(&path);
        assert_eq!(
            reopened.get(keys::PAYMENT_TOTALS).await.unwrap(),
            Some(json!({"grand_total": "10.00"}))
        );
        assert_eq!(reopened.entries().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_file_cache_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path().join("absent.json"));
        assert!(cache.get("anything").await.unwrap().is_none());
        cache.delete("anything").await.unwrap();
        cache.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_file_cache_expired_entry_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let mut entries = BTreeMap::new();
        entries.insert(
            "stale".to_string(),
            CacheEntry {
                value: json!(true),
                expires_at: Utc::now() - chrono::Duration::minutes(1),
            },
        );
        tokio::fs::write(&path, serde_json::to_vec(&entries).unwrap())
            .await
            .unwrap();

        let cache = FileCache::new(&path);
        assert!(cache.get("stale").await.unwrap().is_none());
        assert!(cache.entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_cache_delete_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path().join("cache.json"));
        cache.set("a", json!(1), HOUR).await.unwrap();
        cache.set("b", json!(2), HOUR).await.unwrap();

        cache.delete("a").await.unwrap();
        assert!(cache.get("a").await.unwrap().is_none());
        assert_eq!(cache.get("b").await.unwrap(), Some(json!(2)));

        cache.clear().await.unwrap();
        assert!(cache.entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_cache_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        tokio::fs::write(&path, b"not json").await.unwrap();

        let cache = FileCache::new(&path);
        assert!(matches!(cache.get("k").await, Err(CacheError::Json(_))));
    }
}
