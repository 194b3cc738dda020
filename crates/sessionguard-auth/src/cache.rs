//! TTL cache contract and the in-memory backend
//!
//! Refresh-token records and the two auto-refresh entries live behind
//! [`TtlCache`]. Correct single-use refresh tokens need [`TtlCache::pull`] to
//! be atomic per key; backends that cannot provide that fall back to
//! get-then-forget, which tolerates a duplicate exchange under a race.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use thiserror::Error;
use tokio::time::Instant;
use tracing::trace;

/// Cache backend errors
#[derive(Debug, Error)]
pub enum CacheError {
    /// Backend unreachable or rejected the command
    #[error("Cache backend error: {reason}")]
    Backend {
        /// Backend-provided detail
        reason: String,
    },

    /// Stored value could not be (de)serialized
    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CacheError {
    /// Shorthand for [`CacheError::Backend`]
    pub fn backend(reason: impl Into<String>) -> Self {
        Self::Backend {
            reason: reason.into(),
        }
    }
}

/// Key/value cache with per-entry expiry
#[async_trait]
pub trait TtlCache: Send + Sync + fmt::Debug {
    /// Fetch a live entry
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError>;

    /// Store an entry that expires after `ttl`
    async fn put(&self, key: &str, value: Value, ttl: Duration) -> Result<(), CacheError>;

    /// Remove an entry, returning whether it existed
    async fn forget(&self, key: &str) -> Result<bool, CacheError>;

    /// Whether a live entry exists
    async fn has(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.get(key).await?.is_some())
    }

    /// Fetch and remove an entry
    ///
    /// Backends with an atomic primitive override this; the default is a
    /// non-atomic get followed by forget.
    async fn pull(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let value = self.get(key).await?;
        if value.is_some() {
            self.forget(key).await?;
        }
        Ok(value)
    }
}

/// Convert a TTL in seconds; `None` when the entry would already be expired
pub fn ttl_from_secs(secs: i64) -> Option<Duration> {
    u64::try_from(secs)
        .ok()
        .filter(|&s| s > 0)
        .map(Duration::from_secs)
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Process-local [`TtlCache`] on a concurrent hash map
///
/// Expiry follows the tokio clock, so paused-time tests can advance it.
/// Expired entries are dropped lazily on access or by [`MemoryCache::purge_expired`].
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, Entry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        before - self.entries.len()
    }

    /// Number of stored entries, including expired ones not yet purged
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_if_expired(&self, key: &str, now: Instant) {
        self.entries.remove_if(key, |_, entry| !entry.is_live(now));
    }
}

#[async_trait]
impl TtlCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let now = Instant::now();
        self.evict_if_expired(key, now);
        Ok(self.entries.get(key).map(|entry| entry.value.clone()))
    }

    async fn put(&self, key: &str, value: Value, ttl: Duration) -> Result<(), CacheError> {
        if ttl.is_zero() {
            trace!(key, "Skipping cache write with zero TTL");
            return Ok(());
        }
        let expires_at = Instant::now() + ttl;
        self.entries
            .insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn forget(&self, key: &str) -> Result<bool, CacheError> {
        let now = Instant::now();
        Ok(self
            .entries
            .remove(key)
            .is_some_and(|(_, entry)| entry.is_live(now)))
    }

    async fn pull(&self, key: &str) -> Result<Option<Value>, CacheError> {
        // one removal: concurrent pulls of the same key see exactly one winner
        let now = Instant::now();
        Ok(self
            .entries
            .remove(key)
            .filter(|(_, entry)| entry.is_live(now))
            .map(|(_, entry)| entry.value))
    }
}
