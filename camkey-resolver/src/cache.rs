//! Resolved-key cache
//!
//! Records are stored as JSON keyed by cache key and are valid for 30 days
//! after `cached_at`. Stale records are not deleted; the next resolution for
//! the key overwrites them. Writes are last-writer-wins.

use async_trait::async_trait;
use camkey_common::{ResolvedKey, Result};
use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

/// How long a cached record stays valid, in days
pub const CACHE_TTL_DAYS: i64 = 30;

pub fn cache_ttl() -> Duration {
    Duration::days(CACHE_TTL_DAYS)
}

/// Persistent key-value store backing the cache
///
/// Each `load`/`store` is atomic for its key; no cross-key transactions.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    async fn load(&self, cache_key: &str) -> Result<Option<String>>;
    async fn store(&self, cache_key: &str, record: String) -> Result<()>;
}

/// `key_cache` table in the service database
pub struct SqliteCacheStorage {
    db: SqlitePool,
}

impl SqliteCacheStorage {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CacheStorage for SqliteCacheStorage {
    async fn load(&self, cache_key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT record FROM key_cache WHERE cache_key = ?")
                .bind(cache_key)
                .fetch_optional(&self.db)
                .await?;

        Ok(row.map(|(record,)| record))
    }

    async fn store(&self, cache_key: &str, record: String) -> Result<()> {
        sqlx::query(
            "INSERT INTO key_cache (cache_key, record, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)
             ON CONFLICT(cache_key) DO UPDATE SET
                 record = excluded.record,
                 updated_at = excluded.updated_at",
        )
        .bind(cache_key)
        .bind(record)
        .execute(&self.db)
        .await?;

        Ok(())
    }
}

/// Process-local store, used by tests and `--ephemeral` runs
#[derive(Default)]
pub struct MemoryCacheStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn load(&self, cache_key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(cache_key).cloned())
    }

    async fn store(&self, cache_key: &str, record: String) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(cache_key.to_string(), record);
        Ok(())
    }
}

/// Typed cache over a [`CacheStorage`]
#[derive(Clone)]
pub struct KeyCache {
    storage: Arc<dyn CacheStorage>,
}

impl KeyCache {
    pub fn new(storage: Arc<dyn CacheStorage>) -> Self {
        Self { storage }
    }

    /// Cached record for `cache_key`, fresh or not
    ///
    /// A record that fails to decode is logged and treated as absent.
    pub async fn get(&self, cache_key: &str) -> Result<Option<ResolvedKey>> {
        let Some(raw) = self.storage.load(cache_key).await? else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!(cache_key = %cache_key, error = %e, "Discarding undecodable cache record");
                Ok(None)
            }
        }
    }

    /// Replace the record for `cache_key`
    pub async fn set(&self, cache_key: &str, record: &ResolvedKey) -> Result<()> {
        let raw = serde_json::to_string(record)?;
        self.storage.store(cache_key, raw).await
    }

    /// Cached record for `cache_key` only if still fresh
    pub async fn get_fresh(&self, cache_key: &str) -> Result<Option<ResolvedKey>> {
        Ok(self
            .get(cache_key)
            .await?
            .filter(|record| is_fresh(record, Utc::now())))
    }
}

/// A record is fresh while `now - cached_at` is under the TTL
pub fn is_fresh(record: &ResolvedKey, now: DateTime<Utc>) -> bool {
    now.signed_duration_since(record.cached_at) < cache_ttl()
}
