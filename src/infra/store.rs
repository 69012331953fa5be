//! Local persistent store seam.
//!
//! Entity sync routines read a last-known-good value from here before asking
//! the network, and persist fresh values after a successful fetch. The store
//! speaks JSON values so one implementation serves every entity kind.

use std::num::NonZeroUsize;

use async_trait::async_trait;
use lru::LruCache;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to serialize value for `{key}`: {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("storage backend failed: {message}")]
    Backend { message: String },
}

/// Key-value persistence for last-known-good entity payloads.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;
    async fn put(&self, key: &str, value: Value) -> Result<(), StoreError>;
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Read a stored value, treating every failure as a miss.
///
/// The stored copy is an optimization, never an authority: an unreadable or
/// schema-stale entry is logged and ignored.
pub async fn read_stored<T: DeserializeOwned>(store: &dyn CacheStore, key: &str) -> Option<T> {
    match store.get(key).await {
        Ok(Some(value)) => match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(error) => {
                debug!(key, %error, "stored value does not match the current schema; ignoring");
                None
            }
        },
        Ok(None) => None,
        Err(error) => {
            debug!(key, %error, "store read failed; treating as absent");
            None
        }
    }
}

/// Persist a value, logging instead of failing: losing the cached copy only
/// costs the next session a network round trip.
pub async fn write_stored<T: Serialize>(store: &dyn CacheStore, key: &str, value: &T) {
    match serde_json::to_value(value) {
        Ok(value) => {
            if let Err(error) = store.put(key, value).await {
                debug!(key, %error, "store write failed; continuing without persistence");
            }
        }
        Err(error) => {
            debug!(key, %error, "value not serializable; skipping persistence");
        }
    }
}

/// Drop a stored value, logging on failure.
pub async fn remove_stored(store: &dyn CacheStore, key: &str) {
    if let Err(error) = store.remove(key).await {
        debug!(key, %error, "store remove failed");
    }
}

/// Bounded in-memory store for tests and embedded use.
pub struct MemoryStore {
    entries: RwLock<LruCache<String, Value>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(NonZeroUsize::new(DEFAULT_CAPACITY).unwrap_or(NonZeroUsize::MIN))
    }
}

impl MemoryStore {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(capacity)),
        }
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.entries.write().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.entries.write().await.put(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().await.pop(key);
        Ok(())
    }
}
