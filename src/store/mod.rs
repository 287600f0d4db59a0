//! Key-value persistence for user records and dictionaries.
//!
//! Values are stored as JSON strings under flat keys (`user:<id>`,
//! `user_dictionaries:<id>`, ...). Three implementations are provided:
//! - [`MemoryStore`]: process-local map, lost on restart
//! - [`RedisStore`]: Redis/Upstash via a multiplexed connection manager
//! - [`FallbackStore`]: Redis when reachable, memory when not

mod fallback;
mod memory;
mod redis_store;

pub use fallback::FallbackStore;
pub use memory::MemoryStore;
pub use redis_store::RedisStore;

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Errors raised by a store backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// String key-value store.
///
/// Implementations must be thread-safe; handlers call them concurrently.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError>;

    /// Remove a key. Returns whether it existed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// All keys starting with `prefix`, in no particular order.
    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// Short backend label for diagnostics.
    fn backend_name(&self) -> &'static str;
}

#[async_trait]
impl<S: KvStore + ?Sized> KvStore for Arc<S> {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        (**self).set(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        (**self).delete(key).await
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        (**self).keys(prefix).await
    }

    fn backend_name(&self) -> &'static str {
        (**self).backend_name()
    }
}

/// Read and decode a JSON value.
pub async fn get_json<T: DeserializeOwned>(
    store: &dyn KvStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    match store.get(key).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Encode and write a JSON value.
pub async fn set_json<T: Serialize + ?Sized>(
    store: &dyn KvStore,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    let raw = serde_json::to_string(value)?;
    store.set(key, raw).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        count: u32,
    }

    #[tokio::test]
    async fn test_json_helpers_roundtrip_through_store() {
        let store = MemoryStore::new();
        let value = Sample {
            name: "telop".to_string(),
            count: 3,
        };
        set_json(&store, "sample", &value).await.unwrap();

        let loaded: Option<Sample> = get_json(&store, "sample").await.unwrap();
        assert_eq!(loaded, Some(value));

        let missing: Option<Sample> = get_json(&store, "absent").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_get_json_reports_corrupt_values() {
        let store = MemoryStore::new();
        store.set("broken", "{not json".to_string()).await.unwrap();
        let result: Result<Option<Sample>, _> = get_json(&store, "broken").await;
        assert!(matches!(result, Err(StoreError::Serialization(_))));
    }
}
