//! In-memory store backend.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{KvStore, StoreError};

/// Process-local map. Cloning shares the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.entries.write().await.remove(key).is_some())
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .entries
            .read()
            .await
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = MemoryStore::new();
        assert!(store.is_empty().await);

        store.set("user:a", "1".to_string()).await.unwrap();
        assert_eq!(store.get("user:a").await.unwrap().as_deref(), Some("1"));

        assert!(store.delete("user:a").await.unwrap());
        assert!(!store.delete("user:a").await.unwrap());
        assert!(store.get("user:a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_keys_filters_by_prefix() {
        let store = MemoryStore::new();
        store.set("user:a", "{}".to_string()).await.unwrap();
        store.set("user:b", "{}".to_string()).await.unwrap();
        store.set("users_initialized", "true".to_string()).await.unwrap();

        let mut keys = store.keys("user:").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["user:a", "user:b"]);
        assert_eq!(store.len().await, 3);
    }

    #[tokio::test]
    async fn test_clones_share_entries() {
        let store = MemoryStore::new();
        let other = store.clone();
        store.set("k", "v".to_string()).await.unwrap();
        assert_eq!(other.get("k").await.unwrap().as_deref(), Some("v"));
    }
}
