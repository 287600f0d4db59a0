//! Redis with an in-memory safety net.
//!
//! When Redis is not configured, or a call to it fails, the operation is
//! served from a process-local map instead. Data written during an outage
//! lives only in this process and is lost on restart.

use async_trait::async_trait;

use super::{KvStore, MemoryStore, RedisStore, StoreError};

pub struct FallbackStore {
    primary: Option<Box<dyn KvStore>>,
    memory: MemoryStore,
}

impl FallbackStore {
    /// Memory only.
    pub fn memory() -> Self {
        Self {
            primary: None,
            memory: MemoryStore::new(),
        }
    }

    /// Serve from `primary`, falling back to memory whenever it errors.
    pub fn with_primary(primary: impl KvStore + 'static) -> Self {
        Self {
            primary: Some(Box::new(primary)),
            memory: MemoryStore::new(),
        }
    }

    /// Try to reach Redis at `url`; fall back to memory if absent or unreachable.
    pub async fn connect(url: Option<&str>) -> Self {
        let Some(url) = url.filter(|u| !u.trim().is_empty()) else {
            log::warn!("Store: no Redis URL configured, using in-memory storage");
            return Self::memory();
        };

        match RedisStore::connect(url).await {
            Ok(store) => match store.ping().await {
                Ok(()) => {
                    log::info!("Store: connected to Redis");
                    Self::with_primary(store)
                }
                Err(e) => {
                    log::warn!("Store: Redis ping failed ({}), using in-memory storage", e);
                    Self::memory()
                }
            },
            Err(e) => {
                log::warn!("Store: Redis connect failed ({}), using in-memory storage", e);
                Self::memory()
            }
        }
    }

    /// Whether a primary store was established at start-up.
    pub fn has_redis(&self) -> bool {
        self.primary.is_some()
    }
}

#[async_trait]
impl KvStore for FallbackStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        if let Some(primary) = &self.primary {
            match primary.get(key).await {
                Ok(value) => return Ok(value),
                Err(e) => log::warn!("Store: get {} failed on Redis, using memory: {}", key, e),
            }
        }
        self.memory.get(key).await
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        if let Some(primary) = &self.primary {
            match primary.set(key, value.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) => log::warn!("Store: set {} failed on Redis, using memory: {}", key, e),
            }
        }
        self.memory.set(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        if let Some(primary) = &self.primary {
            match primary.delete(key).await {
                Ok(removed) => return Ok(removed),
                Err(e) => log::warn!("Store: delete {} failed on Redis, using memory: {}", key, e),
            }
        }
        self.memory.delete(key).await
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        if let Some(primary) = &self.primary {
            match primary.keys(prefix).await {
                Ok(keys) => return Ok(keys),
                Err(e) => log::warn!("Store: scan {}* failed on Redis, using memory: {}", prefix, e),
            }
        }
        self.memory.keys(prefix).await
    }

    fn backend_name(&self) -> &'static str {
        match &self.primary {
            Some(primary) => primary.backend_name(),
            None => "memory",
        }
    }
}
