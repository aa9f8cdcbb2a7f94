//! Redis-backed distributed cache.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::cache::Cache;
use crate::error::SecurityError;

/// Distributed cache over a managed Redis connection. TTLs map to native
/// key expiry, so cross-instance eviction needs no sweeping.
pub struct RedisCache {
    conn: Arc<RwLock<ConnectionManager>>,
}

impl RedisCache {
    /// Connect to Redis at the given URL.
    ///
    /// # Errors
    ///
    /// Returns [`SecurityError::StoreGet`] if the client or connection
    /// manager cannot be created.
    pub async fn new(redis_url: &str) -> Result<Self, SecurityError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| SecurityError::StoreGet(e.to_string()))?;

        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| SecurityError::StoreGet(e.to_string()))?;

        Ok(Self {
            conn: Arc::new(RwLock::new(conn)),
        })
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, SecurityError> {
        let mut conn = self.conn.write().await;
        conn.get(key)
            .await
            .map_err(|e| SecurityError::StoreGet(e.to_string()))
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), SecurityError> {
        let mut conn = self.conn.write().await;
        // SETEX rejects a zero expiry; clamp to the smallest representable.
        let secs = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(key, value, secs)
            .await
            .map_err(|e| SecurityError::StoreSet(e.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), SecurityError> {
        let mut conn = self.conn.write().await;
        conn.del::<_, ()>(key)
            .await
            .map_err(|e| SecurityError::StoreDelete(e.to_string()))
    }

    async fn exists(&self, key: &str) -> Result<bool, SecurityError> {
        let mut conn = self.conn.write().await;
        conn.exists(key)
            .await
            .map_err(|e| SecurityError::StoreGet(e.to_string()))
    }
}
