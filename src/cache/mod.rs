//! Distributed cache contract.
//!
//! Cross-instance consistency of reuse markers, bindings, and the
//! distributed blacklist depends entirely on the backing store's
//! atomicity of single-key get/set; no client-side locking is layered on
//! top. Keys are namespaced strings (`token:reuse:<id>`,
//! `auth:binding:device:<id>`, ...).

mod memory;
mod redis;

pub use memory::MemoryCache;
pub use redis::RedisCache;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::SecurityError;

/// Narrow key-value contract consumed by policy, binding, and blacklist
/// storage. Implementations must be safe for concurrent use.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Fetch a value. Absent and expired keys both return `None`.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, SecurityError>;

    /// Store a value with the given time-to-live.
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), SecurityError>;

    /// Remove a key. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), SecurityError>;

    /// True when the key is present and unexpired.
    async fn exists(&self, key: &str) -> Result<bool, SecurityError> {
        Ok(self.get(key).await?.is_some())
    }
}
