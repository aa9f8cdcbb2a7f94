//! Cache-backed revocation registry for multi-instance deployments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::blacklist::{Blacklist, BlacklistEntry, ReasonedBlacklist};
use crate::cache::Cache;
use crate::error::SecurityError;
use crate::metrics::{outcome, SecurityMetrics};

fn blacklist_key(token: &str) -> String {
    format!("blacklist:{token}")
}

/// Revocation registry over the distributed cache. Eviction is implicit
/// via the store's native TTL, so no sweep task runs; the absolute-expiry
/// invariant is still re-checked on read against the stored entry, which
/// guards against coarse store TTL granularity.
pub struct DistributedBlacklist {
    cache: Arc<dyn Cache>,
    metrics: Arc<SecurityMetrics>,
}

impl DistributedBlacklist {
    /// Create a registry over the given cache.
    #[must_use]
    pub fn new(cache: Arc<dyn Cache>, metrics: Arc<SecurityMetrics>) -> Self {
        Self { cache, metrics }
    }

    async fn live_entry(&self, token: &str) -> Result<Option<BlacklistEntry>, SecurityError> {
        let Some(raw) = self.cache.get(&blacklist_key(token)).await? else {
            return Ok(None);
        };

        let entry: BlacklistEntry = match serde_json::from_slice(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Dropping corrupt blacklist entry");
                self.cache.delete(&blacklist_key(token)).await?;
                return Ok(None);
            }
        };

        if entry.is_expired() {
            self.cache.delete(&blacklist_key(token)).await?;
            return Ok(None);
        }
        Ok(Some(entry))
    }

    async fn put_entry(
        &self,
        token: &str,
        entry: &BlacklistEntry,
        ttl: Duration,
    ) -> Result<(), SecurityError> {
        let doc = serde_json::to_vec(entry)
            .map_err(|e| SecurityError::StoreSet(format!("unserializable entry: {e}")))?;
        self.cache.set(&blacklist_key(token), &doc, ttl).await?;
        self.metrics.record_outcome("blacklist_add", outcome::SUCCESS);
        Ok(())
    }
}

#[async_trait]
impl Blacklist for DistributedBlacklist {
    async fn is_blacklisted(&self, token: &str) -> Result<bool, SecurityError> {
        let hit = self.live_entry(token).await?.is_some();
        self.metrics.record_blacklist_lookup(hit);
        Ok(hit)
    }

    async fn add(&self, token: &str, expires_at: DateTime<Utc>) -> Result<(), SecurityError> {
        let now = Utc::now();
        if expires_at <= now {
            // Already expired; by the expiry invariant it would never
            // read as blacklisted, so skip the write.
            return Ok(());
        }
        let ttl = (expires_at - now)
            .to_std()
            .unwrap_or(Duration::from_secs(1));
        self.put_entry(
            token,
            &BlacklistEntry {
                reason: None,
                expires_at,
            },
            ttl,
        )
        .await
    }
}

#[async_trait]
impl ReasonedBlacklist for DistributedBlacklist {
    async fn add_with_reason(
        &self,
        token_id: &str,
        reason: &str,
        ttl: Duration,
    ) -> Result<(), SecurityError> {
        let expires_at = Utc::now()
            + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::MAX);
        self.put_entry(
            token_id,
            &BlacklistEntry {
                reason: Some(reason.to_string()),
                expires_at,
            },
            ttl,
        )
        .await
    }

    async fn get(&self, token_id: &str) -> Result<Option<BlacklistEntry>, SecurityError> {
        let entry = self.live_entry(token_id).await?;
        self.metrics.record_blacklist_lookup(entry.is_some());
        Ok(entry)
    }

    async fn remove(&self, token_id: &str) -> Result<(), SecurityError> {
        self.cache.delete(&blacklist_key(token_id)).await
    }
}
