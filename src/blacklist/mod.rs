//! Revocation (blacklist) storage with TTL eviction.
//!
//! Request-path middleware consults a blacklist to short-circuit revoked
//! tokens before any further validation. The governing invariant: an
//! entry is never considered blacklisted once its expiry has passed, even
//! if no sweep has removed it yet.

mod distributed;
mod memory;

pub use distributed::DistributedBlacklist;
pub use memory::{MemoryBlacklist, DEFAULT_CLEANUP_INTERVAL};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::SecurityError;

/// A revocation record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlacklistEntry {
    /// Why the token was revoked, when recorded.
    pub reason: Option<String>,
    /// Absolute time after which the entry no longer applies.
    pub expires_at: DateTime<Utc>,
}

impl BlacklistEntry {
    /// True once the entry no longer applies.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Minimal revocation contract.
#[async_trait]
pub trait Blacklist: Send + Sync {
    /// True when the token is currently revoked.
    async fn is_blacklisted(&self, token: &str) -> Result<bool, SecurityError>;

    /// Revoke the token until the given absolute time.
    async fn add(&self, token: &str, expires_at: DateTime<Utc>) -> Result<(), SecurityError>;
}

/// Revocation contract carrying a reason and supporting explicit removal.
#[async_trait]
pub trait ReasonedBlacklist: Send + Sync {
    /// Revoke the token for `ttl`, recording why.
    async fn add_with_reason(
        &self,
        token_id: &str,
        reason: &str,
        ttl: Duration,
    ) -> Result<(), SecurityError>;

    /// Fetch the revocation record, if one currently applies.
    async fn get(&self, token_id: &str) -> Result<Option<BlacklistEntry>, SecurityError>;

    /// Remove the revocation record. Removing an absent record is not an
    /// error.
    async fn remove(&self, token_id: &str) -> Result<(), SecurityError>;
}
