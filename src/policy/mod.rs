//! Enforcement policy: reuse throttling, token-age checks, and atomic
//! policy updates.
//!
//! The policy object itself holds no check state; reuse and age markers
//! live in the distributed cache so every instance sees the same history.

mod validator;

pub use validator::TokenValidator;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::cache::Cache;
use crate::config::PolicyConfig;
use crate::error::SecurityError;
use crate::metrics::{outcome, SecurityMetrics};

const POLICY_CONFIG_KEY: &str = "policy:config";
const POLICY_CONFIG_TTL: Duration = Duration::from_secs(24 * 3600);

fn reuse_key(token_id: &str) -> String {
    format!("token:reuse:{token_id}")
}

fn age_key(token_id: &str) -> String {
    format!("token:age:{token_id}")
}

/// Replay/age policy over a distributed cache.
///
/// Configuration is read through an atomic snapshot, so concurrent
/// [`SecurityPolicy::update_policy`] calls never expose a half-updated
/// policy; the last writer wins.
pub struct SecurityPolicy {
    config: ArcSwap<PolicyConfig>,
    cache: Arc<dyn Cache>,
    metrics: Arc<SecurityMetrics>,
}

impl SecurityPolicy {
    /// Create a policy with the given configuration and backing cache.
    #[must_use]
    pub fn new(
        config: PolicyConfig,
        cache: Arc<dyn Cache>,
        metrics: Arc<SecurityMetrics>,
    ) -> Self {
        Self {
            config: ArcSwap::from_pointee(config),
            cache,
            metrics,
        }
    }

    /// Current configuration snapshot.
    #[must_use]
    pub fn config(&self) -> Arc<PolicyConfig> {
        self.config.load_full()
    }

    /// Reject tokens older than the configured maximum age.
    ///
    /// The boundary is exclusive: `age > max_token_age` fails,
    /// `age == max_token_age` succeeds. On success a "last validated"
    /// marker is written to the cache best-effort; a marker-write failure
    /// is logged and never fails the check.
    ///
    /// # Errors
    ///
    /// Returns [`SecurityError::TokenExpired`] when the age exceeds the
    /// maximum.
    pub async fn validate_token_age(
        &self,
        token_id: &str,
        issued_at: DateTime<Utc>,
    ) -> Result<(), SecurityError> {
        let cfg = self.config();
        let max_age = chrono::Duration::from_std(cfg.max_token_age)
            .unwrap_or_else(|_| chrono::Duration::MAX);

        if Utc::now() - issued_at > max_age {
            self.metrics.record_outcome("age_check", outcome::ERROR);
            return Err(SecurityError::TokenExpired);
        }

        let marker = Utc::now().timestamp().to_string();
        if let Err(e) = self
            .cache
            .set(&age_key(token_id), marker.as_bytes(), cfg.max_token_age)
            .await
        {
            warn!(token_id = %token_id, error = %e, "Failed to record age marker");
        }

        self.metrics.record_outcome("age_check", outcome::SUCCESS);
        Ok(())
    }

    /// Enforce the minimum interval between uses of one token identity.
    ///
    /// This is a throttle, not a single-use guarantee: once the interval
    /// has elapsed the same token validates again. The marker is
    /// written/refreshed with TTL equal to the interval and is never
    /// explicitly deleted.
    ///
    /// # Errors
    ///
    /// Returns [`SecurityError::PolicyViolation`] when the token was used
    /// within the interval; store failures propagate as `Store*` errors.
    pub async fn validate_token_reuse(&self, token_id: &str) -> Result<(), SecurityError> {
        let cfg = self.config();
        let interval = cfg.token_reuse_interval;
        let key = reuse_key(token_id);
        let now = Utc::now().timestamp();

        if let Some(raw) = self.cache.get(&key).await? {
            match std::str::from_utf8(&raw).ok().and_then(|s| s.parse::<i64>().ok()) {
                Some(last_used) if now - last_used < interval.as_secs() as i64 => {
                    self.metrics.record_outcome("reuse_check", outcome::ERROR);
                    return Err(SecurityError::policy_violation(format!(
                        "token {token_id} reused within {}s",
                        interval.as_secs()
                    )));
                }
                Some(_) => {}
                None => {
                    warn!(token_id = %token_id, "Unreadable reuse marker, overwriting");
                }
            }
        }

        self.cache
            .set(&key, now.to_string().as_bytes(), interval)
            .await?;

        self.metrics.record_outcome("reuse_check", outcome::SUCCESS);
        Ok(())
    }

    /// Replace the age and reuse limits atomically.
    ///
    /// Concurrent updates race last-write-wins; there is no
    /// compare-and-swap. The new configuration is persisted to the cache
    /// best-effort for observability.
    pub async fn update_policy(&self, max_token_age: Duration, token_reuse_interval: Duration) {
        let next = PolicyConfig {
            max_token_age,
            token_reuse_interval,
            ..(*self.config.load_full()).clone()
        };
        self.config.store(Arc::new(next.clone()));

        match serde_json::to_vec(&next) {
            Ok(doc) => {
                if let Err(e) = self
                    .cache
                    .set(POLICY_CONFIG_KEY, &doc, POLICY_CONFIG_TTL)
                    .await
                {
                    warn!(error = %e, "Failed to persist policy configuration");
                }
            }
            Err(e) => warn!(error = %e, "Failed to serialize policy configuration"),
        }
    }
}
