//! In-process revocation registry.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::blacklist::{Blacklist, BlacklistEntry, ReasonedBlacklist};
use crate::error::SecurityError;
use crate::metrics::{outcome, SecurityMetrics};

/// Default sweep interval for proactive eviction.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

struct SweeperState {
    running: bool,
    stop_tx: Option<watch::Sender<bool>>,
    handle: Option<JoinHandle<()>>,
}

/// Concurrent-map revocation registry.
///
/// Reads are lock-free. Expired entries are evicted lazily on read and
/// proactively by a periodic sweep, so long-idle keys do not linger
/// solely for lack of reads. Eviction under read and under the sweep may
/// race benignly — both paths only ever delete, never resurrect, an
/// entry.
pub struct MemoryBlacklist {
    entries: Arc<DashMap<String, BlacklistEntry>>,
    metrics: Arc<SecurityMetrics>,
    sweeper: Mutex<SweeperState>,
}

impl MemoryBlacklist {
    /// Create an empty registry. The sweep task is not started; call
    /// [`MemoryBlacklist::start_sweeper`] for proactive eviction.
    #[must_use]
    pub fn new(metrics: Arc<SecurityMetrics>) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            metrics,
            sweeper: Mutex::new(SweeperState {
                running: false,
                stop_tx: None,
                handle: None,
            }),
        }
    }

    /// Number of entries currently held, including not-yet-swept expired
    /// ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no entries are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Start the periodic sweep. Idempotent while running.
    pub async fn start_sweeper(&self, interval: Duration) {
        let mut state = self.sweeper.lock().await;
        if state.running {
            debug!("Blacklist sweeper already running");
            return;
        }

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let entries = Arc::clone(&self.entries);
        let metrics = Arc::clone(&self.metrics);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let before = entries.len();
                        let now = Utc::now();
                        entries.retain(|_, entry| entry.expires_at > now);
                        let swept = before.saturating_sub(entries.len());
                        metrics.blacklist_size.set(entries.len() as i64);
                        if swept > 0 {
                            debug!(swept, "Swept expired blacklist entries");
                        }
                    }
                    _ = stop_rx.changed() => break,
                }
            }
        });

        state.running = true;
        state.stop_tx = Some(stop_tx);
        state.handle = Some(handle);

        info!(interval_secs = interval.as_secs(), "Blacklist sweeper started");
    }

    /// Stop the periodic sweep. Idempotent.
    pub async fn stop_sweeper(&self) {
        let mut state = self.sweeper.lock().await;
        if !state.running {
            return;
        }

        if let Some(stop_tx) = state.stop_tx.take() {
            let _ = stop_tx.send(true);
        }
        state.handle.take();
        state.running = false;

        info!("Blacklist sweeper stopped");
    }

    /// Lazily evict `token` if its entry expired; returns whether a live
    /// entry remains.
    fn check_live(&self, token: &str) -> Option<BlacklistEntry> {
        let now = Utc::now();
        let live = self
            .entries
            .get(token)
            .map(|entry| (entry.expires_at > now, entry.value().clone()));

        match live {
            Some((true, entry)) => Some(entry),
            Some((false, _)) => {
                // Guarded removal: a concurrent re-add with a later expiry
                // must survive.
                self.entries
                    .remove_if(token, |_, entry| entry.expires_at <= Utc::now());
                self.metrics.blacklist_size.set(self.entries.len() as i64);
                None
            }
            None => None,
        }
    }
}

#[async_trait]
impl Blacklist for MemoryBlacklist {
    async fn is_blacklisted(&self, token: &str) -> Result<bool, SecurityError> {
        let hit = self.check_live(token).is_some();
        self.metrics.record_blacklist_lookup(hit);
        Ok(hit)
    }

    async fn add(&self, token: &str, expires_at: DateTime<Utc>) -> Result<(), SecurityError> {
        self.entries.insert(
            token.to_string(),
            BlacklistEntry {
                reason: None,
                expires_at,
            },
        );
        self.metrics.record_outcome("blacklist_add", outcome::SUCCESS);
        self.metrics.blacklist_size.set(self.entries.len() as i64);
        Ok(())
    }
}

#[async_trait]
impl ReasonedBlacklist for MemoryBlacklist {
    async fn add_with_reason(
        &self,
        token_id: &str,
        reason: &str,
        ttl: Duration,
    ) -> Result<(), SecurityError> {
        let expires_at = Utc::now()
            + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::MAX);
        self.entries.insert(
            token_id.to_string(),
            BlacklistEntry {
                reason: Some(reason.to_string()),
                expires_at,
            },
        );
        self.metrics.record_outcome("blacklist_add", outcome::SUCCESS);
        self.metrics.blacklist_size.set(self.entries.len() as i64);
        Ok(())
    }

    async fn get(&self, token_id: &str) -> Result<Option<BlacklistEntry>, SecurityError> {
        let entry = self.check_live(token_id);
        self.metrics.record_blacklist_lookup(entry.is_some());
        Ok(entry)
    }

    async fn remove(&self, token_id: &str) -> Result<(), SecurityError> {
        self.entries.remove(token_id);
        self.metrics.blacklist_size.set(self.entries.len() as i64);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> MemoryBlacklist {
        MemoryBlacklist::new(Arc::new(SecurityMetrics::unregistered()))
    }

    #[tokio::test]
    async fn test_add_and_lookup() {
        let blacklist = fixture();

        assert!(!blacklist.is_blacklisted("tok-1").await.unwrap());

        blacklist
            .add("tok-1", Utc::now() + chrono::Duration::hours(1))
            .await
            .unwrap();
        assert!(blacklist.is_blacklisted("tok-1").await.unwrap());
        assert_eq!(blacklist.len(), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_not_blacklisted() {
        let blacklist = fixture();

        blacklist
            .add("tok-1", Utc::now() - chrono::Duration::seconds(1))
            .await
            .unwrap();

        // No removal call, no sweep: the expired entry still reads as
        // not blacklisted and is lazily evicted.
        assert!(!blacklist.is_blacklisted("tok-1").await.unwrap());
        assert!(blacklist.is_empty());
    }

    #[tokio::test]
    async fn test_reasoned_roundtrip() {
        let blacklist = fixture();

        blacklist
            .add_with_reason("tok-1", "credential leak", Duration::from_secs(3600))
            .await
            .unwrap();

        let entry = blacklist.get("tok-1").await.unwrap().unwrap();
        assert_eq!(entry.reason.as_deref(), Some("credential leak"));

        blacklist.remove("tok-1").await.unwrap();
        assert!(blacklist.get("tok-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_expired_is_none() {
        let blacklist = fixture();

        blacklist
            .add_with_reason("tok-1", "test", Duration::from_millis(10))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(blacklist.get("tok-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sweeper_removes_idle_expired_entries() {
        let blacklist = fixture();

        blacklist
            .add("tok-1", Utc::now() + chrono::Duration::milliseconds(10))
            .await
            .unwrap();
        blacklist
            .add("tok-2", Utc::now() + chrono::Duration::hours(1))
            .await
            .unwrap();

        blacklist.start_sweeper(Duration::from_millis(50)).await;
        tokio::time::sleep(Duration::from_millis(200)).await;

        // tok-1 was removed without ever being read.
        assert_eq!(blacklist.len(), 1);
        blacklist.stop_sweeper().await;
    }

    #[tokio::test]
    async fn test_sweeper_stop_is_idempotent() {
        let blacklist = fixture();

        blacklist.stop_sweeper().await;
        blacklist.start_sweeper(Duration::from_secs(60)).await;
        blacklist.stop_sweeper().await;
        blacklist.stop_sweeper().await;
    }

    #[tokio::test]
    async fn test_readd_extends_expiry() {
        let blacklist = fixture();

        blacklist
            .add("tok-1", Utc::now() + chrono::Duration::milliseconds(10))
            .await
            .unwrap();
        blacklist
            .add("tok-1", Utc::now() + chrono::Duration::hours(1))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(blacklist.is_blacklisted("tok-1").await.unwrap());
    }
}
