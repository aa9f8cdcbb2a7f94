//! Background key rotation.

use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::SecurityError;
use crate::keys::manager::KeyManager;
use crate::metrics::SecurityMetrics;
use crate::policy::SecurityPolicy;

struct RotatorState {
    running: bool,
    stop_tx: Option<watch::Sender<bool>>,
    handle: Option<JoinHandle<()>>,
}

/// Periodically rotates a [`KeyManager`]'s key material.
///
/// A tick failure is logged and counted but never stops the loop or
/// reaches a caller; the next tick retries unconditionally. The rotator
/// does not guard against concurrent manual [`KeyManager::rotate`] calls
/// — the manager's lock is the sole synchronization preventing
/// overlapping rotations.
pub struct KeyRotator {
    manager: Arc<KeyManager>,
    policy: Arc<SecurityPolicy>,
    metrics: Arc<SecurityMetrics>,
    state: Mutex<RotatorState>,
}

impl KeyRotator {
    /// Create a stopped rotator.
    #[must_use]
    pub fn new(
        manager: Arc<KeyManager>,
        policy: Arc<SecurityPolicy>,
        metrics: Arc<SecurityMetrics>,
    ) -> Self {
        Self {
            manager,
            policy,
            metrics,
            state: Mutex::new(RotatorState {
                running: false,
                stop_tx: None,
                handle: None,
            }),
        }
    }

    /// Start the rotation loop.
    ///
    /// A no-op returning `Ok` when rotation is disabled by policy or the
    /// rotator is already running. The interval is read from the policy
    /// snapshot at start time.
    ///
    /// # Errors
    ///
    /// Currently infallible; the `Result` keeps the lifecycle contract
    /// uniform with `stop`.
    pub async fn start(&self) -> Result<(), SecurityError> {
        let mut state = self.state.lock().await;
        if state.running {
            debug!("Key rotator already running");
            return Ok(());
        }

        let cfg = self.policy.config();
        if !cfg.enable_rotation {
            debug!("Key rotation disabled by policy");
            return Ok(());
        }

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let manager = Arc::clone(&self.manager);
        let metrics = Arc::clone(&self.metrics);
        let interval = cfg.rotation_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately; the first rotation
            // happens one full interval after start.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match manager.rotate().await {
                            Ok(()) => {
                                metrics.record_rotation();
                                info!(method = %manager.method(), "Scheduled key rotation completed");
                            }
                            Err(e) => {
                                metrics.record_rotation_failure();
                                warn!(method = %manager.method(), error = %e, "Scheduled key rotation failed");
                            }
                        }
                    }
                    _ = stop_rx.changed() => {
                        debug!("Key rotator stopping");
                        break;
                    }
                }
            }
        });

        state.running = true;
        state.stop_tx = Some(stop_tx);
        state.handle = Some(handle);

        info!(interval_secs = interval.as_secs(), "Key rotator started");
        Ok(())
    }

    /// Signal the rotation loop to exit.
    ///
    /// Returns immediately without waiting for an in-flight rotation to
    /// finish. Idempotent: stopping a stopped rotator is a no-op.
    ///
    /// # Errors
    ///
    /// Currently infallible; see [`KeyRotator::start`].
    pub async fn stop(&self) -> Result<(), SecurityError> {
        let mut state = self.state.lock().await;
        if !state.running {
            return Ok(());
        }

        if let Some(stop_tx) = state.stop_tx.take() {
            let _ = stop_tx.send(true);
        }
        state.handle.take();
        state.running = false;

        info!("Key rotator stopped");
        Ok(())
    }

    /// True while the rotation loop is running.
    pub async fn is_running(&self) -> bool {
        self.state.lock().await.running
    }
}
