//! Device binding consistency validation.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::binding::store::BindingStore;
use crate::claims::{Claims, DeviceInfo};
use crate::error::SecurityError;
use crate::metrics::{outcome, SecurityMetrics};

/// Enforces that a device identity keeps presenting the same id and
/// fingerprint across uses.
pub struct DeviceBindingValidator {
    store: Arc<BindingStore>,
    metrics: Arc<SecurityMetrics>,
}

impl DeviceBindingValidator {
    /// Create a validator over the given store.
    #[must_use]
    pub fn new(store: Arc<BindingStore>, metrics: Arc<SecurityMetrics>) -> Self {
        Self { store, metrics }
    }

    /// Validate the presented device info against the stored binding for
    /// the claims' device identity.
    ///
    /// A previously-unseen identity is a first use: the presented info is
    /// persisted and validation succeeds. A known identity succeeds only
    /// when the stored `id` and `fingerprint` both equal the presented
    /// values.
    ///
    /// # Errors
    ///
    /// [`SecurityError::BindingInvalid`] for missing id/fingerprint,
    /// [`SecurityError::BindingMismatch`] on disagreement, `Store*`
    /// errors from the backing store.
    pub async fn validate(
        &self,
        claims: &Claims,
        presented: &DeviceInfo,
    ) -> Result<(), SecurityError> {
        if presented.id.is_empty() || presented.fingerprint.is_empty() {
            self.metrics.record_outcome("device_binding", outcome::ERROR);
            return Err(SecurityError::binding_invalid(
                "device id and fingerprint are required",
            ));
        }
        if claims.device_id.is_empty() {
            self.metrics.record_outcome("device_binding", outcome::ERROR);
            return Err(SecurityError::binding_invalid("device id missing from claims"));
        }

        match self.store.device_binding(&claims.device_id).await? {
            None => {
                self.store
                    .store_device_binding(&claims.device_id, presented)
                    .await?;
                self.metrics
                    .record_outcome("device_binding", outcome::FIRST_USE);
                debug!(
                    token_id = %claims.token_id,
                    device_id = %claims.device_id,
                    "Device binding created"
                );
                Ok(())
            }
            Some(bound) => {
                if bound.id == presented.id && bound.fingerprint == presented.fingerprint {
                    self.metrics
                        .record_outcome("device_binding", outcome::SUCCESS);
                    Ok(())
                } else {
                    warn!(
                        token_id = %claims.token_id,
                        device_id = %claims.device_id,
                        bound_fingerprint = %bound.fingerprint,
                        presented_fingerprint = %presented.fingerprint,
                        "Device binding mismatch"
                    );
                    self.metrics
                        .record_outcome("device_binding", outcome::MISMATCH);
                    Err(SecurityError::BindingMismatch {
                        kind: "device",
                        bound: bound.fingerprint,
                        presented: presented.fingerprint.clone(),
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::claims::TokenType;

    fn fixture() -> DeviceBindingValidator {
        DeviceBindingValidator::new(
            Arc::new(BindingStore::with_default_ttl(Arc::new(MemoryCache::new()))),
            Arc::new(SecurityMetrics::unregistered()),
        )
    }

    fn claims() -> Claims {
        Claims::new("user-1", TokenType::Access, chrono::Duration::minutes(15))
            .with_device_id("dev-1")
    }

    #[tokio::test]
    async fn test_first_use_persists_and_succeeds() {
        let validator = fixture();
        let info = DeviceInfo::new("dev-1", "fp-abc");

        validator.validate(&claims(), &info).await.unwrap();
        // Identical second presentation matches the persisted binding.
        validator.validate(&claims(), &info).await.unwrap();
    }

    #[tokio::test]
    async fn test_changed_fingerprint_rejected() {
        let validator = fixture();

        validator
            .validate(&claims(), &DeviceInfo::new("dev-1", "fp-abc"))
            .await
            .unwrap();

        let result = validator
            .validate(&claims(), &DeviceInfo::new("dev-1", "fp-zzz"))
            .await;

        match result {
            Err(SecurityError::BindingMismatch {
                kind,
                bound,
                presented,
            }) => {
                assert_eq!(kind, "device");
                assert_eq!(bound, "fp-abc");
                assert_eq!(presented, "fp-zzz");
            }
            other => panic!("expected BindingMismatch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_changed_device_id_rejected() {
        let validator = fixture();

        validator
            .validate(&claims(), &DeviceInfo::new("dev-1", "fp-abc"))
            .await
            .unwrap();

        let result = validator
            .validate(&claims(), &DeviceInfo::new("dev-2", "fp-abc"))
            .await;
        assert!(matches!(
            result,
            Err(SecurityError::BindingMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_inputs_rejected() {
        let validator = fixture();

        assert!(matches!(
            validator
                .validate(&claims(), &DeviceInfo::new("", "fp-abc"))
                .await,
            Err(SecurityError::BindingInvalid(_))
        ));
        assert!(matches!(
            validator
                .validate(&claims(), &DeviceInfo::new("dev-1", ""))
                .await,
            Err(SecurityError::BindingInvalid(_))
        ));
    }

    #[tokio::test]
    async fn test_metadata_changes_do_not_mismatch() {
        let validator = fixture();

        validator
            .validate(
                &claims(),
                &DeviceInfo::new("dev-1", "fp-abc").with_os("linux"),
            )
            .await
            .unwrap();

        // Only id and fingerprint take part in the comparison.
        validator
            .validate(
                &claims(),
                &DeviceInfo::new("dev-1", "fp-abc").with_os("macos"),
            )
            .await
            .unwrap();
    }
}
