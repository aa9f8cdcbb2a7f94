//! IP binding consistency validation.

use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::binding::store::{BindingStore, IpBinding};
use crate::claims::Claims;
use crate::error::SecurityError;
use crate::metrics::{outcome, SecurityMetrics};

/// Enforces that a device identity keeps presenting the same IP address
/// across uses.
pub struct IpBindingValidator {
    store: Arc<BindingStore>,
    metrics: Arc<SecurityMetrics>,
}

impl IpBindingValidator {
    /// Create a validator over the given store.
    #[must_use]
    pub fn new(store: Arc<BindingStore>, metrics: Arc<SecurityMetrics>) -> Self {
        Self { store, metrics }
    }

    /// Validate the presented IP against the stored binding for the
    /// claims' device identity.
    ///
    /// The presented value must parse as an IPv4/IPv6 literal before any
    /// store access occurs. First use persists the presented address;
    /// later uses must match the stored string exactly.
    ///
    /// # Errors
    ///
    /// [`SecurityError::BindingInvalid`] for unparseable input,
    /// [`SecurityError::BindingMismatch`] on disagreement, `Store*`
    /// errors from the backing store.
    pub async fn validate(&self, claims: &Claims, presented: &str) -> Result<(), SecurityError> {
        if presented.parse::<IpAddr>().is_err() {
            self.metrics.record_outcome("ip_binding", outcome::ERROR);
            return Err(SecurityError::binding_invalid(format!(
                "not a valid IP literal: {presented}"
            )));
        }
        if claims.device_id.is_empty() {
            self.metrics.record_outcome("ip_binding", outcome::ERROR);
            return Err(SecurityError::binding_invalid("device id missing from claims"));
        }

        match self.store.ip_binding(&claims.device_id).await? {
            None => {
                let binding = IpBinding {
                    ip: presented.to_string(),
                };
                self.store
                    .store_ip_binding(&claims.device_id, &binding)
                    .await?;
                self.metrics.record_outcome("ip_binding", outcome::FIRST_USE);
                debug!(
                    token_id = %claims.token_id,
                    device_id = %claims.device_id,
                    "IP binding created"
                );
                Ok(())
            }
            Some(bound) => {
                if bound.ip == presented {
                    self.metrics.record_outcome("ip_binding", outcome::SUCCESS);
                    Ok(())
                } else {
                    warn!(
                        token_id = %claims.token_id,
                        device_id = %claims.device_id,
                        bound_ip = %bound.ip,
                        presented_ip = %presented,
                        "IP binding mismatch"
                    );
                    self.metrics.record_outcome("ip_binding", outcome::MISMATCH);
                    Err(SecurityError::BindingMismatch {
                        kind: "ip",
                        bound: bound.ip,
                        presented: presented.to_string(),
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

    fn fixture() -> IpBindingValidator {
        IpBindingValidator::new(
            Arc::new(BindingStore::with_default_ttl(Arc::new(MemoryCache::new()))),
            Arc::new(SecurityMetrics::unregistered()),
        )
    }

    fn claims() -> Claims {
        Claims::new("user-1", TokenType::Access, chrono::Duration::minutes(15))
            .with_device_id("dev-1")
    }

    #[tokio::test]
    async fn test_first_use_then_match() {
        let validator = fixture();

        validator.validate(&claims(), "192.168.1.10").await.unwrap();
        validator.validate(&claims(), "192.168.1.10").await.unwrap();
    }

    #[tokio::test]
    async fn test_changed_ip_rejected() {
        let validator = fixture();

        validator.validate(&claims(), "192.168.1.10").await.unwrap();

        let result = validator.validate(&claims(), "192.168.1.11").await;
        match result {
            Err(SecurityError::BindingMismatch {
                kind,
                bound,
                presented,
            }) => {
                assert_eq!(kind, "ip");
                assert_eq!(bound, "192.168.1.10");
                assert_eq!(presented, "192.168.1.11");
            }
            other => panic!("expected BindingMismatch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_ipv6_accepted() {
        let validator = fixture();
        validator.validate(&claims(), "2001:db8::1").await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_ip_rejected() {
        let validator = fixture();
        assert!(matches!(
            validator.validate(&claims(), "not-an-ip").await,
            Err(SecurityError::BindingInvalid(_))
        ));
    }
}
