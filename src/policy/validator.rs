//! Structural and policy validation of decoded claims.

use chrono::Utc;
use std::net::IpAddr;
use std::sync::Arc;

use crate::claims::Claims;
use crate::error::SecurityError;
use crate::policy::SecurityPolicy;

/// Validates a decoded token's structural correctness against the current
/// policy snapshot.
///
/// Checks run in a fixed order and short-circuit on the first failure:
/// expiry, token type, subject, IP binding input, device binding input.
/// No I/O and no side effects; replay and binding consistency checks live
/// on [`SecurityPolicy`] and the binding validators.
pub struct TokenValidator {
    policy: Arc<SecurityPolicy>,
}

impl TokenValidator {
    /// Create a validator over the given policy.
    #[must_use]
    pub fn new(policy: Arc<SecurityPolicy>) -> Self {
        Self { policy }
    }

    /// Validate the claims.
    ///
    /// # Errors
    ///
    /// The first violated invariant, in check order:
    /// [`SecurityError::TokenExpired`],
    /// [`SecurityError::TokenTypeMismatch`],
    /// [`SecurityError::ClaimsMissing`], or
    /// [`SecurityError::BindingInvalid`].
    pub fn validate(&self, claims: &Claims) -> Result<(), SecurityError> {
        let cfg = self.policy.config();

        if Utc::now() > claims.expires_at {
            return Err(SecurityError::TokenExpired);
        }

        claims.token_type()?;

        if claims.user_id.is_empty() {
            return Err(SecurityError::ClaimsMissing("user_id".to_string()));
        }

        if cfg.enable_ip_binding {
            if claims.ip_address.is_empty() {
                return Err(SecurityError::binding_invalid("ip address missing"));
            }
            if claims.ip_address.parse::<IpAddr>().is_err() {
                return Err(SecurityError::binding_invalid(format!(
                    "not a valid IP literal: {}",
                    claims.ip_address
                )));
            }
        }

        if cfg.enable_device_binding && claims.device_id.is_empty() {
            return Err(SecurityError::binding_invalid("device id missing"));
        }

        Ok(())
    }
}
