//! Error types for the token trust engine.
//!
//! Every fallible operation in this crate returns [`SecurityError`].
//! Callers pattern-match on the variant to choose a response; the
//! HTTP-status mapping itself lives in the consuming middleware.

use thiserror::Error;

/// Unified error type for key custody, policy, binding, and revocation
/// operations.
#[derive(Error, Debug)]
pub enum SecurityError {
    /// Key material is missing, malformed, or the manager is uninitialized.
    #[error("Invalid key: {0}")]
    KeyInvalid(String),

    /// The requested signing method is not supported.
    #[error("Unsupported signing method: {0}")]
    AlgorithmMismatch(String),

    /// Signing or verification failed.
    #[error("Signature invalid")]
    SignatureInvalid,

    /// A key rotation attempt failed. Non-fatal; the next tick retries.
    #[error("Key rotation failed: {0}")]
    RotationFailed(String),

    /// A required claim is absent or empty.
    #[error("Missing claim: {0}")]
    ClaimsMissing(String),

    /// A claim is present but structurally invalid.
    #[error("Invalid claim: {0}")]
    ClaimsInvalid(String),

    /// The claims carry an expiry that has already passed.
    #[error("Claims expired")]
    ClaimsExpired,

    /// The token is past its expiry or exceeds the maximum age.
    #[error("Token expired")]
    TokenExpired,

    /// The token type is outside the accepted set.
    #[error("Unexpected token type: {0}")]
    TokenTypeMismatch(String),

    /// Binding input is missing or malformed.
    #[error("Invalid binding: {0}")]
    BindingInvalid(String),

    /// A binding exists but disagrees with the presented value.
    #[error("Binding mismatch for {kind}: bound {bound}, presented {presented}")]
    BindingMismatch {
        /// Binding kind (`device` or `ip`).
        kind: &'static str,
        /// Previously persisted value.
        bound: String,
        /// Value presented on this use.
        presented: String,
    },

    /// A policy check failed (e.g. reuse within the throttle window).
    #[error("Policy violation: {0}")]
    PolicyViolation(String),

    /// Backing-store key was not found where one was required.
    #[error("Store entry not found: {0}")]
    StoreNotFound(String),

    /// Backing-store read failed.
    #[error("Store get failed: {0}")]
    StoreGet(String),

    /// Backing-store write failed.
    #[error("Store set failed: {0}")]
    StoreSet(String),

    /// Backing-store delete failed.
    #[error("Store delete failed: {0}")]
    StoreDelete(String),

    /// Configuration is missing or malformed.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SecurityError {
    /// Create a [`SecurityError::KeyInvalid`] with the given message.
    #[must_use]
    pub fn key_invalid(msg: impl Into<String>) -> Self {
        Self::KeyInvalid(msg.into())
    }

    /// Create a [`SecurityError::BindingInvalid`] with the given message.
    #[must_use]
    pub fn binding_invalid(msg: impl Into<String>) -> Self {
        Self::BindingInvalid(msg.into())
    }

    /// Create a [`SecurityError::PolicyViolation`] with the given message.
    #[must_use]
    pub fn policy_violation(msg: impl Into<String>) -> Self {
        Self::PolicyViolation(msg.into())
    }

    /// Create a [`SecurityError::Config`] with the given message.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// True when the error stems from the backing store rather than the
    /// token itself. Store failures may succeed on retry; validation
    /// failures will not.
    #[must_use]
    pub const fn is_store_error(&self) -> bool {
        matches!(
            self,
            Self::StoreNotFound(_) | Self::StoreGet(_) | Self::StoreSet(_) | Self::StoreDelete(_)
        )
    }
}

impl From<redis::RedisError> for SecurityError {
    fn from(err: redis::RedisError) -> Self {
        SecurityError::StoreGet(err.to_string())
    }
}
