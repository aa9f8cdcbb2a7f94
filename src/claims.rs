//! Token claims and device metadata.
//!
//! Claims are produced by the token-decoding middleware and carried by
//! value through validation; nothing in this crate mutates them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::error::SecurityError;

/// Accepted token types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    /// Short-lived access token.
    Access,
    /// Long-lived refresh token.
    Refresh,
}

impl TokenType {
    /// Parse a token type from its wire representation.
    ///
    /// # Errors
    ///
    /// Returns [`SecurityError::TokenTypeMismatch`] for anything outside
    /// the accepted set.
    pub fn parse(s: &str) -> Result<Self, SecurityError> {
        match s {
            "access" => Ok(Self::Access),
            "refresh" => Ok(Self::Refresh),
            other => Err(SecurityError::TokenTypeMismatch(other.to_string())),
        }
    }

    /// Wire representation of the token type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

/// Token payload as decoded by the middleware.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// Subject the token was issued to. Required, non-empty.
    pub user_id: String,
    /// Display name of the subject.
    #[serde(default)]
    pub user_name: String,
    /// Role names granted to the subject.
    #[serde(default)]
    pub roles: HashSet<String>,
    /// Fine-grained permissions granted to the subject.
    #[serde(default)]
    pub permissions: HashSet<String>,
    /// Device the token is bound to, if device binding is in use.
    #[serde(default)]
    pub device_id: String,
    /// IP address the token was issued against.
    #[serde(default)]
    pub ip_address: String,
    /// Token type as carried on the wire (`access` or `refresh`).
    pub token_type: String,
    /// Unique token identifier.
    pub token_id: String,
    /// Issuance time.
    pub issued_at: DateTime<Utc>,
    /// Expiry time.
    pub expires_at: DateTime<Utc>,

    /// Extension claims not modeled above.
    #[serde(flatten)]
    pub custom: HashMap<String, serde_json::Value>,
}

impl Claims {
    /// Create claims for a subject with the given type and lifetime.
    #[must_use]
    pub fn new(user_id: impl Into<String>, token_type: TokenType, ttl: chrono::Duration) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            user_name: String::new(),
            roles: HashSet::new(),
            permissions: HashSet::new(),
            device_id: String::new(),
            ip_address: String::new(),
            token_type: token_type.as_str().to_string(),
            token_id: uuid::Uuid::new_v4().to_string(),
            issued_at: now,
            expires_at: now + ttl,
            custom: HashMap::new(),
        }
    }

    /// Set the display name.
    #[must_use]
    pub fn with_user_name(mut self, name: impl Into<String>) -> Self {
        self.user_name = name.into();
        self
    }

    /// Set the granted roles.
    #[must_use]
    pub fn with_roles(mut self, roles: impl IntoIterator<Item = String>) -> Self {
        self.roles = roles.into_iter().collect();
        self
    }

    /// Set the granted permissions.
    #[must_use]
    pub fn with_permissions(mut self, permissions: impl IntoIterator<Item = String>) -> Self {
        self.permissions = permissions.into_iter().collect();
        self
    }

    /// Bind the claims to a device identifier.
    #[must_use]
    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = device_id.into();
        self
    }

    /// Bind the claims to an IP address.
    #[must_use]
    pub fn with_ip_address(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = ip.into();
        self
    }

    /// Attach an extension claim.
    #[must_use]
    pub fn with_custom_claim(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.custom.insert(key.into(), value);
        self
    }

    /// True once the expiry time has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Parsed token type.
    ///
    /// # Errors
    ///
    /// Returns [`SecurityError::TokenTypeMismatch`] when the wire value is
    /// outside the accepted set.
    pub fn token_type(&self) -> Result<TokenType, SecurityError> {
        TokenType::parse(&self.token_type)
    }
}

/// Device metadata presented alongside a token during binding validation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Stable device identifier.
    pub id: String,
    /// Device category (e.g. `mobile`, `desktop`).
    #[serde(default)]
    pub device_type: String,
    /// Human-readable device name.
    #[serde(default)]
    pub name: String,
    /// Operating system reported by the device.
    #[serde(default)]
    pub os: String,
    /// Browser or client reported by the device.
    #[serde(default)]
    pub browser: String,
    /// Device fingerprint; compared exactly on every use.
    pub fingerprint: String,
}

impl DeviceInfo {
    /// Create device info from the two fields binding validation requires.
    #[must_use]
    pub fn new(id: impl Into<String>, fingerprint: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            device_type: String::new(),
            name: String::new(),
            os: String::new(),
            browser: String::new(),
            fingerprint: fingerprint.into(),
        }
    }

    /// Set the device category.
    #[must_use]
    pub fn with_device_type(mut self, device_type: impl Into<String>) -> Self {
        self.device_type = device_type.into();
        self
    }

    /// Set the device name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the operating system.
    #[must_use]
    pub fn with_os(mut self, os: impl Into<String>) -> Self {
        self.os = os.into();
        self
    }

    /// Set the browser or client.
    #[must_use]
    pub fn with_browser(mut self, browser: impl Into<String>) -> Self {
        self.browser = browser.into();
        self
    }
}
