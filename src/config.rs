//! Centralized configuration for the token trust engine.
//!
//! All configuration is loaded from environment variables and validated
//! at startup. Durations are expressed in seconds in the environment.

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::error::SecurityError;

/// Supported signing methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SigningMethod {
    /// HMAC with SHA-256.
    HS256,
    /// HMAC with SHA-384.
    HS384,
    /// HMAC with SHA-512.
    HS512,
    /// RSA PKCS1v15 with SHA-256.
    RS256,
    /// RSA PKCS1v15 with SHA-384.
    RS384,
    /// RSA PKCS1v15 with SHA-512.
    RS512,
}

impl SigningMethod {
    /// Parse a signing method from its canonical name.
    ///
    /// # Errors
    ///
    /// Returns [`SecurityError::AlgorithmMismatch`] for unknown names.
    pub fn parse(s: &str) -> Result<Self, SecurityError> {
        match s.to_uppercase().as_str() {
            "HS256" => Ok(Self::HS256),
            "HS384" => Ok(Self::HS384),
            "HS512" => Ok(Self::HS512),
            "RS256" => Ok(Self::RS256),
            "RS384" => Ok(Self::RS384),
            "RS512" => Ok(Self::RS512),
            other => Err(SecurityError::AlgorithmMismatch(other.to_string())),
        }
    }

    /// Canonical name of the method.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::HS256 => "HS256",
            Self::HS384 => "HS384",
            Self::HS512 => "HS512",
            Self::RS256 => "RS256",
            Self::RS384 => "RS384",
            Self::RS512 => "RS512",
        }
    }

    /// True for the HMAC family, false for RSA.
    #[must_use]
    pub const fn is_symmetric(&self) -> bool {
        matches!(self, Self::HS256 | Self::HS384 | Self::HS512)
    }
}

impl std::fmt::Display for SigningMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key material input for [`crate::keys::KeyManager::initialize`].
#[derive(Debug, Clone, Default)]
pub struct KeyConfig {
    /// Raw secret for the HMAC family. Required for symmetric methods.
    pub secret: Option<Vec<u8>>,
    /// PEM-encoded RSA private key (PKCS1 or PKCS8 container). When absent
    /// for an asymmetric method, a fresh 2048-bit pair is generated.
    pub private_key_pem: Option<String>,
}

impl KeyConfig {
    /// Config with a raw HMAC secret.
    #[must_use]
    pub fn with_secret(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: Some(secret.into()),
            private_key_pem: None,
        }
    }

    /// Config with a PEM-encoded RSA private key.
    #[must_use]
    pub fn with_private_key_pem(pem: impl Into<String>) -> Self {
        Self {
            secret: None,
            private_key_pem: Some(pem.into()),
        }
    }

    /// Config that generates a fresh key pair for asymmetric methods.
    #[must_use]
    pub fn generate() -> Self {
        Self::default()
    }
}

/// Enforcement configuration shared by the validator, policy checks, and
/// the key rotator. Swapped atomically on update; see
/// [`crate::policy::SecurityPolicy::update_policy`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PolicyConfig {
    /// Whether the background rotator should run.
    pub enable_rotation: bool,
    /// Interval between rotation attempts.
    #[serde(with = "duration_secs")]
    pub rotation_interval: Duration,
    /// Whether IP binding is enforced.
    pub enable_ip_binding: bool,
    /// Whether device binding is enforced.
    pub enable_device_binding: bool,
    /// Whether session tracking is enabled in the consuming middleware.
    pub enable_session: bool,
    /// Maximum concurrent sessions per subject.
    pub max_active_sessions: u32,
    /// Maximum accepted token age, measured from issuance.
    #[serde(with = "duration_secs")]
    pub max_token_age: Duration,
    /// Minimum interval between validations of the same token identity.
    #[serde(with = "duration_secs")]
    pub token_reuse_interval: Duration,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            enable_rotation: false,
            rotation_interval: Duration::from_secs(24 * 3600),
            enable_ip_binding: false,
            enable_device_binding: false,
            enable_session: false,
            max_active_sessions: 5,
            max_token_age: Duration::from_secs(30 * 24 * 3600),
            token_reuse_interval: Duration::from_secs(60),
        }
    }
}

impl PolicyConfig {
    /// Enable background rotation at the given interval.
    #[must_use]
    pub const fn with_rotation(mut self, interval: Duration) -> Self {
        self.enable_rotation = true;
        self.rotation_interval = interval;
        self
    }

    /// Enable IP binding enforcement.
    #[must_use]
    pub const fn with_ip_binding(mut self) -> Self {
        self.enable_ip_binding = true;
        self
    }

    /// Enable device binding enforcement.
    #[must_use]
    pub const fn with_device_binding(mut self) -> Self {
        self.enable_device_binding = true;
        self
    }

    /// Set the maximum accepted token age.
    #[must_use]
    pub const fn with_max_token_age(mut self, age: Duration) -> Self {
        self.max_token_age = age;
        self
    }

    /// Set the reuse throttle interval.
    #[must_use]
    pub const fn with_token_reuse_interval(mut self, interval: Duration) -> Self {
        self.token_reuse_interval = interval;
        self
    }
}

/// Top-level configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Signing method for the key manager.
    pub signing_method: SigningMethod,
    /// HMAC secret, when configured through the environment.
    pub signing_secret: Option<Vec<u8>>,
    /// Enforcement policy.
    pub policy: PolicyConfig,
    /// Redis connection URL for the distributed cache.
    pub redis_url: String,
    /// TTL applied to device and IP bindings.
    pub binding_ttl: Duration,
    /// Sweep interval for the in-memory blacklist.
    pub blacklist_cleanup_interval: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but malformed.
    pub fn from_env() -> Result<Self, SecurityError> {
        dotenvy::dotenv().ok();

        let signing_method = SigningMethod::parse(
            &env::var("SIGNING_METHOD").unwrap_or_else(|_| "RS256".to_string()),
        )?;
        let signing_secret = parse_signing_secret()?;

        let policy = PolicyConfig {
            enable_rotation: parse_env("ENABLE_KEY_ROTATION", false)?,
            rotation_interval: Duration::from_secs(parse_env("KEY_ROTATION_INTERVAL", 86_400)?),
            enable_ip_binding: parse_env("ENABLE_IP_BINDING", false)?,
            enable_device_binding: parse_env("ENABLE_DEVICE_BINDING", false)?,
            enable_session: parse_env("ENABLE_SESSION", false)?,
            max_active_sessions: parse_env("MAX_ACTIVE_SESSIONS", 5)?,
            max_token_age: Duration::from_secs(parse_env("MAX_TOKEN_AGE", 2_592_000)?),
            token_reuse_interval: Duration::from_secs(parse_env("TOKEN_REUSE_INTERVAL", 60)?),
        };

        let redis_url =
            env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        let binding_ttl = Duration::from_secs(parse_env("BINDING_TTL", 86_400)?);
        let blacklist_cleanup_interval =
            Duration::from_secs(parse_env("BLACKLIST_CLEANUP_INTERVAL", 300)?);

        Ok(Self {
            signing_method,
            signing_secret,
            policy,
            redis_url,
            binding_ttl,
            blacklist_cleanup_interval,
        })
    }
}

/// Parse the signing secret from the environment.
///
/// `SIGNING_SECRET_BASE64` takes precedence and must decode cleanly;
/// `SIGNING_SECRET` is taken as raw bytes.
fn parse_signing_secret() -> Result<Option<Vec<u8>>, SecurityError> {
    if let Ok(encoded) = env::var("SIGNING_SECRET_BASE64") {
        let bytes = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &encoded)
            .map_err(|e| SecurityError::config(format!("Invalid SIGNING_SECRET_BASE64: {e}")))?;
        return Ok(Some(bytes));
    }
    Ok(env::var("SIGNING_SECRET").ok().map(String::into_bytes))
}

/// Parse environment variable with default value.
fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T, SecurityError>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(val) => val
            .parse()
            .map_err(|e| SecurityError::config(format!("Invalid {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}
