//! Key custody and rotation for one signing method.

use rand::rngs::OsRng;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::RsaPrivateKey;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use crate::config::{KeyConfig, SigningMethod};
use crate::error::SecurityError;
use crate::keys::algorithm::{algorithm_for, Algorithm};
use crate::keys::material::KeyMaterial;

const RSA_KEY_BITS: usize = 2048;

/// Owns the current key material for one signing method.
///
/// Reads take the lock in shared mode and return an [`Arc`] snapshot, so
/// an in-flight verification that captured its key before a rotation keeps
/// using the pre-rotation material for that call. Rotation and
/// initialization replace the material wholesale under the exclusive lock.
pub struct KeyManager {
    method: SigningMethod,
    algorithm: Arc<dyn Algorithm>,
    material: RwLock<Option<Arc<KeyMaterial>>>,
}

impl KeyManager {
    /// Create an uninitialized manager for the given method. The method is
    /// immutable for the manager's lifetime.
    #[must_use]
    pub fn new(method: SigningMethod) -> Self {
        Self {
            method,
            algorithm: algorithm_for(method),
            material: RwLock::new(None),
        }
    }

    /// The signing method this manager was constructed with.
    #[must_use]
    pub const fn method(&self) -> SigningMethod {
        self.method
    }

    /// Install key material from configuration.
    ///
    /// Symmetric methods require a non-empty secret. Asymmetric methods
    /// parse a PEM-encoded private key (PKCS1 or PKCS8 container,
    /// public key derived) or generate a fresh 2048-bit pair when none is
    /// supplied.
    ///
    /// # Errors
    ///
    /// Returns [`SecurityError::KeyInvalid`] on empty or malformed input.
    pub async fn initialize(&self, config: &KeyConfig) -> Result<(), SecurityError> {
        let material = if self.method.is_symmetric() {
            let secret = config
                .secret
                .as_ref()
                .ok_or_else(|| SecurityError::key_invalid("signing secret is required"))?;
            if secret.is_empty() {
                return Err(SecurityError::key_invalid("signing secret is empty"));
            }
            KeyMaterial::symmetric(secret.clone())
        } else {
            let private = match &config.private_key_pem {
                Some(pem) => parse_private_key_pem(pem)?,
                None => generate_private_key().await?,
            };
            KeyMaterial::asymmetric(private)
        };

        let mut guard = self.material.write().await;
        *guard = Some(Arc::new(material));

        info!(method = %self.method, "Key material initialized");
        Ok(())
    }

    /// Snapshot of the current signing key material.
    ///
    /// # Errors
    ///
    /// Returns [`SecurityError::KeyInvalid`] before initialization.
    pub async fn signing_key(&self) -> Result<Arc<KeyMaterial>, SecurityError> {
        self.snapshot().await
    }

    /// Snapshot of the current verification key material. For symmetric
    /// methods this is the same secret the signing side uses.
    ///
    /// # Errors
    ///
    /// Returns [`SecurityError::KeyInvalid`] before initialization.
    pub async fn verification_key(&self) -> Result<Arc<KeyMaterial>, SecurityError> {
        self.snapshot().await
    }

    /// Generate a fresh key pair and replace the current material
    /// atomically. Asymmetric methods only.
    ///
    /// # Errors
    ///
    /// Returns [`SecurityError::KeyInvalid`] for symmetric methods or an
    /// uninitialized manager, [`SecurityError::RotationFailed`] when
    /// generation fails.
    pub async fn rotate(&self) -> Result<(), SecurityError> {
        if self.method.is_symmetric() {
            return Err(SecurityError::key_invalid(format!(
                "rotation not supported for {}",
                self.method
            )));
        }

        // Generate outside the lock; readers keep the old material until
        // the swap below.
        let private = generate_private_key()
            .await
            .map_err(|e| SecurityError::RotationFailed(e.to_string()))?;
        let fresh = Arc::new(KeyMaterial::asymmetric(private));

        let mut guard = self.material.write().await;
        if guard.is_none() {
            return Err(SecurityError::key_invalid("keys not initialized"));
        }
        *guard = Some(fresh);

        info!(method = %self.method, "Key material rotated");
        Ok(())
    }

    /// Sign `data` with the current signing key.
    ///
    /// # Errors
    ///
    /// Propagates key and signing errors from the algorithm strategy.
    pub async fn sign(&self, data: &[u8]) -> Result<Vec<u8>, SecurityError> {
        let key = self.snapshot().await?;
        self.algorithm.sign(data, &key)
    }

    /// Verify `signature` over `data` with the current verification key.
    ///
    /// # Errors
    ///
    /// Returns [`SecurityError::SignatureInvalid`] when the signature does
    /// not match, [`SecurityError::KeyInvalid`] before initialization.
    pub async fn verify(&self, data: &[u8], signature: &[u8]) -> Result<(), SecurityError> {
        let key = self.snapshot().await?;
        self.algorithm.verify(data, signature, &key)
    }

    async fn snapshot(&self) -> Result<Arc<KeyMaterial>, SecurityError> {
        let guard = self.material.read().await;
        guard
            .clone()
            .ok_or_else(|| SecurityError::key_invalid("keys not initialized"))
    }
}

fn parse_private_key_pem(pem: &str) -> Result<RsaPrivateKey, SecurityError> {
    if pem.trim().is_empty() {
        return Err(SecurityError::key_invalid("private key PEM is empty"));
    }
    RsaPrivateKey::from_pkcs8_pem(pem)
        .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
        .map_err(|e| SecurityError::key_invalid(format!("malformed private key PEM: {e}")))
}

async fn generate_private_key() -> Result<RsaPrivateKey, SecurityError> {
    // Keygen is CPU-heavy; keep it off the async workers.
    tokio::task::spawn_blocking(|| RsaPrivateKey::new(&mut OsRng, RSA_KEY_BITS))
        .await
        .map_err(|e| SecurityError::key_invalid(format!("key generation task failed: {e}")))?
        .map_err(|e| SecurityError::key_invalid(format!("key generation failed: {e}")))
}
