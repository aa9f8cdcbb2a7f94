//! Key material owned by a [`crate::keys::KeyManager`].

use rsa::{RsaPrivateKey, RsaPublicKey};
use zeroize::Zeroizing;

/// Signing and verification key material for one signing method.
///
/// For symmetric methods the secret serves both roles; for asymmetric
/// methods the private key signs and the public key verifies. Material is
/// replaced wholesale on rotation, never mutated in place, so a snapshot
/// taken before rotation stays valid for the operation that took it.
pub enum KeyMaterial {
    /// Shared secret for the HMAC family. Zeroized on drop.
    Symmetric {
        /// Raw secret bytes.
        secret: Zeroizing<Vec<u8>>,
    },
    /// RSA key pair for the asymmetric family.
    Asymmetric {
        /// Private signing key.
        private: RsaPrivateKey,
        /// Public verification key, derived from the private key.
        public: RsaPublicKey,
    },
}

impl KeyMaterial {
    /// Build symmetric material from a raw secret.
    #[must_use]
    pub fn symmetric(secret: Vec<u8>) -> Self {
        Self::Symmetric {
            secret: Zeroizing::new(secret),
        }
    }

    /// Build asymmetric material, deriving the public key.
    #[must_use]
    pub fn asymmetric(private: RsaPrivateKey) -> Self {
        let public = RsaPublicKey::from(&private);
        Self::Asymmetric { private, public }
    }

    /// True for symmetric material.
    #[must_use]
    pub const fn is_symmetric(&self) -> bool {
        matches!(self, Self::Symmetric { .. })
    }
}

// Never expose key bytes through Debug.
impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Symmetric { .. } => f.write_str("KeyMaterial::Symmetric(..)"),
            Self::Asymmetric { .. } => f.write_str("KeyMaterial::Asymmetric(..)"),
        }
    }
}
