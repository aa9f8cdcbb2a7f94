//! Stateless sign/verify strategies per signing method.

use ring::hmac;
use rsa::Pkcs1v15Sign;
use sha2::{Digest, Sha256, Sha384, Sha512};
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::config::SigningMethod;
use crate::error::SecurityError;
use crate::keys::material::KeyMaterial;

/// Sign/verify strategy for one signing method. Stateless and safe for
/// unlimited concurrent use.
pub trait Algorithm: Send + Sync {
    /// The method this strategy implements.
    fn method(&self) -> SigningMethod;

    /// Sign `data` with the signing half of `key`.
    ///
    /// # Errors
    ///
    /// [`SecurityError::KeyInvalid`] when the material does not match the
    /// method; [`SecurityError::SignatureInvalid`] when signing fails.
    fn sign(&self, data: &[u8], key: &KeyMaterial) -> Result<Vec<u8>, SecurityError>;

    /// Verify `signature` over `data` with the verification half of `key`.
    ///
    /// # Errors
    ///
    /// [`SecurityError::KeyInvalid`] when the material does not match the
    /// method; [`SecurityError::SignatureInvalid`] when verification fails.
    fn verify(&self, data: &[u8], signature: &[u8], key: &KeyMaterial)
        -> Result<(), SecurityError>;
}

/// Resolve the strategy for a signing method.
///
/// Unknown methods are rejected earlier, at [`SigningMethod::parse`], with
/// [`SecurityError::AlgorithmMismatch`]; every enum variant has a strategy.
#[must_use]
pub fn algorithm_for(method: SigningMethod) -> Arc<dyn Algorithm> {
    if method.is_symmetric() {
        Arc::new(HmacAlgorithm::new(method))
    } else {
        Arc::new(RsaAlgorithm::new(method))
    }
}

/// HMAC family (HS256/384/512) backed by `ring`.
pub struct HmacAlgorithm {
    method: SigningMethod,
    hmac_alg: hmac::Algorithm,
}

impl HmacAlgorithm {
    /// Create the strategy for one HMAC method.
    ///
    /// # Panics
    ///
    /// Panics when handed an asymmetric method; [`algorithm_for`] never
    /// does.
    #[must_use]
    pub fn new(method: SigningMethod) -> Self {
        let hmac_alg = match method {
            SigningMethod::HS256 => hmac::HMAC_SHA256,
            SigningMethod::HS384 => hmac::HMAC_SHA384,
            SigningMethod::HS512 => hmac::HMAC_SHA512,
            other => panic!("not an HMAC method: {other}"),
        };
        Self { method, hmac_alg }
    }

    fn secret<'k>(&self, key: &'k KeyMaterial) -> Result<&'k [u8], SecurityError> {
        match key {
            KeyMaterial::Symmetric { secret } => Ok(secret),
            KeyMaterial::Asymmetric { .. } => Err(SecurityError::key_invalid(format!(
                "{} requires a raw secret, got an RSA key pair",
                self.method
            ))),
        }
    }
}

impl Algorithm for HmacAlgorithm {
    fn method(&self) -> SigningMethod {
        self.method
    }

    fn sign(&self, data: &[u8], key: &KeyMaterial) -> Result<Vec<u8>, SecurityError> {
        let secret = self.secret(key)?;
        let key = hmac::Key::new(self.hmac_alg, secret);
        Ok(hmac::sign(&key, data).as_ref().to_vec())
    }

    fn verify(
        &self,
        data: &[u8],
        signature: &[u8],
        key: &KeyMaterial,
    ) -> Result<(), SecurityError> {
        let secret = self.secret(key)?;
        let key = hmac::Key::new(self.hmac_alg, secret);
        let expected = hmac::sign(&key, data);

        // Constant-time comparison of the freshly computed tag.
        if expected.as_ref().ct_eq(signature).into() {
            Ok(())
        } else {
            Err(SecurityError::SignatureInvalid)
        }
    }
}

/// RSA family (RS256/384/512), PKCS1v15 padding with the matching hash.
pub struct RsaAlgorithm {
    method: SigningMethod,
}

impl RsaAlgorithm {
    /// Create the strategy for one RSA method.
    ///
    /// # Panics
    ///
    /// Panics when handed a symmetric method; [`algorithm_for`] never
    /// does.
    #[must_use]
    pub fn new(method: SigningMethod) -> Self {
        assert!(!method.is_symmetric(), "not an RSA method: {method}");
        Self { method }
    }

    fn digest(&self, data: &[u8]) -> (Pkcs1v15Sign, Vec<u8>) {
        match self.method {
            SigningMethod::RS256 => (
                Pkcs1v15Sign::new::<Sha256>(),
                Sha256::digest(data).to_vec(),
            ),
            SigningMethod::RS384 => (
                Pkcs1v15Sign::new::<Sha384>(),
                Sha384::digest(data).to_vec(),
            ),
            SigningMethod::RS512 => (
                Pkcs1v15Sign::new::<Sha512>(),
                Sha512::digest(data).to_vec(),
            ),
            _ => unreachable!("constructor rejects symmetric methods"),
        }
    }

    fn keypair<'k>(
        &self,
        key: &'k KeyMaterial,
    ) -> Result<(&'k rsa::RsaPrivateKey, &'k rsa::RsaPublicKey), SecurityError> {
        match key {
            KeyMaterial::Asymmetric { private, public } => Ok((private, public)),
            KeyMaterial::Symmetric { .. } => Err(SecurityError::key_invalid(format!(
                "{} requires an RSA key pair, got a raw secret",
                self.method
            ))),
        }
    }
}

impl Algorithm for RsaAlgorithm {
    fn method(&self) -> SigningMethod {
        self.method
    }

    fn sign(&self, data: &[u8], key: &KeyMaterial) -> Result<Vec<u8>, SecurityError> {
        let (private, _) = self.keypair(key)?;
        let (padding, digest) = self.digest(data);
        private
            .sign(padding, &digest)
            .map_err(|_| SecurityError::SignatureInvalid)
    }

    fn verify(
        &self,
        data: &[u8],
        signature: &[u8],
        key: &KeyMaterial,
    ) -> Result<(), SecurityError> {
        let (_, public) = self.keypair(key)?;
        let (padding, digest) = self.digest(data);
        public
            .verify(padding, &digest, signature)
            .map_err(|_| SecurityError::SignatureInvalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    fn rsa_material() -> KeyMaterial {
        let private = rsa::RsaPrivateKey::new(&mut OsRng, 2048).unwrap();
        KeyMaterial::asymmetric(private)
    }

    #[test]
    fn test_hmac_sign_verify_roundtrip() {
        for method in [
            SigningMethod::HS256,
            SigningMethod::HS384,
            SigningMethod::HS512,
        ] {
            let alg = HmacAlgorithm::new(method);
            let key = KeyMaterial::symmetric(b"a-shared-secret".to_vec());

            let sig = alg.sign(b"payload", &key).unwrap();
            alg.verify(b"payload", &sig, &key).unwrap();
        }
    }

    #[test]
    fn test_hmac_rejects_tampered_data() {
        let alg = HmacAlgorithm::new(SigningMethod::HS256);
        let key = KeyMaterial::symmetric(b"a-shared-secret".to_vec());

        let sig = alg.sign(b"payload", &key).unwrap();
        assert!(matches!(
            alg.verify(b"payloae", &sig, &key),
            Err(SecurityError::SignatureInvalid)
        ));
    }

    #[test]
    fn test_hmac_rejects_tampered_signature() {
        let alg = HmacAlgorithm::new(SigningMethod::HS512);
        let key = KeyMaterial::symmetric(b"a-shared-secret".to_vec());

        let mut sig = alg.sign(b"payload", &key).unwrap();
        sig[0] ^= 0x01;
        assert!(matches!(
            alg.verify(b"payload", &sig, &key),
            Err(SecurityError::SignatureInvalid)
        ));
    }

    #[test]
    fn test_hmac_rejects_rsa_material() {
        let alg = HmacAlgorithm::new(SigningMethod::HS256);
        let key = rsa_material();
        assert!(matches!(
            alg.sign(b"payload", &key),
            Err(SecurityError::KeyInvalid(_))
        ));
    }

    #[test]
    fn test_rsa_sign_verify_roundtrip() {
        let key = rsa_material();
        let alg = RsaAlgorithm::new(SigningMethod::RS256);

        let sig = alg.sign(b"payload", &key).unwrap();
        alg.verify(b"payload", &sig, &key).unwrap();
    }

    #[test]
    fn test_rsa_rejects_wrong_key() {
        let alg = RsaAlgorithm::new(SigningMethod::RS256);
        let key = rsa_material();
        let other = rsa_material();

        let sig = alg.sign(b"payload", &key).unwrap();
        assert!(matches!(
            alg.verify(b"payload", &sig, &other),
            Err(SecurityError::SignatureInvalid)
        ));
    }

    #[test]
    fn test_rsa_rejects_symmetric_material() {
        let alg = RsaAlgorithm::new(SigningMethod::RS384);
        let key = KeyMaterial::symmetric(b"secret".to_vec());
        assert!(matches!(
            alg.verify(b"payload", b"sig", &key),
            Err(SecurityError::KeyInvalid(_))
        ));
    }

    #[test]
    fn test_factory_dispatch() {
        assert_eq!(
            algorithm_for(SigningMethod::HS384).method(),
            SigningMethod::HS384
        );
        assert_eq!(
            algorithm_for(SigningMethod::RS512).method(),
            SigningMethod::RS512
        );
    }
}
