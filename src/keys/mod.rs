//! Signing-key custody: algorithm strategies, key material, the key
//! manager, and the background rotator.

mod algorithm;
mod manager;
mod material;
mod rotator;

pub use algorithm::{algorithm_for, Algorithm, HmacAlgorithm, RsaAlgorithm};
pub use manager::KeyManager;
pub use material::KeyMaterial;
pub use rotator::KeyRotator;
