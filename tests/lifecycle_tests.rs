//! End-to-end lifecycle tests across key custody, policy, bindings, and
//! revocation.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use token_guard::binding::{BindingStore, DeviceBindingValidator, IpBindingValidator};
use token_guard::blacklist::{Blacklist, MemoryBlacklist};
use token_guard::cache::{Cache, MemoryCache};
use token_guard::{
    Claims, DeviceInfo, KeyConfig, KeyManager, KeyRotator, PolicyConfig, SecurityError,
    SecurityMetrics, SecurityPolicy, SigningMethod, TokenType, TokenValidator,
};

fn metrics() -> Arc<SecurityMetrics> {
    Arc::new(SecurityMetrics::unregistered())
}

fn policy_with(config: PolicyConfig) -> Arc<SecurityPolicy> {
    Arc::new(SecurityPolicy::new(
        config,
        Arc::new(MemoryCache::new()),
        metrics(),
    ))
}

/// RSA key manager: initialize with a generated key, sign, verify,
/// rotate, and confirm the original signature no longer verifies.
#[tokio::test]
async fn test_rsa_rotation_invalidates_prior_signature() {
    let manager = KeyManager::new(SigningMethod::RS256);
    manager.initialize(&KeyConfig::generate()).await.unwrap();

    let signature = manager.sign(b"hello").await.unwrap();
    manager.verify(b"hello", &signature).await.unwrap();

    manager.rotate().await.unwrap();

    assert!(matches!(
        manager.verify(b"hello", &signature).await,
        Err(SecurityError::SignatureInvalid)
    ));
}

/// The background rotator replaces RSA material on its own schedule.
#[tokio::test]
async fn test_background_rotation_replaces_keys() {
    let manager = Arc::new(KeyManager::new(SigningMethod::RS256));
    manager.initialize(&KeyConfig::generate()).await.unwrap();

    let signature = manager.sign(b"hello").await.unwrap();

    let policy = policy_with(PolicyConfig::default().with_rotation(Duration::from_millis(100)));
    let rotator = KeyRotator::new(Arc::clone(&manager), policy, metrics());
    rotator.start().await.unwrap();

    // Wait for at least one scheduled rotation to land.
    let deadline = tokio::time::Instant::now() + tokio::time::Duration::from_secs(60);
    loop {
        if manager.verify(b"hello", &signature).await.is_err() {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "rotation never happened"
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    rotator.stop().await.unwrap();
    assert!(!rotator.is_running().await);
}

/// Full request-path sequence: blacklist check, structural validation,
/// reuse throttle, and both bindings.
#[tokio::test]
async fn test_request_path_happy_flow() {
    let metrics = metrics();
    let cache: Arc<MemoryCache> = Arc::new(MemoryCache::new());

    let policy = Arc::new(SecurityPolicy::new(
        PolicyConfig::default()
            .with_ip_binding()
            .with_device_binding()
            .with_token_reuse_interval(Duration::from_secs(60)),
        cache.clone(),
        Arc::clone(&metrics),
    ));
    let validator = TokenValidator::new(Arc::clone(&policy));

    let store = Arc::new(BindingStore::with_default_ttl(cache.clone()));
    let device_validator =
        DeviceBindingValidator::new(Arc::clone(&store), Arc::clone(&metrics));
    let ip_validator = IpBindingValidator::new(store, Arc::clone(&metrics));

    let blacklist = MemoryBlacklist::new(Arc::clone(&metrics));

    let claims = Claims::new("user-1", TokenType::Access, chrono::Duration::minutes(15))
        .with_device_id("dev-1")
        .with_ip_address("192.168.1.10");
    let device = DeviceInfo::new("dev-1", "fp-abc");

    assert!(!blacklist.is_blacklisted(&claims.token_id).await.unwrap());
    validator.validate(&claims).unwrap();
    policy.validate_token_reuse(&claims.token_id).await.unwrap();
    policy
        .validate_token_age(&claims.token_id, claims.issued_at)
        .await
        .unwrap();
    device_validator.validate(&claims, &device).await.unwrap();
    ip_validator.validate(&claims, "192.168.1.10").await.unwrap();

    // Immediate replay of the same token identity is throttled.
    assert!(matches!(
        policy.validate_token_reuse(&claims.token_id).await,
        Err(SecurityError::PolicyViolation(_))
    ));
}

/// Revoking a token short-circuits it regardless of otherwise-valid
/// claims, until the revocation expires.
#[tokio::test]
async fn test_revocation_overrides_valid_claims() {
    let blacklist = MemoryBlacklist::new(metrics());
    let claims = Claims::new("user-1", TokenType::Access, chrono::Duration::minutes(15));

    blacklist
        .add(&claims.token_id, Utc::now() + chrono::Duration::milliseconds(80))
        .await
        .unwrap();
    assert!(blacklist.is_blacklisted(&claims.token_id).await.unwrap());

    tokio::time::sleep(Duration::from_millis(120)).await;
    assert!(!blacklist.is_blacklisted(&claims.token_id).await.unwrap());
}

/// An invalid presented IP fails before any store access: a cache that
/// panics on use proves the validator never reached it.
#[tokio::test]
async fn test_invalid_ip_short_circuits_store() {
    struct PanickingCache;

    #[async_trait::async_trait]
    impl Cache for PanickingCache {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, SecurityError> {
            panic!("store must not be touched");
        }
        async fn set(
            &self,
            _key: &str,
            _value: &[u8],
            _ttl: Duration,
        ) -> Result<(), SecurityError> {
            panic!("store must not be touched");
        }
        async fn delete(&self, _key: &str) -> Result<(), SecurityError> {
            panic!("store must not be touched");
        }
    }

    let store = Arc::new(BindingStore::with_default_ttl(Arc::new(PanickingCache)));
    let validator = IpBindingValidator::new(store, metrics());

    let claims = Claims::new("user-1", TokenType::Access, chrono::Duration::minutes(15))
        .with_device_id("dev-1");

    assert!(matches!(
        validator.validate(&claims, "not-an-ip").await,
        Err(SecurityError::BindingInvalid(_))
    ));
}

/// Store failures surface as store-kinded errors, distinguishable from
/// validation failures.
#[tokio::test]
async fn test_store_failure_propagates_typed() {
    struct FailingCache;

    #[async_trait::async_trait]
    impl Cache for FailingCache {
        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, SecurityError> {
            Err(SecurityError::StoreGet(format!("connection refused: {key}")))
        }
        async fn set(
            &self,
            key: &str,
            _value: &[u8],
            _ttl: Duration,
        ) -> Result<(), SecurityError> {
            Err(SecurityError::StoreSet(format!("connection refused: {key}")))
        }
        async fn delete(&self, key: &str) -> Result<(), SecurityError> {
            Err(SecurityError::StoreDelete(format!(
                "connection refused: {key}"
            )))
        }
    }

    let policy = Arc::new(SecurityPolicy::new(
        PolicyConfig::default(),
        Arc::new(FailingCache),
        metrics(),
    ));

    let err = policy.validate_token_reuse("tok-1").await.unwrap_err();
    assert!(err.is_store_error());
}

/// Age-check boundary is exclusive: exactly max age passes, beyond fails.
#[tokio::test]
async fn test_age_boundary_behavior() {
    let policy = policy_with(PolicyConfig::default().with_max_token_age(Duration::from_secs(3600)));

    // Comfortably inside and outside the limit; the exact instant is
    // covered by the exclusive comparison in the policy.
    policy
        .validate_token_age("tok-in", Utc::now() - chrono::Duration::seconds(3599))
        .await
        .unwrap();
    assert!(matches!(
        policy
            .validate_token_age("tok-out", Utc::now() - chrono::Duration::seconds(3601))
            .await,
        Err(SecurityError::TokenExpired)
    ));
}
