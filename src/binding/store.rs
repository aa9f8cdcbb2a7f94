//! Cache-backed persistence for device and IP bindings.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::Cache;
use crate::claims::DeviceInfo;
use crate::error::SecurityError;

/// Default binding lifetime.
pub const DEFAULT_BINDING_TTL: Duration = Duration::from_secs(24 * 3600);

/// An IP bound to a device identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IpBinding {
    /// The bound address, kept as the string the client first presented.
    pub ip: String,
}

fn device_key(device_id: &str) -> String {
    format!("auth:binding:device:{device_id}")
}

fn ip_key(device_id: &str) -> String {
    format!("auth:binding:ip:{device_id}")
}

/// Stores bindings as JSON documents in the distributed cache, keyed by
/// device identity. Entries expire via cache TTL and are replaced, never
/// merged.
pub struct BindingStore {
    cache: Arc<dyn Cache>,
    ttl: Duration,
}

impl BindingStore {
    /// Create a store with the given binding TTL.
    #[must_use]
    pub fn new(cache: Arc<dyn Cache>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    /// Create a store with [`DEFAULT_BINDING_TTL`].
    #[must_use]
    pub fn with_default_ttl(cache: Arc<dyn Cache>) -> Self {
        Self::new(cache, DEFAULT_BINDING_TTL)
    }

    /// Fetch the device binding for a device identity.
    ///
    /// # Errors
    ///
    /// `Store*` errors from the cache; a stored document that fails to
    /// parse surfaces as [`SecurityError::StoreGet`].
    pub async fn device_binding(
        &self,
        device_id: &str,
    ) -> Result<Option<DeviceInfo>, SecurityError> {
        match self.cache.get(&device_key(device_id)).await? {
            Some(raw) => serde_json::from_slice(&raw)
                .map(Some)
                .map_err(|e| SecurityError::StoreGet(format!("corrupt device binding: {e}"))),
            None => Ok(None),
        }
    }

    /// Persist the device binding for a device identity.
    ///
    /// # Errors
    ///
    /// `Store*` errors from the cache.
    pub async fn store_device_binding(
        &self,
        device_id: &str,
        info: &DeviceInfo,
    ) -> Result<(), SecurityError> {
        let doc = serde_json::to_vec(info)
            .map_err(|e| SecurityError::StoreSet(format!("unserializable binding: {e}")))?;
        self.cache.set(&device_key(device_id), &doc, self.ttl).await
    }

    /// Remove the device binding for a device identity.
    ///
    /// # Errors
    ///
    /// `Store*` errors from the cache.
    pub async fn delete_device_binding(&self, device_id: &str) -> Result<(), SecurityError> {
        self.cache.delete(&device_key(device_id)).await
    }

    /// Fetch the IP binding for a device identity.
    ///
    /// # Errors
    ///
    /// `Store*` errors from the cache; a stored document that fails to
    /// parse surfaces as [`SecurityError::StoreGet`].
    pub async fn ip_binding(&self, device_id: &str) -> Result<Option<IpBinding>, SecurityError> {
        match self.cache.get(&ip_key(device_id)).await? {
            Some(raw) => serde_json::from_slice(&raw)
                .map(Some)
                .map_err(|e| SecurityError::StoreGet(format!("corrupt ip binding: {e}"))),
            None => Ok(None),
        }
    }

    /// Persist the IP binding for a device identity.
    ///
    /// # Errors
    ///
    /// `Store*` errors from the cache.
    pub async fn store_ip_binding(
        &self,
        device_id: &str,
        binding: &IpBinding,
    ) -> Result<(), SecurityError> {
        let doc = serde_json::to_vec(binding)
            .map_err(|e| SecurityError::StoreSet(format!("unserializable binding: {e}")))?;
        self.cache.set(&ip_key(device_id), &doc, self.ttl).await
    }

    /// Remove the IP binding for a device identity.
    ///
    /// # Errors
    ///
    /// `Store*` errors from the cache.
    pub async fn delete_ip_binding(&self, device_id: &str) -> Result<(), SecurityError> {
        self.cache.delete(&ip_key(device_id)).await
    }
}
