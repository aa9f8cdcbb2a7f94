//! Device and IP binding: persistence and consistency validation.
//!
//! A binding associates a device identity with the fingerprint or IP it
//! first presented. Later uses must match exactly; bindings are compared,
//! never merged. Two concurrent first-uses may both observe "not found"
//! and both write — the store's last-write-wins semantics resolve the
//! race, and only the previously-bound value becomes contended, not lost.

mod device;
mod ip;
mod store;

pub use device::DeviceBindingValidator;
pub use ip::IpBindingValidator;
pub use store::{BindingStore, IpBinding, DEFAULT_BINDING_TTL};
