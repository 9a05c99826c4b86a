//! Device instance, its request pipeline, and the built-in
//! fallback OID table it falls back to when no profile is
//! loaded for its class.

pub mod fallback;
pub mod instance;

pub use instance::{Device, DeviceInfo, Lifecycle};
