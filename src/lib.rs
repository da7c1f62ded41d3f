//! Nacos Registry
//!
//! Uniform service-registry adapter over a Nacos naming service: register,
//! deregister, discover, list and watch service instances through a
//! backend-agnostic contract.

pub mod config;
pub mod error;
pub mod naming;
pub mod registry;
pub mod types;

// Re-exports
pub use config::{EffectiveConfig, RegistryConfig, RegistryOption, RegistryOptions};
pub use error::{RegistryError, Result};
pub use naming::{NamingClient, NamingClientFactory, NamingError};
#[cfg(feature = "http")]
pub use registry::create_registry;
pub use registry::{
    DeregisterOptions, GetOptions, ListOptions, NacosRegistry, NacosWatcher, RegisterOptions,
    Registry, WatchAction, WatchHandle, WatchOptions, WatchResult, Watcher,
};
pub use types::{Node, Service};
