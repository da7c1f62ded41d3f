//! 服务注册发现模块
//!
//! 对外提供与后端无关的注册发现接口，当前后端为 Nacos。

pub mod address;
pub mod nacos;
pub mod options;
pub mod trait_def;
pub mod watcher;

pub use address::{DEFAULT_CONTEXT_PATH, DEFAULT_PORT, resolve_addresses};
pub use nacos::{NacosRegistry, REGISTRY_NAME};
pub use options::{DeregisterOptions, GetOptions, ListOptions, RegisterOptions, WatchOptions};
pub use trait_def::{Registry, WatchAction, WatchResult, Watcher};
pub use watcher::{NacosWatcher, WatchHandle};

/// 根据配置创建注册中心实例
///
/// 与 `NacosRegistry::new` 不同，命名客户端构造失败时直接返回错误。
#[cfg(feature = "http")]
pub fn create_registry(
    config: crate::config::RegistryConfig,
) -> crate::error::Result<NacosRegistry> {
    NacosRegistry::try_with_factory(
        std::sync::Arc::new(crate::naming::HttpNamingClientFactory),
        config.into_options(),
    )
}
