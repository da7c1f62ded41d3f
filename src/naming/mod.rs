//! 命名服务客户端抽象
//!
//! 适配器只通过这里定义的 trait 与 Nacos 交互，连接管理、重试和协议细节
//! 都属于具体客户端实现。

pub mod config;
pub mod error;
#[cfg(feature = "http")]
pub mod http;
pub mod listener;
pub mod model;

use async_trait::async_trait;
use std::sync::Arc;

pub use config::{ClientConfig, ServerConfig};
pub use error::{NamingError, Result};
#[cfg(feature = "http")]
pub use http::{HttpNamingClient, HttpNamingClientFactory};
pub use listener::{EventListener, NamingEvent};
pub use model::{
    DeregisterInstanceParam, GetAllServiceInfoParam, GetServiceParam, Instance,
    RegisterInstanceParam, ServiceDetail, ServiceList, SubscribeParam, SubscriptionToken,
};

/// 命名服务客户端
///
/// 所有方法都是一次完整的请求/响应往返，错误原样返回给调用方。
#[async_trait]
pub trait NamingClient: Send + Sync {
    /// 注册实例
    async fn register_instance(&self, param: RegisterInstanceParam) -> Result<bool>;

    /// 注销实例
    async fn deregister_instance(&self, param: DeregisterInstanceParam) -> Result<bool>;

    /// 查询服务下的全部实例
    async fn get_service(&self, param: GetServiceParam) -> Result<ServiceDetail>;

    /// 分页列出服务名
    async fn get_all_services_info(&self, param: GetAllServiceInfoParam) -> Result<ServiceList>;

    /// 订阅服务变化
    ///
    /// 实例列表每次变化时回调 `listener`，返回的句柄用于取消订阅。
    async fn subscribe(
        &self,
        param: SubscribeParam,
        listener: Arc<dyn EventListener>,
    ) -> Result<SubscriptionToken>;

    /// 取消订阅，返回后不再回调对应的 listener
    async fn unsubscribe(&self, token: &SubscriptionToken) -> Result<()>;
}

/// 命名客户端工厂
///
/// 每次配置变化时由适配器调用，构造一个全新的客户端。
pub trait NamingClientFactory: Send + Sync {
    fn create_naming_client(
        &self,
        client_config: &ClientConfig,
        server_configs: &[ServerConfig],
    ) -> Result<Arc<dyn NamingClient>>;
}
