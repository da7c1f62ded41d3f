//! 服务注册发现 Trait 定义

use async_trait::async_trait;
use std::fmt;

use super::options::{DeregisterOptions, GetOptions, ListOptions, RegisterOptions, WatchOptions};
use crate::config::{RegistryOption, RegistryOptions};
use crate::error::Result;
use crate::types::Service;

/// 统一的服务注册发现接口
///
/// 每个后端通过关联类型声明自己的原生覆盖参数。
#[async_trait]
pub trait Registry: Send + Sync {
    type RegisterParam: Send + 'static;
    type DeregisterParam: Send + 'static;
    type GetParam: Send + 'static;
    type ListParam: Send + 'static;
    type WatchParam: Send + 'static;

    /// 合并选项并重建后端客户端
    async fn init(&self, opts: Vec<RegistryOption>) -> Result<()>;

    /// 当前累积的选项
    fn options(&self) -> RegistryOptions;

    /// 注册服务（只使用第一个节点）
    async fn register(
        &self,
        service: &mut Service,
        opts: RegisterOptions<Self::RegisterParam>,
    ) -> Result<()>;

    /// 注销服务（只使用第一个节点）
    async fn deregister(
        &self,
        service: &Service,
        opts: DeregisterOptions<Self::DeregisterParam>,
    ) -> Result<()>;

    /// 获取服务实例
    async fn get_service(&self, name: &str, opts: GetOptions<Self::GetParam>)
    -> Result<Vec<Service>>;

    /// 列出所有服务名
    async fn list_services(&self, opts: ListOptions<Self::ListParam>) -> Result<Vec<Service>>;

    /// 监听服务变化
    async fn watch(&self, opts: WatchOptions<Self::WatchParam>) -> Result<Box<dyn Watcher>>;

    /// 后端标识
    fn name(&self) -> &'static str;
}

/// 服务变化监听
#[async_trait]
pub trait Watcher: Send {
    /// 等待下一个变化事件，停止后返回 `WatcherStopped`
    async fn next(&mut self) -> Result<WatchResult>;

    /// 停止监听并释放后端订阅
    async fn stop(&self);
}

/// 变化类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchAction {
    Create,
    Update,
    Delete,
}

impl WatchAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            WatchAction::Create => "create",
            WatchAction::Update => "update",
            WatchAction::Delete => "delete",
        }
    }
}

impl fmt::Display for WatchAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一次变化事件，`service` 只包含发生变化的那个节点
#[derive(Debug, Clone, PartialEq)]
pub struct WatchResult {
    pub action: WatchAction,
    pub service: Service,
}
