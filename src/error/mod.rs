//! 注册中心适配器错误处理模块
//!
//! 后端错误原样透传，不做转换和重试。

use crate::naming::NamingError;
use thiserror::Error;

/// 注册中心适配器统一错误类型
#[derive(Error, Debug)]
pub enum RegistryError {
    /// 命名客户端构造失败，成功 `init` 之前适配器不可用
    #[error("failed to create naming client: {0}")]
    Configuration(#[source] NamingError),

    /// 从未成功构造过命名客户端
    #[error("registry is not initialized")]
    NotInitialized,

    /// 调用方提供的服务描述不合法（缺少节点或地址无法解析）
    #[error("malformed service: {0}")]
    MalformedService(String),

    /// 命名服务返回的错误
    #[error(transparent)]
    Naming(#[from] NamingError),

    /// 监听已停止
    #[error("watcher stopped")]
    WatcherStopped,

    /// 配置文件读取或解析失败
    #[error("config error: {0}")]
    Config(String),
}

impl RegistryError {
    /// 创建服务描述错误
    pub fn malformed(reason: impl Into<String>) -> Self {
        RegistryError::MalformedService(reason.into())
    }

    /// 是否为调用方输入错误
    pub fn is_malformed(&self) -> bool {
        matches!(self, RegistryError::MalformedService(_))
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            RegistryError::malformed("you must provide at least one node").to_string(),
            "malformed service: you must provide at least one node"
        );
        assert_eq!(
            RegistryError::NotInitialized.to_string(),
            "registry is not initialized"
        );
        assert_eq!(
            RegistryError::from(NamingError::NoServers).to_string(),
            NamingError::NoServers.to_string()
        );
    }

    #[test]
    fn test_configuration_keeps_source() {
        use std::error::Error;

        let err = RegistryError::Configuration(NamingError::NoServers);
        assert!(err.source().is_some());
        assert!(!err.is_malformed());
    }
}
