use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{RegistryError, Result};
use crate::naming::ServerConfig;

/// 未配置超时时使用的默认值
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// 注册中心选项（多次 `init` 之间累积）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryOptions {
    /// 服务端地址，`host` 或 `host:port`
    pub addrs: Vec<String>,
    pub timeout: Duration,
    /// Nacos 命名空间 ID
    pub namespace: Option<String>,
}

/// 单个注册中心选项，按顺序应用，后写覆盖先写
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryOption {
    Addrs(Vec<String>),
    Timeout(Duration),
    Namespace(String),
}

impl RegistryOption {
    pub fn addrs<I, S>(addrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RegistryOption::Addrs(addrs.into_iter().map(Into::into).collect())
    }

    pub fn timeout(timeout: Duration) -> Self {
        RegistryOption::Timeout(timeout)
    }

    pub fn namespace(namespace: impl Into<String>) -> Self {
        RegistryOption::Namespace(namespace.into())
    }

    pub fn apply(self, options: &mut RegistryOptions) {
        match self {
            RegistryOption::Addrs(addrs) => options.addrs = addrs,
            RegistryOption::Timeout(timeout) => options.timeout = timeout,
            RegistryOption::Namespace(namespace) => options.namespace = Some(namespace),
        }
    }
}

impl RegistryOptions {
    /// 依次应用选项
    pub fn apply<I>(&mut self, opts: I)
    where
        I: IntoIterator<Item = RegistryOption>,
    {
        for opt in opts {
            opt.apply(self);
        }
    }
}

/// 当前生效的客户端配置
///
/// 每次 `init` 整体重建，不会原地修改。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveConfig {
    pub servers: Vec<ServerConfig>,
    pub timeout: Duration,
    pub namespace: String,
}

/// 注册中心配置文件
///
/// ```toml
/// addrs = ["127.0.0.1:8848", "nacos-2"]
/// timeout_ms = 3000
/// namespace = "dev"
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RegistryConfig {
    #[serde(default)]
    pub addrs: Vec<String>,
    #[serde(default)]
    pub timeout_ms: u64,
    #[serde(default)]
    pub namespace: Option<String>,
}

impl RegistryConfig {
    pub fn load_from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RegistryError::Config(format!("failed to read {}: {}", path, e)))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| RegistryError::Config(format!("failed to parse registry config: {}", e)))
    }

    /// 转换为 `init` 可用的选项列表
    pub fn into_options(self) -> Vec<RegistryOption> {
        let mut opts = vec![
            RegistryOption::Addrs(self.addrs),
            RegistryOption::Timeout(Duration::from_millis(self.timeout_ms)),
        ];
        if let Some(namespace) = self.namespace {
            opts.push(RegistryOption::Namespace(namespace));
        }
        opts
    }
}
