//! 命名客户端构造配置

use serde::{Deserialize, Serialize};

/// 单个命名服务端地址
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub ip_addr: String,
    pub port: u64,
    pub context_path: String,
}

impl ServerConfig {
    pub fn new(ip_addr: impl Into<String>, port: u64, context_path: impl Into<String>) -> Self {
        Self {
            ip_addr: ip_addr.into(),
            port,
            context_path: context_path.into(),
        }
    }

    /// 服务端基础 URL，例如 `http://127.0.0.1:8848/nacos`
    pub fn base_url(&self) -> String {
        let host = if self.ip_addr.contains(':') {
            format!("[{}]", self.ip_addr)
        } else {
            self.ip_addr.clone()
        };
        format!("http://{}:{}{}", host, self.port, self.context_path)
    }
}

/// 客户端级配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// 命名空间 ID，空字符串表示 public
    pub namespace_id: String,
    /// 单次请求超时（毫秒）
    pub timeout_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url() {
        let server = ServerConfig::new("127.0.0.1", 8848, "/nacos");
        assert_eq!(server.base_url(), "http://127.0.0.1:8848/nacos");

        let server = ServerConfig::new("::1", 9000, "/nacos");
        assert_eq!(server.base_url(), "http://[::1]:9000/nacos");
    }
}
