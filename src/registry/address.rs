//! 地址解析
//!
//! 把 `host` / `host:port` 形式的字符串规范化为命名服务端配置，
//! 以及从服务描述中取出第一个节点的端点。

use thiserror::Error;
use tracing::warn;

use crate::error::{RegistryError, Result};
use crate::naming::ServerConfig;
use crate::types::Service;

/// 未指定端口时使用的 Nacos 默认端口
pub const DEFAULT_PORT: u64 = 8848;

/// Nacos 服务端的固定上下文路径
pub const DEFAULT_CONTEXT_PATH: &str = "/nacos";

/// `host:port` 拆分错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddrError {
    #[error("missing port in address {0}")]
    MissingPort(String),

    #[error("too many colons in address {0}")]
    TooManyColons(String),

    #[error("missing ']' in address {0}")]
    MissingBracket(String),

    #[error("unexpected '[' in address {0}")]
    UnexpectedOpenBracket(String),

    #[error("unexpected ']' in address {0}")]
    UnexpectedCloseBracket(String),
}

/// 拆分 `host:port`，IPv6 主机必须写成 `[host]:port`
///
/// 返回的主机不含方括号，端口不做数值校验。
pub fn split_host_port(addr: &str) -> std::result::Result<(&str, &str), AddrError> {
    let last_colon = addr
        .rfind(':')
        .ok_or_else(|| AddrError::MissingPort(addr.to_string()))?;

    let (host, host_start, host_end) = if addr.starts_with('[') {
        let end = addr
            .find(']')
            .ok_or_else(|| AddrError::MissingBracket(addr.to_string()))?;
        if end + 1 == addr.len() {
            return Err(AddrError::MissingPort(addr.to_string()));
        }
        if end + 1 != last_colon {
            return Err(if addr.as_bytes()[end + 1] == b':' {
                AddrError::TooManyColons(addr.to_string())
            } else {
                AddrError::MissingPort(addr.to_string())
            });
        }
        (&addr[1..end], 1, end + 1)
    } else {
        let host = &addr[..last_colon];
        if host.contains(':') {
            return Err(AddrError::TooManyColons(addr.to_string()));
        }
        (host, 0, 0)
    };

    if addr[host_start..].contains('[') {
        return Err(AddrError::UnexpectedOpenBracket(addr.to_string()));
    }
    if addr[host_end..].contains(']') {
        return Err(AddrError::UnexpectedCloseBracket(addr.to_string()));
    }

    Ok((host, &addr[last_colon + 1..]))
}

/// 拼接 `host:port`，IPv6 主机自动加方括号
pub fn join_host_port(host: &str, port: u64) -> String {
    if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

/// 只接受纯十进制数字
pub fn parse_port(port: &str) -> Option<u64> {
    if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    port.parse().ok()
}

/// 解析服务端地址列表
///
/// 无端口的条目使用 [`DEFAULT_PORT`]；端口非法或无法拆分的条目被跳过，
/// 不影响其余条目。输出顺序与输入一致，不去重。
pub fn resolve_addresses<S: AsRef<str>>(addrs: &[S]) -> Vec<ServerConfig> {
    let mut servers = Vec::with_capacity(addrs.len());

    for address in addrs {
        let address = address.as_ref();
        match split_host_port(address) {
            Ok((host, port)) => match parse_port(port) {
                Some(port) if !host.is_empty() => {
                    servers.push(ServerConfig::new(host, port, DEFAULT_CONTEXT_PATH));
                }
                _ => warn!("Skipping unresolvable registry address {:?}", address),
            },
            Err(AddrError::MissingPort(_)) => match bare_host(address) {
                Some(host) => {
                    servers.push(ServerConfig::new(host, DEFAULT_PORT, DEFAULT_CONTEXT_PATH));
                }
                None => warn!("Skipping unresolvable registry address {:?}", address),
            },
            Err(e) => warn!("Skipping unresolvable registry address: {}", e),
        }
    }

    servers
}

/// 无端口地址中的主机部分，`[::1]` 去掉方括号
fn bare_host(address: &str) -> Option<&str> {
    let host = match address.strip_prefix('[') {
        Some(rest) => rest.strip_suffix(']')?,
        None => address,
    };
    if host.is_empty() || host.contains('[') || host.contains(']') {
        return None;
    }
    Some(host)
}

/// 取出第一个节点的主机和端口
///
/// 注册和注销都只使用 `nodes[0]`，多节点服务需要逐个节点调用。
pub fn first_node_endpoint(service: &Service) -> Result<(String, u64)> {
    let node = service
        .nodes
        .first()
        .ok_or_else(|| RegistryError::malformed("you must provide at least one node"))?;

    let (host, port) = split_host_port(&node.address)
        .map_err(|e| RegistryError::malformed(e.to_string()))?;
    if host.is_empty() {
        return Err(RegistryError::malformed(format!(
            "empty host in node address {}",
            node.address
        )));
    }
    let port = parse_port(port).ok_or_else(|| {
        RegistryError::malformed(format!("invalid port in node address {}", node.address))
    })?;

    Ok((host.to_string(), port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Node;

    #[test]
    fn test_split_host_port() {
        assert_eq!(split_host_port("h:9000"), Ok(("h", "9000")));
        assert_eq!(split_host_port("[::1]:8848"), Ok(("::1", "8848")));
        assert_eq!(split_host_port(":80"), Ok(("", "80")));
        assert!(matches!(split_host_port("h"), Err(AddrError::MissingPort(_))));
        assert!(matches!(split_host_port("[::1]"), Err(AddrError::MissingPort(_))));
        assert!(matches!(split_host_port("::1"), Err(AddrError::TooManyColons(_))));
        assert!(matches!(split_host_port("[::1:80"), Err(AddrError::MissingBracket(_))));
        assert!(matches!(
            split_host_port("h]:80"),
            Err(AddrError::UnexpectedCloseBracket(_))
        ));
    }

    #[test]
    fn test_join_host_port() {
        assert_eq!(join_host_port("10.0.0.1", 9000), "10.0.0.1:9000");
        assert_eq!(join_host_port("fe80::1", 9000), "[fe80::1]:9000");
    }

    #[test]
    fn test_parse_port() {
        assert_eq!(parse_port("8848"), Some(8848));
        assert_eq!(parse_port(""), None);
        assert_eq!(parse_port("+80"), None);
        assert_eq!(parse_port("-1"), None);
        assert_eq!(parse_port("bad"), None);
    }

    #[test]
    fn test_resolve_host_without_port() {
        let servers = resolve_addresses(&["h"]);
        assert_eq!(servers, vec![ServerConfig::new("h", 8848, "/nacos")]);
    }

    #[test]
    fn test_resolve_host_with_port() {
        let servers = resolve_addresses(&["h:9000"]);
        assert_eq!(servers, vec![ServerConfig::new("h", 9000, "/nacos")]);
    }

    #[test]
    fn test_resolve_bad_port_is_dropped() {
        assert!(resolve_addresses(&["h:bad"]).is_empty());
    }

    #[test]
    fn test_resolve_mixed_list_keeps_order() {
        let servers = resolve_addresses(&["a", "b:7", "c:x"]);
        assert_eq!(
            servers,
            vec![
                ServerConfig::new("a", 8848, "/nacos"),
                ServerConfig::new("b", 7, "/nacos"),
            ]
        );
    }

    #[test]
    fn test_resolve_ipv6() {
        let servers = resolve_addresses(&["[::1]", "[::1]:9000", "::1"]);
        assert_eq!(
            servers,
            vec![
                ServerConfig::new("::1", 8848, "/nacos"),
                ServerConfig::new("::1", 9000, "/nacos"),
            ]
        );
    }

    #[test]
    fn test_resolve_empty_entries() {
        let empty: [&str; 0] = [];
        assert!(resolve_addresses(&empty).is_empty());
        assert!(resolve_addresses(&["", ":8848"]).is_empty());
    }

    #[test]
    fn test_first_node_endpoint() {
        let service = Service::new("orders", "1.0.0")
            .with_node(Node::new("n1", "10.0.0.1:9000"))
            .with_node(Node::new("n2", "10.0.0.2:9000"));
        assert_eq!(
            first_node_endpoint(&service).unwrap(),
            ("10.0.0.1".to_string(), 9000)
        );
    }

    #[test]
    fn test_first_node_endpoint_errors() {
        let no_nodes = Service::new("orders", "1.0.0");
        assert!(first_node_endpoint(&no_nodes).unwrap_err().is_malformed());

        let no_port = Service::new("orders", "1.0.0").with_node(Node::new("n1", "10.0.0.1"));
        assert!(first_node_endpoint(&no_port).unwrap_err().is_malformed());

        let bad_port = Service::new("orders", "1.0.0").with_node(Node::new("n1", "10.0.0.1:x"));
        assert!(first_node_endpoint(&bad_port).unwrap_err().is_malformed());
    }
}
