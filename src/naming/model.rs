//! 命名服务原生参数与响应模型
//!
//! 字段与 Nacos Open API 保持一致（camelCase），调用方可以直接构造这些
//! 参数作为单次调用的覆盖参数。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Nacos 默认分组
pub const DEFAULT_GROUP: &str = "DEFAULT_GROUP";

/// 分组与服务名之间的分隔符
pub const GROUP_SEPARATOR: &str = "@@";

/// 服务实例
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Instance {
    pub instance_id: String,
    pub ip: String,
    pub port: u64,
    pub weight: f64,
    pub healthy: bool,
    pub enabled: bool,
    pub ephemeral: bool,
    pub cluster_name: String,
    pub service_name: String,
    pub metadata: HashMap<String, String>,
}

/// `GetService` 的响应：一个服务下的全部实例
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceDetail {
    pub name: String,
    pub group_name: String,
    pub clusters: String,
    pub cache_millis: u64,
    pub hosts: Vec<Instance>,
    pub last_ref_time: u64,
    pub checksum: String,
}

/// `GetAllServicesInfo` 的响应：一页服务名以及服务总数
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceList {
    pub count: i64,
    pub doms: Vec<String>,
}

/// 注册实例参数
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegisterInstanceParam {
    pub ip: String,
    pub port: u64,
    pub weight: f64,
    pub enable: bool,
    pub healthy: bool,
    pub metadata: HashMap<String, String>,
    pub cluster_name: String,
    pub service_name: String,
    pub group_name: String,
    pub ephemeral: bool,
}

/// 注销实例参数
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeregisterInstanceParam {
    pub ip: String,
    pub port: u64,
    pub cluster: String,
    pub service_name: String,
    pub group_name: String,
    pub ephemeral: bool,
}

/// 查询服务参数
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GetServiceParam {
    pub clusters: Vec<String>,
    pub service_name: String,
    pub group_name: String,
}

/// 分页列出服务名参数
///
/// `page_no` / `page_size` 为 0 时由客户端决定默认值。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GetAllServiceInfoParam {
    pub namespace_id: String,
    pub group_name: String,
    pub page_no: u32,
    pub page_size: u32,
}

/// 订阅参数
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubscribeParam {
    pub service_name: String,
    pub clusters: Vec<String>,
    pub group_name: String,
}

/// 订阅句柄，`unsubscribe` 时交还给客户端
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionToken {
    pub id: u64,
    pub service_name: String,
    pub group_name: String,
}

/// 返回分组后的服务名（`group@@service`），空分组使用 `DEFAULT_GROUP`
pub fn grouped_service_name(service_name: &str, group_name: &str) -> String {
    if service_name.contains(GROUP_SEPARATOR) {
        return service_name.to_string();
    }
    let group = if group_name.is_empty() {
        DEFAULT_GROUP
    } else {
        group_name
    };
    format!("{}{}{}", group, GROUP_SEPARATOR, service_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grouped_service_name() {
        assert_eq!(grouped_service_name("orders", ""), "DEFAULT_GROUP@@orders");
        assert_eq!(grouped_service_name("orders", "billing"), "billing@@orders");
        assert_eq!(
            grouped_service_name("billing@@orders", "other"),
            "billing@@orders"
        );
    }

    #[test]
    fn test_service_detail_from_json() {
        let body = r#"{
            "name": "DEFAULT_GROUP@@orders",
            "groupName": "DEFAULT_GROUP",
            "clusters": "",
            "cacheMillis": 3000,
            "hosts": [{
                "instanceId": "10.0.0.1#9000#DEFAULT#DEFAULT_GROUP@@orders",
                "ip": "10.0.0.1",
                "port": 9000,
                "weight": 1.0,
                "healthy": true,
                "enabled": true,
                "ephemeral": true,
                "clusterName": "DEFAULT",
                "serviceName": "DEFAULT_GROUP@@orders",
                "metadata": {"version": "1.2.3"}
            }],
            "lastRefTime": 1700000000000,
            "checksum": "abc",
            "allIPs": false
        }"#;

        let detail: ServiceDetail = serde_json::from_str(body).unwrap();
        assert_eq!(detail.cache_millis, 3000);
        assert_eq!(detail.hosts.len(), 1);
        let host = &detail.hosts[0];
        assert_eq!(host.ip, "10.0.0.1");
        assert_eq!(host.port, 9000);
        assert_eq!(host.metadata.get("version").map(String::as_str), Some("1.2.3"));
    }

    #[test]
    fn test_service_list_missing_fields() {
        let list: ServiceList = serde_json::from_str(r#"{"count": 2}"#).unwrap();
        assert_eq!(list.count, 2);
        assert!(list.doms.is_empty());
    }
}
