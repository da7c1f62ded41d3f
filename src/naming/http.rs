//! 基于 Nacos v1 Open API 的 HTTP 命名客户端

use async_trait::async_trait;
use reqwest::Method;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::model::grouped_service_name;
use super::{
    ClientConfig, DeregisterInstanceParam, EventListener, GetAllServiceInfoParam,
    GetServiceParam, NamingClient, NamingClientFactory, NamingError, NamingEvent,
    RegisterInstanceParam, Result, ServerConfig, ServiceDetail, ServiceList, SubscribeParam,
    SubscriptionToken,
};

const INSTANCE_PATH: &str = "/v1/ns/instance";
const INSTANCE_LIST_PATH: &str = "/v1/ns/instance/list";
const INSTANCE_BEAT_PATH: &str = "/v1/ns/instance/beat";
const SERVICE_LIST_PATH: &str = "/v1/ns/service/list";

/// 临时实例心跳间隔
const BEAT_INTERVAL: Duration = Duration::from_secs(5);

/// 订阅轮询间隔上下限（毫秒）
const MIN_POLL_MILLIS: u64 = 1_000;
const MAX_POLL_MILLIS: u64 = 10_000;

const DEFAULT_PAGE_NO: u32 = 1;
const DEFAULT_PAGE_SIZE: u32 = 10;

type Params = Vec<(&'static str, String)>;

/// 创建 [`HttpNamingClient`] 的工厂
#[derive(Debug, Clone, Default)]
pub struct HttpNamingClientFactory;

impl NamingClientFactory for HttpNamingClientFactory {
    fn create_naming_client(
        &self,
        client_config: &ClientConfig,
        server_configs: &[ServerConfig],
    ) -> Result<Arc<dyn NamingClient>> {
        let client = HttpNamingClient::new(client_config, server_configs)?;
        Ok(Arc::new(client))
    }
}

/// 请求发送层：按游标轮转的服务端列表依次尝试
#[derive(Clone)]
struct Transport {
    http: reqwest::Client,
    servers: Arc<[ServerConfig]>,
    cursor: Arc<AtomicUsize>,
    namespace_id: String,
}

impl Transport {
    async fn request(&self, method: Method, path: &str, mut params: Params) -> Result<String> {
        if !self.namespace_id.is_empty() {
            params.push(("namespaceId", self.namespace_id.clone()));
        }

        let total = self.servers.len();
        let start = self.cursor.fetch_add(1, Ordering::Relaxed);
        let mut last_err = None;

        for offset in 0..total {
            let server = &self.servers[(start + offset) % total];
            let url = format!("{}{}", server.base_url(), path);

            // 读取响应体失败与发送失败同样视为该服务端不可用
            let response = match self
                .http
                .request(method.clone(), &url)
                .query(&params)
                .send()
                .await
            {
                Ok(resp) => {
                    let status = resp.status();
                    resp.text().await.map(|body| (status, body))
                }
                Err(e) => Err(e),
            };

            match response {
                Ok((status, body)) => {
                    if status.is_success() {
                        return Ok(body);
                    }
                    let err = NamingError::Server {
                        status: status.as_u16(),
                        body,
                    };
                    if !status.is_server_error() {
                        return Err(err);
                    }
                    warn!("Naming server {} returned {}, trying next", url, status);
                    last_err = Some(err);
                }
                Err(e) => {
                    warn!("Request to naming server {} failed: {}", url, e);
                    last_err = Some(e.into());
                }
            }
        }

        Err(last_err.unwrap_or(NamingError::NoServers))
    }

    async fn query_instances(&self, param: &GetServiceParam) -> Result<ServiceDetail> {
        let params = vec![
            (
                "serviceName",
                grouped_service_name(&param.service_name, &param.group_name),
            ),
            ("groupName", group_or_default(&param.group_name)),
            ("clusters", param.clusters.join(",")),
            ("healthyOnly", "false".to_string()),
        ];
        let body = self.request(Method::GET, INSTANCE_LIST_PATH, params).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BeatInfo<'a> {
    service_name: &'a str,
    ip: &'a str,
    port: u64,
    weight: f64,
    cluster: &'a str,
    metadata: &'a HashMap<String, String>,
    scheduled: bool,
}

/// Nacos HTTP 命名客户端
///
/// 临时实例注册后会启动心跳任务，订阅通过轮询实例列表实现。
/// 客户端被丢弃时所有后台任务随之终止。
pub struct HttpNamingClient {
    transport: Transport,
    beats: Mutex<HashMap<String, JoinHandle<()>>>,
    subscriptions: Mutex<HashMap<u64, JoinHandle<()>>>,
    next_subscription_id: AtomicU64,
}

impl HttpNamingClient {
    pub fn new(client_config: &ClientConfig, server_configs: &[ServerConfig]) -> Result<Self> {
        if server_configs.is_empty() {
            return Err(NamingError::NoServers);
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(client_config.timeout_ms))
            .build()?;

        info!(
            "Naming client created: servers={:?}, namespace={:?}",
            server_configs
                .iter()
                .map(ServerConfig::base_url)
                .collect::<Vec<_>>(),
            client_config.namespace_id
        );

        Ok(Self {
            transport: Transport {
                http,
                servers: server_configs.to_vec().into(),
                cursor: Arc::new(AtomicUsize::new(0)),
                namespace_id: client_config.namespace_id.clone(),
            },
            beats: Mutex::new(HashMap::new()),
            subscriptions: Mutex::new(HashMap::new()),
            next_subscription_id: AtomicU64::new(1),
        })
    }

    fn start_beat(&self, param: &RegisterInstanceParam, grouped_name: &str) {
        let key = beat_key(grouped_name, &param.ip, param.port);
        let beat = BeatInfo {
            service_name: grouped_name,
            ip: &param.ip,
            port: param.port,
            weight: param.weight,
            cluster: &param.cluster_name,
            metadata: &param.metadata,
            scheduled: false,
        };
        let beat = match serde_json::to_string(&beat) {
            Ok(beat) => beat,
            Err(e) => {
                warn!("Failed to encode beat for {}: {}", key, e);
                return;
            }
        };
        let params: Params = vec![
            ("serviceName", grouped_name.to_string()),
            ("groupName", group_or_default(&param.group_name)),
            ("beat", beat),
        ];
        let transport = self.transport.clone();
        let task_key = key.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(BEAT_INTERVAL).await;
                match transport
                    .request(Method::PUT, INSTANCE_BEAT_PATH, params.clone())
                    .await
                {
                    Ok(_) => debug!("Beat sent for {}", task_key),
                    Err(e) => warn!("Beat failed for {}: {}", task_key, e),
                }
            }
        });

        let mut beats = self.beats.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = beats.insert(key, handle) {
            previous.abort();
        }
    }

    fn stop_beat(&self, grouped_name: &str, ip: &str, port: u64) {
        let key = beat_key(grouped_name, ip, port);
        let mut beats = self.beats.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = beats.remove(&key) {
            handle.abort();
        }
    }
}

#[async_trait]
impl NamingClient for HttpNamingClient {
    async fn register_instance(&self, param: RegisterInstanceParam) -> Result<bool> {
        if param.service_name.is_empty() {
            return Err(NamingError::InvalidParam("serviceName is empty".to_string()));
        }
        let grouped_name = grouped_service_name(&param.service_name, &param.group_name);

        let mut params: Params = vec![
            ("serviceName", grouped_name.clone()),
            ("groupName", group_or_default(&param.group_name)),
            ("ip", param.ip.clone()),
            ("port", param.port.to_string()),
            ("weight", param.weight.to_string()),
            ("enabled", param.enable.to_string()),
            ("healthy", param.healthy.to_string()),
            ("ephemeral", param.ephemeral.to_string()),
            ("metadata", serde_json::to_string(&param.metadata)?),
        ];
        if !param.cluster_name.is_empty() {
            params.push(("clusterName", param.cluster_name.clone()));
        }

        let body = self
            .transport
            .request(Method::POST, INSTANCE_PATH, params)
            .await?;

        if param.ephemeral {
            self.start_beat(&param, &grouped_name);
        }

        info!(
            "Instance registered: {} at {}:{}",
            grouped_name, param.ip, param.port
        );
        Ok(body.trim() == "ok")
    }

    async fn deregister_instance(&self, param: DeregisterInstanceParam) -> Result<bool> {
        if param.service_name.is_empty() {
            return Err(NamingError::InvalidParam("serviceName is empty".to_string()));
        }
        let grouped_name = grouped_service_name(&param.service_name, &param.group_name);

        let mut params: Params = vec![
            ("serviceName", grouped_name.clone()),
            ("groupName", group_or_default(&param.group_name)),
            ("ip", param.ip.clone()),
            ("port", param.port.to_string()),
            ("ephemeral", param.ephemeral.to_string()),
        ];
        if !param.cluster.is_empty() {
            params.push(("clusterName", param.cluster.clone()));
        }

        let body = self
            .transport
            .request(Method::DELETE, INSTANCE_PATH, params)
            .await?;
        // 注销成功之后才停止心跳，失败时实例仍保持存活
        self.stop_beat(&grouped_name, &param.ip, param.port);

        info!(
            "Instance deregistered: {} at {}:{}",
            grouped_name, param.ip, param.port
        );
        Ok(body.trim() == "ok")
    }

    async fn get_service(&self, param: GetServiceParam) -> Result<ServiceDetail> {
        if param.service_name.is_empty() {
            return Err(NamingError::InvalidParam("serviceName is empty".to_string()));
        }
        self.transport.query_instances(&param).await
    }

    async fn get_all_services_info(&self, param: GetAllServiceInfoParam) -> Result<ServiceList> {
        let page_no = if param.page_no == 0 {
            DEFAULT_PAGE_NO
        } else {
            param.page_no
        };
        let page_size = if param.page_size == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            param.page_size
        };

        let mut params: Params = vec![
            ("pageNo", page_no.to_string()),
            ("pageSize", page_size.to_string()),
            ("groupName", group_or_default(&param.group_name)),
        ];
        // 参数里显式指定的命名空间优先于客户端配置
        if !param.namespace_id.is_empty() {
            params.push(("namespaceId", param.namespace_id.clone()));
        }

        let transport = if param.namespace_id.is_empty() {
            self.transport.clone()
        } else {
            Transport {
                namespace_id: String::new(),
                ..self.transport.clone()
            }
        };
        let body = transport
            .request(Method::GET, SERVICE_LIST_PATH, params)
            .await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn subscribe(
        &self,
        param: SubscribeParam,
        listener: Arc<dyn EventListener>,
    ) -> Result<SubscriptionToken> {
        if param.service_name.is_empty() {
            return Err(NamingError::InvalidParam("serviceName is empty".to_string()));
        }

        let id = self.next_subscription_id.fetch_add(1, Ordering::Relaxed);
        let token = SubscriptionToken {
            id,
            service_name: param.service_name.clone(),
            group_name: param.group_name.clone(),
        };

        let transport = self.transport.clone();
        let query = GetServiceParam {
            clusters: param.clusters.clone(),
            service_name: param.service_name.clone(),
            group_name: param.group_name.clone(),
        };

        let handle = tokio::spawn(async move {
            let mut last_hosts = None;
            loop {
                let mut poll_millis = MAX_POLL_MILLIS;
                match transport.query_instances(&query).await {
                    Ok(detail) => {
                        if detail.cache_millis > 0 {
                            poll_millis = detail.cache_millis.clamp(MIN_POLL_MILLIS, MAX_POLL_MILLIS);
                        }
                        if last_hosts.as_ref() != Some(&detail.hosts) {
                            listener.on_event(NamingEvent {
                                service_name: query.service_name.clone(),
                                group_name: query.group_name.clone(),
                                clusters: query.clusters.clone(),
                                instances: detail.hosts.clone(),
                            });
                            last_hosts = Some(detail.hosts);
                        }
                    }
                    Err(e) => warn!("Subscription poll failed for {}: {}", query.service_name, e),
                }
                tokio::time::sleep(Duration::from_millis(poll_millis)).await;
            }
        });

        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, handle);

        debug!(
            "Subscribed to service: group={}, service={}, id={}",
            token.group_name, token.service_name, id
        );
        Ok(token)
    }

    async fn unsubscribe(&self, token: &SubscriptionToken) -> Result<()> {
        let handle = self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&token.id);

        if let Some(handle) = handle {
            handle.abort();
            debug!(
                "Unsubscribed from service: group={}, service={}, id={}",
                token.group_name, token.service_name, token.id
            );
        }
        Ok(())
    }
}

impl Drop for HttpNamingClient {
    fn drop(&mut self) {
        let beats = self.beats.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (_, handle) in beats.drain() {
            handle.abort();
        }
        let subscriptions = self
            .subscriptions
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        for (_, handle) in subscriptions.drain() {
            handle.abort();
        }
    }
}

fn group_or_default(group_name: &str) -> String {
    if group_name.is_empty() {
        super::model::DEFAULT_GROUP.to_string()
    } else {
        group_name.to_string()
    }
}

fn beat_key(grouped_name: &str, ip: &str, port: u64) -> String {
    format!("{}#{}#{}", grouped_name, ip, port)
}
