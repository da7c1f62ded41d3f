//! Nacos 服务注册发现实现

use async_trait::async_trait;
use futures::future::join_all;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::address::{first_node_endpoint, join_host_port, resolve_addresses};
use super::options::{DeregisterOptions, GetOptions, ListOptions, RegisterOptions, WatchOptions};
use super::trait_def::{Registry, Watcher};
use super::watcher::{NacosWatcher, WatchListener};
use crate::config::{DEFAULT_TIMEOUT, EffectiveConfig, RegistryOption, RegistryOptions};
use crate::error::{RegistryError, Result};
use crate::naming::{
    ClientConfig, DeregisterInstanceParam, EventListener, GetAllServiceInfoParam,
    GetServiceParam, Instance, NamingClient, NamingClientFactory, RegisterInstanceParam,
    SubscribeParam,
};
use crate::types::{Node, Service};

/// 后端标识
pub const REGISTRY_NAME: &str = "nacos";

/// 实例元数据中保存服务版本的键
pub const VERSION_KEY: &str = "version";

struct RegistryState {
    options: RegistryOptions,
    effective: Option<EffectiveConfig>,
    client: Option<Arc<dyn NamingClient>>,
}

/// Nacos 服务注册发现
///
/// 不缓存任何已注册实例，每个操作都是一次到命名服务的往返。
/// 客户端句柄在 `init` 时整体替换，进行中的调用继续使用旧句柄。
pub struct NacosRegistry {
    factory: Arc<dyn NamingClientFactory>,
    state: RwLock<RegistryState>,
}

impl NacosRegistry {
    /// 使用 HTTP 命名客户端创建
    ///
    /// 初始配置失败时只记录日志，之后的操作返回 `NotInitialized`，
    /// 直到一次成功的 `init`。
    #[cfg(feature = "http")]
    pub fn new(opts: Vec<RegistryOption>) -> Self {
        Self::with_factory(Arc::new(crate::naming::HttpNamingClientFactory), opts)
    }

    /// 使用自定义命名客户端工厂创建
    pub fn with_factory(factory: Arc<dyn NamingClientFactory>, opts: Vec<RegistryOption>) -> Self {
        let registry = Self::empty(factory);
        if let Err(e) = registry.configure(opts) {
            error!("Failed to initialize nacos registry: {}", e);
        }
        registry
    }

    /// 与 `with_factory` 相同，但初始配置失败时直接返回错误
    pub fn try_with_factory(
        factory: Arc<dyn NamingClientFactory>,
        opts: Vec<RegistryOption>,
    ) -> Result<Self> {
        let registry = Self::empty(factory);
        registry.configure(opts)?;
        Ok(registry)
    }

    fn empty(factory: Arc<dyn NamingClientFactory>) -> Self {
        Self {
            factory,
            state: RwLock::new(RegistryState {
                options: RegistryOptions::default(),
                effective: None,
                client: None,
            }),
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// 合并选项并构造新的命名客户端
    ///
    /// 新客户端完全构造成功后才替换旧句柄；失败时保留之前的状态。
    fn configure<I>(&self, opts: I) -> Result<()>
    where
        I: IntoIterator<Item = RegistryOption>,
    {
        let mut options = self.read_state().options.clone();
        options.apply(opts);

        let namespace = options.namespace.clone().unwrap_or_default();
        let servers = resolve_addresses(&options.addrs);
        if options.timeout.is_zero() {
            options.timeout = DEFAULT_TIMEOUT;
        }

        let client_config = ClientConfig {
            namespace_id: namespace.clone(),
            timeout_ms: u64::try_from(options.timeout.as_millis()).unwrap_or(u64::MAX),
        };
        let client = self
            .factory
            .create_naming_client(&client_config, &servers)
            .map_err(RegistryError::Configuration)?;

        info!(
            "Nacos registry configured: servers={}, namespace={:?}, timeout={:?}",
            servers.len(),
            namespace,
            options.timeout
        );

        let effective = EffectiveConfig {
            servers,
            timeout: options.timeout,
            namespace,
        };
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        *state = RegistryState {
            options,
            effective: Some(effective),
            client: Some(client),
        };
        Ok(())
    }

    /// 当前生效的客户端配置，从未成功初始化时为 `None`
    pub fn effective_config(&self) -> Option<EffectiveConfig> {
        self.read_state().effective.clone()
    }

    fn client(&self) -> Result<Arc<dyn NamingClient>> {
        self.read_state()
            .client
            .clone()
            .ok_or(RegistryError::NotInitialized)
    }

    /// 创建监听会话
    ///
    /// 指定了订阅参数时只订阅该参数；指定了服务名时只订阅该服务；
    /// 否则列出全部服务并逐个订阅。任一订阅失败时释放已成功的订阅并返回错误。
    pub async fn watcher(&self, opts: WatchOptions<SubscribeParam>) -> Result<NacosWatcher> {
        let client = self.client()?;

        let params = match (opts.param, opts.service) {
            (Some(param), _) => vec![param],
            (None, Some(service)) => vec![SubscribeParam {
                service_name: service,
                ..Default::default()
            }],
            (None, None) => {
                Self::list_all_names(client.as_ref(), GetAllServiceInfoParam::default())
                    .await?
                    .into_iter()
                    .map(|service_name| SubscribeParam {
                        service_name,
                        ..Default::default()
                    })
                    .collect()
            }
        };

        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let listener: Arc<dyn EventListener> =
            Arc::new(WatchListener::new(tx.clone(), cancel.clone()));

        let results = join_all(
            params
                .into_iter()
                .map(|param| client.subscribe(param, listener.clone())),
        )
        .await;

        let mut tokens = Vec::with_capacity(results.len());
        let mut first_err = None;
        for result in results {
            match result {
                Ok(token) => tokens.push(token),
                Err(e) if first_err.is_none() => first_err = Some(e),
                Err(e) => warn!("Additional subscribe failure: {}", e),
            }
        }

        let watcher = NacosWatcher::new(client, tx, rx, cancel, tokens);
        if let Some(e) = first_err {
            watcher.stop().await;
            return Err(e.into());
        }

        debug!("Watching {} service(s)", watcher.subscription_count());
        Ok(watcher)
    }

    /// 先用零值分页参数取总数，再按总数一次取完
    ///
    /// 两次调用之间服务目录发生变化时，第二次可能多读或少读。
    async fn list_all_names(
        client: &dyn NamingClient,
        mut param: GetAllServiceInfoParam,
    ) -> Result<Vec<String>> {
        let first_page = client.get_all_services_info(param.clone()).await?;
        param.page_no = 1;
        param.page_size = u32::try_from(first_page.count.max(0)).unwrap_or(u32::MAX);

        let services = client.get_all_services_info(param).await?;
        Ok(services.doms)
    }

    /// 逐页读取，直到读到不满一页或达到服务总数
    async fn list_names_paged(client: &dyn NamingClient, page_size: u32) -> Result<Vec<String>> {
        let page_size = page_size.max(1);
        let mut names = Vec::new();
        let mut page_no = 1;

        loop {
            let page = client
                .get_all_services_info(GetAllServiceInfoParam {
                    page_no,
                    page_size,
                    ..Default::default()
                })
                .await?;
            let fetched = page.doms.len();
            names.extend(page.doms);

            if fetched < page_size as usize || names.len() as i64 >= page.count {
                break;
            }
            page_no += 1;
        }

        Ok(names)
    }
}

/// 把一个后端实例转换为只含一个节点的服务描述
pub(crate) fn instance_to_service(instance: &Instance) -> Service {
    Service {
        name: instance.service_name.clone(),
        version: instance
            .metadata
            .get(VERSION_KEY)
            .cloned()
            .unwrap_or_default(),
        metadata: instance.metadata.clone(),
        nodes: vec![Node {
            id: instance.instance_id.clone(),
            address: join_host_port(&instance.ip, instance.port),
            metadata: instance.metadata.clone(),
        }],
    }
}

#[async_trait]
impl Registry for NacosRegistry {
    type RegisterParam = RegisterInstanceParam;
    type DeregisterParam = DeregisterInstanceParam;
    type GetParam = GetServiceParam;
    type ListParam = GetAllServiceInfoParam;
    type WatchParam = SubscribeParam;

    async fn init(&self, opts: Vec<RegistryOption>) -> Result<()> {
        self.configure(opts)
    }

    fn options(&self) -> RegistryOptions {
        self.read_state().options.clone()
    }

    /// 注册 `service.nodes[0]`
    ///
    /// 未提供覆盖参数时，会把 `service.version` 写入第一个节点的元数据
    /// （键为 `version`），调用方传入的服务描述因此会被修改。
    async fn register(
        &self,
        service: &mut Service,
        opts: RegisterOptions<RegisterInstanceParam>,
    ) -> Result<()> {
        let client = self.client()?;

        let param = match opts.param {
            Some(param) => param,
            None => {
                let (ip, port) = first_node_endpoint(service)?;
                let version = service.version.clone();
                let node = &mut service.nodes[0];
                node.metadata.insert(VERSION_KEY.to_string(), version);

                RegisterInstanceParam {
                    ip,
                    port,
                    metadata: node.metadata.clone(),
                    service_name: service.name.clone(),
                    enable: true,
                    healthy: true,
                    weight: 1.0,
                    ephemeral: true,
                    ..Default::default()
                }
            }
        };

        let (name, ip, port) = (param.service_name.clone(), param.ip.clone(), param.port);
        client.register_instance(param).await?;
        info!("Service registered with Nacos: {} at {}", name, join_host_port(&ip, port));
        Ok(())
    }

    /// 注销 `service.nodes[0]`
    async fn deregister(
        &self,
        service: &Service,
        opts: DeregisterOptions<DeregisterInstanceParam>,
    ) -> Result<()> {
        let client = self.client()?;

        let param = match opts.param {
            Some(param) => param,
            None => {
                let (ip, port) = first_node_endpoint(service)?;
                DeregisterInstanceParam {
                    ip,
                    port,
                    service_name: service.name.clone(),
                    ..Default::default()
                }
            }
        };

        let (name, ip, port) = (param.service_name.clone(), param.ip.clone(), param.port);
        client.deregister_instance(param).await?;
        info!("Service deregistered from Nacos: {} at {}", name, join_host_port(&ip, port));
        Ok(())
    }

    /// 每个实例单独转换为一个服务描述，不按服务名聚合
    async fn get_service(
        &self,
        name: &str,
        opts: GetOptions<GetServiceParam>,
    ) -> Result<Vec<Service>> {
        let client = self.client()?;
        let param = opts.param.unwrap_or_else(|| GetServiceParam {
            service_name: name.to_string(),
            ..Default::default()
        });

        let detail = client.get_service(param).await?;
        debug!("Discovered {} instance(s) for {}", detail.hosts.len(), name);
        Ok(detail.hosts.iter().map(instance_to_service).collect())
    }

    async fn list_services(
        &self,
        opts: ListOptions<GetAllServiceInfoParam>,
    ) -> Result<Vec<Service>> {
        let client = self.client()?;

        let names = match (opts.param, opts.page_size) {
            (Some(param), _) => client.get_all_services_info(param).await?.doms,
            (None, Some(page_size)) => Self::list_names_paged(client.as_ref(), page_size).await?,
            (None, None) => {
                Self::list_all_names(client.as_ref(), GetAllServiceInfoParam::default()).await?
            }
        };

        Ok(names
            .into_iter()
            .map(|name| Service {
                name,
                ..Default::default()
            })
            .collect())
    }

    async fn watch(&self, opts: WatchOptions<SubscribeParam>) -> Result<Box<dyn Watcher>> {
        Ok(Box::new(self.watcher(opts).await?))
    }

    fn name(&self) -> &'static str {
        REGISTRY_NAME
    }
}

impl fmt::Display for NacosRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REGISTRY_NAME)
    }
}
