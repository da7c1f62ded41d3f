//! Nacos 服务变化监听
//!
//! 后端每次回调都带着完整的实例列表，这里与本次会话上一次看到的列表比较，
//! 拆成逐个实例的 create / update / delete 事件。

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::nacos::instance_to_service;
use super::trait_def::{WatchAction, WatchResult, Watcher};
use crate::error::{RegistryError, Result};
use crate::naming::model::grouped_service_name;
use crate::naming::{EventListener, Instance, NamingClient, NamingEvent, SubscriptionToken};

/// 订阅回调，把命名事件转换为监听结果
pub(crate) struct WatchListener {
    tx: mpsc::UnboundedSender<WatchResult>,
    cancel: CancellationToken,
    snapshots: Mutex<HashMap<String, Vec<Instance>>>,
}

impl WatchListener {
    pub(crate) fn new(tx: mpsc::UnboundedSender<WatchResult>, cancel: CancellationToken) -> Self {
        Self {
            tx,
            cancel,
            snapshots: Mutex::new(HashMap::new()),
        }
    }
}

impl EventListener for WatchListener {
    fn on_event(&self, event: NamingEvent) {
        if self.cancel.is_cancelled() {
            return;
        }

        let key = grouped_service_name(&event.service_name, &event.group_name);
        let results = {
            let mut snapshots = self
                .snapshots
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let previous = snapshots.insert(key.clone(), event.instances.clone());
            diff_instances(previous.as_deref(), &event.instances)
        };

        debug!("Watch event for {}: {} change(s)", key, results.len());
        for result in results {
            if self.tx.send(result).is_err() {
                warn!("Watch receiver dropped, discarding events for {}", key);
                break;
            }
        }
    }
}

fn instance_key(instance: &Instance) -> String {
    if instance.instance_id.is_empty() {
        format!("{}#{}", instance.ip, instance.port)
    } else {
        instance.instance_id.clone()
    }
}

/// 计算两次实例列表之间的差异
///
/// 没有上一次列表时所有实例都视为新建。
pub(crate) fn diff_instances(previous: Option<&[Instance]>, current: &[Instance]) -> Vec<WatchResult> {
    let Some(previous) = previous else {
        return current
            .iter()
            .map(|instance| WatchResult {
                action: WatchAction::Create,
                service: instance_to_service(instance),
            })
            .collect();
    };

    let before: HashMap<String, &Instance> = previous
        .iter()
        .map(|instance| (instance_key(instance), instance))
        .collect();
    let mut results = Vec::new();

    for instance in current {
        let action = match before.get(&instance_key(instance)) {
            None => Some(WatchAction::Create),
            Some(old) if *old != instance => Some(WatchAction::Update),
            Some(_) => None,
        };
        if let Some(action) = action {
            results.push(WatchResult {
                action,
                service: instance_to_service(instance),
            });
        }
    }

    let after: HashMap<String, &Instance> = current
        .iter()
        .map(|instance| (instance_key(instance), instance))
        .collect();
    for instance in previous {
        if !after.contains_key(&instance_key(instance)) {
            results.push(WatchResult {
                action: WatchAction::Delete,
                service: instance_to_service(instance),
            });
        }
    }

    results
}

struct WatchShared {
    client: Arc<dyn NamingClient>,
    cancel: CancellationToken,
    tokens: Mutex<Vec<SubscriptionToken>>,
}

impl WatchShared {
    async fn stop(&self) {
        self.cancel.cancel();

        let tokens = std::mem::take(
            &mut *self.tokens.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for token in tokens {
            if let Err(e) = self.client.unsubscribe(&token).await {
                warn!(
                    "Failed to unsubscribe from {}@@{}: {}",
                    token.group_name, token.service_name, e
                );
            }
        }
    }
}

/// Nacos 监听会话
pub struct NacosWatcher {
    rx: mpsc::UnboundedReceiver<WatchResult>,
    // 没有任何订阅持有监听器时通道也保持打开，结束只由 stop 决定
    _tx: mpsc::UnboundedSender<WatchResult>,
    shared: Arc<WatchShared>,
}

/// 可跨任务停止监听的句柄
#[derive(Clone)]
pub struct WatchHandle {
    shared: Arc<WatchShared>,
}

impl WatchHandle {
    pub async fn stop(&self) {
        self.shared.stop().await;
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }
}

impl NacosWatcher {
    pub(crate) fn new(
        client: Arc<dyn NamingClient>,
        tx: mpsc::UnboundedSender<WatchResult>,
        rx: mpsc::UnboundedReceiver<WatchResult>,
        cancel: CancellationToken,
        tokens: Vec<SubscriptionToken>,
    ) -> Self {
        Self {
            rx,
            _tx: tx,
            shared: Arc::new(WatchShared {
                client,
                cancel,
                tokens: Mutex::new(tokens),
            }),
        }
    }

    pub fn handle(&self) -> WatchHandle {
        WatchHandle {
            shared: self.shared.clone(),
        }
    }

    /// 当前持有的订阅数
    pub fn subscription_count(&self) -> usize {
        self.shared
            .tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl Watcher for NacosWatcher {
    async fn next(&mut self) -> Result<WatchResult> {
        tokio::select! {
            biased;
            _ = self.shared.cancel.cancelled() => Err(RegistryError::WatcherStopped),
            result = self.rx.recv() => result.ok_or(RegistryError::WatcherStopped),
        }
    }

    async fn stop(&self) {
        self.shared.stop().await;
    }
}

impl Drop for NacosWatcher {
    fn drop(&mut self) {
        self.shared.cancel.cancel();
        // 未显式 stop 时在后台释放订阅
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let shared = self.shared.clone();
            runtime.spawn(async move { shared.stop().await });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(id: &str, port: u64, version: &str) -> Instance {
        Instance {
            instance_id: id.to_string(),
            ip: "10.0.0.1".to_string(),
            port,
            service_name: "orders".to_string(),
            metadata: HashMap::from([("version".to_string(), version.to_string())]),
            ..Default::default()
        }
    }

    #[test]
    fn test_diff_first_snapshot_creates_all() {
        let current = vec![instance("a", 1, "1"), instance("b", 2, "1")];
        let results = diff_instances(None, &current);
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.action == WatchAction::Create));
    }

    #[test]
    fn test_diff_create_update_delete() {
        let previous = vec![instance("a", 1, "1"), instance("b", 2, "1")];
        let current = vec![instance("a", 1, "2"), instance("c", 3, "1")];

        let results = diff_instances(Some(previous.as_slice()), &current);
        let actions: Vec<(WatchAction, String)> = results
            .iter()
            .map(|r| (r.action, r.service.nodes[0].id.clone()))
            .collect();

        assert_eq!(
            actions,
            vec![
                (WatchAction::Update, "a".to_string()),
                (WatchAction::Create, "c".to_string()),
                (WatchAction::Delete, "b".to_string()),
            ]
        );
        assert_eq!(results[0].service.version, "2");
    }

    #[test]
    fn test_diff_unchanged_is_silent() {
        let previous = vec![instance("a", 1, "1")];
        assert!(diff_instances(Some(previous.as_slice()), &previous).is_empty());
    }

    #[test]
    fn test_listener_ignores_events_after_cancel() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let listener = WatchListener::new(tx, cancel.clone());

        cancel.cancel();
        listener.on_event(NamingEvent {
            service_name: "orders".to_string(),
            group_name: String::new(),
            clusters: vec![],
            instances: vec![instance("a", 1, "1")],
        });

        assert!(rx.try_recv().is_err());
    }
}
