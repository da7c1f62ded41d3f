//! 命名服务订阅事件

use super::model::Instance;

/// 订阅的服务实例列表发生变化时投递的事件
///
/// `instances` 总是变化后的完整列表，不是增量。
#[derive(Clone, Debug)]
pub struct NamingEvent {
    pub service_name: String,
    pub group_name: String,
    pub clusters: Vec<String>,
    pub instances: Vec<Instance>,
}

/// 命名事件监听器
///
/// 回调在客户端的后台任务中执行，不应阻塞。
pub trait EventListener: Send + Sync + 'static {
    fn on_event(&self, event: NamingEvent);
}
