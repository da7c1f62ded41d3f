//! 单次调用选项
//!
//! 每个操作都可以携带一个完整的后端原生参数。参数存在时直接使用，
//! 完全跳过默认参数的推导（不会逐字段合并）。

/// 注册选项
#[derive(Debug, Clone)]
pub struct RegisterOptions<P> {
    pub param: Option<P>,
}

/// 注销选项
#[derive(Debug, Clone)]
pub struct DeregisterOptions<P> {
    pub param: Option<P>,
}

/// 查询选项
#[derive(Debug, Clone)]
pub struct GetOptions<P> {
    pub param: Option<P>,
}

/// 列表选项
#[derive(Debug, Clone)]
pub struct ListOptions<P> {
    pub param: Option<P>,
    /// 设置后逐页读取直到读完，而不是先取总数再一次性读取
    pub page_size: Option<u32>,
}

/// 监听选项
#[derive(Debug, Clone)]
pub struct WatchOptions<P> {
    pub param: Option<P>,
    /// 只监听指定服务，未设置时监听全部服务
    pub service: Option<String>,
}

// 手写 Default，避免对 P 施加 Default 约束
impl<P> Default for RegisterOptions<P> {
    fn default() -> Self {
        Self { param: None }
    }
}

impl<P> Default for DeregisterOptions<P> {
    fn default() -> Self {
        Self { param: None }
    }
}

impl<P> Default for GetOptions<P> {
    fn default() -> Self {
        Self { param: None }
    }
}

impl<P> Default for ListOptions<P> {
    fn default() -> Self {
        Self {
            param: None,
            page_size: None,
        }
    }
}

impl<P> Default for WatchOptions<P> {
    fn default() -> Self {
        Self {
            param: None,
            service: None,
        }
    }
}

impl<P> RegisterOptions<P> {
    pub fn with_param(param: P) -> Self {
        Self { param: Some(param) }
    }
}

impl<P> DeregisterOptions<P> {
    pub fn with_param(param: P) -> Self {
        Self { param: Some(param) }
    }
}

impl<P> GetOptions<P> {
    pub fn with_param(param: P) -> Self {
        Self { param: Some(param) }
    }
}

impl<P> ListOptions<P> {
    pub fn with_param(param: P) -> Self {
        Self {
            param: Some(param),
            page_size: None,
        }
    }

    /// 逐页读取，每页 `page_size` 条
    pub fn paged(page_size: u32) -> Self {
        Self {
            param: None,
            page_size: Some(page_size),
        }
    }
}

impl<P> WatchOptions<P> {
    pub fn with_param(param: P) -> Self {
        Self {
            param: Some(param),
            service: None,
        }
    }

    pub fn service(service: impl Into<String>) -> Self {
        Self {
            param: None,
            service: Some(service.into()),
        }
    }
}
