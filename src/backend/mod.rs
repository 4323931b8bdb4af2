//! 翻译后端模块
//!
//! 管道只依赖一个最小接口：`translate(markup, config) -> translated`。
//! 后端的选择、鉴权和端点配置对管道完全不透明，由宿主以
//! [`BackendConfig`] 的形式提供。
//!
//! 后端通过显式注册表登记：[`BackendRegistry::builtin`] 枚举内建实现并
//! 按键插入，注册表内容可枚举、可测试，不依赖加载顺序的副作用。

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::TranslationError;

pub mod deeplx;
pub mod mock;

pub use deeplx::DeeplxBackend;
pub use mock::{MockBackend, MockMode};

/// 默认的翻译 API 地址
pub const DEFAULT_API_URL: &str = "http://localhost:1188/translate";

/// 后端配置
///
/// 对管道而言是不透明值，原样传给后端实现。
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// 翻译 API 地址
    pub api_url: String,
    /// 源语言（"auto" 表示自动检测）
    pub source_lang: String,
    /// 目标语言
    pub target_lang: String,
    /// 可选的鉴权令牌
    pub api_key: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            source_lang: "auto".to_string(),
            target_lang: "zh".to_string(),
            api_key: None,
        }
    }
}

/// 后端失败
#[derive(Debug, Clone)]
pub struct BackendError {
    /// 错误描述
    pub message: String,
    /// 后端返回的状态码；传输层失败时为 None
    pub status: Option<u16>,
}

impl BackendError {
    /// 传输层失败（连不上、发不出请求）
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
        }
    }

    /// 后端侧失败（请求到达了，但对方报错）
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: Some(status),
        }
    }

    /// 是否为传输层失败
    ///
    /// 首次调度即传输层失败会被管道判定为配置级错误，中止整个会话。
    pub fn is_transport(&self) -> bool {
        self.status.is_none()
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (状态码 {})", self.message, status),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<BackendError> for TranslationError {
    fn from(error: BackendError) -> Self {
        TranslationError::Backend {
            message: error.message,
            status: error.status,
        }
    }
}

/// 翻译后端的统一接口
#[async_trait]
pub trait TranslationBackend: Send + Sync + fmt::Debug {
    /// 注册表里使用的键
    fn name(&self) -> &'static str;

    /// 翻译一段标记
    async fn translate(&self, markup: &str, config: &BackendConfig)
        -> Result<String, BackendError>;
}

/// 显式的后端注册表
pub struct BackendRegistry {
    backends: HashMap<&'static str, Arc<dyn TranslationBackend>>,
}

impl BackendRegistry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
        }
    }

    /// 创建并登记全部内建后端
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(DeeplxBackend::new()));
        registry.register(Arc::new(MockBackend::echo()));
        registry
    }

    /// 登记一个后端；同名后端会被覆盖
    pub fn register(&mut self, backend: Arc<dyn TranslationBackend>) {
        let name = backend.name();
        if self.backends.insert(name, backend).is_some() {
            tracing::debug!("后端 {} 被重新登记", name);
        }
    }

    /// 按键查找后端
    pub fn get(&self, name: &str) -> Option<Arc<dyn TranslationBackend>> {
        self.backends.get(name).cloned()
    }

    /// 列出已登记的后端键（排序后）
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.backends.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
