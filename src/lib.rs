//! # Translith
//!
//! 从任意结构的 HTML 文档中提取可翻译内容，压缩为干净、尺寸受限的
//! 标记流，并驱动一条顺序的"翻译-回插"管道：逐区域调度外部翻译后端、
//! 把译文插回宿主拥有的文档树、汇报进度，单个区域的失败相互隔离。
//!
//! ## 模块组织
//!
//! - `dom` - rcdom 树的查询、序列化与结构修改工具
//! - `sanitize` - 标记清理（standard/aggressive 两档）与空白归一化
//! - `locate` - 内容定位启发式级联
//! - `chunk` - 尺寸受限、不破坏结构边界的分块
//! - `session` - 会话管道与状态机
//! - `backend` - 翻译后端接口、注册表及内建实现
//! - `cache` - 按会话注入的有界译文缓存
//! - `config` - 会话配置与策略常量
//! - `readaloud` - 朗读协作方接口
//! - `error` - 统一错误类型
//!
//! ## 基本用法
//!
//! ```rust,no_run
//! use translith::{dom, Session, SessionConfig, BackendRegistry};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let html = b"<article><p>Hello, world. This page will be translated.</p></article>";
//! let document = dom::html_to_dom(html, "utf-8");
//!
//! let registry = BackendRegistry::builtin();
//! let backend = registry.get("deeplx").expect("builtin backend");
//!
//! let config = SessionConfig::default_with_lang("zh", None);
//! let mut session = Session::new(document.document.clone(), config, backend);
//! session.initialize()?;
//! let summary = session.run().await?;
//! println!("翻译 {}/{} 个区域", summary.translated, summary.total);
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod cache;
pub mod chunk;
pub mod config;
pub mod dom;
pub mod error;
pub mod locate;
pub mod readaloud;
pub mod sanitize;
pub mod session;

// Re-export commonly used items for convenience
pub use backend::{
    BackendConfig, BackendError, BackendRegistry, DeeplxBackend, MockBackend, MockMode,
    TranslationBackend,
};
pub use cache::{CacheStats, TranslationCache};
pub use chunk::{chunk_region, Chunk};
pub use config::SessionConfig;
pub use error::{ErrorSeverity, TranslationError, TranslationResult};
pub use locate::{locate, ContentRegion, RegionStatus};
pub use readaloud::{NullReadAloud, ReadAloud};
pub use sanitize::{sanitize, SanitizationProfile};
pub use session::{
    ProgressSink, Session, SessionStatus, SessionSummary, TracingProgress,
};

/// 翻译整个文档（便利函数）
///
/// 内部创建会话、定位内容并驱动到完成，返回完成摘要。
/// 需要细粒度控制（切换、取消、进度回调）时直接使用 [`Session`]。
pub async fn translate_document(
    document: &markup5ever_rcdom::Handle,
    config: SessionConfig,
    backend: std::sync::Arc<dyn TranslationBackend>,
) -> TranslationResult<SessionSummary> {
    let mut session = Session::new(document.clone(), config, backend);
    session.initialize()?;
    session.run().await
}
