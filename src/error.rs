//! 统一错误处理模块
//!
//! 定义翻译流程中的所有错误类型，并把它们划分为三个传播类别：
//! - **终止类**：配置或内容层面的失败，整个会话中止并向调用方报告一次
//! - **可恢复类**：单个区域的调度失败，记录日志后会话继续
//! - **结构类**：节点脱离文档树，静默跳过，永不向上传播

use thiserror::Error;

/// 翻译错误类型
#[derive(Error, Debug, Clone)]
pub enum TranslationError {
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// 文档中找不到任何可翻译内容
    #[error("未找到可翻译内容")]
    NoContent,

    /// 翻译后端完全不可达（首次调度即失败）
    #[error("翻译后端不可达: {0}")]
    BackendUnavailable(String),

    /// 后端返回的错误
    #[error("后端错误: {message}")]
    Backend {
        message: String,
        status: Option<u16>,
    },

    /// 网络错误
    #[error("网络错误: {0}")]
    Network(String),

    /// 标记解析错误
    #[error("解析错误: {0}")]
    Parse(String),

    /// 节点已脱离文档树
    #[error("节点已脱离文档树")]
    DetachedNode,

    /// 会话状态错误
    #[error("会话状态错误: {0}")]
    InvalidState(String),

    /// 内部错误
    #[error("内部错误: {0}")]
    Internal(String),
}

/// 错误严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl TranslationError {
    /// 终止类错误会中止整个会话，并向调用方报告一次
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TranslationError::Config(_)
                | TranslationError::NoContent
                | TranslationError::BackendUnavailable(_)
        )
    }

    /// 结构类错误静默处理，对应区域转为 Skipped
    pub fn is_structural(&self) -> bool {
        matches!(self, TranslationError::DetachedNode)
    }

    /// 获取错误的严重程度
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TranslationError::Config(_) => ErrorSeverity::Critical,
            TranslationError::NoContent => ErrorSeverity::Critical,
            TranslationError::BackendUnavailable(_) => ErrorSeverity::Critical,
            TranslationError::Backend { .. } => ErrorSeverity::Error,
            TranslationError::Network(_) => ErrorSeverity::Warning,
            TranslationError::Parse(_) => ErrorSeverity::Error,
            TranslationError::DetachedNode => ErrorSeverity::Info,
            TranslationError::InvalidState(_) => ErrorSeverity::Error,
            TranslationError::Internal(_) => ErrorSeverity::Critical,
        }
    }

    /// 按严重程度记录日志并返回自身，便于 `map_err` 链式使用
    pub fn log(self) -> Self {
        match self.severity() {
            ErrorSeverity::Info => tracing::debug!("{}", self),
            ErrorSeverity::Warning => tracing::warn!("{}", self),
            ErrorSeverity::Error => tracing::error!("{}", self),
            ErrorSeverity::Critical => tracing::error!("严重错误: {}", self),
        }
        self
    }
}

impl From<std::io::Error> for TranslationError {
    fn from(error: std::io::Error) -> Self {
        TranslationError::Config(format!("IO错误: {}", error))
    }
}

impl From<toml::de::Error> for TranslationError {
    fn from(error: toml::de::Error) -> Self {
        TranslationError::Parse(format!("TOML解析错误: {}", error))
    }
}

impl From<serde_json::Error> for TranslationError {
    fn from(error: serde_json::Error) -> Self {
        TranslationError::Parse(format!("JSON解析错误: {}", error))
    }
}

/// 错误结果类型别名
pub type TranslationResult<T> = Result<T, TranslationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_classification() {
        assert!(TranslationError::NoContent.is_terminal(), "NoContent should abort the session");
        assert!(TranslationError::Config("x".into()).is_terminal(), "Config errors should abort the session");
        assert!(TranslationError::BackendUnavailable("x".into()).is_terminal(), "Unreachable backend should abort the session");

        let per_unit = TranslationError::Backend {
            message: "HTTP 500".into(),
            status: Some(500),
        };
        assert!(!per_unit.is_terminal(), "Backend failures are per-region");
        assert!(!TranslationError::Network("reset".into()).is_terminal(), "Network failures are per-region");
    }

    #[test]
    fn test_structural_classification() {
        assert!(TranslationError::DetachedNode.is_structural(), "Detached handles are structural");
        assert!(!TranslationError::NoContent.is_structural());
        assert_eq!(TranslationError::DetachedNode.severity(), ErrorSeverity::Info);
    }

    #[test]
    fn test_severity_ordering() {
        // 终止类错误的严重程度必须高于可恢复类
        let terminal = TranslationError::NoContent.severity();
        let recoverable = TranslationError::Network("x".into()).severity();
        assert!(terminal > recoverable, "Terminal errors should outrank recoverable ones");
    }
}
