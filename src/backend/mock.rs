//! 测试用后端
//!
//! 可编排的假后端：回显译文、在指定调用序号上失败、或模拟完全不可达。
//! 同时记录调用次数，供测试断言缓存命中等行为。

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::{BackendConfig, BackendError, TranslationBackend};

/// 假后端的行为模式
#[derive(Debug, Clone)]
pub enum MockMode {
    /// 原样回显，前面加上目标语言标记
    Echo,
    /// 指定的调用序号（从 0 计）返回后端侧失败，其余回显
    FailOn(Vec<usize>),
    /// 所有调用都模拟传输层失败（后端不可达）
    Unreachable,
}

/// 测试用后端
#[derive(Debug)]
pub struct MockBackend {
    mode: MockMode,
    calls: AtomicUsize,
}

impl MockBackend {
    /// 回显模式
    pub fn echo() -> Self {
        Self::with_mode(MockMode::Echo)
    }

    /// 在指定调用序号上失败
    pub fn failing_on(indices: Vec<usize>) -> Self {
        Self::with_mode(MockMode::FailOn(indices))
    }

    /// 模拟完全不可达的后端
    pub fn unreachable() -> Self {
        Self::with_mode(MockMode::Unreachable)
    }

    /// 指定行为模式
    pub fn with_mode(mode: MockMode) -> Self {
        Self {
            mode,
            calls: AtomicUsize::new(0),
        }
    }

    /// 到目前为止的调用次数
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranslationBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn translate(
        &self,
        markup: &str,
        config: &BackendConfig,
    ) -> Result<String, BackendError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);

        match &self.mode {
            MockMode::Echo => Ok(format!("[{}] {}", config.target_lang, markup)),
            MockMode::FailOn(indices) => {
                if indices.contains(&call) {
                    Err(BackendError::api(502, format!("第 {} 次调用按计划失败", call)))
                } else {
                    Ok(format!("[{}] {}", config.target_lang, markup))
                }
            }
            MockMode::Unreachable => Err(BackendError::transport("连接被拒绝")),
        }
    }
}
