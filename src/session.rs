//! 翻译会话管道
//!
//! 端到端的编排：定位内容区域、逐区域分块、顺序调度到翻译后端、
//! 把译文插回文档树、汇报进度，并在完成时把全文交给朗读协作方。
//!
//! 会话级状态机：`Initializing → Running → {Completed, Errored}`。
//! 区域级状态机：`Pending → InFlight → {Translated, Failed, Skipped}`。
//!
//! 调度是单线程协作式的：任一时刻最多一个在途后端请求，后端调用是
//! 循环体内唯一的挂起点。文档树由宿主拥有，可能在请求在途时被改动，
//! 所以每个挂起点之后、每次树修改之前都要重新校验句柄活性。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use markup5ever_rcdom::Handle;

use crate::backend::{BackendConfig, TranslationBackend};
use crate::cache::{cache_key, TranslationCache};
use crate::chunk::{chunk_region, Chunk};
use crate::config::SessionConfig;
use crate::dom::{
    append_child, create_element, create_text, detach, fragment_to_nodes, inner_html,
    insert_after, is_attached, set_node_attr, text_content,
};
use crate::error::{TranslationError, TranslationResult};
use crate::locate::{locate, ContentRegion, RegionStatus};
use crate::readaloud::{NullReadAloud, ReadAloud};
use crate::sanitize::collapse_whitespace;

/// 会话生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Initializing,
    Running,
    Completed,
    Errored,
}

/// 进度接收器
pub trait ProgressSink {
    /// 每处理完一个区域回调一次
    fn on_progress(&self, done: usize, total: usize);
}

/// 默认进度接收器：只记录日志
#[derive(Debug, Default)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn on_progress(&self, done: usize, total: usize) {
        tracing::info!("翻译进度: {}/{}", done, total);
    }
}

/// 共享引用也能当 ProgressSink 用
impl<T: ProgressSink + ?Sized> ProgressSink for Arc<T> {
    fn on_progress(&self, done: usize, total: usize) {
        (**self).on_progress(done, total);
    }
}

/// 会话完成摘要
///
/// 跳过与失败的数量直接对调用方可见，而不是只留在日志里。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionSummary {
    pub total: usize,
    pub translated: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// 一次整文档翻译请求的顶层状态
pub struct Session {
    document: Handle,
    config: SessionConfig,
    backend: Arc<dyn TranslationBackend>,
    cache: TranslationCache,
    readaloud: Box<dyn ReadAloud>,
    progress: Box<dyn ProgressSink>,
    regions: Vec<ContentRegion>,
    cursor: usize,
    status: SessionStatus,
    cancelled: Arc<AtomicBool>,
    /// 是否已有请求成功抵达过后端（首次调度检测用）
    reached_backend: bool,
}

impl Session {
    /// 创建会话
    ///
    /// `document` 是宿主拥有的文档树根句柄；会话只持有句柄，从不拥有树。
    pub fn new(
        document: Handle,
        config: SessionConfig,
        backend: Arc<dyn TranslationBackend>,
    ) -> Self {
        let cache = TranslationCache::new(config.cache_capacity);
        Self {
            document,
            config,
            backend,
            cache,
            readaloud: Box::new(NullReadAloud),
            progress: Box::new(TracingProgress),
            regions: Vec::new(),
            cursor: 0,
            status: SessionStatus::Initializing,
            cancelled: Arc::new(AtomicBool::new(false)),
            reached_backend: false,
        }
    }

    /// 注入朗读协作方
    pub fn with_readaloud(mut self, readaloud: Box<dyn ReadAloud>) -> Self {
        self.readaloud = readaloud;
        self
    }

    /// 注入进度接收器
    pub fn with_progress(mut self, progress: Box<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// 注入外部缓存（例如跨会话共享的缓存）
    pub fn with_cache(mut self, cache: TranslationCache) -> Self {
        self.cache = cache;
        self
    }

    /// 当前会话状态
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// 已定位的区域（文档顺序）
    pub fn regions(&self) -> &[ContentRegion] {
        &self.regions
    }

    /// 当前游标位置
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// 取消令牌；宿主置位后，在途结果会被静默丢弃
    pub fn cancellation_token(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// 取消会话
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// 按区域状态汇总
    pub fn summary(&self) -> SessionSummary {
        let mut summary = SessionSummary {
            total: self.regions.len(),
            ..Default::default()
        };
        for region in &self.regions {
            match region.status {
                RegionStatus::Translated => summary.translated += 1,
                RegionStatus::Failed => summary.failed += 1,
                RegionStatus::Skipped => summary.skipped += 1,
                _ => {}
            }
        }
        summary
    }

    /// 初始化：运行内容定位
    ///
    /// 零区域是终止条件，会话直接进入 `Errored`，永远不会进入 `Running`。
    pub fn initialize(&mut self) -> TranslationResult<usize> {
        if self.status != SessionStatus::Initializing {
            return Err(TranslationError::InvalidState(
                "会话已经初始化过".to_string(),
            ));
        }
        match locate(&self.document, &self.config) {
            Ok(regions) => {
                let count = regions.len();
                self.regions = regions;
                Ok(count)
            }
            Err(error) => {
                self.status = SessionStatus::Errored;
                Err(error.log())
            }
        }
    }

    /// 驱动会话直到完成
    ///
    /// 显式迭代循环（不递归），后端调度是循环体内唯一的挂起点；
    /// 取消检查落在每次迭代之间。单个区域的失败不会中止会话，
    /// 只有终止类错误（无内容、后端不可达）会让会话进入 `Errored`。
    pub async fn run(&mut self) -> TranslationResult<SessionSummary> {
        match self.status {
            SessionStatus::Initializing => {}
            SessionStatus::Running => {
                return Err(TranslationError::InvalidState("会话正在运行".to_string()))
            }
            _ => {
                return Err(TranslationError::InvalidState("会话已经结束".to_string()))
            }
        }
        if self.regions.is_empty() {
            self.initialize()?;
        }

        self.status = SessionStatus::Running;
        let total = self.regions.len();
        tracing::info!("会话开始: {} 个区域", total);

        while self.cursor < self.regions.len() {
            if self.cancelled.load(Ordering::SeqCst) {
                tracing::debug!("会话已取消，停止处理");
                return Ok(self.summary());
            }

            if let Err(error) = self.process_region(self.cursor).await {
                // 只有终止类错误会走到这里
                self.status = SessionStatus::Errored;
                return Err(error.log());
            }

            // 游标只增不减，区域按文档顺序处理
            self.cursor += 1;
            self.progress.on_progress(self.cursor, total);
        }

        self.status = SessionStatus::Completed;
        let summary = self.summary();
        tracing::info!(
            "会话完成: 共 {} 个区域，翻译 {}，失败 {}，跳过 {}",
            summary.total,
            summary.translated,
            summary.failed,
            summary.skipped
        );
        self.handoff_readaloud();
        Ok(summary)
    }

    /// 切换一个区域的原文/译文展示
    ///
    /// 只对原文快照和译文都就绪的区域生效；成对调用回到原先的展示，
    /// 永远不会重新调度后端。
    pub fn toggle(&mut self, region_id: usize) -> TranslationResult<()> {
        let document = self.document.clone();
        let region = self
            .regions
            .get_mut(region_id)
            .ok_or_else(|| TranslationError::InvalidState(format!("区域 {} 不存在", region_id)))?;

        if region.original_markup.is_none() || region.translated_markup.is_none() {
            return Err(TranslationError::InvalidState(
                "区域尚未翻译，无法切换".to_string(),
            ));
        }
        let wrapper = match &region.translated_node {
            Some(wrapper) => wrapper.clone(),
            None => {
                return Err(TranslationError::InvalidState(
                    "区域缺少译文节点".to_string(),
                ))
            }
        };

        // 树可能已被宿主改掉；句柄失效时静默不动
        if !is_attached(&document, &region.handle) || !is_attached(&document, &wrapper) {
            tracing::debug!("区域 {} 的节点已脱离文档树，忽略切换", region_id);
            return Ok(());
        }

        if region.showing_translation {
            set_node_attr(&region.handle, "hidden", None);
            set_node_attr(&wrapper, "hidden", Some(""));
        } else {
            set_node_attr(&region.handle, "hidden", Some(""));
            set_node_attr(&wrapper, "hidden", None);
        }
        region.showing_translation = !region.showing_translation;
        Ok(())
    }

    /// 处理一个区域；只有终止类错误会作为 Err 返回
    async fn process_region(&mut self, index: usize) -> TranslationResult<()> {
        let handle = self.regions[index].handle.clone();

        // 每次修改前的活性校验：句柄失效不算错误，只是跳过
        if !is_attached(&self.document, &handle) {
            self.regions[index].status = RegionStatus::Skipped;
            tracing::debug!("区域 {} 已脱离文档树，跳过", index);
            return Ok(());
        }

        // 快照当前标记，供之后切换还原
        let original = match inner_html(&handle) {
            Ok(markup) => markup,
            Err(error) => {
                self.regions[index].status = RegionStatus::Failed;
                tracing::warn!("区域 {} 快照失败: {}", index, error);
                return Ok(());
            }
        };
        self.regions[index].original_markup = Some(original);

        // 占位标记：请求在途时的忙碌指示
        let busy = create_element("span", &[("class", "translith-loading")]);
        append_child(&busy, &create_text("…"));
        if insert_after(&handle, &busy).is_err() {
            self.regions[index].status = RegionStatus::Skipped;
            return Ok(());
        }
        self.regions[index].status = RegionStatus::InFlight;

        // 区域只分一次块
        if self.regions[index].chunks.is_none() {
            let chunks = chunk_region(&self.regions[index], self.config.max_chunk_chars);
            self.regions[index].chunks = Some(chunks);
        }
        let chunks: Vec<Chunk> = self.regions[index].chunks.clone().unwrap_or_default();

        let outcome = self.dispatch_chunks(&chunks).await;

        // 挂起点之后：先确认会话和区域还有效，再碰树
        detach(&busy);
        if self.cancelled.load(Ordering::SeqCst) {
            tracing::debug!("结果在会话取消后到达，静默丢弃");
            return Ok(());
        }

        let parts = match outcome {
            Ok(parts) => parts,
            Err(error) if error.is_terminal() => {
                self.regions[index].status = RegionStatus::Failed;
                return Err(error);
            }
            Err(error) => {
                self.regions[index].status = RegionStatus::Failed;
                tracing::warn!("区域 {} 翻译失败: {}", index, error);
                return Ok(());
            }
        };

        if !is_attached(&self.document, &handle) {
            self.regions[index].status = RegionStatus::Skipped;
            tracing::debug!("区域 {} 在调度期间脱离文档树，丢弃结果", index);
            return Ok(());
        }

        // 译文插在原节点旁边（不替换原节点），回插点是合成包装
        let translated_markup: String = parts.concat();
        let wrapper = create_element("div", &[("class", "translith-translated")]);
        for node in fragment_to_nodes(&translated_markup) {
            append_child(&wrapper, &node);
        }
        if insert_after(&handle, &wrapper).is_err() {
            self.regions[index].status = RegionStatus::Skipped;
            return Ok(());
        }
        set_node_attr(&handle, "hidden", Some(""));

        self.regions[index].translated_markup = Some(translated_markup);
        self.regions[index].translated_node = Some(wrapper);
        self.regions[index].showing_translation = true;
        self.regions[index].status = RegionStatus::Translated;
        Ok(())
    }

    /// 顺序调度区域的各个分块；任一时刻最多一个在途请求
    async fn dispatch_chunks(&mut self, chunks: &[Chunk]) -> TranslationResult<Vec<String>> {
        let backend = Arc::clone(&self.backend);
        let backend_config: BackendConfig = self.config.backend.clone();
        let mut parts = Vec::with_capacity(chunks.len());

        for chunk in chunks {
            if self.cancelled.load(Ordering::SeqCst) {
                break;
            }
            let payload = collapse_whitespace(&chunk.markup);

            let key = cache_key(&backend_config, &payload);
            if let Some(hit) = self.cache.get(&key) {
                tracing::debug!("区域 {} 分块 {} 命中缓存", chunk.region_id, chunk.index);
                parts.push(hit);
                continue;
            }

            match backend.translate(&payload, &backend_config).await {
                Ok(translated) => {
                    self.reached_backend = true;
                    self.cache.insert(key, translated.clone());
                    parts.push(translated);
                }
                Err(backend_error) => {
                    // 首次调度即传输层失败 ⇒ 配置级错误，整个会话中止
                    if !self.reached_backend && backend_error.is_transport() {
                        return Err(TranslationError::BackendUnavailable(
                            backend_error.message,
                        ));
                    }
                    return Err(TranslationError::from(backend_error));
                }
            }
        }
        Ok(parts)
    }

    /// 完成时按文档顺序拼接全文，交给朗读协作方
    fn handoff_readaloud(&self) {
        let mut plain = String::new();
        for region in &self.regions {
            let markup = region
                .translated_markup
                .as_deref()
                .unwrap_or(region.clean_markup.as_str());
            for node in fragment_to_nodes(markup) {
                plain.push_str(&text_content(&node));
            }
        }
        let plain = collapse_whitespace(&plain).trim().to_string();
        let words: Vec<String> = plain.split_whitespace().map(str::to_string).collect();
        self.readaloud.setup(&plain, &words);
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("status", &self.status)
            .field("cursor", &self.cursor)
            .field("regions", &self.regions.len())
            .finish()
    }
}
