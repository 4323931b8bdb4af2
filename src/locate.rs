//! 内容定位模块
//!
//! 在完整文档树上运行一组有序的结构启发式，找出候选的可翻译内容区域。
//! 级联中第一个产出合格节点的阶段即胜出：
//!
//! 1. 语义化正文容器（article/main/role 或内容类 class 提示），词数 ≥ 10
//! 2. 疑似内容容器内的段落，词数 ≥ 5
//! 3. 全文档的段落类节点，词数 ≥ 3
//! 4. 高文本密度、子元素扇出小的通用块
//! 5. 兜底：整个可见 body 作为单一区域
//!
//! 各阈值来自 [`SessionConfig`]，不是写死的常量。
//! 找不到任何区域是终止条件（NoContent），不是"空但成功"。

use std::rc::Rc;

use markup5ever_rcdom::{Handle, NodeData};

use crate::chunk::Chunk;
use crate::config::SessionConfig;
use crate::dom::{
    child_element_count, find_body, get_node_attr, get_node_name, get_parent_node, inner_html,
    text_content, word_count,
};
use crate::error::{TranslationError, TranslationResult};
use crate::sanitize::{has_excluded_ancestor, hint_string, sanitize, SanitizationProfile};

/// 区域的处理状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionStatus {
    /// 等待处理
    Pending,
    /// 已调度到后端，等待结果
    InFlight,
    /// 译文已插入文档
    Translated,
    /// 调度失败，保留原文
    Failed,
    /// 节点脱离文档树，静默跳过
    Skipped,
}

/// 一个候选的可翻译内容区域
///
/// 由定位器创建，由会话管道修改，在会话存续期内不会销毁。
/// `handle` 指向宿主拥有的活动树，每次修改前都必须重新校验活性。
#[derive(Debug, Clone)]
pub struct ContentRegion {
    /// 区域序号（即文档顺序）
    pub id: usize,
    /// 指向源节点的句柄
    pub handle: Handle,
    /// 定位时的原始标记
    pub raw_markup: String,
    /// aggressive 清理后的标记，分块器的输入
    pub clean_markup: String,
    /// 处理状态
    pub status: RegionStatus,
    /// 调度前的标记快照，供切换还原
    pub original_markup: Option<String>,
    /// 后端返回的译文标记
    pub translated_markup: Option<String>,
    /// 插入文档的译文包装节点
    pub(crate) translated_node: Option<Handle>,
    /// 分块结果（懒生成，只分一次）
    pub(crate) chunks: Option<Vec<Chunk>>,
    /// 当前展示的是译文还是原文
    pub(crate) showing_translation: bool,
}

impl ContentRegion {
    pub(crate) fn new(id: usize, handle: Handle, raw_markup: String, clean_markup: String) -> Self {
        Self {
            id,
            handle,
            raw_markup,
            clean_markup,
            status: RegionStatus::Pending,
            original_markup: None,
            translated_markup: None,
            translated_node: None,
            chunks: None,
            showing_translation: false,
        }
    }

    /// 区域是否已到达终态
    pub fn is_settled(&self) -> bool {
        matches!(
            self.status,
            RegionStatus::Translated | RegionStatus::Failed | RegionStatus::Skipped
        )
    }
}

// ============================================================================
// 启发式词表
// ============================================================================

/// 语义化正文容器的标签
const SEMANTIC_TAGS: &[&str] = &["article", "main"];

/// class/id 上的正文提示词（定位候选容器用）
const CONTENT_HINTS: &[&str] = &["article", "content", "post", "story", "entry"];

/// 候选过多时用于压制样板块的内容词汇表
const CONTENT_VOCAB: &[&str] = &[
    "article", "content", "post", "story", "entry", "body", "text", "description",
];

/// 段落类标签
const PARAGRAPH_TAGS: &[&str] = &["p", "blockquote"];

/// 第四级级联考察的通用块标签
const GENERIC_BLOCK_TAGS: &[&str] = &["div", "section", "td"];

// ============================================================================
// 定位入口
// ============================================================================

/// 在文档中定位内容区域
///
/// 零区域是终止条件，返回 [`TranslationError::NoContent`]。
pub fn locate(document: &Handle, config: &SessionConfig) -> TranslationResult<Vec<ContentRegion>> {
    let body = find_body(document).ok_or(TranslationError::NoContent)?;

    let mut candidates = run_cascade(&body, config);
    candidates = drop_nested(candidates);

    if candidates.is_empty() {
        // 兜底：整个可见 body 作为单一区域（排除子树由清理器处理）
        if word_count(&body) > 0 {
            tracing::debug!("级联未命中，回退到整个 body");
            candidates.push(body);
        } else {
            return Err(TranslationError::NoContent);
        }
    }

    let mut regions = Vec::with_capacity(candidates.len());
    for handle in candidates {
        let raw = match inner_html(&handle) {
            Ok(markup) => markup,
            Err(e) => {
                tracing::warn!("候选区域序列化失败，跳过: {}", e);
                continue;
            }
        };
        let clean = sanitize(&raw, SanitizationProfile::Aggressive);
        regions.push(ContentRegion::new(regions.len(), handle, raw, clean));
    }

    if regions.is_empty() {
        return Err(TranslationError::NoContent);
    }
    tracing::info!("定位到 {} 个内容区域", regions.len());
    Ok(regions)
}

/// 依次尝试四个启发式阶段，第一个产出即返回
fn run_cascade(body: &Handle, config: &SessionConfig) -> Vec<Handle> {
    let semantic = run_stage(body, "semantic", |n| {
        is_semantic_container(n) && word_count(n) >= config.primary_min_words
    });
    if !semantic.is_empty() {
        return semantic;
    }

    let contained = run_stage(body, "contained-paragraph", |n| {
        get_node_name(n) == Some("p")
            && in_content_container(n)
            && word_count(n) >= config.secondary_min_words
    });
    if !contained.is_empty() {
        return contained;
    }

    let paragraphs = run_stage(body, "any-paragraph", |n| {
        matches!(get_node_name(n), Some(tag) if PARAGRAPH_TAGS.contains(&tag))
            && word_count(n) >= config.fallback_min_words
    });
    if !paragraphs.is_empty() {
        return paragraphs;
    }

    run_stage(body, "dense-block", |n| {
        matches!(get_node_name(n), Some(tag) if GENERIC_BLOCK_TAGS.contains(&tag))
            && text_content(n).trim().chars().count() > config.generic_min_chars
            && word_count(n) > config.generic_min_words
            && child_element_count(n) < config.generic_max_children
    })
}

/// 收集一个阶段的候选，并施加排除名单和词汇表过滤
fn run_stage<F>(body: &Handle, stage_name: &str, qualifies: F) -> Vec<Handle>
where
    F: Fn(&Handle) -> bool,
{
    let mut found = Vec::new();
    collect_matching(body, &qualifies, &mut found);

    // 排除名单对兜底之外的所有阶段生效
    found.retain(|n| !has_excluded_ancestor(n));
    found = apply_vocabulary_filter(found);

    if !found.is_empty() {
        tracing::debug!("级联阶段 {} 命中 {} 个候选", stage_name, found.len());
    }
    found
}

/// 先序遍历收集满足条件的元素，自然保持文档顺序
fn collect_matching<F>(node: &Handle, qualifies: &F, out: &mut Vec<Handle>)
where
    F: Fn(&Handle) -> bool,
{
    for child in node.children.borrow().iter() {
        if matches!(child.data, NodeData::Element { .. }) {
            if qualifies(child) {
                out.push(child.clone());
            }
            collect_matching(child, qualifies, out);
        }
    }
}

/// 候选超过一个时，带 class/id 提示的候选必须命中内容词汇表
///
/// 这一步压掉长得像段落、实际却是样板的块（cookie 提示、弹窗文案等）。
fn apply_vocabulary_filter(candidates: Vec<Handle>) -> Vec<Handle> {
    if candidates.len() <= 1 {
        return candidates;
    }
    candidates
        .into_iter()
        .filter(|n| {
            let hints = hint_string(n);
            if hints.trim().is_empty() {
                return true;
            }
            CONTENT_VOCAB.iter().any(|word| hints.contains(word))
        })
        .collect()
}

/// 去掉嵌套在其它候选内部的候选，保留最外层
fn drop_nested(candidates: Vec<Handle>) -> Vec<Handle> {
    let survivors: Vec<Handle> = candidates
        .iter()
        .filter(|candidate| {
            let mut current = get_parent_node(candidate);
            while let Some(ancestor) = current {
                if candidates.iter().any(|other| Rc::ptr_eq(other, &ancestor)) {
                    return false;
                }
                current = get_parent_node(&ancestor);
            }
            true
        })
        .cloned()
        .collect();
    survivors
}

fn is_semantic_container(node: &Handle) -> bool {
    let tag = get_node_name(node).unwrap_or_default();
    if SEMANTIC_TAGS.contains(&tag) {
        return true;
    }
    if get_node_attr(node, "role").as_deref() == Some("main") {
        return true;
    }
    let hints = hint_string(node);
    !hints.trim().is_empty() && CONTENT_HINTS.iter().any(|h| hints.contains(h))
}

/// 节点是否位于疑似内容容器内
fn in_content_container(node: &Handle) -> bool {
    let mut current = get_parent_node(node);
    while let Some(ancestor) = current {
        if matches!(ancestor.data, NodeData::Element { .. }) {
            let tag = get_node_name(&ancestor).unwrap_or_default();
            if SEMANTIC_TAGS.contains(&tag) || tag == "section" || is_semantic_container(&ancestor)
            {
                return true;
            }
        }
        current = get_parent_node(&ancestor);
    }
    false
}
