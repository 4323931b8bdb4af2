//! 标记清理模块
//!
//! 把一段 HTML 标记裁剪为纯内容形态，供定位器和分块器使用。
//! 提供两档清理规则：
//! - **standard**: 去掉脚本、样式、表单、注释、隐藏元素以及结构性噪声
//!   （导航、页脚、侧栏、评论区、分享按钮、广告位等）
//! - **aggressive**: 在 standard 之后按白名单收口，只保留承载内容的标签，
//!   剥离多余属性，删除署名/时间戳块和募捐提示语，递归修剪空元素
//!
//! 清理永不抛错：内部任何失败都回退为原样返回输入（宁可送出带噪声的
//! 标记，也不能丢掉一个段落）。清理是幂等的，分块器可以对子片段重复调用。

use std::rc::Rc;
use std::sync::OnceLock;

use markup5ever_rcdom::{Handle, NodeData};
use regex::Regex;

use crate::dom::{
    detach, find_body, get_node_attr, get_node_name, get_parent_node, html_to_dom, inner_html,
    text_content,
};
use crate::error::TranslationResult;

/// 清理档位
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SanitizationProfile {
    /// 去噪声，保留文档结构
    Standard,
    /// standard 之后再按白名单收口
    Aggressive,
}

// ============================================================================
// 规则表
// ============================================================================

/// standard 档直接整棵移除的标签
const STRIPPED_TAGS: &[&str] = &[
    "script", "style", "iframe", "frame", "form", "noscript", "template",
];

/// standard 档按标签移除的结构性噪声
const DENYLIST_TAGS: &[&str] = &["nav", "footer", "aside", "audio", "video"];

/// standard 档在 class/id/role 上做子串匹配的噪声模式
///
/// 子串匹配而非全等，站点标记五花八门（"sidebar-left"、"main-nav" 等）。
const DENYLIST_PATTERNS: &[&str] = &[
    "navigation", "navbar", "menu-", "footer", "sidebar", "complementary",
    "comment", "disqus", "social", "share", "sharing", "advert", "sponsor",
    "banner", "newsletter", "subscribe", "subscription", "related",
    "recommend", "player", "widget", "interactive", "job-listing", "vacancy",
    "promo",
];

/// aggressive 档的内容标签白名单
const ALLOWED_TAGS: &[&str] = &[
    "h1", "h2", "h3", "h4", "h5", "h6", "p", "ul", "ol", "li", "blockquote",
    "em", "strong", "i", "b", "a", "br", "div", "span",
];

/// aggressive 档保留的属性
const KEPT_ATTRS: &[&str] = &["href", "title"];

/// 署名/元信息块的 class/id 模式
const BYLINE_PATTERNS: &[&str] = &[
    "byline", "author", "meta", "timestamp", "pubdate", "dateline", "posted",
];

/// 募捐/订阅提示语（小写匹配）
const DONATION_PHRASES: &[&str] = &[
    "donate",
    "support our journalism",
    "support us",
    "subscribe to",
    "sign up for our newsletter",
    "become a member",
    "make a contribution",
];

/// 原样放行的逐字区域
const VERBATIM_TAGS: &[&str] = &["pre", "code"];

// ============================================================================
// 公共入口
// ============================================================================

/// 清理一段标记
///
/// 失败开放：内部出错时原样返回输入。
pub fn sanitize(markup: &str, profile: SanitizationProfile) -> String {
    match sanitize_inner(markup, profile) {
        Ok(clean) => clean,
        Err(e) => {
            tracing::warn!("标记清理失败，原样返回: {}", e);
            markup.to_string()
        }
    }
}

fn sanitize_inner(markup: &str, profile: SanitizationProfile) -> TranslationResult<String> {
    let dom = html_to_dom(markup.as_bytes(), "utf-8");
    let body = match find_body(&dom.document) {
        Some(body) => body,
        // 解析器没有产出 body，说明输入不是常规标记，原样返回
        None => return Ok(markup.to_string()),
    };

    strip_standard_tree(&body);

    if profile == SanitizationProfile::Aggressive {
        remove_byline_blocks(&body);
        remove_donation_texts(&body);
        enforce_allowlist(&body);
        strip_attributes(&body);
        prune_empty_elements(&body);
        collapse_break_runs(&body);
    }

    normalize_whitespace_tree(&body, false);

    inner_html(&body)
}

/// 折叠字符串中的空白串为单个空格
pub fn collapse_whitespace(text: &str) -> String {
    static WS_RUN: OnceLock<Regex> = OnceLock::new();
    let re = WS_RUN.get_or_init(|| {
        Regex::new(r"\s+").unwrap_or_else(|_| Regex::new(r"").unwrap())
    });
    re.replace_all(text, " ").to_string()
}

// ============================================================================
// standard 档
// ============================================================================

/// 对整棵子树应用 standard 规则（定位器的兜底阶段也直接使用）
pub(crate) fn strip_standard_tree(node: &Handle) {
    let children: Vec<Handle> = node.children.borrow().clone();
    for child in children {
        match &child.data {
            NodeData::Comment { .. } => detach(&child),
            NodeData::Element { .. } => {
                if should_strip(&child) {
                    detach(&child);
                } else {
                    strip_standard_tree(&child);
                }
            }
            _ => {}
        }
    }
}

fn should_strip(node: &Handle) -> bool {
    let tag = get_node_name(node).unwrap_or_default();
    if STRIPPED_TAGS.contains(&tag) {
        return true;
    }
    if is_hidden(node) {
        return true;
    }
    matches_exclusion(node)
}

/// 节点本身是否命中排除名单（按标签，或 class/id/role 的子串匹配）
pub(crate) fn matches_exclusion(node: &Handle) -> bool {
    let tag = get_node_name(node).unwrap_or_default();
    if DENYLIST_TAGS.contains(&tag) {
        return true;
    }
    let haystack = hint_string(node);
    if haystack.is_empty() {
        return false;
    }
    DENYLIST_PATTERNS
        .iter()
        .any(|pattern| haystack.contains(pattern))
}

/// 节点或其任一祖先是否命中排除名单
pub(crate) fn has_excluded_ancestor(node: &Handle) -> bool {
    let mut current = Some(node.clone());
    while let Some(handle) = current {
        if matches!(handle.data, NodeData::Element { .. }) && matches_exclusion(&handle) {
            return true;
        }
        current = get_parent_node(&handle);
    }
    false
}

/// 拼接 class/id/role 为小写提示串，供子串匹配
pub(crate) fn hint_string(node: &Handle) -> String {
    let mut hints = String::new();
    for attr in ["class", "id", "role"] {
        if let Some(value) = get_node_attr(node, attr) {
            hints.push_str(&value.to_lowercase());
            hints.push(' ');
        }
    }
    hints
}

fn is_hidden(node: &Handle) -> bool {
    if get_node_attr(node, "hidden").is_some() {
        return true;
    }
    if let Some(style) = get_node_attr(node, "style") {
        let compact: String = style.to_lowercase().split_whitespace().collect();
        if compact.contains("display:none") || compact.contains("visibility:hidden") {
            return true;
        }
    }
    if let Some(class) = get_node_attr(node, "class") {
        if class.split_whitespace().any(|c| c.eq_ignore_ascii_case("hidden")) {
            return true;
        }
    }
    false
}

// ============================================================================
// aggressive 档
// ============================================================================

fn remove_byline_blocks(node: &Handle) {
    let children: Vec<Handle> = node.children.borrow().clone();
    for child in children {
        if matches!(child.data, NodeData::Element { .. }) {
            let haystack = hint_string(&child);
            if BYLINE_PATTERNS.iter().any(|p| haystack.contains(p)) {
                detach(&child);
            } else {
                remove_byline_blocks(&child);
            }
        }
    }
}

fn remove_donation_texts(node: &Handle) {
    let children: Vec<Handle> = node.children.borrow().clone();
    for child in children {
        match &child.data {
            NodeData::Text { contents } => {
                let text = contents.borrow().to_lowercase();
                let trimmed = text.trim();
                // 只裁短提示语，不碰提到这些词的正文段落
                if trimmed.len() < 160
                    && DONATION_PHRASES.iter().any(|p| trimmed.contains(p))
                {
                    detach(&child);
                }
            }
            NodeData::Element { .. } => remove_donation_texts(&child),
            _ => {}
        }
    }
}

fn enforce_allowlist(node: &Handle) {
    let children: Vec<Handle> = node.children.borrow().clone();
    for child in children {
        if matches!(child.data, NodeData::Element { .. }) {
            enforce_allowlist(&child);
            let tag = get_node_name(&child).unwrap_or_default();
            if !ALLOWED_TAGS.contains(&tag) {
                unwrap_element(&child);
            }
        }
    }
}

/// 用元素的子节点替换元素本身（保留内容，丢掉包装）
fn unwrap_element(node: &Handle) {
    let parent = match get_parent_node(node) {
        Some(parent) => parent,
        None => return,
    };
    let mut siblings = parent.children.borrow_mut();
    let position = match siblings.iter().position(|c| Rc::ptr_eq(c, node)) {
        Some(position) => position,
        None => return,
    };

    let grandchildren: Vec<Handle> = node.children.borrow().clone();
    node.children.borrow_mut().clear();

    for (offset, grandchild) in grandchildren.iter().enumerate() {
        grandchild.parent.set(Some(Rc::downgrade(&parent)));
        siblings.insert(position + 1 + offset, grandchild.clone());
    }
    siblings.remove(position);
    node.parent.set(None);
}

fn strip_attributes(node: &Handle) {
    if let NodeData::Element { ref attrs, .. } = node.data {
        attrs
            .borrow_mut()
            .retain(|a| KEPT_ATTRS.contains(&a.name.local.as_ref()));
    }
    for child in node.children.borrow().iter() {
        strip_attributes(child);
    }
}

/// 后序修剪：没有文本也没有元素子节点的元素被移除，<br> 除外
fn prune_empty_elements(node: &Handle) {
    let children: Vec<Handle> = node.children.borrow().clone();
    for child in children {
        if matches!(child.data, NodeData::Element { .. }) {
            prune_empty_elements(&child);
            let tag = get_node_name(&child).unwrap_or_default();
            if tag == "br" {
                continue;
            }
            let has_text = !text_content(&child).trim().is_empty();
            let has_element_child = child
                .children
                .borrow()
                .iter()
                .any(|c| matches!(c.data, NodeData::Element { .. }));
            if !has_text && !has_element_child {
                detach(&child);
            }
        }
    }
}

/// 把连续的 <br>（中间允许纯空白文本）折叠为一个
fn collapse_break_runs(node: &Handle) {
    let children: Vec<Handle> = node.children.borrow().clone();
    let mut previous_was_break = false;
    for child in children {
        match &child.data {
            NodeData::Element { .. } => {
                if get_node_name(&child) == Some("br") {
                    if previous_was_break {
                        detach(&child);
                    } else {
                        previous_was_break = true;
                    }
                } else {
                    previous_was_break = false;
                    collapse_break_runs(&child);
                }
            }
            NodeData::Text { contents } => {
                if !contents.borrow().trim().is_empty() {
                    previous_was_break = false;
                }
            }
            _ => {}
        }
    }
}

// ============================================================================
// 空白归一化（两档都执行）
// ============================================================================

fn normalize_whitespace_tree(node: &Handle, in_verbatim: bool) {
    let children: Vec<Handle> = node.children.borrow().clone();
    for child in children {
        match &child.data {
            NodeData::Text { contents } => {
                if in_verbatim {
                    continue;
                }
                let text = contents.borrow().to_string();
                if text.trim().is_empty() {
                    // 元素边界之间的纯空白文本
                    detach(&child);
                    continue;
                }
                let collapsed = collapse_whitespace(&text);
                if collapsed != text {
                    let mut current = contents.borrow_mut();
                    current.clear();
                    current.push_slice(&collapsed);
                }
            }
            NodeData::Element { .. } => {
                let tag = get_node_name(&child).unwrap_or_default();
                let verbatim = in_verbatim || VERBATIM_TAGS.contains(&tag);
                normalize_whitespace_tree(&child, verbatim);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{fragment_to_nodes, get_child_node_by_name};

    fn aggressive(markup: &str) -> String {
        sanitize(markup, SanitizationProfile::Aggressive)
    }

    fn standard(markup: &str) -> String {
        sanitize(markup, SanitizationProfile::Standard)
    }

    /// 递归断言子树只包含白名单元素
    fn assert_allowlisted(node: &Handle) {
        if let Some(tag) = get_node_name(node) {
            assert!(
                ALLOWED_TAGS.contains(&tag),
                "Tag <{}> must not survive aggressive sanitization",
                tag
            );
        }
        for child in node.children.borrow().iter() {
            assert_allowlisted(child);
        }
    }

    #[test]
    fn test_standard_strips_scripts_and_comments() {
        let clean = standard(
            "<p>keep</p><script>alert(1)</script><!-- note --><style>p{}</style>",
        );
        assert!(clean.contains("<p>keep</p>"));
        assert!(!clean.contains("script"), "Scripts must be stripped");
        assert!(!clean.contains("note"), "Comments must be stripped");
        assert!(!clean.contains("style"), "Style blocks must be stripped");
    }

    #[test]
    fn test_standard_strips_boilerplate_by_pattern() {
        let clean = standard(
            "<div class=\"main-navigation\">links</div>\
             <div id=\"social-share\">buttons</div>\
             <div class=\"newsletter-signup\">join</div>\
             <p>article text</p>",
        );
        assert!(!clean.contains("links"), "Navigation should be removed by pattern");
        assert!(!clean.contains("buttons"), "Share widgets should be removed");
        assert!(!clean.contains("join"), "Newsletter prompts should be removed");
        assert!(clean.contains("article text"));
    }

    #[test]
    fn test_standard_strips_hidden_elements() {
        let clean = standard(
            "<p style=\"display: none\">invisible</p>\
             <p class=\"hidden\">also invisible</p>\
             <p hidden>attr hidden</p>\
             <p>visible</p>",
        );
        assert!(!clean.contains("invisible"));
        assert!(!clean.contains("attr hidden"));
        assert_eq!(clean, "<p>visible</p>");
    }

    #[test]
    fn test_aggressive_output_is_allowlisted() {
        let inputs = [
            "<table><tr><td>cell</td></tr></table>",
            "<figure><img src=\"x.png\"><figcaption>cap</figcaption></figure>",
            "<section><article><p>deep</p></article></section>",
            "<main><h1>t</h1><p>body <u>under</u></p></main>",
        ];
        for input in inputs {
            let clean = aggressive(input);
            for node in fragment_to_nodes(&clean) {
                assert_allowlisted(&node);
            }
        }
    }

    #[test]
    fn test_aggressive_unwrap_keeps_content() {
        let clean = aggressive("<section><p>kept text</p></section>");
        assert_eq!(clean, "<p>kept text</p>", "Wrapper is dropped, content survives");
    }

    #[test]
    fn test_aggressive_strips_attributes_except_links() {
        let clean = aggressive(
            "<p class=\"big\" data-x=\"1\">see <a href=\"/a\" title=\"t\" onclick=\"x()\">link</a></p>",
        );
        assert!(!clean.contains("class"), "class must be stripped");
        assert!(!clean.contains("data-x"));
        assert!(!clean.contains("onclick"));
        assert!(clean.contains("href=\"/a\""), "href survives");
        assert!(clean.contains("title=\"t\""), "title survives");
    }

    #[test]
    fn test_aggressive_removes_bylines_and_donations() {
        let clean = aggressive(
            "<div class=\"article-byline\">By Jane Doe</div>\
             <p>Real paragraph content here.</p>\
             <p>Please donate to keep us running</p>",
        );
        assert!(!clean.contains("Jane Doe"), "Byline blocks should be removed");
        assert!(!clean.contains("donate"), "Donation prompts should be removed");
        assert!(clean.contains("Real paragraph content here."));
    }

    #[test]
    fn test_aggressive_prunes_empty_elements() {
        let clean = aggressive("<p></p><div><span></span></div><p>text</p>");
        assert_eq!(clean, "<p>text</p>");
    }

    #[test]
    fn test_aggressive_keeps_br_and_collapses_runs() {
        let clean = aggressive("<p>one<br><br><br>two</p>");
        assert_eq!(clean, "<p>one<br>two</p>");
    }

    #[test]
    fn test_whitespace_normalization() {
        let clean = standard("<p>a   lot \n\n of   space</p>   <p>x</p>");
        assert_eq!(clean, "<p>a lot of space</p><p>x</p>");
    }

    #[test]
    fn test_verbatim_regions_untouched() {
        let clean = standard("<pre>  two\n  lines  </pre>");
        assert!(
            clean.contains("  two\n  lines  "),
            "Preformatted text must pass through unchanged, got: {}",
            clean
        );
    }

    #[test]
    fn test_idempotence() {
        let inputs = [
            "<div class=\"content\"><h1>Title</h1><p>Body   text</p><script>x</script></div>",
            "<table><tr><td>cell text</td></tr></table><p>after <b>bold</b></p>",
            "<p>one<br><br>two</p><div class=\"byline\">By A</div>",
            "<pre>  raw  </pre><p>  spaced   out  </p>",
        ];
        for input in inputs {
            for profile in [SanitizationProfile::Standard, SanitizationProfile::Aggressive] {
                let once = sanitize(input, profile);
                let twice = sanitize(&once, profile);
                assert_eq!(once, twice, "sanitize must be a fixed point for {:?}", profile);
            }
        }
    }

    #[test]
    fn test_fail_open_on_degenerate_input() {
        // 不构成常规标记的输入不应当 panic，也不应当凭空丢内容
        let noise = "\u{0}\u{1}<<<>>>";
        let clean = standard(noise);
        let _ = clean;

        let empty = aggressive("");
        assert_eq!(empty, "");
    }

    #[test]
    fn test_collapse_whitespace_helper() {
        assert_eq!(collapse_whitespace("a\n\t  b"), "a b");
        assert_eq!(collapse_whitespace(" x "), " x ");
        assert_eq!(collapse_whitespace("plain"), "plain");
    }

    #[test]
    fn test_exclusion_matcher() {
        let dom = html_to_dom(
            b"<div class=\"site-footer\"><p id=\"p1\">x</p></div>",
            "utf-8",
        );
        let body = find_body(&dom.document).expect("body");
        let div = get_child_node_by_name(&body, "div").expect("div");
        let p = get_child_node_by_name(&div, "p").expect("p");

        assert!(matches_exclusion(&div), "footer pattern should match");
        assert!(!matches_exclusion(&p));
        assert!(has_excluded_ancestor(&p), "p sits under an excluded ancestor");
    }
}
