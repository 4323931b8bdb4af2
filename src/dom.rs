//! DOM 工具模块
//!
//! 对 markup5ever_rcdom 树的只读查询和结构性修改的统一入口。
//! 文档树由宿主应用拥有，这里的所有修改函数都针对"外部可能并发改动树"
//! 的前提设计：句柄在每次修改前都要经过 [`is_attached`] 重新校验。

use std::cell::RefCell;
use std::rc::Rc;

use encoding_rs::Encoding;
use html5ever::interface::{Attribute, QualName};
use html5ever::parse_document;
use html5ever::serialize::{serialize, SerializeOpts, TraversalScope};
use html5ever::tendril::{format_tendril, TendrilSink};
use html5ever::{namespace_url, ns, LocalName};
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom, SerializableHandle};

use crate::error::{TranslationError, TranslationResult};

/// 将 HTML 字节解析为 DOM
pub fn html_to_dom(data: &[u8], document_encoding: &str) -> RcDom {
    let s: String = if let Some(encoding) = Encoding::for_label(document_encoding.as_bytes()) {
        let (string, _, _) = encoding.decode(data);
        string.to_string()
    } else {
        String::from_utf8_lossy(data).to_string()
    };

    parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut s.as_bytes())
        .unwrap_or_else(|_| RcDom::default())
}

/// 解析 HTML 片段，返回其顶层节点列表
///
/// 内部通过完整文档解析实现，取 `<body>` 的直接子节点，
/// 避免依赖 fragment 解析器的上下文元素语义。
pub fn fragment_to_nodes(markup: &str) -> Vec<Handle> {
    let dom = html_to_dom(markup.as_bytes(), "utf-8");
    match find_body(&dom.document) {
        Some(body) => {
            let children: Vec<Handle> = body.children.borrow().clone();
            for child in &children {
                child.parent.set(None);
            }
            body.children.borrow_mut().clear();
            children
        }
        None => Vec::new(),
    }
}

/// 查找文档的 `<body>` 节点
pub fn find_body(document: &Handle) -> Option<Handle> {
    let html = get_child_node_by_name(document, "html")?;
    get_child_node_by_name(&html, "body")
}

/// 根据名称获取直接子节点
pub fn get_child_node_by_name(parent: &Handle, node_name: &str) -> Option<Handle> {
    parent
        .children
        .borrow()
        .iter()
        .find(|child| match child.data {
            NodeData::Element { ref name, .. } => &*name.local == node_name,
            _ => false,
        })
        .cloned()
}

/// 获取元素节点的标签名
pub fn get_node_name(node: &Handle) -> Option<&'_ str> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.as_ref()),
        _ => None,
    }
}

/// 获取节点属性值
pub fn get_node_attr(node: &Handle, attr_name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|attr| &*attr.name.local == attr_name)
            .map(|attr| attr.value.to_string()),
        _ => None,
    }
}

/// 设置节点属性；`None` 表示删除该属性
pub fn set_node_attr(node: &Handle, attr_name: &str, attr_value: Option<&str>) {
    if let NodeData::Element { ref attrs, .. } = node.data {
        let mut attrs = attrs.borrow_mut();
        match attr_value {
            Some(value) => {
                if let Some(existing) = attrs.iter_mut().find(|a| &*a.name.local == attr_name) {
                    existing.value.clear();
                    existing.value.push_slice(value);
                } else {
                    attrs.push(Attribute {
                        name: QualName::new(None, ns!(), LocalName::from(attr_name)),
                        value: format_tendril!("{}", value),
                    });
                }
            }
            None => attrs.retain(|a| &*a.name.local != attr_name),
        }
    }
}

/// 获取父节点
///
/// parent 字段是 `Cell<Option<Weak>>`，取出后必须放回去，
/// 否则节点会在宿主眼里变成游离节点。
pub fn get_parent_node(child: &Handle) -> Option<Handle> {
    let weak = child.parent.take();
    let parent = weak.as_ref().and_then(|w| w.upgrade());
    child.parent.set(weak);
    parent
}

/// 检查节点是否仍然挂在以 `root` 为根的树上
///
/// 这是管道在每个挂起点之后、每次修改之前必须执行的活性校验。
pub fn is_attached(root: &Handle, node: &Handle) -> bool {
    let mut current = node.clone();
    loop {
        if Rc::ptr_eq(&current, root) {
            return true;
        }
        match get_parent_node(&current) {
            Some(parent) => current = parent,
            None => return false,
        }
    }
}

/// 将 `new_node` 插入为 `reference` 的后一个兄弟节点
pub fn insert_after(reference: &Handle, new_node: &Handle) -> TranslationResult<()> {
    let parent = get_parent_node(reference).ok_or(TranslationError::DetachedNode)?;
    let mut children = parent.children.borrow_mut();
    let position = children
        .iter()
        .position(|c| Rc::ptr_eq(c, reference))
        .ok_or(TranslationError::DetachedNode)?;
    new_node.parent.set(Some(Rc::downgrade(&parent)));
    children.insert(position + 1, new_node.clone());
    Ok(())
}

/// 把 `child` 追加为 `parent` 的最后一个子节点
pub fn append_child(parent: &Handle, child: &Handle) {
    child.parent.set(Some(Rc::downgrade(parent)));
    parent.children.borrow_mut().push(child.clone());
}

/// 把节点从父节点上摘下来
pub fn detach(node: &Handle) {
    if let Some(parent) = get_parent_node(node) {
        parent
            .children
            .borrow_mut()
            .retain(|c| !Rc::ptr_eq(c, node));
    }
    node.parent.set(None);
}

/// 创建一个 HTML 元素节点
pub fn create_element(tag: &str, attributes: &[(&str, &str)]) -> Handle {
    let attrs = attributes
        .iter()
        .map(|(name, value)| Attribute {
            name: QualName::new(None, ns!(), LocalName::from(*name)),
            value: format_tendril!("{}", value),
        })
        .collect();

    Node::new(NodeData::Element {
        name: QualName::new(None, ns!(html), LocalName::from(tag)),
        attrs: RefCell::new(attrs),
        template_contents: RefCell::new(None),
        mathml_annotation_xml_integration_point: false,
    })
}

/// 创建一个文本节点
pub fn create_text(text: &str) -> Handle {
    Node::new(NodeData::Text {
        contents: RefCell::new(format_tendril!("{}", text)),
    })
}

/// 序列化节点的子内容（inner HTML）
pub fn inner_html(node: &Handle) -> TranslationResult<String> {
    serialize_handle(node, TraversalScope::ChildrenOnly(None))
}

/// 序列化节点自身及其子内容（outer HTML）
pub fn outer_html(node: &Handle) -> TranslationResult<String> {
    serialize_handle(node, TraversalScope::IncludeNode)
}

fn serialize_handle(node: &Handle, scope: TraversalScope) -> TranslationResult<String> {
    let mut buf: Vec<u8> = Vec::new();
    let serializable: SerializableHandle = node.clone().into();
    let opts = SerializeOpts {
        traversal_scope: scope,
        ..Default::default()
    };
    serialize(&mut buf, &serializable, opts)
        .map_err(|e| TranslationError::Internal(format!("序列化失败: {}", e)))?;
    String::from_utf8(buf).map_err(|e| TranslationError::Internal(format!("序列化结果非UTF-8: {}", e)))
}

/// 对可见文本不产生贡献的标签
const INVISIBLE_TAGS: &[&str] = &["script", "style", "noscript", "template"];

/// 收集节点及其子树中的可见文本
///
/// 脚本、样式等不渲染的子树不计入。元素边界处补一个空格，
/// 保证块级元素之间的词不会粘连。
pub fn text_content(node: &Handle) -> String {
    let mut out = String::new();
    collect_text(node, &mut out);
    out
}

fn collect_text(node: &Handle, out: &mut String) {
    match node.data {
        NodeData::Text { ref contents } => out.push_str(&contents.borrow()),
        NodeData::Element { ref name, .. } => {
            if INVISIBLE_TAGS.contains(&name.local.as_ref()) {
                return;
            }
            for child in node.children.borrow().iter() {
                collect_text(child, out);
            }
            out.push(' ');
        }
        _ => {
            for child in node.children.borrow().iter() {
                collect_text(child, out);
            }
        }
    }
}

/// 统计节点子树中的可见词数
pub fn word_count(node: &Handle) -> usize {
    text_content(node).split_whitespace().count()
}

/// 统计元素的直接子元素数量
pub fn child_element_count(node: &Handle) -> usize {
    node.children
        .borrow()
        .iter()
        .filter(|c| matches!(c.data, NodeData::Element { .. }))
        .count()
}
