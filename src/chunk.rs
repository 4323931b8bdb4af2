//! 分块模块
//!
//! 把单个区域的净化标记切成尺寸受限、不破坏结构边界的有序分块。
//! 整个元素永远不会被从中间切开：预算装不下的单个元素独立成块
//! （这是明确的边界策略，不是错误）。

use crate::error::TranslationResult;
use crate::dom::{fragment_to_nodes, outer_html};
use crate::locate::ContentRegion;

/// 一个尺寸受限的标记分块
///
/// 由分块器创建后不再修改，被管道恰好消费一次。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// 所属区域的序号
    pub region_id: usize,
    /// 在区域内的次序
    pub index: usize,
    /// 净化后的标记载荷
    pub markup: String,
}

/// 对区域做分块
///
/// 预算以内整体成块；超预算时按文档顺序逐个累积区域的直接子节点，
/// 下一个子节点放不下就先落一块。区域被拆开时，结果的回插点是一个
/// 合成包装节点而不是原节点本身（由会话管道负责）。
pub fn chunk_region(region: &ContentRegion, max_chars: usize) -> Vec<Chunk> {
    let total_chars = region.clean_markup.chars().count();
    if total_chars <= max_chars {
        return vec![Chunk {
            region_id: region.id,
            index: 0,
            markup: region.clean_markup.clone(),
        }];
    }

    let pieces = match split_top_level(&region.clean_markup) {
        Ok(pieces) if !pieces.is_empty() => pieces,
        // 拿不到结构化的切分就整体成一个超大块，绝不截断
        _ => {
            tracing::warn!("区域 {} 无法结构化切分，整体成块", region.id);
            return vec![Chunk {
                region_id: region.id,
                index: 0,
                markup: region.clean_markup.clone(),
            }];
        }
    };

    let mut chunks: Vec<Chunk> = Vec::new();
    let mut buffer = String::new();
    let mut buffer_chars = 0usize;

    let mut flush = |buffer: &mut String, buffer_chars: &mut usize, chunks: &mut Vec<Chunk>| {
        if !buffer.is_empty() {
            chunks.push(Chunk {
                region_id: region.id,
                index: chunks.len(),
                markup: std::mem::take(buffer),
            });
            *buffer_chars = 0;
        }
    };

    for piece in pieces {
        let piece_chars = piece.chars().count();

        if buffer_chars > 0 && buffer_chars + piece_chars > max_chars {
            flush(&mut buffer, &mut buffer_chars, &mut chunks);
        }

        if piece_chars > max_chars {
            // 单个子元素超预算：独立成一个超大块
            flush(&mut buffer, &mut buffer_chars, &mut chunks);
            chunks.push(Chunk {
                region_id: region.id,
                index: chunks.len(),
                markup: piece,
            });
        } else {
            buffer.push_str(&piece);
            buffer_chars += piece_chars;
        }
    }
    flush(&mut buffer, &mut buffer_chars, &mut chunks);

    tracing::debug!("区域 {} 切分为 {} 块", region.id, chunks.len());
    chunks
}

/// 把净化标记按顶层子节点切成片段序列
fn split_top_level(markup: &str) -> TranslationResult<Vec<String>> {
    let mut pieces = Vec::new();
    for node in fragment_to_nodes(markup) {
        pieces.push(outer_html(&node)?);
    }
    Ok(pieces)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::create_element;

    /// 造一个只为分块服务的区域
    fn region_with(clean_markup: &str) -> ContentRegion {
        ContentRegion::new(
            7,
            create_element("div", &[]),
            clean_markup.to_string(),
            clean_markup.to_string(),
        )
    }

    /// 长度恰好为 50 个字符的段落
    fn fixed_paragraph(label: char) -> String {
        // "<p>" + 43 + "</p>" = 50
        format!("<p>{}</p>", label.to_string().repeat(43))
    }

    #[test]
    fn test_under_budget_single_chunk() {
        let region = region_with("<p>small</p>");
        let chunks = chunk_region(&region, 4000);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].markup, "<p>small</p>");
        assert_eq!(chunks[0].region_id, 7);
        assert_eq!(chunks[0].index, 0);
    }

    #[test]
    fn test_three_times_budget_gives_three_chunks() {
        // 6 个 50 字符的段落，预算 100：每块恰好装两段
        let markup: String = ('a'..='f').map(fixed_paragraph).collect();
        let region = region_with(&markup);
        let chunks = chunk_region(&region, 100);

        assert_eq!(chunks.len(), 3, "300 chars over a 100 char budget should give 3 chunks");
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i, "Chunks are ordered");
            assert!(chunk.markup.chars().count() <= 100, "Budget respected");
        }
        assert!(chunks[0].markup.starts_with("<p>aaa"));
        assert!(chunks[2].markup.contains("<p>f"));
    }

    #[test]
    fn test_concatenation_reproduces_clean_markup() {
        let markup: String = ('a'..='e').map(fixed_paragraph).collect();
        let region = region_with(&markup);
        let chunks = chunk_region(&region, 120);

        let rejoined: String = chunks.iter().map(|c| c.markup.as_str()).collect();
        assert_eq!(rejoined, region.clean_markup, "No element may ever be truncated");
    }

    #[test]
    fn test_oversized_element_forms_its_own_chunk() {
        let big = format!("<p>{}</p>", "x".repeat(200));
        let markup = format!("{}{}{}", fixed_paragraph('a'), big, fixed_paragraph('b'));
        let region = region_with(&markup);
        let chunks = chunk_region(&region, 100);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].markup, fixed_paragraph('a'));
        assert_eq!(chunks[1].markup, big, "Oversized element is alone, never split");
        assert!(chunks[1].markup.chars().count() > 100);
        assert_eq!(chunks[2].markup, fixed_paragraph('b'));
    }

    #[test]
    fn test_budget_respected_except_oversized() {
        let markup: String = ('a'..='d').map(fixed_paragraph).collect::<String>()
            + &format!("<p>{}</p>", "y".repeat(500));
        let region = region_with(&markup);
        let budget = 150;
        let chunks = chunk_region(&region, budget);

        for chunk in &chunks {
            let within = chunk.markup.chars().count() <= budget;
            let single_piece = chunk.markup.matches("<p>").count() == 1;
            assert!(
                within || single_piece,
                "A chunk may only exceed the budget when it is one oversized element"
            );
        }
    }

    #[test]
    fn test_mixed_children_kept_whole() {
        // 标题、列表项和文本都按顶层节点为单位累积
        let markup = "<h2>Heading text</h2><ul><li>first item</li><li>second item</li></ul>";
        let region = region_with(markup);
        let chunks = chunk_region(&region, 40);

        let rejoined: String = chunks.iter().map(|c| c.markup.as_str()).collect();
        assert_eq!(rejoined, markup);
        assert!(chunks.len() >= 2, "A 70+ char region over a 40 char budget must split");
        // <ul> 整体超预算，必须独立成块而不是把 <li> 切开
        assert!(chunks.iter().any(|c| c.markup.starts_with("<ul>") && c.markup.ends_with("</ul>")));
    }
}
