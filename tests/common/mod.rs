//! 集成测试公共工具
//!
//! 提供 HTML 夹具、DOM 构造辅助，以及可断言的进度/朗读记录器。

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use markup5ever_rcdom::{Handle, RcDom};

use translith::session::ProgressSink;
use translith::{dom, ReadAloud};

/// 解析测试 HTML 为 DOM
pub fn build_dom(html: &str) -> RcDom {
    dom::html_to_dom(html.as_bytes(), "utf-8")
}

/// 取文档的 body 句柄
pub fn body_of(dom: &RcDom) -> Handle {
    dom::find_body(&dom.document).expect("test document should have a body")
}

/// 一篇三段短文，总量远小于默认分块预算
pub fn simple_article() -> &'static str {
    "<article>\
       <p>The quick brown fox jumps over the lazy dog today.</p>\
       <p>A second short paragraph keeps the story moving along.</p>\
       <p>The third paragraph wraps the little article up nicely.</p>\
     </article>"
}

/// 三个互相独立的内容区域
pub fn three_region_page() -> &'static str {
    "<div>\
       <p>Region one carries exactly eight words of text.</p>\
       <p>Region two carries exactly eight words of text.</p>\
       <p>Region three carries exactly eight words of text.</p>\
     </div>"
}

/// 没有任何文本节点的空文档
pub fn empty_page() -> &'static str {
    "<div></div><script>var x = 1;</script>"
}

/// 带噪声的真实感页面：正文之外全是应当被剔除的样板
pub fn noisy_page() -> &'static str {
    "<nav class=\"main-navigation\"><a href=\"/\">Home</a></nav>\
     <article class=\"post-content\">\
       <h1>An Interesting Headline</h1>\
       <div class=\"article-byline\">By Jane Doe, Staff Writer</div>\
       <p>This is the first real paragraph of the article body text.</p>\
       <p>This is the second real paragraph of the article body text.</p>\
     </article>\
     <aside class=\"sidebar\">Trending now</aside>\
     <footer class=\"site-footer\">All rights reserved</footer>"
}

/// 记录每次进度回调的接收器
#[derive(Debug, Default)]
pub struct RecordingProgress {
    updates: Mutex<Vec<(usize, usize)>>,
}

impl RecordingProgress {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn updates(&self) -> Vec<(usize, usize)> {
        self.updates.lock().unwrap().clone()
    }
}

impl ProgressSink for RecordingProgress {
    fn on_progress(&self, done: usize, total: usize) {
        self.updates.lock().unwrap().push((done, total));
    }
}

/// 记录朗读交接内容的协作方
#[derive(Debug, Default)]
pub struct RecordingReadAloud {
    handoffs: Mutex<Vec<(String, Vec<String>)>>,
}

impl RecordingReadAloud {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn handoffs(&self) -> Vec<(String, Vec<String>)> {
        self.handoffs.lock().unwrap().clone()
    }
}

impl ReadAloud for RecordingReadAloud {
    fn setup(&self, plain_text: &str, words: &[String]) {
        self.handoffs
            .lock()
            .unwrap()
            .push((plain_text.to_string(), words.to_vec()));
    }
}
