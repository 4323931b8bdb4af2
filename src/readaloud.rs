//! 朗读协作方接口
//!
//! 会话完成时把全部区域文本按文档顺序拼接后交给朗读方。
//! 管道不消费任何返回值；语音选择与播放完全在本库范围之外。

use std::sync::Arc;

/// 朗读协作方
pub trait ReadAloud {
    /// 接收拼接后的纯文本和词序列
    fn setup(&self, plain_text: &str, words: &[String]);
}

/// 共享引用也能当 ReadAloud 用
impl<T: ReadAloud + ?Sized> ReadAloud for Arc<T> {
    fn setup(&self, plain_text: &str, words: &[String]) {
        (**self).setup(plain_text, words);
    }
}

/// 空实现：宿主没有朗读功能时的默认协作方
#[derive(Debug, Default)]
pub struct NullReadAloud;

impl ReadAloud for NullReadAloud {
    fn setup(&self, _plain_text: &str, _words: &[String]) {}
}
