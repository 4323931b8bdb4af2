//! 翻译缓存模块
//!
//! 容量受限的译文缓存，最久未用的条目先被挤出。
//! 缓存按会话注入，不是全局单例。

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;

use crate::backend::BackendConfig;

/// 缓存统计信息
#[derive(Debug, Default, Clone)]
pub struct CacheStats {
    pub total_requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub evictions: u64,
}

impl CacheStats {
    /// 计算缓存命中率
    pub fn hit_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.cache_hits as f64 / self.total_requests as f64
        }
    }
}

/// 译文缓存
pub struct TranslationCache {
    entries: Mutex<LruCache<String, String>>,
    stats: Mutex<CacheStats>,
}

impl TranslationCache {
    /// 创建指定容量的缓存
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            stats: Mutex::new(CacheStats::default()),
        }
    }

    /// 查询缓存
    pub fn get(&self, key: &str) -> Option<String> {
        let mut stats = self.stats.lock().unwrap();
        stats.total_requests += 1;

        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(value) => {
                stats.cache_hits += 1;
                Some(value.clone())
            }
            None => {
                stats.cache_misses += 1;
                None
            }
        }
    }

    /// 写入缓存；容量满时最老的条目被挤出
    pub fn insert(&self, key: String, value: String) {
        let mut entries = self.entries.lock().unwrap();
        if let Some((evicted_key, _)) = entries.push(key.clone(), value) {
            // push 返回同 key 的旧值时不算挤出
            if evicted_key != key {
                self.stats.lock().unwrap().evictions += 1;
            }
        }
    }

    /// 当前条目数
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// 缓存是否为空
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 容量上限
    pub fn capacity(&self) -> usize {
        self.entries.lock().unwrap().cap().get()
    }

    /// 清空缓存
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }

    /// 获取统计快照
    pub fn stats(&self) -> CacheStats {
        self.stats.lock().unwrap().clone()
    }
}

/// 生成缓存键
pub fn cache_key(config: &BackendConfig, text: &str) -> String {
    format!("{}:{}:{}", config.source_lang, config.target_lang, text)
}
