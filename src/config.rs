//! 翻译配置管理模块
//!
//! 提供按会话传递的配置值，支持配置文件、环境变量和默认值。
//! 级联阈值和分块预算都是带默认值的策略参数，而不是写死在算法里的常量。

use std::path::Path;

use serde::Deserialize;

use crate::backend::BackendConfig;
use crate::error::{TranslationError, TranslationResult};

/// 配置常量
pub mod constants {
    /// 第一级级联（语义容器）要求的最小可见词数
    pub const PRIMARY_MIN_WORDS: usize = 10;
    /// 第二级级联（内容容器中的段落）要求的最小词数
    pub const SECONDARY_MIN_WORDS: usize = 5;
    /// 第三级级联（全文档段落）要求的最小词数
    pub const FALLBACK_MIN_WORDS: usize = 3;

    // 第四级级联：高文本密度的通用块
    pub const GENERIC_MIN_CHARS: usize = 50;
    pub const GENERIC_MIN_WORDS: usize = 10;
    pub const GENERIC_MAX_CHILDREN: usize = 5;

    /// 单个分块的字符预算
    pub const MAX_CHUNK_CHARS: usize = 4000;

    /// 翻译缓存容量（条目数）
    pub const CACHE_CAPACITY: usize = 1000;

    /// 配置文件搜索路径
    pub const CONFIG_PATHS: &[&str] = &[
        "translith.toml",
        ".translith.toml",
        "~/.config/translith/config.toml",
    ];
}

/// 会话级配置
///
/// 每个 [`Session`](crate::session::Session) 创建时持有一份自己的配置，
/// 并向下传递给定位器、分块器和后端，不存在全局可变单例。
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// 第一级级联的词数阈值
    pub primary_min_words: usize,
    /// 第二级级联的词数阈值
    pub secondary_min_words: usize,
    /// 第三级级联的词数阈值
    pub fallback_min_words: usize,
    /// 第四级级联：最小字符数
    pub generic_min_chars: usize,
    /// 第四级级联：最小词数
    pub generic_min_words: usize,
    /// 第四级级联：最大子元素数（不含）
    pub generic_max_children: usize,
    /// 单个分块的字符预算
    pub max_chunk_chars: usize,
    /// 翻译缓存容量
    pub cache_capacity: usize,
    /// 后端配置（对管道而言是不透明值）
    pub backend: BackendConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            primary_min_words: constants::PRIMARY_MIN_WORDS,
            secondary_min_words: constants::SECONDARY_MIN_WORDS,
            fallback_min_words: constants::FALLBACK_MIN_WORDS,
            generic_min_chars: constants::GENERIC_MIN_CHARS,
            generic_min_words: constants::GENERIC_MIN_WORDS,
            generic_max_children: constants::GENERIC_MAX_CHILDREN,
            max_chunk_chars: constants::MAX_CHUNK_CHARS,
            cache_capacity: constants::CACHE_CAPACITY,
            backend: BackendConfig::default(),
        }
    }
}

impl SessionConfig {
    /// 使用指定目标语言创建默认配置
    pub fn default_with_lang(target_lang: &str, api_url: Option<&str>) -> Self {
        let mut config = Self::default();
        config.backend.target_lang = target_lang.to_string();
        if let Some(url) = api_url {
            config.backend.api_url = url.to_string();
        }
        config
    }

    /// 从 TOML 文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> TranslationResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let mut config: SessionConfig = toml::from_str(&content)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 在标准搜索路径中查找并加载配置文件，找不到时返回默认值
    pub fn load(target_lang: &str, api_url: Option<&str>) -> Self {
        for path in constants::CONFIG_PATHS {
            if Path::new(path).exists() {
                match Self::from_file(path) {
                    Ok(config) => {
                        tracing::info!("已加载配置文件: {}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("配置文件 {} 加载失败，使用默认配置: {}", path, e);
                        break;
                    }
                }
            }
        }

        let mut config = Self::default_with_lang(target_lang, api_url);
        config.apply_env_overrides();
        config
    }

    /// 应用环境变量覆盖
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("TRANSLITH_API_URL") {
            self.backend.api_url = url;
        }
        if let Ok(lang) = std::env::var("TRANSLITH_TARGET_LANG") {
            self.backend.target_lang = lang;
        }
        if let Ok(lang) = std::env::var("TRANSLITH_SOURCE_LANG") {
            self.backend.source_lang = lang;
        }
        if let Ok(budget) = std::env::var("TRANSLITH_MAX_CHUNK_CHARS") {
            match budget.parse() {
                Ok(value) => self.max_chunk_chars = value,
                Err(_) => tracing::warn!("TRANSLITH_MAX_CHUNK_CHARS 无效，忽略: {}", budget),
            }
        }
    }

    /// 校验配置的基本合法性
    pub fn validate(&self) -> TranslationResult<()> {
        if self.max_chunk_chars == 0 {
            return Err(TranslationError::Config("分块预算不能为 0".to_string()));
        }
        if self.backend.target_lang.is_empty() {
            return Err(TranslationError::Config("目标语言不能为空".to_string()));
        }
        // 级联阈值只要求递减趋势，不强制具体数值
        if self.fallback_min_words > self.secondary_min_words
            || self.secondary_min_words > self.primary_min_words
        {
            return Err(TranslationError::Config(
                "级联阈值必须逐级递减".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.primary_min_words, 10);
        assert_eq!(config.secondary_min_words, 5);
        assert_eq!(config.fallback_min_words, 3);
        assert_eq!(config.max_chunk_chars, constants::MAX_CHUNK_CHARS);
        assert!(config.validate().is_ok(), "Default config should be valid");
    }

    #[test]
    fn test_default_with_lang() {
        let config = SessionConfig::default_with_lang("zh", Some("http://localhost:1188/translate"));
        assert_eq!(config.backend.target_lang, "zh");
        assert_eq!(config.backend.api_url, "http://localhost:1188/translate");
    }

    #[test]
    fn test_toml_parsing_partial() {
        // 缺省字段应回落到默认值
        let toml_str = r#"
            max_chunk_chars = 2000

            [backend]
            target_lang = "ja"
        "#;
        let config: SessionConfig = toml::from_str(toml_str).expect("Partial TOML should parse");
        assert_eq!(config.max_chunk_chars, 2000);
        assert_eq!(config.backend.target_lang, "ja");
        assert_eq!(config.primary_min_words, constants::PRIMARY_MIN_WORDS);
    }

    #[test]
    fn test_validate_rejects_bad_cascade() {
        let mut config = SessionConfig::default();
        config.fallback_min_words = 20;
        assert!(config.validate().is_err(), "Increasing cascade thresholds should be rejected");

        let mut config = SessionConfig::default();
        config.max_chunk_chars = 0;
        assert!(config.validate().is_err(), "Zero chunk budget should be rejected");
    }
}
