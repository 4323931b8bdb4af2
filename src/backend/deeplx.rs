//! DeepLX 翻译后端
//!
//! 对接 DeepLX 风格的翻译接口：
//! POST `{text, source_lang, target_lang}` → `{code, data}`。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use super::{BackendConfig, BackendError, TranslationBackend};

/// DeepLX 后端
#[derive(Debug)]
pub struct DeeplxBackend {
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct DeeplxRequest {
    text: String,
    source_lang: String,
    target_lang: String,
}

#[derive(Debug, Deserialize)]
struct DeeplxResponse {
    code: i64,
    data: Option<String>,
}

impl DeeplxBackend {
    /// 创建后端实例
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for DeeplxBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TranslationBackend for DeeplxBackend {
    fn name(&self) -> &'static str {
        "deeplx"
    }

    async fn translate(
        &self,
        markup: &str,
        config: &BackendConfig,
    ) -> Result<String, BackendError> {
        let endpoint = Url::parse(&config.api_url)
            .map_err(|e| BackendError::transport(format!("无效的 API 地址 {}: {}", config.api_url, e)))?;

        let request = DeeplxRequest {
            text: markup.to_string(),
            source_lang: config.source_lang.to_uppercase(),
            target_lang: config.target_lang.to_uppercase(),
        };

        let mut builder = self.client.post(endpoint).json(&request);
        if let Some(key) = &config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| BackendError::transport(format!("请求发送失败: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::api(
                status.as_u16(),
                format!("翻译接口返回 HTTP {}", status),
            ));
        }

        let body: DeeplxResponse = response.json().await.map_err(|e| {
            BackendError::api(status.as_u16(), format!("响应解析失败: {}", e))
        })?;

        if body.code != 200 {
            return Err(BackendError::api(
                body.code.clamp(0, u16::MAX as i64) as u16,
                format!("翻译接口返回错误码 {}", body.code),
            ));
        }

        match body.data {
            Some(data) if !data.is_empty() => Ok(data),
            _ => Err(BackendError::api(status.as_u16(), "翻译结果为空")),
        }
    }
}
