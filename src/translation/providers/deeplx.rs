//! DeepLX 自建接口

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use super::{format_deeplx_lang, http_client, read_json};
use crate::translation::config::DeeplxSettings;
use crate::translation::core::backend::{ServiceKind, TranslationBackend};
use crate::translation::error::{TranslationError, TranslationResult};

#[derive(Debug, Serialize)]
struct DeeplxRequest<'a> {
    text: &'a str,
    source_lang: &'a str,
    target_lang: String,
}

pub struct DeeplxBackend {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl DeeplxBackend {
    pub fn new(settings: &DeeplxSettings) -> TranslationResult<Self> {
        let timeout = Duration::from_secs(settings.timeout_secs.max(1));
        Ok(Self {
            client: http_client(timeout)?,
            url: settings.url.trim().to_string(),
            timeout,
        })
    }

    fn parse_response(value: &Value) -> TranslationResult<String> {
        match value.get("data").and_then(Value::as_str) {
            Some(data) => Ok(data.to_string()),
            None => Err(TranslationError::ParseError(format!(
                "DeepLX 响应缺少 data 字段: {}",
                value
            ))),
        }
    }
}

#[async_trait]
impl TranslationBackend for DeeplxBackend {
    fn service(&self) -> ServiceKind {
        ServiceKind::Deeplx
    }

    fn request_timeout(&self) -> Duration {
        self.timeout
    }

    /// DeepLX 始终自动检测源语言
    async fn send(&self, text: &str, target_lang: &str, _source_lang: &str) -> TranslationResult<String> {
        if self.url.is_empty() {
            return Err(TranslationError::ConfigError("DeepLX URL 未配置".to_string()));
        }

        let request = DeeplxRequest {
            text,
            source_lang: "auto",
            target_lang: format_deeplx_lang(target_lang),
        };

        tracing::debug!("DeepLX 翻译请求: {} 字符 -> {}", text.chars().count(), request.target_lang);

        let response = self.client.post(&self.url).json(&request).send().await?;
        let value = read_json(response, ServiceKind::Deeplx).await?;
        Self::parse_response(&value)
    }
}
