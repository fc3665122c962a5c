//! Google 网页翻译接口（基线服务，无需密钥）

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{format_google_lang, http_client, read_json};
use crate::translation::config::GoogleSettings;
use crate::translation::core::backend::{ServiceKind, TranslationBackend};
use crate::translation::error::{TranslationError, TranslationResult};

pub struct GoogleBackend {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl GoogleBackend {
    pub fn new(settings: &GoogleSettings) -> TranslationResult<Self> {
        let timeout = Duration::from_secs(settings.timeout_secs.max(1));
        Ok(Self {
            client: http_client(timeout)?,
            endpoint: settings.endpoint.trim().to_string(),
            timeout,
        })
    }

    /// 拼接响应中的所有句子：`[[["译文", "原文", ...], ...], ...]`
    fn parse_response(value: &Value) -> TranslationResult<String> {
        let sentences = value
            .get(0)
            .and_then(Value::as_array)
            .ok_or_else(|| TranslationError::ParseError("Google 响应缺少句子数组".to_string()))?;

        let text: String = sentences
            .iter()
            .filter_map(|sentence| sentence.get(0).and_then(Value::as_str))
            .collect();

        Ok(text)
    }
}

#[async_trait]
impl TranslationBackend for GoogleBackend {
    fn service(&self) -> ServiceKind {
        ServiceKind::Google
    }

    fn request_timeout(&self) -> Duration {
        self.timeout
    }

    async fn send(&self, text: &str, target_lang: &str, source_lang: &str) -> TranslationResult<String> {
        if self.endpoint.is_empty() {
            return Err(TranslationError::ConfigError("Google 接口地址未配置".to_string()));
        }

        let source = if source_lang.trim().is_empty() { "auto" } else { source_lang };
        let target = format_google_lang(target_lang);

        tracing::debug!("Google 翻译请求: {} 字符, {} -> {}", text.chars().count(), source, target);

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("client", "gtx"),
                ("sl", source),
                ("tl", target.as_str()),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await?;

        let value = read_json(response, ServiceKind::Google).await?;
        Self::parse_response(&value)
    }
}
