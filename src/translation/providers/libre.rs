//! LibreTranslate 自建或托管实例

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use super::{format_libre_lang, http_client, join_url, read_json};
use crate::translation::config::LibreSettings;
use crate::translation::core::backend::{ServiceKind, TranslationBackend};
use crate::translation::error::{TranslationError, TranslationResult};

#[derive(Debug, Serialize)]
struct LibreRequest<'a> {
    q: &'a str,
    source: String,
    target: String,
    format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

pub struct LibreBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl LibreBackend {
    pub fn new(settings: &LibreSettings) -> TranslationResult<Self> {
        let timeout = Duration::from_secs(settings.timeout_secs.max(1));
        Ok(Self {
            client: http_client(timeout)?,
            base_url: settings.url.trim().to_string(),
            api_key: settings.api_key.trim().to_string(),
            timeout,
        })
    }

    fn build_request<'a>(&'a self, text: &'a str, target_lang: &str, source_lang: &str) -> LibreRequest<'a> {
        LibreRequest {
            q: text,
            source: format_libre_lang(source_lang),
            target: format_libre_lang(target_lang),
            format: "text",
            api_key: (!self.api_key.is_empty()).then_some(self.api_key.as_str()),
        }
    }

    fn parse_response(value: &Value) -> TranslationResult<String> {
        if let Some(text) = value.get("translatedText").and_then(Value::as_str) {
            return Ok(text.to_string());
        }
        match value.get("error").and_then(Value::as_str) {
            Some(error) => Err(TranslationError::ServiceError(format!("LibreTranslate 错误: {}", error))),
            None => Err(TranslationError::ParseError(format!("LibreTranslate 响应无法识别: {}", value))),
        }
    }
}

#[async_trait]
impl TranslationBackend for LibreBackend {
    fn service(&self) -> ServiceKind {
        ServiceKind::Libre
    }

    fn request_timeout(&self) -> Duration {
        self.timeout
    }

    async fn send(&self, text: &str, target_lang: &str, source_lang: &str) -> TranslationResult<String> {
        if self.base_url.is_empty() {
            return Err(TranslationError::ConfigError("LibreTranslate URL 未配置".to_string()));
        }

        let url = join_url(&self.base_url, "translate");
        let request = self.build_request(text, target_lang, source_lang);
        tracing::debug!("LibreTranslate 请求 url={} source={} target={}", url, request.source, request.target);

        let response = self.client.post(&url).json(&request).send().await?;
        let value = read_json(response, ServiceKind::Libre).await?;
        Self::parse_response(&value)
    }
}
