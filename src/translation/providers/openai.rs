//! OpenAI 兼容的对话补全接口
//!
//! 同一实现覆盖 OpenAI、OpenRouter、通义千问（DashScope）、SiliconFlow 等兼容服务，
//! 按基础地址的主机名识别厂商差异。

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{http_client, join_url, language_name, read_json};
use crate::translation::config::{constants, OpenAiSettings};
use crate::translation::core::backend::{ServiceKind, TranslationBackend};
use crate::translation::error::{TranslationError, TranslationResult};

/// 兼容服务的厂商变体
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vendor {
    Generic,
    OpenAi,
    OpenRouter,
    Qwen,
    SiliconFlow,
}

impl Vendor {
    /// 根据基础地址的主机名识别厂商，缺少 scheme 时按 https 解析
    pub fn detect(base_url: &str) -> Self {
        let trimmed = base_url.trim();
        let host = url::Url::parse(trimmed)
            .ok()
            .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
            .or_else(|| {
                url::Url::parse(&format!("https://{}", trimmed.trim_start_matches('/')))
                    .ok()
                    .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
            });

        let Some(host) = host else {
            return Vendor::Generic;
        };

        if host.contains("openrouter.ai") {
            Vendor::OpenRouter
        } else if host.contains("aliyuncs.com") || host.contains("dashscope") {
            Vendor::Qwen
        } else if host.contains("siliconflow.cn") {
            Vendor::SiliconFlow
        } else if host.contains("openai.com") {
            Vendor::OpenAi
        } else {
            Vendor::Generic
        }
    }
}

pub struct OpenAiBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    prompt: String,
    vendor: Vendor,
    timeout: Duration,
}

impl OpenAiBackend {
    pub fn new(settings: &OpenAiSettings) -> TranslationResult<Self> {
        let timeout = Duration::from_secs(settings.timeout_secs.max(1));
        let base_url = settings.base_url.trim().trim_end_matches('/').to_string();
        let model = match settings.model.trim() {
            "" => constants::OPENAI_DEFAULT_MODEL.to_string(),
            model => model.to_string(),
        };

        Ok(Self {
            client: http_client(timeout)?,
            vendor: Vendor::detect(&base_url),
            base_url,
            api_key: settings.api_key.trim().to_string(),
            model,
            prompt: settings.prompt.clone(),
            timeout,
        })
    }

    pub fn vendor(&self) -> Vendor {
        self.vendor
    }

    /// 用模板生成系统提示词
    pub fn system_prompt(&self, target_lang: &str, source_lang: &str) -> String {
        let template = if self.prompt.trim().is_empty() {
            constants::OPENAI_DEFAULT_PROMPT
        } else {
            self.prompt.as_str()
        };

        let source_name = language_name(source_lang);
        let source_instruction = match source_lang.trim() {
            "" | "auto" => String::new(),
            code => format!(" from {} (locale: {})", source_name, code),
        };

        template
            .replace("{{target_lang_name}}", &language_name(target_lang))
            .replace("{{target_lang}}", target_lang)
            .replace("{{source_lang_name}}", &source_name)
            .replace("{{source_lang}}", source_lang)
            .replace("{{source_instruction}}", &source_instruction)
    }

    fn build_payload(&self, text: &str, target_lang: &str, source_lang: &str) -> Value {
        let mut payload = json!({
            "model": self.model,
            "temperature": 0,
            "messages": [
                {"role": "system", "content": self.system_prompt(target_lang, source_lang)},
                {"role": "user", "content": text},
            ],
        });

        if self.vendor == Vendor::Qwen {
            let source = if source_lang.is_empty() { "auto" } else { source_lang };
            payload["extra_body"] = json!({
                "translation_options": {
                    "source_lang": source,
                    "target_lang": target_lang,
                }
            });
        }

        payload
    }

    fn parse_response(value: &Value) -> TranslationResult<String> {
        let choice = value.get("choices").and_then(|c| c.get(0));
        let content = choice
            .and_then(|c| c.pointer("/message/content"))
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .or_else(|| choice.and_then(|c| c.get("text")).and_then(Value::as_str));

        if let Some(content) = content {
            return Ok(content.trim().to_string());
        }

        match value.pointer("/error/message").and_then(Value::as_str) {
            Some(message) => Err(TranslationError::ServiceError(format!("OpenAI 兼容服务错误: {}", message))),
            None => Err(TranslationError::ParseError(format!("OpenAI 兼容服务响应无法识别: {}", value))),
        }
    }
}

#[async_trait]
impl TranslationBackend for OpenAiBackend {
    fn service(&self) -> ServiceKind {
        ServiceKind::OpenAi
    }

    fn request_timeout(&self) -> Duration {
        self.timeout
    }

    async fn send(&self, text: &str, target_lang: &str, source_lang: &str) -> TranslationResult<String> {
        if self.base_url.is_empty() || self.api_key.is_empty() {
            return Err(TranslationError::ConfigError("OpenAI 兼容服务未配置地址或密钥".to_string()));
        }

        let endpoint = join_url(&self.base_url, "chat/completions");
        tracing::debug!("OpenAI 兼容请求 endpoint={} vendor={:?} model={}", endpoint, self.vendor, self.model);

        let mut request = self
            .client
            .post(&endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.build_payload(text, target_lang, source_lang));

        if self.vendor == Vendor::OpenRouter {
            request = request
                .header("HTTP-Referer", "https://github.com/feed-translate/feed-translate")
                .header("X-Title", "feed-translate");
        }

        let response = request.send().await?;
        let value = read_json(response, ServiceKind::OpenAi).await?;
        Self::parse_response(&value)
    }
}
