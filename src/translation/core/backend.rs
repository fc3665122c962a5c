//! 翻译后端抽象
//!
//! 每个提供方实现 [`TranslationBackend`]，核心通过 [`BackendRegistry`] 统一调用，
//! 不关心具体的 HTTP 细节。

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::translation::error::{TranslationError, TranslationResult};

/// 翻译服务种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    /// 基线服务，其它服务失败时的兜底
    #[default]
    Google,
    Deeplx,
    Libre,
    #[serde(rename = "openai")]
    OpenAi,
}

impl ServiceKind {
    pub const BASELINE: ServiceKind = ServiceKind::Google;
    pub const ALL: [ServiceKind; 4] = [
        ServiceKind::Google,
        ServiceKind::Deeplx,
        ServiceKind::Libre,
        ServiceKind::OpenAi,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ServiceKind::Google => "google",
            ServiceKind::Deeplx => "deeplx",
            ServiceKind::Libre => "libre",
            ServiceKind::OpenAi => "openai",
        }
    }

    pub fn is_baseline(self) -> bool {
        self == Self::BASELINE
    }

    /// 宽松解析：未知值回退到基线服务
    pub fn parse_lenient(value: &str) -> Self {
        value.parse().unwrap_or_else(|_| {
            tracing::warn!("未知翻译服务 '{}'，回退到 {}", value, Self::BASELINE);
            Self::BASELINE
        })
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceKind {
    type Err = TranslationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google" => Ok(ServiceKind::Google),
            "deeplx" => Ok(ServiceKind::Deeplx),
            "libre" | "libretranslate" => Ok(ServiceKind::Libre),
            "openai" => Ok(ServiceKind::OpenAi),
            other => Err(TranslationError::InvalidInput(format!(
                "未知翻译服务: {}",
                other
            ))),
        }
    }
}

/// 连通性检测结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    pub service: ServiceKind,
    pub ok: bool,
    pub message: String,
    #[serde(with = "duration_millis")]
    pub elapsed: Duration,
}

mod duration_millis {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }
}

/// 单次文本翻译能力
#[async_trait]
pub trait TranslationBackend: Send + Sync {
    /// 服务种类
    fn service(&self) -> ServiceKind;

    /// 单次请求超时
    fn request_timeout(&self) -> Duration;

    /// 翻译一段文本。目标/源语言为已规范化的小写代码，源语言可能是 `auto`。
    async fn send(&self, text: &str, target_lang: &str, source_lang: &str)
        -> TranslationResult<String>;

    /// 连通性检测：只确认服务可达并返回了非空结果，不评估译文质量
    async fn probe(&self, target_lang: &str) -> ProbeReport {
        let started = Instant::now();
        let result = tokio::time::timeout(
            self.request_timeout(),
            self.send("Hello", target_lang, "auto"),
        )
        .await
        .map_err(TranslationError::from)
        .and_then(|inner| inner);

        let (ok, message) = match result {
            Ok(text) if !text.trim().is_empty() => (true, format!("连接成功，示例译文: {}", text.trim())),
            Ok(_) => (false, "服务返回了空结果".to_string()),
            Err(e) => (false, e.to_string()),
        };

        ProbeReport {
            service: self.service(),
            ok,
            message,
            elapsed: started.elapsed(),
        }
    }
}

/// 按服务种类索引的后端集合
#[derive(Clone, Default)]
pub struct BackendRegistry {
    backends: HashMap<ServiceKind, Arc<dyn TranslationBackend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册后端，同种类的旧后端被替换
    pub fn register(&mut self, backend: Arc<dyn TranslationBackend>) -> &mut Self {
        self.backends.insert(backend.service(), backend);
        self
    }

    pub fn with(mut self, backend: Arc<dyn TranslationBackend>) -> Self {
        self.register(backend);
        self
    }

    pub fn get(&self, service: ServiceKind) -> Option<Arc<dyn TranslationBackend>> {
        self.backends.get(&service).cloned()
    }

    pub fn contains(&self, service: ServiceKind) -> bool {
        self.backends.contains_key(&service)
    }

    /// 已注册的服务，按固定顺序
    pub fn services(&self) -> Vec<ServiceKind> {
        ServiceKind::ALL
            .into_iter()
            .filter(|kind| self.backends.contains_key(kind))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("services", &self.services())
            .finish()
    }
}
