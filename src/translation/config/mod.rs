//! 翻译配置管理模块
//!
//! 可变的 [`TranslationSettings`] 面向文件与环境变量；每次处理调用前通过
//! [`TranslationSettings::snapshot`] 一次性解析默认值，得到不可变的 [`PipelineConfig`]。

pub mod manager;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::translation::core::backend::ServiceKind;
use crate::translation::core::retry::RetryPolicy;
use crate::translation::error::TranslationError;

// 重新导出主要类型
pub use manager::{
    BatchSettings, CacheSettings, ConfigManager, DeeplxSettings, FeedSettings, GoogleSettings,
    LibreSettings, OpenAiSettings, RetrySettings, TranslationSettings,
};

/// 配置常量
pub mod constants {
    /// 默认目标语言
    pub const DEFAULT_TARGET_LANG: &str = "zh-cn";
    /// 默认源语言
    pub const DEFAULT_SOURCE_LANG: &str = "auto";
    /// 流水线版本，参与签名计算
    pub const PIPELINE_VERSION: &str = env!("CARGO_PKG_VERSION");

    // 重试
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;
    pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 1000;

    // 缓存与批处理
    pub const DEFAULT_CACHE_CAPACITY: usize = 512;
    pub const DEFAULT_MAX_CONCURRENT_ITEMS: usize = 4;
    pub const DEFAULT_ITEM_TIMEOUT_SECS: u64 = 120;

    // 各服务请求超时（秒）
    pub const GOOGLE_TIMEOUT_SECS: u64 = 3;
    pub const DEEPLX_TIMEOUT_SECS: u64 = 5;
    pub const LIBRE_TIMEOUT_SECS: u64 = 10;
    pub const OPENAI_TIMEOUT_SECS: u64 = 15;

    // 服务默认地址
    pub const GOOGLE_ENDPOINT: &str = "https://translate.googleapis.com/translate_a/single";
    pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
    pub const OPENAI_DEFAULT_MODEL: &str = "gpt-3.5-turbo";

    /// 大模型翻译的系统提示词模板
    pub const OPENAI_DEFAULT_PROMPT: &str = "You are a professional translation engine. \
Translate the user's text{{source_instruction}} into {{target_lang_name}} ({{target_lang}}). \
Keep the original meaning and formatting, and answer with the translated text only.";

    // 配置文件搜索路径
    pub const CONFIG_PATHS: &[&str] = &[
        "feed-translate.toml",
        ".feed-translate.toml",
        "~/.config/feed-translate/config.toml",
        "/etc/feed-translate/config.toml",
    ];

    // 环境变量文件
    pub const DOTENV_FILES: &[&str] = &[".env.local", ".env"];
}

/// 原文与译文的展示方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    /// 只显示译文
    TranslatedOnly,
    /// 原文在前，译文在后
    #[default]
    OrigThenTrans,
    /// 译文在前，原文在后
    TransThenOrig,
}

impl DisplayMode {
    pub const ALL: [DisplayMode; 3] = [
        DisplayMode::TranslatedOnly,
        DisplayMode::OrigThenTrans,
        DisplayMode::TransThenOrig,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DisplayMode::TranslatedOnly => "translated_only",
            DisplayMode::OrigThenTrans => "orig_then_trans",
            DisplayMode::TransThenOrig => "trans_then_orig",
        }
    }

    /// 宽松解析：未知值回退到默认模式
    pub fn parse_lenient(value: &str) -> Self {
        value.parse().unwrap_or_else(|_| {
            tracing::warn!("未知显示模式 '{}'，使用 {}", value, Self::default());
            Self::default()
        })
    }

    /// 按显示模式组合标题
    pub fn compose_title(self, original: &str, translated: &str) -> String {
        match self {
            DisplayMode::TranslatedOnly => translated.to_string(),
            DisplayMode::OrigThenTrans => format!("{} | {}", original, translated),
            DisplayMode::TransThenOrig => format!("{} | {}", translated, original),
        }
    }
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DisplayMode {
    type Err = TranslationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "translated_only" => Ok(DisplayMode::TranslatedOnly),
            "orig_then_trans" => Ok(DisplayMode::OrigThenTrans),
            "trans_then_orig" => Ok(DisplayMode::TransThenOrig),
            other => Err(TranslationError::InvalidInput(format!("未知显示模式: {}", other))),
        }
    }
}

/// 规范化语言代码：去空白、小写、`_` 转 `-`
pub fn normalize_lang_code(code: &str) -> String {
    code.trim().to_ascii_lowercase().replace('_', "-")
}

/// 规范化目标语言：空值或 `auto` 视为默认目标语言
pub fn normalize_target_lang(code: &str) -> String {
    let lang = normalize_lang_code(code);
    if lang.is_empty() || lang == "auto" {
        constants::DEFAULT_TARGET_LANG.to_string()
    } else {
        lang
    }
}

/// 规范化源语言：空值视为 `auto`
pub fn normalize_source_lang(code: &str) -> String {
    let lang = normalize_lang_code(code);
    if lang.is_empty() {
        constants::DEFAULT_SOURCE_LANG.to_string()
    } else {
        lang
    }
}

/// 单个订阅源的解析后策略
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedPolicy {
    pub enabled: bool,
    pub source_lang: String,
}

/// 一次处理调用使用的不可变配置快照
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub target_lang: String,
    pub service: ServiceKind,
    pub display_mode: DisplayMode,
    pub translate_title: bool,
    pub translate_content: bool,
    pub pipeline_version: String,
    pub feeds: HashMap<String, FeedPolicy>,
    pub retry: RetryPolicy,
    pub cache_enabled: bool,
    pub cache_capacity: usize,
    pub max_concurrent_items: usize,
    /// 单条目处理截止时长，`None` 表示不限
    pub item_timeout: Option<Duration>,
}

impl PipelineConfig {
    /// 订阅源是否启用翻译；没有订阅源 ID 的条目视为未启用
    pub fn is_feed_enabled(&self, feed_id: Option<&str>) -> bool {
        feed_id
            .and_then(|id| self.feeds.get(id))
            .is_some_and(|feed| feed.enabled)
    }

    /// 订阅源的源语言，未配置时为 `auto`
    pub fn source_lang_for(&self, feed_id: Option<&str>) -> &str {
        feed_id
            .and_then(|id| self.feeds.get(id))
            .map_or(constants::DEFAULT_SOURCE_LANG, |feed| feed.source_lang.as_str())
    }

    /// 标题和正文开关都关闭
    pub fn is_disabled(&self) -> bool {
        !self.translate_title && !self.translate_content
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        TranslationSettings::default().snapshot()
    }
}
