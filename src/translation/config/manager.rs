//! 配置管理器
//!
//! 分层加载：`.env` 文件 → 内置默认值 → 配置文件（TOML）→ `FEED_TRANSLATE_*` 环境变量 → 校验。

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use config::{Config, File, FileFormat};
use serde::{Deserialize, Serialize};

use super::{
    constants, normalize_source_lang, normalize_target_lang, DisplayMode, FeedPolicy,
    PipelineConfig,
};
use crate::env::EnvVar;
use crate::translation::core::backend::ServiceKind;
use crate::translation::core::retry::RetryPolicy;
use crate::translation::error::{TranslationError, TranslationResult};

/// 订阅源设置
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct FeedSettings {
    pub enabled: bool,
    pub source_lang: String,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            source_lang: constants::DEFAULT_SOURCE_LANG.to_string(),
        }
    }
}

/// Google 设置
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct GoogleSettings {
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for GoogleSettings {
    fn default() -> Self {
        Self {
            endpoint: constants::GOOGLE_ENDPOINT.to_string(),
            timeout_secs: constants::GOOGLE_TIMEOUT_SECS,
        }
    }
}

/// DeepLX 设置
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DeeplxSettings {
    /// 为空表示未配置
    pub url: String,
    pub timeout_secs: u64,
}

impl Default for DeeplxSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout_secs: constants::DEEPLX_TIMEOUT_SECS,
        }
    }
}

/// LibreTranslate 设置
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LibreSettings {
    pub url: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

impl Default for LibreSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            timeout_secs: constants::LIBRE_TIMEOUT_SECS,
        }
    }
}

/// OpenAI 兼容服务设置
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct OpenAiSettings {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    /// 系统提示词模板，为空时使用内置模板
    pub prompt: String,
    pub timeout_secs: u64,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            base_url: constants::OPENAI_BASE_URL.to_string(),
            api_key: String::new(),
            model: constants::OPENAI_DEFAULT_MODEL.to_string(),
            prompt: String::new(),
            timeout_secs: constants::OPENAI_TIMEOUT_SECS,
        }
    }
}

/// 重试设置
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: constants::DEFAULT_MAX_ATTEMPTS,
            initial_backoff_ms: constants::DEFAULT_INITIAL_BACKOFF_MS,
        }
    }
}

/// 缓存设置
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,
    pub capacity: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: constants::DEFAULT_CACHE_CAPACITY,
        }
    }
}

/// 批处理设置
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BatchSettings {
    pub max_concurrent_items: usize,
    /// 单条目截止时长（秒），0 表示不限
    pub item_timeout_secs: u64,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            max_concurrent_items: constants::DEFAULT_MAX_CONCURRENT_ITEMS,
            item_timeout_secs: constants::DEFAULT_ITEM_TIMEOUT_SECS,
        }
    }
}

/// 翻译设置（面向文件与环境变量，可变）
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TranslationSettings {
    pub target_lang: String,
    pub service: String,
    pub display_mode: String,
    pub translate_title: bool,
    pub translate_content: bool,
    pub pipeline_version: String,
    pub feeds: BTreeMap<String, FeedSettings>,
    pub google: GoogleSettings,
    pub deeplx: DeeplxSettings,
    pub libre: LibreSettings,
    pub openai: OpenAiSettings,
    pub retry: RetrySettings,
    pub cache: CacheSettings,
    pub batch: BatchSettings,
}

impl Default for TranslationSettings {
    fn default() -> Self {
        Self {
            target_lang: constants::DEFAULT_TARGET_LANG.to_string(),
            service: ServiceKind::BASELINE.as_str().to_string(),
            display_mode: DisplayMode::default().as_str().to_string(),
            translate_title: true,
            translate_content: false,
            pipeline_version: constants::PIPELINE_VERSION.to_string(),
            feeds: BTreeMap::new(),
            google: GoogleSettings::default(),
            deeplx: DeeplxSettings::default(),
            libre: LibreSettings::default(),
            openai: OpenAiSettings::default(),
            retry: RetrySettings::default(),
            cache: CacheSettings::default(),
            batch: BatchSettings::default(),
        }
    }
}

impl TranslationSettings {
    /// 启用某个订阅源
    pub fn enable_feed(&mut self, feed_id: impl Into<String>, source_lang: impl Into<String>) {
        self.feeds.insert(
            feed_id.into(),
            FeedSettings {
                enabled: true,
                source_lang: source_lang.into(),
            },
        );
    }

    /// 验证配置
    pub fn validate(&self) -> TranslationResult<()> {
        if self.retry.max_attempts == 0 {
            return Err(TranslationError::ConfigError("重试次数不能为0".to_string()));
        }

        if self.batch.max_concurrent_items == 0 {
            return Err(TranslationError::ConfigError("最大并发条目数不能为0".to_string()));
        }

        if self.cache.enabled && self.cache.capacity == 0 {
            return Err(TranslationError::ConfigError("启用缓存时缓存容量不能为0".to_string()));
        }

        if self.pipeline_version.trim().is_empty() {
            return Err(TranslationError::ConfigError("流水线版本不能为空".to_string()));
        }

        for (name, url) in [
            ("google.endpoint", &self.google.endpoint),
            ("deeplx.url", &self.deeplx.url),
            ("libre.url", &self.libre.url),
            ("openai.base_url", &self.openai.base_url),
        ] {
            if !url.trim().is_empty() && url::Url::parse(url.trim()).is_err() {
                return Err(TranslationError::ConfigError(format!("{} 不是有效的URL: {}", name, url)));
            }
        }

        Ok(())
    }

    /// 应用环境变量覆盖（只覆盖显式设置的变量）
    pub fn apply_env_overrides(&mut self) {
        use crate::env::{batch, cache, providers, retry, translation, EnvResult};

        fn apply<T>(result: EnvResult<Option<T>>, target: impl FnOnce(T)) {
            match result {
                Ok(Some(value)) => target(value),
                Ok(None) => {}
                Err(e) => tracing::warn!("忽略无效的环境变量: {}", e),
            }
        }

        apply(translation::TargetLang::lookup(), |v| self.target_lang = v);
        apply(translation::Service::lookup(), |v| self.service = v.as_str().to_string());
        apply(translation::DisplayMode::lookup(), |v| self.display_mode = v.as_str().to_string());
        apply(translation::TranslateTitle::lookup(), |v| self.translate_title = v);
        apply(translation::TranslateContent::lookup(), |v| self.translate_content = v);

        apply(providers::DeeplxUrl::lookup(), |v| {
            tracing::info!("环境变量覆盖 DeepLX URL: {}", v);
            self.deeplx.url = v;
        });
        apply(providers::LibreUrl::lookup(), |v| self.libre.url = v);
        apply(providers::LibreApiKey::lookup(), |v| self.libre.api_key = v);
        apply(providers::OpenAiBaseUrl::lookup(), |v| self.openai.base_url = v);
        apply(providers::OpenAiApiKey::lookup(), |v| self.openai.api_key = v);
        apply(providers::OpenAiModel::lookup(), |v| self.openai.model = v);

        apply(retry::MaxAttempts::lookup(), |v| self.retry.max_attempts = v as u32);
        apply(retry::InitialBackoff::lookup(), |v| {
            self.retry.initial_backoff_ms = v.as_millis() as u64
        });

        apply(cache::Enabled::lookup(), |v| self.cache.enabled = v);
        apply(cache::Capacity::lookup(), |v| self.cache.capacity = v);

        apply(batch::MaxConcurrentItems::lookup(), |v| self.batch.max_concurrent_items = v);
        apply(batch::ItemTimeout::lookup(), |v| self.batch.item_timeout_secs = v.as_secs());
    }

    /// 一次性解析默认值，得到不可变的配置快照
    pub fn snapshot(&self) -> PipelineConfig {
        let feeds = self
            .feeds
            .iter()
            .map(|(id, feed)| {
                (
                    id.trim().to_string(),
                    FeedPolicy {
                        enabled: feed.enabled,
                        source_lang: normalize_source_lang(&feed.source_lang),
                    },
                )
            })
            .collect();

        let pipeline_version = match self.pipeline_version.trim() {
            "" => constants::PIPELINE_VERSION.to_string(),
            version => version.to_string(),
        };

        PipelineConfig {
            target_lang: normalize_target_lang(&self.target_lang),
            service: ServiceKind::parse_lenient(&self.service),
            display_mode: DisplayMode::parse_lenient(&self.display_mode),
            translate_title: self.translate_title,
            translate_content: self.translate_content,
            pipeline_version,
            feeds,
            retry: RetryPolicy {
                max_attempts: self.retry.max_attempts.max(1),
                initial_backoff: Duration::from_millis(self.retry.initial_backoff_ms),
            },
            cache_enabled: self.cache.enabled,
            cache_capacity: self.cache.capacity.max(1),
            max_concurrent_items: self.batch.max_concurrent_items.max(1),
            item_timeout: match self.batch.item_timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        }
    }
}

/// 配置管理器
#[derive(Debug, Clone)]
pub struct ConfigManager {
    settings: TranslationSettings,
    source: Option<String>,
}

impl ConfigManager {
    /// 按搜索路径加载配置
    pub fn new() -> TranslationResult<Self> {
        Self::load(None)
    }

    /// 从指定文件加载配置，文件必须存在
    pub fn from_file(path: &str) -> TranslationResult<Self> {
        Self::load(Some(path))
    }

    /// 直接包装已有设置（不读取文件与环境变量）
    pub fn from_settings(settings: TranslationSettings) -> TranslationResult<Self> {
        settings.validate()?;
        Ok(Self {
            settings,
            source: None,
        })
    }

    /// 获取设置
    pub fn settings(&self) -> &TranslationSettings {
        &self.settings
    }

    /// 实际加载的配置文件路径
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// 不可变快照
    pub fn snapshot(&self) -> Arc<PipelineConfig> {
        Arc::new(self.settings.snapshot())
    }

    fn load(explicit: Option<&str>) -> TranslationResult<Self> {
        // 首先尝试加载 .env 文件
        Self::load_dotenv();

        let mut builder = Config::builder().add_source(
            Config::try_from(&TranslationSettings::default())
                .map_err(|e| TranslationError::ConfigError(format!("默认配置错误: {}", e)))?,
        );

        let env_path = crate::env::core::ConfigPath::lookup().ok().flatten();
        let source = match explicit.map(str::to_string).or(env_path) {
            Some(path) => {
                let expanded = shellexpand::tilde(&path).to_string();
                if !Path::new(&expanded).exists() {
                    return Err(TranslationError::ConfigError(format!(
                        "配置文件不存在: {}",
                        expanded
                    )));
                }
                Some(expanded)
            }
            None => constants::CONFIG_PATHS
                .iter()
                .map(|path| shellexpand::tilde(path).to_string())
                .find(|path| Path::new(path).exists()),
        };

        match &source {
            Some(path) => {
                tracing::info!("加载配置文件: {}", path);
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            }
            None => tracing::info!("未找到配置文件，使用默认配置"),
        }

        let mut settings: TranslationSettings = builder
            .build()
            .map_err(|e| TranslationError::ConfigError(format!("构建配置失败: {}", e)))?
            .try_deserialize()
            .map_err(|e| TranslationError::ConfigError(format!("反序列化配置失败: {}", e)))?;

        settings.apply_env_overrides();
        settings.validate()?;

        tracing::debug!(
            "加载的配置 - 目标语言: {}, 服务: {}, 显示模式: {}",
            settings.target_lang,
            settings.service,
            settings.display_mode
        );

        Ok(Self { settings, source })
    }

    /// 加载 .env 文件
    fn load_dotenv() {
        for env_file in constants::DOTENV_FILES {
            if Path::new(env_file).exists() && dotenv::from_filename(env_file).is_ok() {
                tracing::info!("已加载环境变量文件: {}", env_file);
                break;
            }
        }
    }

    /// 生成示例配置文件
    pub fn generate_example_config(path: &str) -> TranslationResult<()> {
        let mut example = TranslationSettings::default();
        example.enable_feed("1", "auto");
        example.deeplx.url = "http://localhost:1188/translate".to_string();

        let content = toml::to_string_pretty(&example)
            .map_err(|e| TranslationError::ConfigError(format!("序列化配置失败: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| TranslationError::ConfigError(format!("写入配置文件失败: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        let settings = TranslationSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.retry.max_attempts, 2);
        assert_eq!(settings.retry.initial_backoff_ms, 1000);
        assert!(settings.translate_title);
        assert!(!settings.translate_content);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut settings = TranslationSettings::default();
        settings.batch.max_concurrent_items = 0;
        assert!(settings.validate().is_err());

        let mut settings = TranslationSettings::default();
        settings.deeplx.url = "not a url".into();
        assert!(matches!(settings.validate(), Err(TranslationError::ConfigError(_))));
    }

    #[test]
    fn test_snapshot_resolves_defaults() {
        let mut settings = TranslationSettings::default();
        settings.target_lang = "AUTO".into();
        settings.service = "unknown".into();
        settings.display_mode = "weird".into();
        settings.enable_feed(" 9 ", "EN_us");
        settings.batch.item_timeout_secs = 0;

        let snapshot = settings.snapshot();
        assert_eq!(snapshot.target_lang, "zh-cn");
        assert_eq!(snapshot.service, ServiceKind::Google);
        assert_eq!(snapshot.display_mode, DisplayMode::OrigThenTrans);
        assert_eq!(snapshot.source_lang_for(Some("9")), "en-us");
        assert!(snapshot.item_timeout.is_none());
        assert_eq!(snapshot.retry.initial_backoff, Duration::from_secs(1));
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
target_lang = "ja"
service = "libre"
display_mode = "translated_only"
translate_content = true

[libre]
url = "http://localhost:5000"

[feeds.42]
enabled = true
source_lang = "en"
"#
        )
        .unwrap();

        let manager = ConfigManager::from_file(file.path().to_str().unwrap()).unwrap();
        let settings = manager.settings();
        assert_eq!(settings.service, "libre");
        assert_eq!(settings.libre.url, "http://localhost:5000");
        assert_eq!(settings.libre.timeout_secs, constants::LIBRE_TIMEOUT_SECS);
        assert!(settings.translate_content);

        let snapshot = manager.snapshot();
        assert_eq!(snapshot.display_mode, DisplayMode::TranslatedOnly);
        assert!(snapshot.is_feed_enabled(Some("42")));
        assert_eq!(manager.source(), file.path().to_str());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let result = ConfigManager::from_file("/definitely/not/here.toml");
        assert!(matches!(result, Err(TranslationError::ConfigError(_))));
    }

    #[test]
    fn test_generate_example_config_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("example.toml");
        ConfigManager::generate_example_config(path.to_str().unwrap()).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: TranslationSettings = toml::from_str(&content).unwrap();
        assert_eq!(parsed.deeplx.url, "http://localhost:1188/translate");
        assert!(parsed.feeds.contains_key("1"));
    }
}
