//! 统一的环境变量管理系统
//!
//! 提供类型安全、可验证的环境变量访问。所有变量以 `FEED_TRANSLATE_` 为前缀，
//! 在配置文件之后应用，覆盖文件中的同名设置。

use std::env;
use std::fmt;
use std::time::Duration;

/// 环境变量解析错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvError {
    pub variable: String,
    pub message: String,
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Environment variable '{}': {}", self.variable, self.message)
    }
}

impl std::error::Error for EnvError {}

pub type EnvResult<T> = Result<T, EnvError>;

/// 环境变量访问器特性
pub trait EnvVar<T> {
    const NAME: &'static str;
    const DEFAULT: Option<T>;
    const DESCRIPTION: &'static str;

    fn parse(value: &str) -> EnvResult<T>;

    /// 读取变量；未设置时使用默认值，没有默认值则报错
    fn get() -> EnvResult<T> {
        match Self::lookup()? {
            Some(value) => Ok(value),
            None => Self::DEFAULT.ok_or_else(|| EnvError {
                variable: Self::NAME.to_string(),
                message: "Required environment variable not set".to_string(),
            }),
        }
    }

    /// 只读取显式设置的值；未设置（或为空）时返回 `Ok(None)`
    fn lookup() -> EnvResult<Option<T>> {
        match env::var(Self::NAME) {
            Ok(value) if !value.trim().is_empty() => Self::parse(&value).map(Some),
            _ => Ok(None),
        }
    }

    fn get_or_default(default: T) -> T {
        Self::get().unwrap_or(default)
    }
}

/// 核心环境变量定义
pub mod core {
    use super::*;

    /// 日志级别
    pub struct LogLevel;
    impl EnvVar<String> for LogLevel {
        const NAME: &'static str = "FEED_TRANSLATE_LOG_LEVEL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Log level: trace, debug, info, warn, error (default: info)";

        fn get() -> EnvResult<String> {
            Ok(Self::lookup()?.unwrap_or_else(|| "info".to_string()))
        }

        fn parse(value: &str) -> EnvResult<String> {
            match value.trim().to_lowercase().as_str() {
                level @ ("trace" | "debug" | "info" | "warn" | "error") => Ok(level.to_string()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!(
                        "Invalid log level '{}'. Use: trace, debug, info, warn, error",
                        value
                    ),
                }),
            }
        }
    }

    /// 显式指定配置文件
    pub struct ConfigPath;
    impl EnvVar<String> for ConfigPath {
        const NAME: &'static str = "FEED_TRANSLATE_CONFIG";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Path of the TOML configuration file to load";

        fn parse(value: &str) -> EnvResult<String> {
            Ok(value.trim().to_string())
        }
    }
}

/// 翻译行为相关环境变量
pub mod translation {
    use super::*;
    use crate::translation::config::{normalize_target_lang, DisplayMode as Mode};
    use crate::translation::core::backend::ServiceKind;

    /// 目标语言
    pub struct TargetLang;
    impl EnvVar<String> for TargetLang {
        const NAME: &'static str = "FEED_TRANSLATE_TARGET_LANG";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Target language code, e.g. zh-cn, ja, en (default: zh-cn)";

        fn parse(value: &str) -> EnvResult<String> {
            let lang = normalize_target_lang(value);
            let valid = lang
                .split('-')
                .all(|part| !part.is_empty() && part.len() <= 8 && part.chars().all(|c| c.is_ascii_alphanumeric()));
            if valid {
                Ok(lang)
            } else {
                Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!("Invalid language code '{}'", value),
                })
            }
        }
    }

    /// 翻译服务
    pub struct Service;
    impl EnvVar<ServiceKind> for Service {
        const NAME: &'static str = "FEED_TRANSLATE_SERVICE";
        const DEFAULT: Option<ServiceKind> = Some(ServiceKind::Google);
        const DESCRIPTION: &'static str = "Translation service: google, deeplx, libre, openai";

        fn parse(value: &str) -> EnvResult<ServiceKind> {
            value.parse().map_err(|_| EnvError {
                variable: Self::NAME.to_string(),
                message: format!("Invalid service '{}'. Use: google, deeplx, libre, openai", value),
            })
        }
    }

    /// 显示模式
    pub struct DisplayMode;
    impl EnvVar<Mode> for DisplayMode {
        const NAME: &'static str = "FEED_TRANSLATE_DISPLAY_MODE";
        const DEFAULT: Option<Mode> = Some(Mode::OrigThenTrans);
        const DESCRIPTION: &'static str =
            "Display mode: translated_only, orig_then_trans, trans_then_orig";

        fn parse(value: &str) -> EnvResult<Mode> {
            value.parse().map_err(|_| EnvError {
                variable: Self::NAME.to_string(),
                message: format!(
                    "Invalid display mode '{}'. Use: translated_only, orig_then_trans, trans_then_orig",
                    value
                ),
            })
        }
    }

    /// 是否翻译标题
    pub struct TranslateTitle;
    impl EnvVar<bool> for TranslateTitle {
        const NAME: &'static str = "FEED_TRANSLATE_TITLE";
        const DEFAULT: Option<bool> = Some(true);
        const DESCRIPTION: &'static str = "Translate item titles";

        fn parse(value: &str) -> EnvResult<bool> {
            parse_bool(value, Self::NAME)
        }
    }

    /// 是否翻译正文
    pub struct TranslateContent;
    impl EnvVar<bool> for TranslateContent {
        const NAME: &'static str = "FEED_TRANSLATE_CONTENT";
        const DEFAULT: Option<bool> = Some(false);
        const DESCRIPTION: &'static str = "Translate item bodies";

        fn parse(value: &str) -> EnvResult<bool> {
            parse_bool(value, Self::NAME)
        }
    }
}

/// 翻译服务地址与凭据
pub mod providers {
    use super::*;

    /// DeepLX 服务地址
    pub struct DeeplxUrl;
    impl EnvVar<String> for DeeplxUrl {
        const NAME: &'static str = "FEED_TRANSLATE_DEEPLX_URL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "DeepLX endpoint URL, e.g. http://localhost:1188/translate";

        fn parse(value: &str) -> EnvResult<String> {
            parse_url(value, Self::NAME)
        }
    }

    /// LibreTranslate 服务地址
    pub struct LibreUrl;
    impl EnvVar<String> for LibreUrl {
        const NAME: &'static str = "FEED_TRANSLATE_LIBRE_URL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "LibreTranslate base URL";

        fn parse(value: &str) -> EnvResult<String> {
            parse_url(value, Self::NAME)
        }
    }

    /// LibreTranslate API 密钥
    pub struct LibreApiKey;
    impl EnvVar<String> for LibreApiKey {
        const NAME: &'static str = "FEED_TRANSLATE_LIBRE_API_KEY";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "LibreTranslate API key (optional)";

        fn parse(value: &str) -> EnvResult<String> {
            Ok(value.trim().to_string())
        }
    }

    /// OpenAI 兼容接口地址
    pub struct OpenAiBaseUrl;
    impl EnvVar<String> for OpenAiBaseUrl {
        const NAME: &'static str = "FEED_TRANSLATE_OPENAI_BASE_URL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "OpenAI-compatible API base URL";

        fn parse(value: &str) -> EnvResult<String> {
            parse_url(value, Self::NAME)
        }
    }

    /// OpenAI API 密钥
    pub struct OpenAiApiKey;
    impl EnvVar<String> for OpenAiApiKey {
        const NAME: &'static str = "FEED_TRANSLATE_OPENAI_API_KEY";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "API key for the OpenAI-compatible service";

        fn parse(value: &str) -> EnvResult<String> {
            let key = value.trim();
            if key.len() < 8 {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "API key too short".to_string(),
                });
            }
            Ok(key.to_string())
        }
    }

    /// 模型名
    pub struct OpenAiModel;
    impl EnvVar<String> for OpenAiModel {
        const NAME: &'static str = "FEED_TRANSLATE_OPENAI_MODEL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Chat model name (default: gpt-3.5-turbo)";

        fn parse(value: &str) -> EnvResult<String> {
            Ok(value.trim().to_string())
        }
    }
}

/// 重试相关环境变量
pub mod retry {
    use super::*;

    /// 主服务尝试次数
    pub struct MaxAttempts;
    impl EnvVar<usize> for MaxAttempts {
        const NAME: &'static str = "FEED_TRANSLATE_RETRY_MAX_ATTEMPTS";
        const DEFAULT: Option<usize> = Some(2);
        const DESCRIPTION: &'static str = "Attempts against the primary service before falling back";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 1, 10)
        }
    }

    /// 初始退避间隔
    pub struct InitialBackoff;
    impl EnvVar<Duration> for InitialBackoff {
        const NAME: &'static str = "FEED_TRANSLATE_RETRY_BACKOFF_MS";
        const DEFAULT: Option<Duration> = Some(Duration::from_millis(1000));
        const DESCRIPTION: &'static str = "Initial retry backoff in milliseconds, doubled per retry";

        fn parse(value: &str) -> EnvResult<Duration> {
            let ms = parse_positive_usize(value, Self::NAME, 0, 60_000)?;
            Ok(Duration::from_millis(ms as u64))
        }
    }
}

/// 缓存相关环境变量
pub mod cache {
    use super::*;

    /// 启用签名缓存
    pub struct Enabled;
    impl EnvVar<bool> for Enabled {
        const NAME: &'static str = "FEED_TRANSLATE_CACHE_ENABLED";
        const DEFAULT: Option<bool> = Some(true);
        const DESCRIPTION: &'static str = "Enable the in-process signature cache";

        fn parse(value: &str) -> EnvResult<bool> {
            parse_bool(value, Self::NAME)
        }
    }

    /// 缓存容量
    pub struct Capacity;
    impl EnvVar<usize> for Capacity {
        const NAME: &'static str = "FEED_TRANSLATE_CACHE_CAPACITY";
        const DEFAULT: Option<usize> = Some(512);
        const DESCRIPTION: &'static str = "Maximum number of cached wrappers";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 1, 1_000_000)
        }
    }
}

/// 批处理相关环境变量
pub mod batch {
    use super::*;

    /// 并发处理的条目数
    pub struct MaxConcurrentItems;
    impl EnvVar<usize> for MaxConcurrentItems {
        const NAME: &'static str = "FEED_TRANSLATE_MAX_CONCURRENT_ITEMS";
        const DEFAULT: Option<usize> = Some(4);
        const DESCRIPTION: &'static str = "Maximum number of items processed concurrently";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 1, 256)
        }
    }

    /// 单条目截止时长
    pub struct ItemTimeout;
    impl EnvVar<Duration> for ItemTimeout {
        const NAME: &'static str = "FEED_TRANSLATE_ITEM_TIMEOUT";
        const DEFAULT: Option<Duration> = Some(Duration::from_secs(120));
        const DESCRIPTION: &'static str = "Per-item processing deadline in seconds (0 disables it)";

        fn parse(value: &str) -> EnvResult<Duration> {
            let secs = parse_positive_usize(value, Self::NAME, 0, 3600)?;
            Ok(Duration::from_secs(secs as u64))
        }
    }
}

/// 辅助函数
fn parse_bool(value: &str, var_name: &str) -> EnvResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" | "enabled" => Ok(true),
        "false" | "0" | "no" | "off" | "disabled" => Ok(false),
        _ => Err(EnvError {
            variable: var_name.to_string(),
            message: format!(
                "Invalid boolean value '{}'. Use: true/false, 1/0, yes/no, on/off, enabled/disabled",
                value
            ),
        }),
    }
}

fn parse_positive_usize(value: &str, var_name: &str, min: usize, max: usize) -> EnvResult<usize> {
    let num: usize = value.trim().parse().map_err(|_| EnvError {
        variable: var_name.to_string(),
        message: "Must be a valid positive number".to_string(),
    })?;

    if num < min {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} is below minimum {}", num, min),
        });
    }

    if num > max {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} exceeds maximum {}", num, max),
        });
    }

    Ok(num)
}

fn parse_url(value: &str, var_name: &str) -> EnvResult<String> {
    let raw = value.trim();
    match url::Url::parse(raw) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(raw.to_string()),
        _ => Err(EnvError {
            variable: var_name.to_string(),
            message: "URL must start with http:// or https://".to_string(),
        }),
    }
}

/// 环境变量文档生成器
pub fn generate_env_docs() -> String {
    fn entry<T: fmt::Debug, V: EnvVar<T>>(docs: &mut String) {
        docs.push_str(&format!(
            "- `{}`: {} (default: {:?})\n",
            V::NAME,
            V::DESCRIPTION,
            V::DEFAULT
        ));
    }

    let mut docs = String::new();
    docs.push_str("# Environment Variables\n\n");

    docs.push_str("## Core\n\n");
    entry::<String, core::LogLevel>(&mut docs);
    entry::<String, core::ConfigPath>(&mut docs);

    docs.push_str("\n## Translation\n\n");
    entry::<String, translation::TargetLang>(&mut docs);
    entry::<crate::translation::core::backend::ServiceKind, translation::Service>(&mut docs);
    entry::<crate::translation::config::DisplayMode, translation::DisplayMode>(&mut docs);
    entry::<bool, translation::TranslateTitle>(&mut docs);
    entry::<bool, translation::TranslateContent>(&mut docs);

    docs.push_str("\n## Providers\n\n");
    entry::<String, providers::DeeplxUrl>(&mut docs);
    entry::<String, providers::LibreUrl>(&mut docs);
    entry::<String, providers::LibreApiKey>(&mut docs);
    entry::<String, providers::OpenAiBaseUrl>(&mut docs);
    entry::<String, providers::OpenAiApiKey>(&mut docs);
    entry::<String, providers::OpenAiModel>(&mut docs);

    docs.push_str("\n## Retry\n\n");
    entry::<usize, retry::MaxAttempts>(&mut docs);
    entry::<Duration, retry::InitialBackoff>(&mut docs);

    docs.push_str("\n## Cache\n\n");
    entry::<bool, cache::Enabled>(&mut docs);
    entry::<usize, cache::Capacity>(&mut docs);

    docs.push_str("\n## Batch\n\n");
    entry::<usize, batch::MaxConcurrentItems>(&mut docs);
    entry::<Duration, batch::ItemTimeout>(&mut docs);

    docs
}
