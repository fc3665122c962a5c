//! 具体翻译服务提供方
//!
//! 每个提供方在构造时持有自己的配置段，`send` 只接收文本与语言代码。
//! 未配置的地址或密钥在发出请求前直接返回 `ConfigError`。

pub mod deeplx;
pub mod google;
pub mod libre;
pub mod openai;

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

pub use deeplx::DeeplxBackend;
pub use google::GoogleBackend;
pub use libre::LibreBackend;
pub use openai::OpenAiBackend;

use crate::translation::config::TranslationSettings;
use crate::translation::core::backend::{BackendRegistry, ServiceKind};
use crate::translation::error::{TranslationError, TranslationResult};

/// 已知语言的英文名称，用于大模型提示词
const LANGUAGE_NAMES: &[(&str, &str)] = &[
    ("cs", "Czech"),
    ("de", "German"),
    ("el", "Greek"),
    ("en", "English"),
    ("en-us", "English (United States)"),
    ("es", "Spanish"),
    ("fa", "Persian"),
    ("fi", "Finnish"),
    ("fr", "French"),
    ("he", "Hebrew"),
    ("hu", "Hungarian"),
    ("id", "Indonesian"),
    ("it", "Italian"),
    ("ja", "Japanese"),
    ("ko", "Korean"),
    ("lv", "Latvian"),
    ("nl", "Dutch"),
    ("oc", "Occitan"),
    ("pl", "Polish"),
    ("pt-br", "Portuguese (Brazil)"),
    ("pt-pt", "Portuguese (Portugal)"),
    ("ru", "Russian"),
    ("sk", "Slovak"),
    ("tr", "Turkish"),
    ("uk", "Ukrainian"),
    ("zh-cn", "Simplified Chinese"),
    ("zh-tw", "Traditional Chinese"),
];

/// 语言代码对应的名称；`auto` 描述为自动检测，未知代码原样大写
pub fn language_name(code: &str) -> String {
    let key = code.trim().to_ascii_lowercase();
    if key == "auto" {
        return "auto-detected language".to_string();
    }
    LANGUAGE_NAMES
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| code.trim().to_ascii_uppercase())
}

/// Google 语言格式：`zh-cn` → `zh-CN`
pub fn format_google_lang(code: &str) -> String {
    let code = code.trim().to_ascii_lowercase().replace('_', "-");
    match code.split_once('-') {
        Some((primary, variant)) => format!("{}-{}", primary, variant.to_ascii_uppercase()),
        None => code,
    }
}

/// DeepLX 语言格式：`zh-cn` → `ZH_CN`
pub fn format_deeplx_lang(code: &str) -> String {
    code.trim().replace('-', "_").to_ascii_uppercase()
}

/// LibreTranslate 只接受主语言子标签
pub fn format_libre_lang(code: &str) -> String {
    let code = code.trim().to_ascii_lowercase().replace('_', "-");
    if code.is_empty() || code == "auto" {
        return "auto".to_string();
    }
    match code.split_once('-') {
        Some((primary, _)) => primary.to_string(),
        None => code,
    }
}

/// 拼接基础地址与路径，去掉多余的 `/`
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim().trim_end_matches('/'), path.trim_start_matches('/'))
}

/// 创建带超时的 HTTP 客户端
pub(crate) fn http_client(timeout: Duration) -> TranslationResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("feed-translate/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| TranslationError::ConfigError(format!("创建HTTP客户端失败: {}", e)))
}

/// 检查状态码并解析 JSON 响应
pub(crate) async fn read_json(
    response: reqwest::Response,
    service: ServiceKind,
) -> TranslationResult<Value> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let snippet: String = body.chars().take(200).collect();
        return Err(TranslationError::ServiceError(format!(
            "{} 返回 HTTP {}: {}",
            service, status, snippet
        )));
    }

    serde_json::from_str(&body)
        .map_err(|e| TranslationError::ParseError(format!("{} 响应不是有效的JSON: {}", service, e)))
}

/// 按设置构建全部后端
pub fn build_registry(settings: &TranslationSettings) -> TranslationResult<BackendRegistry> {
    let registry = BackendRegistry::new()
        .with(Arc::new(GoogleBackend::new(&settings.google)?))
        .with(Arc::new(DeeplxBackend::new(&settings.deeplx)?))
        .with(Arc::new(LibreBackend::new(&settings.libre)?))
        .with(Arc::new(OpenAiBackend::new(&settings.openai)?));

    tracing::debug!("已注册翻译服务: {:?}", registry.services());
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_formats() {
        assert_eq!(format_google_lang("zh-cn"), "zh-CN");
        assert_eq!(format_google_lang("EN"), "en");
        assert_eq!(format_google_lang("pt_br"), "pt-BR");
        assert_eq!(format_deeplx_lang("zh-cn"), "ZH_CN");
        assert_eq!(format_deeplx_lang("ja"), "JA");
        assert_eq!(format_libre_lang("zh-cn"), "zh");
        assert_eq!(format_libre_lang("pt-PT"), "pt");
        assert_eq!(format_libre_lang(""), "auto");
    }

    #[test]
    fn test_language_names() {
        assert_eq!(language_name("zh-cn"), "Simplified Chinese");
        assert_eq!(language_name("JA"), "Japanese");
        assert_eq!(language_name("auto"), "auto-detected language");
        assert_eq!(language_name("xx-yy"), "XX-YY");
    }

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("http://h:5000/", "/translate"), "http://h:5000/translate");
        assert_eq!(join_url("https://api.openai.com/v1", "chat/completions"), "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn test_build_registry_registers_all_services() {
        let registry = build_registry(&TranslationSettings::default()).unwrap();
        for service in ServiceKind::ALL {
            assert!(registry.contains(service), "{} should be registered", service);
        }
    }
}
