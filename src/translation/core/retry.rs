//! 带重试与回退的翻译器
//!
//! 对主服务最多尝试 `max_attempts` 次，两次尝试之间指数退避（初始间隔，每次翻倍）。
//! 主服务不是基线服务且全部失败时，再对基线服务做且仅做一次尝试。
//! 所有失败都在这里被吸收：调用方总能拿到文本，彻底失败时就是原文。

use std::time::Duration;

use tokio::time::Instant;

use super::backend::{BackendRegistry, ServiceKind, TranslationBackend};
use crate::translation::error::{helpers, TranslationError, TranslationResult};
use crate::translation::telemetry;

/// 重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 主服务尝试次数（至少 1）
    pub max_attempts: u32,
    /// 第一次退避间隔
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            initial_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// 第 `attempt` 次失败后的退避间隔（从 1 开始计数）
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_backoff * 2_u32.pow(exponent)
    }
}

/// 单段翻译结果，不单独持久化
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationOutcome {
    /// 译文；失败时为原文
    pub text: String,
    /// 产出该结果的服务
    pub service_used: ServiceKind,
    pub succeeded: bool,
    /// 总调用次数（含回退）
    pub attempts: u32,
}

/// 带重试与跨服务回退的翻译器
#[derive(Debug, Clone)]
pub struct RetryingTranslator {
    registry: BackendRegistry,
    policy: RetryPolicy,
}

impl RetryingTranslator {
    pub fn new(registry: BackendRegistry, policy: RetryPolicy) -> Self {
        Self { registry, policy }
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// 翻译文本，不设截止时间
    pub async fn translate(
        &self,
        text: &str,
        service: ServiceKind,
        target_lang: &str,
        source_lang: &str,
    ) -> TranslationOutcome {
        self.translate_with_deadline(text, service, target_lang, source_lang, None)
            .await
    }

    /// 翻译文本；截止时间到达时中止进行中的调用与退避等待并返回原文
    pub async fn translate_with_deadline(
        &self,
        text: &str,
        service: ServiceKind,
        target_lang: &str,
        source_lang: &str,
        deadline: Option<Instant>,
    ) -> TranslationOutcome {
        let mut attempts = 0;

        match self
            .try_service(text, service, target_lang, source_lang, deadline, self.policy.max_attempts.max(1), &mut attempts)
            .await
        {
            Ok(translated) => {
                return TranslationOutcome {
                    text: translated,
                    service_used: service,
                    succeeded: true,
                    attempts,
                }
            }
            Err(TranslationError::Cancelled(reason)) => {
                tracing::warn!(service = %service, "翻译已取消，返回原文: {}", reason);
                return Self::failed(text, service, attempts);
            }
            Err(e) => {
                helpers::log_error(&e.with_context(service));
            }
        }

        if service.is_baseline() {
            return Self::failed(text, service, attempts);
        }

        let baseline = ServiceKind::BASELINE;
        tracing::info!("{} 全部尝试失败，回退到 {}", service, baseline);
        telemetry::record_fallback(service);

        match self
            .try_service(text, baseline, target_lang, source_lang, deadline, 1, &mut attempts)
            .await
        {
            Ok(translated) => TranslationOutcome {
                text: translated,
                service_used: baseline,
                succeeded: true,
                attempts,
            },
            Err(e) => {
                helpers::log_error(&e.with_context(format!("回退 {}", baseline)));
                Self::failed(text, service, attempts)
            }
        }
    }

    fn failed(text: &str, service: ServiceKind, attempts: u32) -> TranslationOutcome {
        TranslationOutcome {
            text: text.to_string(),
            service_used: service,
            succeeded: false,
            attempts,
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn try_service(
        &self,
        text: &str,
        service: ServiceKind,
        target_lang: &str,
        source_lang: &str,
        deadline: Option<Instant>,
        max_attempts: u32,
        attempts: &mut u32,
    ) -> TranslationResult<String> {
        let Some(backend) = self.registry.get(service) else {
            return Err(TranslationError::ConfigError(format!("未注册翻译服务: {}", service)));
        };

        let mut last_error = TranslationError::InternalError("未进行任何尝试".to_string());

        for attempt in 1..=max_attempts {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Err(TranslationError::Cancelled("截止时间已到".to_string()));
            }

            *attempts += 1;
            let result = Self::call_once(backend.as_ref(), text, target_lang, source_lang, deadline).await;
            telemetry::record_attempt(service, result.is_ok());

            match result {
                Ok(translated) => {
                    tracing::debug!("{} 第 {} 次尝试成功", service, attempt);
                    return Ok(translated);
                }
                Err(e @ TranslationError::Cancelled(_)) => return Err(e),
                Err(e) => {
                    tracing::debug!("{} 第 {}/{} 次尝试失败: {}", service, attempt, max_attempts, e);
                    let retryable = e.is_retryable();
                    last_error = e;
                    if !retryable {
                        break;
                    }
                }
            }

            if attempt < max_attempts {
                let delay = self.policy.backoff_after(attempt);
                let wake_at = Instant::now() + delay;
                match deadline {
                    Some(d) if d <= wake_at => {
                        tokio::time::sleep_until(d).await;
                        return Err(TranslationError::Cancelled("退避期间截止时间已到".to_string()));
                    }
                    _ => tokio::time::sleep_until(wake_at).await,
                }
            }
        }

        Err(last_error)
    }

    async fn call_once(
        backend: &dyn TranslationBackend,
        text: &str,
        target_lang: &str,
        source_lang: &str,
        deadline: Option<Instant>,
    ) -> TranslationResult<String> {
        let limit = Instant::now() + backend.request_timeout();
        let (until, cancelled) = match deadline {
            Some(d) if d < limit => (d, true),
            _ => (limit, false),
        };

        match tokio::time::timeout_at(until, backend.send(text, target_lang, source_lang)).await {
            Ok(Ok(translated)) if translated.trim().is_empty() => Err(
                TranslationError::EmptyTranslation(backend.service().to_string()),
            ),
            Ok(Ok(translated)) => Ok(translated.trim().to_string()),
            Ok(Err(e)) => Err(e),
            Err(_) if cancelled => Err(TranslationError::Cancelled("调用期间截止时间已到".to_string())),
            Err(elapsed) => Err(TranslationError::from(elapsed)
                .with_context(format!("{} 超时 {:?}", backend.service(), backend.request_timeout()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::*;

    /// 按脚本依次返回结果的后端
    struct ScriptedBackend {
        kind: ServiceKind,
        script: Mutex<VecDeque<TranslationResult<String>>>,
        calls: Mutex<u32>,
        delay: Duration,
    }

    impl ScriptedBackend {
        fn new(kind: ServiceKind, script: Vec<TranslationResult<String>>) -> Arc<Self> {
            Arc::new(Self {
                kind,
                script: Mutex::new(script.into()),
                calls: Mutex::new(0),
                delay: Duration::ZERO,
            })
        }

        fn slow(kind: ServiceKind, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                kind,
                script: Mutex::new(VecDeque::new()),
                calls: Mutex::new(0),
                delay,
            })
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl TranslationBackend for ScriptedBackend {
        fn service(&self) -> ServiceKind {
            self.kind
        }

        fn request_timeout(&self) -> Duration {
            Duration::from_secs(5)
        }

        async fn send(&self, _text: &str, _target: &str, _source: &str) -> TranslationResult<String> {
            *self.calls.lock().unwrap() += 1;
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TranslationError::NetworkError("脚本已耗尽".into())))
        }
    }

    fn net_err() -> TranslationResult<String> {
        Err(TranslationError::NetworkError("连接被重置".into()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_first_attempt() {
        let google = ScriptedBackend::new(ServiceKind::Google, vec![Ok("你好".into())]);
        let translator = RetryingTranslator::new(
            BackendRegistry::new().with(google.clone()),
            RetryPolicy::default(),
        );

        let outcome = translator.translate("Hello", ServiceKind::Google, "zh-cn", "auto").await;
        assert!(outcome.succeeded);
        assert_eq!(outcome.text, "你好");
        assert_eq!(outcome.attempts, 1);
        assert_eq!(google.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_with_backoff_then_success() {
        let google = ScriptedBackend::new(ServiceKind::Google, vec![net_err(), Ok("你好".into())]);
        let translator = RetryingTranslator::new(
            BackendRegistry::new().with(google.clone()),
            RetryPolicy::default(),
        );

        let started = Instant::now();
        let outcome = translator.translate("Hello", ServiceKind::Google, "zh-cn", "auto").await;
        assert!(outcome.succeeded);
        assert_eq!(outcome.attempts, 2);
        assert!(started.elapsed() >= Duration::from_secs(1), "should back off before retrying");
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_to_baseline_exactly_once() {
        let deeplx = ScriptedBackend::new(ServiceKind::Deeplx, vec![net_err(), net_err()]);
        let google = ScriptedBackend::new(ServiceKind::Google, vec![net_err(), net_err()]);
        let translator = RetryingTranslator::new(
            BackendRegistry::new().with(deeplx.clone()).with(google.clone()),
            RetryPolicy::default(),
        );

        let outcome = translator.translate("Hello", ServiceKind::Deeplx, "zh-cn", "auto").await;
        assert!(!outcome.succeeded);
        assert_eq!(outcome.text, "Hello", "total failure returns the original text");
        assert_eq!(deeplx.calls(), 2);
        assert_eq!(google.calls(), 1, "baseline is tried exactly once");
        assert_eq!(outcome.attempts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_success_reports_baseline() {
        let libre = ScriptedBackend::new(ServiceKind::Libre, vec![net_err(), net_err()]);
        let google = ScriptedBackend::new(ServiceKind::Google, vec![Ok("你好".into())]);
        let translator = RetryingTranslator::new(
            BackendRegistry::new().with(libre).with(google),
            RetryPolicy::default(),
        );

        let outcome = translator.translate("Hello", ServiceKind::Libre, "zh-cn", "auto").await;
        assert!(outcome.succeeded);
        assert_eq!(outcome.service_used, ServiceKind::Google);
    }

    #[tokio::test(start_paused = true)]
    async fn test_baseline_failure_has_no_fallback() {
        let google = ScriptedBackend::new(ServiceKind::Google, vec![net_err(), net_err(), Ok("x".into())]);
        let translator = RetryingTranslator::new(
            BackendRegistry::new().with(google.clone()),
            RetryPolicy::default(),
        );

        let outcome = translator.translate("Hello", ServiceKind::Google, "zh-cn", "auto").await;
        assert!(!outcome.succeeded);
        assert_eq!(google.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_config_error_is_not_retried() {
        let deeplx = ScriptedBackend::new(
            ServiceKind::Deeplx,
            vec![Err(TranslationError::ConfigError("DeepLX URL 未配置".into()))],
        );
        let google = ScriptedBackend::new(ServiceKind::Google, vec![Ok("你好".into())]);
        let translator = RetryingTranslator::new(
            BackendRegistry::new().with(deeplx.clone()).with(google.clone()),
            RetryPolicy::default(),
        );

        let outcome = translator.translate("Hello", ServiceKind::Deeplx, "zh-cn", "auto").await;
        assert!(outcome.succeeded);
        assert_eq!(deeplx.calls(), 1);
        assert_eq!(google.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_output_counts_as_failure() {
        let google = ScriptedBackend::new(ServiceKind::Google, vec![Ok("   ".into()), Ok("".into())]);
        let translator = RetryingTranslator::new(
            BackendRegistry::new().with(google.clone()),
            RetryPolicy::default(),
        );

        let outcome = translator.translate("Hello", ServiceKind::Google, "zh-cn", "auto").await;
        assert!(!outcome.succeeded);
        assert_eq!(outcome.text, "Hello");
        assert_eq!(google.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_backend_falls_back() {
        let google = ScriptedBackend::new(ServiceKind::Google, vec![Ok("你好".into())]);
        let translator = RetryingTranslator::new(
            BackendRegistry::new().with(google.clone()),
            RetryPolicy::default(),
        );

        let outcome = translator.translate("Hello", ServiceKind::OpenAi, "zh-cn", "auto").await;
        assert!(outcome.succeeded);
        assert_eq!(outcome.service_used, ServiceKind::Google);
        assert_eq!(outcome.attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_aborts_in_flight_call() {
        let deeplx = ScriptedBackend::slow(ServiceKind::Deeplx, Duration::from_secs(30));
        let google = ScriptedBackend::new(ServiceKind::Google, vec![Ok("你好".into())]);
        let translator = RetryingTranslator::new(
            BackendRegistry::new().with(deeplx.clone()).with(google.clone()),
            RetryPolicy::default(),
        );

        let deadline = Instant::now() + Duration::from_millis(500);
        let outcome = translator
            .translate_with_deadline("Hello", ServiceKind::Deeplx, "zh-cn", "auto", Some(deadline))
            .await;

        assert!(!outcome.succeeded);
        assert_eq!(outcome.text, "Hello");
        assert_eq!(deeplx.calls(), 1);
        assert_eq!(google.calls(), 0, "cancellation skips the fallback");
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_aborts_backoff() {
        let google = ScriptedBackend::new(ServiceKind::Google, vec![net_err(), Ok("你好".into())]);
        let translator = RetryingTranslator::new(
            BackendRegistry::new().with(google.clone()),
            RetryPolicy::default(),
        );

        let deadline = Instant::now() + Duration::from_millis(200);
        let outcome = translator
            .translate_with_deadline("Hello", ServiceKind::Google, "zh-cn", "auto", Some(deadline))
            .await;
        assert!(!outcome.succeeded);
        assert_eq!(google.calls(), 1);
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_after(1), Duration::from_secs(1));
        assert_eq!(policy.backoff_after(2), Duration::from_secs(2));
        assert_eq!(policy.backoff_after(3), Duration::from_secs(4));
    }
}
