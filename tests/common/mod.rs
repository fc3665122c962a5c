// 集成测试公共模块
//
// 提供可编排的模拟后端、配置构建器和样例条目

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use feed_translate::translation::config::FeedPolicy;
use feed_translate::translation::{
    BackendRegistry, DisplayMode, IdempotentTranslationPipeline, Item, PipelineConfig,
    RetryPolicy, ServiceKind, TranslationBackend, TranslationError, TranslationResult,
};

/// 模拟后端的单次应答
#[derive(Debug, Clone)]
pub enum Reply {
    /// 在原文前加前缀
    Prefix(&'static str),
    /// 固定文本
    Text(String),
    Fail(TranslationError),
    Panic,
}

/// 可编排的模拟后端：按顺序消费应答脚本，脚本耗尽后使用默认应答
pub struct MockBackend {
    service: ServiceKind,
    script: Mutex<VecDeque<Reply>>,
    fallback: Reply,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
    panic_on: Mutex<Option<String>>,
}

impl MockBackend {
    pub fn new(service: ServiceKind, fallback: Reply) -> Arc<Self> {
        Arc::new(Self {
            service,
            script: Mutex::new(VecDeque::new()),
            fallback,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
            panic_on: Mutex::new(None),
        })
    }

    /// 在原文前加“译”的后端
    pub fn translating(service: ServiceKind) -> Arc<Self> {
        Self::new(service, Reply::Prefix("译"))
    }

    /// 永远网络失败的后端
    pub fn failing(service: ServiceKind) -> Arc<Self> {
        Self::new(service, Reply::Fail(TranslationError::NetworkError("connection refused".into())))
    }

    pub fn script(self: &Arc<Self>, replies: impl IntoIterator<Item = Reply>) -> Arc<Self> {
        self.script.lock().unwrap().extend(replies);
        Arc::clone(self)
    }

    /// 请求文本包含 `needle` 时 panic
    pub fn panic_on(self: &Arc<Self>, needle: &str) -> Arc<Self> {
        *self.panic_on.lock().unwrap() = Some(needle.to_string());
        Arc::clone(self)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 收到的请求文本，按调用顺序
    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl TranslationBackend for MockBackend {
    fn service(&self) -> ServiceKind {
        self.service
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(3)
    }

    async fn send(&self, text: &str, _target: &str, _source: &str) -> TranslationResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(text.to_string());

        let should_panic = self
            .panic_on
            .lock()
            .unwrap()
            .as_deref()
            .is_some_and(|needle| text.contains(needle));
        if should_panic {
            panic!("backend exploded on {:?}", text);
        }

        let reply = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match reply {
            Reply::Prefix(prefix) => Ok(format!("{}{}", prefix, text)),
            Reply::Text(text) => Ok(text),
            Reply::Fail(error) => Err(error),
            Reply::Panic => panic!("backend exploded on {:?}", text),
        }
    }
}

/// 测试配置构建器
pub struct TestConfigBuilder {
    config: PipelineConfig,
}

impl TestConfigBuilder {
    /// 订阅源 "f1" 启用，标题与正文都翻译，重试间隔 10ms
    pub fn new() -> Self {
        let mut config = PipelineConfig {
            translate_title: true,
            translate_content: true,
            retry: RetryPolicy {
                max_attempts: 2,
                initial_backoff: Duration::from_millis(10),
            },
            ..PipelineConfig::default()
        };
        config.feeds.insert(
            "f1".to_string(),
            FeedPolicy { enabled: true, source_lang: "auto".to_string() },
        );
        Self { config }
    }

    pub fn service(mut self, service: ServiceKind) -> Self {
        self.config.service = service;
        self
    }

    pub fn display_mode(mut self, mode: DisplayMode) -> Self {
        self.config.display_mode = mode;
        self
    }

    pub fn target_lang(mut self, lang: &str) -> Self {
        self.config.target_lang = lang.to_string();
        self
    }

    pub fn version(mut self, version: &str) -> Self {
        self.config.pipeline_version = version.to_string();
        self
    }

    pub fn title_only(mut self) -> Self {
        self.config.translate_content = false;
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.config.cache_enabled = false;
        self
    }

    pub fn concurrency(mut self, limit: usize) -> Self {
        self.config.max_concurrent_items = limit;
        self
    }

    pub fn item_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.item_timeout = timeout;
        self
    }

    pub fn build(self) -> PipelineConfig {
        self.config
    }
}

/// 用给定后端构建流水线
pub fn pipeline_with(
    config: PipelineConfig,
    backends: &[Arc<MockBackend>],
) -> IdempotentTranslationPipeline {
    let mut registry = BackendRegistry::new();
    for backend in backends {
        registry.register(Arc::clone(backend) as Arc<dyn TranslationBackend>);
    }
    IdempotentTranslationPipeline::new(Arc::new(config), registry)
}

/// 样例条目
pub struct SampleItems;

impl SampleItems {
    pub fn english(id: &str) -> Item {
        Item::new(
            id,
            "Rust 1.80 released",
            "<p>The Rust team is happy to announce a new version.</p><p>Read the notes below.</p>",
        )
        .with_feed("f1")
    }

    pub fn chinese(id: &str) -> Item {
        Item::new(id, "中文标题", "<p>这是一段已经是中文的正文。</p>").with_feed("f1")
    }

    pub fn rich(id: &str) -> Item {
        Item::new(
            id,
            "Release notes",
            concat!(
                r#"<h2 id="intro">Introduction</h2>"#,
                r#"<img src="https://example.com/logo.png" alt="logo">"#,
                r#"<p class="lead">Fast &amp; <b>safe</b> systems programming.</p>"#,
                "<pre>fn main() {\n    println!(\"hi\");\n}</pre>",
                "<p>   </p>",
            ),
        )
        .with_feed("f1")
    }

    pub fn batch(count: usize) -> Vec<Item> {
        (0..count)
            .map(|i| {
                Item::new(
                    format!("item-{}", i),
                    format!("Headline number {}", i),
                    format!("<p>Body text for item {}.</p>", i),
                )
                .with_feed("f1")
            })
            .collect()
    }
}
