//! 订阅条目翻译模块
//!
//! - **core**: 条目模型、后端抽象、重试、幂等流水线与批处理服务
//! - **pipeline**: 标签扫描、语言启发式与块级分段
//! - **storage**: 包装编解码、内容签名与签名缓存
//! - **providers**: Google / DeepLX / LibreTranslate / OpenAI 兼容服务
//! - **config**: 配置管理
//! - **error**: 错误处理
//!
//! # 基本用法
//!
//! ```rust,no_run
//! use feed_translate::translation::{ConfigManager, Item, ProcessMode, TranslationService};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::new()?;
//! let service = TranslationService::from_settings(manager.settings(), None)?;
//!
//! let items = vec![Item::new("1", "Hello", "<p>Hello world</p>").with_feed("1")];
//! let output = service.process_batch(items, ProcessMode::Add).await;
//! println!("{:?}", output.summary);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod pipeline;
pub mod providers;
pub mod storage;
pub mod telemetry;

pub use config::{ConfigManager, DisplayMode, PipelineConfig, TranslationSettings};
pub use core::{
    BackendRegistry, BatchOutput, BatchSummary, FieldOutcome, IdempotentTranslationPipeline, Item,
    ItemReport, ItemStore, MemoryItemStore, ProcessMode, RetryPolicy, RetryingTranslator,
    ServiceKind, TranslationBackend, TranslationService,
};
pub use error::{TranslationError, TranslationResult};
pub use storage::{Signature, WrapperCodec};
