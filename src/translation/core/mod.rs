//! 翻译系统核心模块
//!
//! ```text
//! TranslationService (service.rs)        批处理、并发与汇总
//!     └── IdempotentTranslationPipeline (engine.rs)   单条目状态机
//!             ├── RetryingTranslator (retry.rs)        重试与回退
//!             │       └── BackendRegistry (backend.rs)
//!             └── ItemStore (item.rs)                  宿主历史条目
//! ```

pub mod backend;
pub mod engine;
pub mod item;
pub mod retry;
pub mod service;

pub use backend::{BackendRegistry, ProbeReport, ServiceKind, TranslationBackend};
pub use engine::{
    FieldOutcome, IdempotentTranslationPipeline, ItemReport, ItemStatus, ProcessMode,
    ProcessedItem, SegmentStats,
};
pub use item::{EmptyItemStore, Item, ItemStore, MemoryItemStore};
pub use retry::{RetryPolicy, RetryingTranslator, TranslationOutcome};
pub use service::{BatchOutput, BatchSummary, ServiceStats, ServiceStatsSnapshot, TranslationService};
