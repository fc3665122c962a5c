//! # feed-translate
//!
//! 为订阅条目提供幂等的机器翻译：译文与原文一同保存在可逆的包装中，
//! 重复处理未变化的条目不会再次调用翻译服务。
//!
//! ## 模块组织
//!
//! - `translation` - 翻译流水线、服务提供方、配置与存储
//! - `env` - 类型化的环境变量

pub mod env;
pub mod translation;

pub use translation::{
    ConfigManager, Item, ProcessMode, TranslationError, TranslationResult, TranslationService,
};
