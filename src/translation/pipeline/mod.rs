//! 翻译管道模块
//!
//! 提供正文处理管道的前段：标签扫描、语言过滤与块级分段

pub mod filters;
pub mod markup;
pub mod segmenter;

// 重新导出主要类型
pub use filters::{LanguageHeuristic, TextVerdict};
pub use segmenter::{ContentSegmenter, Segment, SegmentKind, Segmentation, SourceSpan};
