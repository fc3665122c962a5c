//! 存储模块
//!
//! 包装编解码、内容签名与签名缓存。

pub mod cache;
pub mod signature;
pub mod wrapper;

pub use cache::{CacheStats, LruWrapperCache, NoopWrapperCache, WrapperCache};
pub use signature::{Signature, SignatureInput};
pub use wrapper::{Wrapper, WrapperCodec};
