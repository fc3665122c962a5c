//! 签名缓存
//!
//! 以签名为键缓存已生成的包装，作为显式注入流水线的能力，取代请求级全局状态。
//! 提供有界 LRU 实现与空实现两种。

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;

use super::signature::Signature;

/// 缓存统计信息
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    pub evictions: u64,
    pub entries: usize,
}

impl CacheStats {
    /// 命中率
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// 签名 → 包装 的缓存能力
pub trait WrapperCache: Send + Sync {
    fn get(&self, signature: &Signature) -> Option<String>;
    fn put(&self, signature: Signature, wrapper_html: String);
    fn stats(&self) -> CacheStats;
    fn clear(&self);
}

struct LruInner {
    entries: LruCache<Signature, String>,
    stats: CacheStats,
}

/// 有界 LRU 缓存
pub struct LruWrapperCache {
    inner: Mutex<LruInner>,
}

impl LruWrapperCache {
    /// 容量为 0 时按 1 处理
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruInner {
                entries: LruCache::new(capacity),
                stats: CacheStats::default(),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        match self.inner.lock() {
            Ok(inner) => inner.entries.cap().get(),
            Err(poisoned) => poisoned.into_inner().entries.cap().get(),
        }
    }

    fn with_inner<R>(&self, f: impl FnOnce(&mut LruInner) -> R) -> R {
        let mut guard = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("缓存锁已中毒，继续使用内部数据");
                poisoned.into_inner()
            }
        };
        f(&mut guard)
    }
}

impl WrapperCache for LruWrapperCache {
    fn get(&self, signature: &Signature) -> Option<String> {
        self.with_inner(|inner| match inner.entries.get(signature) {
            Some(html) => {
                inner.stats.hits += 1;
                Some(html.clone())
            }
            None => {
                inner.stats.misses += 1;
                None
            }
        })
    }

    fn put(&self, signature: Signature, wrapper_html: String) {
        self.with_inner(|inner| {
            inner.stats.inserts += 1;
            if let Some((evicted, _)) = inner.entries.push(signature.clone(), wrapper_html) {
                if evicted != signature {
                    inner.stats.evictions += 1;
                }
            }
        })
    }

    fn stats(&self) -> CacheStats {
        self.with_inner(|inner| CacheStats {
            entries: inner.entries.len(),
            ..inner.stats
        })
    }

    fn clear(&self) {
        self.with_inner(|inner| {
            inner.entries.clear();
            inner.stats = CacheStats::default();
        })
    }
}

/// 不缓存任何内容
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopWrapperCache;

impl WrapperCache for NoopWrapperCache {
    fn get(&self, _signature: &Signature) -> Option<String> {
        None
    }

    fn put(&self, _signature: Signature, _wrapper_html: String) {}

    fn stats(&self) -> CacheStats {
        CacheStats::default()
    }

    fn clear(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::storage::signature::sha256_hex;

    fn sig(seed: &str) -> Signature {
        Signature::parse(&sha256_hex(seed)).unwrap()
    }

    #[test]
    fn test_lru_hit_and_miss() {
        let cache = LruWrapperCache::new(4);
        assert!(cache.get(&sig("a")).is_none());
        cache.put(sig("a"), "<div>a</div>".into());
        assert_eq!(cache.get(&sig("a")).as_deref(), Some("<div>a</div>"));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_lru_eviction() {
        let cache = LruWrapperCache::new(2);
        cache.put(sig("a"), "a".into());
        cache.put(sig("b"), "b".into());
        cache.get(&sig("a"));
        cache.put(sig("c"), "c".into());

        assert!(cache.get(&sig("b")).is_none(), "least recently used entry should be evicted");
        assert!(cache.get(&sig("a")).is_some());
        assert!(cache.get(&sig("c")).is_some());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_overwrite_is_not_eviction() {
        let cache = LruWrapperCache::new(2);
        cache.put(sig("a"), "old".into());
        cache.put(sig("a"), "new".into());
        assert_eq!(cache.get(&sig("a")).as_deref(), Some("new"));
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn test_zero_capacity_and_clear() {
        let cache = LruWrapperCache::new(0);
        assert_eq!(cache.capacity(), 1);
        cache.put(sig("a"), "a".into());
        cache.clear();
        assert_eq!(cache.stats(), CacheStats::default());
    }

    #[test]
    fn test_noop_cache() {
        let cache = NoopWrapperCache;
        cache.put(sig("a"), "a".into());
        assert!(cache.get(&sig("a")).is_none());
        assert_eq!(cache.stats().entries, 0);
    }
}
