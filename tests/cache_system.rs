//! 签名缓存集成测试
//!
//! 验证缓存命中、LRU 淘汰以及签名对各输入字段的敏感性

use std::sync::Arc;

use feed_translate::translation::storage::{
    LruWrapperCache, NoopWrapperCache, Signature, SignatureInput, WrapperCache,
};
use feed_translate::translation::{DisplayMode, FieldOutcome, ProcessMode, ServiceKind};

#[allow(dead_code)]
mod common {
    include!("common/mod.rs");
}

use common::{pipeline_with, MockBackend, SampleItems, TestConfigBuilder};

fn signature(text: &str) -> Signature {
    Signature::compute(&SignatureInput {
        normalized_text: text,
        target_lang: "zh-cn",
        service: ServiceKind::Google,
        display_mode: DisplayMode::OrigThenTrans,
        item_key: "item-1",
        pipeline_version: "1",
    })
}

/// 上游重新推送未翻译的条目时命中缓存
#[tokio::test(start_paused = true)]
async fn test_refetched_item_hits_cache() {
    let google = MockBackend::translating(ServiceKind::Google);
    let pipeline = pipeline_with(TestConfigBuilder::new().build(), &[google.clone()]);

    let first = pipeline.process(&SampleItems::english("1"), ProcessMode::Add).await;
    let calls = google.calls();

    let again = pipeline.process(&SampleItems::english("1"), ProcessMode::Add).await;

    assert_eq!(again.report.body, FieldOutcome::ReusedCached);
    assert_eq!(again.item.body, first.item.body);
    // 标题不走缓存
    assert_eq!(google.calls(), calls + 1);

    let stats = pipeline.cache_stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.entries, 1);
    assert!(stats.hit_rate() > 0.0);
}

/// 关闭缓存后每次都重新翻译
#[tokio::test(start_paused = true)]
async fn test_disabled_cache_always_translates() {
    let google = MockBackend::translating(ServiceKind::Google);
    let pipeline = pipeline_with(TestConfigBuilder::new().without_cache().build(), &[google.clone()]);

    pipeline.process(&SampleItems::english("1"), ProcessMode::Add).await;
    let calls = google.calls();
    let again = pipeline.process(&SampleItems::english("1"), ProcessMode::Add).await;

    assert!(again.report.body.is_translated());
    assert_eq!(google.calls(), calls * 2);
    assert_eq!(pipeline.cache_stats().entries, 0);
}

/// 强制模式绕过缓存
#[tokio::test(start_paused = true)]
async fn test_force_mode_bypasses_cache() {
    let google = MockBackend::translating(ServiceKind::Google);
    let pipeline = pipeline_with(TestConfigBuilder::new().build(), &[google.clone()]);

    pipeline.process(&SampleItems::english("1"), ProcessMode::Add).await;
    let forced = pipeline.process(&SampleItems::english("1"), ProcessMode::Force).await;

    assert!(forced.report.body.is_translated());
    assert_eq!(pipeline.cache_stats().hits, 0);
}

/// 注入的缓存被流水线使用
#[tokio::test(start_paused = true)]
async fn test_injected_cache_is_shared() {
    let google = MockBackend::translating(ServiceKind::Google);
    let cache = Arc::new(LruWrapperCache::new(8));

    let first = pipeline_with(TestConfigBuilder::new().build(), &[google.clone()])
        .with_cache(cache.clone());
    first.process(&SampleItems::english("1"), ProcessMode::Add).await;

    let second = pipeline_with(TestConfigBuilder::new().build(), &[google.clone()])
        .with_cache(cache.clone());
    let processed = second.process(&SampleItems::english("1"), ProcessMode::Add).await;

    assert_eq!(processed.report.body, FieldOutcome::ReusedCached);
    assert_eq!(cache.stats().hits, 1);
}

#[test]
fn test_lru_eviction() {
    let cache = LruWrapperCache::new(2);
    cache.put(signature("a"), "<div>a</div>".into());
    cache.put(signature("b"), "<div>b</div>".into());

    // 访问 a 使 b 成为最久未使用
    assert!(cache.get(&signature("a")).is_some());
    cache.put(signature("c"), "<div>c</div>".into());

    assert!(cache.get(&signature("b")).is_none());
    assert_eq!(cache.get(&signature("c")).as_deref(), Some("<div>c</div>"));

    let stats = cache.stats();
    assert_eq!(stats.evictions, 1);
    assert_eq!(stats.entries, 2);
    assert_eq!(stats.inserts, 3);

    cache.clear();
    assert_eq!(cache.stats().entries, 0);
}

#[test]
fn test_noop_cache_never_hits() {
    let cache = NoopWrapperCache;
    cache.put(signature("a"), "<div>a</div>".into());
    assert!(cache.get(&signature("a")).is_none());
    assert_eq!(cache.stats().entries, 0);
}

#[test]
fn test_signature_depends_on_every_input() {
    let base = SignatureInput {
        normalized_text: "Hello world",
        target_lang: "zh-cn",
        service: ServiceKind::Google,
        display_mode: DisplayMode::OrigThenTrans,
        item_key: "item-1",
        pipeline_version: "1",
    };
    let reference = Signature::compute(&base);
    assert_eq!(reference, Signature::compute(&base), "signature must be deterministic");

    let variants = [
        SignatureInput { normalized_text: "Hello there", ..base },
        SignatureInput { target_lang: "ja", ..base },
        SignatureInput { service: ServiceKind::Deeplx, ..base },
        SignatureInput { display_mode: DisplayMode::TranslatedOnly, ..base },
        SignatureInput { item_key: "item-2", ..base },
        SignatureInput { pipeline_version: "2", ..base },
    ];
    for variant in variants {
        assert_ne!(Signature::compute(&variant), reference, "{:?}", variant);
    }

    assert_eq!(Signature::parse(reference.as_str()), Some(reference.clone()));
    assert_eq!(Signature::parse("not-a-signature"), None);
}
