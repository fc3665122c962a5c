//! 幂等翻译流水线
//!
//! 每次处理一个条目，按状态机推进：
//!
//! ```text
//! Disabled ──> 结束（条目不变）
//! Evaluate ──> 跳过 | ReuseUnchanged | 复用上一轮 | 复用缓存 | Translate ──> Persist
//! ```
//!
//! 所有出口都返回完整的条目：要么原样，要么与上一轮等价，要么是新生成的包装。
//! 错误不会越过条目边界，统一转换为 [`FieldOutcome`]。

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::backend::BackendRegistry;
use super::item::{EmptyItemStore, Item, ItemStore, ATTR_ORIGINAL_TITLE, ATTR_TRANSLATED_TITLE};
use super::retry::RetryingTranslator;
use crate::translation::config::{DisplayMode, PipelineConfig};
use crate::translation::error::TranslationError;
use crate::translation::pipeline::{ContentSegmenter, LanguageHeuristic, TextVerdict};
use crate::translation::storage::signature::normalize_text;
use crate::translation::storage::{
    CacheStats, LruWrapperCache, NoopWrapperCache, Signature, SignatureInput, WrapperCache,
    WrapperCodec,
};
use crate::translation::telemetry;

/// 处理模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessMode {
    /// 新条目
    #[default]
    Add,
    /// 已存储条目的刷新，只有此模式会查询上一轮存储
    Update,
    /// 强制重译：忽略签名匹配与标题跳过判定
    Force,
}

impl ProcessMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ProcessMode::Add => "add",
            ProcessMode::Update => "update",
            ProcessMode::Force => "force",
        }
    }
}

impl fmt::Display for ProcessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessMode {
    type Err = TranslationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "add" => Ok(ProcessMode::Add),
            "update" => Ok(ProcessMode::Update),
            "force" => Ok(ProcessMode::Force),
            other => Err(TranslationError::InvalidInput(format!("未知处理模式: {}", other))),
        }
    }
}

/// 分段统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SegmentStats {
    pub total: usize,
    pub translated: usize,
    pub skip_blank: usize,
    pub skip_already_target: usize,
    pub failed: usize,
}

impl SegmentStats {
    /// 实际提交给翻译服务的段数
    pub fn attempted(&self) -> usize {
        self.total - self.skip_blank - self.skip_already_target
    }
}

/// 单个字段（标题或正文）的处理结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FieldOutcome {
    /// 订阅源未启用或开关关闭
    Disabled,
    /// 启发式判定无需翻译
    Skipped { reason: String },
    /// 签名匹配，原样保留
    ReusedUnchanged,
    /// 上游未变化，复用上一轮译文
    ReusedPrevious,
    /// 签名缓存命中
    ReusedCached,
    /// 新译文已写入
    Translated { stats: SegmentStats },
    /// 翻译失败，字段保持不变
    Failed { reason: String },
}

impl FieldOutcome {
    fn skipped(reason: impl Into<String>) -> Self {
        FieldOutcome::Skipped { reason: reason.into() }
    }

    fn failed(reason: impl Into<String>) -> Self {
        FieldOutcome::Failed { reason: reason.into() }
    }

    pub fn is_reused(&self) -> bool {
        matches!(
            self,
            FieldOutcome::ReusedUnchanged | FieldOutcome::ReusedPrevious | FieldOutcome::ReusedCached
        )
    }

    pub fn is_translated(&self) -> bool {
        matches!(self, FieldOutcome::Translated { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, FieldOutcome::Failed { .. })
    }
}

/// 条目整体状态，用于批处理汇总
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Updated,
    Reused,
    Skipped,
    Failed,
}

impl ItemStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::Updated => "updated",
            ItemStatus::Reused => "reused",
            ItemStatus::Skipped => "skipped",
            ItemStatus::Failed => "failed",
        }
    }
}

/// 单条目处理报告
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemReport {
    pub key: String,
    pub title: FieldOutcome,
    pub body: FieldOutcome,
}

impl ItemReport {
    fn disabled(key: String) -> Self {
        Self {
            key,
            title: FieldOutcome::Disabled,
            body: FieldOutcome::Disabled,
        }
    }

    /// 条目任务异常终止时的报告
    pub fn aborted(key: String, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            key,
            title: FieldOutcome::failed(reason.clone()),
            body: FieldOutcome::failed(reason),
        }
    }

    /// 失败优先，其次有新译文，其次复用
    pub fn status(&self) -> ItemStatus {
        let fields = [&self.title, &self.body];
        if fields.iter().any(|f| f.is_failed()) {
            ItemStatus::Failed
        } else if fields.iter().any(|f| f.is_translated()) {
            ItemStatus::Updated
        } else if fields.iter().any(|f| f.is_reused()) {
            ItemStatus::Reused
        } else {
            ItemStatus::Skipped
        }
    }
}

/// 处理后的条目及其报告
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedItem {
    pub item: Item,
    pub report: ItemReport,
}

/// 幂等翻译流水线
pub struct IdempotentTranslationPipeline {
    config: Arc<PipelineConfig>,
    translator: RetryingTranslator,
    store: Arc<dyn ItemStore>,
    cache: Arc<dyn WrapperCache>,
    heuristic: LanguageHeuristic,
    segmenter: ContentSegmenter,
}

impl IdempotentTranslationPipeline {
    /// 创建流水线；缓存按配置选择 LRU 或空实现，默认没有历史存储
    pub fn new(config: Arc<PipelineConfig>, registry: BackendRegistry) -> Self {
        let cache: Arc<dyn WrapperCache> = if config.cache_enabled {
            Arc::new(LruWrapperCache::new(config.cache_capacity))
        } else {
            Arc::new(NoopWrapperCache)
        };

        Self {
            translator: RetryingTranslator::new(registry, config.retry),
            config,
            store: Arc::new(EmptyItemStore),
            cache,
            heuristic: LanguageHeuristic::new(),
            segmenter: ContentSegmenter::new(),
        }
    }

    /// 注入宿主的历史条目存储
    pub fn with_store(mut self, store: Arc<dyn ItemStore>) -> Self {
        self.store = store;
        self
    }

    /// 注入签名缓存
    pub fn with_cache(mut self, cache: Arc<dyn WrapperCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn translator(&self) -> &RetryingTranslator {
        &self.translator
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// 处理一个条目，不设截止时间
    pub async fn process(&self, item: &Item, mode: ProcessMode) -> ProcessedItem {
        self.process_with_deadline(item, mode, None).await
    }

    /// 处理一个条目；截止时间到达后未完成的翻译按失败处理
    pub async fn process_with_deadline(
        &self,
        item: &Item,
        mode: ProcessMode,
        deadline: Option<Instant>,
    ) -> ProcessedItem {
        let key = item.key();
        let config = self.config.as_ref();
        let feed_id = item.feed_id.as_deref();

        if config.is_disabled() || !config.is_feed_enabled(feed_id) {
            tracing::debug!(item = %key, feed = ?feed_id, "订阅源未启用翻译或开关均关闭");
            return ProcessedItem {
                item: item.clone(),
                report: ItemReport::disabled(key),
            };
        }

        let previous = if mode == ProcessMode::Update {
            self.store.load_previous(item).await
        } else {
            None
        };

        let ctx = FieldContext {
            key: &key,
            mode,
            deadline,
            source_lang: config.source_lang_for(feed_id),
            previous: previous.as_ref(),
        };

        let mut output = item.clone();

        let title = if config.translate_title {
            self.process_title(&mut output, &ctx).await
        } else {
            FieldOutcome::Disabled
        };

        let body = if config.translate_content {
            self.process_body(&mut output, &ctx).await
        } else {
            FieldOutcome::Disabled
        };

        let report = ItemReport { key, title, body };
        tracing::info!(
            item = %report.key,
            mode = %mode,
            status = report.status().as_str(),
            "条目处理完成"
        );

        ProcessedItem { item: output, report }
    }

    async fn process_title(&self, item: &mut Item, ctx: &FieldContext<'_>) -> FieldOutcome {
        let display_mode = self.config.display_mode;
        let current = item.title.clone();

        // 已组合过的标题：按存储的原文/译文识别
        let mut source = current.clone();
        if let Some((original, translated)) = item.stored_title_pair() {
            let ours = DisplayMode::ALL
                .iter()
                .any(|mode| mode.compose_title(original, translated) == current);
            if ours {
                let composed = display_mode.compose_title(original, translated);
                if ctx.mode != ProcessMode::Force {
                    if composed == current {
                        tracing::debug!(item = %ctx.key, "标题已是当前译文，跳过");
                        return FieldOutcome::ReusedUnchanged;
                    }
                    tracing::debug!(item = %ctx.key, "显示模式变化，按已存译文重组标题");
                    item.title = composed;
                    return FieldOutcome::ReusedPrevious;
                }
                source = original.to_string();
            }
        }

        if ctx.mode == ProcessMode::Update {
            if let Some(outcome) = self.reuse_previous_title(item, &source, ctx) {
                return outcome;
            }
        }

        if ctx.mode != ProcessMode::Force {
            let verdict = self.heuristic.classify(&source, &self.config.target_lang);
            if verdict.is_skip() {
                tracing::debug!(item = %ctx.key, ?verdict, "标题无需翻译");
                return FieldOutcome::skipped(verdict_reason(verdict));
            }
        }

        let outcome = self
            .translator
            .translate_with_deadline(
                source.trim(),
                self.config.service,
                &self.config.target_lang,
                ctx.source_lang,
                ctx.deadline,
            )
            .await;

        if !outcome.succeeded {
            tracing::warn!(item = %ctx.key, "标题翻译失败，保持原标题");
            return FieldOutcome::failed("标题翻译失败");
        }
        if outcome.text == source.trim() {
            return FieldOutcome::skipped("译文与原文相同");
        }

        item.title = display_mode.compose_title(&source, &outcome.text);
        item.set_attribute(ATTR_ORIGINAL_TITLE, source);
        item.set_attribute(ATTR_TRANSLATED_TITLE, outcome.text);

        FieldOutcome::Translated {
            stats: SegmentStats {
                total: 1,
                translated: 1,
                ..Default::default()
            },
        }
    }

    /// 上游标题未变化时复用上一轮结果
    fn reuse_previous_title(
        &self,
        item: &mut Item,
        source: &str,
        ctx: &FieldContext<'_>,
    ) -> Option<FieldOutcome> {
        let previous = ctx.previous?;
        let previous_original = previous.attribute(ATTR_ORIGINAL_TITLE)?;
        if previous_original.trim().is_empty() || normalize_text(previous_original) != normalize_text(source) {
            return None;
        }

        if let Some((original, translated)) = previous.stored_title_pair() {
            tracing::debug!(item = %ctx.key, "上游标题未变化，复用上一轮译文");
            item.title = self.config.display_mode.compose_title(original, translated);
            item.set_attribute(ATTR_ORIGINAL_TITLE, original);
            item.set_attribute(ATTR_TRANSLATED_TITLE, translated);
            return Some(FieldOutcome::ReusedPrevious);
        }

        if previous.title.trim().is_empty() {
            return None;
        }
        tracing::debug!(item = %ctx.key, "上游标题未变化，复用上一轮显示标题");
        item.title = previous.title.clone();
        Some(FieldOutcome::ReusedPrevious)
    }

    async fn process_body(&self, item: &mut Item, ctx: &FieldContext<'_>) -> FieldOutcome {
        let config = self.config.as_ref();
        let current = item.body.as_str();
        let existing = WrapperCodec::decode_signature(current);

        // 已翻译的输出绝不会被再次翻译
        let original = WrapperCodec::recover_original(current);
        let normalized = normalize_text(&original);

        let verdict = self.heuristic.classify(&normalized, &config.target_lang);
        if verdict.is_skip() {
            tracing::debug!(item = %ctx.key, ?verdict, "正文无需翻译");
            return FieldOutcome::skipped(verdict_reason(verdict));
        }

        let signature = Signature::compute(&SignatureInput {
            normalized_text: &normalized,
            target_lang: &config.target_lang,
            service: config.service,
            display_mode: config.display_mode,
            item_key: ctx.key,
            pipeline_version: &config.pipeline_version,
        });

        if ctx.mode != ProcessMode::Force && existing.as_ref() == Some(&signature) {
            tracing::info!(item = %ctx.key, sig = signature.short(), "签名匹配，复用现有包装");
            return FieldOutcome::ReusedUnchanged;
        }

        if ctx.mode == ProcessMode::Update {
            if let Some(translated) = Self::previous_translation(ctx.previous, &normalized) {
                tracing::info!(item = %ctx.key, sig = signature.short(), "上游未变化，复用上一轮译文并重建包装");
                let wrapped = WrapperCodec::encode(&original, &translated, &signature, config.display_mode);
                self.remember(&signature, &wrapped);
                item.body = wrapped;
                return FieldOutcome::ReusedPrevious;
            }
        }

        if ctx.mode != ProcessMode::Force {
            if let Some(cached) = self.cache.get(&signature) {
                tracing::info!(item = %ctx.key, sig = signature.short(), "签名缓存命中");
                telemetry::record_cache_hit();
                item.body = cached;
                return FieldOutcome::ReusedCached;
            }
        }

        let (translated_html, stats) = self.translate_segments(&original, ctx).await;

        if stats.attempted() == 0 {
            return FieldOutcome::skipped("所有段落都无需翻译");
        }
        if stats.failed == stats.attempted() {
            tracing::warn!(item = %ctx.key, ?stats, "所有段落翻译失败，正文保持不变");
            return FieldOutcome::failed("所有段落翻译失败");
        }
        if normalize_text(&translated_html).is_empty() {
            tracing::warn!(item = %ctx.key, "译文为空，正文保持不变");
            return FieldOutcome::failed("译文为空");
        }

        let wrapped = WrapperCodec::encode(&original, &translated_html, &signature, config.display_mode);
        self.remember(&signature, &wrapped);
        item.body = wrapped;

        tracing::info!(item = %ctx.key, sig = signature.short(), ?stats, "正文翻译完成");
        FieldOutcome::Translated { stats }
    }

    /// 上一轮存储的包装中，原文与当前一致时取其译文
    fn previous_translation(previous: Option<&Item>, normalized: &str) -> Option<String> {
        let wrapper = WrapperCodec::decode(&previous?.body)?;
        if normalize_text(&wrapper.original) != normalized {
            return None;
        }
        wrapper.translated.filter(|t| !normalize_text(t).is_empty())
    }

    async fn translate_segments(&self, original: &str, ctx: &FieldContext<'_>) -> (String, SegmentStats) {
        let config = self.config.as_ref();
        let segmentation = self.segmenter.segment(original);
        if segmentation.is_degraded() {
            tracing::debug!(item = %ctx.key, "分段失败，使用整篇单段模式");
        }

        let mut stats = SegmentStats {
            total: segmentation.len(),
            ..Default::default()
        };
        let mut replacements = Vec::with_capacity(segmentation.len());

        for (idx, text) in segmentation.texts().into_iter().enumerate() {
            match self.heuristic.classify(text, &config.target_lang) {
                TextVerdict::Blank => {
                    stats.skip_blank += 1;
                    replacements.push(None);
                }
                TextVerdict::AlreadyTarget => {
                    stats.skip_already_target += 1;
                    replacements.push(None);
                }
                TextVerdict::Translate => {
                    let outcome = self
                        .translator
                        .translate_with_deadline(text, config.service, &config.target_lang, ctx.source_lang, ctx.deadline)
                        .await;
                    tracing::debug!(item = %ctx.key, segment = idx, service = %outcome.service_used, ok = outcome.succeeded, "段落翻译");
                    if outcome.succeeded {
                        stats.translated += 1;
                        replacements.push(Some(outcome.text));
                    } else {
                        stats.failed += 1;
                        replacements.push(None);
                    }
                }
            }
        }

        let html = self.segmenter.reassemble(original, &segmentation, &replacements);
        (html, stats)
    }

    fn remember(&self, signature: &Signature, wrapped: &str) {
        if self.config.cache_enabled {
            self.cache.put(signature.clone(), wrapped.to_string());
        }
    }
}

/// 单次处理调用中标题与正文共享的上下文
struct FieldContext<'a> {
    key: &'a str,
    mode: ProcessMode,
    deadline: Option<Instant>,
    source_lang: &'a str,
    previous: Option<&'a Item>,
}

fn verdict_reason(verdict: TextVerdict) -> &'static str {
    match verdict {
        TextVerdict::Blank => "内容为空",
        TextVerdict::AlreadyTarget => "已是目标语言",
        TextVerdict::Translate => "需要翻译",
    }
}
