//! 批处理翻译服务
//!
//! 每个条目一个 tokio 任务，由信号量限制并发。单个条目的失败或崩溃只计入汇总，
//! 原条目原样返回，不会中断其它条目。输出顺序与输入一致。

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::Semaphore;

use super::backend::{ProbeReport, ServiceKind};
use super::engine::{IdempotentTranslationPipeline, ItemReport, ItemStatus, ProcessMode, ProcessedItem};
use super::item::{Item, ItemStore};
use crate::translation::config::TranslationSettings;
use crate::translation::error::TranslationResult;
use crate::translation::providers;
use crate::translation::telemetry;

/// 批处理汇总
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub processed: usize,
    pub updated: usize,
    pub reused: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn record(&mut self, status: ItemStatus) {
        self.processed += 1;
        match status {
            ItemStatus::Updated => self.updated += 1,
            ItemStatus::Reused => self.reused += 1,
            ItemStatus::Skipped => self.skipped += 1,
            ItemStatus::Failed => self.failed += 1,
        }
    }
}

/// 批处理输出
#[derive(Debug, Clone)]
pub struct BatchOutput {
    /// 与输入同序的条目
    pub items: Vec<Item>,
    pub reports: Vec<ItemReport>,
    pub summary: BatchSummary,
}

/// 统一的批处理翻译服务
pub struct TranslationService {
    pipeline: Arc<IdempotentTranslationPipeline>,
    stats: Arc<ServiceStats>,
}

impl TranslationService {
    pub fn new(pipeline: IdempotentTranslationPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            stats: Arc::new(ServiceStats::default()),
        }
    }

    /// 按设置构建后端与流水线
    pub fn from_settings(
        settings: &TranslationSettings,
        store: Option<Arc<dyn ItemStore>>,
    ) -> TranslationResult<Self> {
        let config = Arc::new(settings.snapshot());
        let registry = providers::build_registry(settings)?;

        let mut pipeline = IdempotentTranslationPipeline::new(config, registry);
        if let Some(store) = store {
            pipeline = pipeline.with_store(store);
        }

        Ok(Self::new(pipeline))
    }

    pub fn pipeline(&self) -> &IdempotentTranslationPipeline {
        &self.pipeline
    }

    /// 批量处理条目
    pub async fn process_batch(&self, items: Vec<Item>, mode: ProcessMode) -> BatchOutput {
        let started = Instant::now();
        let config = self.pipeline.config();
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_items.max(1)));
        let item_timeout = config.item_timeout;

        tracing::info!(
            items = items.len(),
            mode = %mode,
            concurrency = config.max_concurrent_items,
            "开始批处理"
        );

        let handles: Vec<_> = items
            .iter()
            .cloned()
            .map(|item| {
                let pipeline = Arc::clone(&self.pipeline);
                let semaphore = Arc::clone(&semaphore);
                tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await.ok();
                    let deadline = item_timeout.map(|timeout| tokio::time::Instant::now() + timeout);
                    pipeline.process_with_deadline(&item, mode, deadline).await
                })
            })
            .collect();

        let results = join_all(handles).await;

        let mut output = BatchOutput {
            items: Vec::with_capacity(items.len()),
            reports: Vec::with_capacity(items.len()),
            summary: BatchSummary::default(),
        };

        for (original, result) in items.into_iter().zip(results) {
            let ProcessedItem { item, report } = match result {
                Ok(processed) => processed,
                Err(e) => {
                    let key = original.key();
                    tracing::error!(item = %key, "条目任务异常终止: {}", e);
                    ProcessedItem {
                        report: ItemReport::aborted(key, format!("任务异常终止: {}", e)),
                        item: original,
                    }
                }
            };

            let status = report.status();
            telemetry::record_item(status.as_str());
            self.stats.record(status);
            output.summary.record(status);
            output.items.push(item);
            output.reports.push(report);
        }

        let elapsed = started.elapsed();
        self.stats.add_processing_time(elapsed);
        self.stats.inc_batches();

        tracing::info!(
            processed = output.summary.processed,
            updated = output.summary.updated,
            reused = output.summary.reused,
            skipped = output.summary.skipped,
            failed = output.summary.failed,
            "批处理完成，耗时 {:?}",
            elapsed
        );

        output
    }

    /// 强制重译：以 Force 模式处理整批条目
    ///
    /// 不在这里去包装；流水线处理每个字段时先从包装中恢复原文，再忽略签名与缓存重新翻译。
    pub async fn force_refresh(&self, items: Vec<Item>) -> BatchOutput {
        self.process_batch(items, ProcessMode::Force).await
    }

    /// 检测指定服务的连通性
    pub async fn probe(&self, service: ServiceKind, target_lang: &str) -> Option<ProbeReport> {
        let backend = self.pipeline.translator().registry().get(service)?;
        Some(backend.probe(target_lang).await)
    }

    /// 获取服务统计信息
    pub fn get_stats(&self) -> ServiceStatsSnapshot {
        self.stats.snapshot()
    }
}

/// 服务运行统计，原子计数
#[derive(Debug, Default)]
pub struct ServiceStats {
    batches: AtomicUsize,
    items_processed: AtomicUsize,
    items_updated: AtomicUsize,
    items_reused: AtomicUsize,
    items_skipped: AtomicUsize,
    items_failed: AtomicUsize,
    /// 微秒
    processing_time: AtomicU64,
}

impl ServiceStats {
    fn record(&self, status: ItemStatus) {
        self.items_processed.fetch_add(1, Ordering::Relaxed);
        let counter = match status {
            ItemStatus::Updated => &self.items_updated,
            ItemStatus::Reused => &self.items_reused,
            ItemStatus::Skipped => &self.items_skipped,
            ItemStatus::Failed => &self.items_failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn inc_batches(&self) {
        self.batches.fetch_add(1, Ordering::Relaxed);
    }

    fn add_processing_time(&self, duration: Duration) {
        self.processing_time
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ServiceStatsSnapshot {
        ServiceStatsSnapshot {
            batches: self.batches.load(Ordering::Relaxed),
            items_processed: self.items_processed.load(Ordering::Relaxed),
            items_updated: self.items_updated.load(Ordering::Relaxed),
            items_reused: self.items_reused.load(Ordering::Relaxed),
            items_skipped: self.items_skipped.load(Ordering::Relaxed),
            items_failed: self.items_failed.load(Ordering::Relaxed),
            processing_time: Duration::from_micros(self.processing_time.load(Ordering::Relaxed)),
        }
    }
}

/// 统计数据快照
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceStatsSnapshot {
    pub batches: usize,
    pub items_processed: usize,
    pub items_updated: usize,
    pub items_reused: usize,
    pub items_skipped: usize,
    pub items_failed: usize,
    pub processing_time: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts() {
        let mut summary = BatchSummary::default();
        summary.record(ItemStatus::Updated);
        summary.record(ItemStatus::Failed);
        summary.record(ItemStatus::Skipped);
        summary.record(ItemStatus::Reused);
        summary.record(ItemStatus::Updated);

        assert_eq!(
            summary,
            BatchSummary { processed: 5, updated: 2, reused: 1, skipped: 1, failed: 1 }
        );
    }

    #[test]
    fn test_stats_snapshot() {
        let stats = ServiceStats::default();
        stats.record(ItemStatus::Updated);
        stats.record(ItemStatus::Failed);
        stats.inc_batches();
        stats.add_processing_time(Duration::from_millis(5));

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.items_processed, 2);
        assert_eq!(snapshot.items_failed, 1);
        assert_eq!(snapshot.batches, 1);
        assert_eq!(snapshot.processing_time, Duration::from_millis(5));
    }

    #[tokio::test]
    async fn test_from_settings_builds_all_backends() {
        let service = TranslationService::from_settings(&TranslationSettings::default(), None).unwrap();
        assert_eq!(service.pipeline().translator().registry().len(), 4);

        let report = service.probe(ServiceKind::Deeplx, "zh-cn").await.unwrap();
        assert!(!report.ok, "unconfigured DeepLX must fail the probe without a network call");
    }
}
