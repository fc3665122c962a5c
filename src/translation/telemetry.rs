//! 流水线计数器
//!
//! 通过 `metrics` 门面上报，未安装 recorder 时为空操作。

use metrics::counter;

use crate::translation::core::backend::ServiceKind;

/// 后端调用次数
pub fn record_attempt(service: ServiceKind, succeeded: bool) {
    let outcome = if succeeded { "ok" } else { "error" };
    counter!(
        "feed_translate_backend_attempts_total",
        "service" => service.as_str(),
        "outcome" => outcome
    )
    .increment(1);
}

/// 回退到基线服务
pub fn record_fallback(from: ServiceKind) {
    counter!("feed_translate_fallbacks_total", "from" => from.as_str()).increment(1);
}

/// 签名缓存命中
pub fn record_cache_hit() {
    counter!("feed_translate_cache_hits_total").increment(1);
}

/// 条目处理结果
pub fn record_item(kind: &'static str) {
    counter!("feed_translate_items_total", "result" => kind).increment(1);
}
