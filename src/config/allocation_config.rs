// ==========================================
// 煤炭出口业务系统 - 分配引擎参数
// ==========================================
// 存储位置: config_kv（scope_id='global'，key 见 config_keys）
// 缺省值即业务口径，配置缺失或格式错误时回退
// ==========================================

use crate::engine::strategy::AllocationStrategy;
use serde::{Deserialize, Serialize};

/// 分配引擎参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationConfig {
    /// 请求未指定策略时使用
    #[serde(default)]
    pub default_strategy: AllocationStrategy,

    /// 请求未指定建议条数时使用
    #[serde(default = "default_max_suggestions")]
    pub default_max_suggestions: usize,

    /// 单次建议条数上限
    #[serde(default = "default_max_suggestions_limit")]
    pub max_suggestions_limit: usize,

    /// OPTIMAL 策略：质量分差超过该值才按质量排序，否则按入库日期
    #[serde(default = "default_optimal_quality_gap")]
    pub optimal_quality_gap: f64,

    /// 推荐理由阈值
    #[serde(default = "default_high_quality_threshold")]
    pub high_quality_threshold: f64,
    #[serde(default = "default_older_stock_days")]
    pub older_stock_days: i64,
    #[serde(default = "default_low_utilization_pct")]
    pub low_utilization_pct: f64,

    /// 低利用率批次的优先分加成
    #[serde(default = "default_low_utilization_bonus")]
    pub low_utilization_bonus: f64,

    /// 新鲜度加成窗口（天）：加成 = max(0, 窗口 - 库龄)
    #[serde(default = "default_recency_window_days")]
    pub recency_window_days: i64,

    /// 批量分配遇到锁竞争时，重试前的等待（毫秒）
    #[serde(default = "default_bulk_retry_backoff_ms")]
    pub bulk_retry_backoff_ms: u64,
}

fn default_max_suggestions() -> usize {
    10
}

fn default_max_suggestions_limit() -> usize {
    50
}

fn default_optimal_quality_gap() -> f64 {
    10.0
}

fn default_high_quality_threshold() -> f64 {
    80.0
}

fn default_older_stock_days() -> i64 {
    30
}

fn default_low_utilization_pct() -> f64 {
    50.0
}

fn default_low_utilization_bonus() -> f64 {
    20.0
}

fn default_recency_window_days() -> i64 {
    100
}

fn default_bulk_retry_backoff_ms() -> u64 {
    100
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            default_strategy: AllocationStrategy::default(),
            default_max_suggestions: default_max_suggestions(),
            max_suggestions_limit: default_max_suggestions_limit(),
            optimal_quality_gap: default_optimal_quality_gap(),
            high_quality_threshold: default_high_quality_threshold(),
            older_stock_days: default_older_stock_days(),
            low_utilization_pct: default_low_utilization_pct(),
            low_utilization_bonus: default_low_utilization_bonus(),
            recency_window_days: default_recency_window_days(),
            bulk_retry_backoff_ms: default_bulk_retry_backoff_ms(),
        }
    }
}

impl AllocationConfig {
    /// 解析请求的建议条数：缺省取默认值，并夹在 [1, 上限] 内
    pub fn effective_max_suggestions(&self, requested: Option<usize>) -> usize {
        let limit = self.max_suggestions_limit.max(1);
        requested
            .unwrap_or(self.default_max_suggestions)
            .clamp(1, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AllocationConfig::default();
        assert_eq!(cfg.default_strategy, AllocationStrategy::Optimal);
        assert_eq!(cfg.default_max_suggestions, 10);
        assert_eq!(cfg.optimal_quality_gap, 10.0);
        assert_eq!(cfg.recency_window_days, 100);
        assert_eq!(cfg.bulk_retry_backoff_ms, 100);
    }

    #[test]
    fn test_effective_max_suggestions() {
        let cfg = AllocationConfig::default();
        assert_eq!(cfg.effective_max_suggestions(None), 10);
        assert_eq!(cfg.effective_max_suggestions(Some(0)), 1);
        assert_eq!(cfg.effective_max_suggestions(Some(3)), 3);
        assert_eq!(cfg.effective_max_suggestions(Some(500)), 50);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let cfg: AllocationConfig =
            serde_json::from_str(r#"{"default_strategy":"FIFO","older_stock_days":45}"#).unwrap();
        assert_eq!(cfg.default_strategy, AllocationStrategy::Fifo);
        assert_eq!(cfg.older_stock_days, 45);
        assert_eq!(cfg.max_suggestions_limit, 50);
    }
}
