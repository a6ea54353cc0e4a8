// ==========================================
// 煤炭出口业务系统 - 评分与派生指标
// ==========================================
// 职责: 质量分、优先分、利用率/履约率、推荐理由
// 红线: 全部为纯函数，不访问数据库
// ==========================================

use crate::config::allocation_config::AllocationConfig;
use crate::domain::supply::Supply;
use crate::engine::ledger::QuantityLedger;
use crate::engine::strategy::AllocationStrategy;
use crate::repository::supply_repo::SupplyWithMappings;
use chrono::NaiveDate;

/// 保留两位小数
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// 百分比（两位小数）；total<=0 时为 0
pub fn percentage(part: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    round2(part as f64 / total as f64 * 100.0)
}

/// 质量分 = ((A*3 + B*2 - Rejected) / 总袋数) * 100；总袋数为 0 时为 0
pub fn quality_score(grade_a: i64, grade_b: i64, rejected: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    let weighted = (grade_a * 3 + grade_b * 2 - rejected) as f64;
    weighted / total as f64 * 100.0
}

pub fn supply_quality_score(supply: &Supply) -> f64 {
    quality_score(supply.grade_a, supply.grade_b, supply.rejected, supply.quantity_bags)
}

/// 优先分（仅供参考，随自动分配落库）
///
/// 基础 = 质量分；FIFO/OPTIMAL 叠加 max(0, 窗口 - 库龄)；
/// 利用率低于阈值再加固定分；取整时 .5 一律向上（-2.5 取 -2）。
pub fn priority_score(
    quality: f64,
    age_in_days: i64,
    utilization_pct: f64,
    strategy: AllocationStrategy,
    config: &AllocationConfig,
) -> i64 {
    let mut score = quality;
    if strategy.uses_recency_bonus() {
        score += (config.recency_window_days - age_in_days).max(0) as f64;
    }
    if utilization_pct < config.low_utilization_pct {
        score += config.low_utilization_bonus;
    }
    (score + 0.5).floor() as i64
}

/// 推荐理由（可并列，用 ", " 连接）
pub fn recommendation(
    quality: f64,
    age_in_days: i64,
    utilization_pct: f64,
    config: &AllocationConfig,
) -> String {
    let mut reasons: Vec<&str> = Vec::new();
    if quality > config.high_quality_threshold {
        reasons.push("High quality");
    }
    if age_in_days > config.older_stock_days {
        reasons.push("Older stock (FIFO)");
    }
    if utilization_pct < config.low_utilization_pct {
        reasons.push("Low utilization");
    }
    if reasons.is_empty() {
        reasons.push("Available capacity");
    }
    reasons.join(", ")
}

// ==========================================
// ScoredSupply - 带派生指标的候选供货
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredSupply {
    pub supply: Supply,
    pub supplier_name: String,
    pub used_quantity: i64,
    pub available_quantity: i64,
    pub utilization_percentage: f64,
    pub quality_score: f64,
    pub age_in_days: i64,
}

impl ScoredSupply {
    /// 由列表行计算派生指标（已用量经 QuantityLedger 汇总）
    pub fn from_listing(listing: SupplyWithMappings, today: NaiveDate) -> Self {
        let used = QuantityLedger::sum_mapping_quantities(&listing.mapping_quantities);
        let supply = listing.supply;
        let total = supply.quantity_bags;
        Self {
            used_quantity: used,
            available_quantity: total - used,
            utilization_percentage: percentage(used, total),
            quality_score: supply_quality_score(&supply),
            age_in_days: supply.age_in_days(today),
            supplier_name: listing.supplier_name,
            supply,
        }
    }
}
