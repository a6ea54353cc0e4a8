// ==========================================
// 煤炭出口业务系统 - 分配策略定义
// ==========================================
// 用途：
// - 建议分配时按策略对候选供货排序（升序 = 先处理）；
// - 自动分配落库时在 notes 中记录所用策略，结果可复现。
// ==========================================

use crate::engine::scoring::ScoredSupply;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// 分配策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AllocationStrategy {
    Optimal,
    Fifo,
    Lifo,
    QualityFirst,
}

impl AllocationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            AllocationStrategy::Optimal => "OPTIMAL",
            AllocationStrategy::Fifo => "FIFO",
            AllocationStrategy::Lifo => "LIFO",
            AllocationStrategy::QualityFirst => "QUALITY_FIRST",
        }
    }

    /// 优先分是否叠加新鲜度加成
    pub fn uses_recency_bonus(&self) -> bool {
        matches!(self, AllocationStrategy::Fifo | AllocationStrategy::Optimal)
    }

    pub fn all() -> [AllocationStrategy; 4] {
        [
            AllocationStrategy::Optimal,
            AllocationStrategy::Fifo,
            AllocationStrategy::Lifo,
            AllocationStrategy::QualityFirst,
        ]
    }
}

impl Default for AllocationStrategy {
    fn default() -> Self {
        AllocationStrategy::Optimal
    }
}

impl fmt::Display for AllocationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AllocationStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().replace('-', "_").as_str() {
            "OPTIMAL" => Ok(AllocationStrategy::Optimal),
            "FIFO" => Ok(AllocationStrategy::Fifo),
            "LIFO" => Ok(AllocationStrategy::Lifo),
            "QUALITY_FIRST" => Ok(AllocationStrategy::QualityFirst),
            other => Err(format!("未知分配策略: {}", other)),
        }
    }
}

/// 候选供货的最低质量要求
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MinQuality {
    Any,
    GradeAOnly,
    /// 与 ANY 相同，不额外过滤
    Mixed,
}

impl MinQuality {
    pub fn requires_grade_a(&self) -> bool {
        matches!(self, MinQuality::GradeAOnly)
    }
}

impl Default for MinQuality {
    fn default() -> Self {
        MinQuality::Any
    }
}

impl std::str::FromStr for MinQuality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().replace('-', "_").as_str() {
            "ANY" => Ok(MinQuality::Any),
            "GRADE_A_ONLY" => Ok(MinQuality::GradeAOnly),
            "MIXED" => Ok(MinQuality::Mixed),
            other => Err(format!("未知质量要求: {}", other)),
        }
    }
}

// ==========================================
// 候选排序
// ==========================================

/// 比较两个候选供货
///
/// # 返回
/// Ordering::Less 表示 a 先于 b 处理；最终以 supply_id 打破平局
pub fn compare_candidates(
    strategy: AllocationStrategy,
    a: &ScoredSupply,
    b: &ScoredSupply,
    quality_gap: f64,
) -> Ordering {
    let date_a = a.supply.supply_date;
    let date_b = b.supply.supply_date;

    let ord = match strategy {
        AllocationStrategy::Fifo => date_a.cmp(&date_b),
        AllocationStrategy::Lifo => date_b.cmp(&date_a),
        AllocationStrategy::QualityFirst => b
            .quality_score
            .total_cmp(&a.quality_score)
            .then_with(|| date_a.cmp(&date_b)),
        AllocationStrategy::Optimal => {
            if (a.quality_score - b.quality_score).abs() > quality_gap {
                b.quality_score.total_cmp(&a.quality_score)
            } else {
                date_a.cmp(&date_b)
            }
        }
    };

    ord.then_with(|| a.supply.supply_id.cmp(&b.supply.supply_id))
}

/// 按策略就地排序候选
///
/// OPTIMAL 的“分差阈值”比较不满足传递性，不能交给 sort_by
/// （全序前提被破坏时标准库排序可能 panic）；改用稳定插入排序，
/// 结果只依赖输入顺序，确定可复现。
pub fn sort_candidates(candidates: &mut [ScoredSupply], strategy: AllocationStrategy, quality_gap: f64) {
    match strategy {
        AllocationStrategy::Optimal => {
            insertion_sort_by(candidates, |a, b| compare_candidates(strategy, a, b, quality_gap))
        }
        _ => candidates.sort_by(|a, b| compare_candidates(strategy, a, b, quality_gap)),
    }
}

fn insertion_sort_by<T>(items: &mut [T], mut cmp: impl FnMut(&T, &T) -> Ordering) {
    for i in 1..items.len() {
        let mut j = i;
        while j > 0 && cmp(&items[j - 1], &items[j]) == Ordering::Greater {
            items.swap(j - 1, j);
            j -= 1;
        }
    }
}
