// ==========================================
// 煤炭出口业务系统 - 供货批次领域模型
// ==========================================
// 红线: 已分配数量只从 supply_export 聚合得出，不在此落库
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ==========================================
// Supplier - 供应商
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Supplier {
    pub supplier_id: i64,
    pub name: String,
}

// ==========================================
// Supply - 供货批次（按袋计）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Supply {
    pub supply_id: i64,
    pub supplier_id: i64,
    pub supply_date: NaiveDate,

    // ===== 数量 =====
    pub quantity_bags: i64, // 总袋数

    // ===== 质量分级（可能只做了部分分级，合计不必等于总袋数）=====
    pub grade_a: i64,
    pub grade_b: i64,
    pub rejected: i64,
    pub dust: i64,
    pub wood: i64,

    // ===== 财务（敏感字段）=====
    pub price_per_bag: Option<f64>,

    pub notes: Option<String>,
}

impl Supply {
    /// 质量摘要（用于出口备货来源展示）
    pub fn quality_summary(&self) -> String {
        format_quality_summary(self.grade_a, self.grade_b, self.rejected)
    }

    /// 距入库天数；未来日期按 0 处理
    pub fn age_in_days(&self, today: NaiveDate) -> i64 {
        (today - self.supply_date).num_days().max(0)
    }
}

/// 质量摘要格式 "A: x, B: y, Rejected: z"；分配明细查询直接用列值调用
pub fn format_quality_summary(grade_a: i64, grade_b: i64, rejected: i64) -> String {
    format!("A: {}, B: {}, Rejected: {}", grade_a, grade_b, rejected)
}

// ==========================================
// NewSupply - 入库录入参数
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSupply {
    pub supplier_id: i64,
    pub supply_date: NaiveDate,
    pub quantity_bags: i64,
    #[serde(default)]
    pub grade_a: i64,
    #[serde(default)]
    pub grade_b: i64,
    #[serde(default)]
    pub rejected: i64,
    #[serde(default)]
    pub dust: i64,
    #[serde(default)]
    pub wood: i64,
    #[serde(default)]
    pub price_per_bag: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewSupply {
    pub fn new(supplier_id: i64, supply_date: NaiveDate, quantity_bags: i64) -> Self {
        Self {
            supplier_id,
            supply_date,
            quantity_bags,
            grade_a: 0,
            grade_b: 0,
            rejected: 0,
            dust: 0,
            wood: 0,
            price_per_bag: None,
            notes: None,
        }
    }

    /// 建构器模式：设置 A/B/拒收 分级
    pub fn with_grades(mut self, grade_a: i64, grade_b: i64, rejected: i64) -> Self {
        self.grade_a = grade_a;
        self.grade_b = grade_b;
        self.rejected = rejected;
        self
    }

    /// 建构器模式：设置粉煤/杂木数量
    pub fn with_impurities(mut self, dust: i64, wood: i64) -> Self {
        self.dust = dust;
        self.wood = wood;
        self
    }

    pub fn with_price_per_bag(mut self, price: f64) -> Self {
        self.price_per_bag = Some(price);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Supply {
        Supply {
            supply_id: 1,
            supplier_id: 1,
            supply_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            quantity_bags: 1000,
            grade_a: 800,
            grade_b: 150,
            rejected: 50,
            dust: 0,
            wood: 0,
            price_per_bag: Some(2.5),
            notes: None,
        }
    }

    #[test]
    fn test_quality_summary() {
        assert_eq!(sample().quality_summary(), "A: 800, B: 150, Rejected: 50");
    }

    #[test]
    fn test_age_in_days() {
        let supply = sample();
        let today = NaiveDate::from_ymd_opt(2025, 3, 31).unwrap();
        assert_eq!(supply.age_in_days(today), 30);
        // 未来日期不出现负龄
        let before = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();
        assert_eq!(supply.age_in_days(before), 0);
    }
}
