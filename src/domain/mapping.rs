// ==========================================
// 煤炭出口业务系统 - 供货/出口分配记录
// ==========================================
// 红线: supply_export 是“哪批货进了哪个出口批次”的唯一事实来源
// 自然键: (supply_id, export_id)，更新 = 同一事务内删除后重建
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::domain::types::ExportStatus;

// ==========================================
// SupplyExportMapping - 已提交的分配
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplyExportMapping {
    pub supply_id: i64,
    pub export_id: i64,
    pub quantity_bags: i64,        // > 0
    pub priority: Option<i64>,     // 派生的优先分（仅供参考）
    pub notes: Option<String>,
    pub allocated_at: NaiveDateTime,
}

// ==========================================
// NewMapping - 分配请求
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMapping {
    pub supply_id: i64,
    pub export_id: i64,
    pub quantity_bags: i64,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewMapping {
    pub fn new(supply_id: i64, export_id: i64, quantity_bags: i64) -> Self {
        Self {
            supply_id,
            export_id,
            quantity_bags,
            priority: None,
            notes: None,
        }
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

// ==========================================
// MappingDetail - 分配记录 + 两端展示字段
// ==========================================
/// 批量分配结果与列表展示共用，可直接给前端渲染
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingDetail {
    pub mapping: SupplyExportMapping,

    // 供货侧
    pub supplier_name: String,
    pub supply_date: NaiveDate,
    pub supply_quantity_bags: i64,
    pub quality_summary: String, // "A: x, B: y, Rejected: z"

    // 出口侧
    pub destination: String,
    pub export_status: ExportStatus,
    pub export_quantity_bags: i64,
}
