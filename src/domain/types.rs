// ==========================================
// 煤炭出口业务系统 - 领域类型定义
// ==========================================
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 出口批次状态 (Export Status)
// ==========================================
// 由出运跟踪模块维护，分配引擎只读
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExportStatus {
    Pending,   // 待出运
    InTransit, // 在途
    Delivered, // 已交付
    Cancelled, // 已取消
}

impl fmt::Display for ExportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportStatus::Pending => write!(f, "PENDING"),
            ExportStatus::InTransit => write!(f, "IN_TRANSIT"),
            ExportStatus::Delivered => write!(f, "DELIVERED"),
            ExportStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

impl std::str::FromStr for ExportStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "PENDING" => Ok(ExportStatus::Pending),
            "IN_TRANSIT" => Ok(ExportStatus::InTransit),
            "DELIVERED" => Ok(ExportStatus::Delivered),
            "CANCELLED" => Ok(ExportStatus::Cancelled),
            other => Err(format!("未知出口状态: {}", other)),
        }
    }
}

impl Default for ExportStatus {
    fn default() -> Self {
        ExportStatus::Pending
    }
}

// ==========================================
// 供货批次分配状态 (派生，不落库)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SupplyAllocationState {
    Unallocated,        // 未分配
    PartiallyAllocated, // 部分分配
    FullyAllocated,     // 已分配完
}

impl SupplyAllocationState {
    /// 按已分配/可用数量归类
    ///
    /// 规则顺序：available<=0 → 已分配完（total=0 时视为空集完成）；
    /// allocated==0 → 未分配；其余为部分分配。
    pub fn classify(allocated: i64, available: i64) -> Self {
        if available <= 0 {
            SupplyAllocationState::FullyAllocated
        } else if allocated == 0 {
            SupplyAllocationState::Unallocated
        } else {
            SupplyAllocationState::PartiallyAllocated
        }
    }
}

impl fmt::Display for SupplyAllocationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SupplyAllocationState::Unallocated => write!(f, "UNALLOCATED"),
            SupplyAllocationState::PartiallyAllocated => write!(f, "PARTIALLY_ALLOCATED"),
            SupplyAllocationState::FullyAllocated => write!(f, "FULLY_ALLOCATED"),
        }
    }
}

// ==========================================
// 出口批次备货状态 (派生，不落库)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExportSourcingState {
    Unsourced,        // 未备货
    PartiallySourced, // 部分备货
    FullySourced,     // 备货完成
}

impl ExportSourcingState {
    /// 与 SupplyAllocationState::classify 同一口径
    pub fn classify(sourced: i64, needed: i64) -> Self {
        if needed <= 0 {
            ExportSourcingState::FullySourced
        } else if sourced == 0 {
            ExportSourcingState::Unsourced
        } else {
            ExportSourcingState::PartiallySourced
        }
    }
}

impl fmt::Display for ExportSourcingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportSourcingState::Unsourced => write!(f, "UNSOURCED"),
            ExportSourcingState::PartiallySourced => write!(f, "PARTIALLY_SOURCED"),
            ExportSourcingState::FullySourced => write!(f, "FULLY_SOURCED"),
        }
    }
}
