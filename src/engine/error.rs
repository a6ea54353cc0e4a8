// ==========================================
// 煤炭出口业务系统 - 分配引擎错误类型
// ==========================================
// 红线: 每条错误消息必须带上实体 ID 与涉及的数量，
//       操作员无需查日志即可处理
// ==========================================

use crate::repository::error::RepositoryError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// 引用的实体类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityKind {
    Supply,
    Export,
    Mapping,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Supply => write!(f, "Supply"),
            EntityKind::Export => write!(f, "Export"),
            EntityKind::Mapping => write!(f, "Mapping"),
        }
    }
}

/// 容量不足发生在哪一侧
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CapacitySide {
    Supply,
    Export,
}

impl CapacitySide {
    /// 供货侧叫 available，出口侧叫 needed
    pub fn remaining_label(&self) -> &'static str {
        match self {
            CapacitySide::Supply => "available",
            CapacitySide::Export => "needed",
        }
    }
}

impl fmt::Display for CapacitySide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapacitySide::Supply => write!(f, "Supply"),
            CapacitySide::Export => write!(f, "Export"),
        }
    }
}

/// 分配引擎错误类型
#[derive(Error, Debug)]
pub enum AllocationError {
    #[error("{entity} #{id} 不存在")]
    NotFound { entity: EntityKind, id: String },

    #[error(
        "{side} #{id} 容量不足: {}={available}, requested={requested}, total={total}",
        .side.remaining_label()
    )]
    CapacityExceeded {
        side: CapacitySide,
        id: i64,
        requested: i64,
        available: i64,
        total: i64,
    },

    #[error("分配记录已存在: supply #{supply_id} -> export #{export_id}, existing quantity={existing_quantity}，请改为更新")]
    DuplicateMapping {
        supply_id: i64,
        export_id: i64,
        existing_quantity: i64,
    },

    #[error("分配数量必须大于 0: supply #{supply_id} -> export #{export_id}, requested={requested}")]
    InvalidQuantity {
        supply_id: i64,
        export_id: i64,
        requested: i64,
    },

    /// 整批事务失败，已全部回滚
    #[error("批量分配事务失败（已回滚）: {message}")]
    TransactionFailure { message: String, transient: bool },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl AllocationError {
    pub fn supply_not_found(supply_id: i64) -> Self {
        AllocationError::NotFound {
            entity: EntityKind::Supply,
            id: supply_id.to_string(),
        }
    }

    pub fn export_not_found(export_id: i64) -> Self {
        AllocationError::NotFound {
            entity: EntityKind::Export,
            id: export_id.to_string(),
        }
    }

    pub fn mapping_not_found(supply_id: i64, export_id: i64) -> Self {
        AllocationError::NotFound {
            entity: EntityKind::Mapping,
            id: format!("supply={}, export={}", supply_id, export_id),
        }
    }

    /// 输入类校验失败（不可重试，批量校验时收集而不中断）
    pub fn is_validation_failure(&self) -> bool {
        matches!(
            self,
            AllocationError::NotFound { .. }
                | AllocationError::CapacityExceeded { .. }
                | AllocationError::DuplicateMapping { .. }
                | AllocationError::InvalidQuantity { .. }
        )
    }

    /// 锁竞争等瞬时故障，调用方可重试一次
    pub fn is_transient(&self) -> bool {
        match self {
            AllocationError::TransactionFailure { transient, .. } => *transient,
            AllocationError::Repository(e) => e.is_transient(),
            _ => false,
        }
    }
}

pub type EngineResult<T> = Result<T, AllocationError>;
