// ==========================================
// 煤炭出口业务系统 - 分配校验器
// ==========================================
// 校验顺序（每一步都有独立错误）:
// 0) 数量 > 0
// 1) 供货存在  2) 出口批次存在
// 3) 数量 <= 供货可用量  4) 数量 <= 出口待备量
// 5) 该 (供货, 出口) 组合尚无分配记录
// 说明: 校验结果只是快照，不占用容量；真正占用发生在写入时
// ==========================================

use crate::domain::mapping::{NewMapping, SupplyExportMapping};
use crate::engine::error::{AllocationError, CapacitySide, EngineResult};
use crate::engine::ledger::QuantityLedger;
use crate::engine::repositories::AllocationRepositories;
use crate::repository::{ExportRepository, MappingRepository, SupplyRepository};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ==========================================
// 校验结果
// ==========================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplyCapacitySnapshot {
    pub supply_id: i64,
    pub total_quantity: i64,
    pub used_quantity: i64,
    pub available_quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportCapacitySnapshot {
    pub export_id: i64,
    pub total_quantity: i64,
    pub sourced_quantity: i64,
    pub needed_quantity: i64,
}

/// 校验通过时的容量快照（仅供展示）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub supply: SupplyCapacitySnapshot,
    pub export: ExportCapacitySnapshot,
    pub requested_quantity: i64,
    pub can_allocate: bool,
}

/// 批量操作中某一项的失败
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkItemError {
    pub index: usize,
    pub supply_id: i64,
    pub export_id: i64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkValidationItem {
    pub index: usize,
    pub supply_id: i64,
    pub export_id: i64,
    pub quantity_bags: i64,
    pub valid: bool,
    pub validation: Option<ValidationResult>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkValidationSummary {
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkValidationReport {
    pub results: Vec<BulkValidationItem>,
    pub errors: Vec<BulkItemError>,
    pub summary: BulkValidationSummary,
}

impl BulkValidationReport {
    pub fn all_valid(&self) -> bool {
        self.summary.invalid == 0
    }
}

// ==========================================
// BatchReservations - 批内已占用量
// ==========================================
/// 同一批次中排在前面的项对容量的占用
///
/// 批量校验时后续项要在“已提交 + 批内已占用”的基础上校验，
/// 否则两项各自看到完整可用量，合起来却超分。
#[derive(Debug, Clone, Default)]
pub struct BatchReservations {
    supply: HashMap<i64, i64>,
    export: HashMap<i64, i64>,
    pairs: HashMap<(i64, i64), i64>,
}

impl BatchReservations {
    pub fn reserve(&mut self, supply_id: i64, export_id: i64, quantity: i64) {
        *self.supply.entry(supply_id).or_insert(0) += quantity;
        *self.export.entry(export_id).or_insert(0) += quantity;
        self.pairs.insert((supply_id, export_id), quantity);
    }

    fn supply_reserved(&self, supply_id: i64) -> i64 {
        self.supply.get(&supply_id).copied().unwrap_or(0)
    }

    fn export_reserved(&self, export_id: i64) -> i64 {
        self.export.get(&export_id).copied().unwrap_or(0)
    }

    fn pair_reserved(&self, supply_id: i64, export_id: i64) -> Option<i64> {
        self.pairs.get(&(supply_id, export_id)).copied()
    }
}

// ==========================================
// MappingValidator
// ==========================================
pub struct MappingValidator {
    repos: AllocationRepositories,
}

impl MappingValidator {
    pub fn new(repos: AllocationRepositories) -> Self {
        Self { repos }
    }

    /// 校验单条分配请求
    ///
    /// # 返回
    /// - Ok(ValidationResult): 可分配，附容量快照
    /// - Err(InvalidQuantity / NotFound / CapacityExceeded / DuplicateMapping)
    /// - Err(Repository): 存储故障
    pub fn validate(&self, supply_id: i64, export_id: i64, quantity_bags: i64) -> EngineResult<ValidationResult> {
        self.repos.with_conn(|conn| {
            Self::validate_on(conn, supply_id, export_id, quantity_bags, &BatchReservations::default())
        })
    }

    /// 批量校验（保序，收集全部结果，不在首个失败处停止）
    ///
    /// 前面通过的项会占用容量与 (供货, 出口) 组合，后续项在此基础上校验。
    pub fn validate_bulk(&self, items: &[NewMapping]) -> EngineResult<BulkValidationReport> {
        self.repos.with_conn(|conn| Self::validate_bulk_on(conn, items))
    }

    /// 校验“更新”：旧记录先释放，再按新数量校验
    ///
    /// # 返回
    /// - Ok((旧记录, 快照))
    /// - Err(NotFound(mapping)): 旧记录不存在
    pub fn validate_replacement(
        &self,
        old_supply_id: i64,
        old_export_id: i64,
        replacement: &NewMapping,
    ) -> EngineResult<(SupplyExportMapping, ValidationResult)> {
        self.repos.with_conn(|conn| {
            Self::validate_replacement_on(conn, old_supply_id, old_export_id, replacement)
        })
    }

    // ==========================================
    // 连接级实现（可在事务内调用）
    // ==========================================

    pub fn validate_on(
        conn: &Connection,
        supply_id: i64,
        export_id: i64,
        quantity_bags: i64,
        reservations: &BatchReservations,
    ) -> EngineResult<ValidationResult> {
        if quantity_bags <= 0 {
            return Err(AllocationError::InvalidQuantity {
                supply_id,
                export_id,
                requested: quantity_bags,
            });
        }

        let supply = SupplyRepository::find_by_id_on(conn, supply_id)?
            .ok_or_else(|| AllocationError::supply_not_found(supply_id))?;
        let export = ExportRepository::find_by_id_on(conn, export_id)?
            .ok_or_else(|| AllocationError::export_not_found(export_id))?;

        let used = QuantityLedger::used_quantity_on(conn, supply_id)? + reservations.supply_reserved(supply_id);
        let available = supply.quantity_bags - used;
        if quantity_bags > available {
            return Err(AllocationError::CapacityExceeded {
                side: CapacitySide::Supply,
                id: supply_id,
                requested: quantity_bags,
                available,
                total: supply.quantity_bags,
            });
        }

        let sourced =
            QuantityLedger::sourced_quantity_on(conn, export_id)? + reservations.export_reserved(export_id);
        let needed = export.quantity_bags - sourced;
        if quantity_bags > needed {
            return Err(AllocationError::CapacityExceeded {
                side: CapacitySide::Export,
                id: export_id,
                requested: quantity_bags,
                available: needed,
                total: export.quantity_bags,
            });
        }

        let existing = match MappingRepository::find_on(conn, supply_id, export_id)? {
            Some(m) => Some(m.quantity_bags),
            None => reservations.pair_reserved(supply_id, export_id),
        };
        if let Some(existing_quantity) = existing {
            return Err(AllocationError::DuplicateMapping {
                supply_id,
                export_id,
                existing_quantity,
            });
        }

        Ok(ValidationResult {
            supply: SupplyCapacitySnapshot {
                supply_id,
                total_quantity: supply.quantity_bags,
                used_quantity: used,
                available_quantity: available,
            },
            export: ExportCapacitySnapshot {
                export_id,
                total_quantity: export.quantity_bags,
                sourced_quantity: sourced,
                needed_quantity: needed,
            },
            requested_quantity: quantity_bags,
            can_allocate: true,
        })
    }

    pub fn validate_bulk_on(conn: &Connection, items: &[NewMapping]) -> EngineResult<BulkValidationReport> {
        let mut reservations = BatchReservations::default();
        let mut results = Vec::with_capacity(items.len());
        let mut errors = Vec::new();

        for (index, item) in items.iter().enumerate() {
            match Self::validate_on(conn, item.supply_id, item.export_id, item.quantity_bags, &reservations) {
                Ok(validation) => {
                    reservations.reserve(item.supply_id, item.export_id, item.quantity_bags);
                    results.push(BulkValidationItem {
                        index,
                        supply_id: item.supply_id,
                        export_id: item.export_id,
                        quantity_bags: item.quantity_bags,
                        valid: true,
                        validation: Some(validation),
                        error: None,
                    });
                }
                Err(err) if err.is_validation_failure() => {
                    let message = err.to_string();
                    errors.push(BulkItemError {
                        index,
                        supply_id: item.supply_id,
                        export_id: item.export_id,
                        message: message.clone(),
                    });
                    results.push(BulkValidationItem {
                        index,
                        supply_id: item.supply_id,
                        export_id: item.export_id,
                        quantity_bags: item.quantity_bags,
                        valid: false,
                        validation: None,
                        error: Some(message),
                    });
                }
                Err(err) => return Err(err),
            }
        }

        let invalid = errors.len();
        Ok(BulkValidationReport {
            summary: BulkValidationSummary {
                total: items.len(),
                valid: items.len() - invalid,
                invalid,
            },
            results,
            errors,
        })
    }

    pub fn validate_replacement_on(
        conn: &Connection,
        old_supply_id: i64,
        old_export_id: i64,
        replacement: &NewMapping,
    ) -> EngineResult<(SupplyExportMapping, ValidationResult)> {
        let old = MappingRepository::find_on(conn, old_supply_id, old_export_id)?
            .ok_or_else(|| AllocationError::mapping_not_found(old_supply_id, old_export_id))?;

        let (supply_id, export_id, quantity_bags) =
            (replacement.supply_id, replacement.export_id, replacement.quantity_bags);
        if quantity_bags <= 0 {
            return Err(AllocationError::InvalidQuantity {
                supply_id,
                export_id,
                requested: quantity_bags,
            });
        }

        let supply = SupplyRepository::find_by_id_on(conn, supply_id)?
            .ok_or_else(|| AllocationError::supply_not_found(supply_id))?;
        let export = ExportRepository::find_by_id_on(conn, export_id)?
            .ok_or_else(|| AllocationError::export_not_found(export_id))?;

        // 旧记录的数量在同一事务内会被删除，先释放
        let released_supply = if supply_id == old.supply_id { old.quantity_bags } else { 0 };
        let released_export = if export_id == old.export_id { old.quantity_bags } else { 0 };

        let used = QuantityLedger::used_quantity_on(conn, supply_id)? - released_supply;
        let available = supply.quantity_bags - used;
        if quantity_bags > available {
            return Err(AllocationError::CapacityExceeded {
                side: CapacitySide::Supply,
                id: supply_id,
                requested: quantity_bags,
                available,
                total: supply.quantity_bags,
            });
        }

        let sourced = QuantityLedger::sourced_quantity_on(conn, export_id)? - released_export;
        let needed = export.quantity_bags - sourced;
        if quantity_bags > needed {
            return Err(AllocationError::CapacityExceeded {
                side: CapacitySide::Export,
                id: export_id,
                requested: quantity_bags,
                available: needed,
                total: export.quantity_bags,
            });
        }

        let same_pair = supply_id == old.supply_id && export_id == old.export_id;
        if !same_pair {
            if let Some(existing) = MappingRepository::find_on(conn, supply_id, export_id)? {
                return Err(AllocationError::DuplicateMapping {
                    supply_id,
                    export_id,
                    existing_quantity: existing.quantity_bags,
                });
            }
        }

        let validation = ValidationResult {
            supply: SupplyCapacitySnapshot {
                supply_id,
                total_quantity: supply.quantity_bags,
                used_quantity: used,
                available_quantity: available,
            },
            export: ExportCapacitySnapshot {
                export_id,
                total_quantity: export.quantity_bags,
                sourced_quantity: sourced,
                needed_quantity: needed,
            },
            requested_quantity: quantity_bags,
            can_allocate: true,
        };
        Ok((old, validation))
    }
}
