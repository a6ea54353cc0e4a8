// ==========================================
// 煤炭出口业务系统 - 分配状态查询
// ==========================================
// 职责: 供货批次利用率 / 出口批次履约率，供轮询小部件使用
// 约定: 实体不存在返回 Ok(None)，不是错误
// 零数量口径: 百分比为 0，状态为 FULLY_*（可用/待备量为 0）
// ==========================================

use crate::domain::types::{ExportSourcingState, ExportStatus, SupplyAllocationState};
use crate::engine::error::EngineResult;
use crate::engine::ledger::QuantityLedger;
use crate::engine::repositories::AllocationRepositories;
use crate::engine::scoring::percentage;
use crate::repository::{ExportRepository, MappingRepository, SupplyRepository};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// 供货批次状态
// ==========================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplyAllocationEntry {
    pub export_id: i64,
    pub destination: String,
    pub quantity_bags: i64,
    pub export_status: ExportStatus,
    pub allocated_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplyStatus {
    pub supply_id: i64,
    pub total_quantity: i64,
    pub allocated_quantity: i64,
    pub available_quantity: i64,
    pub utilization_percentage: f64,
    pub status: SupplyAllocationState,
    pub allocations: Vec<SupplyAllocationEntry>,
}

// ==========================================
// 出口批次备货状态
// ==========================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportSourceEntry {
    pub supply_id: i64,
    pub supplier_name: String,
    pub quantity_bags: i64,
    pub supply_date: NaiveDate,
    pub quality_summary: String,
    pub allocated_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportSourcingStatus {
    pub export_id: i64,
    pub total_quantity: i64,
    pub sourced_quantity: i64,
    pub needed_quantity: i64,
    pub fulfillment_percentage: f64,
    pub status: ExportSourcingState,
    pub sources: Vec<ExportSourceEntry>,
}

// ==========================================
// StatusReporter
// ==========================================
pub struct StatusReporter {
    repos: AllocationRepositories,
}

impl StatusReporter {
    pub fn new(repos: AllocationRepositories) -> Self {
        Self { repos }
    }

    /// 供货批次分配状态；批次不存在返回 None
    pub fn supply_status(&self, supply_id: i64) -> EngineResult<Option<SupplyStatus>> {
        self.repos.with_conn(|conn| {
            let supply = match SupplyRepository::find_by_id_on(conn, supply_id)? {
                Some(s) => s,
                None => return Ok(None),
            };

            let allocated = QuantityLedger::used_quantity_on(conn, supply_id)?;
            let available = supply.quantity_bags - allocated;

            let allocations = MappingRepository::details_for_supply_on(conn, supply_id)?
                .into_iter()
                .map(|d| SupplyAllocationEntry {
                    export_id: d.mapping.export_id,
                    destination: d.destination,
                    quantity_bags: d.mapping.quantity_bags,
                    export_status: d.export_status,
                    allocated_at: d.mapping.allocated_at,
                })
                .collect();

            Ok(Some(SupplyStatus {
                supply_id,
                total_quantity: supply.quantity_bags,
                allocated_quantity: allocated,
                available_quantity: available,
                utilization_percentage: percentage(allocated, supply.quantity_bags),
                status: SupplyAllocationState::classify(allocated, available),
                allocations,
            }))
        })
    }

    /// 出口批次备货状态；批次不存在返回 None
    pub fn export_status(&self, export_id: i64) -> EngineResult<Option<ExportSourcingStatus>> {
        self.repos.with_conn(|conn| {
            let export = match ExportRepository::find_by_id_on(conn, export_id)? {
                Some(e) => e,
                None => return Ok(None),
            };

            let sourced = QuantityLedger::sourced_quantity_on(conn, export_id)?;
            let needed = export.quantity_bags - sourced;

            let sources = MappingRepository::details_for_export_on(conn, export_id)?
                .into_iter()
                .map(|d| ExportSourceEntry {
                    supply_id: d.mapping.supply_id,
                    supplier_name: d.supplier_name,
                    quantity_bags: d.mapping.quantity_bags,
                    supply_date: d.supply_date,
                    quality_summary: d.quality_summary,
                    allocated_at: d.mapping.allocated_at,
                })
                .collect();

            Ok(Some(ExportSourcingStatus {
                export_id,
                total_quantity: export.quantity_bags,
                sourced_quantity: sourced,
                needed_quantity: needed,
                fulfillment_percentage: percentage(sourced, export.quantity_bags),
                status: ExportSourcingState::classify(sourced, needed),
                sources,
            }))
        })
    }
}
