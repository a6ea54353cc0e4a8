// ==========================================
// 煤炭出口业务系统 - 引擎层
// ==========================================
// 职责: 分配校验、状态统计、建议与自动分配、批量分配
// 红线: Engine 不拼 SQL，数量一律从分配记录实时汇总，不做缓存
// ==========================================

pub mod allocation;
pub mod bulk;
pub mod error;
pub mod ledger;
pub mod mapping_ops;
pub mod repositories;
pub mod scoring;
pub mod status;
pub mod strategy;
pub mod validator;

#[cfg(test)]
pub(crate) mod test_support;

// 重导出核心引擎
pub use allocation::{
    AllocationEngine, AllocationResult, AllocationSuggestion, AllocationSummary, AutoAllocateRequest,
    AutoAllocationEntry, AutoAllocationError, SuggestionRequest, SuggestionSet,
};
pub use bulk::{BulkAllocationOrchestrator, BulkResult};
pub use error::{AllocationError, CapacitySide, EngineResult, EntityKind};
pub use ledger::QuantityLedger;
pub use mapping_ops::MappingCommands;
pub use repositories::AllocationRepositories;
pub use status::{ExportSourcingStatus, StatusReporter, SupplyStatus};
pub use strategy::{AllocationStrategy, MinQuality};
pub use validator::{BulkItemError, BulkValidationReport, MappingValidator, ValidationResult};
