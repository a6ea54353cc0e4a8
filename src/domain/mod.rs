// ==========================================
// 煤炭出口业务系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、角色可见性规则
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod export;
pub mod mapping;
pub mod role;
pub mod supply;
pub mod types;

// 重导出核心类型
pub use export::{Export, NewExport};
pub use mapping::{MappingDetail, NewMapping, SupplyExportMapping};
pub use role::{project_for_role, Role, SensitiveFields};
pub use supply::{NewSupply, Supplier, Supply};
pub use types::{ExportSourcingState, ExportStatus, SupplyAllocationState};
