// ==========================================
// 煤炭出口业务系统 - 数据仓储层
// ==========================================
// 职责: 供应商、供货、出口批次、分配记录的数据访问
// 红线: 不含业务逻辑；容量与重复校验由引擎层完成
// ==========================================

pub mod error;
pub mod export_repo;
pub mod mapping_repo;
pub mod sql_utils;
pub mod supplier_repo;
pub mod supply_repo;

pub use error::{RepositoryError, RepositoryResult};
pub use export_repo::ExportRepository;
pub use mapping_repo::{MappingRepository, MappingSumFilter};
pub use supplier_repo::SupplierRepository;
pub use supply_repo::{SupplyFilter, SupplyOrder, SupplyRepository, SupplyWithMappings};
