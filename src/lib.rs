// ==========================================
// 煤炭出口业务系统 - 核心库
// ==========================================
// 范围: 供货批次 → 出口批次的分配子系统
// 技术栈: Rust + SQLite
// 系统定位: 分配建议 + 人工/自动落库，容量红线由校验器把关
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 状态组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{ExportSourcingState, ExportStatus, SupplyAllocationState};

// 领域实体
pub use domain::{Export, MappingDetail, NewExport, NewMapping, NewSupply, Role, Supplier, Supply, SupplyExportMapping};

// 引擎
pub use engine::{
    AllocationEngine, AllocationError, AllocationStrategy, BulkAllocationOrchestrator, MappingCommands,
    MappingValidator, MinQuality, QuantityLedger, StatusReporter,
};

// API
pub use api::{AllocationApi, ApiError, ApiResult};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "煤炭出口业务系统";
