// ==========================================
// 煤炭出口业务系统 - API 层
// ==========================================
// 职责: 提供业务 API 接口,供 CLI / 宿主应用调用
// ==========================================

pub mod allocation_api;
pub mod error;

// 重导出核心类型
pub use allocation_api::{AllocationApi, BulkAllocateRequest};
pub use error::{ApiError, ApiResult};
