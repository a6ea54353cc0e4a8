// ==========================================
// 煤炭出口业务系统 - 应用层
// ==========================================
// 职责: 组装共享连接、配置与 API，供 CLI / 宿主应用使用
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState};
