// ==========================================
// 煤炭出口业务系统 - 配置层
// ==========================================
// 职责: 系统配置管理
// 存储: config_kv 表
// ==========================================

pub mod allocation_config;
pub mod config_manager;

pub use allocation_config::AllocationConfig;
pub use config_manager::{config_keys, ConfigManager};
