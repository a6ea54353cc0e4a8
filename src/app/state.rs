// ==========================================
// 煤炭出口业务系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享连接、配置和API实例
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::AllocationApi;
use crate::config::{AllocationConfig, ConfigManager};
use crate::db::{ensure_schema, open_sqlite_connection, read_schema_version};
use crate::engine::AllocationRepositories;

/// 应用状态
///
/// 所有仓储共享同一个连接句柄（Arc<Mutex<Connection>>）
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 启动时加载的分配参数
    pub allocation_config: AllocationConfig,

    /// 配置管理器（与仓储共享连接）
    pub config_manager: Arc<ConfigManager>,

    /// 分配API
    pub allocation_api: Arc<AllocationApi>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    ///
    /// # 返回
    /// - Ok(AppState): 应用状态实例
    /// - Err(String): 初始化错误
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开数据库并幂等建表
    /// 2. 从 config_kv 读取分配参数
    /// 3. 创建 API 实例
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = open_sqlite_connection(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        ensure_schema(&conn).map_err(|e| format!("数据库建表失败: {}", e))?;
        match read_schema_version(&conn) {
            Ok(version) => tracing::debug!(?version, "schema_version"),
            Err(e) => tracing::warn!("读取 schema_version 失败(将继续启动): {}", e),
        }
        let conn = Arc::new(Mutex::new(conn));

        let config_manager = Arc::new(ConfigManager::from_connection(conn.clone()));
        let allocation_config = config_manager
            .load_allocation_config()
            .map_err(|e| format!("无法加载分配配置: {}", e))?;

        let repos = AllocationRepositories::from_connection(conn);
        let allocation_api = Arc::new(AllocationApi::new(repos, allocation_config.clone()));

        tracing::info!(
            default_strategy = %allocation_config.default_strategy,
            "AppState初始化完成"
        );

        Ok(Self {
            db_path,
            allocation_config,
            config_manager,
            allocation_api,
        })
    }

    /// 获取数据库路径
    pub fn get_db_path(&self) -> &str {
        &self.db_path
    }
}

/// 获取默认数据库路径
///
/// 优先级: 环境变量 COAL_EXPORT_DB_PATH > 用户数据目录 > 当前目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("COAL_EXPORT_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./coal_export.db");

    if let Some(data_dir) = dirs::data_dir() {
        // 开发环境使用独立目录，避免污染生产数据
        #[cfg(debug_assertions)]
        let dir = data_dir.join("coal-export-allocation-dev");

        #[cfg(not(debug_assertions))]
        let dir = data_dir.join("coal-export-allocation");

        // 目录创建失败时退回当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("coal_export.db");
        }
    }

    path.to_string_lossy().to_string()
}
