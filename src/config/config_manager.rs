// ==========================================
// 煤炭出口业务系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::allocation_config::AllocationConfig;
use crate::engine::strategy::AllocationStrategy;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::warn;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 从已有连接创建 ConfigManager
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 读取 global scope 的配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 获取所有 global 配置的快照（JSON格式）
    pub fn get_config_snapshot(&self) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let mut config_map: HashMap<String, String> = HashMap::new();
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        serde_json::to_string(&json!(config_map))
            .map_err(|e| RepositoryError::InternalError(format!("配置快照序列化失败: {}", e)))
    }

    // ===== 分配引擎配置 =====

    /// 读取分配引擎参数
    ///
    /// 缺失的键取默认值；无法解析或越界的值记录告警后取默认值。
    pub fn load_allocation_config(&self) -> RepositoryResult<AllocationConfig> {
        let defaults = AllocationConfig::default();

        let default_strategy = self.parse_or_default::<AllocationStrategy>(
            config_keys::DEFAULT_STRATEGY,
            defaults.default_strategy,
        )?;
        let default_max_suggestions = self.parse_checked(
            config_keys::DEFAULT_MAX_SUGGESTIONS,
            defaults.default_max_suggestions,
            |v: &usize| *v >= 1,
        )?;
        let max_suggestions_limit = self.parse_checked(
            config_keys::MAX_SUGGESTIONS_LIMIT,
            defaults.max_suggestions_limit,
            |v: &usize| *v >= 1,
        )?;
        let optimal_quality_gap = self.parse_checked(
            config_keys::OPTIMAL_QUALITY_GAP,
            defaults.optimal_quality_gap,
            |v: &f64| v.is_finite() && *v >= 0.0,
        )?;
        let high_quality_threshold = self.parse_checked(
            config_keys::HIGH_QUALITY_THRESHOLD,
            defaults.high_quality_threshold,
            |v: &f64| v.is_finite(),
        )?;
        let older_stock_days = self.parse_checked(
            config_keys::OLDER_STOCK_DAYS,
            defaults.older_stock_days,
            |v: &i64| *v >= 0,
        )?;
        let low_utilization_pct = self.parse_checked(
            config_keys::LOW_UTILIZATION_PCT,
            defaults.low_utilization_pct,
            |v: &f64| v.is_finite() && (0.0..=100.0).contains(v),
        )?;
        let low_utilization_bonus = self.parse_checked(
            config_keys::LOW_UTILIZATION_BONUS,
            defaults.low_utilization_bonus,
            |v: &f64| v.is_finite(),
        )?;
        let recency_window_days = self.parse_checked(
            config_keys::RECENCY_WINDOW_DAYS,
            defaults.recency_window_days,
            |v: &i64| *v >= 0,
        )?;
        let bulk_retry_backoff_ms = self.parse_checked(
            config_keys::BULK_RETRY_BACKOFF_MS,
            defaults.bulk_retry_backoff_ms,
            |v: &u64| *v <= 10_000,
        )?;

        Ok(AllocationConfig {
            default_strategy,
            default_max_suggestions,
            max_suggestions_limit,
            optimal_quality_gap,
            high_quality_threshold,
            older_stock_days,
            low_utilization_pct,
            low_utilization_bonus,
            recency_window_days,
            bulk_retry_backoff_ms,
        })
    }

    fn parse_or_default<T>(&self, key: &str, default: T) -> RepositoryResult<T>
    where
        T: FromStr + Display + Copy,
    {
        self.parse_checked(key, default, |_| true)
    }

    fn parse_checked<T>(&self, key: &str, default: T, valid: impl Fn(&T) -> bool) -> RepositoryResult<T>
    where
        T: FromStr + Display + Copy,
    {
        let raw = match self.get_global_config_value(key)? {
            Some(v) => v,
            None => return Ok(default),
        };
        match raw.trim().parse::<T>() {
            Ok(v) if valid(&v) => Ok(v),
            _ => {
                warn!(
                    config_key = key,
                    raw_value = %raw,
                    default = %default,
                    "配置值无效，使用默认值"
                );
                Ok(default)
            }
        }
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 策略与建议条数
    pub const DEFAULT_STRATEGY: &str = "allocation/default_strategy";
    pub const DEFAULT_MAX_SUGGESTIONS: &str = "allocation/default_max_suggestions";
    pub const MAX_SUGGESTIONS_LIMIT: &str = "allocation/max_suggestions_limit";

    // OPTIMAL 排序
    pub const OPTIMAL_QUALITY_GAP: &str = "allocation/optimal_quality_gap";

    // 推荐理由阈值
    pub const HIGH_QUALITY_THRESHOLD: &str = "allocation/high_quality_threshold";
    pub const OLDER_STOCK_DAYS: &str = "allocation/older_stock_days";
    pub const LOW_UTILIZATION_PCT: &str = "allocation/low_utilization_pct";

    // 优先分
    pub const LOW_UTILIZATION_BONUS: &str = "allocation/low_utilization_bonus";
    pub const RECENCY_WINDOW_DAYS: &str = "allocation/recency_window_days";

    // 批量分配重试
    pub const BULK_RETRY_BACKOFF_MS: &str = "allocation/bulk_retry_backoff_ms";
}
