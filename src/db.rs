// ==========================================
// 煤炭出口业务系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键 + busy_timeout）
// - 提供幂等建表，保证分配子系统所需表结构存在
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置（并发写入时 IMMEDIATE 事务会等待写锁）
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 打开内存库（测试/演示用），同样应用统一配置并建表
pub fn open_in_memory() -> rusqlite::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure_sqlite_connection(&conn)?;
    ensure_schema(&conn)?;
    Ok(conn)
}

/// 幂等建表
///
/// supply_export 以 (supply_id, export_id) 为主键：同一对供货/出口最多一条分配记录。
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS supplier (
            supplier_id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS supply (
            supply_id INTEGER PRIMARY KEY AUTOINCREMENT,
            supplier_id INTEGER NOT NULL REFERENCES supplier(supplier_id),
            supply_date TEXT NOT NULL,
            quantity_bags INTEGER NOT NULL CHECK (quantity_bags >= 0),
            grade_a INTEGER NOT NULL DEFAULT 0 CHECK (grade_a >= 0),
            grade_b INTEGER NOT NULL DEFAULT 0 CHECK (grade_b >= 0),
            rejected INTEGER NOT NULL DEFAULT 0 CHECK (rejected >= 0),
            dust INTEGER NOT NULL DEFAULT 0 CHECK (dust >= 0),
            wood INTEGER NOT NULL DEFAULT 0 CHECK (wood >= 0),
            price_per_bag REAL,
            notes TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS export_shipment (
            export_id INTEGER PRIMARY KEY AUTOINCREMENT,
            destination_country TEXT NOT NULL,
            destination_city TEXT NOT NULL,
            quantity_bags INTEGER NOT NULL CHECK (quantity_bags >= 0),
            status TEXT NOT NULL DEFAULT 'PENDING',
            export_date TEXT,
            price_per_bag REAL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS supply_export (
            supply_id INTEGER NOT NULL REFERENCES supply(supply_id) ON DELETE CASCADE,
            export_id INTEGER NOT NULL REFERENCES export_shipment(export_id) ON DELETE CASCADE,
            quantity_bags INTEGER NOT NULL CHECK (quantity_bags > 0),
            priority INTEGER,
            notes TEXT,
            allocated_at TEXT NOT NULL,
            PRIMARY KEY (supply_id, export_id)
        );

        CREATE INDEX IF NOT EXISTS idx_supply_export_export ON supply_export(export_id);
        CREATE INDEX IF NOT EXISTS idx_supply_supplier ON supply(supplier_id);
        CREATE INDEX IF NOT EXISTS idx_supply_date ON supply(supply_date);
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}
