// ==========================================
// 煤炭出口业务系统 - 供应商仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 说明: 供应商维护流程在本子系统之外，这里只提供录入与查询
// ==========================================

use crate::domain::supply::Supplier;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

pub struct SupplierRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SupplierRepository {
    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 新增供应商，返回 supplier_id
    pub fn insert(&self, name: &str) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let name = name.trim();
        if name.is_empty() {
            return Err(RepositoryError::FieldValueError {
                field: "name".to_string(),
                message: "供应商名称不能为空".to_string(),
            });
        }
        conn.execute("INSERT INTO supplier (name) VALUES (?1)", params![name])?;
        Ok(conn.last_insert_rowid())
    }

    pub fn list_all(&self) -> RepositoryResult<Vec<Supplier>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT supplier_id, name FROM supplier ORDER BY supplier_id")?;
        let rows = stmt.query_map([], |row| {
            Ok(Supplier {
                supplier_id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}
