// ==========================================
// 煤炭出口业务系统 - 引擎层仓储聚合
// ==========================================
// 职责: 聚合分配引擎所需的所有 Repository，并提供事务作用域
// 红线: 事务闭包内只能使用 *_on(&Connection) 形式的仓储函数，
//       不得再调用加锁的实例方法（同一把 Mutex，会死锁）
// ==========================================

use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{Connection, TransactionBehavior};

use crate::engine::error::{AllocationError, EngineResult};
use crate::repository::{
    ExportRepository, MappingRepository, RepositoryError, SupplierRepository, SupplyRepository,
};

/// 分配引擎仓储集合
///
/// 所有仓储共享同一个注入的连接句柄；不存在模块级全局连接，
/// 测试可直接注入内存库或临时文件库。
#[derive(Clone)]
pub struct AllocationRepositories {
    conn: Arc<Mutex<Connection>>,
    pub supplier_repo: Arc<SupplierRepository>,
    pub supply_repo: Arc<SupplyRepository>,
    pub export_repo: Arc<ExportRepository>,
    pub mapping_repo: Arc<MappingRepository>,
}

impl AllocationRepositories {
    /// 基于共享连接构建全部仓储
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            supplier_repo: Arc::new(SupplierRepository::from_connection(conn.clone())),
            supply_repo: Arc::new(SupplyRepository::from_connection(conn.clone())),
            export_repo: Arc::new(ExportRepository::from_connection(conn.clone())),
            mapping_repo: Arc::new(MappingRepository::from_connection(conn.clone())),
            conn,
        }
    }

    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        self.conn.clone()
    }

    fn lock(&self) -> EngineResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| AllocationError::Repository(RepositoryError::LockError(e.to_string())))
    }

    /// 在持锁的连接上执行一组只读查询（同一连接，读到一致的数据）
    pub fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> EngineResult<T>) -> EngineResult<T> {
        let conn = self.lock()?;
        f(&conn)
    }

    /// 在 BEGIN IMMEDIATE 事务中执行
    ///
    /// IMMEDIATE 在首条读之前就拿到写锁：其他连接的写事务需等待，
    /// 校验读到的已分配量在提交前不会被并发修改。
    /// 闭包返回 Err 时整体回滚。
    pub fn in_immediate_transaction<T>(
        &self,
        f: impl FnOnce(&Connection) -> EngineResult<T>,
    ) -> EngineResult<T> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(RepositoryError::from)?;

        match f(&tx) {
            Ok(value) => {
                tx.commit().map_err(RepositoryError::from)?;
                Ok(value)
            }
            Err(err) => {
                // 回滚失败时保留原始错误
                if let Err(rollback_err) = tx.rollback() {
                    tracing::warn!(error = %rollback_err, "事务回滚失败");
                }
                Err(err)
            }
        }
    }
}
