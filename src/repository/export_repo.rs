// ==========================================
// 煤炭出口业务系统 - 出口批次仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 说明: status 由出运跟踪流程维护，分配引擎只读
// ==========================================

use crate::domain::export::{Export, NewExport};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sql_utils::{enum_col, format_date, opt_date_col};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const EXPORT_COLUMNS: &str = "export_id, destination_country, destination_city, quantity_bags, \
     status, export_date, price_per_bag";

pub struct ExportRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ExportRepository {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 录入出口批次，返回 export_id
    pub fn insert(&self, export: &NewExport) -> RepositoryResult<i64> {
        if export.quantity_bags < 0 {
            return Err(RepositoryError::FieldValueError {
                field: "quantity_bags".to_string(),
                message: format!("需求袋数不能为负: {}", export.quantity_bags),
            });
        }
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO export_shipment (
                destination_country, destination_city, quantity_bags,
                status, export_date, price_per_bag
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                export.destination_country,
                export.destination_city,
                export.quantity_bags,
                export.status.to_string(),
                export.export_date.map(format_date),
                export.price_per_bag,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn find_by_id(&self, export_id: i64) -> RepositoryResult<Option<Export>> {
        let conn = self.get_conn()?;
        Self::find_by_id_on(&conn, export_id)
    }

    pub fn find_by_id_on(conn: &Connection, export_id: i64) -> RepositoryResult<Option<Export>> {
        let sql = format!(
            "SELECT {} FROM export_shipment WHERE export_id = ?1",
            EXPORT_COLUMNS
        );
        let export = conn
            .query_row(&sql, params![export_id], map_export)
            .optional()?;
        Ok(export)
    }
}

fn map_export(row: &Row<'_>) -> rusqlite::Result<Export> {
    Ok(Export {
        export_id: row.get(0)?,
        destination_country: row.get(1)?,
        destination_city: row.get(2)?,
        quantity_bags: row.get(3)?,
        status: enum_col(row, 4)?,
        export_date: opt_date_col(row, 5)?,
        price_per_bag: row.get(6)?,
    })
}
