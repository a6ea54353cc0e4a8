// ==========================================
// 煤炭出口业务系统 - 分配记录仓储 (supply_export)
// ==========================================
// 红线: Repository 不含业务逻辑，容量校验在 MappingValidator
// 说明: 每个操作都有 *_on(&Connection) 版本，供调用方在自己持有的
//       事务内使用（事务闭包内不得再调用加锁的实例方法）
// ==========================================

use crate::domain::export::format_destination;
use crate::domain::mapping::{MappingDetail, NewMapping, SupplyExportMapping};
use crate::domain::supply::format_quality_summary;
use crate::domain::types::ExportStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sql_utils::{date_col, datetime_col, enum_col, format_datetime};
use chrono::{NaiveDateTime, Timelike};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const MAPPING_COLUMNS: &str =
    "m.supply_id, m.export_id, m.quantity_bags, m.priority, m.notes, m.allocated_at";

const DETAIL_SELECT: &str = r#"
    SELECT m.supply_id, m.export_id, m.quantity_bags, m.priority, m.notes, m.allocated_at,
           sp.name, s.supply_date, s.quantity_bags, s.grade_a, s.grade_b, s.rejected,
           e.destination_city, e.destination_country, e.status, e.quantity_bags
    FROM supply_export m
    JOIN supply s ON s.supply_id = m.supply_id
    JOIN supplier sp ON sp.supplier_id = s.supplier_id
    JOIN export_shipment e ON e.export_id = m.export_id
"#;

/// 分配数量汇总条件；两者皆空时汇总全表
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MappingSumFilter {
    pub supply_id: Option<i64>,
    pub export_id: Option<i64>,
}

impl MappingSumFilter {
    pub fn supply(supply_id: i64) -> Self {
        Self {
            supply_id: Some(supply_id),
            export_id: None,
        }
    }

    pub fn export(export_id: i64) -> Self {
        Self {
            supply_id: None,
            export_id: Some(export_id),
        }
    }
}

pub struct MappingRepository {
    conn: Arc<Mutex<Connection>>,
}

impl MappingRepository {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 查询
    // ==========================================

    pub fn find(&self, supply_id: i64, export_id: i64) -> RepositoryResult<Option<SupplyExportMapping>> {
        let conn = self.get_conn()?;
        Self::find_on(&conn, supply_id, export_id)
    }

    pub fn find_on(
        conn: &Connection,
        supply_id: i64,
        export_id: i64,
    ) -> RepositoryResult<Option<SupplyExportMapping>> {
        let sql = format!(
            "SELECT {} FROM supply_export m WHERE m.supply_id = ?1 AND m.export_id = ?2",
            MAPPING_COLUMNS
        );
        let mapping = conn
            .query_row(&sql, params![supply_id, export_id], map_mapping)
            .optional()?;
        Ok(mapping)
    }

    pub fn sum_quantity(&self, filter: MappingSumFilter) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        Self::sum_quantity_on(&conn, filter)
    }

    /// 单条聚合查询，无记录时为 0
    pub fn sum_quantity_on(conn: &Connection, filter: MappingSumFilter) -> RepositoryResult<i64> {
        let mut sql = String::from("SELECT COALESCE(SUM(quantity_bags), 0) FROM supply_export WHERE 1=1");
        let mut params: Vec<Value> = Vec::new();
        if let Some(supply_id) = filter.supply_id {
            sql.push_str(" AND supply_id = ?");
            params.push(Value::Integer(supply_id));
        }
        if let Some(export_id) = filter.export_id {
            sql.push_str(" AND export_id = ?");
            params.push(Value::Integer(export_id));
        }
        let total: i64 = conn.query_row(&sql, params_from_iter(params.iter()), |row| row.get(0))?;
        Ok(total)
    }

    pub fn count_on(conn: &Connection) -> RepositoryResult<i64> {
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM supply_export", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn details_for_supply(&self, supply_id: i64) -> RepositoryResult<Vec<MappingDetail>> {
        let conn = self.get_conn()?;
        Self::details_for_supply_on(&conn, supply_id)
    }

    /// 某批供货的全部去向，按分配时间排序
    pub fn details_for_supply_on(conn: &Connection, supply_id: i64) -> RepositoryResult<Vec<MappingDetail>> {
        let sql = format!(
            "{} WHERE m.supply_id = ?1 ORDER BY m.allocated_at ASC, m.export_id ASC",
            DETAIL_SELECT
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![supply_id], map_detail)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn details_for_export(&self, export_id: i64) -> RepositoryResult<Vec<MappingDetail>> {
        let conn = self.get_conn()?;
        Self::details_for_export_on(&conn, export_id)
    }

    /// 某出口批次的全部来源，按分配时间排序
    pub fn details_for_export_on(conn: &Connection, export_id: i64) -> RepositoryResult<Vec<MappingDetail>> {
        let sql = format!(
            "{} WHERE m.export_id = ?1 ORDER BY m.allocated_at ASC, m.supply_id ASC",
            DETAIL_SELECT
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![export_id], map_detail)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn detail_on(
        conn: &Connection,
        supply_id: i64,
        export_id: i64,
    ) -> RepositoryResult<Option<MappingDetail>> {
        let sql = format!("{} WHERE m.supply_id = ?1 AND m.export_id = ?2", DETAIL_SELECT);
        let detail = conn
            .query_row(&sql, params![supply_id, export_id], map_detail)
            .optional()?;
        Ok(detail)
    }

    // ==========================================
    // 写入
    // ==========================================

    pub fn insert(
        &self,
        mapping: &NewMapping,
        allocated_at: NaiveDateTime,
    ) -> RepositoryResult<SupplyExportMapping> {
        let conn = self.get_conn()?;
        Self::insert_on(&conn, mapping, allocated_at)
    }

    /// 写入一条分配记录
    ///
    /// 不做容量校验；重复键由主键约束拒绝（UniqueConstraintViolation）。
    pub fn insert_on(
        conn: &Connection,
        mapping: &NewMapping,
        allocated_at: NaiveDateTime,
    ) -> RepositoryResult<SupplyExportMapping> {
        let allocated_at_str = format_datetime(allocated_at);
        conn.execute(
            r#"
            INSERT INTO supply_export (
                supply_id, export_id, quantity_bags, priority, notes, allocated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                mapping.supply_id,
                mapping.export_id,
                mapping.quantity_bags,
                mapping.priority,
                mapping.notes,
                allocated_at_str,
            ],
        )?;
        Ok(SupplyExportMapping {
            supply_id: mapping.supply_id,
            export_id: mapping.export_id,
            quantity_bags: mapping.quantity_bags,
            priority: mapping.priority,
            notes: mapping.notes.clone(),
            // 与落库精度一致（秒）
            allocated_at: allocated_at.with_nanosecond(0).unwrap_or(allocated_at),
        })
    }

    pub fn delete(&self, supply_id: i64, export_id: i64) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        Self::delete_on(&conn, supply_id, export_id)
    }

    /// 返回删除行数（0 或 1）
    pub fn delete_on(conn: &Connection, supply_id: i64, export_id: i64) -> RepositoryResult<usize> {
        let affected = conn.execute(
            "DELETE FROM supply_export WHERE supply_id = ?1 AND export_id = ?2",
            params![supply_id, export_id],
        )?;
        Ok(affected)
    }
}

fn map_mapping(row: &Row<'_>) -> rusqlite::Result<SupplyExportMapping> {
    Ok(SupplyExportMapping {
        supply_id: row.get(0)?,
        export_id: row.get(1)?,
        quantity_bags: row.get(2)?,
        priority: row.get(3)?,
        notes: row.get(4)?,
        allocated_at: datetime_col(row, 5)?,
    })
}

fn map_detail(row: &Row<'_>) -> rusqlite::Result<MappingDetail> {
    let mapping = map_mapping(row)?;
    let grade_a: i64 = row.get(9)?;
    let grade_b: i64 = row.get(10)?;
    let rejected: i64 = row.get(11)?;
    let city: String = row.get(12)?;
    let country: String = row.get(13)?;
    let export_status: ExportStatus = enum_col(row, 14)?;
    Ok(MappingDetail {
        mapping,
        supplier_name: row.get(6)?,
        supply_date: date_col(row, 7)?,
        supply_quantity_bags: row.get(8)?,
        quality_summary: format_quality_summary(grade_a, grade_b, rejected),
        destination: format_destination(&city, &country),
        export_status,
        export_quantity_bags: row.get(15)?,
    })
}
