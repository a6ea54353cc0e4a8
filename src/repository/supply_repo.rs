// ==========================================
// 煤炭出口业务系统 - 供货批次仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 说明: 已分配数量不在此汇总；列表只带回原始分配数量，
//       汇总统一走 QuantityLedger
// ==========================================

use crate::domain::supply::{NewSupply, Supply};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sql_utils::{date_col, format_date};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const SUPPLY_COLUMNS: &str = "s.supply_id, s.supplier_id, s.supply_date, s.quantity_bags, \
     s.grade_a, s.grade_b, s.rejected, s.dust, s.wood, s.price_per_bag, s.notes";

// ==========================================
// 列表查询参数
// ==========================================

/// 候选供货过滤条件
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SupplyFilter {
    /// 为空表示不限供应商
    pub supplier_ids: Vec<i64>,
    /// 仅保留 grade_a > 0 的批次
    pub require_grade_a: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SupplyOrder {
    #[default]
    SupplyDateAsc,
    SupplyDateDesc,
}

impl SupplyOrder {
    fn as_sql(&self) -> &'static str {
        match self {
            SupplyOrder::SupplyDateAsc => "s.supply_date ASC, s.supply_id ASC",
            SupplyOrder::SupplyDateDesc => "s.supply_date DESC, s.supply_id ASC",
        }
    }
}

/// 供货批次 + 供应商名称 + 该批次全部分配记录的原始数量
#[derive(Debug, Clone, PartialEq)]
pub struct SupplyWithMappings {
    pub supply: Supply,
    pub supplier_name: String,
    pub mapping_quantities: Vec<i64>,
}

// ==========================================
// SupplyRepository
// ==========================================
pub struct SupplyRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SupplyRepository {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 录入供货批次，返回 supply_id
    ///
    /// # 参数
    /// - `supply`: 录入参数（分级数量允许只填部分）
    ///
    /// # 返回
    /// - Ok(supply_id)
    /// - Err(FieldValueError): 数量或分级为负 / 分级超过总袋数
    pub fn insert(&self, supply: &NewSupply) -> RepositoryResult<i64> {
        validate_new_supply(supply)?;
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO supply (
                supplier_id, supply_date, quantity_bags,
                grade_a, grade_b, rejected, dust, wood,
                price_per_bag, notes
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                supply.supplier_id,
                format_date(supply.supply_date),
                supply.quantity_bags,
                supply.grade_a,
                supply.grade_b,
                supply.rejected,
                supply.dust,
                supply.wood,
                supply.price_per_bag,
                supply.notes,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn find_by_id(&self, supply_id: i64) -> RepositoryResult<Option<Supply>> {
        let conn = self.get_conn()?;
        Self::find_by_id_on(&conn, supply_id)
    }

    /// 在调用方持有的连接/事务上查询
    pub fn find_by_id_on(conn: &Connection, supply_id: i64) -> RepositoryResult<Option<Supply>> {
        let sql = format!("SELECT {} FROM supply s WHERE s.supply_id = ?1", SUPPLY_COLUMNS);
        let supply = conn
            .query_row(&sql, params![supply_id], |row| map_supply(row, 0))
            .optional()?;
        Ok(supply)
    }

    /// 候选供货列表
    ///
    /// 每个批次带回供应商名称与其全部分配记录的原始数量（无分配时为空列表）。
    pub fn list_with_mappings(
        &self,
        filter: &SupplyFilter,
        order: SupplyOrder,
    ) -> RepositoryResult<Vec<SupplyWithMappings>> {
        let conn = self.get_conn()?;
        Self::list_with_mappings_on(&conn, filter, order)
    }

    pub fn list_with_mappings_on(
        conn: &Connection,
        filter: &SupplyFilter,
        order: SupplyOrder,
    ) -> RepositoryResult<Vec<SupplyWithMappings>> {
        let mut sql = format!(
            "SELECT {}, sp.name, m.quantity_bags \
             FROM supply s \
             JOIN supplier sp ON sp.supplier_id = s.supplier_id \
             LEFT JOIN supply_export m ON m.supply_id = s.supply_id \
             WHERE 1=1",
            SUPPLY_COLUMNS
        );
        let mut params: Vec<Value> = Vec::new();

        if !filter.supplier_ids.is_empty() {
            let placeholders = vec!["?"; filter.supplier_ids.len()].join(", ");
            sql.push_str(&format!(" AND s.supplier_id IN ({})", placeholders));
            params.extend(filter.supplier_ids.iter().map(|id| Value::Integer(*id)));
        }
        if filter.require_grade_a {
            sql.push_str(" AND s.grade_a > 0");
        }
        sql.push_str(&format!(" ORDER BY {}, m.export_id ASC", order.as_sql()));

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
            Ok((
                map_supply(row, 0)?,
                row.get::<_, String>(11)?,
                row.get::<_, Option<i64>>(12)?,
            ))
        })?;

        // LEFT JOIN 展开的行按 supply_id 连续，折叠回每批一条
        let mut out: Vec<SupplyWithMappings> = Vec::new();
        for row in rows {
            let (supply, supplier_name, mapping_qty) = row?;
            match out.last_mut() {
                Some(last) if last.supply.supply_id == supply.supply_id => {
                    if let Some(q) = mapping_qty {
                        last.mapping_quantities.push(q);
                    }
                }
                _ => out.push(SupplyWithMappings {
                    supply,
                    supplier_name,
                    mapping_quantities: mapping_qty.into_iter().collect(),
                }),
            }
        }
        Ok(out)
    }
}

fn validate_new_supply(supply: &NewSupply) -> RepositoryResult<()> {
    if supply.quantity_bags < 0 {
        return Err(RepositoryError::FieldValueError {
            field: "quantity_bags".to_string(),
            message: format!("总袋数不能为负: {}", supply.quantity_bags),
        });
    }
    let grades = [
        ("grade_a", supply.grade_a),
        ("grade_b", supply.grade_b),
        ("rejected", supply.rejected),
        ("dust", supply.dust),
        ("wood", supply.wood),
    ];
    for (field, value) in grades {
        if value < 0 || value > supply.quantity_bags {
            return Err(RepositoryError::FieldValueError {
                field: field.to_string(),
                message: format!("分级数量 {} 超出范围 [0, {}]", value, supply.quantity_bags),
            });
        }
    }
    Ok(())
}

fn map_supply(row: &Row<'_>, base: usize) -> rusqlite::Result<Supply> {
    Ok(Supply {
        supply_id: row.get(base)?,
        supplier_id: row.get(base + 1)?,
        supply_date: date_col(row, base + 2)?,
        quantity_bags: row.get(base + 3)?,
        grade_a: row.get(base + 4)?,
        grade_b: row.get(base + 5)?,
        rejected: row.get(base + 6)?,
        dust: row.get(base + 7)?,
        wood: row.get(base + 8)?,
        price_per_bag: row.get(base + 9)?,
        notes: row.get(base + 10)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use chrono::NaiveDate;

    fn setup() -> (Arc<Mutex<Connection>>, SupplyRepository, i64, i64) {
        let conn = Arc::new(Mutex::new(open_in_memory().unwrap()));
        let (s1, s2) = {
            let c = conn.lock().unwrap();
            c.execute("INSERT INTO supplier (name) VALUES ('Alpha')", []).unwrap();
            let s1 = c.last_insert_rowid();
            c.execute("INSERT INTO supplier (name) VALUES ('Beta')", []).unwrap();
            (s1, c.last_insert_rowid())
        };
        (conn.clone(), SupplyRepository::from_connection(conn), s1, s2)
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    #[test]
    fn test_insert_and_find_roundtrip_fields() {
        let (_conn, repo, s1, _) = setup();
        let id = repo
            .insert(
                &NewSupply::new(s1, date(5), 500)
                    .with_grades(300, 150, 50)
                    .with_impurities(2, 1)
                    .with_price_per_bag(4.5),
            )
            .unwrap();
        let supply = repo.find_by_id(id).unwrap().unwrap();
        assert_eq!(supply.supply_date, date(5));
        assert_eq!((supply.grade_a, supply.grade_b, supply.rejected), (300, 150, 50));
        assert_eq!((supply.dust, supply.wood), (2, 1));
        assert_eq!(supply.price_per_bag, Some(4.5));
    }

    #[test]
    fn test_insert_rejects_grade_over_total() {
        let (_conn, repo, s1, _) = setup();
        let err = repo
            .insert(&NewSupply::new(s1, date(1), 10).with_grades(11, 0, 0))
            .unwrap_err();
        assert!(matches!(err, RepositoryError::FieldValueError { ref field, .. } if field == "grade_a"));
    }

    #[test]
    fn test_list_filters_and_collects_mapping_quantities() {
        let (conn, repo, s1, s2) = setup();
        let a = repo.insert(&NewSupply::new(s1, date(3), 100).with_grades(50, 0, 0)).unwrap();
        let b = repo.insert(&NewSupply::new(s2, date(1), 100)).unwrap();
        let c = repo.insert(&NewSupply::new(s1, date(2), 100).with_grades(0, 100, 0)).unwrap();
        {
            let c_ = conn.lock().unwrap();
            c_.execute(
                "INSERT INTO export_shipment (destination_country, destination_city, quantity_bags) VALUES ('China', 'Qingdao', 500)",
                [],
            )
            .unwrap();
            c_.execute(
                "INSERT INTO export_shipment (destination_country, destination_city, quantity_bags) VALUES ('India', 'Chennai', 500)",
                [],
            )
            .unwrap();
            c_.execute(
                "INSERT INTO supply_export (supply_id, export_id, quantity_bags, allocated_at) VALUES (?1, 1, 30, '2025-01-10 08:00:00')",
                [a],
            )
            .unwrap();
            c_.execute(
                "INSERT INTO supply_export (supply_id, export_id, quantity_bags, allocated_at) VALUES (?1, 2, 20, '2025-01-10 08:00:00')",
                [a],
            )
            .unwrap();
        }

        let all = repo.list_with_mappings(&SupplyFilter::default(), SupplyOrder::SupplyDateAsc).unwrap();
        let ids: Vec<i64> = all.iter().map(|s| s.supply.supply_id).collect();
        assert_eq!(ids, vec![b, c, a]);
        assert_eq!(all[2].mapping_quantities, vec![30, 20]);
        assert!(all[0].mapping_quantities.is_empty());
        assert_eq!(all[0].supplier_name, "Beta");

        let desc = repo.list_with_mappings(&SupplyFilter::default(), SupplyOrder::SupplyDateDesc).unwrap();
        assert_eq!(desc[0].supply.supply_id, a);

        let only_alpha = repo
            .list_with_mappings(
                &SupplyFilter { supplier_ids: vec![s1], require_grade_a: false },
                SupplyOrder::SupplyDateAsc,
            )
            .unwrap();
        assert_eq!(only_alpha.len(), 2);

        let grade_a = repo
            .list_with_mappings(
                &SupplyFilter { supplier_ids: vec![], require_grade_a: true },
                SupplyOrder::SupplyDateAsc,
            )
            .unwrap();
        assert_eq!(grade_a.len(), 1);
        assert_eq!(grade_a[0].supply.supply_id, a);
    }
}
