// ==========================================
// 煤炭出口业务系统 - 数量台账
// ==========================================
// 红线: “已分配多少”只有这里能回答
// - 单条聚合查询，不在内存里扫描
// - 其他组件一律经由本模块取数，禁止各自求和
// - 不缓存：每次都读实时数据
// ==========================================

use crate::engine::error::EngineResult;
use crate::engine::repositories::AllocationRepositories;
use crate::repository::{MappingRepository, MappingSumFilter};
use rusqlite::Connection;

pub struct QuantityLedger {
    repos: AllocationRepositories,
}

impl QuantityLedger {
    pub fn new(repos: AllocationRepositories) -> Self {
        Self { repos }
    }

    /// 某批供货已分配的袋数（无分配为 0）
    pub fn used_quantity(&self, supply_id: i64) -> EngineResult<i64> {
        self.repos.with_conn(|conn| Self::used_quantity_on(conn, supply_id))
    }

    /// 某出口批次已备货的袋数（无分配为 0）
    pub fn sourced_quantity(&self, export_id: i64) -> EngineResult<i64> {
        self.repos.with_conn(|conn| Self::sourced_quantity_on(conn, export_id))
    }

    /// 在调用方持有的连接/事务上汇总
    pub fn used_quantity_on(conn: &Connection, supply_id: i64) -> EngineResult<i64> {
        Ok(MappingRepository::sum_quantity_on(conn, MappingSumFilter::supply(supply_id))?)
    }

    pub fn sourced_quantity_on(conn: &Connection, export_id: i64) -> EngineResult<i64> {
        Ok(MappingRepository::sum_quantity_on(conn, MappingSumFilter::export(export_id))?)
    }

    /// 汇总列表查询带回的原始分配数量（批量场景，避免逐条再查）
    pub fn sum_mapping_quantities(quantities: &[i64]) -> i64 {
        quantities.iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_used_and_sourced() {
        let conn = open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            INSERT INTO supplier (name) VALUES ('S');
            INSERT INTO supply (supplier_id, supply_date, quantity_bags) VALUES (1, '2025-01-01', 500);
            INSERT INTO supply (supplier_id, supply_date, quantity_bags) VALUES (1, '2025-01-02', 500);
            INSERT INTO export_shipment (destination_country, destination_city, quantity_bags) VALUES ('China', 'Qingdao', 800);
            INSERT INTO supply_export (supply_id, export_id, quantity_bags, allocated_at) VALUES (1, 1, 300, '2025-01-03 00:00:00');
            INSERT INTO supply_export (supply_id, export_id, quantity_bags, allocated_at) VALUES (2, 1, 200, '2025-01-03 00:00:00');
            "#,
        )
        .unwrap();
        let ledger = QuantityLedger::new(AllocationRepositories::from_connection(Arc::new(Mutex::new(conn))));

        assert_eq!(ledger.used_quantity(1).unwrap(), 300);
        assert_eq!(ledger.used_quantity(99).unwrap(), 0);
        assert_eq!(ledger.sourced_quantity(1).unwrap(), 500);
        assert_eq!(ledger.sourced_quantity(2).unwrap(), 0);
    }

    #[test]
    fn test_sum_mapping_quantities() {
        assert_eq!(QuantityLedger::sum_mapping_quantities(&[]), 0);
        assert_eq!(QuantityLedger::sum_mapping_quantities(&[30, 20, 5]), 55);
    }
}
