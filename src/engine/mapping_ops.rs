// ==========================================
// 煤炭出口业务系统 - 分配记录状态迁移
// ==========================================
// 状态机: 不存在 → (校验通过并写入) → 已提交
//         已提交 → (更新 = 同一事务内删除 + 重建) → 已提交(新数量)
//         已提交 → (删除) → 不存在
// 没有“预留/待定”状态
// 红线: 校验与写入在同一个 IMMEDIATE 事务内完成
// ==========================================

use crate::domain::mapping::{MappingDetail, NewMapping, SupplyExportMapping};
use crate::engine::error::{AllocationError, EngineResult};
use crate::engine::repositories::AllocationRepositories;
use crate::engine::validator::{BatchReservations, MappingValidator};
use crate::repository::MappingRepository;
use chrono::{NaiveDateTime, Timelike};
use rusqlite::Connection;
use tracing::{debug, info};

pub struct MappingCommands {
    repos: AllocationRepositories,
}

impl MappingCommands {
    pub fn new(repos: AllocationRepositories) -> Self {
        Self { repos }
    }

    /// 新建分配记录
    ///
    /// 校验（数量、存在性、两侧容量、重复）与写入在同一个
    /// BEGIN IMMEDIATE 事务内，并发请求不会同时通过校验后各自写入。
    pub fn create_mapping(&self, request: &NewMapping) -> EngineResult<SupplyExportMapping> {
        let now = current_timestamp();
        let mapping = self
            .repos
            .in_immediate_transaction(|conn| Self::create_on(conn, request, now))?;

        info!(
            supply_id = mapping.supply_id,
            export_id = mapping.export_id,
            quantity_bags = mapping.quantity_bags,
            "分配记录已创建"
        );
        Ok(mapping)
    }

    /// 在调用方事务内校验并写入（前序写入对本次校验可见）
    pub fn create_on(
        conn: &Connection,
        request: &NewMapping,
        allocated_at: NaiveDateTime,
    ) -> EngineResult<SupplyExportMapping> {
        MappingValidator::validate_on(
            conn,
            request.supply_id,
            request.export_id,
            request.quantity_bags,
            &BatchReservations::default(),
        )?;
        Ok(MappingRepository::insert_on(conn, request, allocated_at)?)
    }

    /// 更新分配记录：删除旧记录并按新参数重建，同一事务内完成
    ///
    /// 新参数可以换供货或出口批次；外部观察不到“记录暂时不存在”的中间态。
    pub fn replace_mapping(
        &self,
        supply_id: i64,
        export_id: i64,
        replacement: &NewMapping,
    ) -> EngineResult<SupplyExportMapping> {
        let now = current_timestamp();
        let mapping = self.repos.in_immediate_transaction(|conn| {
            let (old, _) = MappingValidator::validate_replacement_on(conn, supply_id, export_id, replacement)?;
            MappingRepository::delete_on(conn, old.supply_id, old.export_id)?;
            Ok(MappingRepository::insert_on(conn, replacement, now)?)
        })?;

        info!(
            old_supply_id = supply_id,
            old_export_id = export_id,
            supply_id = mapping.supply_id,
            export_id = mapping.export_id,
            quantity_bags = mapping.quantity_bags,
            "分配记录已更新"
        );
        Ok(mapping)
    }

    /// 删除分配记录，返回被删除的记录
    pub fn delete_mapping(&self, supply_id: i64, export_id: i64) -> EngineResult<SupplyExportMapping> {
        let removed = self.repos.in_immediate_transaction(|conn| {
            let existing = MappingRepository::find_on(conn, supply_id, export_id)?
                .ok_or_else(|| AllocationError::mapping_not_found(supply_id, export_id))?;
            MappingRepository::delete_on(conn, supply_id, export_id)?;
            Ok(existing)
        })?;

        info!(supply_id, export_id, quantity_bags = removed.quantity_bags, "分配记录已删除");
        Ok(removed)
    }

    pub fn list_for_supply(&self, supply_id: i64) -> EngineResult<Vec<MappingDetail>> {
        let rows = self.repos.mapping_repo.details_for_supply(supply_id)?;
        debug!(supply_id, count = rows.len(), "查询供货分配明细");
        Ok(rows)
    }

    pub fn list_for_export(&self, export_id: i64) -> EngineResult<Vec<MappingDetail>> {
        let rows = self.repos.mapping_repo.details_for_export(export_id)?;
        debug!(export_id, count = rows.len(), "查询出口来源明细");
        Ok(rows)
    }
}

/// 本地时间，精确到秒（与落库格式一致）
pub(crate) fn current_timestamp() -> NaiveDateTime {
    let now = chrono::Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::error::{CapacitySide, EntityKind};
    use crate::engine::test_support::*;

    fn setup() -> (AllocationRepositories, MappingCommands, i64, i64, i64) {
        let repos = repos();
        let supplier = seed_supplier(&repos, "PT Kaltim");
        let supply = seed_supply(&repos, supplier, days_ago(10), 1000, (800, 150, 50));
        let e1 = seed_export(&repos, 1000);
        let e2 = seed_export(&repos, 600);
        (repos.clone(), MappingCommands::new(repos), supply, e1, e2)
    }

    #[test]
    fn test_create_persists_and_blocks_overallocation() {
        let (repos, commands, supply, e1, e2) = setup();
        let created = commands
            .create_mapping(&NewMapping::new(supply, e1, 1000).with_notes("manual"))
            .unwrap();
        assert_eq!(created.quantity_bags, 1000);
        assert_eq!(repos.mapping_repo.find(supply, e1).unwrap().unwrap().notes.as_deref(), Some("manual"));

        let err = commands.create_mapping(&NewMapping::new(supply, e2, 1)).unwrap_err();
        assert!(matches!(
            err,
            AllocationError::CapacityExceeded { side: CapacitySide::Supply, available: 0, requested: 1, total: 1000, .. }
        ));
        assert_eq!(mapping_count(&repos), 1);
    }

    #[test]
    fn test_create_rejects_zero_quantity() {
        let (repos, commands, supply, e1, _) = setup();
        assert!(matches!(
            commands.create_mapping(&NewMapping::new(supply, e1, 0)),
            Err(AllocationError::InvalidQuantity { .. })
        ));
        assert_eq!(mapping_count(&repos), 0);
    }

    #[test]
    fn test_replace_changes_quantity_atomically() {
        let (repos, commands, supply, e1, e2) = setup();
        commands.create_mapping(&NewMapping::new(supply, e1, 400)).unwrap();

        let updated = commands
            .replace_mapping(supply, e1, &NewMapping::new(supply, e1, 700))
            .unwrap();
        assert_eq!(updated.quantity_bags, 700);
        assert_eq!(repos.mapping_repo.find(supply, e1).unwrap().unwrap().quantity_bags, 700);

        // 换出口批次：旧记录删除，新记录建立
        commands.replace_mapping(supply, e1, &NewMapping::new(supply, e2, 600)).unwrap();
        assert!(repos.mapping_repo.find(supply, e1).unwrap().is_none());
        assert_eq!(repos.mapping_repo.find(supply, e2).unwrap().unwrap().quantity_bags, 600);
    }

    #[test]
    fn test_failed_replace_keeps_old_mapping() {
        let (repos, commands, supply, e1, _) = setup();
        commands.create_mapping(&NewMapping::new(supply, e1, 400)).unwrap();

        let err = commands
            .replace_mapping(supply, e1, &NewMapping::new(supply, e1, 1001))
            .unwrap_err();
        assert!(matches!(err, AllocationError::CapacityExceeded { .. }));
        assert_eq!(repos.mapping_repo.find(supply, e1).unwrap().unwrap().quantity_bags, 400);
    }

    #[test]
    fn test_delete_then_missing() {
        let (repos, commands, supply, e1, _) = setup();
        commands.create_mapping(&NewMapping::new(supply, e1, 10)).unwrap();
        let removed = commands.delete_mapping(supply, e1).unwrap();
        assert_eq!(removed.quantity_bags, 10);
        assert_eq!(mapping_count(&repos), 0);
        assert!(matches!(
            commands.delete_mapping(supply, e1),
            Err(AllocationError::NotFound { entity: EntityKind::Mapping, .. })
        ));
    }

    #[test]
    fn test_list_views() {
        let (_repos, commands, supply, e1, e2) = setup();
        commands.create_mapping(&NewMapping::new(supply, e1, 10)).unwrap();
        commands.create_mapping(&NewMapping::new(supply, e2, 20)).unwrap();
        assert_eq!(commands.list_for_supply(supply).unwrap().len(), 2);
        let sources = commands.list_for_export(e2).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].supplier_name, "PT Kaltim");
    }
}
