// ==========================================
// 煤炭出口业务系统 - 批量分配编排
// ==========================================
// 职责: 一批分配请求全部写入或全部不写入
// 红线: 整批在一个 BEGIN IMMEDIATE 事务内逐项校验 + 写入，
//       任意一项失败整体回滚，不留部分结果
// ==========================================

use crate::domain::mapping::{MappingDetail, NewMapping};
use crate::engine::error::{AllocationError, EngineResult};
use crate::engine::mapping_ops::{current_timestamp, MappingCommands};
use crate::engine::repositories::AllocationRepositories;
use crate::engine::validator::{BulkItemError, MappingValidator};
use crate::repository::MappingRepository;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// 批量分配结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkResult {
    pub success: bool,
    /// 本批次标识（仅用于日志关联）
    pub batch_id: String,
    pub created: usize,
    pub failed: usize,
    pub mappings: Vec<MappingDetail>,
    pub errors: Vec<BulkItemError>,
}

pub struct BulkAllocationOrchestrator {
    repos: AllocationRepositories,
}

impl BulkAllocationOrchestrator {
    pub fn new(repos: AllocationRepositories) -> Self {
        Self { repos }
    }

    /// 批量分配
    ///
    /// # 参数
    /// - items: 分配请求（保序）
    /// - validate_first: 先做整批累计校验，有任何无效项则不写入
    ///
    /// # 返回
    /// - Ok(BulkResult): 全部写入，或预校验未通过（success=false，零写入）
    /// - Err(TransactionFailure): 执行阶段失败，整批已回滚
    #[instrument(skip(self, items), fields(item_count = items.len(), validate_first))]
    pub fn bulk_allocate(&self, items: &[NewMapping], validate_first: bool) -> EngineResult<BulkResult> {
        let batch_id = Uuid::new_v4().to_string();

        if validate_first {
            let report = MappingValidator::new(self.repos.clone()).validate_bulk(items)?;
            if !report.all_valid() {
                warn!(
                    batch_id = %batch_id,
                    invalid = report.summary.invalid,
                    "批量预校验未通过，未写入任何记录"
                );
                return Ok(BulkResult {
                    success: false,
                    batch_id,
                    created: 0,
                    failed: report.summary.invalid,
                    mappings: Vec::new(),
                    errors: report.errors,
                });
            }
        }

        let now = current_timestamp();
        let outcome = self.repos.in_immediate_transaction(|conn| {
            let mut created = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                MappingCommands::create_on(conn, item, now).map_err(|err| item_failure(index, item, err))?;
                let detail = MappingRepository::detail_on(conn, item.supply_id, item.export_id)
                    .map_err(AllocationError::from)
                    .and_then(|d| d.ok_or_else(|| AllocationError::mapping_not_found(item.supply_id, item.export_id)))
                    .map_err(|err| item_failure(index, item, err))?;
                created.push(detail);
            }
            Ok(created)
        });

        let mappings = match outcome {
            Ok(mappings) => mappings,
            Err(err @ AllocationError::TransactionFailure { .. }) => {
                warn!(batch_id = %batch_id, error = %err, "批量分配失败，已整体回滚");
                return Err(err);
            }
            // 开启 / 提交事务本身失败
            Err(err) => {
                warn!(batch_id = %batch_id, error = %err, "批量分配事务失败，已整体回滚");
                return Err(AllocationError::TransactionFailure {
                    message: err.to_string(),
                    transient: err.is_transient(),
                });
            }
        };

        info!(batch_id = %batch_id, created = mappings.len(), "批量分配已提交");
        Ok(BulkResult {
            success: true,
            batch_id,
            created: mappings.len(),
            failed: 0,
            mappings,
            errors: Vec::new(),
        })
    }
}

fn item_failure(index: usize, item: &NewMapping, err: AllocationError) -> AllocationError {
    AllocationError::TransactionFailure {
        message: format!(
            "第 {} 项 (supply={}, export={}): {}",
            index, item.supply_id, item.export_id, err
        ),
        transient: err.is_transient(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::error::CapacitySide;
    use crate::engine::test_support::*;

    #[test]
    fn test_all_items_created_with_display_fields() {
        let repos = repos();
        let supplier = seed_supplier(&repos, "PT Kaltim");
        let s1 = seed_supply(&repos, supplier, days_ago(10), 300, (200, 100, 0));
        let s2 = seed_supply(&repos, supplier, days_ago(5), 300, (200, 100, 0));
        let export = seed_export(&repos, 500);

        let result = BulkAllocationOrchestrator::new(repos.clone())
            .bulk_allocate(&[NewMapping::new(s1, export, 300), NewMapping::new(s2, export, 200)], true)
            .unwrap();

        assert!(result.success);
        assert_eq!(result.created, 2);
        assert_eq!(result.failed, 0);
        assert!(Uuid::parse_str(&result.batch_id).is_ok());
        assert_eq!(result.mappings[0].supplier_name, "PT Kaltim");
        assert_eq!(result.mappings[1].destination, "Qingdao, China");
        assert_eq!(result.mappings[1].supply_date, days_ago(5));
        assert_eq!(mapping_count(&repos), 2);
    }

    #[test]
    fn test_cumulative_overallocation_rejected_before_writing() {
        let repos = repos();
        let supplier = seed_supplier(&repos, "PT Kaltim");
        let supply = seed_supply(&repos, supplier, days_ago(10), 200, (100, 100, 0));
        let e1 = seed_export(&repos, 1000);
        let e2 = seed_export(&repos, 1000);

        let result = BulkAllocationOrchestrator::new(repos.clone())
            .bulk_allocate(&[NewMapping::new(supply, e1, 150), NewMapping::new(supply, e2, 150)], true)
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.created, 0);
        assert_eq!(result.failed, 1);
        assert_eq!(result.errors[0].index, 1);
        assert!(result.errors[0].message.contains("available=50"));
        assert_eq!(mapping_count(&repos), 0);
    }

    #[test]
    fn test_execution_failure_rolls_back_whole_batch() {
        let repos = repos();
        let supplier = seed_supplier(&repos, "PT Kaltim");
        let supply = seed_supply(&repos, supplier, days_ago(10), 200, (100, 100, 0));
        let e1 = seed_export(&repos, 1000);
        let e2 = seed_export(&repos, 1000);

        // 不做预校验：第二项在事务内撞上容量，第一项一并回滚
        let err = BulkAllocationOrchestrator::new(repos.clone())
            .bulk_allocate(&[NewMapping::new(supply, e1, 150), NewMapping::new(supply, e2, 150)], false)
            .unwrap_err();

        match err {
            AllocationError::TransactionFailure { message, transient } => {
                assert!(message.contains("第 1 项"));
                assert!(message.contains("available=50"));
                assert!(!transient);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(mapping_count(&repos), 0);
    }

    #[test]
    fn test_duplicate_pair_within_batch_rolls_back() {
        let repos = repos();
        let supplier = seed_supplier(&repos, "PT Kaltim");
        let supply = seed_supply(&repos, supplier, days_ago(10), 500, (100, 100, 0));
        let export = seed_export(&repos, 500);

        let err = BulkAllocationOrchestrator::new(repos.clone())
            .bulk_allocate(&[NewMapping::new(supply, export, 100), NewMapping::new(supply, export, 100)], false)
            .unwrap_err();
        assert!(err.to_string().contains("existing quantity=100"));
        assert_eq!(mapping_count(&repos), 0);
    }

    #[test]
    fn test_capacity_side_is_reported_in_prevalidation() {
        let repos = repos();
        let supplier = seed_supplier(&repos, "PT Kaltim");
        let s1 = seed_supply(&repos, supplier, days_ago(10), 500, (100, 100, 0));
        let s2 = seed_supply(&repos, supplier, days_ago(9), 500, (100, 100, 0));
        let export = seed_export(&repos, 300);

        let report = MappingValidator::new(repos.clone())
            .validate_bulk(&[NewMapping::new(s1, export, 200), NewMapping::new(s2, export, 200)])
            .unwrap();
        assert_eq!(report.summary.invalid, 1);
        assert!(report.errors[0].message.contains("needed=100"));

        let err = MappingValidator::new(repos)
            .validate(s2, export, 400)
            .unwrap_err();
        assert!(matches!(err, AllocationError::CapacityExceeded { side: CapacitySide::Export, .. }));
    }
}
