// ==========================================
// 分配子系统端到端场景测试
// ==========================================
// 职责: 通过 AllocationApi 在真实数据库文件上验证典型业务场景
// ==========================================


#[cfg(test)]
mod allocation_scenarios_test {
    use coal_export_allocation::api::{AllocationApi, ApiError, BulkAllocateRequest};
    use coal_export_allocation::config::AllocationConfig;
    use coal_export_allocation::domain::NewMapping;
    use coal_export_allocation::engine::{
        AllocationRepositories, AllocationStrategy, AutoAllocateRequest, SuggestionRequest,
    };
    use tempfile::NamedTempFile;

    use crate::test_helpers::*;

    // ==========================================
    // 测试辅助函数
    // ==========================================

    fn setup() -> (NamedTempFile, String, AllocationRepositories, AllocationApi) {
        let (temp_file, db_path) = create_test_db().unwrap();
        let repos = open_repos(&db_path);
        let api = AllocationApi::new(repos.clone(), AllocationConfig::default());
        (temp_file, db_path, repos, api)
    }

    // ==========================================
    // 场景测试
    // ==========================================

    #[test]
    fn test_optimal_suggestion_covers_whole_export() {
        let (_tmp, _db, repos, api) = setup();
        let supplier = seed_supplier(&repos, "PT Kaltim");
        let supply = seed_supply(&repos, supplier, days_ago(10), 1000, (800, 150, 50));
        let export = seed_export(&repos, "Qingdao", 1000);

        let set = api
            .suggest_allocations(&SuggestionRequest::new(export).with_strategy(AllocationStrategy::Optimal))
            .unwrap();

        assert_eq!(set.suggestions.len(), 1);
        assert_eq!(set.suggestions[0].supply_id, supply);
        assert_eq!(set.suggestions[0].suggested_quantity, 1000);
        assert_eq!(set.suggestions[0].quality.score, 265.0);
        assert_eq!(set.remaining_after_suggestions, 0);
    }

    #[test]
    fn test_fully_allocated_supply_rejects_one_more_bag() {
        let (_tmp, _db, repos, api) = setup();
        let supplier = seed_supplier(&repos, "PT Kaltim");
        let supply = seed_supply(&repos, supplier, days_ago(10), 1000, (800, 150, 50));
        let e1 = seed_export(&repos, "Qingdao", 1000);
        let e2 = seed_export(&repos, "Tianjin", 1000);
        api.create_mapping(&NewMapping::new(supply, e1, 1000)).unwrap();

        let err = api.validate_mapping(supply, e2, 1).unwrap_err();
        match err {
            ApiError::CapacityExceeded(message) => {
                assert!(message.contains(&format!("Supply #{}", supply)));
                assert!(message.contains("available=0"));
                assert!(message.contains("requested=1"));
                assert!(message.contains("total=1000"));
            }
            other => panic!("expected CapacityExceeded, got {other:?}"),
        }
    }

    #[test]
    fn test_fifo_and_lifo_pick_opposite_ends() {
        let (_tmp, _db, repos, api) = setup();
        let supplier = seed_supplier(&repos, "PT Kaltim");
        let a = seed_supply(&repos, supplier, days_ago(60), 500, (300, 150, 10));
        let b = seed_supply(&repos, supplier, days_ago(5), 500, (300, 150, 10));
        let export = seed_export(&repos, "Tianjin", 500);

        let fifo = api
            .suggest_allocations(&SuggestionRequest::new(export).with_strategy(AllocationStrategy::Fifo))
            .unwrap();
        assert_eq!(fifo.suggestions[0].supply_id, a);

        let lifo = api
            .suggest_allocations(&SuggestionRequest::new(export).with_strategy(AllocationStrategy::Lifo))
            .unwrap();
        assert_eq!(lifo.suggestions[0].supply_id, b);

        // 只需 500 袋，首个批次即可满足
        assert_eq!(fifo.suggestions.len(), 1);
        assert_eq!(lifo.suggestions.len(), 1);
    }

    #[test]
    fn test_bulk_validation_counts_earlier_items() {
        let (_tmp, db_path, repos, api) = setup();
        let supplier = seed_supplier(&repos, "PT Kaltim");
        let supply = seed_supply(&repos, supplier, days_ago(20), 200, (100, 50, 0));
        let e1 = seed_export(&repos, "Qingdao", 500);
        let e2 = seed_export(&repos, "Tianjin", 500);

        let result = api
            .bulk_allocate(&BulkAllocateRequest {
                items: vec![NewMapping::new(supply, e1, 150), NewMapping::new(supply, e2, 150)],
                validate_first: true,
            })
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.created, 0);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].index, 1);
        assert!(result.errors[0].message.contains("available=50"));
        assert_eq!(mapping_rows(&db_path), 0);
    }

    #[test]
    fn test_auto_allocate_dry_run_leaves_store_untouched() {
        let (_tmp, db_path, repos, api) = setup();
        let supplier = seed_supplier(&repos, "PT Kaltim");
        let supply = seed_supply(&repos, supplier, days_ago(8), 300, (200, 100, 0));
        let export = seed_export(&repos, "Xiamen", 300);

        let result = api
            .auto_allocate(&AutoAllocateRequest {
                export_id: export,
                strategy: None,
                dry_run: true,
            })
            .unwrap();

        assert_eq!(result.allocations.len(), 1);
        assert!(result.allocations[0].dry_run);
        assert_eq!(result.allocations[0].supply_id, supply);
        assert_eq!(result.allocations[0].quantity_bags, 300);
        assert_eq!(mapping_rows(&db_path), 0);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["allocations"][0]["dry_run"], true);
    }

    #[test]
    fn test_status_of_unknown_supply_is_null() {
        let (_tmp, _db, _repos, api) = setup();
        let status = api.supply_status(9999).unwrap();
        assert!(status.is_none());
        assert_eq!(serde_json::to_string(&status).unwrap(), "null");
    }

    // ==========================================
    // 组合流程
    // ==========================================

    #[test]
    fn test_auto_allocate_then_status_reflects_writes() {
        let (_tmp, _db, repos, api) = setup();
        let supplier = seed_supplier(&repos, "PT Kaltim");
        let s1 = seed_supply(&repos, supplier, days_ago(40), 400, (300, 100, 0));
        let s2 = seed_supply(&repos, supplier, days_ago(10), 400, (300, 100, 0));
        let export = seed_export(&repos, "Qingdao", 600);

        let result = api
            .auto_allocate(&AutoAllocateRequest {
                export_id: export,
                strategy: Some(AllocationStrategy::Fifo),
                dry_run: false,
            })
            .unwrap();
        assert!(result.success);
        assert_eq!(result.summary.total_quantity, 600);

        let export_status = api.export_status(export).unwrap().unwrap();
        assert_eq!(export_status.sourced_quantity, 600);
        assert_eq!(export_status.needed_quantity, 0);
        assert_eq!(export_status.sources.len(), 2);

        let s1_status = api.supply_status(s1).unwrap().unwrap();
        assert_eq!(s1_status.available_quantity, 0);
        let s2_status = api.supply_status(s2).unwrap().unwrap();
        assert_eq!(s2_status.allocated_quantity, 200);
        assert_eq!(s2_status.utilization_percentage, 50.0);

        // 再跑一次：已备货完成
        let again = api
            .auto_allocate(&AutoAllocateRequest {
                export_id: export,
                strategy: None,
                dry_run: false,
            })
            .unwrap();
        assert!(!again.success);
        assert!(again.message.is_some());
    }

    #[test]
    fn test_bulk_allocate_commits_every_item() {
        let (_tmp, db_path, repos, api) = setup();
        let supplier = seed_supplier(&repos, "PT Kaltim");
        let s1 = seed_supply(&repos, supplier, days_ago(20), 200, (100, 50, 0));
        let s2 = seed_supply(&repos, supplier, days_ago(15), 200, (100, 50, 0));
        let export = seed_export(&repos, "Qingdao", 400);

        let result = api
            .bulk_allocate(&BulkAllocateRequest {
                items: vec![NewMapping::new(s1, export, 200), NewMapping::new(s2, export, 200)],
                validate_first: false,
            })
            .unwrap();
        assert!(result.success);
        assert_eq!(result.created, 2);
        assert_eq!(result.mappings[0].supplier_name, "PT Kaltim");
        assert_eq!(mapping_rows(&db_path), 2);
    }
}
