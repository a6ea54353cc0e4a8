// ==========================================
// 分配守恒性质测试
// ==========================================
// 职责: 任意操作序列之后，供货/出口两侧的分配合计不超过各自总量，
//       每个 (供货, 出口) 组合至多一条记录
// ==========================================


#[cfg(test)]
mod allocation_invariants_test {
    use coal_export_allocation::config::AllocationConfig;
    use coal_export_allocation::db::open_sqlite_connection;
    use coal_export_allocation::domain::NewMapping;
    use coal_export_allocation::engine::scoring::quality_score;
    use coal_export_allocation::engine::{
        AllocationEngine, AllocationStrategy, MappingCommands, MappingValidator, SuggestionRequest,
    };
    use proptest::prelude::*;
    use proptest::sample::Index;
    use std::collections::HashMap;

    use crate::test_helpers::*;

    fn assert_conservation(db_path: &str) {
        let conn = open_sqlite_connection(db_path).unwrap();

        let over_supplied: i64 = conn
            .query_row(
                r#"
                SELECT COUNT(*) FROM supply s
                WHERE (SELECT COALESCE(SUM(m.quantity_bags), 0) FROM supply_export m
                       WHERE m.supply_id = s.supply_id) > s.quantity_bags
                "#,
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(over_supplied, 0, "供货批次被超分");

        let over_sourced: i64 = conn
            .query_row(
                r#"
                SELECT COUNT(*) FROM export_shipment e
                WHERE (SELECT COALESCE(SUM(m.quantity_bags), 0) FROM supply_export m
                       WHERE m.export_id = e.export_id) > e.quantity_bags
                "#,
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(over_sourced, 0, "出口批次被超配");

        let duplicated: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM (SELECT 1 FROM supply_export GROUP BY supply_id, export_id HAVING COUNT(*) > 1)",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(duplicated, 0);
    }

    /// 操作: (供货下标, 出口下标, 袋数, true=新建 / false=删除)
    fn operation() -> impl Strategy<Value = (Index, Index, i64, bool)> {
        (any::<Index>(), any::<Index>(), 0i64..150, prop::bool::weighted(0.67))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn test_random_operation_sequence_preserves_conservation(
            supply_quantities in prop::collection::vec(0i64..400, 1..5),
            export_quantities in prop::collection::vec(1i64..250, 1..4),
            operations in prop::collection::vec(operation(), 1..60),
        ) {
            let (_tmp, db_path) = create_test_db().unwrap();
            let repos = open_repos(&db_path);
            let supplier = seed_supplier(&repos, "PT Kaltim");
            let supplies: Vec<i64> = supply_quantities
                .iter()
                .enumerate()
                .map(|(i, &qty)| seed_supply(&repos, supplier, days_ago(i as i64 * 7), qty, (qty / 2, qty / 4, 0)))
                .collect();
            let exports: Vec<i64> = export_quantities
                .iter()
                .map(|&qty| seed_export(&repos, "Qingdao", qty))
                .collect();

            let commands = MappingCommands::new(repos.clone());
            // 成功写入的分配 (supply, export) -> 袋数
            let mut accepted: HashMap<(i64, i64), i64> = HashMap::new();

            for (supply_idx, export_idx, quantity, create) in operations {
                let supply = supplies[supply_idx.index(supplies.len())];
                let export = exports[export_idx.index(exports.len())];
                if create {
                    if let Ok(mapping) = commands.create_mapping(&NewMapping::new(supply, export, quantity)) {
                        prop_assert_eq!(mapping.quantity_bags, quantity);
                        accepted.insert((supply, export), quantity);
                    }
                } else if commands.delete_mapping(supply, export).is_ok() {
                    prop_assert!(accepted.remove(&(supply, export)).is_some());
                }
                assert_conservation(&db_path);
            }

            let total: i64 = accepted.values().sum();
            prop_assert_eq!(repos.mapping_repo.sum_quantity(Default::default()).unwrap(), total);
            prop_assert_eq!(mapping_rows(&db_path), accepted.len() as i64);
        }

        #[test]
        fn test_suggestions_never_exceed_need_or_availability(
            batches in prop::collection::vec((0i64..400, 0i64..10), 1..12),
            export_quantity in 1i64..2000,
        ) {
            let (_tmp, db_path) = create_test_db().unwrap();
            let repos = open_repos(&db_path);
            let supplier = seed_supplier(&repos, "PT Kaltim");
            for (day, &(qty, rejected)) in batches.iter().enumerate() {
                seed_supply(&repos, supplier, days_ago(day as i64 * 5), qty, (qty / 3, qty / 3, rejected.min(qty)));
            }
            let export = seed_export(&repos, "Qingdao", export_quantity);
            let other = seed_export(&repos, "Tianjin", 100_000);

            // 先占掉一部分供货
            let engine = AllocationEngine::new(repos.clone(), AllocationConfig::default());
            for suggestion in engine
                .suggest_allocations(&SuggestionRequest::new(other).with_max_suggestions(3))
                .unwrap()
                .suggestions
            {
                MappingCommands::new(repos.clone())
                    .create_mapping(&NewMapping::new(suggestion.supply_id, other, suggestion.suggested_quantity / 2 + 1))
                    .unwrap();
            }

            for strategy in AllocationStrategy::all() {
                let set = engine
                    .suggest_allocations(&SuggestionRequest::new(export).with_strategy(strategy))
                    .unwrap();
                let total: i64 = set.suggestions.iter().map(|s| s.suggested_quantity).sum();
                prop_assert!(total <= set.still_needed, "{}: {} > {}", strategy, total, set.still_needed);
                for s in &set.suggestions {
                    prop_assert!(s.suggested_quantity > 0);
                    prop_assert!(s.suggested_quantity <= s.available_quantity);
                }
            }
            assert_conservation(&db_path);
        }

        #[test]
        fn test_quality_score_monotonic_in_grades(
            total in 1i64..5000,
            a in 0i64..5000,
            b in 0i64..5000,
            r in 0i64..5000,
        ) {
            let (a, b, r) = (a % total, b % total, r % total);
            let base = quality_score(a, b, r, total);
            prop_assert!(quality_score(a + 1, b, r, total) >= base);
            prop_assert!(quality_score(a, b + 1, r, total) >= base);
            prop_assert!(quality_score(a, b, r + 1, total) <= base);
        }
    }

    #[test]
    fn test_validate_is_idempotent_without_writes() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let repos = open_repos(&db_path);
        let supplier = seed_supplier(&repos, "PT Kaltim");
        let supply = seed_supply(&repos, supplier, days_ago(3), 100, (50, 50, 0));
        let export = seed_export(&repos, "Qingdao", 80);
        let validator = MappingValidator::new(repos);

        for quantity in [0, 50, 80, 81, 101] {
            let first = validator.validate(supply, export, quantity);
            let second = validator.validate(supply, export, quantity);
            assert_eq!(first.is_ok(), second.is_ok());
            match (first, second) {
                (Ok(a), Ok(b)) => assert_eq!(a, b),
                (Err(a), Err(b)) => assert_eq!(a.to_string(), b.to_string()),
                _ => unreachable!(),
            }
        }
        assert_eq!(mapping_rows(&db_path), 0);
    }
}
