// ==========================================
// 引擎单元测试公共造数
// ==========================================

use crate::db::open_in_memory;
use crate::domain::export::NewExport;
use crate::domain::mapping::NewMapping;
use crate::domain::supply::NewSupply;
use crate::engine::repositories::AllocationRepositories;
use chrono::{NaiveDate, NaiveDateTime};
use std::sync::{Arc, Mutex};

pub fn repos() -> AllocationRepositories {
    AllocationRepositories::from_connection(Arc::new(Mutex::new(open_in_memory().unwrap())))
}

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 30).unwrap()
}

pub fn days_ago(days: i64) -> NaiveDate {
    today() - chrono::Duration::days(days)
}

pub fn seed_supplier(repos: &AllocationRepositories, name: &str) -> i64 {
    repos.supplier_repo.insert(name).unwrap()
}

pub fn seed_supply(
    repos: &AllocationRepositories,
    supplier_id: i64,
    supply_date: NaiveDate,
    quantity: i64,
    grades: (i64, i64, i64),
) -> i64 {
    repos
        .supply_repo
        .insert(&NewSupply::new(supplier_id, supply_date, quantity).with_grades(grades.0, grades.1, grades.2))
        .unwrap()
}

pub fn seed_export(repos: &AllocationRepositories, quantity: i64) -> i64 {
    repos
        .export_repo
        .insert(&NewExport::new("China", "Qingdao", quantity))
        .unwrap()
}

pub fn seed_mapping(repos: &AllocationRepositories, supply_id: i64, export_id: i64, quantity: i64) {
    repos
        .mapping_repo
        .insert(&NewMapping::new(supply_id, export_id, quantity), allocated_at())
        .unwrap();
}

pub fn allocated_at() -> NaiveDateTime {
    today().and_hms_opt(9, 30, 0).unwrap()
}

pub fn mapping_count(repos: &AllocationRepositories) -> i64 {
    let conn = repos.connection();
    let guard = conn.lock().unwrap();
    crate::repository::MappingRepository::count_on(&guard).unwrap()
}
