// ==========================================
// 煤炭出口业务系统 - 出口批次领域模型
// ==========================================

use crate::domain::types::ExportStatus;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ==========================================
// Export - 出口批次（按袋计）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Export {
    pub export_id: i64,
    pub destination_country: String,
    pub destination_city: String,
    pub quantity_bags: i64, // 需求总袋数
    pub status: ExportStatus,
    pub export_date: Option<NaiveDate>,

    // ===== 财务（敏感字段）=====
    pub price_per_bag: Option<f64>,
}

impl Export {
    /// 目的地展示串，如 "Qingdao, China"
    pub fn destination(&self) -> String {
        format_destination(&self.destination_city, &self.destination_country)
    }
}

/// 目的地展示格式 "城市, 国家"
pub fn format_destination(city: &str, country: &str) -> String {
    format!("{}, {}", city, country)
}

// ==========================================
// NewExport - 出口批次录入参数
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewExport {
    pub destination_country: String,
    pub destination_city: String,
    pub quantity_bags: i64,
    #[serde(default)]
    pub status: ExportStatus,
    #[serde(default)]
    pub export_date: Option<NaiveDate>,
    #[serde(default)]
    pub price_per_bag: Option<f64>,
}

impl NewExport {
    pub fn new(destination_country: &str, destination_city: &str, quantity_bags: i64) -> Self {
        Self {
            destination_country: destination_country.to_string(),
            destination_city: destination_city.to_string(),
            quantity_bags,
            status: ExportStatus::Pending,
            export_date: None,
            price_per_bag: None,
        }
    }

    pub fn with_status(mut self, status: ExportStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_price_per_bag(mut self, price: f64) -> Self {
        self.price_per_bag = Some(price);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination_format() {
        let export = Export {
            export_id: 7,
            destination_country: "China".to_string(),
            destination_city: "Qingdao".to_string(),
            quantity_bags: 400,
            status: ExportStatus::InTransit,
            export_date: None,
            price_per_bag: None,
        };
        assert_eq!(export.destination(), "Qingdao, China");
    }
}
