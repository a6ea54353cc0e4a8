// ==========================================
// 煤炭出口业务系统 - 角色字段可见性
// ==========================================
// 职责: 按角色裁剪记录字段（财务字段为敏感字段）
// 规则: ADMIN / INVESTOR 可见财务字段，STAFF 不可见
// ==========================================

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::domain::export::Export;
use crate::domain::supply::Supply;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Staff,
    Investor,
}

impl Role {
    /// 是否可查看财务字段
    pub fn can_view_financials(&self) -> bool {
        matches!(self, Role::Admin | Role::Investor)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => write!(f, "ADMIN"),
            Role::Staff => write!(f, "STAFF"),
            Role::Investor => write!(f, "INVESTOR"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ADMIN" => Ok(Role::Admin),
            "STAFF" => Ok(Role::Staff),
            "INVESTOR" => Ok(Role::Investor),
            other => Err(format!("未知角色: {}", other)),
        }
    }
}

// ==========================================
// Trait: SensitiveFields
// ==========================================
/// 声明记录的敏感（财务）字段名，字段名与 serde 序列化后的 key 一致
pub trait SensitiveFields {
    fn sensitive_fields() -> &'static [&'static str];
}

impl SensitiveFields for Supply {
    fn sensitive_fields() -> &'static [&'static str] {
        &["price_per_bag"]
    }
}

impl SensitiveFields for Export {
    fn sensitive_fields() -> &'static [&'static str] {
        &["price_per_bag"]
    }
}

/// 按角色投影记录
///
/// 返回 JSON 对象；无权查看财务字段时移除全部敏感字段。
pub fn project_for_role<T>(record: &T, role: Role) -> serde_json::Result<Value>
where
    T: Serialize + SensitiveFields,
{
    let mut value = serde_json::to_value(record)?;
    if !role.can_view_financials() {
        if let Value::Object(map) = &mut value {
            for field in T::sensitive_fields() {
                map.remove(*field);
            }
        }
    }
    Ok(value)
}
