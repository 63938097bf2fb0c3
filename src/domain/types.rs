// ==========================================
// 保单数据批量导入 - 领域类型定义
// ==========================================
// 职责: 实体种类 / 字段类型 / 单元格取值
// ==========================================

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// 实体种类 (Entity Kind)
// ==========================================
// 序列化格式: 小写复数 (与 collectionType 一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Customers, // 客户
    Policies,  // 保单
    Payments,  // 缴费
    Receipts,  // 收据
}

impl EntityKind {
    /// collectionType 标识
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Customers => "customers",
            EntityKind::Policies => "policies",
            EntityKind::Payments => "payments",
            EntityKind::Receipts => "receipts",
        }
    }

    /// 单数展示名（用于错误信息，如 "Policy not found"）
    pub fn display_name(&self) -> &'static str {
        match self {
            EntityKind::Customers => "Customer",
            EntityKind::Policies => "Policy",
            EntityKind::Payments => "Payment",
            EntityKind::Receipts => "Receipt",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "customers" => Ok(EntityKind::Customers),
            "policies" => Ok(EntityKind::Policies),
            "payments" => Ok(EntityKind::Payments),
            "receipts" => Ok(EntityKind::Receipts),
            other => Err(other.to_string()),
        }
    }
}

// ==========================================
// 字段声明类型 (Field Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Date,
    Boolean,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::String => write!(f, "string"),
            FieldType::Number => write!(f, "number"),
            FieldType::Date => write!(f, "date"),
            FieldType::Boolean => write!(f, "boolean"),
        }
    }
}

// ==========================================
// 单元格取值 (Cell Value)
// ==========================================
// Null: 空白/无法解析
// Timestamp: 仅由默认值 (now) 产生
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    Null,
    Text(String),
    Number(f64),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    Bool(bool),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            CellValue::Date(d) => Some(*d),
            CellValue::Timestamp(ts) => Some(ts.date_naive()),
            _ => None,
        }
    }

    /// 日期按 UTC 零点展开为时间戳
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            CellValue::Timestamp(ts) => Some(*ts),
            CellValue::Date(d) => d.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CellValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_kind_from_str() {
        assert_eq!("customers".parse::<EntityKind>(), Ok(EntityKind::Customers));
        assert_eq!(" Policies ".parse::<EntityKind>(), Ok(EntityKind::Policies));
        assert_eq!("payments".parse::<EntityKind>(), Ok(EntityKind::Payments));
        assert_eq!("receipts".parse::<EntityKind>(), Ok(EntityKind::Receipts));
        assert!("claims".parse::<EntityKind>().is_err());
    }

    #[test]
    fn test_entity_kind_serde() {
        let json = serde_json::to_string(&EntityKind::Payments).unwrap();
        assert_eq!(json, "\"payments\"");
    }

    #[test]
    fn test_cell_value_date_as_timestamp() {
        let value = CellValue::Date(NaiveDate::from_ymd_opt(2018, 7, 10).unwrap());
        let ts = value.as_timestamp().unwrap();
        assert_eq!(ts.to_rfc3339(), "2018-07-10T00:00:00+00:00");
    }
}
