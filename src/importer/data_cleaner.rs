// ==========================================
// 保单数据批量导入 - 单元格取值转换器实现
// ==========================================
// 职责: 原始单元格 → 按声明类型转换的取值
// 规则: 空白 → Null（收据号例外: 空白 → 空字符串）
// 约束: 纯函数，同输入同输出
// ==========================================

use crate::domain::types::{CellValue, FieldType};
use crate::importer::bulk_importer_trait::DataCleaner as DataCleanerTrait;
use crate::importer::field_mapper::RECEIPT_NUMBER_FIELD;
use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// 通用日期兜底格式
const FALLBACK_DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d-%b-%Y",
    "%d %b %Y",
    "%d %B %Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%b %d %Y",
];

/// 通用日期时间兜底格式
const FALLBACK_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %H:%M:%S",
];

pub struct DataCleaner;

impl DataCleanerTrait for DataCleaner {
    fn coerce(&self, raw: &str, field_type: FieldType, field_name: &str) -> CellValue {
        if raw.trim().is_empty() {
            if field_name == RECEIPT_NUMBER_FIELD {
                return CellValue::Text(String::new());
            }
            return CellValue::Null;
        }

        match field_type {
            FieldType::String => CellValue::Text(raw.to_string()),
            FieldType::Number => self
                .parse_number(raw)
                .map(CellValue::Number)
                .unwrap_or(CellValue::Null),
            FieldType::Date => self
                .parse_date(raw)
                .map(CellValue::Date)
                .unwrap_or(CellValue::Null),
            FieldType::Boolean => CellValue::Bool(self.parse_bool(raw)),
        }
    }

    fn parse_number(&self, raw: &str) -> Option<f64> {
        let stripped: String = raw
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
            .collect();

        stripped.parse::<f64>().ok().filter(|n| n.is_finite())
    }

    fn parse_date(&self, raw: &str) -> Option<NaiveDate> {
        let value = raw.trim();
        parse_month_day_year(value).or_else(|| parse_generic_date(value))
    }

    fn parse_bool(&self, raw: &str) -> bool {
        matches!(raw.trim().to_lowercase().as_str(), "true" | "yes" | "1")
    }

    fn normalize_null(&self, value: Option<String>) -> Option<String> {
        value.and_then(|v| {
            let trimmed = v.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
    }
}

/// 严格 M/D/YYYY（导入文件主流格式，月份在前）
fn parse_month_day_year(value: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = value.split('/').collect();
    if parts.len() != 3 {
        return None;
    }

    let (month, day, year) = (parts[0], parts[1], parts[2]);
    let all_digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    if !(all_digits(month) && month.len() <= 2)
        || !(all_digits(day) && day.len() <= 2)
        || !(all_digits(year) && year.len() == 4)
    {
        return None;
    }

    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

fn parse_generic_date(value: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.date_naive());
    }

    FALLBACK_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
        .or_else(|| {
            FALLBACK_DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
                .map(|dt| dt.date())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_is_null_except_receipt_number() {
        let cleaner = DataCleaner;
        assert_eq!(cleaner.coerce("   ", FieldType::String, "email"), CellValue::Null);
        assert_eq!(cleaner.coerce("", FieldType::Number, "amount"), CellValue::Null);
        assert_eq!(
            cleaner.coerce("  ", FieldType::String, RECEIPT_NUMBER_FIELD),
            CellValue::Text(String::new())
        );
    }

    #[test]
    fn test_string_passthrough_keeps_leading_zeros() {
        let cleaner = DataCleaner;
        assert_eq!(
            cleaner.coerce("000123", FieldType::String, "idNumber"),
            CellValue::Text("000123".to_string())
        );
    }

    #[test]
    fn test_number_strips_currency_and_separators() {
        let cleaner = DataCleaner;
        assert_eq!(cleaner.parse_number("KES 1,234.50"), Some(1234.5));
        assert_eq!(cleaner.parse_number("-50"), Some(-50.0));
        assert_eq!(cleaner.parse_number("abc"), None);
        assert_eq!(cleaner.parse_number("1-2"), None);
        assert_eq!(
            cleaner.coerce("n/a", FieldType::Number, "amount"),
            CellValue::Null
        );
    }

    #[test]
    fn test_date_month_first() {
        let cleaner = DataCleaner;
        assert_eq!(
            cleaner.parse_date("7/10/2018"),
            NaiveDate::from_ymd_opt(2018, 7, 10)
        );
        assert_eq!(
            cleaner.parse_date("12/31/2020"),
            NaiveDate::from_ymd_opt(2020, 12, 31)
        );
    }

    #[test]
    fn test_date_fallback_formats() {
        let cleaner = DataCleaner;
        assert_eq!(
            cleaner.parse_date("2018-07-10"),
            NaiveDate::from_ymd_opt(2018, 7, 10)
        );
        assert_eq!(
            cleaner.parse_date("2018-07-10T09:15:00Z"),
            NaiveDate::from_ymd_opt(2018, 7, 10)
        );
        assert_eq!(
            cleaner.parse_date("10-Jul-2018"),
            NaiveDate::from_ymd_opt(2018, 7, 10)
        );
        assert_eq!(
            cleaner.parse_date("July 10, 2018"),
            NaiveDate::from_ymd_opt(2018, 7, 10)
        );
        assert_eq!(cleaner.parse_date("13/45/2018"), None);
        assert_eq!(cleaner.parse_date("not a date"), None);
    }

    #[test]
    fn test_boolean() {
        let cleaner = DataCleaner;
        assert!(cleaner.parse_bool("TRUE"));
        assert!(cleaner.parse_bool(" yes "));
        assert!(cleaner.parse_bool("1"));
        assert!(!cleaner.parse_bool("no"));
        assert!(!cleaner.parse_bool("Y"));
    }

    #[test]
    fn test_coercion_is_pure() {
        let cleaner = DataCleaner;
        let inputs = [
            ("7/10/2018", FieldType::Date),
            ("$1,000", FieldType::Number),
            ("Yes", FieldType::Boolean),
            ("007", FieldType::String),
        ];
        for (raw, ty) in inputs {
            assert_eq!(cleaner.coerce(raw, ty, "f"), cleaner.coerce(raw, ty, "f"));
        }
    }

    #[test]
    fn test_normalize_null() {
        let cleaner = DataCleaner;
        assert_eq!(cleaner.normalize_null(Some("  ".to_string())), None);
        assert_eq!(
            cleaner.normalize_null(Some("  value  ".to_string())),
            Some("value".to_string())
        );
        assert_eq!(cleaner.normalize_null(None), None);
    }
}
