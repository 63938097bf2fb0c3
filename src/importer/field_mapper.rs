// ==========================================
// 保单数据批量导入 - 字段映射器实现
// ==========================================
// 职责: 字段声明表 + 目标字段 → CSV 列映射 + 行取值
// 规则: 未映射 / 越界列一律视为空白
// ==========================================

use crate::clock::Clock;
use crate::domain::import::FieldMappings;
use crate::domain::types::{CellValue, EntityKind, FieldType};
use crate::importer::bulk_importer_trait::{DataCleaner, FieldMapper as FieldMapperTrait};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::CsvTable;
use std::collections::HashMap;
use tracing::warn;

/// 收据号字段（空白保留为空字符串）
pub const RECEIPT_NUMBER_FIELD: &str = "receiptNumber";

// ==========================================
// 字段声明
// ==========================================

/// 字段默认值
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldDefault {
    None,
    Text(&'static str),
    Number(f64),
    Bool(bool),
    /// 当天（日期字段）
    Today,
    /// 当前时间（时间戳字段）
    Now,
}

/// 字段声明: {name, type, default, required, reference}
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub field_type: FieldType,
    pub default: FieldDefault,
    pub required: bool,
    /// 外键目标实体
    pub reference: Option<EntityKind>,
}

const fn field(name: &'static str, field_type: FieldType) -> FieldSpec {
    FieldSpec {
        name,
        field_type,
        default: FieldDefault::None,
        required: false,
        reference: None,
    }
}

const fn with_default(
    name: &'static str,
    field_type: FieldType,
    default: FieldDefault,
) -> FieldSpec {
    FieldSpec {
        name,
        field_type,
        default,
        required: false,
        reference: None,
    }
}

const fn reference(name: &'static str, target: EntityKind, required: bool) -> FieldSpec {
    FieldSpec {
        name,
        field_type: FieldType::String,
        default: FieldDefault::None,
        required,
        reference: Some(target),
    }
}

pub const CUSTOMER_FIELDS: &[FieldSpec] = &[
    with_default("firstName", FieldType::String, FieldDefault::Text("Unknown")),
    field("middleName", FieldType::String),
    with_default("lastName", FieldType::String, FieldDefault::Text("Unknown")),
    field("idNumber", FieldType::String),
    field("email", FieldType::String),
    field("phone", FieldType::String),
    field("address", FieldType::String),
    field("dateOfBirth", FieldType::Date),
];

pub const POLICY_FIELDS: &[FieldSpec] = &[
    field("policyNumber", FieldType::String),
    reference("customerId", EntityKind::Customers, true),
    // 多个标识以 ; 或 | 分隔
    field("coCustomerIds", FieldType::String),
    field("policyType", FieldType::String),
    field("insurer", FieldType::String),
    field("startDate", FieldType::Date),
    field("endDate", FieldType::Date),
    with_default("autoRenew", FieldType::Boolean, FieldDefault::Bool(false)),
    with_default("totalPremiumDue", FieldType::Number, FieldDefault::Number(0.0)),
    with_default("amountPaid", FieldType::Number, FieldDefault::Number(0.0)),
    field("outstandingBalance", FieldType::Number),
    with_default("status", FieldType::String, FieldDefault::Text("Active")),
];

pub const PAYMENT_FIELDS: &[FieldSpec] = &[
    reference("policyId", EntityKind::Policies, true),
    with_default("amount", FieldType::Number, FieldDefault::Number(0.0)),
    with_default("refundAmount", FieldType::Number, FieldDefault::Number(0.0)),
    with_default("paymentMethod", FieldType::String, FieldDefault::Text("Cash")),
    with_default("paymentDate", FieldType::Date, FieldDefault::Today),
    field(RECEIPT_NUMBER_FIELD, FieldType::String),
    field("transactionReference", FieldType::String),
    field("notes", FieldType::String),
];

pub const RECEIPT_FIELDS: &[FieldSpec] = &[
    field(RECEIPT_NUMBER_FIELD, FieldType::String),
    reference("paymentId", EntityKind::Payments, false),
    reference("policyId", EntityKind::Policies, true),
    reference("customerId", EntityKind::Customers, false),
    field("amount", FieldType::Number),
    with_default("status", FieldType::String, FieldDefault::Text("Issued")),
    with_default("generatedAt", FieldType::Date, FieldDefault::Now),
];

/// 实体种类 → 字段声明表
pub fn field_table(kind: EntityKind) -> &'static [FieldSpec] {
    match kind {
        EntityKind::Customers => CUSTOMER_FIELDS,
        EntityKind::Policies => POLICY_FIELDS,
        EntityKind::Payments => PAYMENT_FIELDS,
        EntityKind::Receipts => RECEIPT_FIELDS,
    }
}

// ==========================================
// ColumnMapping - 已解析的列映射
// ==========================================
#[derive(Debug, Clone)]
pub struct ColumnMapping {
    pub kind: EntityKind,
    /// 字段声明 + 对应列序号（None 表示未映射）
    pub columns: Vec<(FieldSpec, Option<usize>)>,
}

impl ColumnMapping {
    pub fn column_of(&self, field_name: &str) -> Option<usize> {
        self.columns
            .iter()
            .find(|(spec, _)| spec.name == field_name)
            .and_then(|(_, idx)| *idx)
    }
}

// ==========================================
// CoercedRow - 单行转换结果
// ==========================================
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoercedRow {
    values: HashMap<&'static str, CellValue>,
}

impl CoercedRow {
    pub fn get(&self, name: &str) -> &CellValue {
        self.values.get(name).unwrap_or(&CellValue::Null)
    }

    pub fn set(&mut self, name: &'static str, value: CellValue) {
        self.values.insert(name, value);
    }

    pub fn text(&self, name: &str) -> Option<String> {
        self.get(name).as_text().map(|s| s.to_string())
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.get(name).as_number()
    }

    pub fn date(&self, name: &str) -> Option<chrono::NaiveDate> {
        self.get(name).as_date()
    }

    pub fn timestamp(&self, name: &str) -> Option<chrono::DateTime<chrono::Utc>> {
        self.get(name).as_timestamp()
    }

    pub fn boolean(&self, name: &str) -> Option<bool> {
        self.get(name).as_bool()
    }
}

// ==========================================
// FieldMapper 实现
// ==========================================
pub struct FieldMapper;

impl FieldMapperTrait for FieldMapper {
    fn build_mapping(
        &self,
        kind: EntityKind,
        table: &CsvTable,
        mappings: &FieldMappings,
    ) -> ImportResult<ColumnMapping> {
        if mappings.values().all(|header| header.trim().is_empty()) {
            return Err(ImportError::MissingMappings);
        }

        let specs = field_table(kind);

        for target in mappings.keys() {
            if !specs.iter().any(|spec| spec.name == target) {
                warn!(kind = %kind, field = %target, "未知目标字段，已忽略");
            }
        }

        let columns = specs
            .iter()
            .map(|spec| {
                let idx = mappings
                    .get(spec.name)
                    .filter(|header| !header.trim().is_empty())
                    .and_then(|header| {
                        let idx = table.column_index(header);
                        if idx.is_none() {
                            warn!(
                                field = spec.name,
                                header = %header,
                                "映射列不存在，按空白处理"
                            );
                        }
                        idx
                    });
                (*spec, idx)
            })
            .collect();

        Ok(ColumnMapping { kind, columns })
    }

    fn coerce_row(
        &self,
        mapping: &ColumnMapping,
        cells: &[String],
        cleaner: &dyn DataCleaner,
    ) -> CoercedRow {
        let mut row = CoercedRow::default();
        for (spec, idx) in &mapping.columns {
            let raw = idx
                .and_then(|i| cells.get(i))
                .map(|s| s.as_str())
                .unwrap_or("");
            row.set(spec.name, cleaner.coerce(raw, spec.field_type, spec.name));
        }
        row
    }

    fn apply_defaults(
        &self,
        mapping: &ColumnMapping,
        row: &mut CoercedRow,
        cleaner: &dyn DataCleaner,
        clock: &dyn Clock,
    ) {
        for (spec, _) in &mapping.columns {
            // 可选字符串: TRIM，空 → Null（收据号空字符串保留）
            if let CellValue::Text(text) = row.get(spec.name).clone() {
                if !(spec.name == RECEIPT_NUMBER_FIELD && text.is_empty()) {
                    let normalized = cleaner
                        .normalize_null(Some(text))
                        .map(CellValue::Text)
                        .unwrap_or(CellValue::Null);
                    row.set(spec.name, normalized);
                }
            }

            if row.get(spec.name).is_null() {
                let value = match spec.default {
                    FieldDefault::None => continue,
                    FieldDefault::Text(text) => CellValue::Text(text.to_string()),
                    FieldDefault::Number(n) => CellValue::Number(n),
                    FieldDefault::Bool(b) => CellValue::Bool(b),
                    FieldDefault::Today => CellValue::Date(clock.today()),
                    FieldDefault::Now => CellValue::Timestamp(clock.now()),
                };
                row.set(spec.name, value);
            }
        }
    }
}

/// 行预览（错误信息用）: 前 N 个单元格
pub fn row_preview(cells: &[String], limit: usize) -> String {
    cells
        .iter()
        .take(limit)
        .map(|c| c.trim())
        .collect::<Vec<_>>()
        .join(", ")
}
