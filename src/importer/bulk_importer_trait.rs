// ==========================================
// 保单数据批量导入 - 导入 Trait
// ==========================================
// 职责: 定义导入接口（不包含实现）
// ==========================================

use crate::clock::Clock;
use crate::config::ImportSettings;
use crate::domain::import::{FieldMappings, ImportSummary};
use crate::domain::records::PolicyBalance;
use crate::domain::types::{CellValue, EntityKind, FieldType};
use crate::importer::error::ImportResult;
use crate::importer::field_mapper::{CoercedRow, ColumnMapping};
use crate::importer::file_parser::CsvTable;
use crate::importer::progress::ProgressSink;
use async_trait::async_trait;
use chrono::NaiveDate;

// ==========================================
// BulkImporter Trait
// ==========================================
// 用途: 批量导入主接口
// 实现者: BulkImporterImpl
#[async_trait]
pub trait BulkImporter: Send + Sync {
    /// 同步模式: 整批处理完成后只返回汇总
    ///
    /// # 返回
    /// - Ok(ImportSummary): 导入汇总（含全部行级错误）
    /// - Err: 致命输入错误（空文件/缺少映射等），未处理任何行
    async fn import_csv(
        &self,
        kind: EntityKind,
        csv_text: &str,
        mappings: &FieldMappings,
    ) -> ImportResult<ImportSummary>;

    /// 流式模式: 逐行推送 progress/error 事件，最后推送 complete 事件
    ///
    /// # 说明
    /// - 与同步模式共享同一套行处理逻辑，仅投递方式不同
    /// - sink 写入失败（消费方断开）时中止并返回错误
    async fn import_csv_streaming(
        &self,
        kind: EntityKind,
        csv_text: &str,
        mappings: &FieldMappings,
        sink: &mut dyn ProgressSink,
    ) -> ImportResult<ImportSummary>;
}

// ==========================================
// FileParser Trait
// ==========================================
// 实现者: CsvParser
pub trait FileParser: Send + Sync {
    /// 解析文本为表头 + 数据行
    ///
    /// # 返回
    /// - Ok(CsvTable): 无非空行时返回空表（由调用方判定为致命错误）
    /// - Err: CSV 格式错误
    fn parse_text(&self, text: &str) -> ImportResult<CsvTable>;
}

// ==========================================
// DataCleaner Trait
// ==========================================
// 用途: 单元格类型转换
// 实现者: DataCleaner
pub trait DataCleaner: Send + Sync {
    /// 按声明类型转换单元格
    ///
    /// # 规则
    /// - 空白 → Null（收据号字段 → 空字符串）
    fn coerce(&self, raw: &str, field_type: FieldType, field_name: &str) -> CellValue;

    /// 数值: 仅保留数字/小数点/负号后解析
    fn parse_number(&self, raw: &str) -> Option<f64>;

    /// 日期: 先严格 M/D/YYYY，再通用格式兜底
    fn parse_date(&self, raw: &str) -> Option<NaiveDate>;

    /// 布尔: true/yes/1（忽略大小写）
    fn parse_bool(&self, raw: &str) -> bool;

    /// 标准化 NULL 值（空字符串/空白 → None）
    fn normalize_null(&self, value: Option<String>) -> Option<String>;
}

// ==========================================
// FieldMapper Trait
// ==========================================
// 实现者: FieldMapper
pub trait FieldMapper: Send + Sync {
    /// 目标字段 → 列序号
    ///
    /// # 返回
    /// - Err(MissingMappings): 映射表为空
    fn build_mapping(
        &self,
        kind: EntityKind,
        table: &CsvTable,
        mappings: &FieldMappings,
    ) -> ImportResult<ColumnMapping>;

    /// 读取并转换单行（mapped → coerced）
    fn coerce_row(
        &self,
        mapping: &ColumnMapping,
        cells: &[String],
        cleaner: &dyn DataCleaner,
    ) -> CoercedRow;

    /// 可选字符串 TRIM + 默认值填充（defaulted）
    fn apply_defaults(
        &self,
        mapping: &ColumnMapping,
        row: &mut CoercedRow,
        cleaner: &dyn DataCleaner,
        clock: &dyn Clock,
    );
}

// ==========================================
// DerivationService Trait
// ==========================================
// 用途: 派生字段计算（纯函数）
// 实现者: DerivationService
pub trait DerivationService: Send + Sync {
    /// 缴费入账后的保单聚合字段
    ///
    /// # 规则
    /// - applied = amount + refund
    /// - amount_paid = max(amount_paid + applied, 0)
    /// - outstanding = max(total_premium_due - amount_paid, 0)
    fn apply_payment(&self, balance: &PolicyBalance, amount: f64, refund: f64) -> PolicyBalance;

    /// 保单导入时的未缴余额
    ///
    /// # 规则
    /// - 提供值 → max(提供值, 0)
    /// - 未提供 → max(total - paid, 0)
    fn derive_outstanding_balance(&self, total: f64, paid: f64, provided: Option<f64>) -> f64;

    /// 收据开具地点（由保单号前缀推断）
    fn derive_receipt_location(&self, policy_number: Option<&str>, settings: &ImportSettings)
        -> String;

    /// 共同客户标识拆分（; 或 | 分隔）
    fn split_co_customers(&self, raw: &str) -> Vec<String>;
}
