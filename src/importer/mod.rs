// ==========================================
// 保单数据批量导入 - 导入层
// ==========================================
// 职责: CSV 文本 → 客户/保单/缴费/收据记录
// 流程: 解析 → 映射 → 转换 → 引用解析 → 默认值 → 唯一键保护 → 落库 → 进度事件
// ==========================================

// 模块声明
pub mod bulk_importer_impl;
pub mod bulk_importer_trait;
pub mod conflict_handler;
pub mod data_cleaner;
pub mod derivation;
pub mod error;
pub mod field_mapper;
pub mod file_parser;
pub mod progress;
pub mod reference_resolver;
pub mod repositories;
pub mod row_importer;

// 重导出核心类型
pub use bulk_importer_impl::BulkImporterImpl;
pub use conflict_handler::{ConflictHandler, GuardedField, RetryPolicy};
pub use data_cleaner::DataCleaner as DataCleanerImpl;
pub use derivation::DerivationService as DerivationServiceImpl;
pub use error::{ImportError, ImportResult};
pub use field_mapper::{field_table, FieldMapper as FieldMapperImpl, FieldSpec};
pub use file_parser::{CsvParser, CsvTable};
pub use progress::{
    event_channel, event_stream, ChannelSink, CollectingSink, NoopSink, ProgressSink,
    SseWriterSink, DEFAULT_EVENT_BUFFER,
};
pub use reference_resolver::ReferenceResolver;
pub use repositories::ImportRepositories;
pub use row_importer::{row_importer_for, EntityRowImporter, RowContext, RowServices};

// 重导出 Trait 接口
pub use bulk_importer_trait::{
    BulkImporter, DataCleaner, DerivationService, FieldMapper, FileParser,
};
