// ==========================================
// 保单数据批量导入 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 客户/保单/缴费/收据 CSV 批量导入
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 导入层 - CSV 批量导入
pub mod importer;

// 配置层 - 导入配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// 时钟（默认值与唯一键后缀）
pub mod clock;

// API 层 - 对外导入接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{CellValue, EntityKind, FieldType};

// 领域实体
pub use domain::{
    Customer, FieldMappings, ImportEvent, ImportRequest, ImportSummary, Payment, Policy,
    PolicyBalance, Receipt,
};

// 导入器
pub use importer::{BulkImporter, BulkImporterImpl, ImportError, ImportRepositories, ProgressSink};

// API
pub use api::{ApiError, CallerContext, ImportApi, ImportResponse};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "保单数据批量导入";
