// ==========================================
// 保单数据批量导入 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、导入事件
// 红线: 不含数据访问逻辑,不含导入流程逻辑
// ==========================================

pub mod import;
pub mod records;
pub mod types;

// 重导出核心类型
pub use import::{FieldMappings, ImportEvent, ImportRequest, ImportSummary};
pub use records::{Customer, Payment, Policy, PolicyBalance, Receipt};
pub use types::{CellValue, EntityKind, FieldType};
