// ==========================================
// 保单数据批量导入 - API 层
// ==========================================
// 职责: 对外导入接口（请求校验 + 权限 + 同步/流式）
// ==========================================

pub mod error;
pub mod import_api;
pub mod permission;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use import_api::{ImportApi, ImportResponse};
pub use permission::{AllowAllGuard, CallerContext, ImportPermissionGuard, RolePermissionGuard};
