// ==========================================
// 保单数据批量导入 - 导入权限校验
// ==========================================
// 职责: 在处理任何数据行之前校验调用方权限
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::types::EntityKind;
use std::collections::HashSet;

/// 调用方身份
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallerContext {
    pub user_id: String,
    pub roles: Vec<String>,
}

impl CallerContext {
    pub fn new(user_id: impl Into<String>, roles: &[&str]) -> Self {
        Self {
            user_id: user_id.into(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }
}

pub trait ImportPermissionGuard: Send + Sync {
    /// # 返回
    /// - Err(PermissionDenied): 无权导入该实体种类
    fn authorize(&self, caller: &CallerContext, kind: EntityKind) -> ApiResult<()>;
}

/// 不做校验（CLI 与内部调用）
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAllGuard;

impl ImportPermissionGuard for AllowAllGuard {
    fn authorize(&self, _caller: &CallerContext, _kind: EntityKind) -> ApiResult<()> {
        Ok(())
    }
}

/// 基于角色白名单（角色名忽略大小写）
#[derive(Debug, Clone)]
pub struct RolePermissionGuard {
    allowed_roles: HashSet<String>,
}

impl RolePermissionGuard {
    pub fn new<I, S>(allowed_roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed_roles: allowed_roles
                .into_iter()
                .map(|r| r.as_ref().trim().to_lowercase())
                .collect(),
        }
    }
}

impl ImportPermissionGuard for RolePermissionGuard {
    fn authorize(&self, caller: &CallerContext, kind: EntityKind) -> ApiResult<()> {
        let permitted = caller
            .roles
            .iter()
            .any(|role| self.allowed_roles.contains(&role.trim().to_lowercase()));

        if permitted {
            Ok(())
        } else {
            Err(ApiError::PermissionDenied(format!(
                "user \"{}\" may not import {}",
                caller.user_id, kind
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_guard() {
        let guard = RolePermissionGuard::new(["Admin", "underwriter"]);

        assert!(guard
            .authorize(&CallerContext::new("u1", &["ADMIN"]), EntityKind::Policies)
            .is_ok());
        assert!(matches!(
            guard.authorize(&CallerContext::new("u2", &["agent"]), EntityKind::Payments),
            Err(ApiError::PermissionDenied(_))
        ));
        assert!(guard
            .authorize(&CallerContext::default(), EntityKind::Customers)
            .is_err());
    }

    #[test]
    fn test_allow_all_guard() {
        assert!(AllowAllGuard
            .authorize(&CallerContext::default(), EntityKind::Receipts)
            .is_ok());
    }
}
