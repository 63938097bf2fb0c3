// ==========================================
// 保单数据批量导入 - 外键引用解析器
// ==========================================
// 职责: 人读标识 → 内部 ID
// 顺序: (1) 合法 UUID → 按 ID 查找
//       (2) 按实体自然键查找（首个命中即返回）
//           客户: 邮箱 → 证件号
//           保单: 保单号（重复时取最早插入者）
//           缴费: 收据号
// 红线: 必填引用解析失败 → 行级错误，不做默认填充
// ==========================================

use crate::domain::types::EntityKind;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::repositories::ImportRepositories;
use tracing::debug;
use uuid::Uuid;

/// 单行错误定位信息（展示行号 + 行预览）
#[derive(Debug, Clone, Copy)]
pub struct RowLocator<'a> {
    pub display_row: usize,
    pub preview: &'a str,
}

pub struct ReferenceResolver {
    repos: ImportRepositories,
}

impl ReferenceResolver {
    pub fn new(repos: ImportRepositories) -> Self {
        Self { repos }
    }

    /// 解析标识
    ///
    /// # 返回
    /// - Ok(Some(id)): 命中
    /// - Ok(None): 所有策略均未命中
    /// - Err: 数据库访问失败
    pub async fn resolve(
        &self,
        target: EntityKind,
        identifier: &str,
    ) -> ImportResult<Option<String>> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Ok(None);
        }

        if Uuid::parse_str(identifier).is_ok() {
            if let Some(id) = self.find_by_id(target, identifier).await? {
                return Ok(Some(id));
            }
        }

        let resolved = match target {
            EntityKind::Customers => {
                match self.repos.customers.find_by_email(identifier).await? {
                    Some(customer) => Some(customer.id),
                    None => self
                        .repos
                        .customers
                        .find_by_id_number(identifier)
                        .await?
                        .map(|c| c.id),
                }
            }
            EntityKind::Policies => self
                .repos
                .policies
                .find_by_policy_number(identifier)
                .await?
                .map(|p| p.id),
            EntityKind::Payments => self
                .repos
                .payments
                .find_by_receipt_number(identifier)
                .await?
                .map(|p| p.id),
            // 收据不作为引用目标
            EntityKind::Receipts => None,
        };

        debug!(target = %target, identifier = %identifier, resolved = ?resolved, "引用解析");
        Ok(resolved)
    }

    /// 解析必填引用
    ///
    /// # 返回
    /// - Err(RowResolution): 空白或未命中
    pub async fn resolve_required(
        &self,
        target: EntityKind,
        field: &str,
        identifier: Option<&str>,
        locator: RowLocator<'_>,
    ) -> ImportResult<String> {
        let identifier = match identifier.map(str::trim).filter(|s| !s.is_empty()) {
            Some(value) => value,
            None => {
                return Err(ImportError::RowResolution {
                    row: locator.display_row,
                    message: format!(
                        "Missing required {} \"{}\". Row data: {}",
                        target.display_name(),
                        field,
                        locator.preview
                    ),
                })
            }
        };

        match self.resolve(target, identifier).await? {
            Some(id) => Ok(id),
            None => Err(ImportError::RowResolution {
                row: locator.display_row,
                message: format!(
                    "{} not found: \"{}\". Row data: {}",
                    target.display_name(),
                    identifier,
                    locator.preview
                ),
            }),
        }
    }

    async fn find_by_id(&self, target: EntityKind, id: &str) -> ImportResult<Option<String>> {
        let found = match target {
            EntityKind::Customers => self.repos.customers.find_by_id(id).await?.map(|c| c.id),
            EntityKind::Policies => self.repos.policies.find_by_id(id).await?.map(|p| p.id),
            EntityKind::Payments => self.repos.payments.find_by_id(id).await?.map(|p| p.id),
            EntityKind::Receipts => self.repos.receipts.find_by_id(id).await?.map(|r| r.id),
        };
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;
    use crate::domain::records::{Customer, Policy};
    use chrono::Utc;
    use rusqlite::Connection;
    use std::sync::{Arc, Mutex};

    fn setup() -> (ReferenceResolver, ImportRepositories) {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let repos = ImportRepositories::sqlite(Arc::new(Mutex::new(conn))).unwrap();
        (ReferenceResolver::new(repos.clone()), repos)
    }

    fn customer(id: &str, email: Option<&str>, id_number: Option<&str>) -> Customer {
        Customer {
            id: id.to_string(),
            first_name: "Jane".to_string(),
            middle_name: None,
            last_name: "Doe".to_string(),
            id_number: id_number.map(String::from),
            email: email.map(String::from),
            phone: None,
            address: None,
            date_of_birth: None,
            created_at: Utc::now(),
        }
    }

    fn policy(id: &str, number: &str, customer_id: &str) -> Policy {
        Policy {
            id: id.to_string(),
            policy_number: Some(number.to_string()),
            customer_id: customer_id.to_string(),
            co_customer_ids: vec![],
            policy_type: None,
            insurer: None,
            start_date: None,
            end_date: None,
            auto_renew: false,
            total_premium_due: 0.0,
            amount_paid: 0.0,
            outstanding_balance: 0.0,
            status: "Active".to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_customer_resolution_order() {
        let (resolver, repos) = setup();
        let id = Uuid::new_v4().to_string();
        repos
            .customers
            .insert(&customer(&id, Some("jane@example.com"), Some("ID-1")))
            .await
            .unwrap();

        let by_uuid = resolver.resolve(EntityKind::Customers, &id).await.unwrap();
        let by_email = resolver
            .resolve(EntityKind::Customers, "JANE@example.com")
            .await
            .unwrap();
        let by_id_number = resolver.resolve(EntityKind::Customers, "ID-1").await.unwrap();

        assert_eq!(by_uuid.as_deref(), Some(id.as_str()));
        assert_eq!(by_email.as_deref(), Some(id.as_str()));
        assert_eq!(by_id_number.as_deref(), Some(id.as_str()));
        assert_eq!(resolver.resolve(EntityKind::Customers, "nobody").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_policy_number_earliest_wins() {
        let (resolver, repos) = setup();
        let customer_id = Uuid::new_v4().to_string();
        repos
            .customers
            .insert(&customer(&customer_id, None, Some("ID-9")))
            .await
            .unwrap();
        let first = Uuid::new_v4().to_string();
        let second = Uuid::new_v4().to_string();
        repos.policies.insert(&policy(&first, "POL-1", &customer_id)).await.unwrap();
        repos.policies.insert(&policy(&second, "POL-1", &customer_id)).await.unwrap();

        let resolved = resolver.resolve(EntityKind::Policies, "POL-1").await.unwrap();
        assert_eq!(resolved.as_deref(), Some(first.as_str()));
    }

    #[tokio::test]
    async fn test_required_reference_errors() {
        let (resolver, _) = setup();
        let locator = RowLocator {
            display_row: 7,
            preview: "POL-404, 100",
        };

        let missing = resolver
            .resolve_required(EntityKind::Policies, "policyId", Some("  "), locator)
            .await
            .unwrap_err();
        assert_eq!(missing.row(), Some(7));
        assert!(missing.to_string().starts_with("Row 7: Missing required Policy"));

        let unknown = resolver
            .resolve_required(EntityKind::Policies, "policyId", Some("POL-404"), locator)
            .await
            .unwrap_err();
        assert!(unknown.is_row_error());
        assert!(unknown.to_string().contains("Policy not found: \"POL-404\""));
        assert!(unknown.to_string().contains("POL-404, 100"));
    }
}
