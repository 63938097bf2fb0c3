// ==========================================
// 保单数据批量导入 - 单行导入策略
// ==========================================
// 职责: 每类实体一个策略对象，负责 引用解析 → 唯一键保护 → 落库
// 状态机: mapped → coerced → resolved → defaulted → guarded → persisted | error
//         （mapped/coerced/defaulted 由编排器调用 FieldMapper 完成）
// 红线: 必填引用缺失/解析失败 → 行级错误，该行不落任何数据
// 红线: 缴费先更新保单聚合字段，再写入缴费记录（写入失败不回滚保单）
// ==========================================

use crate::clock::Clock;
use crate::config::ImportSettings;
use crate::domain::records::{Customer, Payment, Policy, Receipt};
use crate::domain::types::{CellValue, EntityKind};
use crate::importer::bulk_importer_trait::DerivationService as _;
use crate::importer::conflict_handler::{ConflictHandler, GuardedField, RetryPolicy};
use crate::importer::derivation::DerivationService;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_mapper::CoercedRow;
use crate::importer::reference_resolver::{ReferenceResolver, RowLocator};
use crate::importer::repositories::ImportRepositories;
use crate::repository::RepositoryError;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

// ==========================================
// RowContext - 单行上下文
// ==========================================
#[derive(Debug, Clone, Copy)]
pub struct RowContext<'a> {
    /// 数据行序号（0 起，用于唯一键后缀）
    pub row_index: usize,
    /// 展示行号（数据行序号 + 2，含表头）
    pub display_row: usize,
    /// 行预览（前 N 个单元格）
    pub preview: &'a str,
    pub settings: &'a ImportSettings,
}

impl<'a> RowContext<'a> {
    pub fn locator(&self) -> RowLocator<'a> {
        RowLocator {
            display_row: self.display_row,
            preview: self.preview,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.settings.duplicate_retry_limit,
        }
    }

    fn persistence_error(&self, err: RepositoryError) -> ImportError {
        ImportError::RowPersistence {
            row: self.display_row,
            message: err.row_detail(),
        }
    }
}

// ==========================================
// RowServices - 策略共用的协作者
// ==========================================
pub struct RowServices {
    pub repos: ImportRepositories,
    pub resolver: ReferenceResolver,
    pub conflicts: ConflictHandler,
    pub derivation: DerivationService,
    pub clock: Arc<dyn Clock>,
}

impl RowServices {
    pub fn new(repos: ImportRepositories, clock: Arc<dyn Clock>) -> Self {
        Self {
            resolver: ReferenceResolver::new(repos.clone()),
            conflicts: ConflictHandler::new(repos.clone(), clock.clone()),
            derivation: DerivationService,
            repos,
            clock,
        }
    }
}

// ==========================================
// EntityRowImporter Trait
// ==========================================
#[async_trait]
pub trait EntityRowImporter: Send + Sync {
    fn kind(&self) -> EntityKind;

    /// 解析外键引用，并将标识替换为内部 ID
    async fn resolve(&self, row: &mut CoercedRow, ctx: &RowContext<'_>) -> ImportResult<()>;

    /// 唯一键保护 + 派生字段 + 落库
    ///
    /// # 返回
    /// - Ok(id): 新记录内部 ID
    async fn persist(&self, row: &CoercedRow, ctx: &RowContext<'_>) -> ImportResult<String>;
}

/// 实体种类 → 导入策略
pub fn row_importer_for(
    kind: EntityKind,
    services: Arc<RowServices>,
) -> Box<dyn EntityRowImporter> {
    match kind {
        EntityKind::Customers => Box::new(CustomerRowImporter { services }),
        EntityKind::Policies => Box::new(PolicyRowImporter { services }),
        EntityKind::Payments => Box::new(PaymentRowImporter { services }),
        EntityKind::Receipts => Box::new(ReceiptRowImporter { services }),
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// 可选引用: 解析失败记录警告后丢弃
async fn resolve_optional(
    services: &RowServices,
    row: &mut CoercedRow,
    field: &'static str,
    target: EntityKind,
    ctx: &RowContext<'_>,
) -> ImportResult<()> {
    let Some(identifier) = row.text(field).filter(|s| !s.trim().is_empty()) else {
        row.set(field, CellValue::Null);
        return Ok(());
    };

    match services.resolver.resolve(target, &identifier).await? {
        Some(id) => row.set(field, CellValue::Text(id)),
        None => {
            warn!(
                row = ctx.display_row,
                field,
                identifier = %identifier,
                "可选引用未找到，已忽略"
            );
            row.set(field, CellValue::Null);
        }
    }
    Ok(())
}

// ==========================================
// CustomerRowImporter
// ==========================================
pub struct CustomerRowImporter {
    services: Arc<RowServices>,
}

#[async_trait]
impl EntityRowImporter for CustomerRowImporter {
    fn kind(&self) -> EntityKind {
        EntityKind::Customers
    }

    // 客户不引用其他实体
    async fn resolve(&self, _row: &mut CoercedRow, _ctx: &RowContext<'_>) -> ImportResult<()> {
        Ok(())
    }

    async fn persist(&self, row: &CoercedRow, ctx: &RowContext<'_>) -> ImportResult<String> {
        let services = &self.services;
        let customer = Customer {
            id: new_id(),
            first_name: row.text("firstName").unwrap_or_else(|| "Unknown".to_string()),
            middle_name: row.text("middleName"),
            last_name: row.text("lastName").unwrap_or_else(|| "Unknown".to_string()),
            id_number: row.text("idNumber"),
            email: row.text("email"),
            phone: row.text("phone"),
            address: row.text("address"),
            date_of_birth: row.date("dateOfBirth"),
            created_at: services.clock.now(),
        };

        match customer.id_number.clone() {
            Some(id_number) => {
                let field = GuardedField::CustomerIdNumber;
                let key = services.conflicts.guard(field, &id_number, ctx.row_index).await?;
                let repo = services.repos.customers.clone();
                let record = customer.clone();
                services
                    .conflicts
                    .insert_with_retry(
                        field,
                        &id_number,
                        key,
                        ctx.row_index,
                        ctx.display_row,
                        ctx.retry_policy(),
                        move |key| {
                            let repo = repo.clone();
                            let mut record = record.clone();
                            record.id_number = Some(key);
                            async move { repo.insert(&record).await }
                        },
                    )
                    .await?;
            }
            // 证件号为空: 不做唯一键保护
            None => services
                .repos
                .customers
                .insert(&customer)
                .await
                .map_err(|e| ctx.persistence_error(e))?,
        }

        Ok(customer.id)
    }
}

// ==========================================
// PolicyRowImporter
// ==========================================
pub struct PolicyRowImporter {
    services: Arc<RowServices>,
}

const CO_CUSTOMER_SEPARATOR: &str = ";";

#[async_trait]
impl EntityRowImporter for PolicyRowImporter {
    fn kind(&self) -> EntityKind {
        EntityKind::Policies
    }

    async fn resolve(&self, row: &mut CoercedRow, ctx: &RowContext<'_>) -> ImportResult<()> {
        let services = &self.services;
        let customer_id = services
            .resolver
            .resolve_required(
                EntityKind::Customers,
                "customerId",
                row.text("customerId").as_deref(),
                ctx.locator(),
            )
            .await?;

        // 共同客户: 逐个解析，去重，剔除主客户，数量封顶
        let identifiers = row
            .text("coCustomerIds")
            .map(|raw| services.derivation.split_co_customers(&raw))
            .unwrap_or_default();

        let mut co_customer_ids: Vec<String> = Vec::new();
        for identifier in identifiers {
            if co_customer_ids.len() >= ctx.settings.max_co_customers {
                warn!(
                    row = ctx.display_row,
                    limit = ctx.settings.max_co_customers,
                    "共同客户超出上限，多余部分已忽略"
                );
                break;
            }
            match services.resolver.resolve(EntityKind::Customers, &identifier).await? {
                Some(id) if id == customer_id || co_customer_ids.contains(&id) => {}
                Some(id) => co_customer_ids.push(id),
                None => warn!(
                    row = ctx.display_row,
                    identifier = %identifier,
                    "共同客户未找到，已忽略"
                ),
            }
        }

        row.set("customerId", CellValue::Text(customer_id));
        row.set(
            "coCustomerIds",
            if co_customer_ids.is_empty() {
                CellValue::Null
            } else {
                CellValue::Text(co_customer_ids.join(CO_CUSTOMER_SEPARATOR))
            },
        );
        Ok(())
    }

    async fn persist(&self, row: &CoercedRow, ctx: &RowContext<'_>) -> ImportResult<String> {
        let services = &self.services;
        let customer_id = row.text("customerId").ok_or_else(|| ImportError::RowResolution {
            row: ctx.display_row,
            message: format!("Missing required Customer \"customerId\". Row data: {}", ctx.preview),
        })?;

        let total = row.number("totalPremiumDue").unwrap_or(0.0);
        let paid = row.number("amountPaid").unwrap_or(0.0);
        let outstanding = services.derivation.derive_outstanding_balance(
            total,
            paid,
            row.number("outstandingBalance"),
        );

        let policy = Policy {
            id: new_id(),
            policy_number: row.text("policyNumber"),
            customer_id,
            co_customer_ids: row
                .text("coCustomerIds")
                .map(|ids| ids.split(CO_CUSTOMER_SEPARATOR).map(String::from).collect())
                .unwrap_or_default(),
            policy_type: row.text("policyType"),
            insurer: row.text("insurer"),
            start_date: row.date("startDate"),
            end_date: row.date("endDate"),
            auto_renew: row.boolean("autoRenew").unwrap_or(false),
            total_premium_due: total,
            amount_paid: paid,
            outstanding_balance: outstanding,
            status: row.text("status").unwrap_or_else(|| "Active".to_string()),
            created_at: services.clock.now(),
        };

        match policy.policy_number.clone() {
            Some(number) if ctx.settings.enforce_policy_number_unique => {
                let field = GuardedField::PolicyNumber;
                let key = services.conflicts.guard(field, &number, ctx.row_index).await?;
                let repo = services.repos.policies.clone();
                let record = policy.clone();
                services
                    .conflicts
                    .insert_with_retry(
                        field,
                        &number,
                        key,
                        ctx.row_index,
                        ctx.display_row,
                        ctx.retry_policy(),
                        move |key| {
                            let repo = repo.clone();
                            let mut record = record.clone();
                            record.policy_number = Some(key);
                            async move { repo.insert(&record).await }
                        },
                    )
                    .await?;
            }
            // 默认: 保单号允许重复
            _ => services
                .repos
                .policies
                .insert(&policy)
                .await
                .map_err(|e| ctx.persistence_error(e))?,
        }

        Ok(policy.id)
    }
}

// ==========================================
// PaymentRowImporter
// ==========================================
pub struct PaymentRowImporter {
    services: Arc<RowServices>,
}

#[async_trait]
impl EntityRowImporter for PaymentRowImporter {
    fn kind(&self) -> EntityKind {
        EntityKind::Payments
    }

    async fn resolve(&self, row: &mut CoercedRow, ctx: &RowContext<'_>) -> ImportResult<()> {
        let policy_id = self
            .services
            .resolver
            .resolve_required(
                EntityKind::Policies,
                "policyId",
                row.text("policyId").as_deref(),
                ctx.locator(),
            )
            .await?;
        row.set("policyId", CellValue::Text(policy_id));
        Ok(())
    }

    async fn persist(&self, row: &CoercedRow, ctx: &RowContext<'_>) -> ImportResult<String> {
        let services = &self.services;
        let policy_id = row.text("policyId").ok_or_else(|| ImportError::RowResolution {
            row: ctx.display_row,
            message: format!("Missing required Policy \"policyId\". Row data: {}", ctx.preview),
        })?;

        let amount = row.number("amount").unwrap_or(0.0);
        let refund_amount = row.number("refundAmount").unwrap_or(0.0);
        // 空白收据号: 存 NULL，不做唯一键保护
        let receipt_number = row.text("receiptNumber").filter(|s| !s.is_empty());

        let field = GuardedField::PaymentReceiptNumber;
        let guarded_key = match &receipt_number {
            Some(number) => Some(services.conflicts.guard(field, number, ctx.row_index).await?),
            None => None,
        };

        let payment = Payment {
            id: new_id(),
            policy_id: policy_id.clone(),
            amount,
            refund_amount,
            payment_method: row.text("paymentMethod").unwrap_or_else(|| "Cash".to_string()),
            payment_date: row.date("paymentDate").unwrap_or_else(|| services.clock.today()),
            receipt_number: guarded_key.clone(),
            transaction_reference: row.text("transactionReference"),
            notes: row.text("notes"),
            created_at: services.clock.now(),
        };

        // 先更新保单聚合字段
        let mut aggregate_applied = false;
        if DerivationService::affects_balance(amount, refund_amount) {
            let policy = services
                .repos
                .policies
                .find_by_id(&policy_id)
                .await
                .map_err(|e| ctx.persistence_error(e))?
                .ok_or_else(|| ImportError::RowResolution {
                    row: ctx.display_row,
                    message: format!(
                        "Policy not found: \"{}\". Row data: {}",
                        policy_id, ctx.preview
                    ),
                })?;

            let balance = services
                .derivation
                .apply_payment(&policy.balance(), amount, refund_amount);
            services
                .repos
                .policies
                .update_balance(&policy_id, &balance, services.clock.now())
                .await
                .map_err(|e| ctx.persistence_error(e))?;
            aggregate_applied = true;

            debug!(
                policy_id = %policy_id,
                amount_paid = balance.amount_paid,
                outstanding_balance = balance.outstanding_balance,
                "保单聚合字段已更新"
            );
        }

        let inserted = match (receipt_number, guarded_key) {
            (Some(original), Some(key)) => {
                let repo = services.repos.payments.clone();
                let record = payment.clone();
                services
                    .conflicts
                    .insert_with_retry(
                        field,
                        &original,
                        key,
                        ctx.row_index,
                        ctx.display_row,
                        ctx.retry_policy(),
                        move |key| {
                            let repo = repo.clone();
                            let mut record = record.clone();
                            record.receipt_number = Some(key);
                            async move { repo.insert(&record).await }
                        },
                    )
                    .await
                    .map(|_| ())
            }
            _ => services
                .repos
                .payments
                .insert(&payment)
                .await
                .map_err(|e| ctx.persistence_error(e)),
        };

        match inserted {
            Ok(()) => Ok(payment.id),
            Err(err) if aggregate_applied => {
                Err(ImportError::PartialAggregate {
                    row: ctx.display_row,
                    policy_id,
                    message: err.row_detail(),
                })
            }
            Err(err) => Err(err),
        }
    }
}

// ==========================================
// ReceiptRowImporter
// ==========================================
pub struct ReceiptRowImporter {
    services: Arc<RowServices>,
}

#[async_trait]
impl EntityRowImporter for ReceiptRowImporter {
    fn kind(&self) -> EntityKind {
        EntityKind::Receipts
    }

    async fn resolve(&self, row: &mut CoercedRow, ctx: &RowContext<'_>) -> ImportResult<()> {
        let services = &self.services;
        let policy_id = services
            .resolver
            .resolve_required(
                EntityKind::Policies,
                "policyId",
                row.text("policyId").as_deref(),
                ctx.locator(),
            )
            .await?;
        row.set("policyId", CellValue::Text(policy_id));

        resolve_optional(services, row, "paymentId", EntityKind::Payments, ctx).await?;
        resolve_optional(services, row, "customerId", EntityKind::Customers, ctx).await?;
        Ok(())
    }

    async fn persist(&self, row: &CoercedRow, ctx: &RowContext<'_>) -> ImportResult<String> {
        let services = &self.services;
        let policy_id = row.text("policyId").ok_or_else(|| ImportError::RowResolution {
            row: ctx.display_row,
            message: format!("Missing required Policy \"policyId\". Row data: {}", ctx.preview),
        })?;

        let policy = services
            .repos
            .policies
            .find_by_id(&policy_id)
            .await
            .map_err(|e| ctx.persistence_error(e))?
            .ok_or_else(|| ImportError::RowResolution {
                row: ctx.display_row,
                message: format!("Policy not found: \"{}\". Row data: {}", policy_id, ctx.preview),
            })?;

        let payment_id = row.text("paymentId");

        // 金额: 显式值 → 关联缴费金额 → 0
        let amount = match row.number("amount") {
            Some(amount) => amount,
            None => match &payment_id {
                Some(id) => services
                    .repos
                    .payments
                    .find_by_id(id)
                    .await
                    .map_err(|e| ctx.persistence_error(e))?
                    .map(|p| p.amount)
                    .unwrap_or(0.0),
                None => 0.0,
            },
        };

        // 空白收据号: 生成 RCT-<毫秒时间戳>-<行序号>
        let original = match row.text("receiptNumber").filter(|s| !s.is_empty()) {
            Some(number) => number,
            None => format!("RCT-{}-{}", services.clock.timestamp_millis(), ctx.row_index),
        };

        let field = GuardedField::ReceiptNumber;
        let key = services.conflicts.guard(field, &original, ctx.row_index).await?;

        let receipt = Receipt {
            id: new_id(),
            receipt_number: key.clone(),
            payment_id,
            policy_id,
            customer_id: row
                .text("customerId")
                .unwrap_or_else(|| policy.customer_id.clone()),
            amount,
            status: row.text("status").unwrap_or_else(|| "Issued".to_string()),
            location: services
                .derivation
                .derive_receipt_location(policy.policy_number.as_deref(), ctx.settings),
            generated_at: row
                .timestamp("generatedAt")
                .unwrap_or_else(|| services.clock.now()),
            created_at: services.clock.now(),
        };

        let repo = services.repos.receipts.clone();
        let record = receipt.clone();
        services
            .conflicts
            .insert_with_retry(
                field,
                &original,
                key,
                ctx.row_index,
                ctx.display_row,
                ctx.retry_policy(),
                move |key| {
                    let repo = repo.clone();
                    let mut record = record.clone();
                    record.receipt_number = key;
                    async move { repo.insert(&record).await }
                },
            )
            .await?;

        Ok(receipt.id)
    }
}
