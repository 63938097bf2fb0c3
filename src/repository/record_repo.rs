// ==========================================
// 保单数据批量导入 - 记录 Repository Trait
// ==========================================
// 职责: 定义四类实体的数据访问接口（不包含实现）
// 红线: Repository 不含业务规则，只做数据 CRUD
// ==========================================

use crate::domain::records::{Customer, Payment, Policy, PolicyBalance, Receipt};
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

// ==========================================
// CustomerRepository
// ==========================================
// 实现者: CustomerRepositoryImpl（使用 rusqlite）
#[async_trait]
pub trait CustomerRepository: Send + Sync {
    /// 按内部 ID 查询
    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Customer>>;

    /// 按邮箱查询（不区分大小写，最早写入者优先）
    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<Customer>>;

    /// 按证件号查询
    async fn find_by_id_number(&self, id_number: &str) -> RepositoryResult<Option<Customer>>;

    /// 证件号是否已存在
    async fn id_number_exists(&self, id_number: &str) -> RepositoryResult<bool>;

    /// 单条写入
    ///
    /// # 返回
    /// - Err(UniqueConstraintViolation): 证件号冲突
    async fn insert(&self, customer: &Customer) -> RepositoryResult<()>;
}

// ==========================================
// PolicyRepository
// ==========================================
#[async_trait]
pub trait PolicyRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Policy>>;

    /// 按保单号查询
    ///
    /// # 说明
    /// - 保单号不唯一，存在多条时返回最早写入的一条
    async fn find_by_policy_number(&self, policy_number: &str)
        -> RepositoryResult<Option<Policy>>;

    async fn policy_number_exists(&self, policy_number: &str) -> RepositoryResult<bool>;

    async fn insert(&self, policy: &Policy) -> RepositoryResult<()>;

    /// 原地更新聚合字段（amount_paid / outstanding_balance）
    ///
    /// updated_at 由调用方的时钟给出
    async fn update_balance(
        &self,
        id: &str,
        balance: &PolicyBalance,
        updated_at: DateTime<Utc>,
    ) -> RepositoryResult<()>;

    /// 删除 policies.policy_number 上的历史唯一索引
    ///
    /// # 返回
    /// - 被删除的索引名列表
    async fn drop_policy_number_unique_index(&self) -> RepositoryResult<Vec<String>>;
}

// ==========================================
// PaymentRepository
// ==========================================
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Payment>>;

    async fn find_by_receipt_number(&self, receipt_number: &str)
        -> RepositoryResult<Option<Payment>>;

    async fn receipt_number_exists(&self, receipt_number: &str) -> RepositoryResult<bool>;

    async fn insert(&self, payment: &Payment) -> RepositoryResult<()>;
}

// ==========================================
// ReceiptRepository
// ==========================================
#[async_trait]
pub trait ReceiptRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Receipt>>;

    async fn receipt_number_exists(&self, receipt_number: &str) -> RepositoryResult<bool>;

    async fn insert(&self, receipt: &Receipt) -> RepositoryResult<()>;
}
