// ==========================================
// 保单数据批量导入 - 唯一键冲突处理器
// ==========================================
// 职责: 唯一键字段的主动查重 + 被动重试
// 规则:
// - 写入前查重，冲突 → 追加 -<毫秒时间戳>-<行序号>
// - 写入时唯一约束冲突 → 追加 -<毫秒时间戳>-<行序号>-<第几次重试> 后重试
// - 重试次数耗尽 → 行级错误
// 红线: 冲突以确定性后缀解决，不直接拒绝该行
// ==========================================

use crate::clock::Clock;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::repositories::ImportRepositories;
use crate::repository::RepositoryResult;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// 受保护的唯一键字段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardedField {
    CustomerIdNumber,
    PaymentReceiptNumber,
    ReceiptNumber,
    /// 仅在配置开启时保护
    PolicyNumber,
}

impl fmt::Display for GuardedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            GuardedField::CustomerIdNumber => "customer ID number",
            GuardedField::PaymentReceiptNumber => "payment receipt number",
            GuardedField::ReceiptNumber => "receipt number",
            GuardedField::PolicyNumber => "policy number",
        };
        write!(f, "{}", label)
    }
}

/// 唯一约束冲突后的重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 1 }
    }
}

pub struct ConflictHandler {
    repos: ImportRepositories,
    clock: Arc<dyn Clock>,
}

impl ConflictHandler {
    pub fn new(repos: ImportRepositories, clock: Arc<dyn Clock>) -> Self {
        Self { repos, clock }
    }

    /// 查询唯一键是否已存在
    pub async fn exists(&self, field: GuardedField, value: &str) -> ImportResult<bool> {
        let exists = match field {
            GuardedField::CustomerIdNumber => self.repos.customers.id_number_exists(value).await?,
            GuardedField::PaymentReceiptNumber => {
                self.repos.payments.receipt_number_exists(value).await?
            }
            GuardedField::ReceiptNumber => self.repos.receipts.receipt_number_exists(value).await?,
            GuardedField::PolicyNumber => self.repos.policies.policy_number_exists(value).await?,
        };
        Ok(exists)
    }

    /// 主动查重: 已存在则追加后缀
    pub async fn guard(
        &self,
        field: GuardedField,
        value: &str,
        row_index: usize,
    ) -> ImportResult<String> {
        if !self.exists(field, value).await? {
            return Ok(value.to_string());
        }

        let suffixed = format!("{}-{}-{}", value, self.clock.timestamp_millis(), row_index);
        debug!(
            field = %field,
            original = %value,
            suffixed = %suffixed,
            "唯一键已存在，追加后缀"
        );
        Ok(suffixed)
    }

    /// 写入 + 唯一约束冲突重试
    ///
    /// # 参数
    /// - original: 未加后缀的原始值（重试后缀基于原始值生成）
    /// - key: 首次写入使用的值（可能已由 guard 追加后缀）
    /// - insert: 以唯一键值执行一次写入
    ///
    /// # 返回
    /// - Ok(key): 最终写入成功的唯一键值
    /// - Err(RowPersistence): 重试耗尽或其他写入失败
    #[allow(clippy::too_many_arguments)]
    pub async fn insert_with_retry<F, Fut>(
        &self,
        field: GuardedField,
        original: &str,
        key: String,
        row_index: usize,
        display_row: usize,
        policy: RetryPolicy,
        mut insert: F,
    ) -> ImportResult<String>
    where
        F: FnMut(String) -> Fut + Send,
        Fut: Future<Output = RepositoryResult<()>> + Send,
    {
        let mut key = key;
        let mut attempt: u32 = 0;

        loop {
            match insert(key.clone()).await {
                Ok(()) => return Ok(key),
                Err(e) if e.is_unique_violation() && attempt < policy.max_retries => {
                    attempt += 1;
                    let retry_key = format!(
                        "{}-{}-{}-{}",
                        original,
                        self.clock.timestamp_millis(),
                        row_index,
                        attempt
                    );
                    warn!(
                        field = %field,
                        rejected = %key,
                        retry = %retry_key,
                        attempt,
                        "唯一约束冲突，重新追加后缀后重试"
                    );
                    key = retry_key;
                }
                Err(e) if e.is_unique_violation() => {
                    return Err(ImportError::RowPersistence {
                        row: display_row,
                        message: format!(
                            "Duplicate {} \"{}\" still conflicts after {} retries",
                            field, key, policy.max_retries
                        ),
                    })
                }
                Err(e) => {
                    return Err(ImportError::RowPersistence {
                        row: display_row,
                        message: e.row_detail(),
                    })
                }
            }
        }
    }
}
