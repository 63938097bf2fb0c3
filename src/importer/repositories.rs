// ==========================================
// 保单数据批量导入 - 导入层仓储聚合
// ==========================================
// 职责: 聚合导入所需的四类 Repository
// ==========================================

use crate::db::configure_sqlite_connection;
use crate::repository::{
    CustomerRepository, CustomerRepositoryImpl, PaymentRepository, PaymentRepositoryImpl,
    PolicyRepository, PolicyRepositoryImpl, ReceiptRepository, ReceiptRepositoryImpl,
    RepositoryError, RepositoryResult,
};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

/// 导入仓储集合
///
/// 显式传入导入器，不依赖全局连接。
#[derive(Clone)]
pub struct ImportRepositories {
    pub customers: Arc<dyn CustomerRepository>,
    pub policies: Arc<dyn PolicyRepository>,
    pub payments: Arc<dyn PaymentRepository>,
    pub receipts: Arc<dyn ReceiptRepository>,
}

impl ImportRepositories {
    pub fn new(
        customers: Arc<dyn CustomerRepository>,
        policies: Arc<dyn PolicyRepository>,
        payments: Arc<dyn PaymentRepository>,
        receipts: Arc<dyn ReceiptRepository>,
    ) -> Self {
        Self {
            customers,
            policies,
            payments,
            receipts,
        }
    }

    /// 四个仓储共享同一 SQLite 连接
    pub fn sqlite(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            configure_sqlite_connection(&guard)?;
        }

        Ok(Self::new(
            Arc::new(CustomerRepositoryImpl::from_connection(conn.clone())),
            Arc::new(PolicyRepositoryImpl::from_connection(conn.clone())),
            Arc::new(PaymentRepositoryImpl::from_connection(conn.clone())),
            Arc::new(ReceiptRepositoryImpl::from_connection(conn)),
        ))
    }
}
