// ==========================================
// 保单数据批量导入 - 记录 Repository 实现
// ==========================================
// 职责: 实现四类实体数据访问（使用 rusqlite）
// 红线: Repository 不含业务规则，只做数据 CRUD
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::records::{Customer, Payment, Policy, PolicyBalance, Receipt};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::record_repo::{
    CustomerRepository, PaymentRepository, PolicyRepository, ReceiptRepository,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

fn lock_conn(conn: &Arc<Mutex<Connection>>) -> RepositoryResult<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|e| RepositoryError::LockError(e.to_string()))
}

// ==========================================
// 行映射
// ==========================================

const CUSTOMER_COLUMNS: &str = "id, first_name, middle_name, last_name, id_number, email, \
     phone, address, date_of_birth, created_at";

fn map_customer(row: &Row) -> rusqlite::Result<Customer> {
    Ok(Customer {
        id: row.get(0)?,
        first_name: row.get(1)?,
        middle_name: row.get(2)?,
        last_name: row.get(3)?,
        id_number: row.get(4)?,
        email: row.get(5)?,
        phone: row.get(6)?,
        address: row.get(7)?,
        date_of_birth: row.get(8)?,
        created_at: row.get(9)?,
    })
}

const POLICY_COLUMNS: &str = "id, policy_number, customer_id, co_customer_ids, policy_type, \
     insurer, start_date, end_date, auto_renew, total_premium_due, amount_paid, \
     outstanding_balance, status, created_at";

fn map_policy(row: &Row) -> rusqlite::Result<Policy> {
    let co_raw: String = row.get(3)?;
    let co_customer_ids: Vec<String> = serde_json::from_str(&co_raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;

    Ok(Policy {
        id: row.get(0)?,
        policy_number: row.get(1)?,
        customer_id: row.get(2)?,
        co_customer_ids,
        policy_type: row.get(4)?,
        insurer: row.get(5)?,
        start_date: row.get(6)?,
        end_date: row.get(7)?,
        auto_renew: row.get::<_, i32>(8)? != 0,
        total_premium_due: row.get(9)?,
        amount_paid: row.get(10)?,
        outstanding_balance: row.get(11)?,
        status: row.get(12)?,
        created_at: row.get(13)?,
    })
}

const PAYMENT_COLUMNS: &str = "id, policy_id, amount, refund_amount, payment_method, \
     payment_date, receipt_number, transaction_reference, notes, created_at";

fn map_payment(row: &Row) -> rusqlite::Result<Payment> {
    Ok(Payment {
        id: row.get(0)?,
        policy_id: row.get(1)?,
        amount: row.get(2)?,
        refund_amount: row.get(3)?,
        payment_method: row.get(4)?,
        payment_date: row.get(5)?,
        receipt_number: row.get(6)?,
        transaction_reference: row.get(7)?,
        notes: row.get(8)?,
        created_at: row.get(9)?,
    })
}

const RECEIPT_COLUMNS: &str = "id, receipt_number, payment_id, policy_id, customer_id, amount, \
     status, location, generated_at, created_at";

fn map_receipt(row: &Row) -> rusqlite::Result<Receipt> {
    Ok(Receipt {
        id: row.get(0)?,
        receipt_number: row.get(1)?,
        payment_id: row.get(2)?,
        policy_id: row.get(3)?,
        customer_id: row.get(4)?,
        amount: row.get(5)?,
        status: row.get(6)?,
        location: row.get(7)?,
        generated_at: row.get(8)?,
        created_at: row.get(9)?,
    })
}

// ==========================================
// CustomerRepositoryImpl
// ==========================================
pub struct CustomerRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl CustomerRepositoryImpl {
    /// 创建新的 Repository 实例
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建（与其它仓储共享同一连接）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn query_one(&self, where_clause: &str, value: &str) -> RepositoryResult<Option<Customer>> {
        let conn = lock_conn(&self.conn)?;
        let sql = format!(
            "SELECT {} FROM customers WHERE {} ORDER BY rowid ASC LIMIT 1",
            CUSTOMER_COLUMNS, where_clause
        );
        let customer = conn
            .query_row(&sql, params![value], map_customer)
            .optional()?;
        Ok(customer)
    }
}

#[async_trait]
impl CustomerRepository for CustomerRepositoryImpl {
    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Customer>> {
        self.query_one("id = ?1", id)
    }

    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<Customer>> {
        self.query_one("email = ?1 COLLATE NOCASE", email)
    }

    async fn find_by_id_number(&self, id_number: &str) -> RepositoryResult<Option<Customer>> {
        self.query_one("id_number = ?1", id_number)
    }

    async fn id_number_exists(&self, id_number: &str) -> RepositoryResult<bool> {
        let conn = lock_conn(&self.conn)?;
        let found = conn
            .query_row(
                "SELECT 1 FROM customers WHERE id_number = ?1 LIMIT 1",
                params![id_number],
                |_row| Ok(true),
            )
            .optional()?;
        Ok(found.unwrap_or(false))
    }

    async fn insert(&self, customer: &Customer) -> RepositoryResult<()> {
        let conn = lock_conn(&self.conn)?;
        conn.execute(
            r#"
            INSERT INTO customers (
                id, first_name, middle_name, last_name, id_number, email,
                phone, address, date_of_birth, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                customer.id,
                customer.first_name,
                customer.middle_name,
                customer.last_name,
                customer.id_number,
                customer.email,
                customer.phone,
                customer.address,
                customer.date_of_birth,
                customer.created_at,
            ],
        )?;
        Ok(())
    }
}

// ==========================================
// PolicyRepositoryImpl
// ==========================================
pub struct PolicyRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl PolicyRepositoryImpl {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn query_one(&self, where_clause: &str, value: &str) -> RepositoryResult<Option<Policy>> {
        let conn = lock_conn(&self.conn)?;
        let sql = format!(
            "SELECT {} FROM policies WHERE {} ORDER BY rowid ASC LIMIT 1",
            POLICY_COLUMNS, where_clause
        );
        let policy = conn.query_row(&sql, params![value], map_policy).optional()?;
        Ok(policy)
    }
}

#[async_trait]
impl PolicyRepository for PolicyRepositoryImpl {
    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Policy>> {
        self.query_one("id = ?1", id)
    }

    async fn find_by_policy_number(
        &self,
        policy_number: &str,
    ) -> RepositoryResult<Option<Policy>> {
        self.query_one("policy_number = ?1", policy_number)
    }

    async fn policy_number_exists(&self, policy_number: &str) -> RepositoryResult<bool> {
        let conn = lock_conn(&self.conn)?;
        let found = conn
            .query_row(
                "SELECT 1 FROM policies WHERE policy_number = ?1 LIMIT 1",
                params![policy_number],
                |_row| Ok(true),
            )
            .optional()?;
        Ok(found.unwrap_or(false))
    }

    async fn insert(&self, policy: &Policy) -> RepositoryResult<()> {
        let co_customer_ids = serde_json::to_string(&policy.co_customer_ids)?;
        let conn = lock_conn(&self.conn)?;
        conn.execute(
            r#"
            INSERT INTO policies (
                id, policy_number, customer_id, co_customer_ids, policy_type, insurer,
                start_date, end_date, auto_renew, total_premium_due, amount_paid,
                outstanding_balance, status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
            params![
                policy.id,
                policy.policy_number,
                policy.customer_id,
                co_customer_ids,
                policy.policy_type,
                policy.insurer,
                policy.start_date,
                policy.end_date,
                policy.auto_renew as i32,
                policy.total_premium_due,
                policy.amount_paid,
                policy.outstanding_balance,
                policy.status,
                policy.created_at,
                policy.created_at,
            ],
        )?;
        Ok(())
    }

    async fn update_balance(
        &self,
        id: &str,
        balance: &PolicyBalance,
        updated_at: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        let conn = lock_conn(&self.conn)?;
        let updated = conn.execute(
            r#"
            UPDATE policies
            SET amount_paid = ?1, outstanding_balance = ?2, updated_at = ?3
            WHERE id = ?4
            "#,
            params![
                balance.amount_paid,
                balance.outstanding_balance,
                updated_at,
                id
            ],
        )?;

        if updated == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Policy".to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn drop_policy_number_unique_index(&self) -> RepositoryResult<Vec<String>> {
        let conn = lock_conn(&self.conn)?;

        // sql 为 NULL 的是列级 UNIQUE 生成的 autoindex，无法 DROP
        let mut stmt = conn.prepare(
            "SELECT name, sql FROM sqlite_master WHERE type = 'index' AND tbl_name = 'policies'",
        )?;
        let indexes: Vec<(String, Option<String>)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        drop(stmt);

        let mut dropped = Vec::new();
        for (name, sql) in indexes {
            match sql {
                Some(sql) => {
                    let upper = sql.to_uppercase();
                    if upper.contains("UNIQUE") && upper.contains("POLICY_NUMBER") {
                        conn.execute_batch(&format!("DROP INDEX IF EXISTS \"{}\"", name))?;
                        info!(index = %name, "已删除保单号唯一索引");
                        dropped.push(name);
                    }
                }
                None => {
                    if name.starts_with("sqlite_autoindex_policies") {
                        warn!(index = %name, "存在无法删除的列级唯一约束");
                    }
                }
            }
        }

        Ok(dropped)
    }
}

// ==========================================
// PaymentRepositoryImpl
// ==========================================
pub struct PaymentRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl PaymentRepositoryImpl {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn query_one(&self, where_clause: &str, value: &str) -> RepositoryResult<Option<Payment>> {
        let conn = lock_conn(&self.conn)?;
        let sql = format!(
            "SELECT {} FROM payments WHERE {} ORDER BY rowid ASC LIMIT 1",
            PAYMENT_COLUMNS, where_clause
        );
        let payment = conn.query_row(&sql, params![value], map_payment).optional()?;
        Ok(payment)
    }
}

#[async_trait]
impl PaymentRepository for PaymentRepositoryImpl {
    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Payment>> {
        self.query_one("id = ?1", id)
    }

    async fn find_by_receipt_number(
        &self,
        receipt_number: &str,
    ) -> RepositoryResult<Option<Payment>> {
        self.query_one("receipt_number = ?1", receipt_number)
    }

    async fn receipt_number_exists(&self, receipt_number: &str) -> RepositoryResult<bool> {
        let conn = lock_conn(&self.conn)?;
        let found = conn
            .query_row(
                "SELECT 1 FROM payments WHERE receipt_number = ?1 LIMIT 1",
                params![receipt_number],
                |_row| Ok(true),
            )
            .optional()?;
        Ok(found.unwrap_or(false))
    }

    async fn insert(&self, payment: &Payment) -> RepositoryResult<()> {
        let conn = lock_conn(&self.conn)?;
        conn.execute(
            r#"
            INSERT INTO payments (
                id, policy_id, amount, refund_amount, payment_method, payment_date,
                receipt_number, transaction_reference, notes, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                payment.id,
                payment.policy_id,
                payment.amount,
                payment.refund_amount,
                payment.payment_method,
                payment.payment_date,
                payment.receipt_number,
                payment.transaction_reference,
                payment.notes,
                payment.created_at,
            ],
        )?;
        Ok(())
    }
}

// ==========================================
// ReceiptRepositoryImpl
// ==========================================
pub struct ReceiptRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl ReceiptRepositoryImpl {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl ReceiptRepository for ReceiptRepositoryImpl {
    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Receipt>> {
        let conn = lock_conn(&self.conn)?;
        let sql = format!("SELECT {} FROM receipts WHERE id = ?1", RECEIPT_COLUMNS);
        let receipt = conn.query_row(&sql, params![id], map_receipt).optional()?;
        Ok(receipt)
    }

    async fn receipt_number_exists(&self, receipt_number: &str) -> RepositoryResult<bool> {
        let conn = lock_conn(&self.conn)?;
        let found = conn
            .query_row(
                "SELECT 1 FROM receipts WHERE receipt_number = ?1 LIMIT 1",
                params![receipt_number],
                |_row| Ok(true),
            )
            .optional()?;
        Ok(found.unwrap_or(false))
    }

    async fn insert(&self, receipt: &Receipt) -> RepositoryResult<()> {
        let conn = lock_conn(&self.conn)?;
        conn.execute(
            r#"
            INSERT INTO receipts (
                id, receipt_number, payment_id, policy_id, customer_id, amount,
                status, location, generated_at, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                receipt.id,
                receipt.receipt_number,
                receipt.payment_id,
                receipt.policy_id,
                receipt.customer_id,
                receipt.amount,
                receipt.status,
                receipt.location,
                receipt.generated_at,
                receipt.created_at,
            ],
        )?;
        Ok(())
    }
}
