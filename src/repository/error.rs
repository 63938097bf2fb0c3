// ==========================================
// 保单数据批量导入 - 仓储层错误类型
// ==========================================
// 工具: thiserror 派生宏
// ==========================================

use thiserror::Error;

/// 仓储层错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    // ===== 数据库错误 =====
    #[error("记录未找到: {entity} with id={id}")]
    NotFound { entity: String, id: String },

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库锁获取失败: {0}")]
    LockError(String),

    #[error("数据库查询失败: {0}")]
    DatabaseQueryError(String),

    #[error("唯一约束违反: {0}")]
    UniqueConstraintViolation(String),

    #[error("外键约束违反: {0}")]
    ForeignKeyViolation(String),

    // ===== 数据质量错误 =====
    #[error("字段值错误 (field={field}): {message}")]
    FieldValueError { field: String, message: String },

    // ===== 通用错误 =====
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RepositoryError {
    /// 是否为唯一约束冲突（Duplicate Guard 据此决定是否重试）
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, RepositoryError::UniqueConstraintViolation(_))
    }

    /// 行级错误消息中的英文描述
    pub fn row_detail(&self) -> String {
        match self {
            RepositoryError::NotFound { entity, id } => {
                format!("{} not found: \"{}\"", entity, id)
            }
            RepositoryError::DatabaseConnectionError(msg) => {
                format!("Database connection failed: {}", msg)
            }
            RepositoryError::LockError(msg) => format!("Database lock failed: {}", msg),
            RepositoryError::DatabaseQueryError(msg) => format!("Database write failed: {}", msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                format!("Unique constraint violated: {}", msg)
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                format!("Foreign key constraint violated: {}", msg)
            }
            RepositoryError::FieldValueError { field, message } => {
                format!("Invalid value for \"{}\": {}", field, message)
            }
            RepositoryError::Other(err) => err.to_string(),
        }
    }
}

// 实现 From<rusqlite::Error>
impl From<rusqlite::Error> for RepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(_, Some(msg)) => {
                if msg.contains("UNIQUE") {
                    RepositoryError::UniqueConstraintViolation(msg)
                } else if msg.contains("FOREIGN KEY") {
                    RepositoryError::ForeignKeyViolation(msg)
                } else {
                    RepositoryError::DatabaseQueryError(msg)
                }
            }
            rusqlite::Error::QueryReturnedNoRows => RepositoryError::NotFound {
                entity: "Unknown".to_string(),
                id: "Unknown".to_string(),
            },
            _ => RepositoryError::DatabaseQueryError(err.to_string()),
        }
    }
}

// 实现 From<serde_json::Error>（co_customer_ids 以 JSON 文本存储）
impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::FieldValueError {
            field: "json".to_string(),
            message: err.to_string(),
        }
    }
}

/// Result 类型别名
pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_unique_violation_classified() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (k TEXT UNIQUE); INSERT INTO t (k) VALUES ('a');")
            .unwrap();
        let err = conn
            .execute("INSERT INTO t (k) VALUES ('a')", [])
            .unwrap_err();

        let repo_err = RepositoryError::from(err);
        assert!(repo_err.is_unique_violation(), "got {:?}", repo_err);
    }

    #[test]
    fn test_no_rows_is_not_found() {
        let err = RepositoryError::from(rusqlite::Error::QueryReturnedNoRows);
        assert!(matches!(err, RepositoryError::NotFound { .. }));
        assert!(!err.is_unique_violation());
    }

    #[test]
    fn test_row_detail_is_english() {
        let err = RepositoryError::DatabaseQueryError("disk full".to_string());
        assert_eq!(err.row_detail(), "Database write failed: disk full");

        let err = RepositoryError::LockError("poisoned".to_string());
        assert_eq!(err.row_detail(), "Database lock failed: poisoned");
    }
}
