// ==========================================
// 保单数据批量导入 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 分级: 致命错误（整批中止） / 行级错误（跳过该行）
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 致命输入错误（整批中止）=====
    #[error("CSV file is empty or has no header row")]
    EmptyInput,

    #[error("CSV parse failed: {0}")]
    CsvParseError(String),

    #[error("Invalid collection type: {0}")]
    InvalidEntityKind(String),

    #[error("Field mappings are missing")]
    MissingMappings,

    #[error("配置读取失败 (key: {key}): {message}")]
    ConfigError { key: String, message: String },

    // ===== 行级错误（跳过该行，批次继续）=====
    #[error("Row {row}: {message}")]
    RowResolution { row: usize, message: String },

    #[error("Row {row}: {message}")]
    RowPersistence { row: usize, message: String },

    #[error("Row {row}: {message} (policy {policy_id} balance was already updated)")]
    PartialAggregate {
        row: usize,
        policy_id: String,
        message: String,
    },

    // ===== 输出通道 =====
    #[error("进度流已关闭: {0}")]
    SinkClosed(String),

    // ===== 数据库错误 =====
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    // ===== 通用错误 =====
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ImportError {
    /// 是否为行级错误（不中止批次）
    pub fn is_row_error(&self) -> bool {
        matches!(
            self,
            ImportError::RowResolution { .. }
                | ImportError::RowPersistence { .. }
                | ImportError::PartialAggregate { .. }
        )
    }

    /// 是否为致命错误（整批中止）
    pub fn is_fatal(&self) -> bool {
        !self.is_row_error()
    }

    /// 行级错误的展示行号
    pub fn row(&self) -> Option<usize> {
        match self {
            ImportError::RowResolution { row, .. }
            | ImportError::RowPersistence { row, .. }
            | ImportError::PartialAggregate { row, .. } => Some(*row),
            _ => None,
        }
    }

    /// 行级错误消息中的英文描述（仓储错误不带中文前缀）
    pub fn row_detail(&self) -> String {
        match self {
            ImportError::Repository(err) => err.row_detail(),
            ImportError::RowResolution { message, .. }
            | ImportError::RowPersistence { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

// 实现 From<rusqlite::Error>
impl From<rusqlite::Error> for ImportError {
    fn from(err: rusqlite::Error) -> Self {
        ImportError::Repository(RepositoryError::from(err))
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
