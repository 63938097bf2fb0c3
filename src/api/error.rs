// ==========================================
// 保单数据批量导入 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换导入/仓储错误为调用方可读的错误消息
// ==========================================

use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 请求错误
    // ==========================================
    #[error("{0}")]
    InvalidInput(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    // ==========================================
    // 导入错误
    // ==========================================
    #[error("Import failed: {0}")]
    ImportFailed(String),

    #[error("Event stream closed: {0}")]
    StreamClosed(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 ImportError 转换
// 目的: 致命输入错误 → InvalidInput，其余按来源分类
// ==========================================
impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::EmptyInput
            | ImportError::CsvParseError(_)
            | ImportError::InvalidEntityKind(_)
            | ImportError::MissingMappings => ApiError::InvalidInput(err.to_string()),
            ImportError::SinkClosed(msg) => ApiError::StreamClosed(msg),
            ImportError::Repository(e) => ApiError::from(e),
            ImportError::Other(e) => ApiError::Other(e),
            other => ApiError::ImportFailed(other.to_string()),
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Other(e) => ApiError::Other(e),
            other => ApiError::DatabaseError(other.to_string()),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_input_maps_to_invalid_input() {
        let err: ApiError = ImportError::EmptyInput.into();
        assert!(matches!(err, ApiError::InvalidInput(_)));

        let err: ApiError = ImportError::InvalidEntityKind("claims".to_string()).into();
        assert_eq!(err.to_string(), "Invalid collection type: claims");
    }

    #[test]
    fn test_sink_and_repository_errors() {
        let err: ApiError = ImportError::SinkClosed("gone".to_string()).into();
        assert!(matches!(err, ApiError::StreamClosed(_)));

        let err: ApiError =
            ImportError::Repository(RepositoryError::LockError("poisoned".to_string())).into();
        assert!(matches!(err, ApiError::DatabaseError(_)));
    }
}
