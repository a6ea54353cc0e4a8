// ==========================================
// 煤炭出口业务系统 - API层错误类型
// ==========================================
// 职责: 将 Repository / Engine 错误转换为面向操作员的错误消息
// 红线: 每条消息保留实体 ID 与数量（可解释性）
// ==========================================

use crate::engine::error::AllocationError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("容量不足: {0}")]
    CapacityExceeded(String),

    #[error("重复分配: {0}")]
    DuplicateMapping(String),

    // ==========================================
    // 并发 / 事务错误
    // ==========================================
    /// transient=true 表示锁竞争，可重试
    #[error("事务失败（已回滚）: {message}")]
    TransactionFailure { message: String, transient: bool },

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    #[error("数据验证失败: {0}")]
    ValidationError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::TransactionFailure { transient: true, .. })
    }
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::DatabaseTransactionError(msg) => ApiError::DatabaseTransactionError(msg),
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseBusy(msg) => ApiError::TransactionFailure {
                message: format!("数据库繁忙: {}", msg),
                transient: true,
            },
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::DuplicateMapping(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::InvalidInput(format!("外键约束违反: {}", msg))
            }
            RepositoryError::ValidationError(msg) => ApiError::ValidationError(msg),
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 AllocationError 转换
// ==========================================
impl From<AllocationError> for ApiError {
    fn from(err: AllocationError) -> Self {
        match err {
            AllocationError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            AllocationError::CapacityExceeded { .. } => ApiError::CapacityExceeded(err.to_string()),
            AllocationError::DuplicateMapping { .. } => ApiError::DuplicateMapping(err.to_string()),
            AllocationError::InvalidQuantity { .. } => ApiError::InvalidInput(err.to_string()),
            AllocationError::TransactionFailure { message, transient } => {
                ApiError::TransactionFailure { message, transient }
            }
            AllocationError::Repository(e) => ApiError::from(e),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
