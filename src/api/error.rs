// ==========================================
// 珠宝定价引擎 - API层错误类型
// ==========================================
// 职责: 把引擎/仓储错误收敛为面向管理端的错误分类
// 红线: 所有错误信息必须包含显式原因 (可解释性)
// ==========================================

use crate::engine::error::EngineError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ===== 实体缺失 =====
    #[error("资源未找到: {0}")]
    NotFound(String),

    // ===== 并发/重复冲突 =====
    #[error("并发冲突: {0}")]
    Conflict(String),

    // ===== 非法状态 =====
    #[error("非法状态: {0}")]
    InvalidState(String),

    // ===== 配置缺失 (可操作错误, 非零价) =====
    #[error("定价配置缺失: {0}")]
    ConfigurationMissing(String),

    // ===== 外部行情 =====
    #[error("上游行情不可用: {0}")]
    UpstreamUnavailable(String),

    // ===== 输入校验 =====
    #[error("无效输入: {0}")]
    InvalidInput(String),

    // ===== 数据访问 =====
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("内部错误: {0}")]
    InternalError(String),
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{} id={}", entity, id))
            }
            EngineError::DuplicateKey(key) => {
                ApiError::Conflict(format!("组件键重复: {}", key))
            }
            EngineError::Conflict(msg) => ApiError::Conflict(msg),
            EngineError::Protected(key) => {
                ApiError::InvalidState(format!("系统保护组件禁止删除: {}", key))
            }
            EngineError::ReferencedImmutable(key) => {
                ApiError::InvalidState(format!("组件已被引用, 键与计算方式不可变: {}", key))
            }
            EngineError::NotFreezable(key) => {
                ApiError::InvalidState(format!("组件不允许冻结: {}", key))
            }
            EngineError::NotFrozen(key) => {
                ApiError::InvalidState(format!("组件当前未冻结: {}", key))
            }
            EngineError::InvalidState(msg) => ApiError::InvalidState(msg),
            EngineError::ConfigurationMissing { node_id } => ApiError::ConfigurationMissing(
                format!("节点 {} 及其祖先链均未配置定价", node_id),
            ),
            EngineError::UpstreamUnavailable(msg) => ApiError::UpstreamUnavailable(msg),
            EngineError::InvalidInput(msg) => ApiError::InvalidInput(msg),
            EngineError::Repository(e) => e.into(),
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{} id={}", entity, id))
            }
            RepositoryError::OptimisticLockFailure { entity, id, .. } => {
                ApiError::Conflict(format!("{} id={} 已被并发修改", entity, id))
            }
            RepositoryError::UniqueConstraintViolation(msg) => ApiError::Conflict(msg),
            other => ApiError::DatabaseError(other.to_string()),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
