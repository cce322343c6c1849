// ==========================================
// 珠宝定价引擎 - 引擎层错误类型
// ==========================================
// 错误分类: NotFound / Conflict / InvalidState / ConfigurationMissing / UpstreamUnavailable
// 红线: 继承解析找不到任何配置必须显式报错, 不得静默输出零价
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 引擎层错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    // ===== 实体缺失 =====
    #[error("未找到: {entity} id={id}")]
    NotFound { entity: String, id: String },

    // ===== 并发/重复冲突 =====
    #[error("组件键重复: {0}")]
    DuplicateKey(String),

    #[error("并发冲突: {0}")]
    Conflict(String),

    // ===== 非法状态 =====
    #[error("系统保护组件禁止删除: {0}")]
    Protected(String),

    #[error("组件已被引用, 键与计算方式不可变: {0}")]
    ReferencedImmutable(String),

    #[error("组件不允许冻结: {0}")]
    NotFreezable(String),

    #[error("组件当前未冻结: {0}")]
    NotFrozen(String),

    #[error("非法状态: {0}")]
    InvalidState(String),

    // ===== 配置缺失 (显式可操作错误, 非零价) =====
    #[error("定价配置缺失: 节点 {node_id} 及其祖先链均未配置")]
    ConfigurationMissing { node_id: String },

    // ===== 外部行情 =====
    #[error("上游行情不可用: {0}")]
    UpstreamUnavailable(String),

    // ===== 输入校验 =====
    #[error("无效输入: {0}")]
    InvalidInput(String),

    // ===== 仓储透传 =====
    #[error(transparent)]
    Repository(RepositoryError),
}

// 仓储错误映射: 乐观锁冲突/唯一约束收敛为引擎语义, 其余透传
impl From<RepositoryError> for EngineError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::OptimisticLockFailure { entity, id, expected, actual } => {
                EngineError::Conflict(format!(
                    "{} id={} 已被并发修改 (expected_revision={}, actual_revision={})",
                    entity, id, expected, actual
                ))
            }
            RepositoryError::NotFound { entity, id } => EngineError::NotFound { entity, id },
            other => EngineError::Repository(other),
        }
    }
}

/// Result 类型别名
pub type EngineResult<T> = Result<T, EngineError>;
