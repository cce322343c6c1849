// ==========================================
// 珠宝定价引擎 - 价格组件 API
// ==========================================
// 职责: 组件注册表管理入口 (注册/查询/修改/删除)
// ==========================================

use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::domain::audit::{AuditAction, AuditEvent};
use crate::domain::component::PriceComponentDefinition;
use crate::engine::registry::{ComponentRegistry, DeleteOutcome};
use crate::repository::audit_repo::AuditLogRepository;

/// 组件API
///
/// 职责：
/// 1. 组件定义的增删改查
/// 2. 输入校验 (键格式、取值范围)
/// 3. 审计记录
pub struct ComponentApi {
    registry: Arc<ComponentRegistry>,
    audit_repo: Arc<AuditLogRepository>,
}

impl ComponentApi {
    pub fn new(registry: Arc<ComponentRegistry>, audit_repo: Arc<AuditLogRepository>) -> Self {
        Self {
            registry,
            audit_repo,
        }
    }

    /// 注册新组件
    #[instrument(skip(self, def), fields(component_key = %def.component_key))]
    pub fn register(&self, def: &PriceComponentDefinition, actor: &str) -> ApiResult<()> {
        Self::validate_definition(def)?;
        self.registry.register(def)?;
        self.record_audit(AuditEvent::new(
            AuditAction::ComponentRegister,
            "PriceComponent",
            &def.component_key,
            actor,
        ));
        info!(component_key = %def.component_key, "注册价格组件");
        Ok(())
    }

    /// 查询单个组件定义
    pub fn get(&self, component_key: &str) -> ApiResult<PriceComponentDefinition> {
        Ok(self.registry.get(component_key)?)
    }

    /// 列出组件定义 (可含停用)
    pub fn list(&self, include_inactive: bool) -> ApiResult<Vec<PriceComponentDefinition>> {
        Ok(self.registry.list(include_inactive)?)
    }

    /// 修改组件定义 (被引用后 key 与计算方式不可变)
    #[instrument(skip(self, def), fields(component_key = %def.component_key))]
    pub fn update(&self, def: &PriceComponentDefinition, actor: &str) -> ApiResult<()> {
        Self::validate_definition(def)?;
        self.registry.update(def)?;
        self.record_audit(AuditEvent::new(
            AuditAction::ComponentUpdate,
            "PriceComponent",
            &def.component_key,
            actor,
        ));
        Ok(())
    }

    /// 删除组件: 系统组件拒绝, 被引用则软删除
    #[instrument(skip(self), fields(component_key = %component_key))]
    pub fn delete(&self, component_key: &str, actor: &str) -> ApiResult<DeleteOutcome> {
        let outcome = self.registry.delete(component_key)?;
        self.record_audit(
            AuditEvent::new(
                AuditAction::ComponentDelete,
                "PriceComponent",
                component_key,
                actor,
            )
            .with_detail(match outcome {
                DeleteOutcome::HardDeleted => "硬删除",
                DeleteOutcome::SoftDeleted => "软删除 (仍被引用)",
            }),
        );
        Ok(outcome)
    }

    fn validate_definition(def: &PriceComponentDefinition) -> ApiResult<()> {
        let key = def.component_key.trim();
        if key.is_empty() {
            return Err(ApiError::InvalidInput("组件键不能为空".to_string()));
        }
        if !key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(ApiError::InvalidInput(format!(
                "组件键只允许小写字母/数字/下划线: {}",
                key
            )));
        }
        if def.display_name.trim().is_empty() {
            return Err(ApiError::InvalidInput("组件名称不能为空".to_string()));
        }
        if def.default_value < 0.0 {
            return Err(ApiError::InvalidInput("组件默认值不能为负".to_string()));
        }
        Ok(())
    }

    fn record_audit(&self, event: AuditEvent) {
        if let Err(e) = self.audit_repo.record(&event) {
            warn!(error = %e, "审计日志写入失败");
        }
    }
}
