// ==========================================
// 珠宝定价引擎 - 冻结控制器
// ==========================================
// 状态机: LIVE → FROZEN → LIVE
// 红线: 冻结前快照 original_* 字段, 解冻必须精确还原
// 红线: 解冻后立即重算返回新值 (价格不得静默陈旧)
// 红线: 读-改-写经 revision 乐观锁, 并发冲突报错而非覆盖
// 审计: 子类目级冻结/解冻必须填写原因; 商品级允许为空
// ==========================================

use crate::domain::pricing::CalculationContext;
use crate::domain::profile::ProfileOwner;
use crate::engine::calculator::BreakdownCalculator;
use crate::engine::error::{EngineError, EngineResult};
use crate::repository::PricingProfileRepository;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument};

/// 冻结/解冻操作结果
#[derive(Debug, Clone)]
pub struct FreezeOutcome {
    pub component_key: String,
    pub value: f64,        // 冻结值 / 解冻后重算值
    pub rate_used: f64,    // 本次计算使用的金价
    pub profile_revision: i32, // 落库后的配置版本号
}

/// 冻结控制器
pub struct FreezeController {
    profile_repo: Arc<PricingProfileRepository>,
}

impl FreezeController {
    pub fn new(profile_repo: Arc<PricingProfileRepository>) -> Self {
        Self { profile_repo }
    }

    /// 冻结组件: 用当前上下文计算值并钉住
    #[instrument(skip(self, ctx, reason), fields(component_key = %component_key))]
    pub fn freeze(
        &self,
        owner: &ProfileOwner,
        component_key: &str,
        ctx: &CalculationContext,
        reason: Option<&str>,
        actor: &str,
    ) -> EngineResult<FreezeOutcome> {
        if owner.kind.requires_freeze_reason()
            && reason.map(|r| r.trim().is_empty()).unwrap_or(true)
        {
            return Err(EngineError::InvalidInput(
                "子类目级冻结必须填写原因".to_string(),
            ));
        }

        let mut profile = self
            .profile_repo
            .find_by_owner(owner)?
            .ok_or_else(|| EngineError::NotFound {
                entity: "PricingProfile".to_string(),
                id: format!("{}:{}", owner.kind, owner.owner_id),
            })?;
        let expected_revision = profile.revision;

        // 冻结前用完整配置计算该组件当前值 (百分比组件依赖运行小计)
        let breakdown = BreakdownCalculator::calculate(&profile.components, ctx);
        let current_value = breakdown
            .component_value(component_key)
            .ok_or_else(|| EngineError::NotFound {
                entity: "ComponentConfig".to_string(),
                id: component_key.to_string(),
            })?;

        let component = profile
            .find_component_mut(component_key)
            .ok_or_else(|| EngineError::NotFound {
                entity: "ComponentConfig".to_string(),
                id: component_key.to_string(),
            })?;
        if !component.is_freezable {
            return Err(EngineError::NotFreezable(component_key.to_string()));
        }
        if component.is_frozen {
            return Err(EngineError::InvalidState(format!(
                "组件 {} 已处于冻结状态",
                component_key
            )));
        }

        // 快照冻结前计算语义, 保证解冻可逆
        component.original_kind = Some(component.calculation_kind);
        component.original_value = Some(component.value);
        component.is_frozen = true;
        component.frozen_value = Some(current_value);
        component.frozen_at = Some(Utc::now());
        component.rate_at_freeze = Some(breakdown.rate_used);
        component.freeze_reason = reason.map(|r| r.to_string());
        component.frozen_by = Some(actor.to_string());

        profile.updated_by = Some(actor.to_string());
        let new_revision = self.profile_repo.update_checked(&profile, expected_revision)?;

        info!(
            owner_kind = %owner.kind,
            owner_id = %owner.owner_id,
            component_key = %component_key,
            frozen_value = %current_value,
            "组件冻结"
        );
        Ok(FreezeOutcome {
            component_key: component_key.to_string(),
            value: current_value,
            rate_used: breakdown.rate_used,
            profile_revision: new_revision,
        })
    }

    /// 解冻组件: 还原冻结前计算语义并立即重算
    #[instrument(skip(self, ctx), fields(component_key = %component_key))]
    pub fn unfreeze(
        &self,
        owner: &ProfileOwner,
        component_key: &str,
        ctx: &CalculationContext,
        actor: &str,
    ) -> EngineResult<FreezeOutcome> {
        let mut profile = self
            .profile_repo
            .find_by_owner(owner)?
            .ok_or_else(|| EngineError::NotFound {
                entity: "PricingProfile".to_string(),
                id: format!("{}:{}", owner.kind, owner.owner_id),
            })?;
        let expected_revision = profile.revision;

        let component = profile
            .find_component_mut(component_key)
            .ok_or_else(|| EngineError::NotFound {
                entity: "ComponentConfig".to_string(),
                id: component_key.to_string(),
            })?;
        if !component.is_frozen {
            return Err(EngineError::NotFrozen(component_key.to_string()));
        }

        // 精确还原冻结前快照
        if let Some(kind) = component.original_kind {
            component.calculation_kind = kind;
        }
        if let Some(value) = component.original_value {
            component.value = value;
        }
        component.clear_freeze_state();

        // 解冻后立即重算, 返回新值供调用方展示/落库
        let breakdown = BreakdownCalculator::calculate(&profile.components, ctx);
        let new_value = breakdown
            .component_value(component_key)
            .unwrap_or(0.0);

        profile.updated_by = Some(actor.to_string());
        let new_revision = self.profile_repo.update_checked(&profile, expected_revision)?;

        info!(
            owner_kind = %owner.kind,
            owner_id = %owner.owner_id,
            component_key = %component_key,
            new_value = %new_value,
            "组件解冻并重算"
        );
        Ok(FreezeOutcome {
            component_key: component_key.to_string(),
            value: new_value,
            rate_used: breakdown.rate_used,
            profile_revision: new_revision,
        })
    }
}
