// ==========================================
// 珠宝定价引擎 - 价格组件注册表
// ==========================================
// 红线: 键全局唯一; 被定价配置或历史订单引用后, 键与计算方式不可变
// 红线: 系统组件禁止删除; 被引用组件删除降级为软删除 (保留历史可读性)
// ==========================================

use crate::domain::component::PriceComponentDefinition;
use crate::engine::error::{EngineError, EngineResult};
use crate::repository::{PriceComponentRepository, RepositoryError};
use std::sync::Arc;
use tracing::info;

/// 删除结果 (调用方据此提示管理员)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    HardDeleted, // 从未被引用, 物理删除
    SoftDeleted, // 已被引用, 仅隐藏
}

/// 价格组件注册表
///
/// 职责:
/// 1. 组件定义的注册/查询/更新
/// 2. 保护与引用守卫 (Protected / InUse / 引用后不可变)
pub struct ComponentRegistry {
    component_repo: Arc<PriceComponentRepository>,
}

impl ComponentRegistry {
    pub fn new(component_repo: Arc<PriceComponentRepository>) -> Self {
        Self { component_repo }
    }

    /// 注册新组件 (键重复报 DuplicateKey)
    pub fn register(&self, def: &PriceComponentDefinition) -> EngineResult<()> {
        if def.component_key.trim().is_empty() {
            return Err(EngineError::InvalidInput("组件键不能为空".to_string()));
        }
        match self.component_repo.insert(def) {
            Ok(()) => {
                info!(component_key = %def.component_key, "注册价格组件");
                Ok(())
            }
            Err(RepositoryError::UniqueConstraintViolation(_)) => {
                Err(EngineError::DuplicateKey(def.component_key.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// 查询组件定义
    pub fn get(&self, key: &str) -> EngineResult<PriceComponentDefinition> {
        self.component_repo
            .find_by_key(key)?
            .ok_or_else(|| EngineError::NotFound {
                entity: "PriceComponentDefinition".to_string(),
                id: key.to_string(),
            })
    }

    /// 列出组件定义
    pub fn list(&self, include_inactive: bool) -> EngineResult<Vec<PriceComponentDefinition>> {
        Ok(self.component_repo.list_all(include_inactive)?)
    }

    /// 更新组件定义
    ///
    /// 守卫: 组件一旦被任何定价配置或历史订单引用, 计算方式不可变
    /// (键为主键本就不可改)。展示名/默认值/顺序/标志仍可调整。
    pub fn update(&self, def: &PriceComponentDefinition) -> EngineResult<()> {
        let existing = self.get(&def.component_key)?;
        if def.calculation_kind != existing.calculation_kind && self.is_referenced(&def.component_key)? {
            return Err(EngineError::ReferencedImmutable(def.component_key.clone()));
        }
        self.component_repo.update(def)?;
        Ok(())
    }

    /// 删除组件
    ///
    /// - 系统组件: 报 Protected
    /// - 已被引用: 降级为软删除并成功返回 (历史订单/配置仍可读)
    /// - 未被引用: 物理删除
    pub fn delete(&self, key: &str) -> EngineResult<DeleteOutcome> {
        let def = self.get(key)?;
        if def.is_system {
            return Err(EngineError::Protected(key.to_string()));
        }

        if self.is_referenced(key)? {
            self.component_repo.soft_delete(key)?;
            info!(component_key = %key, "组件已被引用, 执行软删除");
            return Ok(DeleteOutcome::SoftDeleted);
        }

        self.component_repo.hard_delete(key)?;
        info!(component_key = %key, "组件未被引用, 物理删除");
        Ok(DeleteOutcome::HardDeleted)
    }

    /// 组件是否被定价配置或历史订单引用
    pub fn is_referenced(&self, key: &str) -> EngineResult<bool> {
        let profile_refs = self.component_repo.count_profile_references(key)?;
        if profile_refs > 0 {
            return Ok(true);
        }
        let order_refs = self.component_repo.count_order_references(key)?;
        Ok(order_refs > 0)
    }
}

// ==========================================
// 系统组件种子
// ==========================================

/// 幂等安装系统保护组件 (metal_cost / making_charge / wastage / gst)
pub fn seed_system_components(registry: &ComponentRegistry) -> EngineResult<()> {
    use crate::domain::component::METAL_COST_KEY;
    use crate::domain::types::{CalculationKind, PercentageBase};
    use chrono::Utc;

    let now = Utc::now();
    let defaults = [
        PriceComponentDefinition {
            component_key: METAL_COST_KEY.to_string(),
            display_name: "金属成本".to_string(),
            display_order: 1,
            calculation_kind: CalculationKind::PerWeight,
            default_value: 0.0, // 金属成本组件用实时金价, 系数无意义
            percentage_base: PercentageBase::MetalCost,
            is_system: true,
            is_freezable: true, // 金价锁定 (冻结即钉住当前金属成本)
            is_active: true,
            is_visible: true,
            created_at: now,
            updated_at: now,
        },
        PriceComponentDefinition {
            component_key: "making_charge".to_string(),
            display_name: "工费".to_string(),
            display_order: 2,
            calculation_kind: CalculationKind::Percentage,
            default_value: 15.0,
            percentage_base: PercentageBase::MetalCost,
            is_system: true,
            is_freezable: true,
            is_active: true,
            is_visible: true,
            created_at: now,
            updated_at: now,
        },
        PriceComponentDefinition {
            component_key: "wastage".to_string(),
            display_name: "损耗".to_string(),
            display_order: 3,
            calculation_kind: CalculationKind::Percentage,
            default_value: 2.0,
            percentage_base: PercentageBase::MetalCost,
            is_system: true,
            is_freezable: true,
            is_active: true,
            is_visible: false, // 损耗默认折入金属成本行展示
            created_at: now,
            updated_at: now,
        },
        PriceComponentDefinition {
            component_key: "gst".to_string(),
            display_name: "消费税".to_string(),
            display_order: 10,
            calculation_kind: CalculationKind::Percentage,
            default_value: 3.0,
            percentage_base: PercentageBase::RunningSubtotal,
            is_system: true,
            is_freezable: false,
            is_active: true,
            is_visible: true,
            created_at: now,
            updated_at: now,
        },
    ];

    for def in defaults {
        match registry.register(&def) {
            Ok(()) | Err(EngineError::DuplicateKey(_)) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
