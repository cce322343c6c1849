// ==========================================
// 珠宝定价引擎 - 价格组件领域模型
// ==========================================
// 红线: 组件键一旦被定价配置或历史订单引用, 键与计算方式不可变
// 红线: is_frozen=true 时 frozen_value 必须非空
// ==========================================

use crate::domain::types::{CalculationKind, PercentageBase};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 金属成本组件的固定键 (系统组件, 计算时使用实时金价作为系数)
pub const METAL_COST_KEY: &str = "metal_cost";

// ==========================================
// PriceComponentDefinition - 价格组件定义
// ==========================================
// 用途: 组件注册表条目, 所有定价配置从此实例化
// 生命周期: 种子数据或管理员创建; 被历史引用后只允许软删除
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceComponentDefinition {
    // ===== 主键 =====
    pub component_key: String, // 稳定键 (全局唯一, 被引用后不可变)

    // ===== 展示信息 =====
    pub display_name: String, // 展示名称 (如 "金属成本" / "工费" / "消费税")
    pub display_order: i32,   // 默认展示/计算顺序

    // ===== 计算语义 =====
    pub calculation_kind: CalculationKind, // 计算方式 (被引用后不可变)
    pub default_value: f64,                // 默认系数/百分比/固定金额
    pub percentage_base: PercentageBase,   // 百分比基数 (仅 PERCENTAGE 生效)

    // ===== 控制标志 =====
    pub is_system: bool,    // 系统保护组件 (禁止删除)
    pub is_freezable: bool, // 是否允许冻结
    pub is_active: bool,    // false = 已软删除/停用
    pub is_visible: bool,   // false = 金额折入金属成本行展示

    // ===== 审计字段 =====
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PriceComponentDefinition {
    /// 是否为指定的金属成本组件
    pub fn is_metal_cost(&self) -> bool {
        self.component_key == METAL_COST_KEY
    }
}

// ==========================================
// ComponentConfig - 组件实例化配置
// ==========================================
// 用途: 内嵌于 PricingProfile 的逐配置实例, 值可偏离定义默认值
// 红线: 解冻必须精确还原冻结前的计算方式与值 (original_* 快照)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentConfig {
    // ===== 关联定义 =====
    pub component_key: String, // 关联 price_component.component_key
    pub display_name: String,  // 冗余展示名 (配置时快照)

    // ===== 生效计算语义 (可偏离定义默认) =====
    pub calculation_kind: CalculationKind,
    pub value: f64,                      // 系数/百分比/固定金额 (金属成本组件忽略此值, 用实时金价)
    pub percentage_base: PercentageBase, // 仅 PERCENTAGE 生效

    // ===== 冻结状态 =====
    pub is_frozen: bool,
    pub frozen_value: Option<f64>, // 冻结时钉住的计算结果 (is_frozen=true 时必须非空)
    pub original_kind: Option<CalculationKind>, // 冻结前计算方式快照 (可逆还原)
    pub original_value: Option<f64>, // 冻结前值快照
    pub frozen_at: Option<DateTime<Utc>>, // 冻结时刻
    pub rate_at_freeze: Option<f64>, // 冻结时使用的金价 (审计)
    pub freeze_reason: Option<String>, // 冻结原因 (子类目级必填)
    pub frozen_by: Option<String>,   // 冻结操作人

    // ===== 控制标志 (配置时自定义快照) =====
    pub is_freezable: bool,
    pub is_active: bool,
    pub is_visible: bool,
    pub sort_order: i32, // 计算顺序 (运行小计按此序累计)
}

impl ComponentConfig {
    /// 从注册表定义实例化一份配置 (值取定义默认)
    pub fn from_definition(def: &PriceComponentDefinition) -> Self {
        Self {
            component_key: def.component_key.clone(),
            display_name: def.display_name.clone(),
            calculation_kind: def.calculation_kind,
            value: def.default_value,
            percentage_base: def.percentage_base,
            is_frozen: false,
            frozen_value: None,
            original_kind: None,
            original_value: None,
            frozen_at: None,
            rate_at_freeze: None,
            freeze_reason: None,
            frozen_by: None,
            is_freezable: def.is_freezable,
            is_active: def.is_active,
            is_visible: def.is_visible,
            sort_order: def.display_order,
        }
    }

    /// 是否为金属成本组件
    pub fn is_metal_cost(&self) -> bool {
        self.component_key == METAL_COST_KEY
    }

    /// 清空全部冻结状态字段 (解冻时调用, 调用方负责先还原 original_* 快照)
    pub fn clear_freeze_state(&mut self) {
        self.is_frozen = false;
        self.frozen_value = None;
        self.original_kind = None;
        self.original_value = None;
        self.frozen_at = None;
        self.rate_at_freeze = None;
        self.freeze_reason = None;
        self.frozen_by = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_definition() -> PriceComponentDefinition {
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
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_from_definition_copies_defaults() {
        let def = sample_definition();
        let config = ComponentConfig::from_definition(&def);
        assert_eq!(config.component_key, "making_charge");
        assert_eq!(config.calculation_kind, CalculationKind::Percentage);
        assert_eq!(config.value, 15.0);
        assert!(!config.is_frozen);
        assert!(config.frozen_value.is_none());
        assert_eq!(config.sort_order, 2);
    }

    #[test]
    fn test_clear_freeze_state() {
        let def = sample_definition();
        let mut config = ComponentConfig::from_definition(&def);
        config.is_frozen = true;
        config.frozen_value = Some(23250.0);
        config.original_kind = Some(CalculationKind::Percentage);
        config.original_value = Some(15.0);
        config.freeze_reason = Some("促销锁价".to_string());

        config.clear_freeze_state();
        assert!(!config.is_frozen);
        assert!(config.frozen_value.is_none());
        assert!(config.original_kind.is_none());
        assert!(config.freeze_reason.is_none());
    }
}
