// ==========================================
// 珠宝定价引擎 - 定价配置领域模型
// ==========================================
// 红线: 每个归属者 (子类目/商品/变体) 至多一份配置
// 红线: revision 乐观锁, 冻结/解冻的读-改-写冲突必须报错而非覆盖
// ==========================================

use crate::domain::component::ComponentConfig;
use crate::domain::types::ProfileOwnerKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==========================================
// ProfileOwner - 配置归属者
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProfileOwner {
    pub kind: ProfileOwnerKind,
    pub owner_id: String,
}

impl ProfileOwner {
    pub fn subcategory(id: &str) -> Self {
        Self {
            kind: ProfileOwnerKind::Subcategory,
            owner_id: id.to_string(),
        }
    }

    pub fn product(id: &str) -> Self {
        Self {
            kind: ProfileOwnerKind::Product,
            owner_id: id.to_string(),
        }
    }

    pub fn variant(id: &str) -> Self {
        Self {
            kind: ProfileOwnerKind::Variant,
            owner_id: id.to_string(),
        }
    }
}

// ==========================================
// PricingProfile - 定价配置
// ==========================================
// 用途: 有序组件配置集合, 继承解析与价格分解的输入
// 生命周期: 子类目首次显式配置创建; 商品"自定义定价"时克隆祖先配置;
//           回退继承只解除引用, 历史克隆可能仍被既往订单引用, 不物理删除
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingProfile {
    // ===== 主键与归属 =====
    pub profile_id: String,
    pub owner: ProfileOwner,

    // ===== 组件配置 (内嵌有序集合) =====
    pub components: Vec<ComponentConfig>,

    // ===== 克隆来源 (自定义定价可逆回退的依据) =====
    pub cloned_from: Option<String>, // 来源 profile_id
    pub cloned_at: Option<DateTime<Utc>>,

    // ===== 并发控制 =====
    pub revision: i32, // 乐观锁版本号

    // ===== 审计字段 =====
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub updated_by: Option<String>,
}

impl PricingProfile {
    /// 为指定归属者新建空配置
    pub fn new(owner: ProfileOwner) -> Self {
        let now = Utc::now();
        Self {
            profile_id: Uuid::new_v4().to_string(),
            owner,
            components: Vec::new(),
            cloned_from: None,
            cloned_at: None,
            revision: 0,
            created_at: now,
            updated_at: now,
            updated_by: None,
        }
    }

    /// 深拷贝为新归属者的本地覆盖 (保留冻结状态, 记录克隆来源)
    pub fn clone_for(&self, owner: ProfileOwner) -> Self {
        let now = Utc::now();
        Self {
            profile_id: Uuid::new_v4().to_string(),
            owner,
            components: self.components.clone(),
            cloned_from: Some(self.profile_id.clone()),
            cloned_at: Some(now),
            revision: 0,
            created_at: now,
            updated_at: now,
            updated_by: None,
        }
    }

    /// 按键查找组件配置
    pub fn find_component(&self, component_key: &str) -> Option<&ComponentConfig> {
        self.components
            .iter()
            .find(|c| c.component_key == component_key)
    }

    /// 按键查找组件配置 (可变)
    pub fn find_component_mut(&mut self, component_key: &str) -> Option<&mut ComponentConfig> {
        self.components
            .iter_mut()
            .find(|c| c.component_key == component_key)
    }

    /// 是否全部可冻结组件均已冻结 (批量重算可整体跳过)
    ///
    /// 不可冻结组件 (如运行小计百分比的税费) 是已冻结金额的纯函数,
    /// 重算结果不变, 不影响跳过判定。
    pub fn all_components_frozen(&self) -> bool {
        let freezable: Vec<_> = self
            .components
            .iter()
            .filter(|c| c.is_active && c.is_freezable)
            .collect();
        !freezable.is_empty() && freezable.iter().all(|c| c.is_frozen)
    }

    /// 是否引用了指定组件键
    pub fn references_component(&self, component_key: &str) -> bool {
        self.find_component(component_key).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::component::PriceComponentDefinition;
    use crate::domain::types::{CalculationKind, PercentageBase};

    fn definition(key: &str, order: i32) -> PriceComponentDefinition {
        PriceComponentDefinition {
            component_key: key.to_string(),
            display_name: key.to_string(),
            display_order: order,
            calculation_kind: CalculationKind::Fixed,
            default_value: 100.0,
            percentage_base: PercentageBase::MetalCost,
            is_system: false,
            is_freezable: true,
            is_active: true,
            is_visible: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_clone_for_records_provenance() {
        let mut source = PricingProfile::new(ProfileOwner::subcategory("sub-1"));
        source
            .components
            .push(ComponentConfig::from_definition(&definition("hallmark", 5)));

        let clone = source.clone_for(ProfileOwner::product("prod-1"));
        assert_ne!(clone.profile_id, source.profile_id);
        assert_eq!(clone.cloned_from.as_deref(), Some(source.profile_id.as_str()));
        assert!(clone.cloned_at.is_some());
        assert_eq!(clone.components.len(), 1);
        assert_eq!(clone.revision, 0);
    }

    #[test]
    fn test_clone_preserves_frozen_state() {
        let mut source = PricingProfile::new(ProfileOwner::subcategory("sub-1"));
        let mut config = ComponentConfig::from_definition(&definition("hallmark", 5));
        config.is_frozen = true;
        config.frozen_value = Some(45.0);
        source.components.push(config);

        let clone = source.clone_for(ProfileOwner::variant("var-1"));
        let cloned = clone.find_component("hallmark").unwrap();
        assert!(cloned.is_frozen);
        assert_eq!(cloned.frozen_value, Some(45.0));
    }

    #[test]
    fn test_all_components_frozen() {
        let mut profile = PricingProfile::new(ProfileOwner::product("p1"));
        assert!(!profile.all_components_frozen()); // 空配置不算全冻结

        let mut a = ComponentConfig::from_definition(&definition("a", 1));
        a.is_frozen = true;
        a.frozen_value = Some(1.0);
        let b = ComponentConfig::from_definition(&definition("b", 2));
        profile.components.push(a);
        profile.components.push(b.clone());
        assert!(!profile.all_components_frozen());

        profile.find_component_mut("b").unwrap().is_frozen = true;
        assert!(profile.all_components_frozen());

        // 非激活组件不参与判定
        let mut c = ComponentConfig::from_definition(&definition("c", 3));
        c.is_active = false;
        profile.components.push(c);
        assert!(profile.all_components_frozen());

        // 不可冻结组件 (已冻结金额的派生项) 同样不参与判定
        let mut d = ComponentConfig::from_definition(&definition("d", 4));
        d.is_freezable = false;
        profile.components.push(d);
        assert!(profile.all_components_frozen());
    }
}
