// ==========================================
// 珠宝定价引擎 - 继承解析器
// ==========================================
// 算法: 节点自身持有配置则用之; 否则沿物化祖先链 (近→远) 取首个持有者
// 红线: 全链无配置返回 None, 调用方必须按配置错误处理, 禁止按零价处理
// ==========================================

use crate::domain::product::Product;
use crate::domain::profile::{PricingProfile, ProfileOwner};
use crate::engine::error::{EngineError, EngineResult};
use crate::repository::{PricingProfileRepository, TaxonomyRepository};
use std::sync::Arc;
use tracing::debug;

/// 继承解析器
///
/// 职责:
/// 1. 子类目节点的定价配置继承解析
/// 2. 商品/变体的生效配置定位 (本地覆盖优先)
/// 3. "自定义定价"克隆
pub struct InheritanceResolver {
    profile_repo: Arc<PricingProfileRepository>,
    taxonomy_repo: Arc<TaxonomyRepository>,
}

impl InheritanceResolver {
    pub fn new(
        profile_repo: Arc<PricingProfileRepository>,
        taxonomy_repo: Arc<TaxonomyRepository>,
    ) -> Self {
        Self {
            profile_repo,
            taxonomy_repo,
        }
    }

    /// 解析分类节点的生效配置 (自身 → 最近祖先)
    ///
    /// 返回 None 表示全链无配置, 调用方应报 ConfigurationMissing
    pub fn resolve_node(&self, node_id: &str) -> EngineResult<Option<PricingProfile>> {
        let own = self
            .profile_repo
            .find_by_owner(&ProfileOwner::subcategory(node_id))?;
        if own.is_some() {
            return Ok(own);
        }

        // 物化祖先链: 单次查询拿到近→远的全部祖先, 逐个探测
        let ancestors = self.taxonomy_repo.get_ancestors(node_id)?;
        for ancestor_id in &ancestors {
            if let Some(profile) = self
                .profile_repo
                .find_by_owner(&ProfileOwner::subcategory(ancestor_id))?
            {
                debug!(node_id = %node_id, ancestor_id = %ancestor_id, "继承自祖先节点配置");
                return Ok(Some(profile));
            }
        }
        Ok(None)
    }

    /// 解析商品/变体的生效配置: 本地覆盖 → 变体的母商品覆盖 → 子类目继承链
    ///
    /// 全链无配置报 ConfigurationMissing (显式可操作错误)
    pub fn resolve_for_product(&self, product: &Product) -> EngineResult<PricingProfile> {
        let local_owner = if product.is_variant() {
            ProfileOwner::variant(&product.product_id)
        } else {
            ProfileOwner::product(&product.product_id)
        };
        if let Some(profile) = self.profile_repo.find_by_owner(&local_owner)? {
            return Ok(profile);
        }

        if let Some(parent_id) = &product.parent_product_id {
            if let Some(profile) = self
                .profile_repo
                .find_by_owner(&ProfileOwner::product(parent_id))?
            {
                return Ok(profile);
            }
        }

        self.resolve_node(&product.subcategory_id)?
            .ok_or(EngineError::ConfigurationMissing {
                node_id: product.subcategory_id.clone(),
            })
    }

    /// "自定义定价": 深拷贝解析出的生效配置为商品/变体本地覆盖
    ///
    /// 克隆保留冻结状态并记录来源 (cloned_from/cloned_at),
    /// 回退时丢弃克隆并重新解析即可完全还原。
    pub fn clone_to_owner(
        &self,
        source: &PricingProfile,
        owner: ProfileOwner,
    ) -> EngineResult<PricingProfile> {
        if self.profile_repo.exists_for_owner(&owner)? {
            return Err(EngineError::InvalidState(format!(
                "归属者 {}:{} 已持有本地配置",
                owner.kind, owner.owner_id
            )));
        }
        let clone = source.clone_for(owner);
        self.profile_repo.create(&clone)?;
        Ok(clone)
    }
}
