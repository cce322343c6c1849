// ==========================================
// 珠宝定价引擎 - 定价 API
// ==========================================
// 职责: 商品价格计算/落库、试算、定价自定义与回退、冻结入口
// 红线: 计算在引擎层完成, API 只做校验/编排/审计
// ==========================================

use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::domain::audit::{AuditAction, AuditEvent};
use crate::domain::pricing::{CalculationContext, PriceBreakdown};
use crate::domain::product::Product;
use crate::domain::profile::{PricingProfile, ProfileOwner};
use crate::engine::calculator::BreakdownCalculator;
use crate::engine::freeze::{FreezeController, FreezeOutcome};
use crate::engine::resolver::InheritanceResolver;
use crate::repository::metal_repo::MaterialRepository;
use crate::repository::product_repo::{PriceHistoryEntry, ProductRepository};
use crate::repository::profile_repo::PricingProfileRepository;
use crate::repository::taxonomy_repo::TaxonomyRepository;
use crate::repository::audit_repo::AuditLogRepository;

/// 价格落库触发来源
pub const TRIGGER_MANUAL_REFRESH: &str = "MANUAL_REFRESH";
pub const TRIGGER_FREEZE: &str = "FREEZE";
pub const TRIGGER_UNFREEZE: &str = "UNFREEZE";
pub const TRIGGER_REVERT: &str = "REVERT";

// ==========================================
// PricingApi - 定价 API
// ==========================================

/// 定价API
///
/// 职责：
/// 1. 商品价格计算与落库 (含价格历史)
/// 2. 手工金价试算 (不落库)
/// 3. 自定义定价 (克隆) / 回退为继承
/// 4. 组件冻结/解冻入口 (商品级与子类目级)
pub struct PricingApi {
    product_repo: Arc<ProductRepository>,
    profile_repo: Arc<PricingProfileRepository>,
    taxonomy_repo: Arc<TaxonomyRepository>,
    material_repo: Arc<MaterialRepository>,
    resolver: Arc<InheritanceResolver>,
    freeze_controller: Arc<FreezeController>,
    audit_repo: Arc<AuditLogRepository>,
}

impl PricingApi {
    pub fn new(
        product_repo: Arc<ProductRepository>,
        profile_repo: Arc<PricingProfileRepository>,
        taxonomy_repo: Arc<TaxonomyRepository>,
        material_repo: Arc<MaterialRepository>,
        resolver: Arc<InheritanceResolver>,
        freeze_controller: Arc<FreezeController>,
        audit_repo: Arc<AuditLogRepository>,
    ) -> Self {
        Self {
            product_repo,
            profile_repo,
            taxonomy_repo,
            material_repo,
            resolver,
            freeze_controller,
            audit_repo,
        }
    }

    // ==========================================
    // 计算与落库
    // ==========================================

    /// 计算商品价格并落库 (价格快照 + 价格历史)
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub fn price_product(&self, product_id: &str, actor: &str) -> ApiResult<PriceBreakdown> {
        let product = self.load_product(product_id)?;
        let breakdown = self.compute_breakdown(&product, None)?;

        self.product_repo
            .save_price_snapshot(product_id, &breakdown, TRIGGER_MANUAL_REFRESH, None)?;
        self.record_audit(
            AuditEvent::new(AuditAction::PriceUpdate, "Product", product_id, actor)
                .with_detail(&format!("总价 {:.2}", breakdown.total_price)),
        );
        Ok(breakdown)
    }

    /// 试算: 可注入手工金价, 不落库、不写历史
    pub fn preview_price(
        &self,
        product_id: &str,
        manual_rate: Option<f64>,
    ) -> ApiResult<PriceBreakdown> {
        if let Some(rate) = manual_rate {
            if rate <= 0.0 {
                return Err(ApiError::InvalidInput("手工金价必须为正数".to_string()));
            }
        }
        let product = self.load_product(product_id)?;
        self.compute_breakdown(&product, manual_rate)
    }

    /// 查询商品价格历史
    pub fn price_history(
        &self,
        product_id: &str,
        limit: i64,
    ) -> ApiResult<Vec<PriceHistoryEntry>> {
        if limit <= 0 {
            return Err(ApiError::InvalidInput("limit 必须为正数".to_string()));
        }
        Ok(self.product_repo.list_price_history(product_id, limit)?)
    }

    // ==========================================
    // 配置编辑
    // ==========================================

    /// 查询商品生效的定价配置 (继承解析后)
    pub fn effective_profile(&self, product_id: &str) -> ApiResult<PricingProfile> {
        let product = self.load_product(product_id)?;
        Ok(self.resolver.resolve_for_product(&product)?)
    }

    /// 修改本地配置中某组件的取值 (冻结中的组件拒绝编辑)
    #[instrument(skip(self), fields(component_key = %component_key))]
    pub fn set_component_value(
        &self,
        owner: &ProfileOwner,
        component_key: &str,
        value: f64,
        actor: &str,
    ) -> ApiResult<i32> {
        let mut profile = self
            .profile_repo
            .find_by_owner(owner)?
            .ok_or_else(|| ApiError::NotFound(format!("定价配置 {}", owner.owner_id)))?;
        let expected_revision = profile.revision;

        let config = profile
            .find_component_mut(component_key)
            .ok_or_else(|| ApiError::NotFound(format!("组件 {}", component_key)))?;
        if config.is_frozen {
            return Err(ApiError::InvalidState(format!(
                "组件 {} 处于冻结中, 请先解冻",
                component_key
            )));
        }
        config.value = value;

        let new_revision = self.profile_repo.update_checked(&profile, expected_revision)?;
        self.record_audit(
            AuditEvent::new(AuditAction::ProfileEdit, "PricingProfile", &profile.profile_id, actor)
                .with_detail(&format!("{} = {}", component_key, value)),
        );
        Ok(new_revision)
    }

    // ==========================================
    // 自定义定价 / 回退
    // ==========================================

    /// 商品/变体自定义定价: 深拷贝当前生效配置为本地覆盖
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub fn customize_pricing(&self, product_id: &str, actor: &str) -> ApiResult<PricingProfile> {
        let product = self.load_product(product_id)?;
        let source = self.resolver.resolve_for_product(&product)?;
        let owner = Self::owner_of(&product);

        let clone = self.resolver.clone_to_owner(&source, owner)?;
        self.product_repo.set_has_pricing_config(product_id, true)?;
        self.record_audit(
            AuditEvent::new(AuditAction::CustomizePricing, "Product", product_id, actor)
                .with_detail(&format!("克隆自 {}", source.profile_id)),
        );
        info!(product_id = %product_id, profile_id = %clone.profile_id, "商品自定义定价");
        Ok(clone)
    }

    /// 回退为继承定价: 丢弃本地覆盖并按继承结果立即重算落库
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub fn revert_pricing(&self, product_id: &str, actor: &str) -> ApiResult<PriceBreakdown> {
        let product = self.load_product(product_id)?;
        let owner = Self::owner_of(&product);

        let deleted = self.profile_repo.delete_by_owner(&owner)?;
        if !deleted {
            return Err(ApiError::InvalidState(format!(
                "商品 {} 无本地定价配置, 无需回退",
                product_id
            )));
        }
        self.product_repo.set_has_pricing_config(product_id, false)?;
        self.product_repo.set_all_components_frozen(product_id, false)?;

        let breakdown = self.compute_breakdown(&product, None)?;
        self.product_repo
            .save_price_snapshot(product_id, &breakdown, TRIGGER_REVERT, None)?;
        self.record_audit(AuditEvent::new(
            AuditAction::RevertPricing,
            "Product",
            product_id,
            actor,
        ));
        Ok(breakdown)
    }

    // ==========================================
    // 冻结/解冻
    // ==========================================

    /// 冻结商品级组件 (需要商品已持有本地配置)
    ///
    /// 冻结后刷新价格快照并维护 all_components_frozen 标记,
    /// 全冻结的商品会被批量重算跳过。
    pub fn freeze_product_component(
        &self,
        product_id: &str,
        component_key: &str,
        reason: Option<&str>,
        actor: &str,
    ) -> ApiResult<FreezeOutcome> {
        let product = self.load_product(product_id)?;
        let owner = Self::owner_of(&product);
        let ctx = self.context_for(&product)?;

        let outcome = self
            .freeze_controller
            .freeze(&owner, component_key, &ctx, reason, actor)?;
        self.after_freeze_change(&product, &owner, TRIGGER_FREEZE)?;
        self.record_audit(
            AuditEvent::new(AuditAction::Freeze, "Product", product_id, actor)
                .with_detail(&format!("{} @ {:.2}", component_key, outcome.value)),
        );
        Ok(outcome)
    }

    /// 解冻商品级组件并立即重算落库
    pub fn unfreeze_product_component(
        &self,
        product_id: &str,
        component_key: &str,
        actor: &str,
    ) -> ApiResult<FreezeOutcome> {
        let product = self.load_product(product_id)?;
        let owner = Self::owner_of(&product);
        let ctx = self.context_for(&product)?;

        let outcome = self
            .freeze_controller
            .unfreeze(&owner, component_key, &ctx, actor)?;
        self.after_freeze_change(&product, &owner, TRIGGER_UNFREEZE)?;
        self.record_audit(
            AuditEvent::new(AuditAction::Unfreeze, "Product", product_id, actor)
                .with_detail(component_key),
        );
        Ok(outcome)
    }

    /// 冻结子类目级组件 (影响所有继承该配置的商品, 必须填写原因)
    ///
    /// 子类目无自然重量上下文, 计算上下文由调用方提供。
    pub fn freeze_subcategory_component(
        &self,
        subcategory_id: &str,
        component_key: &str,
        ctx: &CalculationContext,
        reason: Option<&str>,
        actor: &str,
    ) -> ApiResult<FreezeOutcome> {
        let owner = ProfileOwner::subcategory(subcategory_id);
        let outcome = self
            .freeze_controller
            .freeze(&owner, component_key, ctx, reason, actor)?;
        self.record_audit(
            AuditEvent::new(AuditAction::Freeze, "Subcategory", subcategory_id, actor)
                .with_detail(&format!("{} @ {:.2}", component_key, outcome.value)),
        );
        Ok(outcome)
    }

    /// 解冻子类目级组件
    pub fn unfreeze_subcategory_component(
        &self,
        subcategory_id: &str,
        component_key: &str,
        ctx: &CalculationContext,
        actor: &str,
    ) -> ApiResult<FreezeOutcome> {
        let owner = ProfileOwner::subcategory(subcategory_id);
        let outcome = self
            .freeze_controller
            .unfreeze(&owner, component_key, ctx, actor)?;
        self.record_audit(
            AuditEvent::new(AuditAction::Unfreeze, "Subcategory", subcategory_id, actor)
                .with_detail(component_key),
        );
        Ok(outcome)
    }

    /// 子类目配置维护后同步分类树标记
    pub fn mark_subcategory_configured(&self, subcategory_id: &str, has: bool) -> ApiResult<()> {
        self.taxonomy_repo.set_has_pricing_config(subcategory_id, has)?;
        Ok(())
    }

    // ==========================================
    // 内部工具
    // ==========================================

    fn load_product(&self, product_id: &str) -> ApiResult<Product> {
        self.product_repo
            .find_by_id(product_id)?
            .ok_or_else(|| ApiError::NotFound(format!("商品 {}", product_id)))
    }

    fn owner_of(product: &Product) -> ProfileOwner {
        if product.is_variant() {
            ProfileOwner::variant(&product.product_id)
        } else {
            ProfileOwner::product(&product.product_id)
        }
    }

    /// 从商品 + 材料行情构造计算上下文
    fn context_for(&self, product: &Product) -> ApiResult<CalculationContext> {
        let material = self
            .material_repo
            .find_by_id(&product.material_id)?
            .ok_or_else(|| ApiError::NotFound(format!("材料 {}", product.material_id)))?;
        Ok(CalculationContext::new(
            product.net_weight_g,
            product.gross_weight_g,
            material.price_per_gram,
        ))
    }

    fn compute_breakdown(
        &self,
        product: &Product,
        manual_rate: Option<f64>,
    ) -> ApiResult<PriceBreakdown> {
        let profile = self.resolver.resolve_for_product(product)?;
        let mut ctx = self.context_for(product)?;
        if let Some(rate) = manual_rate {
            ctx = ctx.with_manual_rate(rate);
        }
        let mut breakdown = BreakdownCalculator::calculate(&profile.components, &ctx);
        BreakdownCalculator::fold_hidden_components(&mut breakdown);
        Ok(breakdown)
    }

    /// 冻结状态变化后: 刷新全冻结标记 + 价格快照
    fn after_freeze_change(
        &self,
        product: &Product,
        owner: &ProfileOwner,
        trigger: &str,
    ) -> ApiResult<()> {
        let profile = self
            .profile_repo
            .find_by_owner(owner)?
            .ok_or_else(|| ApiError::NotFound(format!("定价配置 {}", owner.owner_id)))?;
        self.product_repo
            .set_all_components_frozen(&product.product_id, profile.all_components_frozen())?;

        let ctx = self.context_for(product)?;
        let mut breakdown = BreakdownCalculator::calculate(&profile.components, &ctx);
        BreakdownCalculator::fold_hidden_components(&mut breakdown);
        self.product_repo
            .save_price_snapshot(&product.product_id, &breakdown, trigger, None)?;
        Ok(())
    }

    /// 审计失败只告警不阻断主流程
    fn record_audit(&self, event: AuditEvent) {
        if let Err(e) = self.audit_repo.record(&event) {
            warn!(error = %e, "审计日志写入失败");
        }
    }
}
