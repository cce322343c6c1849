// ==========================================
// 珠宝定价引擎 - 金价级联引擎
// ==========================================
// 级联链路: 现货价+升贴水 → 金属组基准价 → 纯度折算材料单价
// 红线: 组+材料在同一事务落库 (读者不可见"基准价已变、材料未重算"的中间态)
// 红线: 材料人工覆盖价粘性生效, 级联跳过; 清除覆盖后按"当前"基准价重算一次
// ==========================================

use crate::domain::metal::{Material, MetalGroup};
use crate::engine::calculator::round2;
use crate::engine::error::{EngineError, EngineResult};
use crate::repository::{MaterialRepository, MetalGroupRepository};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, instrument};

/// 一次级联更新的结果
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CascadeResult {
    pub group: MetalGroup,
    pub recalculated_materials: usize, // 重算材料数
    pub skipped_overrides: usize,      // 覆盖生效被跳过的材料数
}

/// 金价级联引擎
pub struct MetalRateCascade {
    group_repo: Arc<MetalGroupRepository>,
    material_repo: Arc<MaterialRepository>,
}

impl MetalRateCascade {
    pub fn new(
        group_repo: Arc<MetalGroupRepository>,
        material_repo: Arc<MaterialRepository>,
    ) -> Self {
        Self {
            group_repo,
            material_repo,
        }
    }

    /// 应用金属组新行情并级联重算组内材料
    ///
    /// - base_price 同步重算 (spot + premium)
    /// - 组内覆盖未生效的材料全部按新基准价重算
    /// - 组 revision 乐观锁: 并发修改报 Conflict
    #[instrument(skip(self), fields(group_id = %group_id, spot = %spot_price, premium = %premium))]
    pub fn update_group_rate(
        &self,
        group_id: &str,
        spot_price: f64,
        premium: f64,
        last_fetched_at: Option<DateTime<Utc>>,
    ) -> EngineResult<CascadeResult> {
        let mut group = self
            .group_repo
            .find_by_id(group_id)?
            .ok_or_else(|| EngineError::NotFound {
                entity: "MetalGroup".to_string(),
                id: group_id.to_string(),
            })?;
        let expected_revision = group.revision;

        group.apply_rate(spot_price, premium);
        if last_fetched_at.is_some() {
            group.last_fetched_at = last_fetched_at;
        }

        let (materials, skipped) = self.recalculate_materials(&group)?;
        let new_revision =
            self.group_repo
                .save_group_and_materials(&group, expected_revision, &materials)?;
        group.revision = new_revision;

        info!(
            group_id = %group_id,
            base_price = %group.base_price,
            recalculated = materials.len(),
            skipped = skipped,
            "金属组行情级联完成"
        );
        Ok(CascadeResult {
            group,
            recalculated_materials: materials.len(),
            skipped_overrides: skipped,
        })
    }

    /// 组内重算 (跳过覆盖生效的材料), 返回 (待落库材料, 跳过数)
    fn recalculate_materials(&self, group: &MetalGroup) -> EngineResult<(Vec<Material>, usize)> {
        let all = self.material_repo.find_by_group(&group.group_id)?;
        let mut recalculated = Vec::with_capacity(all.len());
        let mut skipped = 0usize;
        for mut material in all {
            if material.is_override_active() {
                skipped += 1;
                continue;
            }
            material.price_per_gram = round2(material.recalculated_price(group.base_price));
            recalculated.push(material);
        }
        Ok((recalculated, skipped))
    }

    /// 设置材料人工覆盖价 (生效期间免疫级联)
    pub fn set_material_override(
        &self,
        material_id: &str,
        price: f64,
        reason: &str,
        actor: &str,
    ) -> EngineResult<Material> {
        if price <= 0.0 {
            return Err(EngineError::InvalidInput("覆盖价必须为正数".to_string()));
        }
        let mut material = self.get_material(material_id)?;
        material.override_price = Some(price);
        material.override_reason = Some(reason.to_string());
        material.override_by = Some(actor.to_string());
        material.override_at = Some(Utc::now());
        material.price_per_gram = round2(price);
        self.material_repo.update(&material)?;
        info!(material_id = %material_id, price = %price, "设置材料覆盖价");
        Ok(material)
    }

    /// 清除材料覆盖价, 并立即按组"当前"基准价重算一次 (非覆盖前的陈旧值)
    pub fn clear_material_override(&self, material_id: &str) -> EngineResult<Material> {
        let mut material = self.get_material(material_id)?;
        if !material.is_override_active() {
            return Err(EngineError::InvalidState(format!(
                "材料 {} 无生效覆盖价",
                material_id
            )));
        }
        let group = self
            .group_repo
            .find_by_id(&material.group_id)?
            .ok_or_else(|| EngineError::NotFound {
                entity: "MetalGroup".to_string(),
                id: material.group_id.clone(),
            })?;

        material.clear_override();
        material.price_per_gram = round2(material.recalculated_price(group.base_price));
        self.material_repo.update(&material)?;
        info!(material_id = %material_id, price = %material.price_per_gram, "清除材料覆盖价并重算");
        Ok(material)
    }

    /// 更新材料纯度并按当前基准价重算 (覆盖生效时只存纯度, 单价不动)
    pub fn update_material_purity(
        &self,
        material_id: &str,
        numerator: f64,
        denominator: f64,
    ) -> EngineResult<Material> {
        if numerator <= 0.0 || denominator <= 0.0 || numerator > denominator {
            return Err(EngineError::InvalidInput(format!(
                "非法纯度: {}/{}",
                numerator, denominator
            )));
        }
        let mut material = self.get_material(material_id)?;
        material.purity_numerator = numerator;
        material.purity_denominator = denominator;

        if !material.is_override_active() {
            let group = self
                .group_repo
                .find_by_id(&material.group_id)?
                .ok_or_else(|| EngineError::NotFound {
                    entity: "MetalGroup".to_string(),
                    id: material.group_id.clone(),
                })?;
            material.price_per_gram = round2(material.recalculated_price(group.base_price));
        }
        self.material_repo.update(&material)?;
        Ok(material)
    }

    fn get_material(&self, material_id: &str) -> EngineResult<Material> {
        self.material_repo
            .find_by_id(material_id)?
            .ok_or_else(|| EngineError::NotFound {
                entity: "Material".to_string(),
                id: material_id.to_string(),
            })
    }
}
