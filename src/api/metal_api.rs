// ==========================================
// 珠宝定价引擎 - 金属行情 API
// ==========================================
// 职责: 金属组行情维护、材料覆盖价管理、批量重算触发
// 数据流: 行情更新 -> 材料级联 -> 批量重算任务
// ==========================================

use std::sync::Arc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::domain::audit::{AuditAction, AuditEvent};
use crate::domain::job::BatchJob;
use crate::domain::metal::{Material, MetalGroup};
use crate::engine::cascade::{CascadeResult, MetalRateCascade};
use crate::engine::error::EngineError;
use crate::engine::orchestrator::BulkRecalcOrchestrator;
use crate::repository::audit_repo::AuditLogRepository;
use crate::repository::metal_repo::MetalGroupRepository;

/// 行情更新结果: 级联明细 + 触发的批量重算任务
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateUpdateResult {
    pub cascade: CascadeResult,
    /// 并发互斥被拒时为 None (已有同金属在途任务兜底重算)
    pub job_id: Option<String>,
}

// ==========================================
// MetalApi - 金属行情 API
// ==========================================

/// 金属行情API
///
/// 职责：
/// 1. 金属组现货价/溢价维护 (两段级联第一段)
/// 2. 材料覆盖价设置/清除与纯度维护
/// 3. 行情变化后触发批量重算任务
pub struct MetalApi {
    group_repo: Arc<MetalGroupRepository>,
    cascade: Arc<MetalRateCascade>,
    orchestrator: Arc<BulkRecalcOrchestrator>,
    audit_repo: Arc<AuditLogRepository>,
}

impl MetalApi {
    pub fn new(
        group_repo: Arc<MetalGroupRepository>,
        cascade: Arc<MetalRateCascade>,
        orchestrator: Arc<BulkRecalcOrchestrator>,
        audit_repo: Arc<AuditLogRepository>,
    ) -> Self {
        Self {
            group_repo,
            cascade,
            orchestrator,
            audit_repo,
        }
    }

    /// 列出金属组
    pub fn list_groups(&self) -> ApiResult<Vec<MetalGroup>> {
        Ok(self.group_repo.list_all()?)
    }

    /// 手工更新金属组行情并触发级联 + 批量重算
    #[instrument(skip(self), fields(group_id = %group_id))]
    pub fn update_group_rate(
        &self,
        group_id: &str,
        spot_price: f64,
        premium: f64,
        actor: &str,
    ) -> ApiResult<RateUpdateResult> {
        if spot_price <= 0.0 {
            return Err(ApiError::InvalidInput("现货价必须为正数".to_string()));
        }
        if premium < 0.0 {
            return Err(ApiError::InvalidInput("溢价不能为负数".to_string()));
        }

        let cascade = self.cascade.update_group_rate(group_id, spot_price, premium, None)?;
        self.record_audit(
            AuditEvent::new(AuditAction::RateUpdate, "MetalGroup", group_id, actor)
                .with_detail(&format!(
                    "spot={:.2} premium={:.2} base={:.2}",
                    spot_price, premium, cascade.group.base_price
                )),
        );

        let job_id = self.trigger_recalc(&cascade.group.metal_type, actor)?;
        Ok(RateUpdateResult { cascade, job_id })
    }

    /// 设置材料人工覆盖价 (生效期间免疫级联)
    pub fn set_material_override(
        &self,
        material_id: &str,
        price: f64,
        reason: &str,
        actor: &str,
    ) -> ApiResult<Material> {
        if reason.trim().is_empty() {
            return Err(ApiError::InvalidInput("覆盖价必须填写原因".to_string()));
        }
        let material = self
            .cascade
            .set_material_override(material_id, price, reason, actor)?;
        self.record_audit(
            AuditEvent::new(AuditAction::OverrideSet, "Material", material_id, actor)
                .with_detail(&format!("{:.2}: {}", price, reason)),
        );
        Ok(material)
    }

    /// 清除材料覆盖价并按当前基准价重算
    pub fn clear_material_override(&self, material_id: &str, actor: &str) -> ApiResult<Material> {
        let material = self.cascade.clear_material_override(material_id)?;
        self.record_audit(
            AuditEvent::new(AuditAction::OverrideClear, "Material", material_id, actor)
                .with_detail(&format!("恢复为 {:.2}", material.price_per_gram)),
        );
        Ok(material)
    }

    /// 更新材料纯度
    pub fn update_material_purity(
        &self,
        material_id: &str,
        numerator: f64,
        denominator: f64,
    ) -> ApiResult<Material> {
        Ok(self
            .cascade
            .update_material_purity(material_id, numerator, denominator)?)
    }

    /// 手工提交批量重算任务并同步执行
    #[instrument(skip(self))]
    pub fn submit_bulk_recalc(&self, metal_types: &[String], actor: &str) -> ApiResult<BatchJob> {
        let job_id = self.orchestrator.submit(metal_types, actor)?;
        self.record_audit(
            AuditEvent::new(AuditAction::BulkRecalcSubmit, "BatchJob", &job_id, actor)
                .with_detail(&metal_types.join(",")),
        );
        let job = self.orchestrator.run(&job_id)?;
        self.record_audit(
            AuditEvent::new(AuditAction::BulkRecalcComplete, "BatchJob", &job_id, actor)
                .with_detail(&format!(
                    "{}: 成功 {} 失败 {} 跳过 {}",
                    job.status, job.succeeded_count, job.failed_count, job.skipped_count
                )),
        );
        Ok(job)
    }

    /// 行情更新后触发重算; 同金属已有在途任务时放弃触发
    fn trigger_recalc(&self, metal_type: &str, actor: &str) -> ApiResult<Option<String>> {
        let metals = vec![metal_type.to_string()];
        match self.orchestrator.submit(&metals, actor) {
            Ok(job_id) => {
                self.orchestrator.run(&job_id)?;
                info!(metal_type = %metal_type, job_id = %job_id, "行情更新触发批量重算");
                Ok(Some(job_id))
            }
            Err(EngineError::Conflict(msg)) => {
                warn!(metal_type = %metal_type, reason = %msg, "已有在途任务, 跳过触发");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn record_audit(&self, event: AuditEvent) {
        if let Err(e) = self.audit_repo.record(&event) {
            warn!(error = %e, "审计日志写入失败");
        }
    }
}
