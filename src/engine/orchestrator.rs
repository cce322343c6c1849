// ==========================================
// 珠宝定价引擎 - 批量重算编排器
// ==========================================
// 模型: 请求驱动 + 协作式分批 (处理 N 个实体 → 落库进度 → 继续),
//       不开真并行工作线程, 以便内存有界与安全增量检查点
// 红线: 单项失败记录 {item_id, error} 后继续, 无 fail-fast
// 红线: 同金属类型互斥提交 (在途任务存在时报 Conflict)
// 恢复: RUNNING 超过阈值视为崩溃 → 标记失败; 因崩溃失败的任务自动重提一次
//       (重提是全量重算而非续算, 计数不累加)
// ==========================================

use crate::domain::job::{BatchJob, JobFailure};
use crate::domain::pricing::CalculationContext;
use crate::domain::product::Product;
use crate::domain::types::JobStatus;
use crate::engine::calculator::BreakdownCalculator;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::resolver::InheritanceResolver;
use crate::repository::job_repo::CRASH_RECOVERY_REASON;
use crate::repository::{BatchJobRepository, MaterialRepository, ProductRepository};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// 批量重算落库时写入价格历史的触发源标识
pub const TRIGGER_BULK_RECALC: &str = "BULK_RECALC";

// ==========================================
// RecalcOrchestratorConfig - 编排器配置
// ==========================================
#[derive(Debug, Clone)]
pub struct RecalcOrchestratorConfig {
    pub chunk_size: usize,            // 每批处理实体数 (批间落库进度)
    pub stale_threshold_minutes: i64, // RUNNING 超时视为崩溃的阈值
    pub max_job_attempts: i32,        // 崩溃自动重提的尝试上限 (含首次)
}

impl Default for RecalcOrchestratorConfig {
    fn default() -> Self {
        Self {
            chunk_size: 50,
            stale_threshold_minutes: 10,
            max_job_attempts: 2,
        }
    }
}

// ==========================================
// RecoveryReport - 启动恢复结果
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct RecoveryReport {
    pub stale_failed: Vec<String>, // 被标记失败的僵死任务
    pub resubmitted: Vec<String>,  // 自动重提的新任务
}

/// 单实体处理结果 (内部)
enum ItemOutcome {
    Succeeded,
    Skipped,
    Failed(String),
}

/// 批量重算编排器
pub struct BulkRecalcOrchestrator {
    job_repo: Arc<BatchJobRepository>,
    product_repo: Arc<ProductRepository>,
    material_repo: Arc<MaterialRepository>,
    resolver: Arc<InheritanceResolver>,
    config: RecalcOrchestratorConfig,
}

impl BulkRecalcOrchestrator {
    pub fn new(
        job_repo: Arc<BatchJobRepository>,
        product_repo: Arc<ProductRepository>,
        material_repo: Arc<MaterialRepository>,
        resolver: Arc<InheritanceResolver>,
        config: RecalcOrchestratorConfig,
    ) -> Self {
        Self {
            job_repo,
            product_repo,
            material_repo,
            resolver,
            config,
        }
    }

    /// 提交批量重算任务, 立即返回任务 ID (执行由调用方触发 run)
    ///
    /// 同金属类型已有在途任务 (QUEUED/RUNNING) 时拒绝, 防止重叠批量互踩
    pub fn submit(&self, metal_types: &[String], triggered_by: &str) -> EngineResult<String> {
        if metal_types.is_empty() {
            return Err(EngineError::InvalidInput(
                "金属类型列表不能为空".to_string(),
            ));
        }
        for metal_type in metal_types {
            if self.job_repo.has_live_job_for_metal(metal_type)? {
                return Err(EngineError::Conflict(format!(
                    "金属类型 {} 已有在途批量任务",
                    metal_type
                )));
            }
        }

        let job = BatchJob::new_metal_rate_recalc(metal_types.to_vec(), triggered_by);
        self.job_repo.create(&job)?;
        info!(job_id = %job.job_id, metal_types = ?metal_types, "批量重算任务已提交");
        Ok(job.job_id)
    }

    /// 执行任务: QUEUED → RUNNING → {COMPLETED | FAILED}
    ///
    /// 单项失败只记入失败列表; 系统性错误 (如受影响实体列表不可读)
    /// 才将整个任务置为 FAILED。
    #[instrument(skip(self), fields(job_id = %job_id))]
    pub fn run(&self, job_id: &str) -> EngineResult<BatchJob> {
        let mut job = self
            .job_repo
            .find_by_id(job_id)?
            .ok_or_else(|| EngineError::NotFound {
                entity: "BatchJob".to_string(),
                id: job_id.to_string(),
            })?;
        if job.status != JobStatus::Queued {
            return Err(EngineError::InvalidState(format!(
                "任务 {} 当前状态为 {}, 仅 QUEUED 可启动",
                job_id, job.status
            )));
        }

        // 受影响实体统计; 列表不可读属系统性失败, 整个任务置 FAILED
        let mut total: i64 = 0;
        for metal_type in &job.metal_types {
            match self.product_repo.count_affected(metal_type) {
                Ok(n) => total += n,
                Err(e) => {
                    let msg = format!("读取受影响实体失败: {}", e);
                    error!(job_id = %job_id, "{}", msg);
                    self.job_repo.mark_failed(job_id, &msg)?;
                    return Ok(self.reload(job_id)?);
                }
            }
        }
        self.job_repo.mark_running(job_id, total)?;
        job.status = JobStatus::Running;
        job.total_count = total;

        for metal_type in job.metal_types.clone() {
            let products = match self.product_repo.find_affected(&metal_type) {
                Ok(p) => p,
                Err(e) => {
                    let msg = format!("读取受影响实体失败: {}", e);
                    error!(job_id = %job_id, metal_type = %metal_type, "{}", msg);
                    self.job_repo.mark_failed(job_id, &msg)?;
                    return Ok(self.reload(job_id)?);
                }
            };

            // 协作式分批: 每批结束增量落库进度, 崩溃后计数仍准确
            for chunk in products.chunks(self.config.chunk_size.max(1)) {
                for product in chunk {
                    match self.process_one(product, job_id) {
                        ItemOutcome::Succeeded => job.succeeded_count += 1,
                        ItemOutcome::Skipped => job.skipped_count += 1,
                        ItemOutcome::Failed(err) => {
                            warn!(job_id = %job_id, product_id = %product.product_id, "单项重算失败: {}", err);
                            job.failed_count += 1;
                            job.failures.push(JobFailure {
                                item_id: product.product_id.clone(),
                                error: err,
                            });
                        }
                    }
                    job.processed_count += 1;
                }
                self.job_repo.update_progress(&job)?;
            }
        }

        self.job_repo.mark_completed(&job)?;
        info!(
            job_id = %job_id,
            processed = job.processed_count,
            succeeded = job.succeeded_count,
            failed = job.failed_count,
            skipped = job.skipped_count,
            "批量重算完成"
        );
        Ok(self.reload(job_id)?)
    }

    /// 单实体重算: 解析生效配置 → 计算分解 → 落库快照+历史
    fn process_one(&self, product: &Product, job_id: &str) -> ItemOutcome {
        let material = match self.material_repo.find_by_id(&product.material_id) {
            Ok(Some(m)) => m,
            Ok(None) => {
                return ItemOutcome::Failed(format!("材料不存在: {}", product.material_id))
            }
            Err(e) => return ItemOutcome::Failed(e.to_string()),
        };

        let profile = match self.resolver.resolve_for_product(product) {
            Ok(p) => p,
            Err(e) => return ItemOutcome::Failed(e.to_string()),
        };

        // SQL 层已排除 all_components_frozen 标志置位的商品;
        // 这里再按生效配置兜底判定 (标志可能滞后)
        if profile.all_components_frozen() {
            return ItemOutcome::Skipped;
        }

        let ctx = CalculationContext::new(
            product.net_weight_g,
            product.gross_weight_g,
            material.price_per_gram,
        );
        let mut breakdown = BreakdownCalculator::calculate(&profile.components, &ctx);
        BreakdownCalculator::fold_hidden_components(&mut breakdown);

        match self.product_repo.save_price_snapshot(
            &product.product_id,
            &breakdown,
            TRIGGER_BULK_RECALC,
            Some(job_id),
        ) {
            Ok(()) => ItemOutcome::Succeeded,
            Err(e) => ItemOutcome::Failed(e.to_string()),
        }
    }

    /// 启动恢复: 僵死任务标记失败, 因崩溃失败的任务自动重提一次
    pub fn recover_on_start(&self) -> EngineResult<RecoveryReport> {
        let mut report = RecoveryReport::default();

        for stale in self.job_repo.find_stale(self.config.stale_threshold_minutes)? {
            warn!(job_id = %stale.job_id, "检测到僵死任务, 标记失败");
            self.job_repo.mark_failed(&stale.job_id, CRASH_RECOVERY_REASON)?;
            report.stale_failed.push(stale.job_id);
        }

        for dead in self.job_repo.find_retryable(self.config.max_job_attempts)? {
            // 重提走同一互斥闸门: 期间若已有新任务覆盖该金属则放弃重提
            let conflicted = dead
                .metal_types
                .iter()
                .any(|m| self.job_repo.has_live_job_for_metal(m).unwrap_or(true));
            if conflicted {
                warn!(job_id = %dead.job_id, "金属类型已有在途任务, 放弃自动重提");
                continue;
            }

            let retry = BatchJob::retry_from(&dead);
            self.job_repo.create(&retry)?;
            info!(job_id = %retry.job_id, retry_of = %dead.job_id, "崩溃任务已自动重提");
            let retry_id = retry.job_id.clone();
            if let Err(e) = self.run(&retry_id) {
                error!(job_id = %retry_id, "重提任务执行失败: {}", e);
            }
            report.resubmitted.push(retry_id);
        }

        Ok(report)
    }

    fn reload(&self, job_id: &str) -> EngineResult<BatchJob> {
        self.job_repo
            .find_by_id(job_id)?
            .ok_or_else(|| EngineError::NotFound {
                entity: "BatchJob".to_string(),
                id: job_id.to_string(),
            })
    }
}
