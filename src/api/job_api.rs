// ==========================================
// 珠宝定价引擎 - 批量任务 API
// ==========================================
// 职责: 批量重算任务进度/失败明细查询、启动恢复入口
// ==========================================

use std::sync::Arc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::job::{BatchJob, JobFailure};
use crate::engine::orchestrator::{BulkRecalcOrchestrator, RecoveryReport};
use crate::repository::job_repo::BatchJobRepository;

/// 面向管理端的任务进度视图
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobProgressView {
    pub job_id: String,
    pub status: String,
    pub metal_types: Vec<String>,
    pub total_count: i64,
    pub processed_count: i64,
    pub succeeded_count: i64,
    pub failed_count: i64,
    pub skipped_count: i64,
    /// 0.0 ~ 100.0, total 为 0 时为 100
    pub percent: f64,
    pub attempt: i32,
    pub retry_of: Option<String>,
    pub error_message: Option<String>,
}

impl From<&BatchJob> for JobProgressView {
    fn from(job: &BatchJob) -> Self {
        let percent = if job.total_count <= 0 {
            100.0
        } else {
            (job.processed_count as f64 / job.total_count as f64) * 100.0
        };
        Self {
            job_id: job.job_id.clone(),
            status: job.status.to_string(),
            metal_types: job.metal_types.clone(),
            total_count: job.total_count,
            processed_count: job.processed_count,
            succeeded_count: job.succeeded_count,
            failed_count: job.failed_count,
            skipped_count: job.skipped_count,
            percent,
            attempt: job.attempt,
            retry_of: job.retry_of.clone(),
            error_message: job.error_message.clone(),
        }
    }
}

// ==========================================
// JobApi - 批量任务 API
// ==========================================

pub struct JobApi {
    job_repo: Arc<BatchJobRepository>,
    orchestrator: Arc<BulkRecalcOrchestrator>,
}

impl JobApi {
    pub fn new(
        job_repo: Arc<BatchJobRepository>,
        orchestrator: Arc<BulkRecalcOrchestrator>,
    ) -> Self {
        Self {
            job_repo,
            orchestrator,
        }
    }

    /// 查询任务进度
    pub fn get_progress(&self, job_id: &str) -> ApiResult<JobProgressView> {
        let job = self.load_job(job_id)?;
        Ok(JobProgressView::from(&job))
    }

    /// 查询任务失败明细 (商品ID + 失败原因)
    pub fn get_failures(&self, job_id: &str) -> ApiResult<Vec<JobFailure>> {
        let job = self.load_job(job_id)?;
        Ok(job.failures)
    }

    /// 进程启动时恢复中断任务: 标失效 + 一次性自动补偿重提
    #[instrument(skip(self))]
    pub fn recover_on_start(&self) -> ApiResult<RecoveryReport> {
        Ok(self.orchestrator.recover_on_start()?)
    }

    fn load_job(&self, job_id: &str) -> ApiResult<BatchJob> {
        self.job_repo
            .find_by_id(job_id)?
            .ok_or_else(|| ApiError::NotFound(format!("批量任务 {}", job_id)))
    }
}
