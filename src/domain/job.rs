// ==========================================
// 珠宝定价引擎 - 批量重算任务领域模型
// ==========================================
// 红线: 状态迁移单调 QUEUED → RUNNING → {COMPLETED | FAILED}
// 红线: 单项失败记录在案但不中断任务 (无 fail-fast)
// 红线: 进度按批次增量落库, 崩溃后计数仍准确
// ==========================================

use crate::domain::types::JobStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 金价联动批量重算的任务类型标识
pub const JOB_TYPE_METAL_RATE_RECALC: &str = "METAL_RATE_RECALC";

// ==========================================
// JobFailure - 单项失败记录
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobFailure {
    pub item_id: String, // 商品/变体 ID
    pub error: String,   // 失败原因
}

// ==========================================
// BatchJob - 批量重算任务
// ==========================================
// 用途: 一次批量重算的持久化记录, 支持崩溃恢复与进度查询
// 对齐: batch_job 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchJob {
    // ===== 主键 =====
    pub job_id: String,

    // ===== 任务定义 =====
    pub job_type: String,
    pub metal_types: Vec<String>, // 受影响的金属类型 (入参)
    pub triggered_by: String,     // 触发者 (操作人或 "rate_sync")

    // ===== 状态 =====
    pub status: JobStatus,

    // ===== 进度计数 =====
    pub total_count: i64,
    pub processed_count: i64,
    pub succeeded_count: i64,
    pub failed_count: i64,
    pub skipped_count: i64, // 全组件冻结等被跳过的实体数

    // ===== 失败明细 =====
    pub failures: Vec<JobFailure>,
    pub error_message: Option<String>, // 任务级失败原因 (系统性错误/进程重启)

    // ===== 重试链 =====
    pub retry_of: Option<String>, // 崩溃恢复重提时指向原任务
    pub attempt: i32,             // 第几次尝试 (首次为 1)

    // ===== 时间戳 =====
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl BatchJob {
    /// 新建一个排队中的金价重算任务
    pub fn new_metal_rate_recalc(metal_types: Vec<String>, triggered_by: &str) -> Self {
        Self {
            job_id: Uuid::new_v4().to_string(),
            job_type: JOB_TYPE_METAL_RATE_RECALC.to_string(),
            metal_types,
            triggered_by: triggered_by.to_string(),
            status: JobStatus::Queued,
            total_count: 0,
            processed_count: 0,
            succeeded_count: 0,
            failed_count: 0,
            skipped_count: 0,
            failures: Vec::new(),
            error_message: None,
            retry_of: None,
            attempt: 1,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// 作为崩溃任务的重提任务 (计数清零, 重算而非续算)
    pub fn retry_from(failed: &BatchJob) -> Self {
        let mut job = Self::new_metal_rate_recalc(
            failed.metal_types.clone(),
            &failed.triggered_by,
        );
        job.retry_of = Some(failed.job_id.clone());
        job.attempt = failed.attempt + 1;
        job
    }
}
