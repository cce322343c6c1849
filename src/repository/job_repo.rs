// ==========================================
// 珠宝定价引擎 - 批量任务仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 红线: 所有状态迁移 UPDATE 带当前状态谓词 (乐观迁移),
//       崩溃后未收到确认也可安全重放
// ==========================================

use crate::domain::job::{BatchJob, JobFailure};
use crate::domain::types::JobStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

/// 进程重启恢复时写入的任务级失败原因
pub const CRASH_RECOVERY_REASON: &str = "进程重启: 任务执行中断";

/// 批量任务仓储
/// 职责: 管理 batch_job 表的生命周期操作
pub struct BatchJobRepository {
    conn: Arc<Mutex<Connection>>,
}

impl BatchJobRepository {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 创建排队中的任务
    pub fn create(&self, job: &BatchJob) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO batch_job (
                job_id, job_type, metal_types_json, triggered_by, status,
                total_count, processed_count, succeeded_count, failed_count, skipped_count,
                failures_json, error_message, retry_of, attempt,
                created_at, started_at, completed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            "#,
            params![
                job.job_id,
                job.job_type,
                serde_json::to_string(&job.metal_types)?,
                job.triggered_by,
                job.status.to_string(),
                job.total_count,
                job.processed_count,
                job.succeeded_count,
                job.failed_count,
                job.skipped_count,
                serde_json::to_string(&job.failures)?,
                job.error_message,
                job.retry_of,
                job.attempt,
                job.created_at,
                job.started_at,
                job.completed_at,
            ],
        )?;
        Ok(())
    }

    /// 按主键查询
    pub fn find_by_id(&self, job_id: &str) -> RepositoryResult<Option<BatchJob>> {
        let conn = self.get_conn()?;
        conn.query_row(
            &format!("{} WHERE job_id = ?1", SELECT_JOB),
            params![job_id],
            map_job_row,
        )
        .optional()
        .map_err(|e| e.into())
    }

    /// QUEUED → RUNNING (仅提交者可启动; 状态不符时拒绝)
    pub fn mark_running(&self, job_id: &str, total_count: i64) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            UPDATE batch_job SET status = 'RUNNING', total_count = ?2, started_at = ?3
            WHERE job_id = ?1 AND status = 'QUEUED'
            "#,
            params![job_id, total_count, Utc::now()],
        )?;
        if affected == 0 {
            return Err(RepositoryError::IllegalStatusTransition {
                entity: "BatchJob".to_string(),
                id: job_id.to_string(),
                expected_status: "QUEUED".to_string(),
            });
        }
        Ok(())
    }

    /// 增量落库进度 (逐批调用, 崩溃后计数仍准确)
    pub fn update_progress(&self, job: &BatchJob) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            UPDATE batch_job SET
                processed_count = ?2, succeeded_count = ?3,
                failed_count = ?4, skipped_count = ?5,
                failures_json = ?6
            WHERE job_id = ?1 AND status = 'RUNNING'
            "#,
            params![
                job.job_id,
                job.processed_count,
                job.succeeded_count,
                job.failed_count,
                job.skipped_count,
                serde_json::to_string(&job.failures)?,
            ],
        )?;
        if affected == 0 {
            return Err(RepositoryError::IllegalStatusTransition {
                entity: "BatchJob".to_string(),
                id: job.job_id.clone(),
                expected_status: "RUNNING".to_string(),
            });
        }
        Ok(())
    }

    /// RUNNING → COMPLETED (终态计数一并落库)
    pub fn mark_completed(&self, job: &BatchJob) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            UPDATE batch_job SET
                status = 'COMPLETED',
                processed_count = ?2, succeeded_count = ?3,
                failed_count = ?4, skipped_count = ?5,
                failures_json = ?6, completed_at = ?7
            WHERE job_id = ?1 AND status = 'RUNNING'
            "#,
            params![
                job.job_id,
                job.processed_count,
                job.succeeded_count,
                job.failed_count,
                job.skipped_count,
                serde_json::to_string(&job.failures)?,
                Utc::now(),
            ],
        )?;
        if affected == 0 {
            return Err(RepositoryError::IllegalStatusTransition {
                entity: "BatchJob".to_string(),
                id: job.job_id.clone(),
                expected_status: "RUNNING".to_string(),
            });
        }
        Ok(())
    }

    /// {QUEUED|RUNNING} → FAILED (系统性失败或恢复扫描)
    pub fn mark_failed(&self, job_id: &str, error_message: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            UPDATE batch_job SET status = 'FAILED', error_message = ?2, completed_at = ?3
            WHERE job_id = ?1 AND status IN ('QUEUED', 'RUNNING')
            "#,
            params![job_id, error_message, Utc::now()],
        )?;
        if affected == 0 {
            return Err(RepositoryError::IllegalStatusTransition {
                entity: "BatchJob".to_string(),
                id: job_id.to_string(),
                expected_status: "QUEUED|RUNNING".to_string(),
            });
        }
        Ok(())
    }

    /// 查找超时僵死任务: RUNNING 且 started_at 早于阈值
    pub fn find_stale(&self, threshold_minutes: i64) -> RepositoryResult<Vec<BatchJob>> {
        let conn = self.get_conn()?;
        let cutoff: DateTime<Utc> = Utc::now() - Duration::minutes(threshold_minutes);
        let mut stmt = conn.prepare(&format!(
            "{} WHERE status = 'RUNNING' AND started_at < ?1",
            SELECT_JOB
        ))?;
        let jobs = stmt
            .query_map(params![cutoff], map_job_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(jobs)
    }

    /// 查找可自动重提的任务: 因进程重启失败, 尚未被重提过, 且尝试次数未超限
    pub fn find_retryable(&self, max_attempts: i32) -> RepositoryResult<Vec<BatchJob>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"
            {} AS j
            WHERE j.status = 'FAILED'
              AND j.error_message = ?1
              AND j.attempt < ?2
              AND NOT EXISTS (SELECT 1 FROM batch_job r WHERE r.retry_of = j.job_id)
            "#,
            SELECT_JOB
        ))?;
        let jobs = stmt
            .query_map(params![CRASH_RECOVERY_REASON, max_attempts], map_job_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(jobs)
    }

    /// 指定金属类型是否已有在途任务 (QUEUED/RUNNING) —— 同金属互斥提交的依据
    pub fn has_live_job_for_metal(&self, metal_type: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let exists: Option<i64> = conn
            .query_row(
                r#"
                SELECT 1 FROM batch_job
                WHERE status IN ('QUEUED', 'RUNNING')
                  AND metal_types_json LIKE '%"' || ?1 || '"%'
                LIMIT 1
                "#,
                params![metal_type],
                |row| row.get(0),
            )
            .optional()?;
        Ok(exists.is_some())
    }
}

const SELECT_JOB: &str = r#"
    SELECT job_id, job_type, metal_types_json, triggered_by, status,
           total_count, processed_count, succeeded_count, failed_count, skipped_count,
           failures_json, error_message, retry_of, attempt,
           created_at, started_at, completed_at
    FROM batch_job
"#;

fn map_job_row(row: &Row) -> rusqlite::Result<BatchJob> {
    let metal_types_json: String = row.get(2)?;
    let status_str: String = row.get(4)?;
    let failures_json: String = row.get(10)?;
    let metal_types: Vec<String> = serde_json::from_str(&metal_types_json).unwrap_or_default();
    let failures: Vec<JobFailure> = serde_json::from_str(&failures_json).unwrap_or_default();
    Ok(BatchJob {
        job_id: row.get(0)?,
        job_type: row.get(1)?,
        metal_types,
        triggered_by: row.get(3)?,
        status: JobStatus::from_str(&status_str).unwrap_or(JobStatus::Failed),
        total_count: row.get(5)?,
        processed_count: row.get(6)?,
        succeeded_count: row.get(7)?,
        failed_count: row.get(8)?,
        skipped_count: row.get(9)?,
        failures,
        error_message: row.get(11)?,
        retry_of: row.get(12)?,
        attempt: row.get(13)?,
        created_at: row.get::<_, DateTime<Utc>>(14)?,
        started_at: row.get::<_, Option<DateTime<Utc>>>(15)?,
        completed_at: row.get::<_, Option<DateTime<Utc>>>(16)?,
    })
}
