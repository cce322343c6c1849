// ==========================================
// 珠宝定价引擎 - 配置管理器
// ==========================================
// 职责: config_entry 表的类型化读写, 缺省值内置
// 说明: 引擎调优旋钮 (批大小/僵死阈值/重试上限) 从这里取
// ==========================================

use crate::engine::orchestrator::RecalcOrchestratorConfig;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};
use tracing::warn;

// 配置键
pub const KEY_CHUNK_SIZE: &str = "recalc.chunk_size";
pub const KEY_STALE_THRESHOLD_MINUTES: &str = "recalc.stale_threshold_minutes";
pub const KEY_MAX_JOB_ATTEMPTS: &str = "recalc.max_job_attempts";

/// 配置管理器
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 读取原始配置值
    pub fn get_raw(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        conn.query_row(
            "SELECT config_value FROM config_entry WHERE config_key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| e.into())
    }

    /// 读取整型配置 (缺失或解析失败回退缺省值)
    pub fn get_i64(&self, key: &str, default: i64) -> i64 {
        match self.get_raw(key) {
            Ok(Some(raw)) => raw.trim().parse().unwrap_or_else(|_| {
                warn!(config_key = %key, raw = %raw, "配置值解析失败, 使用缺省值");
                default
            }),
            Ok(None) => default,
            Err(e) => {
                warn!(config_key = %key, "配置读取失败, 使用缺省值: {}", e);
                default
            }
        }
    }

    /// 写入配置值 (UPSERT)
    pub fn set(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO config_entry (config_key, config_value, updated_at)
            VALUES (?1, ?2, datetime('now'))
            ON CONFLICT(config_key) DO UPDATE SET
                config_value = excluded.config_value,
                updated_at = excluded.updated_at
            "#,
            params![key, value],
        )?;
        Ok(())
    }

    /// 装配批量重算编排器配置 (缺省: 批 50, 僵死 10 分钟, 尝试上限 2)
    pub fn load_recalc_config(&self) -> RecalcOrchestratorConfig {
        let defaults = RecalcOrchestratorConfig::default();
        RecalcOrchestratorConfig {
            chunk_size: self.get_i64(KEY_CHUNK_SIZE, defaults.chunk_size as i64).max(1) as usize,
            stale_threshold_minutes: self
                .get_i64(KEY_STALE_THRESHOLD_MINUTES, defaults.stale_threshold_minutes)
                .max(1),
            max_job_attempts: self
                .get_i64(KEY_MAX_JOB_ATTEMPTS, defaults.max_job_attempts as i64)
                .max(1) as i32,
        }
    }
}
