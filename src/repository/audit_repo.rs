// ==========================================
// 珠宝定价引擎 - 审计日志仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 说明: 写入失败由 API 层记 warn 并吞掉, 不中断触发操作
// ==========================================

use crate::domain::audit::{AuditAction, AuditEvent};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex};

/// 审计日志仓储
/// 职责: audit_log 表的追加写入与按实体查询
pub struct AuditLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AuditLogRepository {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 追加一条审计事件
    pub fn record(&self, event: &AuditEvent) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let payload = match &event.payload_json {
            Some(v) => Some(serde_json::to_string(v)?),
            None => None,
        };
        let action_json = serde_json::to_string(&event.action)?;
        let action_str = action_json.trim_matches('"');
        conn.execute(
            r#"
            INSERT INTO audit_log (
                event_id, action, entity_kind, entity_id, actor,
                payload_json, detail, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                event.event_id,
                action_str,
                event.entity_kind,
                event.entity_id,
                event.actor,
                payload,
                event.detail,
                event.created_at,
            ],
        )?;
        Ok(())
    }

    /// 查询实体的审计轨迹 (新→旧)
    pub fn find_by_entity(
        &self,
        entity_kind: &str,
        entity_id: &str,
        limit: i64,
    ) -> RepositoryResult<Vec<AuditEvent>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT event_id, action, entity_kind, entity_id, actor,
                   payload_json, detail, created_at
            FROM audit_log
            WHERE entity_kind = ?1 AND entity_id = ?2
            ORDER BY created_at DESC
            LIMIT ?3
            "#,
        )?;
        let events = stmt
            .query_map(params![entity_kind, entity_id, limit], map_event_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(events)
    }
}

fn map_event_row(row: &Row) -> rusqlite::Result<AuditEvent> {
    let action_str: String = row.get(1)?;
    let action: AuditAction = serde_json::from_str(&format!("\"{}\"", action_str))
        .unwrap_or(AuditAction::ProfileEdit);
    let payload_json: Option<String> = row.get(5)?;
    Ok(AuditEvent {
        event_id: row.get(0)?,
        action,
        entity_kind: row.get(2)?,
        entity_id: row.get(3)?,
        actor: row.get(4)?,
        payload_json: payload_json.and_then(|p| serde_json::from_str(&p).ok()),
        detail: row.get(6)?,
        created_at: row.get::<_, DateTime<Utc>>(7)?,
    })
}
