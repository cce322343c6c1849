// ==========================================
// 珠宝定价引擎 - 定价配置仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 红线: update_checked 以 revision 乐观锁防止冻结/解冻并发覆盖
// 说明: 组件集合内嵌为 components_json (有序 JSON 数组)
// ==========================================

use crate::domain::component::ComponentConfig;
use crate::domain::profile::{PricingProfile, ProfileOwner};
use crate::domain::types::ProfileOwnerKind;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

/// 定价配置仓储
/// 职责: 管理 pricing_profile 表的 CRUD 操作
pub struct PricingProfileRepository {
    conn: Arc<Mutex<Connection>>,
}

impl PricingProfileRepository {
    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 创建定价配置 (同归属者重复创建触发唯一约束)
    pub fn create(&self, profile: &PricingProfile) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let components_json = serde_json::to_string(&profile.components)?;
        conn.execute(
            r#"
            INSERT INTO pricing_profile (
                profile_id, owner_kind, owner_id, components_json,
                cloned_from, cloned_at, revision,
                created_at, updated_at, updated_by
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                profile.profile_id,
                profile.owner.kind.to_string(),
                profile.owner.owner_id,
                components_json,
                profile.cloned_from,
                profile.cloned_at,
                profile.revision,
                profile.created_at,
                profile.updated_at,
                profile.updated_by,
            ],
        )?;
        Ok(())
    }

    /// 按主键查询
    pub fn find_by_id(&self, profile_id: &str) -> RepositoryResult<Option<PricingProfile>> {
        let conn = self.get_conn()?;
        conn.query_row(
            &format!("{} WHERE profile_id = ?1", SELECT_PROFILE),
            params![profile_id],
            map_profile_row,
        )
        .optional()
        .map_err(|e| e.into())
    }

    /// 按归属者查询 (每个归属者至多一份)
    pub fn find_by_owner(&self, owner: &ProfileOwner) -> RepositoryResult<Option<PricingProfile>> {
        let conn = self.get_conn()?;
        conn.query_row(
            &format!("{} WHERE owner_kind = ?1 AND owner_id = ?2", SELECT_PROFILE),
            params![owner.kind.to_string(), owner.owner_id],
            map_profile_row,
        )
        .optional()
        .map_err(|e| e.into())
    }

    /// 乐观锁更新: 仅当数据库中 revision 与读取时一致才落库, 否则报冲突
    pub fn update_checked(
        &self,
        profile: &PricingProfile,
        expected_revision: i32,
    ) -> RepositoryResult<i32> {
        let conn = self.get_conn()?;
        let components_json = serde_json::to_string(&profile.components)?;
        let new_revision = expected_revision + 1;
        let affected = conn.execute(
            r#"
            UPDATE pricing_profile SET
                components_json = ?2,
                revision = ?3,
                updated_at = ?4,
                updated_by = ?5
            WHERE profile_id = ?1 AND revision = ?6
            "#,
            params![
                profile.profile_id,
                components_json,
                new_revision,
                Utc::now(),
                profile.updated_by,
                expected_revision,
            ],
        )?;

        if affected == 0 {
            // 区分"记录不存在"与"版本冲突"
            let actual: Option<i32> = conn
                .query_row(
                    "SELECT revision FROM pricing_profile WHERE profile_id = ?1",
                    params![profile.profile_id],
                    |row| row.get(0),
                )
                .optional()?;
            return match actual {
                Some(actual) => Err(RepositoryError::OptimisticLockFailure {
                    entity: "PricingProfile".to_string(),
                    id: profile.profile_id.clone(),
                    expected: expected_revision,
                    actual,
                }),
                None => Err(RepositoryError::NotFound {
                    entity: "PricingProfile".to_string(),
                    id: profile.profile_id.clone(),
                }),
            };
        }
        Ok(new_revision)
    }

    /// 解除归属者的本地配置 (回退继承; 行保留由调用方决定)
    pub fn delete_by_owner(&self, owner: &ProfileOwner) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "DELETE FROM pricing_profile WHERE owner_kind = ?1 AND owner_id = ?2",
            params![owner.kind.to_string(), owner.owner_id],
        )?;
        Ok(affected > 0)
    }

    /// 归属者是否持有配置
    pub fn exists_for_owner(&self, owner: &ProfileOwner) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let exists: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM pricing_profile WHERE owner_kind = ?1 AND owner_id = ?2",
                params![owner.kind.to_string(), owner.owner_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(exists.is_some())
    }
}

const SELECT_PROFILE: &str = r#"
    SELECT profile_id, owner_kind, owner_id, components_json,
           cloned_from, cloned_at, revision,
           created_at, updated_at, updated_by
    FROM pricing_profile
"#;

fn map_profile_row(row: &Row) -> rusqlite::Result<PricingProfile> {
    let owner_kind_str: String = row.get(1)?;
    let components_json: String = row.get(3)?;
    let components: Vec<ComponentConfig> =
        serde_json::from_str(&components_json).unwrap_or_default();
    Ok(PricingProfile {
        profile_id: row.get(0)?,
        owner: ProfileOwner {
            kind: ProfileOwnerKind::from_str(&owner_kind_str)
                .unwrap_or(ProfileOwnerKind::Subcategory),
            owner_id: row.get(2)?,
        },
        components,
        cloned_from: row.get(4)?,
        cloned_at: row.get::<_, Option<DateTime<Utc>>>(5)?,
        revision: row.get(6)?,
        created_at: row.get::<_, DateTime<Utc>>(7)?,
        updated_at: row.get::<_, DateTime<Utc>>(8)?,
        updated_by: row.get(9)?,
    })
}
