// ==========================================
// 珠宝定价引擎 - 金属行情仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 红线: 金属组+材料的级联写入必须在同一事务内 (读者不可见中间态)
// ==========================================

use crate::domain::metal::{Material, MetalGroup};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// MetalGroupRepository - 金属组仓储
// ==========================================

/// 金属组仓储
/// 职责: 管理 metal_group 表, 以及组+材料的原子级联落库
pub struct MetalGroupRepository {
    conn: Arc<Mutex<Connection>>,
}

impl MetalGroupRepository {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 创建金属组
    pub fn create(&self, group: &MetalGroup) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO metal_group (
                group_id, metal_type, display_name,
                spot_price, premium, base_price,
                auto_update, last_fetched_at, revision, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                group.group_id,
                group.metal_type,
                group.display_name,
                group.spot_price,
                group.premium,
                group.base_price,
                group.auto_update,
                group.last_fetched_at,
                group.revision,
                group.updated_at,
            ],
        )?;
        Ok(())
    }

    /// 按主键查询
    pub fn find_by_id(&self, group_id: &str) -> RepositoryResult<Option<MetalGroup>> {
        let conn = self.get_conn()?;
        conn.query_row(
            &format!("{} WHERE group_id = ?1", SELECT_GROUP),
            params![group_id],
            map_group_row,
        )
        .optional()
        .map_err(|e| e.into())
    }

    /// 按金属类型查询
    pub fn find_by_metal_type(&self, metal_type: &str) -> RepositoryResult<Option<MetalGroup>> {
        let conn = self.get_conn()?;
        conn.query_row(
            &format!("{} WHERE metal_type = ?1", SELECT_GROUP),
            params![metal_type],
            map_group_row,
        )
        .optional()
        .map_err(|e| e.into())
    }

    /// 列出全部金属组
    pub fn list_all(&self) -> RepositoryResult<Vec<MetalGroup>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!("{} ORDER BY metal_type", SELECT_GROUP))?;
        let groups = stmt
            .query_map([], map_group_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(groups)
    }

    /// 原子落库: 金属组行情 + 该组全部重算后的材料, 单事务 + 组 revision 乐观锁
    ///
    /// 说明: 调用方 (级联引擎) 负责计算新 base_price 与各材料单价,
    /// 此处只保证"组变更与材料重算结果要么同时可见, 要么都不可见"。
    pub fn save_group_and_materials(
        &self,
        group: &MetalGroup,
        expected_revision: i32,
        materials: &[Material],
    ) -> RepositoryResult<i32> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let new_revision = expected_revision + 1;
        let affected = tx.execute(
            r#"
            UPDATE metal_group SET
                spot_price = ?2, premium = ?3, base_price = ?4,
                auto_update = ?5, last_fetched_at = ?6,
                revision = ?7, updated_at = ?8
            WHERE group_id = ?1 AND revision = ?9
            "#,
            params![
                group.group_id,
                group.spot_price,
                group.premium,
                group.base_price,
                group.auto_update,
                group.last_fetched_at,
                new_revision,
                Utc::now(),
                expected_revision,
            ],
        )?;

        if affected == 0 {
            let actual: Option<i32> = tx
                .query_row(
                    "SELECT revision FROM metal_group WHERE group_id = ?1",
                    params![group.group_id],
                    |row| row.get(0),
                )
                .optional()?;
            return match actual {
                Some(actual) => Err(RepositoryError::OptimisticLockFailure {
                    entity: "MetalGroup".to_string(),
                    id: group.group_id.clone(),
                    expected: expected_revision,
                    actual,
                }),
                None => Err(RepositoryError::NotFound {
                    entity: "MetalGroup".to_string(),
                    id: group.group_id.clone(),
                }),
            };
        }

        for material in materials {
            tx.execute(
                "UPDATE material SET price_per_gram = ?2, updated_at = ?3 WHERE material_id = ?1",
                params![material.material_id, material.price_per_gram, Utc::now()],
            )?;
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(new_revision)
    }
}

const SELECT_GROUP: &str = r#"
    SELECT group_id, metal_type, display_name,
           spot_price, premium, base_price,
           auto_update, last_fetched_at, revision, updated_at
    FROM metal_group
"#;

fn map_group_row(row: &Row) -> rusqlite::Result<MetalGroup> {
    Ok(MetalGroup {
        group_id: row.get(0)?,
        metal_type: row.get(1)?,
        display_name: row.get(2)?,
        spot_price: row.get(3)?,
        premium: row.get(4)?,
        base_price: row.get(5)?,
        auto_update: row.get(6)?,
        last_fetched_at: row.get::<_, Option<DateTime<Utc>>>(7)?,
        revision: row.get(8)?,
        updated_at: row.get::<_, DateTime<Utc>>(9)?,
    })
}

// ==========================================
// MaterialRepository - 材料仓储
// ==========================================

/// 材料仓储
/// 职责: 管理 material 表的 CRUD 操作
pub struct MaterialRepository {
    conn: Arc<Mutex<Connection>>,
}

impl MaterialRepository {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 创建材料
    pub fn create(&self, material: &Material) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO material (
                material_id, group_id, display_name,
                purity_numerator, purity_denominator, price_per_gram,
                override_price, override_reason, override_by, override_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                material.material_id,
                material.group_id,
                material.display_name,
                material.purity_numerator,
                material.purity_denominator,
                material.price_per_gram,
                material.override_price,
                material.override_reason,
                material.override_by,
                material.override_at,
                material.updated_at,
            ],
        )?;
        Ok(())
    }

    /// 按主键查询
    pub fn find_by_id(&self, material_id: &str) -> RepositoryResult<Option<Material>> {
        let conn = self.get_conn()?;
        conn.query_row(
            &format!("{} WHERE material_id = ?1", SELECT_MATERIAL),
            params![material_id],
            map_material_row,
        )
        .optional()
        .map_err(|e| e.into())
    }

    /// 列出金属组下全部材料
    pub fn find_by_group(&self, group_id: &str) -> RepositoryResult<Vec<Material>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE group_id = ?1 ORDER BY material_id",
            SELECT_MATERIAL
        ))?;
        let materials = stmt
            .query_map(params![group_id], map_material_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(materials)
    }

    /// 全量更新材料 (纯度/覆盖/单价)
    pub fn update(&self, material: &Material) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            UPDATE material SET
                group_id = ?2, display_name = ?3,
                purity_numerator = ?4, purity_denominator = ?5, price_per_gram = ?6,
                override_price = ?7, override_reason = ?8, override_by = ?9, override_at = ?10,
                updated_at = ?11
            WHERE material_id = ?1
            "#,
            params![
                material.material_id,
                material.group_id,
                material.display_name,
                material.purity_numerator,
                material.purity_denominator,
                material.price_per_gram,
                material.override_price,
                material.override_reason,
                material.override_by,
                material.override_at,
                Utc::now(),
            ],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Material".to_string(),
                id: material.material_id.clone(),
            });
        }
        Ok(())
    }
}

const SELECT_MATERIAL: &str = r#"
    SELECT material_id, group_id, display_name,
           purity_numerator, purity_denominator, price_per_gram,
           override_price, override_reason, override_by, override_at,
           updated_at
    FROM material
"#;

fn map_material_row(row: &Row) -> rusqlite::Result<Material> {
    Ok(Material {
        material_id: row.get(0)?,
        group_id: row.get(1)?,
        display_name: row.get(2)?,
        purity_numerator: row.get(3)?,
        purity_denominator: row.get(4)?,
        price_per_gram: row.get(5)?,
        override_price: row.get(6)?,
        override_reason: row.get(7)?,
        override_by: row.get(8)?,
        override_at: row.get::<_, Option<DateTime<Utc>>>(9)?,
        updated_at: row.get::<_, DateTime<Utc>>(10)?,
    })
}
