// ==========================================
// 珠宝定价引擎 - 价格组件仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 说明: 注册/保护/软删除的语义判定在 engine::registry, 此处只做数据访问
// ==========================================

use crate::domain::component::PriceComponentDefinition;
use crate::domain::types::{CalculationKind, PercentageBase};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

/// 价格组件仓储
/// 职责: 管理 price_component 表的 CRUD 与引用计数查询
pub struct PriceComponentRepository {
    conn: Arc<Mutex<Connection>>,
}

impl PriceComponentRepository {
    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 插入组件定义 (键重复返回唯一约束错误)
    pub fn insert(&self, def: &PriceComponentDefinition) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO price_component (
                component_key, display_name, display_order,
                calculation_kind, default_value, percentage_base,
                is_system, is_freezable, is_active, is_visible,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                def.component_key,
                def.display_name,
                def.display_order,
                def.calculation_kind.to_string(),
                def.default_value,
                def.percentage_base.to_string(),
                def.is_system,
                def.is_freezable,
                def.is_active,
                def.is_visible,
                def.created_at,
                def.updated_at,
            ],
        )?;
        Ok(())
    }

    /// 按键查询组件定义
    pub fn find_by_key(&self, key: &str) -> RepositoryResult<Option<PriceComponentDefinition>> {
        let conn = self.get_conn()?;
        conn.query_row(
            r#"
            SELECT component_key, display_name, display_order,
                   calculation_kind, default_value, percentage_base,
                   is_system, is_freezable, is_active, is_visible,
                   created_at, updated_at
            FROM price_component
            WHERE component_key = ?1
            "#,
            params![key],
            map_definition_row,
        )
        .optional()
        .map_err(|e| e.into())
    }

    /// 列出组件定义 (按展示顺序)
    pub fn list_all(&self, include_inactive: bool) -> RepositoryResult<Vec<PriceComponentDefinition>> {
        let conn = self.get_conn()?;
        let sql = if include_inactive {
            r#"
            SELECT component_key, display_name, display_order,
                   calculation_kind, default_value, percentage_base,
                   is_system, is_freezable, is_active, is_visible,
                   created_at, updated_at
            FROM price_component
            ORDER BY display_order, component_key
            "#
        } else {
            r#"
            SELECT component_key, display_name, display_order,
                   calculation_kind, default_value, percentage_base,
                   is_system, is_freezable, is_active, is_visible,
                   created_at, updated_at
            FROM price_component
            WHERE is_active = 1
            ORDER BY display_order, component_key
            "#
        };

        let mut stmt = conn.prepare(sql)?;
        let defs = stmt
            .query_map([], map_definition_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(defs)
    }

    /// 全量更新组件定义
    pub fn update(&self, def: &PriceComponentDefinition) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            UPDATE price_component SET
                display_name = ?2, display_order = ?3,
                calculation_kind = ?4, default_value = ?5, percentage_base = ?6,
                is_system = ?7, is_freezable = ?8, is_active = ?9, is_visible = ?10,
                updated_at = ?11
            WHERE component_key = ?1
            "#,
            params![
                def.component_key,
                def.display_name,
                def.display_order,
                def.calculation_kind.to_string(),
                def.default_value,
                def.percentage_base.to_string(),
                def.is_system,
                def.is_freezable,
                def.is_active,
                def.is_visible,
                Utc::now(),
            ],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "PriceComponentDefinition".to_string(),
                id: def.component_key.clone(),
            });
        }
        Ok(())
    }

    /// 软删除 (隐藏, 保留历史可读性)
    pub fn soft_delete(&self, key: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE price_component SET is_active = 0, updated_at = ?2 WHERE component_key = ?1",
            params![key, Utc::now()],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "PriceComponentDefinition".to_string(),
                id: key.to_string(),
            });
        }
        Ok(())
    }

    /// 物理删除 (仅限从未被引用的组件)
    pub fn hard_delete(&self, key: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "DELETE FROM price_component WHERE component_key = ?1",
            params![key],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "PriceComponentDefinition".to_string(),
                id: key.to_string(),
            });
        }
        Ok(())
    }

    /// 统计定价配置对组件键的引用数
    pub fn count_profile_references(&self, key: &str) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            r#"
            SELECT COUNT(*) FROM pricing_profile
            WHERE components_json LIKE '%"component_key":"' || ?1 || '"%'
            "#,
            params![key],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// 统计历史订单对组件键的引用数
    pub fn count_order_references(&self, key: &str) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM order_component_ref WHERE component_key = ?1",
            params![key],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn map_definition_row(row: &Row) -> rusqlite::Result<PriceComponentDefinition> {
    let kind_str: String = row.get(3)?;
    let base_str: String = row.get(5)?;
    Ok(PriceComponentDefinition {
        component_key: row.get(0)?,
        display_name: row.get(1)?,
        display_order: row.get(2)?,
        calculation_kind: CalculationKind::from_str(&kind_str)
            .unwrap_or(CalculationKind::Fixed),
        default_value: row.get(4)?,
        percentage_base: PercentageBase::from_str(&base_str)
            .unwrap_or(PercentageBase::MetalCost),
        is_system: row.get(6)?,
        is_freezable: row.get(7)?,
        is_active: row.get(8)?,
        is_visible: row.get(9)?,
        created_at: row.get::<_, DateTime<Utc>>(10)?,
        updated_at: row.get::<_, DateTime<Utc>>(11)?,
    })
}
