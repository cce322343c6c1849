// ==========================================
// 珠宝定价引擎 - 分类仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 说明: 祖先链物化为 ancestor_ids JSON 数组 (近→远),
//       继承解析是一次索引查询而非递归父指针遍历
// ==========================================

use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

/// 分类节点行 (核心只消费祖先链与配置标志)
#[derive(Debug, Clone)]
pub struct TaxonomyNode {
    pub node_id: String,
    pub node_kind: String,
    pub display_name: String,
    pub parent_id: Option<String>,
    pub ancestor_ids: Vec<String>, // 近 → 远
    pub has_pricing_config: bool,
}

/// 分类仓储
/// 职责: taxonomy_node 表查询 + has_pricing_config 标志维护
pub struct TaxonomyRepository {
    conn: Arc<Mutex<Connection>>,
}

impl TaxonomyRepository {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 插入节点 (分类树由商品域维护, 这里仅提供种子能力)
    pub fn create(&self, node: &TaxonomyNode) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let ancestors_json = serde_json::to_string(&node.ancestor_ids)?;
        conn.execute(
            r#"
            INSERT INTO taxonomy_node (node_id, node_kind, display_name, parent_id, ancestor_ids, has_pricing_config)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                node.node_id,
                node.node_kind,
                node.display_name,
                node.parent_id,
                ancestors_json,
                node.has_pricing_config,
            ],
        )?;
        Ok(())
    }

    /// 按主键查询节点
    pub fn find_by_id(&self, node_id: &str) -> RepositoryResult<Option<TaxonomyNode>> {
        let conn = self.get_conn()?;
        conn.query_row(
            r#"
            SELECT node_id, node_kind, display_name, parent_id, ancestor_ids, has_pricing_config
            FROM taxonomy_node
            WHERE node_id = ?1
            "#,
            params![node_id],
            |row| {
                let ancestors_json: String = row.get(4)?;
                Ok(TaxonomyNode {
                    node_id: row.get(0)?,
                    node_kind: row.get(1)?,
                    display_name: row.get(2)?,
                    parent_id: row.get(3)?,
                    ancestor_ids: serde_json::from_str(&ancestors_json).unwrap_or_default(),
                    has_pricing_config: row.get(5)?,
                })
            },
        )
        .optional()
        .map_err(|e| e.into())
    }

    /// 读取节点的祖先链 (近 → 远); 节点不存在返回 NotFound
    pub fn get_ancestors(&self, node_id: &str) -> RepositoryResult<Vec<String>> {
        let node = self
            .find_by_id(node_id)?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "TaxonomyNode".to_string(),
                id: node_id.to_string(),
            })?;
        Ok(node.ancestor_ids)
    }

    /// 维护节点的配置持有标志 (与 pricing_profile 存在性一致)
    pub fn set_has_pricing_config(&self, node_id: &str, has: bool) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE taxonomy_node SET has_pricing_config = ?2 WHERE node_id = ?1",
            params![node_id, has],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "TaxonomyNode".to_string(),
                id: node_id.to_string(),
            });
        }
        Ok(())
    }
}
