// ==========================================
// 珠宝定价引擎 - 商品仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 说明: find_affected 是批量重算的实体入口, 全组件冻结的商品在 SQL 层排除
// ==========================================

use crate::domain::pricing::PriceBreakdown;
use crate::domain::product::Product;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// 商品仓储
/// 职责: 管理 product 表与 price_history 表的数据访问
pub struct ProductRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ProductRepository {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 创建商品/变体
    pub fn create(&self, product: &Product) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO product (
                product_id, parent_product_id, sku, display_name,
                subcategory_id, material_id, metal_type,
                net_weight_g, gross_weight_g,
                has_pricing_config, all_components_frozen,
                metal_cost, subtotal, total_price,
                breakdown_json, price_updated_at,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                      ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
            "#,
            params![
                product.product_id,
                product.parent_product_id,
                product.sku,
                product.display_name,
                product.subcategory_id,
                product.material_id,
                product.metal_type,
                product.net_weight_g,
                product.gross_weight_g,
                product.has_pricing_config,
                product.all_components_frozen,
                product.metal_cost,
                product.subtotal,
                product.total_price,
                product.breakdown_json,
                product.price_updated_at,
                product.created_at,
                product.updated_at,
            ],
        )?;
        Ok(())
    }

    /// 按主键查询
    pub fn find_by_id(&self, product_id: &str) -> RepositoryResult<Option<Product>> {
        let conn = self.get_conn()?;
        conn.query_row(
            &format!("{} WHERE product_id = ?1", SELECT_PRODUCT),
            params![product_id],
            map_product_row,
        )
        .optional()
        .map_err(|e| e.into())
    }

    /// 查询受金价变动影响的商品 (排除全组件冻结)
    pub fn find_affected(&self, metal_type: &str) -> RepositoryResult<Vec<Product>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE metal_type = ?1 AND all_components_frozen = 0 ORDER BY product_id",
            SELECT_PRODUCT
        ))?;
        let products = stmt
            .query_map(params![metal_type], map_product_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(products)
    }

    /// 统计受影响商品数 (任务 total_count)
    pub fn count_affected(&self, metal_type: &str) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM product WHERE metal_type = ?1 AND all_components_frozen = 0",
            params![metal_type],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// 落库价格快照, 并写一条价格历史
    pub fn save_price_snapshot(
        &self,
        product_id: &str,
        breakdown: &PriceBreakdown,
        trigger_source: &str,
        job_id: Option<&str>,
    ) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let breakdown_json = serde_json::to_string(breakdown)?;
        let now = Utc::now();

        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let old_total: f64 = tx
            .query_row(
                "SELECT total_price FROM product WHERE product_id = ?1",
                params![product_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "Product".to_string(),
                id: product_id.to_string(),
            })?;

        tx.execute(
            r#"
            UPDATE product SET
                metal_cost = ?2, subtotal = ?3, total_price = ?4,
                breakdown_json = ?5, price_updated_at = ?6, updated_at = ?6
            WHERE product_id = ?1
            "#,
            params![
                product_id,
                breakdown.metal_cost,
                breakdown.subtotal,
                breakdown.total_price,
                breakdown_json,
                now,
            ],
        )?;

        tx.execute(
            r#"
            INSERT INTO price_history (
                history_id, product_id, old_total, new_total,
                metal_rate, trigger_source, job_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                Uuid::new_v4().to_string(),
                product_id,
                old_total,
                breakdown.total_price,
                breakdown.rate_used,
                trigger_source,
                job_id,
                now,
            ],
        )?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(())
    }

    /// 维护本地覆盖标志 (与 pricing_profile 存在性保持一致)
    pub fn set_has_pricing_config(&self, product_id: &str, has: bool) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE product SET has_pricing_config = ?2, updated_at = ?3 WHERE product_id = ?1",
            params![product_id, has, Utc::now()],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Product".to_string(),
                id: product_id.to_string(),
            });
        }
        Ok(())
    }

    /// 维护全冻结标志 (冻结/解冻后由调用方回写)
    pub fn set_all_components_frozen(&self, product_id: &str, frozen: bool) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE product SET all_components_frozen = ?2, updated_at = ?3 WHERE product_id = ?1",
            params![product_id, frozen, Utc::now()],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Product".to_string(),
                id: product_id.to_string(),
            });
        }
        Ok(())
    }

    /// 查询商品价格历史 (新→旧)
    pub fn list_price_history(
        &self,
        product_id: &str,
        limit: i64,
    ) -> RepositoryResult<Vec<PriceHistoryEntry>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT history_id, product_id, old_total, new_total,
                   metal_rate, trigger_source, job_id, created_at
            FROM price_history
            WHERE product_id = ?1
            ORDER BY created_at DESC
            LIMIT ?2
            "#,
        )?;
        let entries = stmt
            .query_map(params![product_id, limit], |row| {
                Ok(PriceHistoryEntry {
                    history_id: row.get(0)?,
                    product_id: row.get(1)?,
                    old_total: row.get(2)?,
                    new_total: row.get(3)?,
                    metal_rate: row.get(4)?,
                    trigger_source: row.get(5)?,
                    job_id: row.get(6)?,
                    created_at: row.get::<_, DateTime<Utc>>(7)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }
}

// ==========================================
// PriceHistoryEntry - 价格历史行
// ==========================================
#[derive(Debug, Clone)]
pub struct PriceHistoryEntry {
    pub history_id: String,
    pub product_id: String,
    pub old_total: f64,
    pub new_total: f64,
    pub metal_rate: f64,
    pub trigger_source: String,
    pub job_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

const SELECT_PRODUCT: &str = r#"
    SELECT product_id, parent_product_id, sku, display_name,
           subcategory_id, material_id, metal_type,
           net_weight_g, gross_weight_g,
           has_pricing_config, all_components_frozen,
           metal_cost, subtotal, total_price,
           breakdown_json, price_updated_at,
           created_at, updated_at
    FROM product
"#;

fn map_product_row(row: &Row) -> rusqlite::Result<Product> {
    Ok(Product {
        product_id: row.get(0)?,
        parent_product_id: row.get(1)?,
        sku: row.get(2)?,
        display_name: row.get(3)?,
        subcategory_id: row.get(4)?,
        material_id: row.get(5)?,
        metal_type: row.get(6)?,
        net_weight_g: row.get(7)?,
        gross_weight_g: row.get(8)?,
        has_pricing_config: row.get(9)?,
        all_components_frozen: row.get(10)?,
        metal_cost: row.get(11)?,
        subtotal: row.get(12)?,
        total_price: row.get(13)?,
        breakdown_json: row.get(14)?,
        price_updated_at: row.get::<_, Option<DateTime<Utc>>>(15)?,
        created_at: row.get::<_, DateTime<Utc>>(16)?,
        updated_at: row.get::<_, DateTime<Utc>>(17)?,
    })
}
