// ==========================================
// 珠宝定价引擎 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为，避免"部分模块外键开启/部分不开启"
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 提供幂等建表入口, 供维护进程与测试共用
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要"每个连接"单独开启
/// - busy_timeout 需要"每个连接"单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 幂等初始化全部定价相关表结构
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
          version INTEGER PRIMARY KEY,
          applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- 价格组件注册表
        CREATE TABLE IF NOT EXISTS price_component (
          component_key TEXT PRIMARY KEY,
          display_name TEXT NOT NULL,
          display_order INTEGER NOT NULL DEFAULT 0,
          calculation_kind TEXT NOT NULL,
          default_value REAL NOT NULL DEFAULT 0,
          percentage_base TEXT NOT NULL DEFAULT 'METAL_COST',
          is_system INTEGER NOT NULL DEFAULT 0,
          is_freezable INTEGER NOT NULL DEFAULT 1,
          is_active INTEGER NOT NULL DEFAULT 1,
          is_visible INTEGER NOT NULL DEFAULT 1,
          created_at TEXT NOT NULL,
          updated_at TEXT NOT NULL
        );

        -- 定价配置 (组件集合内嵌为 JSON, 每个归属者至多一份)
        CREATE TABLE IF NOT EXISTS pricing_profile (
          profile_id TEXT PRIMARY KEY,
          owner_kind TEXT NOT NULL,
          owner_id TEXT NOT NULL,
          components_json TEXT NOT NULL,
          cloned_from TEXT,
          cloned_at TEXT,
          revision INTEGER NOT NULL DEFAULT 0,
          created_at TEXT NOT NULL,
          updated_at TEXT NOT NULL,
          updated_by TEXT,
          UNIQUE(owner_kind, owner_id)
        );
        CREATE INDEX IF NOT EXISTS idx_profile_owner
          ON pricing_profile(owner_kind, owner_id);

        -- 金属组 (行情入口)
        CREATE TABLE IF NOT EXISTS metal_group (
          group_id TEXT PRIMARY KEY,
          metal_type TEXT NOT NULL UNIQUE,
          display_name TEXT NOT NULL,
          spot_price REAL NOT NULL DEFAULT 0,
          premium REAL NOT NULL DEFAULT 0,
          base_price REAL NOT NULL DEFAULT 0,
          auto_update INTEGER NOT NULL DEFAULT 1,
          last_fetched_at TEXT,
          revision INTEGER NOT NULL DEFAULT 0,
          updated_at TEXT NOT NULL
        );

        -- 材料 (纯度折算)
        CREATE TABLE IF NOT EXISTS material (
          material_id TEXT PRIMARY KEY,
          group_id TEXT NOT NULL REFERENCES metal_group(group_id),
          display_name TEXT NOT NULL,
          purity_numerator REAL NOT NULL,
          purity_denominator REAL NOT NULL,
          price_per_gram REAL NOT NULL DEFAULT 0,
          override_price REAL,
          override_reason TEXT,
          override_by TEXT,
          override_at TEXT,
          updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_material_group
          ON material(group_id);

        -- 商品 / 变体
        CREATE TABLE IF NOT EXISTS product (
          product_id TEXT PRIMARY KEY,
          parent_product_id TEXT,
          sku TEXT NOT NULL,
          display_name TEXT NOT NULL,
          subcategory_id TEXT NOT NULL,
          material_id TEXT NOT NULL,
          metal_type TEXT NOT NULL,
          net_weight_g REAL NOT NULL DEFAULT 0,
          gross_weight_g REAL NOT NULL DEFAULT 0,
          has_pricing_config INTEGER NOT NULL DEFAULT 0,
          all_components_frozen INTEGER NOT NULL DEFAULT 0,
          metal_cost REAL NOT NULL DEFAULT 0,
          subtotal REAL NOT NULL DEFAULT 0,
          total_price REAL NOT NULL DEFAULT 0,
          breakdown_json TEXT,
          price_updated_at TEXT,
          created_at TEXT NOT NULL,
          updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_product_metal_type
          ON product(metal_type, all_components_frozen);
        CREATE INDEX IF NOT EXISTS idx_product_subcategory
          ON product(subcategory_id);

        -- 分类节点 (祖先链物化为 JSON 数组, 继承解析单次索引查询)
        CREATE TABLE IF NOT EXISTS taxonomy_node (
          node_id TEXT PRIMARY KEY,
          node_kind TEXT NOT NULL,
          display_name TEXT NOT NULL,
          parent_id TEXT,
          ancestor_ids TEXT NOT NULL DEFAULT '[]',
          has_pricing_config INTEGER NOT NULL DEFAULT 0
        );

        -- 历史订单的组件引用 (注册表 InUse 判定)
        CREATE TABLE IF NOT EXISTS order_component_ref (
          order_id TEXT NOT NULL,
          component_key TEXT NOT NULL,
          PRIMARY KEY (order_id, component_key)
        );
        CREATE INDEX IF NOT EXISTS idx_order_component_key
          ON order_component_ref(component_key);

        -- 批量重算任务
        CREATE TABLE IF NOT EXISTS batch_job (
          job_id TEXT PRIMARY KEY,
          job_type TEXT NOT NULL,
          metal_types_json TEXT NOT NULL,
          triggered_by TEXT NOT NULL,
          status TEXT NOT NULL DEFAULT 'QUEUED',
          total_count INTEGER NOT NULL DEFAULT 0,
          processed_count INTEGER NOT NULL DEFAULT 0,
          succeeded_count INTEGER NOT NULL DEFAULT 0,
          failed_count INTEGER NOT NULL DEFAULT 0,
          skipped_count INTEGER NOT NULL DEFAULT 0,
          failures_json TEXT NOT NULL DEFAULT '[]',
          error_message TEXT,
          retry_of TEXT,
          attempt INTEGER NOT NULL DEFAULT 1,
          created_at TEXT NOT NULL,
          started_at TEXT,
          completed_at TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_batch_job_status
          ON batch_job(status, created_at);

        -- 价格变更历史
        CREATE TABLE IF NOT EXISTS price_history (
          history_id TEXT PRIMARY KEY,
          product_id TEXT NOT NULL,
          old_total REAL NOT NULL,
          new_total REAL NOT NULL,
          metal_rate REAL NOT NULL,
          trigger_source TEXT NOT NULL,
          job_id TEXT,
          created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_price_history_product
          ON price_history(product_id, created_at DESC);

        -- 审计日志
        CREATE TABLE IF NOT EXISTS audit_log (
          event_id TEXT PRIMARY KEY,
          action TEXT NOT NULL,
          entity_kind TEXT NOT NULL,
          entity_id TEXT NOT NULL,
          actor TEXT NOT NULL,
          payload_json TEXT,
          detail TEXT,
          created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_audit_entity
          ON audit_log(entity_kind, entity_id, created_at DESC);

        -- 配置项
        CREATE TABLE IF NOT EXISTS config_entry (
          config_key TEXT PRIMARY KEY,
          config_value TEXT NOT NULL,
          updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        INSERT OR IGNORE INTO schema_version (version) VALUES (1);
        "#,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
    }
}
