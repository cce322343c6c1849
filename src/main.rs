// ==========================================
// 珠宝定价引擎 - 维护入口
// ==========================================
// 职责: 初始化数据库/系统组件, 执行启动恢复 (中断任务标失效 + 补偿重提)
// 技术栈: Rust + SQLite
// ==========================================

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use tracing::info;

use jewelry_pricing::config::config_manager::ConfigManager;
use jewelry_pricing::db;
use jewelry_pricing::engine::orchestrator::BulkRecalcOrchestrator;
use jewelry_pricing::engine::registry::{seed_system_components, ComponentRegistry};
use jewelry_pricing::engine::resolver::InheritanceResolver;
use jewelry_pricing::logging;
use jewelry_pricing::repository::component_repo::PriceComponentRepository;
use jewelry_pricing::repository::job_repo::BatchJobRepository;
use jewelry_pricing::repository::metal_repo::MaterialRepository;
use jewelry_pricing::repository::product_repo::ProductRepository;
use jewelry_pricing::repository::profile_repo::PricingProfileRepository;
use jewelry_pricing::repository::taxonomy_repo::TaxonomyRepository;

/// 默认数据库路径: <系统数据目录>/jewelry-pricing/pricing.db
fn default_db_path() -> String {
    let base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
    let dir = base.join("jewelry-pricing");
    dir.join("pricing.db").to_string_lossy().to_string()
}

fn main() -> anyhow::Result<()> {
    logging::init();

    info!("==================================================");
    info!("{} - 维护入口", jewelry_pricing::APP_NAME);
    info!("版本: {}", jewelry_pricing::VERSION);
    info!("==================================================");

    let db_path = std::env::var("JEWELRY_PRICING_DB").unwrap_or_else(|_| default_db_path());
    info!("使用数据库: {}", db_path);

    if let Some(parent) = PathBuf::from(&db_path).parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("创建数据目录失败: {}", parent.display()))?;
    }

    let conn = db::open_sqlite_connection(&db_path).context("打开数据库失败")?;
    db::init_schema(&conn).context("初始化数据库结构失败")?;
    let conn = Arc::new(Mutex::new(conn));

    // 系统组件种子 (幂等)
    let registry = ComponentRegistry::new(Arc::new(PriceComponentRepository::from_connection(
        Arc::clone(&conn),
    )));
    seed_system_components(&registry).context("系统组件种子失败")?;

    // 启动恢复: 超时在途任务标失效 + 一次性补偿重提
    let config_manager = ConfigManager::from_connection(Arc::clone(&conn));
    let resolver = Arc::new(InheritanceResolver::new(
        Arc::new(PricingProfileRepository::from_connection(Arc::clone(&conn))),
        Arc::new(TaxonomyRepository::from_connection(Arc::clone(&conn))),
    ));
    let orchestrator = BulkRecalcOrchestrator::new(
        Arc::new(BatchJobRepository::from_connection(Arc::clone(&conn))),
        Arc::new(ProductRepository::from_connection(Arc::clone(&conn))),
        Arc::new(MaterialRepository::from_connection(Arc::clone(&conn))),
        resolver,
        config_manager.load_recalc_config(),
    );
    let report = orchestrator
        .recover_on_start()
        .context("启动恢复执行失败")?;

    info!(
        stale_failed = report.stale_failed.len(),
        resubmitted = report.resubmitted.len(),
        "启动恢复完成"
    );
    Ok(())
}
