// ==========================================
// 外部行情同步集成测试
// ==========================================
// 测试范围:
// 1. 拉取 → 级联 → 批量重算整链路
// 2. 上游失败: 保留最近已知价, 报可恢复错误
// 3. auto_update 关闭 / 上游缺行情的组跳过
// ==========================================

mod test_helpers;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use jewelry_pricing::domain::types::JobStatus;
use jewelry_pricing::engine::cascade::MetalRateCascade;
use jewelry_pricing::engine::error::EngineError;
use jewelry_pricing::engine::orchestrator::{BulkRecalcOrchestrator, RecalcOrchestratorConfig};
use jewelry_pricing::engine::rate_feed::{FixedRateFeed, RateFeed, RateSyncService};
use jewelry_pricing::engine::resolver::InheritanceResolver;
use jewelry_pricing::repository::job_repo::BatchJobRepository;
use jewelry_pricing::repository::metal_repo::{MaterialRepository, MetalGroupRepository};
use jewelry_pricing::repository::product_repo::ProductRepository;
use jewelry_pricing::repository::profile_repo::PricingProfileRepository;
use jewelry_pricing::repository::taxonomy_repo::TaxonomyRepository;
use rusqlite::Connection;
use tempfile::NamedTempFile;

// ==========================================
// 辅助函数
// ==========================================

/// 始终失败的行情源 (模拟上游不可用)
struct BrokenFeed;

#[async_trait]
impl RateFeed for BrokenFeed {
    async fn fetch_spot_prices(&self) -> anyhow::Result<HashMap<String, f64>> {
        anyhow::bail!("上游超时")
    }
}

struct TestEnv {
    _temp_file: NamedTempFile,
    group_repo: Arc<MetalGroupRepository>,
    material_repo: Arc<MaterialRepository>,
    job_repo: Arc<BatchJobRepository>,
    cascade: Arc<MetalRateCascade>,
    orchestrator: Arc<BulkRecalcOrchestrator>,
}

fn setup_env() -> TestEnv {
    let (temp_file, conn) = test_helpers::setup_shared_db();
    seed_scenario(&conn);

    let group_repo = Arc::new(MetalGroupRepository::from_connection(Arc::clone(&conn)));
    let material_repo = Arc::new(MaterialRepository::from_connection(Arc::clone(&conn)));
    let taxonomy_repo = Arc::new(TaxonomyRepository::from_connection(Arc::clone(&conn)));
    let product_repo = Arc::new(ProductRepository::from_connection(Arc::clone(&conn)));
    let profile_repo = Arc::new(PricingProfileRepository::from_connection(Arc::clone(&conn)));
    let job_repo = Arc::new(BatchJobRepository::from_connection(Arc::clone(&conn)));

    let cascade = Arc::new(MetalRateCascade::new(
        Arc::clone(&group_repo),
        Arc::clone(&material_repo),
    ));
    let resolver = Arc::new(InheritanceResolver::new(profile_repo, taxonomy_repo));
    let orchestrator = Arc::new(BulkRecalcOrchestrator::new(
        Arc::clone(&job_repo),
        product_repo,
        Arc::clone(&material_repo),
        resolver,
        RecalcOrchestratorConfig::default(),
    ));

    TestEnv {
        _temp_file: temp_file,
        group_repo,
        material_repo,
        job_repo,
        cascade,
        orchestrator,
    }
}

fn seed_scenario(conn: &Arc<Mutex<Connection>>) {
    let group_repo = MetalGroupRepository::from_connection(Arc::clone(conn));
    let material_repo = MaterialRepository::from_connection(Arc::clone(conn));
    let taxonomy_repo = TaxonomyRepository::from_connection(Arc::clone(conn));
    let product_repo = ProductRepository::from_connection(Arc::clone(conn));
    let profile_repo = PricingProfileRepository::from_connection(Arc::clone(conn));

    group_repo
        .create(&test_helpers::gold_group("grp_gold"))
        .expect("创建金属组失败");
    // 银组: auto_update 关闭
    let mut silver = test_helpers::gold_group("grp_silver");
    silver.metal_type = "SILVER".to_string();
    silver.display_name = "白银".to_string();
    silver.spot_price = 12.0;
    silver.premium = 1.0;
    silver.base_price = 13.0;
    silver.auto_update = false;
    group_repo.create(&silver).expect("创建银组失败");

    material_repo
        .create(&test_helpers::gold_22k_material("mat_22k", "grp_gold", 14000.0))
        .expect("创建材料失败");
    taxonomy_repo
        .create(&test_helpers::category_node("cat_rings"))
        .expect("创建分类失败");
    taxonomy_repo
        .create(&test_helpers::subcategory_node("sub_gold_rings", "cat_rings"))
        .expect("创建子类目失败");
    product_repo
        .create(&test_helpers::test_product("prod_1", "sub_gold_rings", "mat_22k", 10.0))
        .expect("创建商品失败");
    profile_repo
        .create(&test_helpers::standard_profile("sub_gold_rings"))
        .expect("创建子类目配置失败");
}

fn service_with(env: &TestEnv, feed: Arc<dyn RateFeed>) -> RateSyncService {
    RateSyncService::new(
        feed,
        Arc::clone(&env.group_repo),
        Arc::clone(&env.cascade),
        Arc::clone(&env.orchestrator),
    )
}

// ==========================================
// 正常同步
// ==========================================

#[tokio::test]
async fn test_sync_cascades_and_triggers_recalc() {
    let env = setup_env();
    let mut prices = HashMap::new();
    prices.insert("GOLD".to_string(), 16000.0);
    prices.insert("SILVER".to_string(), 14.0);
    let service = service_with(&env, Arc::new(FixedRateFeed { prices }));

    let report = service.sync_once("rate_sync").await.expect("同步失败");
    assert_eq!(report.updated_groups, vec!["GOLD".to_string()]);
    // 银组 auto_update 关闭 → 跳过
    assert_eq!(report.skipped_groups, vec!["SILVER".to_string()]);

    // 级联: base 16000+500=16500, last_fetched_at 已记录
    let gold = env.group_repo.find_by_id("grp_gold").unwrap().expect("组不存在");
    assert!((gold.base_price - 16500.0).abs() < 1e-6);
    assert!(gold.last_fetched_at.is_some());

    let silver = env.group_repo.find_by_id("grp_silver").unwrap().expect("银组不存在");
    assert!((silver.base_price - 13.0).abs() < 1e-6);

    // 材料纯度折算
    let material = env
        .material_repo
        .find_by_id("mat_22k")
        .unwrap()
        .expect("材料不存在");
    let expected = (16500.0 * (91.6667 / 99.995) * 100.0_f64).round() / 100.0;
    assert!((material.price_per_gram - expected).abs() < 1e-9);

    // 批量重算已执行完成
    let job_id = report.job_id.expect("未触发批量任务");
    let job = env.job_repo.find_by_id(&job_id).unwrap().expect("任务不存在");
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.succeeded_count, 1);
}

#[tokio::test]
async fn test_sync_skips_metal_missing_from_feed() {
    let env = setup_env();
    // 上游只报银价; 金组保留最近已知价
    let mut prices = HashMap::new();
    prices.insert("SILVER".to_string(), 14.0);
    let service = service_with(&env, Arc::new(FixedRateFeed { prices }));

    let report = service.sync_once("rate_sync").await.expect("同步失败");
    assert!(report.updated_groups.is_empty());
    assert!(report.job_id.is_none());

    let gold = env.group_repo.find_by_id("grp_gold").unwrap().expect("组不存在");
    assert!((gold.base_price - 15500.0).abs() < 1e-6);
}

// ==========================================
// 上游失败
// ==========================================

#[tokio::test]
async fn test_upstream_failure_keeps_last_known_prices() {
    let env = setup_env();
    let service = service_with(&env, Arc::new(BrokenFeed));

    let result = service.sync_once("rate_sync").await;
    assert!(matches!(result, Err(EngineError::UpstreamUnavailable(_))));

    // 所有组/材料保留最近已知价, 绝不置零
    let gold = env.group_repo.find_by_id("grp_gold").unwrap().expect("组不存在");
    assert!((gold.base_price - 15500.0).abs() < 1e-6);
    let material = env
        .material_repo
        .find_by_id("mat_22k")
        .unwrap()
        .expect("材料不存在");
    assert!((material.price_per_gram - 14000.0).abs() < 1e-6);
}
