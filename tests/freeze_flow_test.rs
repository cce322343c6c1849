// ==========================================
// 冻结/解冻集成测试
// ==========================================
// 测试范围:
// 1. 冻结钉住当前计算值, 行情变化不影响冻结组件
// 2. 解冻精确还原冻结前计算语义
// 3. 子类目级冻结必须填写原因
// 4. 全组件冻结标记维护 (批量重算跳过依据)
// ==========================================

mod test_helpers;

use std::sync::{Arc, Mutex};

use jewelry_pricing::api::{ApiError, PricingApi};
use jewelry_pricing::domain::pricing::CalculationContext;
use jewelry_pricing::domain::profile::ProfileOwner;
use jewelry_pricing::engine::freeze::FreezeController;
use jewelry_pricing::engine::resolver::InheritanceResolver;
use jewelry_pricing::repository::audit_repo::AuditLogRepository;
use jewelry_pricing::repository::metal_repo::{MaterialRepository, MetalGroupRepository};
use jewelry_pricing::repository::product_repo::ProductRepository;
use jewelry_pricing::repository::profile_repo::PricingProfileRepository;
use jewelry_pricing::repository::taxonomy_repo::TaxonomyRepository;
use rusqlite::Connection;
use tempfile::NamedTempFile;

// ==========================================
// 辅助函数
// ==========================================

struct TestEnv {
    _temp_file: NamedTempFile,
    api: PricingApi,
    controller: Arc<FreezeController>,
    product_repo: Arc<ProductRepository>,
    profile_repo: Arc<PricingProfileRepository>,
    material_repo: Arc<MaterialRepository>,
}

fn setup_env() -> TestEnv {
    let (temp_file, conn) = test_helpers::setup_shared_db();
    seed_scenario(&conn);

    let product_repo = Arc::new(ProductRepository::from_connection(Arc::clone(&conn)));
    let profile_repo = Arc::new(PricingProfileRepository::from_connection(Arc::clone(&conn)));
    let taxonomy_repo = Arc::new(TaxonomyRepository::from_connection(Arc::clone(&conn)));
    let material_repo = Arc::new(MaterialRepository::from_connection(Arc::clone(&conn)));
    let audit_repo = Arc::new(AuditLogRepository::from_connection(Arc::clone(&conn)));
    let resolver = Arc::new(InheritanceResolver::new(
        Arc::clone(&profile_repo),
        Arc::clone(&taxonomy_repo),
    ));
    let controller = Arc::new(FreezeController::new(Arc::clone(&profile_repo)));

    let api = PricingApi::new(
        Arc::clone(&product_repo),
        Arc::clone(&profile_repo),
        taxonomy_repo,
        Arc::clone(&material_repo),
        resolver,
        Arc::clone(&controller),
        audit_repo,
    );

    TestEnv {
        _temp_file: temp_file,
        api,
        controller,
        product_repo,
        profile_repo,
        material_repo,
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

// ==========================================
// 商品级冻结
// ==========================================

#[test]
fn test_freeze_pins_value_against_rate_change() {
    let env = setup_env();
    env.api.customize_pricing("prod_1", "tester").expect("克隆失败");

    // 当前工费: 140000 × 15% = 21000, 冻结钉住
    let outcome = env
        .api
        .freeze_product_component("prod_1", "making_charge", None, "tester")
        .expect("冻结失败");
    assert!((outcome.value - 21000.0).abs() < 1e-6);
    assert!((outcome.rate_used - 14000.0).abs() < 1e-6);

    // 行情上涨: 材料单克价 14000 → 16000
    let mut material = env
        .material_repo
        .find_by_id("mat_22k")
        .unwrap()
        .expect("材料不存在");
    material.price_per_gram = 16000.0;
    env.material_repo.update(&material).expect("更新材料失败");

    // 金属成本随行情变化 (160000 + 隐藏损耗 3200), 冻结的工费保持 21000
    let breakdown = env.api.price_product("prod_1", "tester").expect("计算失败");
    assert!((breakdown.metal_cost - 163200.0).abs() < 1e-6);
    let making = breakdown.component_value("making_charge").expect("无工费行");
    assert!((making - 21000.0).abs() < 1e-6);
}

#[test]
fn test_unfreeze_restores_original_semantics() {
    let env = setup_env();
    env.api.customize_pricing("prod_1", "tester").expect("克隆失败");

    env.api
        .freeze_product_component("prod_1", "making_charge", None, "tester")
        .expect("冻结失败");

    // 冻结期间行情变化
    let mut material = env
        .material_repo
        .find_by_id("mat_22k")
        .unwrap()
        .expect("材料不存在");
    material.price_per_gram = 16000.0;
    env.material_repo.update(&material).expect("更新材料失败");

    // 解冻后立即按当前行情重算: 160000 × 15% = 24000
    let outcome = env
        .api
        .unfreeze_product_component("prod_1", "making_charge", "tester")
        .expect("解冻失败");
    assert!((outcome.value - 24000.0).abs() < 1e-6);

    // 冻结状态字段全部清空, 计算语义完整还原
    let owner = ProfileOwner::product("prod_1");
    let profile = env
        .profile_repo
        .find_by_owner(&owner)
        .unwrap()
        .expect("配置不存在");
    let making = profile.find_component("making_charge").expect("无工费组件");
    assert!(!making.is_frozen);
    assert!(making.frozen_value.is_none());
    assert!(making.original_kind.is_none());
    assert!(making.original_value.is_none());
    assert!((making.value - 15.0).abs() < 1e-6);
}

#[test]
fn test_freeze_not_freezable_component_rejected() {
    let env = setup_env();
    env.api.customize_pricing("prod_1", "tester").expect("克隆失败");

    // 消费税 is_freezable=false
    let result = env
        .api
        .freeze_product_component("prod_1", "gst", None, "tester");
    assert!(matches!(result, Err(ApiError::InvalidState(_))));
}

#[test]
fn test_double_freeze_rejected() {
    let env = setup_env();
    env.api.customize_pricing("prod_1", "tester").expect("克隆失败");

    env.api
        .freeze_product_component("prod_1", "making_charge", None, "tester")
        .expect("冻结失败");
    let second = env
        .api
        .freeze_product_component("prod_1", "making_charge", None, "tester");
    assert!(matches!(second, Err(ApiError::InvalidState(_))));
}

#[test]
fn test_all_frozen_flag_tracks_freezable_components() {
    let env = setup_env();
    env.api.customize_pricing("prod_1", "tester").expect("克隆失败");

    // 可冻结组件: 金属成本/工费/损耗 (消费税 is_freezable=false, 不参与判定)
    env.api
        .freeze_product_component("prod_1", "making_charge", None, "tester")
        .expect("冻结失败");
    env.api
        .freeze_product_component("prod_1", "wastage", None, "tester")
        .expect("冻结失败");
    assert!(!env
        .product_repo
        .find_by_id("prod_1")
        .unwrap()
        .unwrap()
        .all_components_frozen);

    env.api
        .freeze_product_component("prod_1", jewelry_pricing::domain::component::METAL_COST_KEY, None, "tester")
        .expect("冻结失败");
    assert!(env
        .product_repo
        .find_by_id("prod_1")
        .unwrap()
        .unwrap()
        .all_components_frozen);

    // 任一解冻即恢复参与重算
    env.api
        .unfreeze_product_component("prod_1", "wastage", "tester")
        .expect("解冻失败");
    assert!(!env
        .product_repo
        .find_by_id("prod_1")
        .unwrap()
        .unwrap()
        .all_components_frozen);
}

// ==========================================
// 子类目级冻结
// ==========================================

#[test]
fn test_subcategory_freeze_requires_reason() {
    let env = setup_env();
    let ctx = CalculationContext::new(10.0, 12.0, 14000.0);

    let missing = env.api.freeze_subcategory_component(
        "sub_gold_rings",
        "making_charge",
        &ctx,
        None,
        "tester",
    );
    assert!(matches!(missing, Err(ApiError::InvalidInput(_))));

    let blank = env.api.freeze_subcategory_component(
        "sub_gold_rings",
        "making_charge",
        &ctx,
        Some("  "),
        "tester",
    );
    assert!(matches!(blank, Err(ApiError::InvalidInput(_))));

    let outcome = env
        .api
        .freeze_subcategory_component(
            "sub_gold_rings",
            "making_charge",
            &ctx,
            Some("大促锁价"),
            "tester",
        )
        .expect("冻结失败");
    assert!((outcome.value - 21000.0).abs() < 1e-6);

    let owner = ProfileOwner::subcategory("sub_gold_rings");
    let profile = env
        .profile_repo
        .find_by_owner(&owner)
        .unwrap()
        .expect("配置不存在");
    let making = profile.find_component("making_charge").expect("无工费组件");
    assert_eq!(making.freeze_reason.as_deref(), Some("大促锁价"));
    assert_eq!(making.frozen_by.as_deref(), Some("tester"));
}

#[test]
fn test_unfreeze_not_frozen_rejected() {
    let env = setup_env();
    let ctx = CalculationContext::new(10.0, 12.0, 14000.0);

    let owner = ProfileOwner::subcategory("sub_gold_rings");
    let result = env.controller.unfreeze(&owner, "making_charge", &ctx, "tester");
    assert!(result.is_err());
}
