// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、测试数据生成等功能
// ==========================================

use chrono::Utc;
use rusqlite::Connection;
use std::error::Error;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

use jewelry_pricing::db;
use jewelry_pricing::domain::component::{ComponentConfig, METAL_COST_KEY};
use jewelry_pricing::domain::metal::{Material, MetalGroup};
use jewelry_pricing::domain::product::Product;
use jewelry_pricing::domain::profile::{PricingProfile, ProfileOwner};
use jewelry_pricing::domain::types::{CalculationKind, PercentageBase};
use jewelry_pricing::repository::taxonomy_repo::TaxonomyNode;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_str().unwrap().to_string();

    let conn = db::open_sqlite_connection(&db_path)?;
    db::init_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 打开测试数据库连接 (统一 PRAGMA)
pub fn open_test_connection(db_path: &str) -> Result<Connection, Box<dyn Error>> {
    Ok(db::open_sqlite_connection(db_path)?)
}

/// 创建测试数据库并返回共享连接
pub fn setup_shared_db() -> (NamedTempFile, Arc<Mutex<Connection>>) {
    let (temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
    let conn = open_test_connection(&db_path).expect("打开数据库失败");
    (temp_file, Arc::new(Mutex::new(conn)))
}

// ==========================================
// 金属组 / 材料夹具
// ==========================================

/// 黄金金属组: spot 15000 + premium 500 = base 15500
pub fn gold_group(group_id: &str) -> MetalGroup {
    MetalGroup {
        group_id: group_id.to_string(),
        metal_type: "GOLD".to_string(),
        display_name: "黄金".to_string(),
        spot_price: 15000.0,
        premium: 500.0,
        base_price: 15500.0,
        auto_update: true,
        last_fetched_at: None,
        revision: 0,
        updated_at: Utc::now(),
    }
}

/// 22K 黄金材料: 纯度 91.6667/99.995, 单克价 base × 纯度比
pub fn gold_22k_material(material_id: &str, group_id: &str, price_per_gram: f64) -> Material {
    Material {
        material_id: material_id.to_string(),
        group_id: group_id.to_string(),
        display_name: "22K 黄金".to_string(),
        purity_numerator: 91.6667,
        purity_denominator: 99.995,
        price_per_gram,
        override_price: None,
        override_reason: None,
        override_by: None,
        override_at: None,
        updated_at: Utc::now(),
    }
}

// ==========================================
// 分类树夹具
// ==========================================

/// 分类节点: 父分类 cat_rings → 子类目 sub_gold_rings
pub fn category_node(node_id: &str) -> TaxonomyNode {
    TaxonomyNode {
        node_id: node_id.to_string(),
        node_kind: "CATEGORY".to_string(),
        display_name: "戒指".to_string(),
        parent_id: None,
        ancestor_ids: vec![],
        has_pricing_config: false,
    }
}

pub fn subcategory_node(node_id: &str, parent_id: &str) -> TaxonomyNode {
    TaxonomyNode {
        node_id: node_id.to_string(),
        node_kind: "SUBCATEGORY".to_string(),
        display_name: "黄金戒指".to_string(),
        parent_id: Some(parent_id.to_string()),
        ancestor_ids: vec![parent_id.to_string()],
        has_pricing_config: false,
    }
}

// ==========================================
// 商品夹具
// ==========================================

pub fn test_product(
    product_id: &str,
    subcategory_id: &str,
    material_id: &str,
    net_weight_g: f64,
) -> Product {
    Product {
        product_id: product_id.to_string(),
        parent_product_id: None,
        sku: format!("SKU-{}", product_id),
        display_name: format!("测试商品_{}", product_id),
        subcategory_id: subcategory_id.to_string(),
        material_id: material_id.to_string(),
        metal_type: "GOLD".to_string(),
        net_weight_g,
        gross_weight_g: net_weight_g + 2.0,
        has_pricing_config: false,
        all_components_frozen: false,
        metal_cost: 0.0,
        subtotal: 0.0,
        total_price: 0.0,
        breakdown_json: None,
        price_updated_at: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

// ==========================================
// 定价配置夹具
// ==========================================

fn component(
    key: &str,
    name: &str,
    kind: CalculationKind,
    value: f64,
    base: PercentageBase,
    sort_order: i32,
) -> ComponentConfig {
    ComponentConfig {
        component_key: key.to_string(),
        display_name: name.to_string(),
        calculation_kind: kind,
        value,
        percentage_base: base,
        is_frozen: false,
        frozen_value: None,
        original_kind: None,
        original_value: None,
        frozen_at: None,
        rate_at_freeze: None,
        freeze_reason: None,
        frozen_by: None,
        is_freezable: true,
        is_active: true,
        is_visible: true,
        sort_order,
    }
}

/// 标准四组件配置: 金属成本 + 工费 15% + 损耗 2% (隐藏) + 消费税 3% (运行小计)
pub fn standard_components() -> Vec<ComponentConfig> {
    let metal = component(
        METAL_COST_KEY,
        "金属成本",
        CalculationKind::PerWeight,
        1.0,
        PercentageBase::MetalCost,
        0,
    );

    let making = component(
        "making_charge",
        "工费",
        CalculationKind::Percentage,
        15.0,
        PercentageBase::MetalCost,
        2,
    );

    let mut wastage = component(
        "wastage",
        "损耗",
        CalculationKind::Percentage,
        2.0,
        PercentageBase::MetalCost,
        3,
    );
    wastage.is_visible = false;

    let mut gst = component(
        "gst",
        "消费税",
        CalculationKind::Percentage,
        3.0,
        PercentageBase::RunningSubtotal,
        10,
    );
    gst.is_freezable = false;

    vec![metal, making, wastage, gst]
}

/// 子类目级标准配置
pub fn standard_profile(subcategory_id: &str) -> PricingProfile {
    let mut profile = PricingProfile::new(ProfileOwner::subcategory(subcategory_id));
    profile.components = standard_components();
    profile
}
