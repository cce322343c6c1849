// ==========================================
// 珠宝定价引擎 - 商品领域模型
// ==========================================
// 说明: 商品/变体持有计算后的价格快照, 不拥有金属组或材料
// 说明: 变体以 parent_product_id 关联母商品, 共用同一张表
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// Product - 商品 / 变体
// ==========================================
// 对齐: product 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    // ===== 主键与层级 =====
    pub product_id: String,
    pub parent_product_id: Option<String>, // Some = 变体

    // ===== 基础信息 =====
    pub sku: String,
    pub display_name: String,
    pub subcategory_id: String, // 继承解析的起点

    // ===== 材料关联 =====
    pub material_id: String,
    pub metal_type: String, // 冗余自材料所属金属组 (批量重算按此筛选)

    // ===== 克重 =====
    pub net_weight_g: f64,
    pub gross_weight_g: f64,

    // ===== 定价状态 =====
    pub has_pricing_config: bool,      // 是否持有本地覆盖配置 (与 pricing_profile 存在性一致)
    pub all_components_frozen: bool,   // 生效配置是否全冻结 (批量重算跳过依据)

    // ===== 价格快照 (最近一次计算结果) =====
    pub metal_cost: f64,
    pub subtotal: f64,
    pub total_price: f64,
    pub breakdown_json: Option<String>, // 完整 PriceBreakdown 序列化
    pub price_updated_at: Option<DateTime<Utc>>,

    // ===== 审计字段 =====
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// 变体判定
    pub fn is_variant(&self) -> bool {
        self.parent_product_id.is_some()
    }
}
