// ==========================================
// 珠宝定价引擎 - 金属行情领域模型
// ==========================================
// 级联链路: 现货价 → 金属组基准价 → 纯度折算材料单价 → 商品价格
// 红线: base_price = spot_price + premium, 输入变更后必须同步重算
// 红线: 材料人工覆盖价生效期间免疫级联重算
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// MetalGroup - 金属组
// ==========================================
// 用途: 同一金属 (如黄金/白银/铂金) 的行情入口
// 对齐: metal_group 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetalGroup {
    // ===== 主键 =====
    pub group_id: String,

    // ===== 标识 =====
    pub metal_type: String,   // 金属类型键 (GOLD/SILVER/PLATINUM, 商品与材料按此关联)
    pub display_name: String, // 展示名称

    // ===== 行情 =====
    pub spot_price: f64, // 现货价 (每克, 100% 纯度参考)
    pub premium: f64,    // 升贴水
    pub base_price: f64, // 基准价 = spot_price + premium (派生, 禁止独立维护)

    // ===== 自动更新 =====
    pub auto_update: bool,                      // 是否接受外部行情自动刷新
    pub last_fetched_at: Option<DateTime<Utc>>, // 最近一次外部拉取时刻

    // ===== 并发控制与审计 =====
    pub revision: i32,
    pub updated_at: DateTime<Utc>,
}

impl MetalGroup {
    /// 应用新行情并同步重算基准价
    pub fn apply_rate(&mut self, spot_price: f64, premium: f64) {
        self.spot_price = spot_price;
        self.premium = premium;
        self.base_price = spot_price + premium;
        self.updated_at = Utc::now();
    }
}

// ==========================================
// Material - 材料 (纯度折算后的可售金属)
// ==========================================
// 用途: 商品引用的实际计价材料 (如 22K 金 = 91.6667/99.995)
// 对齐: material 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Material {
    // ===== 主键与关联 =====
    pub material_id: String,
    pub group_id: String, // 关联 metal_group (恰好一个)

    // ===== 标识 =====
    pub display_name: String, // 如 "22K 黄金"

    // ===== 纯度 (相对 100% 纯度参考的比值) =====
    pub purity_numerator: f64,   // 如 91.6667
    pub purity_denominator: f64, // 如 99.995

    // ===== 计算结果 =====
    pub price_per_gram: f64, // 单克价 = base_price × 纯度比 (覆盖生效时为覆盖价)

    // ===== 人工覆盖 (生效期间免疫级联) =====
    pub override_price: Option<f64>,
    pub override_reason: Option<String>,
    pub override_by: Option<String>,
    pub override_at: Option<DateTime<Utc>>,

    // ===== 审计字段 =====
    pub updated_at: DateTime<Utc>,
}

impl Material {
    /// 纯度比值
    pub fn purity_ratio(&self) -> f64 {
        if self.purity_denominator == 0.0 {
            return 0.0;
        }
        self.purity_numerator / self.purity_denominator
    }

    /// 人工覆盖是否生效
    pub fn is_override_active(&self) -> bool {
        self.override_price.is_some()
    }

    /// 从金属组基准价重算单克价 (覆盖生效时由调用方跳过)
    pub fn recalculated_price(&self, base_price: f64) -> f64 {
        base_price * self.purity_ratio()
    }

    /// 清除人工覆盖字段 (调用方随后必须按当前基准价重算一次)
    pub fn clear_override(&mut self) {
        self.override_price = None;
        self.override_reason = None;
        self.override_by = None;
        self.override_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_rate_recomputes_base() {
        let mut group = MetalGroup {
            group_id: "g1".to_string(),
            metal_type: "GOLD".to_string(),
            display_name: "黄金".to_string(),
            spot_price: 14000.0,
            premium: 300.0,
            base_price: 14300.0,
            auto_update: true,
            last_fetched_at: None,
            revision: 0,
            updated_at: Utc::now(),
        };
        group.apply_rate(15000.0, 500.0);
        assert_eq!(group.base_price, 15500.0);
    }

    #[test]
    fn test_purity_adjusted_price() {
        let material = Material {
            material_id: "m1".to_string(),
            group_id: "g1".to_string(),
            display_name: "22K 黄金".to_string(),
            purity_numerator: 91.6667,
            purity_denominator: 99.995,
            price_per_gram: 0.0,
            override_price: None,
            override_reason: None,
            override_by: None,
            override_at: None,
            updated_at: Utc::now(),
        };
        let price = material.recalculated_price(15500.0);
        // 15500 × (91.6667/99.995) ≈ 14209.05
        assert!((price - 14209.05).abs() < 0.01);
    }

    #[test]
    fn test_zero_denominator_yields_zero() {
        let material = Material {
            material_id: "m1".to_string(),
            group_id: "g1".to_string(),
            display_name: "坏数据".to_string(),
            purity_numerator: 91.6667,
            purity_denominator: 0.0,
            price_per_gram: 0.0,
            override_price: None,
            override_reason: None,
            override_by: None,
            override_at: None,
            updated_at: Utc::now(),
        };
        assert_eq!(material.recalculated_price(15500.0), 0.0);
    }
}
