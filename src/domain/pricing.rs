// ==========================================
// 珠宝定价引擎 - 价格分解领域模型
// ==========================================
// 用途: Breakdown Calculator 的输入上下文与输出结构
// 红线: 逐组件先四舍五入到 2 位再累计 (与历史快照逐位一致)
// ==========================================

use crate::domain::types::CalculationKind;
use serde::{Deserialize, Serialize};

// ==========================================
// CalculationContext - 计算上下文
// ==========================================
// 说明: 金价通过显式上下文注入, 不读全局状态 (测试可注入固定金价复现计算)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculationContext {
    pub net_weight_g: f64,   // 净金重 (克)
    pub gross_weight_g: f64, // 总重 (克, 含镶嵌)
    pub metal_rate: f64,     // 材料单克价 (纯度折算后)
    pub manual_rate_override: Option<f64>, // 试算/冻结用手工金价 (优先于 metal_rate)
}

impl CalculationContext {
    pub fn new(net_weight_g: f64, gross_weight_g: f64, metal_rate: f64) -> Self {
        Self {
            net_weight_g,
            gross_weight_g,
            metal_rate,
            manual_rate_override: None,
        }
    }

    pub fn with_manual_rate(mut self, rate: f64) -> Self {
        self.manual_rate_override = Some(rate);
        self
    }

    /// 本次计算生效的金价
    pub fn effective_rate(&self) -> f64 {
        self.manual_rate_override.unwrap_or(self.metal_rate)
    }
}

// ==========================================
// ComponentValue - 单组件计算结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentValue {
    pub component_key: String,
    pub display_name: String,
    pub calculation_kind: CalculationKind,
    pub configured_value: f64, // 配置的系数/百分比/金额
    pub value: f64,            // 计算出的金额 (已四舍五入到 2 位)
    pub is_frozen: bool,       // 本次是否取自冻结值
    pub is_visible: bool,      // false = 已折入金属成本行
    pub sort_order: i32,
}

// ==========================================
// PriceBreakdown - 价格分解结果
// ==========================================
// 不变量: total_price = 有序组件金额之和 (折入处理只移动金额, 总价不变)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub components: Vec<ComponentValue>, // 按 sort_order 排列
    pub metal_cost: f64,                 // 金属成本组件的金额 (折入后含隐藏组件)
    pub subtotal: f64,                   // 全部组件金额之和
    pub total_price: f64,                // 当前等于 subtotal; 外部加项 (镶石) 由调用方累加
    pub rate_used: f64,                  // 本次计算使用的金价 (审计/冻结记录)
}

impl PriceBreakdown {
    /// 空列表/全非激活组件的合法零结果
    pub fn empty(rate_used: f64) -> Self {
        Self {
            components: Vec::new(),
            metal_cost: 0.0,
            subtotal: 0.0,
            total_price: 0.0,
            rate_used,
        }
    }

    /// 按键取组件金额
    pub fn component_value(&self, component_key: &str) -> Option<f64> {
        self.components
            .iter()
            .find(|c| c.component_key == component_key)
            .map(|c| c.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_rate_prefers_manual_override() {
        let ctx = CalculationContext::new(10.0, 12.0, 15500.0);
        assert_eq!(ctx.effective_rate(), 15500.0);
        let ctx = ctx.with_manual_rate(14000.0);
        assert_eq!(ctx.effective_rate(), 14000.0);
    }

    #[test]
    fn test_empty_breakdown_is_zero() {
        let b = PriceBreakdown::empty(15500.0);
        assert_eq!(b.subtotal, 0.0);
        assert_eq!(b.total_price, 0.0);
        assert!(b.components.is_empty());
    }
}
