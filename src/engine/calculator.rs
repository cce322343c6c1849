// ==========================================
// 珠宝定价引擎 - 价格分解计算器
// ==========================================
// 红线: 纯函数, 不做任何 IO; 金价只从上下文注入
// 红线: 逐组件先四舍五入到 2 位再累计 (与历史快照逐位一致)
// 红线: PERCENTAGE 的 RUNNING_SUBTOTAL 基数 = 排序在前组件的累计值,
//       不是最终总价
// 说明: 隐藏组件折入金属成本行是独立的后处理纯函数, 可单测
// ==========================================

use crate::domain::component::ComponentConfig;
use crate::domain::pricing::{CalculationContext, ComponentValue, PriceBreakdown};
use crate::domain::types::{CalculationKind, PercentageBase};

/// 金额四舍五入到 2 位小数
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// 价格分解计算器
pub struct BreakdownCalculator;

impl BreakdownCalculator {
    /// 计算一份有序组件配置在给定上下文下的价格分解
    ///
    /// 算法:
    /// 1. 过滤激活组件, 按 sort_order 排序
    /// 2. 冻结组件直接取 frozen_value (不查金价, 不重算)
    /// 3. 其余按计算方式求值, 每个值先 round2 再进入运行小计
    ///
    /// 隐藏组件折入展示是独立后处理 (fold_hidden_components), 由落库/展示
    /// 调用方执行; 这里保留原始逐组件值 (冻结当前值依赖原始值)。
    pub fn calculate(components: &[ComponentConfig], ctx: &CalculationContext) -> PriceBreakdown {
        let rate = ctx.effective_rate();

        let mut active: Vec<&ComponentConfig> =
            components.iter().filter(|c| c.is_active).collect();
        if active.is_empty() {
            return PriceBreakdown::empty(rate);
        }
        active.sort_by_key(|c| c.sort_order);

        let mut values: Vec<ComponentValue> = Vec::with_capacity(active.len());
        let mut subtotal = 0.0_f64; // 运行小计: 已处理组件的累计
        let mut metal_cost = 0.0_f64; // 金属成本组件的值 (百分比基数之一)

        for config in active {
            let value = if config.is_frozen {
                // 冻结值按原样使用 (不变量保证 frozen_value 非空; 缺失按 0 兜底)
                config.frozen_value.unwrap_or(0.0)
            } else {
                match config.calculation_kind {
                    CalculationKind::PerWeight => {
                        // 金属成本组件用实时/手工金价作系数, 其余用配置系数
                        let coefficient = if config.is_metal_cost() {
                            rate
                        } else {
                            config.value
                        };
                        round2(ctx.net_weight_g * coefficient)
                    }
                    CalculationKind::Percentage => {
                        let base = match config.percentage_base {
                            PercentageBase::MetalCost => metal_cost,
                            PercentageBase::RunningSubtotal => subtotal,
                        };
                        round2(base * config.value / 100.0)
                    }
                    CalculationKind::Fixed => round2(config.value),
                }
            };

            if config.is_metal_cost() {
                metal_cost = value;
            }
            subtotal = round2(subtotal + value);

            values.push(ComponentValue {
                component_key: config.component_key.clone(),
                display_name: config.display_name.clone(),
                calculation_kind: config.calculation_kind,
                configured_value: config.value,
                value,
                is_frozen: config.is_frozen,
                is_visible: config.is_visible,
                sort_order: config.sort_order,
            });
        }

        PriceBreakdown {
            components: values,
            metal_cost,
            subtotal,
            total_price: subtotal,
            rate_used: rate,
        }
    }

    /// 后处理: 隐藏组件金额折入金属成本行
    ///
    /// 隐藏加价不得以独立行展示; 金额移入金属成本组件, 原行清零,
    /// subtotal / total_price 不受影响。
    pub fn fold_hidden_components(breakdown: &mut PriceBreakdown) {
        let hidden_sum: f64 = breakdown
            .components
            .iter()
            .filter(|c| !c.is_visible && c.component_key != crate::domain::METAL_COST_KEY)
            .map(|c| c.value)
            .sum();
        if hidden_sum == 0.0 {
            return;
        }

        let mut folded = false;
        for component in breakdown.components.iter_mut() {
            if component.component_key == crate::domain::METAL_COST_KEY {
                component.value = round2(component.value + hidden_sum);
                folded = true;
                break;
            }
        }
        // 无金属成本行则不折入 (隐藏行保留原值, 避免金额凭空丢失)
        if !folded {
            return;
        }

        for component in breakdown.components.iter_mut() {
            if !component.is_visible && component.component_key != crate::domain::METAL_COST_KEY {
                component.value = 0.0;
            }
        }
        breakdown.metal_cost = breakdown
            .components
            .iter()
            .find(|c| c.component_key == crate::domain::METAL_COST_KEY)
            .map(|c| c.value)
            .unwrap_or(breakdown.metal_cost);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::component::{PriceComponentDefinition, METAL_COST_KEY};
    use chrono::Utc;

    fn make_config(
        key: &str,
        kind: CalculationKind,
        value: f64,
        base: PercentageBase,
        order: i32,
    ) -> ComponentConfig {
        ComponentConfig::from_definition(&PriceComponentDefinition {
            component_key: key.to_string(),
            display_name: key.to_string(),
            display_order: order,
            calculation_kind: kind,
            default_value: value,
            percentage_base: base,
            is_system: false,
            is_freezable: true,
            is_active: true,
            is_visible: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
    }

    fn standard_components() -> Vec<ComponentConfig> {
        vec![
            make_config(METAL_COST_KEY, CalculationKind::PerWeight, 0.0, PercentageBase::MetalCost, 1),
            make_config("making_charge", CalculationKind::Percentage, 15.0, PercentageBase::MetalCost, 2),
            make_config("gst", CalculationKind::Percentage, 3.0, PercentageBase::RunningSubtotal, 3),
        ]
    }

    #[test]
    fn test_worked_example() {
        // netWeight=10, rate=15500:
        // metal_cost=155000; making=15% × 155000=23250;
        // gst 基数为前序小计 178250, 3% = 5347.50; 总价 183597.50
        let ctx = CalculationContext::new(10.0, 12.0, 15500.0);
        let b = BreakdownCalculator::calculate(&standard_components(), &ctx);
        assert_eq!(b.component_value(METAL_COST_KEY), Some(155000.0));
        assert_eq!(b.component_value("making_charge"), Some(23250.0));
        assert_eq!(b.component_value("gst"), Some(5347.50));
        assert_eq!(b.metal_cost, 155000.0);
        assert_eq!(b.total_price, 183597.50);
        assert_eq!(b.rate_used, 15500.0);
    }

    #[test]
    fn test_total_equals_sum_of_components() {
        let ctx = CalculationContext::new(7.321, 8.0, 14209.05);
        let b = BreakdownCalculator::calculate(&standard_components(), &ctx);
        let sum: f64 = b.components.iter().map(|c| c.value).sum();
        assert!((round2(sum) - b.total_price).abs() < 1e-9);
    }

    #[test]
    fn test_manual_rate_override_takes_precedence() {
        let ctx = CalculationContext::new(10.0, 12.0, 15500.0).with_manual_rate(14000.0);
        let b = BreakdownCalculator::calculate(&standard_components(), &ctx);
        assert_eq!(b.component_value(METAL_COST_KEY), Some(140000.0));
        assert_eq!(b.rate_used, 14000.0);
    }

    #[test]
    fn test_frozen_component_uses_frozen_value_verbatim() {
        let mut components = standard_components();
        let making = components
            .iter_mut()
            .find(|c| c.component_key == "making_charge")
            .unwrap();
        making.is_frozen = true;
        making.frozen_value = Some(20000.0);

        let ctx = CalculationContext::new(10.0, 12.0, 15500.0);
        let b = BreakdownCalculator::calculate(&components, &ctx);
        assert_eq!(b.component_value("making_charge"), Some(20000.0));
        // gst 基数 = 155000 + 20000 = 175000, 3% = 5250
        assert_eq!(b.component_value("gst"), Some(5250.0));
        assert_eq!(b.total_price, 180250.0);
    }

    #[test]
    fn test_zero_net_weight_yields_zero_metal_cost() {
        let ctx = CalculationContext::new(0.0, 5.0, 15500.0);
        let b = BreakdownCalculator::calculate(&standard_components(), &ctx);
        assert_eq!(b.metal_cost, 0.0);
        // 金属成本相对百分比基数同样为零, 不报错
        assert_eq!(b.component_value("making_charge"), Some(0.0));
        assert_eq!(b.total_price, 0.0);
    }

    #[test]
    fn test_empty_and_all_inactive_list() {
        let ctx = CalculationContext::new(10.0, 12.0, 15500.0);
        let b = BreakdownCalculator::calculate(&[], &ctx);
        assert_eq!(b.subtotal, 0.0);

        let mut components = standard_components();
        for c in components.iter_mut() {
            c.is_active = false;
        }
        let b = BreakdownCalculator::calculate(&components, &ctx);
        assert_eq!(b.subtotal, 0.0);
        assert!(b.components.is_empty());
    }

    #[test]
    fn test_fixed_component() {
        let mut components = standard_components();
        components.push(make_config(
            "hallmark",
            CalculationKind::Fixed,
            45.0,
            PercentageBase::MetalCost,
            4,
        ));
        let ctx = CalculationContext::new(10.0, 12.0, 15500.0);
        let b = BreakdownCalculator::calculate(&components, &ctx);
        assert_eq!(b.component_value("hallmark"), Some(45.0));
        assert_eq!(b.total_price, 183642.50);
    }

    #[test]
    fn test_rounding_before_accumulation() {
        // 0.333% × 10000.01 = 33.300033..., 每个组件值先 round2 再累计
        let components = vec![
            make_config("base_fee", CalculationKind::Fixed, 10000.01, PercentageBase::MetalCost, 1),
            make_config("levy", CalculationKind::Percentage, 0.333, PercentageBase::RunningSubtotal, 2),
        ];
        let ctx = CalculationContext::new(0.0, 0.0, 0.0);
        let b = BreakdownCalculator::calculate(&components, &ctx);
        assert_eq!(b.component_value("levy"), Some(33.30));
        assert_eq!(b.total_price, 10033.31);
    }

    #[test]
    fn test_hidden_component_folds_into_metal_cost() {
        let mut components = standard_components();
        let mut wastage = make_config(
            "wastage",
            CalculationKind::Percentage,
            2.0,
            PercentageBase::MetalCost,
            2,
        );
        wastage.is_visible = false;
        // 调整排序: metal_cost(1), wastage(2), making(3), gst(4)
        components
            .iter_mut()
            .find(|c| c.component_key == "making_charge")
            .unwrap()
            .sort_order = 3;
        components
            .iter_mut()
            .find(|c| c.component_key == "gst")
            .unwrap()
            .sort_order = 4;
        components.push(wastage);

        let ctx = CalculationContext::new(10.0, 12.0, 15500.0);
        let mut b = BreakdownCalculator::calculate(&components, &ctx);
        // 折入前隐藏行保留原始值 (冻结当前值依赖原始值)
        assert_eq!(b.component_value("wastage"), Some(3100.0));
        BreakdownCalculator::fold_hidden_components(&mut b);

        // wastage = 2% × 155000 = 3100, 折入金属成本行
        let metal_line = b
            .components
            .iter()
            .find(|c| c.component_key == METAL_COST_KEY)
            .unwrap();
        assert_eq!(metal_line.value, 158100.0);
        assert_eq!(b.metal_cost, 158100.0);
        let wastage_line = b
            .components
            .iter()
            .find(|c| c.component_key == "wastage")
            .unwrap();
        assert_eq!(wastage_line.value, 0.0);

        // 折入只移动金额: 总价与不折入时一致
        let sum: f64 = b.components.iter().map(|c| c.value).sum();
        assert!((round2(sum) - b.total_price).abs() < 1e-9);
    }

    #[test]
    fn test_fold_without_metal_cost_line_keeps_amounts() {
        let mut hidden = make_config(
            "handling",
            CalculationKind::Fixed,
            88.0,
            PercentageBase::MetalCost,
            1,
        );
        hidden.is_visible = false;
        let ctx = CalculationContext::new(0.0, 0.0, 0.0);
        let mut b = BreakdownCalculator::calculate(&[hidden], &ctx);
        BreakdownCalculator::fold_hidden_components(&mut b);
        // 无金属成本行时不折入, 金额保留避免丢失
        assert_eq!(b.component_value("handling"), Some(88.0));
        assert_eq!(b.total_price, 88.0);
    }
}
