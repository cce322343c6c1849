// ==========================================
// 珠宝定价引擎 - 领域类型定义
// ==========================================
// 依据: 定价组件体系 (PER_WEIGHT / PERCENTAGE / FIXED)
// 红线: 计算方式为受限枚举, 禁止自由表达式求值
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// 计算方式 (Calculation Kind)
// ==========================================
// 红线: 三种受限原语, 组合能力通过 PERCENTAGE 的基数选择实现
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CalculationKind {
    PerWeight,  // 按克重: 净重 × 系数 (金属成本组件使用实时金价作为系数)
    Percentage, // 百分比: 基数 × 值 / 100
    Fixed,      // 固定金额
}

impl fmt::Display for CalculationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalculationKind::PerWeight => write!(f, "PER_WEIGHT"),
            CalculationKind::Percentage => write!(f, "PERCENTAGE"),
            CalculationKind::Fixed => write!(f, "FIXED"),
        }
    }
}

impl FromStr for CalculationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PER_WEIGHT" => Ok(CalculationKind::PerWeight),
            "PERCENTAGE" => Ok(CalculationKind::Percentage),
            "FIXED" => Ok(CalculationKind::Fixed),
            other => Err(format!("未知的计算方式: {}", other)),
        }
    }
}

// ==========================================
// 百分比基数 (Percentage Base)
// ==========================================
// METAL_COST: 以金属成本组件的值为基数
// RUNNING_SUBTOTAL: 以"排序在前的组件累计小计"为基数 (非最终总价)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PercentageBase {
    MetalCost,
    RunningSubtotal,
}

impl fmt::Display for PercentageBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PercentageBase::MetalCost => write!(f, "METAL_COST"),
            PercentageBase::RunningSubtotal => write!(f, "RUNNING_SUBTOTAL"),
        }
    }
}

impl FromStr for PercentageBase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "METAL_COST" => Ok(PercentageBase::MetalCost),
            "RUNNING_SUBTOTAL" => Ok(PercentageBase::RunningSubtotal),
            other => Err(format!("未知的百分比基数: {}", other)),
        }
    }
}

// ==========================================
// 定价配置归属 (Profile Owner Kind)
// ==========================================
// 子类目级为继承源, 商品/变体级为本地覆盖 (克隆产物)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProfileOwnerKind {
    Subcategory, // 子类目 (继承源)
    Product,     // 商品级覆盖
    Variant,     // 变体级覆盖
}

impl ProfileOwnerKind {
    /// 冻结/解冻是否强制填写原因 (子类目级影响面大, 审计要求)
    pub fn requires_freeze_reason(&self) -> bool {
        matches!(self, ProfileOwnerKind::Subcategory)
    }
}

impl fmt::Display for ProfileOwnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileOwnerKind::Subcategory => write!(f, "SUBCATEGORY"),
            ProfileOwnerKind::Product => write!(f, "PRODUCT"),
            ProfileOwnerKind::Variant => write!(f, "VARIANT"),
        }
    }
}

impl FromStr for ProfileOwnerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUBCATEGORY" => Ok(ProfileOwnerKind::Subcategory),
            "PRODUCT" => Ok(ProfileOwnerKind::Product),
            "VARIANT" => Ok(ProfileOwnerKind::Variant),
            other => Err(format!("未知的归属类型: {}", other)),
        }
    }
}

// ==========================================
// 批量任务状态 (Job Status)
// ==========================================
// 红线: 状态迁移单调 QUEUED → RUNNING → {COMPLETED | FAILED}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Queued,    // 已提交待执行
    Running,   // 执行中
    Completed, // 正常完成 (单项失败不影响任务级成功)
    Failed,    // 系统性失败或进程崩溃
}

impl JobStatus {
    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "QUEUED"),
            JobStatus::Running => write!(f, "RUNNING"),
            JobStatus::Completed => write!(f, "COMPLETED"),
            JobStatus::Failed => write!(f, "FAILED"),
        }
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "QUEUED" => Ok(JobStatus::Queued),
            "RUNNING" => Ok(JobStatus::Running),
            "COMPLETED" => Ok(JobStatus::Completed),
            "FAILED" => Ok(JobStatus::Failed),
            other => Err(format!("未知的任务状态: {}", other)),
        }
    }
}
