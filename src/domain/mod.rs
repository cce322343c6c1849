// ==========================================
// 珠宝定价引擎 - 领域层
// ==========================================
// 职责: 实体与类型定义, 不含数据访问与业务流程
// ==========================================

pub mod audit;
pub mod component;
pub mod job;
pub mod metal;
pub mod pricing;
pub mod product;
pub mod profile;
pub mod types;

// 重导出核心实体
pub use audit::{AuditAction, AuditEvent};
pub use component::{ComponentConfig, PriceComponentDefinition, METAL_COST_KEY};
pub use job::{BatchJob, JobFailure, JOB_TYPE_METAL_RATE_RECALC};
pub use metal::{Material, MetalGroup};
pub use pricing::{CalculationContext, ComponentValue, PriceBreakdown};
pub use product::Product;
pub use profile::{PricingProfile, ProfileOwner};
pub use types::{CalculationKind, JobStatus, PercentageBase, ProfileOwnerKind};
