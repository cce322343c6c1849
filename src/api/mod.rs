// ==========================================
// 珠宝定价引擎 - API 层
// ==========================================
// 职责: 提供管理端业务接口, 供上层服务调用
// ==========================================

pub mod error;
pub mod component_api;
pub mod pricing_api;
pub mod metal_api;
pub mod job_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use component_api::ComponentApi;
pub use pricing_api::{
    PricingApi, TRIGGER_FREEZE, TRIGGER_MANUAL_REFRESH, TRIGGER_REVERT, TRIGGER_UNFREEZE,
};
pub use metal_api::{MetalApi, RateUpdateResult};
pub use job_api::{JobApi, JobProgressView};
