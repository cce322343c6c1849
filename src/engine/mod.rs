// ==========================================
// 珠宝定价引擎 - 引擎层
// ==========================================
// 职责: 实现定价业务规则, 不拼 SQL
// 红线: Engine 不拼 SQL; 所有拒绝必须输出可解释原因
// ==========================================

pub mod calculator;
pub mod cascade;
pub mod error;
pub mod freeze;
pub mod orchestrator;
pub mod rate_feed;
pub mod registry;
pub mod resolver;

// 重导出核心引擎
pub use calculator::{round2, BreakdownCalculator};
pub use cascade::{CascadeResult, MetalRateCascade};
pub use error::{EngineError, EngineResult};
pub use freeze::{FreezeController, FreezeOutcome};
pub use orchestrator::{
    BulkRecalcOrchestrator, RecalcOrchestratorConfig, RecoveryReport, TRIGGER_BULK_RECALC,
};
pub use rate_feed::{FixedRateFeed, RateFeed, RateSyncReport, RateSyncService};
pub use registry::{seed_system_components, ComponentRegistry, DeleteOutcome};
pub use resolver::InheritanceResolver;
