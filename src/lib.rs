// ==========================================
// 珠宝定价引擎 - 核心库
// ==========================================
// 系统定位: 珠宝电商管理后台的动态定价与行情联动内核
// 技术栈: Rust + SQLite
// 核心红线: 价格可解释 (逐组件拆解)、冻结可逆、任务可恢复
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{CalculationKind, JobStatus, PercentageBase, ProfileOwnerKind};

// 领域实体
pub use domain::{
    AuditAction, AuditEvent, BatchJob, CalculationContext, ComponentConfig, ComponentValue,
    JobFailure, Material, MetalGroup, PriceBreakdown, PriceComponentDefinition, PricingProfile,
    Product, ProfileOwner, METAL_COST_KEY,
};

// 引擎
pub use engine::{
    round2, BreakdownCalculator, BulkRecalcOrchestrator, FreezeController, InheritanceResolver,
    MetalRateCascade, RateFeed, RateSyncService,
};

// API
pub use api::{ApiError, ApiResult, ComponentApi, JobApi, MetalApi, PricingApi};

/// 版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 应用名称
pub const APP_NAME: &str = "珠宝定价引擎";
