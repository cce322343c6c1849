// ==========================================
// 珠宝定价引擎 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================

pub mod audit_repo;
pub mod component_repo;
pub mod error;
pub mod job_repo;
pub mod metal_repo;
pub mod product_repo;
pub mod profile_repo;
pub mod taxonomy_repo;

// 重导出核心类型
pub use audit_repo::AuditLogRepository;
pub use component_repo::PriceComponentRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use job_repo::{BatchJobRepository, CRASH_RECOVERY_REASON};
pub use metal_repo::{MaterialRepository, MetalGroupRepository};
pub use product_repo::{PriceHistoryEntry, ProductRepository};
pub use profile_repo::PricingProfileRepository;
pub use taxonomy_repo::{TaxonomyNode, TaxonomyRepository};
