// ==========================================
// 珠宝定价引擎 - 外部行情接入
// ==========================================
// 说明: 外部行情拉取是不透明上游调用, 以 async trait 抽象
// 红线: 拉取失败 = "跳过本轮, 保留最近已知价", 绝不把价格置零
// ==========================================

use crate::engine::cascade::MetalRateCascade;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::orchestrator::BulkRecalcOrchestrator;
use crate::repository::MetalGroupRepository;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// 外部行情源 (不透明上游)
#[async_trait]
pub trait RateFeed: Send + Sync {
    /// 拉取各金属类型的现货价估计 (metal_type → 现货价/克)
    async fn fetch_spot_prices(&self) -> anyhow::Result<HashMap<String, f64>>;
}

/// 固定行情源 (测试/演练注入)
pub struct FixedRateFeed {
    pub prices: HashMap<String, f64>,
}

#[async_trait]
impl RateFeed for FixedRateFeed {
    async fn fetch_spot_prices(&self) -> anyhow::Result<HashMap<String, f64>> {
        Ok(self.prices.clone())
    }
}

// ==========================================
// RateSyncReport - 一轮同步结果
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct RateSyncReport {
    pub updated_groups: Vec<String>, // 完成级联的金属组
    pub skipped_groups: Vec<String>, // auto_update 关闭或无行情的组
    pub job_id: Option<String>,      // 触发的批量重算任务
}

/// 行情同步服务: 拉取 → 级联 → 提交批量重算
pub struct RateSyncService {
    feed: Arc<dyn RateFeed>,
    group_repo: Arc<MetalGroupRepository>,
    cascade: Arc<MetalRateCascade>,
    orchestrator: Arc<BulkRecalcOrchestrator>,
}

impl RateSyncService {
    pub fn new(
        feed: Arc<dyn RateFeed>,
        group_repo: Arc<MetalGroupRepository>,
        cascade: Arc<MetalRateCascade>,
        orchestrator: Arc<BulkRecalcOrchestrator>,
    ) -> Self {
        Self {
            feed,
            group_repo,
            cascade,
            orchestrator,
        }
    }

    /// 执行一轮行情同步
    ///
    /// 上游不可用报 UpstreamUnavailable (可恢复, 下轮重试),
    /// 所有组保留最近已知价。
    pub async fn sync_once(&self, triggered_by: &str) -> EngineResult<RateSyncReport> {
        let prices = match self.feed.fetch_spot_prices().await {
            Ok(p) => p,
            Err(e) => {
                warn!("行情拉取失败, 本轮跳过, 保留最近已知价: {}", e);
                return Err(EngineError::UpstreamUnavailable(e.to_string()));
            }
        };

        let mut report = RateSyncReport::default();
        let mut changed_metals: Vec<String> = Vec::new();
        let now = Utc::now();

        for group in self.group_repo.list_all()? {
            if !group.auto_update {
                report.skipped_groups.push(group.metal_type.clone());
                continue;
            }
            let Some(&spot) = prices.get(&group.metal_type) else {
                // 上游缺该金属行情: 保留最近已知价
                report.skipped_groups.push(group.metal_type.clone());
                continue;
            };

            self.cascade
                .update_group_rate(&group.group_id, spot, group.premium, Some(now))?;
            changed_metals.push(group.metal_type.clone());
            report.updated_groups.push(group.metal_type.clone());
        }

        if !changed_metals.is_empty() {
            match self.orchestrator.submit(&changed_metals, triggered_by) {
                Ok(job_id) => {
                    let completed = self.orchestrator.run(&job_id)?;
                    info!(job_id = %job_id, status = %completed.status, "行情同步批量重算完成");
                    report.job_id = Some(job_id);
                }
                // 在途任务互斥: 本轮级联已生效, 批量重算由在途任务覆盖
                Err(EngineError::Conflict(msg)) => {
                    warn!("批量重算提交被互斥拒绝: {}", msg);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(report)
    }
}
