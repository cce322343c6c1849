// ==========================================
// 珠宝定价引擎 - 审计日志领域模型
// ==========================================
// 红线: 所有定价写操作必须记审计; 审计写入失败不得中断触发操作
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

// ==========================================
// AuditAction - 审计动作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    ComponentRegister,   // 注册价格组件
    ComponentUpdate,     // 修改组件定义
    ComponentDelete,     // 删除/软删除组件
    ProfileEdit,         // 编辑定价配置
    Freeze,              // 冻结组件
    Unfreeze,            // 解冻组件
    CustomizePricing,    // 商品自定义定价 (克隆)
    RevertPricing,       // 回退为继承定价
    RateUpdate,          // 金属组行情更新
    OverrideSet,         // 材料人工覆盖价设置
    OverrideClear,       // 材料人工覆盖价清除
    BulkRecalcSubmit,    // 批量重算提交
    BulkRecalcComplete,  // 批量重算完成
    PriceUpdate,         // 商品价格落库
}

// ==========================================
// AuditEvent - 审计事件
// ==========================================
// 对齐: audit_log 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    pub action: AuditAction,
    pub entity_kind: String, // PROFILE / MATERIAL / METAL_GROUP / PRODUCT / COMPONENT / JOB
    pub entity_id: String,
    pub actor: String,
    pub payload_json: Option<JsonValue>, // 变更明细 (前值/后值/原因)
    pub detail: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(action: AuditAction, entity_kind: &str, entity_id: &str, actor: &str) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            action,
            entity_kind: entity_kind.to_string(),
            entity_id: entity_id.to_string(),
            actor: actor.to_string(),
            payload_json: None,
            detail: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_payload(mut self, payload: JsonValue) -> Self {
        self.payload_json = Some(payload);
        self
    }

    pub fn with_detail(mut self, detail: &str) -> Self {
        self.detail = Some(detail.to_string());
        self
    }
}
