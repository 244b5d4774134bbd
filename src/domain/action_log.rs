// ==========================================
// 烘焙工坊产销系统 - 操作日志领域模型
// ==========================================
// 红线: 所有写入必须记录;日志追加失败只告警,绝不回滚主事务
// 用途: 审计追踪
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// ActionLog - 操作日志
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    pub action_id: String,          // 日志ID
    pub action_type: String,        // 操作类型 (存储为字符串)
    pub action_ts: NaiveDateTime,   // 操作时间戳
    pub actor: String,              // 操作人

    // ===== 操作负载 =====
    pub payload_json: Option<JsonValue>, // 操作参数 (JSON)

    // ===== 扩展字段 (业务用) =====
    pub slot_id: Option<String>,    // 关联档期
    pub batch_id: Option<String>,   // 关联备产单
    pub detail: Option<String>,     // 详细描述
}

// ==========================================
// ActionType - 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    CreateOrder,           // 创建订单
    UpdateOrderStatus,     // 订单状态变更
    BulkUpdateOrderStatus, // 批量订单状态变更
    CreateSlot,            // 创建档期
    ToggleSlot,            // 开放/关闭档期
    CreateDraftBatch,      // 创建备产单草稿
    AssignOrder,           // 订单纳入备产单
    UnassignOrder,         // 订单移出备产单
    AddExtra,              // 新增加产项
    UpdateExtra,           // 修改加产项
    RemoveExtra,           // 删除加产项
    FinalizeBatch,         // 终结备产单
    UpdateDisposition,     // 改判成品去向
    SplitRecord,           // 拆分生产记录
    RebuildCapacity,       // 重建容量计数
}

impl ActionType {
    /// 转换为字符串 (用于数据库存储)
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::CreateOrder => "CreateOrder",
            ActionType::UpdateOrderStatus => "UpdateOrderStatus",
            ActionType::BulkUpdateOrderStatus => "BulkUpdateOrderStatus",
            ActionType::CreateSlot => "CreateSlot",
            ActionType::ToggleSlot => "ToggleSlot",
            ActionType::CreateDraftBatch => "CreateDraftBatch",
            ActionType::AssignOrder => "AssignOrder",
            ActionType::UnassignOrder => "UnassignOrder",
            ActionType::AddExtra => "AddExtra",
            ActionType::UpdateExtra => "UpdateExtra",
            ActionType::RemoveExtra => "RemoveExtra",
            ActionType::FinalizeBatch => "FinalizeBatch",
            ActionType::UpdateDisposition => "UpdateDisposition",
            ActionType::SplitRecord => "SplitRecord",
            ActionType::RebuildCapacity => "RebuildCapacity",
        }
    }

    /// 从字符串解析
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "CreateOrder" => Some(ActionType::CreateOrder),
            "UpdateOrderStatus" => Some(ActionType::UpdateOrderStatus),
            "BulkUpdateOrderStatus" => Some(ActionType::BulkUpdateOrderStatus),
            "CreateSlot" => Some(ActionType::CreateSlot),
            "ToggleSlot" => Some(ActionType::ToggleSlot),
            "CreateDraftBatch" => Some(ActionType::CreateDraftBatch),
            "AssignOrder" => Some(ActionType::AssignOrder),
            "UnassignOrder" => Some(ActionType::UnassignOrder),
            "AddExtra" => Some(ActionType::AddExtra),
            "UpdateExtra" => Some(ActionType::UpdateExtra),
            "RemoveExtra" => Some(ActionType::RemoveExtra),
            "FinalizeBatch" => Some(ActionType::FinalizeBatch),
            "UpdateDisposition" => Some(ActionType::UpdateDisposition),
            "SplitRecord" => Some(ActionType::SplitRecord),
            "RebuildCapacity" => Some(ActionType::RebuildCapacity),
            _ => None,
        }
    }
}

// ==========================================
// ActionLog 辅助方法
// ==========================================
impl ActionLog {
    /// 创建新的操作日志
    ///
    /// # 参数
    /// - `action_type`: 操作类型
    /// - `actor`: 操作人
    pub fn new(action_type: ActionType, actor: &str) -> Self {
        Self {
            action_id: uuid::Uuid::new_v4().to_string(),
            action_type: action_type.as_str().to_string(),
            action_ts: chrono::Local::now().naive_local(),
            actor: actor.to_string(),
            payload_json: None,
            slot_id: None,
            batch_id: None,
            detail: None,
        }
    }

    /// 设置操作负载 (转换为JSON)
    pub fn with_payload<T: serde::Serialize>(mut self, payload: &T) -> Self {
        self.payload_json = serde_json::to_value(payload).ok();
        self
    }

    /// 设置关联档期
    pub fn with_slot(mut self, slot_id: &str) -> Self {
        self.slot_id = Some(slot_id.to_string());
        self
    }

    /// 设置关联备产单
    pub fn with_batch(mut self, batch_id: &str) -> Self {
        self.batch_id = Some(batch_id.to_string());
        self
    }

    /// 设置详细描述
    pub fn with_detail(mut self, detail: String) -> Self {
        self.detail = Some(detail);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_type_roundtrip() {
        for t in [
            ActionType::CreateOrder,
            ActionType::FinalizeBatch,
            ActionType::SplitRecord,
            ActionType::RebuildCapacity,
        ] {
            assert_eq!(ActionType::from_str(t.as_str()), Some(t));
        }
        assert_eq!(ActionType::from_str("Unknown"), None);
    }

    #[test]
    fn test_builder() {
        let log = ActionLog::new(ActionType::AssignOrder, "店长")
            .with_batch("B001")
            .with_payload(&serde_json::json!({"order_id": "O001"}))
            .with_detail("订单纳入备产单".to_string());

        assert_eq!(log.action_type, "AssignOrder");
        assert_eq!(log.actor, "店长");
        assert_eq!(log.batch_id.as_deref(), Some("B001"));
        assert!(log.payload_json.is_some());
    }
}
