// ==========================================
// 烘焙工坊产销系统 - 备产单领域模型
// ==========================================
// 红线: 仅 DRAFT 状态可编辑;COMPLETED 为终态,永久不可变
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::domain::types::BatchStatus;

// ==========================================
// ProductionBatch - 备产单 (prep sheet)
// ==========================================
// 用途: 把一天的订单与加产项组织成一次生产计划
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionBatch {
    pub batch_id: String,                 // 备产单ID
    pub batch_date: NaiveDate,            // 目标生产日期
    pub status: BatchStatus,              // 状态 (DRAFT/COMPLETED)
    pub created_by: String,               // 创建人
    pub created_at: NaiveDateTime,        // 创建时间
    pub completed_at: Option<NaiveDateTime>, // 完成时间
    pub completed_by: Option<String>,     // 完成操作人
}

impl ProductionBatch {
    /// 判断是否为草稿状态 (可编辑)
    pub fn is_draft(&self) -> bool {
        self.status == BatchStatus::Draft
    }

    /// 判断是否已完成 (终态)
    pub fn is_completed(&self) -> bool {
        self.status == BatchStatus::Completed
    }
}

// ==========================================
// BatchItem - 备产明细
// ==========================================
// 两类: 订单项 (order_id 有值,一行口味一条) / 加产项 (order_id 为 None)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItem {
    pub item_id: String,               // 明细ID
    pub batch_id: String,              // 所属备产单
    pub order_id: Option<String>,      // 关联订单 (加产项为 None)
    pub customer_name: Option<String>, // 客户姓名快照 (展示排序用)
    pub flavor_id: String,             // 口味ID
    pub flavor_name: String,           // 口味名称
    pub planned_quantity: i64,         // 计划数量
    pub created_at: NaiveDateTime,     // 创建时间
}

impl BatchItem {
    /// 是否为加产项 (无订单引用)
    pub fn is_extra(&self) -> bool {
        self.order_id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_batch_state_helpers() {
        let ts = NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(7, 0, 0)
            .unwrap();
        let mut batch = ProductionBatch {
            batch_id: "B001".to_string(),
            batch_date: NaiveDate::from_ymd_opt(2026, 3, 8).unwrap(),
            status: BatchStatus::Draft,
            created_by: "店长".to_string(),
            created_at: ts,
            completed_at: None,
            completed_by: None,
        };
        assert!(batch.is_draft());
        assert!(!batch.is_completed());

        batch.status = BatchStatus::Completed;
        assert!(batch.is_completed());
    }
}
