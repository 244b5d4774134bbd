// ==========================================
// 烘焙工坊产销系统 - 生产档期领域模型
// ==========================================
// 红线: committed_count 永不为负;
//       超售 (committed > capacity) 属设计允许,不在增量侧截断
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// ProductionSlot - 生产档期
// ==========================================
// 用途: 按日期/时段划分的接单容量单元
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionSlot {
    pub slot_id: String,            // 档期ID
    pub slot_date: NaiveDate,       // 档期日期
    pub slot_label: Option<String>, // 时段标签 (如 "上午" / "下午")

    // ===== 容量参数 =====
    pub total_capacity: i64,        // 容量上限 (单位: 个)
    pub committed_count: i64,       // 已承接数量 (由容量台账维护)

    // ===== 人工开关 =====
    pub is_open: bool,              // 是否开放接单 (与容量独立的人工控制)

    pub created_at: NaiveDateTime,  // 创建时间
    pub updated_at: NaiveDateTime,  // 更新时间
}

// ==========================================
// Trait: SlotCapacity
// ==========================================
// 用途: 档期容量只读视图接口
pub trait SlotCapacity {
    /// 剩余可接数量 (展示用,下限 0)
    fn open_capacity(&self) -> i64;

    /// 是否已超售
    fn is_overbooked(&self) -> bool;

    /// 超售数量 (未超售时为 0)
    fn overbooked_units(&self) -> i64;
}

impl SlotCapacity for ProductionSlot {
    fn open_capacity(&self) -> i64 {
        (self.total_capacity - self.committed_count).max(0)
    }

    fn is_overbooked(&self) -> bool {
        self.committed_count > self.total_capacity
    }

    fn overbooked_units(&self) -> i64 {
        (self.committed_count - self.total_capacity).max(0)
    }
}
