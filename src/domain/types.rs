// ==========================================
// 烘焙工坊产销系统 - 领域类型定义
// ==========================================
// 红线: 状态一律用封闭枚举,转换点全部穷举匹配
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 订单状态 (Order Status)
// ==========================================
// 主流程: SUBMITTED → CONFIRMED → SCHEDULED → PRODUCED → READY → PICKED_UP
// 分支: CANCELED / NO_SHOW (不计入档期容量)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Submitted, // 已提交
    Confirmed, // 已确认
    Scheduled, // 已排产 (仅备产流程可写)
    Produced,  // 已出炉 (仅备产流程可写)
    Ready,     // 待取货
    PickedUp,  // 已取货
    Canceled,  // 已取消
    NoShow,    // 未到店
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl OrderStatus {
    /// 是否计入档期容量
    ///
    /// 红线: 除取消/未到店外,任何状态都占用容量
    pub fn counts_toward_capacity(&self) -> bool {
        !matches!(self, OrderStatus::Canceled | OrderStatus::NoShow)
    }

    /// 是否处于出炉前阶段 (NO_SHOW 仅允许从该阶段进入)
    pub fn is_pre_produced(&self) -> bool {
        matches!(
            self,
            OrderStatus::Submitted | OrderStatus::Confirmed | OrderStatus::Scheduled
        )
    }

    /// 是否为备产流程专属状态 (外部调用不可直接写入)
    pub fn is_workflow_owned(&self) -> bool {
        matches!(self, OrderStatus::Scheduled | OrderStatus::Produced)
    }

    /// 从字符串解析状态 (非法值返回 None,由调用方转为校验错误)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "SUBMITTED" => Some(OrderStatus::Submitted),
            "CONFIRMED" => Some(OrderStatus::Confirmed),
            "SCHEDULED" => Some(OrderStatus::Scheduled),
            "PRODUCED" => Some(OrderStatus::Produced),
            "READY" => Some(OrderStatus::Ready),
            "PICKED_UP" => Some(OrderStatus::PickedUp),
            "CANCELED" => Some(OrderStatus::Canceled),
            "NO_SHOW" => Some(OrderStatus::NoShow),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            OrderStatus::Submitted => "SUBMITTED",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Scheduled => "SCHEDULED",
            OrderStatus::Produced => "PRODUCED",
            OrderStatus::Ready => "READY",
            OrderStatus::PickedUp => "PICKED_UP",
            OrderStatus::Canceled => "CANCELED",
            OrderStatus::NoShow => "NO_SHOW",
        }
    }
}

// ==========================================
// 备产单状态 (Batch Status)
// ==========================================
// 状态机: DRAFT --finalize--> COMPLETED (终态,不可重开)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    Draft,     // 草稿 (可编辑)
    Completed, // 已完成 (永久不可变)
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl BatchStatus {
    /// 从字符串解析状态
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "DRAFT" => Some(BatchStatus::Draft),
            "COMPLETED" => Some(BatchStatus::Completed),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            BatchStatus::Draft => "DRAFT",
            BatchStatus::Completed => "COMPLETED",
        }
    }
}

// ==========================================
// 成品去向 (Disposition)
// ==========================================
// PENDING → {PICKED_UP, SOLD, WASTED, PERSONAL, GIFTED}
// 允许重复改判,不抛非法转换错误
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Disposition {
    Pending,  // 待处理
    PickedUp, // 已取货
    Sold,     // 已售出 (现场散卖)
    Wasted,   // 报损
    Personal, // 自留
    Gifted,   // 赠送
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl Disposition {
    /// 从字符串解析去向
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PENDING" => Some(Disposition::Pending),
            "PICKED_UP" => Some(Disposition::PickedUp),
            "SOLD" => Some(Disposition::Sold),
            "WASTED" => Some(Disposition::Wasted),
            "PERSONAL" => Some(Disposition::Personal),
            "GIFTED" => Some(Disposition::Gifted),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            Disposition::Pending => "PENDING",
            Disposition::PickedUp => "PICKED_UP",
            Disposition::Sold => "SOLD",
            Disposition::Wasted => "WASTED",
            Disposition::Personal => "PERSONAL",
            Disposition::Gifted => "GIFTED",
        }
    }
}

// ==========================================
// 状态写入权限 (Status Write Authority)
// ==========================================
// 红线: SCHEDULED/PRODUCED 仅备产流程可写,用显式权限而非约定约束
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusWriteAuthority {
    /// 外部调用 (接口/人工操作)
    External,
    /// 备产流程内部 (assign/unassign/finalize)
    BatchWorkflow,
}

impl StatusWriteAuthority {
    /// 是否允许写入目标状态
    pub fn may_write(&self, target: OrderStatus) -> bool {
        match self {
            StatusWriteAuthority::BatchWorkflow => true,
            StatusWriteAuthority::External => !target.is_workflow_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_toward_capacity() {
        assert!(OrderStatus::Submitted.counts_toward_capacity());
        assert!(OrderStatus::Confirmed.counts_toward_capacity());
        assert!(OrderStatus::Scheduled.counts_toward_capacity());
        assert!(OrderStatus::Produced.counts_toward_capacity());
        assert!(OrderStatus::Ready.counts_toward_capacity());
        assert!(OrderStatus::PickedUp.counts_toward_capacity());
        assert!(!OrderStatus::Canceled.counts_toward_capacity());
        assert!(!OrderStatus::NoShow.counts_toward_capacity());
    }

    #[test]
    fn test_order_status_roundtrip() {
        for s in [
            OrderStatus::Submitted,
            OrderStatus::Confirmed,
            OrderStatus::Scheduled,
            OrderStatus::Produced,
            OrderStatus::Ready,
            OrderStatus::PickedUp,
            OrderStatus::Canceled,
            OrderStatus::NoShow,
        ] {
            assert_eq!(OrderStatus::from_str(s.to_db_str()), Some(s));
        }
        assert_eq!(OrderStatus::from_str("WHATEVER"), None);
    }

    #[test]
    fn test_workflow_owned_guard() {
        let ext = StatusWriteAuthority::External;
        assert!(!ext.may_write(OrderStatus::Scheduled));
        assert!(!ext.may_write(OrderStatus::Produced));
        assert!(ext.may_write(OrderStatus::Canceled));
        assert!(ext.may_write(OrderStatus::Ready));

        let wf = StatusWriteAuthority::BatchWorkflow;
        assert!(wf.may_write(OrderStatus::Scheduled));
        assert!(wf.may_write(OrderStatus::Produced));
    }

    #[test]
    fn test_disposition_parse() {
        assert_eq!(Disposition::from_str("sold"), Some(Disposition::Sold));
        assert_eq!(Disposition::from_str("GIFTED"), Some(Disposition::Gifted));
        assert_eq!(Disposition::from_str("EATEN"), None);
    }
}
