// ==========================================
// 烘焙工坊产销系统 - 容量台账
// ==========================================
// 红线: committed_count 只随订单状态转换变化,
//       台账自身不做业务校验 (档期不存在属调用方致命错误,原样上抛)
// 红线: 减量钳制到 0;增量不截断 (超售属设计允许)
// ==========================================

use rusqlite::Connection;

use crate::domain::types::OrderStatus;
use crate::repository::error::RepositoryResult;
use crate::repository::slot_repo::SlotRepository;

// ==========================================
// CapacityLedger - 容量台账
// ==========================================
// 无状态引擎,规则纯函数 + 事务内落库
pub struct CapacityLedger;

impl CapacityLedger {
    /// 计算状态转换对档期容量的增量
    ///
    /// # 规则
    /// - 计入 → 不计入 (如取消/未到店): -total_units
    /// - 不计入 → 计入 (如撤销取消): +total_units
    /// - 计入性不变 (如 confirmed→scheduled): 0,不触发台账
    pub fn transition_delta(
        before: OrderStatus,
        after: OrderStatus,
        total_units: i64,
    ) -> i64 {
        match (before.counts_toward_capacity(), after.counts_toward_capacity()) {
            (true, false) => -total_units,
            (false, true) => total_units,
            _ => 0,
        }
    }

    /// 订单入池的容量增量 (创建即计入,等价于"无 → 计入"转换)
    pub fn intake_delta(status: OrderStatus, total_units: i64) -> i64 {
        if status.counts_toward_capacity() {
            total_units
        } else {
            0
        }
    }

    /// 应用容量增量 (事务内)
    ///
    /// 增量为 0 时不触发任何写入
    pub fn apply_delta(conn: &Connection, slot_id: &str, unit_delta: i64) -> RepositoryResult<()> {
        if unit_delta == 0 {
            return Ok(());
        }

        SlotRepository::apply_committed_delta_tx(conn, slot_id, unit_delta)?;
        tracing::debug!(slot_id, unit_delta, "容量台账已更新");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_delta_cancel_and_reinstate() {
        // 取消: 计入 → 不计入
        assert_eq!(
            CapacityLedger::transition_delta(OrderStatus::Confirmed, OrderStatus::Canceled, 4),
            -4
        );
        // 撤销取消: 不计入 → 计入
        assert_eq!(
            CapacityLedger::transition_delta(OrderStatus::Canceled, OrderStatus::Confirmed, 4),
            4
        );
    }

    #[test]
    fn test_transition_delta_neutral() {
        // 两个计入状态之间转换,容量不变
        assert_eq!(
            CapacityLedger::transition_delta(OrderStatus::Confirmed, OrderStatus::Scheduled, 4),
            0
        );
        assert_eq!(
            CapacityLedger::transition_delta(OrderStatus::Scheduled, OrderStatus::Produced, 4),
            0
        );
        // 两个不计入状态之间转换,同样不变
        assert_eq!(
            CapacityLedger::transition_delta(OrderStatus::Canceled, OrderStatus::NoShow, 4),
            0
        );
    }

    #[test]
    fn test_intake_delta() {
        assert_eq!(CapacityLedger::intake_delta(OrderStatus::Submitted, 3), 3);
        assert_eq!(CapacityLedger::intake_delta(OrderStatus::Canceled, 3), 0);
    }
}
