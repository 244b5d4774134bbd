// ==========================================
// 烘焙工坊产销系统 - 订单生命周期引擎
// ==========================================
// 红线: 状态写入是订单影响档期容量的唯一通道
// 红线: SCHEDULED/PRODUCED 仅备产流程权限可写
// 红线: 多订单批量更新在一个事务内逐单适用规则,全成全败
// ==========================================

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

use crate::domain::order::Order;
use crate::domain::types::{OrderStatus, StatusWriteAuthority};
use crate::engine::capacity_ledger::CapacityLedger;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::order_repo::OrderRepository;
use crate::repository::slot_repo::SlotRepository;

// ==========================================
// OrderTransitionOutcome - 单笔转换结果
// ==========================================
// 用途: 审计负载与事件通知的载体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderTransitionOutcome {
    pub order_id: String,          // 订单ID
    pub slot_id: String,           // 所属档期
    pub from_status: OrderStatus,  // 原状态
    pub to_status: OrderStatus,    // 新状态
    pub capacity_delta: i64,       // 应用到档期的容量增量 (0 表示容量中性)
}

// ==========================================
// LifecycleEngine - 订单生命周期引擎
// ==========================================
pub struct LifecycleEngine {
    conn: Arc<Mutex<Connection>>,
}

impl LifecycleEngine {
    /// 从共享连接创建引擎实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 规则 (纯函数)
    // ==========================================

    /// 校验状态转换是否允许
    ///
    /// # 规则
    /// - SCHEDULED/PRODUCED 仅备产流程权限可写 (显式能力检查,非约定)
    /// - NO_SHOW 仅允许从出炉前状态进入
    /// - CANCELED 任意时点可进入亦可撤销 (沿用现行行为,仅状态回转,
    ///   不回溯已生成的生产记录)
    /// - 其余转换不设限
    pub fn validate_transition(
        from: OrderStatus,
        to: OrderStatus,
        authority: StatusWriteAuthority,
    ) -> RepositoryResult<()> {
        if !authority.may_write(to) {
            return Err(RepositoryError::BusinessRuleViolation(format!(
                "状态{}由备产流程维护,不可直接写入",
                to
            )));
        }

        if to == OrderStatus::NoShow && !from.is_pre_produced() {
            return Err(RepositoryError::InvalidStateTransition {
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        Ok(())
    }

    /// 生成单笔转换计划 (校验 + 容量增量计算)
    pub fn plan_transition(
        order: &Order,
        to: OrderStatus,
        authority: StatusWriteAuthority,
    ) -> RepositoryResult<OrderTransitionOutcome> {
        Self::validate_transition(order.status, to, authority)?;

        let total_units = order.total_units_or_fallback();
        let capacity_delta = CapacityLedger::transition_delta(order.status, to, total_units);

        Ok(OrderTransitionOutcome {
            order_id: order.order_id.clone(),
            slot_id: order.slot_id.clone(),
            from_status: order.status,
            to_status: to,
            capacity_delta,
        })
    }

    // ==========================================
    // 事务内执行
    // ==========================================

    /// 在调用方事务内执行一笔转换 (状态写入 + 台账增量)
    pub fn apply_transition_tx(
        conn: &Connection,
        outcome: &OrderTransitionOutcome,
        operator: &str,
    ) -> RepositoryResult<()> {
        OrderRepository::update_status_tx(conn, &outcome.order_id, outcome.to_status, operator)?;
        CapacityLedger::apply_delta(conn, &outcome.slot_id, outcome.capacity_delta)?;
        Ok(())
    }

    /// 在调用方事务内读取订单并完成一笔转换
    pub fn transition_in_tx(
        conn: &Connection,
        order_id: &str,
        to: OrderStatus,
        authority: StatusWriteAuthority,
        operator: &str,
    ) -> RepositoryResult<OrderTransitionOutcome> {
        let order = OrderRepository::find_by_id_tx(conn, order_id)?.ok_or_else(|| {
            RepositoryError::NotFound {
                entity: "Order".to_string(),
                id: order_id.to_string(),
            }
        })?;

        let outcome = Self::plan_transition(&order, to, authority)?;
        Self::apply_transition_tx(conn, &outcome, operator)?;
        Ok(outcome)
    }

    // ==========================================
    // 对外操作 (独立事务)
    // ==========================================

    /// 更新单笔订单状态
    ///
    /// 状态写入与容量增量在同一事务内完成,失败整体回滚
    pub fn update_status(
        &self,
        order_id: &str,
        to: OrderStatus,
        authority: StatusWriteAuthority,
        operator: &str,
    ) -> RepositoryResult<OrderTransitionOutcome> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let outcome = Self::transition_in_tx(&tx, order_id, to, authority, operator)?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        tracing::info!(
            order_id,
            from = %outcome.from_status,
            to = %outcome.to_status,
            capacity_delta = outcome.capacity_delta,
            "订单状态已更新"
        );
        Ok(outcome)
    }

    /// 批量更新订单状态 (全成全败)
    ///
    /// 逐单适用转换规则: 已处于目标状态的订单容量增量为 0,
    /// 只有计入性发生变化的订单才触发台账
    pub fn bulk_update_status(
        &self,
        order_ids: &[String],
        to: OrderStatus,
        authority: StatusWriteAuthority,
        operator: &str,
    ) -> RepositoryResult<Vec<OrderTransitionOutcome>> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let mut outcomes = Vec::with_capacity(order_ids.len());
        for order_id in order_ids {
            let outcome = Self::transition_in_tx(&tx, order_id, to, authority, operator)?;
            outcomes.push(outcome);
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        tracing::info!(
            count = outcomes.len(),
            to = %to,
            "批量订单状态更新完成"
        );
        Ok(outcomes)
    }

    /// 订单入池 (提交即计入档期容量,插入与台账同事务)
    ///
    /// # 规则
    /// - 档期必须存在且开放接单
    /// - 容量满额不拒单 (超售属设计允许,仅告警)
    pub fn create_order(&self, order: &Order) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let slot = SlotRepository::find_by_id_tx(&tx, &order.slot_id)?.ok_or_else(|| {
            RepositoryError::NotFound {
                entity: "ProductionSlot".to_string(),
                id: order.slot_id.clone(),
            }
        })?;

        if !slot.is_open {
            return Err(RepositoryError::BusinessRuleViolation(format!(
                "档期{}已关闭接单",
                slot.slot_id
            )));
        }

        let total_units = order.total_units_or_fallback();
        let delta = CapacityLedger::intake_delta(order.status, total_units);

        OrderRepository::insert_tx(&tx, order)?;
        CapacityLedger::apply_delta(&tx, &order.slot_id, delta)?;

        if slot.committed_count + delta > slot.total_capacity {
            tracing::warn!(
                slot_id = %slot.slot_id,
                committed = slot.committed_count + delta,
                capacity = slot.total_capacity,
                "档期已超售"
            );
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        tracing::info!(order_id = %order.order_id, slot_id = %order.slot_id, delta, "订单已入池");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{OrderLine, OrderLineList};
    use chrono::NaiveDate;

    fn order_with(status: OrderStatus, quantity: i64) -> Order {
        let ts = NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        Order {
            order_id: "O001".to_string(),
            slot_id: "S001".to_string(),
            customer_name: "李四".to_string(),
            contact: None,
            status,
            lines_json: OrderLineList::new(vec![OrderLine {
                flavor_id: "F1".to_string(),
                flavor_name: "原味".to_string(),
                quantity,
            }])
            .to_json(),
            total_price: None,
            deposit: None,
            note: None,
            created_at: ts,
            updated_at: ts,
            updated_by: None,
        }
    }

    #[test]
    fn test_external_cannot_write_workflow_states() {
        let order = order_with(OrderStatus::Confirmed, 2);
        let err = LifecycleEngine::plan_transition(
            &order,
            OrderStatus::Scheduled,
            StatusWriteAuthority::External,
        )
        .unwrap_err();
        assert!(matches!(err, RepositoryError::BusinessRuleViolation(_)));
    }

    #[test]
    fn test_no_show_only_from_pre_produced() {
        let order = order_with(OrderStatus::Ready, 2);
        let err = LifecycleEngine::plan_transition(
            &order,
            OrderStatus::NoShow,
            StatusWriteAuthority::External,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::InvalidStateTransition { .. }
        ));

        let order = order_with(OrderStatus::Confirmed, 2);
        let outcome = LifecycleEngine::plan_transition(
            &order,
            OrderStatus::NoShow,
            StatusWriteAuthority::External,
        )
        .unwrap();
        assert_eq!(outcome.capacity_delta, -2);
    }

    #[test]
    fn test_cancel_reversible_even_after_produced() {
        // 沿用现行行为: 已出炉订单仍可取消,仅状态回转
        let order = order_with(OrderStatus::Produced, 3);
        let outcome = LifecycleEngine::plan_transition(
            &order,
            OrderStatus::Canceled,
            StatusWriteAuthority::External,
        )
        .unwrap();
        assert_eq!(outcome.capacity_delta, -3);
    }

    #[test]
    fn test_neutral_transition_no_delta() {
        let order = order_with(OrderStatus::Submitted, 5);
        let outcome = LifecycleEngine::plan_transition(
            &order,
            OrderStatus::Confirmed,
            StatusWriteAuthority::External,
        )
        .unwrap();
        assert_eq!(outcome.capacity_delta, 0);
    }
}
