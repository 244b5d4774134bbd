// ==========================================
// 烘焙工坊产销系统 - 订单 API
// ==========================================
// 职责: 订单入池、状态变更 (单笔/批量)、订单查询
// 说明: SCHEDULED/PRODUCED 不经本 API 写入,备产流程才是其唯一通道
// ==========================================

use rust_decimal::Decimal;
use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::order::{Order, OrderLine, OrderLineList};
use crate::domain::types::{OrderStatus, StatusWriteAuthority};
use crate::engine::events::{OpsEvent, OpsEventType, OptionalEventPublisher};
use crate::engine::lifecycle::{LifecycleEngine, OrderTransitionOutcome};
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::order_repo::OrderRepository;

// ==========================================
// OrderApi - 订单 API
// ==========================================

/// 订单API
///
/// 职责：
/// 1. 订单入池 (提交即占用档期容量)
/// 2. 状态变更 (单笔/批量,状态写入与容量台账同事务)
/// 3. 订单查询
pub struct OrderApi {
    order_repo: Arc<OrderRepository>,
    lifecycle_engine: Arc<LifecycleEngine>,
    action_log_repo: Arc<ActionLogRepository>,
    event_publisher: OptionalEventPublisher,
}

impl OrderApi {
    /// 创建新的OrderApi实例
    pub fn new(
        order_repo: Arc<OrderRepository>,
        lifecycle_engine: Arc<LifecycleEngine>,
        action_log_repo: Arc<ActionLogRepository>,
        event_publisher: OptionalEventPublisher,
    ) -> Self {
        Self {
            order_repo,
            lifecycle_engine,
            action_log_repo,
            event_publisher,
        }
    }

    /// 追加操作日志 (fire-and-forget,失败降级为告警)
    fn append_audit(&self, log: ActionLog) {
        if let Err(e) = self.action_log_repo.insert(&log) {
            tracing::warn!(
                action_type = %log.action_type,
                error = %e,
                "操作日志追加失败 (不影响主流程)"
            );
        }
    }

    // ==========================================
    // 订单入池
    // ==========================================

    /// 创建订单 (状态 SUBMITTED,容量同事务占用)
    ///
    /// # 参数
    /// - slot_id: 目标档期
    /// - customer_name: 客户姓名
    /// - lines: 订单明细行 (口味 + 数量,数量必须 >= 1)
    /// - operator: 操作人
    #[allow(clippy::too_many_arguments)]
    pub fn create_order(
        &self,
        slot_id: &str,
        customer_name: &str,
        contact: Option<String>,
        lines: Vec<OrderLine>,
        total_price: Option<Decimal>,
        deposit: Option<Decimal>,
        note: Option<String>,
        operator: &str,
    ) -> ApiResult<Order> {
        // 参数验证
        if slot_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("档期ID不能为空".to_string()));
        }
        if customer_name.trim().is_empty() {
            return Err(ApiError::InvalidInput("客户姓名不能为空".to_string()));
        }
        if operator.trim().is_empty() {
            return Err(ApiError::InvalidInput("操作人不能为空".to_string()));
        }
        if lines.is_empty() {
            return Err(ApiError::InvalidInput("订单明细不能为空".to_string()));
        }
        for line in &lines {
            if line.flavor_id.trim().is_empty() {
                return Err(ApiError::InvalidInput("口味ID不能为空".to_string()));
            }
            if line.quantity < 1 {
                return Err(ApiError::InvalidInput(format!(
                    "明细数量必须 >= 1: flavor={}, quantity={}",
                    line.flavor_id, line.quantity
                )));
            }
        }

        let now = chrono::Local::now().naive_local();
        let order = Order {
            order_id: uuid::Uuid::new_v4().to_string(),
            slot_id: slot_id.to_string(),
            customer_name: customer_name.to_string(),
            contact,
            status: OrderStatus::Submitted,
            lines_json: OrderLineList::new(lines).to_json(),
            total_price,
            deposit,
            note,
            created_at: now,
            updated_at: now,
            updated_by: Some(operator.to_string()),
        };

        self.lifecycle_engine.create_order(&order)?;

        // 记录ActionLog
        self.append_audit(
            ActionLog::new(ActionType::CreateOrder, operator)
                .with_slot(slot_id)
                .with_payload(&serde_json::json!({
                    "order_id": order.order_id,
                    "customer_name": order.customer_name,
                }))
                .with_detail(format!("创建订单: {}", order.order_id)),
        );

        self.event_publisher.publish(
            OpsEvent::new(OpsEventType::SlotCapacityChanged, Some("OrderApi".to_string()))
                .with_order(&order.order_id)
                .with_slot(slot_id),
        );

        Ok(order)
    }

    // ==========================================
    // 状态变更
    // ==========================================

    /// 更新单笔订单状态
    ///
    /// # 参数
    /// - new_status: 目标状态 (SCREAMING_SNAKE 字符串,非法值拒绝)
    pub fn update_order_status(
        &self,
        order_id: &str,
        new_status: &str,
        operator: &str,
    ) -> ApiResult<OrderTransitionOutcome> {
        if order_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("订单ID不能为空".to_string()));
        }
        if operator.trim().is_empty() {
            return Err(ApiError::InvalidInput("操作人不能为空".to_string()));
        }

        let to = OrderStatus::from_str(new_status).ok_or_else(|| {
            ApiError::InvalidInput(format!("非法订单状态: {}", new_status))
        })?;

        let outcome = self.lifecycle_engine.update_status(
            order_id,
            to,
            StatusWriteAuthority::External,
            operator,
        )?;

        // 记录ActionLog
        self.append_audit(
            ActionLog::new(ActionType::UpdateOrderStatus, operator)
                .with_slot(&outcome.slot_id)
                .with_payload(&outcome)
                .with_detail(format!(
                    "订单{}状态: {} → {}",
                    order_id, outcome.from_status, outcome.to_status
                )),
        );

        self.event_publisher.publish(
            OpsEvent::new(
                OpsEventType::OrderStatusChanged,
                Some("OrderApi".to_string()),
            )
            .with_order(order_id)
            .with_slot(&outcome.slot_id),
        );

        Ok(outcome)
    }

    /// 批量更新订单状态 (全成全败)
    pub fn bulk_update_order_status(
        &self,
        order_ids: &[String],
        new_status: &str,
        operator: &str,
    ) -> ApiResult<Vec<OrderTransitionOutcome>> {
        if order_ids.is_empty() {
            return Err(ApiError::InvalidInput("订单ID列表不能为空".to_string()));
        }
        if operator.trim().is_empty() {
            return Err(ApiError::InvalidInput("操作人不能为空".to_string()));
        }

        let to = OrderStatus::from_str(new_status).ok_or_else(|| {
            ApiError::InvalidInput(format!("非法订单状态: {}", new_status))
        })?;

        let outcomes = self.lifecycle_engine.bulk_update_status(
            order_ids,
            to,
            StatusWriteAuthority::External,
            operator,
        )?;

        // 记录ActionLog
        self.append_audit(
            ActionLog::new(ActionType::BulkUpdateOrderStatus, operator)
                .with_payload(&serde_json::json!({
                    "order_ids": order_ids,
                    "to_status": to.to_db_str(),
                    "capacity_deltas": outcomes
                        .iter()
                        .map(|o| o.capacity_delta)
                        .collect::<Vec<_>>(),
                }))
                .with_detail(format!("批量状态变更{}单 → {}", order_ids.len(), to)),
        );

        for outcome in &outcomes {
            self.event_publisher.publish(
                OpsEvent::new(
                    OpsEventType::OrderStatusChanged,
                    Some("OrderApi".to_string()),
                )
                .with_order(&outcome.order_id)
                .with_slot(&outcome.slot_id),
            );
        }

        Ok(outcomes)
    }

    // ==========================================
    // 查询接口
    // ==========================================

    /// 查询订单详情
    pub fn get_order_detail(&self, order_id: &str) -> ApiResult<Option<Order>> {
        if order_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("订单ID不能为空".to_string()));
        }
        Ok(self.order_repo.find_by_id(order_id)?)
    }

    /// 查询档期下全部订单
    pub fn list_orders_by_slot(&self, slot_id: &str) -> ApiResult<Vec<Order>> {
        if slot_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("档期ID不能为空".to_string()));
        }
        Ok(self.order_repo.list_by_slot(slot_id)?)
    }

    /// 按状态查询订单
    pub fn list_orders_by_status(&self, status: &str) -> ApiResult<Vec<Order>> {
        let parsed = OrderStatus::from_str(status)
            .ok_or_else(|| ApiError::InvalidInput(format!("非法订单状态: {}", status)))?;
        Ok(self.order_repo.list_by_status(parsed)?)
    }
}
