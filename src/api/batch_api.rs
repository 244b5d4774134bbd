// ==========================================
// 烘焙工坊产销系统 - 备产单 API
// ==========================================
// 职责: 备产单草稿管理、订单纳入/移出、加产项维护、终结、候选订单查询
// 红线: 本 API 是 SCHEDULED/PRODUCED 两个订单状态的唯一写入通道
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::batch::{BatchItem, ProductionBatch};
use crate::domain::order::Order;
use crate::domain::types::BatchStatus;
use crate::engine::batch_flow::{BatchFlowEngine, FinalizeOutcome};
use crate::engine::events::{OpsEvent, OpsEventType, OptionalEventPublisher};
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::batch_repo::BatchRepository;

// ==========================================
// BatchDetail - 备产单详情 (含明细)
// ==========================================
// 明细顺序: 订单项在前、加产项在后,其次客户/口味名称 (展示约定)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchDetail {
    pub batch: ProductionBatch,
    pub items: Vec<BatchItem>,
}

// ==========================================
// BatchApi - 备产单 API
// ==========================================

/// 备产单API
///
/// 职责：
/// 1. 草稿管理 (创建)
/// 2. 订单纳入/移出 (同步维护订单状态)
/// 3. 加产项维护
/// 4. 终结 (生成生产记录,一个原子单元)
/// 5. 候选订单与备产单查询
pub struct BatchApi {
    batch_repo: Arc<BatchRepository>,
    batch_flow_engine: Arc<BatchFlowEngine>,
    action_log_repo: Arc<ActionLogRepository>,
    event_publisher: OptionalEventPublisher,
}

impl BatchApi {
    /// 创建新的BatchApi实例
    pub fn new(
        batch_repo: Arc<BatchRepository>,
        batch_flow_engine: Arc<BatchFlowEngine>,
        action_log_repo: Arc<ActionLogRepository>,
        event_publisher: OptionalEventPublisher,
    ) -> Self {
        Self {
            batch_repo,
            batch_flow_engine,
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
    // 草稿管理
    // ==========================================

    /// 创建备产单草稿
    pub fn create_draft_batch(
        &self,
        batch_date: NaiveDate,
        operator: &str,
    ) -> ApiResult<ProductionBatch> {
        if operator.trim().is_empty() {
            return Err(ApiError::InvalidInput("操作人不能为空".to_string()));
        }

        let batch = self.batch_flow_engine.create_draft(batch_date, operator)?;

        // 记录ActionLog
        self.append_audit(
            ActionLog::new(ActionType::CreateDraftBatch, operator)
                .with_batch(&batch.batch_id)
                .with_payload(&serde_json::json!({
                    "batch_date": batch_date.format("%Y-%m-%d").to_string(),
                }))
                .with_detail(format!("创建备产单草稿: {}", batch.batch_id)),
        );

        self.event_publisher.publish(
            OpsEvent::new(OpsEventType::BatchDrafted, Some("BatchApi".to_string()))
                .with_batch(&batch.batch_id),
        );

        Ok(batch)
    }

    // ==========================================
    // 订单纳入/移出
    // ==========================================

    /// 订单纳入备产单 (一行口味一条明细,订单状态置 SCHEDULED)
    pub fn assign_order_to_batch(
        &self,
        batch_id: &str,
        order_id: &str,
        operator: &str,
    ) -> ApiResult<Vec<BatchItem>> {
        if batch_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("备产单ID不能为空".to_string()));
        }
        if order_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("订单ID不能为空".to_string()));
        }
        if operator.trim().is_empty() {
            return Err(ApiError::InvalidInput("操作人不能为空".to_string()));
        }

        let items = self
            .batch_flow_engine
            .assign_order(batch_id, order_id, operator)?;

        self.append_audit(
            ActionLog::new(ActionType::AssignOrder, operator)
                .with_batch(batch_id)
                .with_payload(&serde_json::json!({
                    "order_id": order_id,
                    "item_count": items.len(),
                }))
                .with_detail(format!("订单{}纳入备产单{}", order_id, batch_id)),
        );

        Ok(items)
    }

    /// 订单移出备产单 (删除其全部明细,订单状态回退 SUBMITTED)
    pub fn unassign_order_from_batch(
        &self,
        batch_id: &str,
        order_id: &str,
        operator: &str,
    ) -> ApiResult<usize> {
        if batch_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("备产单ID不能为空".to_string()));
        }
        if order_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("订单ID不能为空".to_string()));
        }
        if operator.trim().is_empty() {
            return Err(ApiError::InvalidInput("操作人不能为空".to_string()));
        }

        let removed = self
            .batch_flow_engine
            .unassign_order(batch_id, order_id, operator)?;

        self.append_audit(
            ActionLog::new(ActionType::UnassignOrder, operator)
                .with_batch(batch_id)
                .with_payload(&serde_json::json!({
                    "order_id": order_id,
                    "removed_items": removed,
                }))
                .with_detail(format!("订单{}移出备产单{}", order_id, batch_id)),
        );

        Ok(removed)
    }

    // ==========================================
    // 加产项维护
    // ==========================================

    /// 新增加产项
    pub fn add_extra_to_batch(
        &self,
        batch_id: &str,
        flavor_id: &str,
        flavor_name: &str,
        quantity: i64,
        operator: &str,
    ) -> ApiResult<BatchItem> {
        if batch_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("备产单ID不能为空".to_string()));
        }
        if flavor_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("口味ID不能为空".to_string()));
        }
        if operator.trim().is_empty() {
            return Err(ApiError::InvalidInput("操作人不能为空".to_string()));
        }

        let item = self
            .batch_flow_engine
            .add_extra(batch_id, flavor_id, flavor_name, quantity)?;

        self.append_audit(
            ActionLog::new(ActionType::AddExtra, operator)
                .with_batch(batch_id)
                .with_payload(&serde_json::json!({
                    "item_id": item.item_id,
                    "flavor_id": flavor_id,
                    "quantity": quantity,
                }))
                .with_detail(format!("加产项: {} x{}", flavor_name, quantity)),
        );

        Ok(item)
    }

    /// 修改加产项数量
    pub fn update_extra_in_batch(
        &self,
        item_id: &str,
        quantity: i64,
        operator: &str,
    ) -> ApiResult<BatchItem> {
        if item_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("明细ID不能为空".to_string()));
        }
        if operator.trim().is_empty() {
            return Err(ApiError::InvalidInput("操作人不能为空".to_string()));
        }

        let item = self.batch_flow_engine.update_extra(item_id, quantity)?;

        self.append_audit(
            ActionLog::new(ActionType::UpdateExtra, operator)
                .with_batch(&item.batch_id)
                .with_payload(&serde_json::json!({
                    "item_id": item_id,
                    "quantity": quantity,
                }))
                .with_detail(format!("加产项{}数量改为{}", item_id, quantity)),
        );

        Ok(item)
    }

    /// 删除加产项
    pub fn remove_extra_from_batch(&self, item_id: &str, operator: &str) -> ApiResult<()> {
        if item_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("明细ID不能为空".to_string()));
        }
        if operator.trim().is_empty() {
            return Err(ApiError::InvalidInput("操作人不能为空".to_string()));
        }

        self.batch_flow_engine.remove_extra(item_id)?;

        self.append_audit(
            ActionLog::new(ActionType::RemoveExtra, operator)
                .with_payload(&serde_json::json!({ "item_id": item_id }))
                .with_detail(format!("删除加产项{}", item_id)),
        );

        Ok(())
    }

    // ==========================================
    // 终结
    // ==========================================

    /// 终结备产单 (一个原子单元,失败零落库)
    ///
    /// # 参数
    /// - actual_quantities: 按明细ID覆写实产数量;未覆写的按计划数量
    pub fn finalize_batch(
        &self,
        batch_id: &str,
        actual_quantities: &HashMap<String, i64>,
        operator: &str,
    ) -> ApiResult<FinalizeOutcome> {
        if batch_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("备产单ID不能为空".to_string()));
        }
        if operator.trim().is_empty() {
            return Err(ApiError::InvalidInput("操作人不能为空".to_string()));
        }

        let outcome = self
            .batch_flow_engine
            .finalize(batch_id, actual_quantities, operator)?;

        self.append_audit(
            ActionLog::new(ActionType::FinalizeBatch, operator)
                .with_batch(batch_id)
                .with_payload(&serde_json::json!({
                    "record_count": outcome.records.len(),
                    "produced_orders": outcome
                        .order_transitions
                        .iter()
                        .map(|t| t.order_id.clone())
                        .collect::<Vec<_>>(),
                }))
                .with_detail(format!(
                    "终结备产单{}: 生成{}条生产记录",
                    batch_id,
                    outcome.records.len()
                )),
        );

        self.event_publisher.publish(
            OpsEvent::new(OpsEventType::BatchFinalized, Some("BatchApi".to_string()))
                .with_batch(batch_id),
        );

        Ok(outcome)
    }

    // ==========================================
    // 查询接口
    // ==========================================

    /// 查询指定日期可纳入备产单的订单 (纯读)
    pub fn list_available_orders_for_date(&self, date: NaiveDate) -> ApiResult<Vec<Order>> {
        Ok(self.batch_flow_engine.list_available_orders(date)?)
    }

    /// 查询备产单详情 (含展示序明细)
    pub fn get_batch_detail(&self, batch_id: &str) -> ApiResult<Option<BatchDetail>> {
        if batch_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("备产单ID不能为空".to_string()));
        }

        let Some(batch) = self.batch_repo.find_by_id(batch_id)? else {
            return Ok(None);
        };
        let items = self.batch_repo.find_items_by_batch(batch_id)?;

        Ok(Some(BatchDetail { batch, items }))
    }

    /// 按日期查询备产单列表
    pub fn list_batches_by_date(&self, batch_date: NaiveDate) -> ApiResult<Vec<ProductionBatch>> {
        Ok(self.batch_repo.list_by_date(batch_date)?)
    }

    /// 按状态查询备产单列表
    pub fn list_batches_by_status(&self, status: &str) -> ApiResult<Vec<ProductionBatch>> {
        let parsed = BatchStatus::from_str(status)
            .ok_or_else(|| ApiError::InvalidInput(format!("非法备产单状态: {}", status)))?;
        Ok(self.batch_repo.list_by_status(parsed)?)
    }
}
