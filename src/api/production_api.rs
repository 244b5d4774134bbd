// ==========================================
// 烘焙工坊产销系统 - 生产记录 API
// ==========================================
// 职责: 成品去向改判、记录拆分、生产记录查询
// 说明: 拆分不设次数上限;去向允许反复改判
// ==========================================

use rust_decimal::Decimal;
use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::production::ProductionRecord;
use crate::domain::types::Disposition;
use crate::engine::events::{OpsEvent, OpsEventType, OptionalEventPublisher};
use crate::engine::tracking::TrackingEngine;
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::production_repo::ProductionRecordRepository;

// ==========================================
// ProductionApi - 生产记录 API
// ==========================================

/// 生产记录API
///
/// 职责：
/// 1. 去向改判 (SOLD 记录售价)
/// 2. 记录拆分 (同族数量守恒)
/// 3. 记录查询
pub struct ProductionApi {
    production_repo: Arc<ProductionRecordRepository>,
    tracking_engine: Arc<TrackingEngine>,
    action_log_repo: Arc<ActionLogRepository>,
    event_publisher: OptionalEventPublisher,
}

impl ProductionApi {
    /// 创建新的ProductionApi实例
    pub fn new(
        production_repo: Arc<ProductionRecordRepository>,
        tracking_engine: Arc<TrackingEngine>,
        action_log_repo: Arc<ActionLogRepository>,
        event_publisher: OptionalEventPublisher,
    ) -> Self {
        Self {
            production_repo,
            tracking_engine,
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
    // 去向改判
    // ==========================================

    /// 改判成品去向
    ///
    /// # 参数
    /// - disposition: 目标去向 (SCREAMING_SNAKE 字符串,非法值拒绝)
    /// - sale_price: 售价 (仅去向为 SOLD 时有意义,缺省按 0)
    pub fn update_production_disposition(
        &self,
        record_id: &str,
        disposition: &str,
        sale_price: Option<Decimal>,
        operator: &str,
    ) -> ApiResult<ProductionRecord> {
        if record_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("记录ID不能为空".to_string()));
        }
        if operator.trim().is_empty() {
            return Err(ApiError::InvalidInput("操作人不能为空".to_string()));
        }

        let parsed = Disposition::from_str(disposition)
            .ok_or_else(|| ApiError::InvalidInput(format!("非法成品去向: {}", disposition)))?;

        if let Some(price) = sale_price {
            if price < Decimal::ZERO {
                return Err(ApiError::InvalidInput(format!("售价不可为负: {}", price)));
            }
        }

        let record = self.tracking_engine.update_disposition(
            record_id,
            parsed,
            sale_price,
            operator,
        )?;

        // 记录ActionLog
        self.append_audit(
            ActionLog::new(ActionType::UpdateDisposition, operator)
                .with_batch(&record.batch_id)
                .with_payload(&serde_json::json!({
                    "record_id": record_id,
                    "disposition": parsed.to_db_str(),
                    "sale_price": record.sale_price.map(|d| d.to_string()),
                }))
                .with_detail(format!("记录{}去向改判为{}", record_id, parsed)),
        );

        self.event_publisher.publish(
            OpsEvent::new(
                OpsEventType::DispositionChanged,
                Some("ProductionApi".to_string()),
            )
            .with_record(record_id)
            .with_batch(&record.batch_id),
        );

        Ok(record)
    }

    // ==========================================
    // 记录拆分
    // ==========================================

    /// 拆分生产记录
    ///
    /// 要求 1 <= split_quantity < 当前数量;父记录扣减,
    /// 新同族记录携带父记录引用与指定去向
    pub fn split_production_record(
        &self,
        record_id: &str,
        split_quantity: i64,
        new_disposition: &str,
        operator: &str,
    ) -> ApiResult<(ProductionRecord, ProductionRecord)> {
        if record_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("记录ID不能为空".to_string()));
        }
        if operator.trim().is_empty() {
            return Err(ApiError::InvalidInput("操作人不能为空".to_string()));
        }

        let parsed = Disposition::from_str(new_disposition).ok_or_else(|| {
            ApiError::InvalidInput(format!("非法成品去向: {}", new_disposition))
        })?;

        let (parent, sibling) =
            self.tracking_engine
                .split(record_id, split_quantity, parsed, operator)?;

        self.append_audit(
            ActionLog::new(ActionType::SplitRecord, operator)
                .with_batch(&parent.batch_id)
                .with_payload(&serde_json::json!({
                    "parent_record_id": parent.record_id,
                    "sibling_record_id": sibling.record_id,
                    "split_quantity": split_quantity,
                    "new_disposition": parsed.to_db_str(),
                }))
                .with_detail(format!(
                    "记录{}拆出{}个 → {}",
                    record_id, split_quantity, parsed
                )),
        );

        self.event_publisher.publish(
            OpsEvent::new(OpsEventType::RecordSplit, Some("ProductionApi".to_string()))
                .with_record(&parent.record_id)
                .with_batch(&parent.batch_id),
        );

        Ok((parent, sibling))
    }

    // ==========================================
    // 查询接口
    // ==========================================

    /// 查询记录详情
    pub fn get_record_detail(&self, record_id: &str) -> ApiResult<Option<ProductionRecord>> {
        if record_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("记录ID不能为空".to_string()));
        }
        Ok(self.production_repo.find_by_id(record_id)?)
    }

    /// 查询备产单产出的全部记录
    pub fn list_records_by_batch(&self, batch_id: &str) -> ApiResult<Vec<ProductionRecord>> {
        if batch_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("备产单ID不能为空".to_string()));
        }
        Ok(self.production_repo.list_by_batch(batch_id)?)
    }

    /// 按去向查询记录列表
    pub fn list_records_by_disposition(
        &self,
        disposition: &str,
    ) -> ApiResult<Vec<ProductionRecord>> {
        let parsed = Disposition::from_str(disposition)
            .ok_or_else(|| ApiError::InvalidInput(format!("非法成品去向: {}", disposition)))?;
        Ok(self.production_repo.list_by_disposition(parsed)?)
    }
}
