// ==========================================
// 烘焙工坊产销系统 - 生产档期 API
// ==========================================
// 职责: 档期创建、开关控制、余量查询、容量一致性巡检与重建
// 说明: committed_count 不经本 API 直接写入,
//       重建是唯一例外且走一致性引擎
// ==========================================

use chrono::NaiveDate;
use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::config::ConfigManager;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::slot::{ProductionSlot, SlotCapacity};
use crate::engine::consistency::{ConsistencyChecker, SlotCapacityAudit};
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::slot_repo::SlotRepository;

// ==========================================
// SlotApi - 生产档期 API
// ==========================================

/// 生产档期API
///
/// 职责：
/// 1. 档期管理 (创建、开关)
/// 2. 余量查询
/// 3. 容量一致性巡检/重建
pub struct SlotApi {
    slot_repo: Arc<SlotRepository>,
    consistency_checker: Arc<ConsistencyChecker>,
    config_manager: Arc<ConfigManager>,
    action_log_repo: Arc<ActionLogRepository>,
}

impl SlotApi {
    /// 创建新的SlotApi实例
    pub fn new(
        slot_repo: Arc<SlotRepository>,
        consistency_checker: Arc<ConsistencyChecker>,
        config_manager: Arc<ConfigManager>,
        action_log_repo: Arc<ActionLogRepository>,
    ) -> Self {
        Self {
            slot_repo,
            consistency_checker,
            config_manager,
            action_log_repo,
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
    // 档期管理
    // ==========================================

    /// 创建档期
    ///
    /// # 参数
    /// - capacity: 容量上限;缺省取配置 slot.default_capacity
    pub fn create_slot(
        &self,
        slot_date: NaiveDate,
        slot_label: Option<String>,
        capacity: Option<i64>,
        operator: &str,
    ) -> ApiResult<ProductionSlot> {
        if operator.trim().is_empty() {
            return Err(ApiError::InvalidInput("操作人不能为空".to_string()));
        }

        let total_capacity = capacity.unwrap_or_else(|| self.config_manager.default_slot_capacity());
        if total_capacity < 0 {
            return Err(ApiError::InvalidInput(format!(
                "容量上限不可为负: {}",
                total_capacity
            )));
        }

        let now = chrono::Local::now().naive_local();
        let slot = ProductionSlot {
            slot_id: uuid::Uuid::new_v4().to_string(),
            slot_date,
            slot_label,
            total_capacity,
            committed_count: 0,
            is_open: true,
            created_at: now,
            updated_at: now,
        };

        self.slot_repo.insert(&slot)?;

        // 记录ActionLog
        self.append_audit(
            ActionLog::new(ActionType::CreateSlot, operator)
                .with_slot(&slot.slot_id)
                .with_payload(&serde_json::json!({
                    "slot_date": slot.slot_date.format("%Y-%m-%d").to_string(),
                    "total_capacity": slot.total_capacity,
                }))
                .with_detail(format!("创建档期: {}", slot.slot_id)),
        );

        Ok(slot)
    }

    /// 开放/关闭档期接单 (与容量独立的人工控制)
    pub fn set_slot_open(&self, slot_id: &str, is_open: bool, operator: &str) -> ApiResult<()> {
        if slot_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("档期ID不能为空".to_string()));
        }
        if operator.trim().is_empty() {
            return Err(ApiError::InvalidInput("操作人不能为空".to_string()));
        }

        self.slot_repo.set_open(slot_id, is_open)?;

        self.append_audit(
            ActionLog::new(ActionType::ToggleSlot, operator)
                .with_slot(slot_id)
                .with_detail(format!(
                    "档期{}{}",
                    slot_id,
                    if is_open { "开放接单" } else { "关闭接单" }
                )),
        );

        Ok(())
    }

    // ==========================================
    // 查询接口
    // ==========================================

    /// 查询档期详情
    pub fn get_slot_detail(&self, slot_id: &str) -> ApiResult<Option<ProductionSlot>> {
        if slot_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("档期ID不能为空".to_string()));
        }
        Ok(self.slot_repo.find_by_id(slot_id)?)
    }

    /// 查询档期剩余可接数量 (展示用,下限 0)
    pub fn get_slot_open_capacity(&self, slot_id: &str) -> ApiResult<i64> {
        if slot_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("档期ID不能为空".to_string()));
        }

        let slot = self
            .slot_repo
            .find_by_id(slot_id)?
            .ok_or_else(|| ApiError::NotFound(format!("档期{}不存在", slot_id)))?;

        Ok(slot.open_capacity())
    }

    /// 按日期查询档期列表
    pub fn list_slots_by_date(&self, slot_date: NaiveDate) -> ApiResult<Vec<ProductionSlot>> {
        Ok(self.slot_repo.find_by_date(slot_date)?)
    }

    // ==========================================
    // 容量一致性
    // ==========================================

    /// 巡检全部档期的容量一致性
    pub fn audit_capacity(&self) -> ApiResult<Vec<SlotCapacityAudit>> {
        Ok(self.consistency_checker.audit_all()?)
    }

    /// 重建单档期的容量计数 (修复历史漂移)
    pub fn rebuild_capacity(&self, slot_id: &str, operator: &str) -> ApiResult<SlotCapacityAudit> {
        if slot_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("档期ID不能为空".to_string()));
        }
        if operator.trim().is_empty() {
            return Err(ApiError::InvalidInput("操作人不能为空".to_string()));
        }

        let audit = self.consistency_checker.rebuild_slot(slot_id)?;

        self.append_audit(
            ActionLog::new(ActionType::RebuildCapacity, operator)
                .with_slot(slot_id)
                .with_payload(&audit)
                .with_detail(format!(
                    "容量重建: {} → {}",
                    audit.recorded, audit.expected
                )),
        );

        Ok(audit)
    }
}
