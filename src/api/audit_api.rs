// ==========================================
// 烘焙工坊产销系统 - 操作日志 API
// ==========================================
// 职责: 审计日志的只读查询
// ==========================================

use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::action_log::ActionLog;
use crate::repository::action_log_repo::ActionLogRepository;

// ==========================================
// AuditApi - 操作日志 API
// ==========================================

/// 操作日志API (只读)
pub struct AuditApi {
    action_log_repo: Arc<ActionLogRepository>,
}

impl AuditApi {
    /// 创建新的AuditApi实例
    pub fn new(action_log_repo: Arc<ActionLogRepository>) -> Self {
        Self { action_log_repo }
    }

    /// 查询最近的操作日志
    pub fn list_recent_actions(&self, limit: usize) -> ApiResult<Vec<ActionLog>> {
        if limit == 0 {
            return Err(ApiError::InvalidInput("条数上限必须 >= 1".to_string()));
        }
        Ok(self.action_log_repo.list_recent(limit)?)
    }
}
