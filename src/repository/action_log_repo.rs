// ==========================================
// 烘焙工坊产销系统 - 操作日志仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 说明: 日志为事后追加,不参与主事务;失败由调用方降级为告警
// ==========================================

use crate::domain::action_log::ActionLog;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::slot_repo::parse_datetime;
use rusqlite::{params, Connection, Result as SqliteResult};
use std::sync::{Arc, Mutex};

// ==========================================
// ActionLogRepository - 操作日志仓储
// ==========================================

/// 操作日志仓储
/// 职责: 管理 action_log 表的追加与查询
pub struct ActionLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ActionLogRepository {
    /// 从共享连接创建仓储实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 追加操作日志
    pub fn insert(&self, log: &ActionLog) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        conn.execute(
            r#"INSERT INTO action_log (
                action_id, action_type, action_ts, actor,
                payload_json, slot_id, batch_id, detail
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
            params![
                log.action_id,
                log.action_type,
                log.action_ts.format("%Y-%m-%d %H:%M:%S").to_string(),
                log.actor,
                log.payload_json.as_ref().map(|v| v.to_string()),
                log.slot_id,
                log.batch_id,
                log.detail,
            ],
        )?;
        Ok(())
    }

    /// 查询最近的操作日志
    ///
    /// # 参数
    /// - limit: 返回条数上限
    pub fn list_recent(&self, limit: usize) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT action_id, action_type, action_ts, actor,
                      payload_json, slot_id, batch_id, detail
               FROM action_log
               ORDER BY action_ts DESC, action_id
               LIMIT ?1"#,
        )?;

        let logs = stmt
            .query_map(params![limit as i64], Self::map_row)?
            .collect::<SqliteResult<Vec<ActionLog>>>()?;

        Ok(logs)
    }

    /// 映射数据库行到 ActionLog 对象
    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<ActionLog> {
        let payload_raw: Option<String> = row.get(4)?;

        Ok(ActionLog {
            action_id: row.get(0)?,
            action_type: row.get(1)?,
            action_ts: parse_datetime(row, 2)?,
            actor: row.get(3)?,
            // 历史日志中的非法 JSON 不阻断查询
            payload_json: payload_raw.and_then(|s| serde_json::from_str(&s).ok()),
            slot_id: row.get(5)?,
            batch_id: row.get(6)?,
            detail: row.get(7)?,
        })
    }
}
