// ==========================================
// 烘焙工坊产销系统 - 容量一致性巡检引擎
// ==========================================
// 核心不变量: slot.committed_count == 该档期所有"计入"状态订单的
//             数量总和
// 用途: 巡检漂移、修复历史不一致 (重建在一个事务内完成)
// ==========================================

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::order_repo::OrderRepository;
use crate::repository::slot_repo::SlotRepository;

// ==========================================
// SlotCapacityAudit - 单档期巡检结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotCapacityAudit {
    pub slot_id: String,   // 档期ID
    pub recorded: i64,     // 台账记录的 committed_count
    pub expected: i64,     // 按订单重算的应有值
    pub drift: i64,        // recorded - expected (0 表示一致)
}

impl SlotCapacityAudit {
    /// 是否存在漂移
    pub fn is_drifted(&self) -> bool {
        self.drift != 0
    }
}

// ==========================================
// ConsistencyChecker - 容量一致性巡检
// ==========================================
pub struct ConsistencyChecker {
    conn: Arc<Mutex<Connection>>,
}

impl ConsistencyChecker {
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

    /// 在事务内重算单档期的应有 committed_count
    fn compute_expected_tx(conn: &Connection, slot_id: &str) -> RepositoryResult<i64> {
        let orders = OrderRepository::list_by_slot_tx(conn, slot_id)?;
        let expected = orders
            .iter()
            .filter(|o| o.status.counts_toward_capacity())
            .map(|o| o.total_units_or_fallback())
            .sum();
        Ok(expected)
    }

    /// 在事务内生成单档期巡检结果
    fn audit_slot_tx(conn: &Connection, slot_id: &str) -> RepositoryResult<SlotCapacityAudit> {
        let slot = SlotRepository::find_by_id_tx(conn, slot_id)?.ok_or_else(|| {
            RepositoryError::NotFound {
                entity: "ProductionSlot".to_string(),
                id: slot_id.to_string(),
            }
        })?;

        let expected = Self::compute_expected_tx(conn, slot_id)?;
        Ok(SlotCapacityAudit {
            slot_id: slot_id.to_string(),
            recorded: slot.committed_count,
            expected,
            drift: slot.committed_count - expected,
        })
    }

    /// 巡检单个档期
    pub fn audit_slot(&self, slot_id: &str) -> RepositoryResult<SlotCapacityAudit> {
        let conn = self.get_conn()?;
        Self::audit_slot_tx(&conn, slot_id)
    }

    /// 巡检全部档期,返回巡检结果 (含一致的档期,调用方自行过滤)
    pub fn audit_all(&self) -> RepositoryResult<Vec<SlotCapacityAudit>> {
        let slot_ids = {
            let conn = self.get_conn()?;
            SlotRepository::list_all_ids_tx(&conn)?
        };

        let mut audits = Vec::with_capacity(slot_ids.len());
        for slot_id in &slot_ids {
            audits.push(self.audit_slot(slot_id)?);
        }

        for audit in audits.iter().filter(|a| a.is_drifted()) {
            tracing::warn!(
                slot_id = %audit.slot_id,
                recorded = audit.recorded,
                expected = audit.expected,
                "档期容量计数漂移"
            );
        }

        Ok(audits)
    }

    /// 重建单档期的 committed_count (重算与写回在一个事务内)
    ///
    /// # 返回
    /// 修复前的巡检结果 (recorded 为旧值)
    pub fn rebuild_slot(&self, slot_id: &str) -> RepositoryResult<SlotCapacityAudit> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let audit = Self::audit_slot_tx(&tx, slot_id)?;
        if audit.is_drifted() {
            SlotRepository::set_committed_count_tx(&tx, slot_id, audit.expected)?;
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        if audit.is_drifted() {
            tracing::info!(
                slot_id,
                from = audit.recorded,
                to = audit.expected,
                "档期容量计数已重建"
            );
        }
        Ok(audit)
    }
}
