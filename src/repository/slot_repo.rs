// ==========================================
// 烘焙工坊产销系统 - 生产档期仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 红线: committed_count 只经 apply_committed_delta / rebuild 变更,
//       减量在 SQL 内钳制到 0,增量不截断 (超售属设计允许)
// ==========================================

use crate::domain::slot::ProductionSlot;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use std::sync::{Arc, Mutex};

// ==========================================
// SlotRepository - 生产档期仓储
// ==========================================

/// 生产档期仓储
/// 职责: 管理 production_slot 表的CRUD与容量计数写入
pub struct SlotRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SlotRepository {
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

    /// 插入档期
    pub fn insert(&self, slot: &ProductionSlot) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        Self::insert_tx(&conn, slot)
    }

    /// 插入档期 (事务内)
    pub fn insert_tx(conn: &Connection, slot: &ProductionSlot) -> RepositoryResult<()> {
        conn.execute(
            r#"INSERT INTO production_slot (
                slot_id, slot_date, slot_label, total_capacity,
                committed_count, is_open, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
            params![
                slot.slot_id,
                slot.slot_date.format("%Y-%m-%d").to_string(),
                slot.slot_label,
                slot.total_capacity,
                slot.committed_count,
                if slot.is_open { 1 } else { 0 },
                slot.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                slot.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ],
        )?;
        Ok(())
    }

    /// 按ID查询档期
    pub fn find_by_id(&self, slot_id: &str) -> RepositoryResult<Option<ProductionSlot>> {
        let conn = self.get_conn()?;
        Self::find_by_id_tx(&conn, slot_id)
    }

    /// 按ID查询档期 (事务内)
    pub fn find_by_id_tx(conn: &Connection, slot_id: &str) -> RepositoryResult<Option<ProductionSlot>> {
        let mut stmt = conn.prepare(
            r#"SELECT slot_id, slot_date, slot_label, total_capacity,
                      committed_count, is_open, created_at, updated_at
               FROM production_slot
               WHERE slot_id = ?1"#,
        )?;

        let slot = stmt
            .query_row(params![slot_id], Self::map_row)
            .optional()?;

        Ok(slot)
    }

    /// 按日期查询档期列表
    pub fn find_by_date(&self, slot_date: NaiveDate) -> RepositoryResult<Vec<ProductionSlot>> {
        let conn = self.get_conn()?;
        let date_str = slot_date.format("%Y-%m-%d").to_string();

        let mut stmt = conn.prepare(
            r#"SELECT slot_id, slot_date, slot_label, total_capacity,
                      committed_count, is_open, created_at, updated_at
               FROM production_slot
               WHERE slot_date = ?1
               ORDER BY slot_label, slot_id"#,
        )?;

        let slots = stmt
            .query_map(params![date_str], Self::map_row)?
            .collect::<SqliteResult<Vec<ProductionSlot>>>()?;

        Ok(slots)
    }

    /// 设置档期开放/关闭标志
    ///
    /// # 返回
    /// - Err(NotFound): 档期不存在
    pub fn set_open(&self, slot_id: &str, is_open: bool) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"UPDATE production_slot
               SET is_open = ?1, updated_at = datetime('now', 'localtime')
               WHERE slot_id = ?2"#,
            params![if is_open { 1 } else { 0 }, slot_id],
        )?;

        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "ProductionSlot".to_string(),
                id: slot_id.to_string(),
            });
        }
        Ok(())
    }

    /// 对 committed_count 应用增量 (事务内)
    ///
    /// # 红线
    /// - 减量在 SQL 内钳制到 0 (容忍历史不一致)
    /// - 增量不做上限截断 (超售属设计允许)
    /// - 档期不存在视为调用方致命错误,原样上抛
    pub fn apply_committed_delta_tx(
        conn: &Connection,
        slot_id: &str,
        unit_delta: i64,
    ) -> RepositoryResult<()> {
        let affected = conn.execute(
            r#"UPDATE production_slot
               SET committed_count = CASE
                       WHEN committed_count + ?1 < 0 THEN 0
                       ELSE committed_count + ?1
                   END,
                   updated_at = datetime('now', 'localtime')
               WHERE slot_id = ?2"#,
            params![unit_delta, slot_id],
        )?;

        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "ProductionSlot".to_string(),
                id: slot_id.to_string(),
            });
        }
        Ok(())
    }

    /// 对 committed_count 应用增量 (独立事务)
    pub fn apply_committed_delta(&self, slot_id: &str, unit_delta: i64) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        Self::apply_committed_delta_tx(&conn, slot_id, unit_delta)
    }

    /// 直接设置 committed_count (事务内,仅供一致性重建使用)
    pub fn set_committed_count_tx(
        conn: &Connection,
        slot_id: &str,
        committed_count: i64,
    ) -> RepositoryResult<()> {
        let affected = conn.execute(
            r#"UPDATE production_slot
               SET committed_count = ?1, updated_at = datetime('now', 'localtime')
               WHERE slot_id = ?2"#,
            params![committed_count, slot_id],
        )?;

        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "ProductionSlot".to_string(),
                id: slot_id.to_string(),
            });
        }
        Ok(())
    }

    /// 查询全部档期ID (事务内,一致性巡检用)
    pub fn list_all_ids_tx(conn: &Connection) -> RepositoryResult<Vec<String>> {
        let mut stmt =
            conn.prepare("SELECT slot_id FROM production_slot ORDER BY slot_date, slot_id")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<SqliteResult<Vec<String>>>()?;
        Ok(ids)
    }

    /// 映射数据库行到 ProductionSlot 对象
    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<ProductionSlot> {
        Ok(ProductionSlot {
            slot_id: row.get(0)?,
            slot_date: NaiveDate::parse_from_str(&row.get::<_, String>(1)?, "%Y-%m-%d")
                .map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        1,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?,
            slot_label: row.get(2)?,
            total_capacity: row.get(3)?,
            committed_count: row.get(4)?,
            is_open: row.get::<_, i64>(5)? != 0,
            created_at: parse_datetime(row, 6)?,
            updated_at: parse_datetime(row, 7)?,
        })
    }
}

/// 解析 "%Y-%m-%d %H:%M:%S" 格式的时间列
pub(crate) fn parse_datetime(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(&row.get::<_, String>(idx)?, "%Y-%m-%d %H:%M:%S").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
