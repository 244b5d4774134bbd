// ==========================================
// 烘焙工坊产销系统 - 备产单仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 说明: 草稿校验/终结编排由引擎层在事务内完成,
//       本仓储只提供行级读写
// ==========================================

use crate::domain::batch::{BatchItem, ProductionBatch};
use crate::domain::types::BatchStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::slot_repo::parse_datetime;
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use std::sync::{Arc, Mutex};

const BATCH_COLUMNS: &str =
    "batch_id, batch_date, status, created_by, created_at, completed_at, completed_by";

const ITEM_COLUMNS: &str =
    "item_id, batch_id, order_id, customer_name, flavor_id, flavor_name, planned_quantity, created_at";

// ==========================================
// BatchRepository - 备产单仓储
// ==========================================

/// 备产单仓储
/// 职责: 管理 production_batch / batch_item 两表的CRUD
pub struct BatchRepository {
    conn: Arc<Mutex<Connection>>,
}

impl BatchRepository {
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

    // ==========================================
    // 备产单
    // ==========================================

    /// 插入备产单 (事务内)
    pub fn insert_tx(conn: &Connection, batch: &ProductionBatch) -> RepositoryResult<()> {
        conn.execute(
            r#"INSERT INTO production_batch (
                batch_id, batch_date, status, created_by, created_at, completed_at, completed_by
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
            params![
                batch.batch_id,
                batch.batch_date.format("%Y-%m-%d").to_string(),
                batch.status.to_db_str(),
                batch.created_by,
                batch.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                batch
                    .completed_at
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
                batch.completed_by,
            ],
        )?;
        Ok(())
    }

    /// 按ID查询备产单
    pub fn find_by_id(&self, batch_id: &str) -> RepositoryResult<Option<ProductionBatch>> {
        let conn = self.get_conn()?;
        Self::find_by_id_tx(&conn, batch_id)
    }

    /// 按ID查询备产单 (事务内)
    pub fn find_by_id_tx(
        conn: &Connection,
        batch_id: &str,
    ) -> RepositoryResult<Option<ProductionBatch>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {BATCH_COLUMNS} FROM production_batch WHERE batch_id = ?1"
        ))?;

        let batch = stmt
            .query_row(params![batch_id], Self::map_batch_row)
            .optional()?;

        Ok(batch)
    }

    /// 按日期查询备产单列表
    pub fn list_by_date(&self, batch_date: NaiveDate) -> RepositoryResult<Vec<ProductionBatch>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"SELECT {BATCH_COLUMNS} FROM production_batch
               WHERE batch_date = ?1
               ORDER BY created_at, batch_id"#
        ))?;

        let batches = stmt
            .query_map(
                params![batch_date.format("%Y-%m-%d").to_string()],
                Self::map_batch_row,
            )?
            .collect::<SqliteResult<Vec<ProductionBatch>>>()?;

        Ok(batches)
    }

    /// 按状态查询备产单列表
    pub fn list_by_status(&self, status: BatchStatus) -> RepositoryResult<Vec<ProductionBatch>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"SELECT {BATCH_COLUMNS} FROM production_batch
               WHERE status = ?1
               ORDER BY batch_date, created_at"#
        ))?;

        let batches = stmt
            .query_map(params![status.to_db_str()], Self::map_batch_row)?
            .collect::<SqliteResult<Vec<ProductionBatch>>>()?;

        Ok(batches)
    }

    /// 将备产单置为已完成 (事务内)
    pub fn mark_completed_tx(
        conn: &Connection,
        batch_id: &str,
        completed_at: NaiveDateTime,
        completed_by: &str,
    ) -> RepositoryResult<()> {
        let affected = conn.execute(
            r#"UPDATE production_batch
               SET status = 'COMPLETED', completed_at = ?1, completed_by = ?2
               WHERE batch_id = ?3"#,
            params![
                completed_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                completed_by,
                batch_id
            ],
        )?;

        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "ProductionBatch".to_string(),
                id: batch_id.to_string(),
            });
        }
        Ok(())
    }

    // ==========================================
    // 备产明细
    // ==========================================

    /// 插入明细 (事务内)
    pub fn insert_item_tx(conn: &Connection, item: &BatchItem) -> RepositoryResult<()> {
        conn.execute(
            r#"INSERT INTO batch_item (
                item_id, batch_id, order_id, customer_name,
                flavor_id, flavor_name, planned_quantity, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
            params![
                item.item_id,
                item.batch_id,
                item.order_id,
                item.customer_name,
                item.flavor_id,
                item.flavor_name,
                item.planned_quantity,
                item.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ],
        )?;
        Ok(())
    }

    /// 按ID查询明细 (事务内)
    pub fn find_item_by_id_tx(
        conn: &Connection,
        item_id: &str,
    ) -> RepositoryResult<Option<BatchItem>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {ITEM_COLUMNS} FROM batch_item WHERE item_id = ?1"
        ))?;

        let item = stmt
            .query_row(params![item_id], Self::map_item_row)
            .optional()?;

        Ok(item)
    }

    /// 查询备产单全部明细 (事务内)
    ///
    /// 排序: 订单项在前、加产项在后,其次客户姓名/口味名称 (展示约定)
    pub fn find_items_by_batch_tx(
        conn: &Connection,
        batch_id: &str,
    ) -> RepositoryResult<Vec<BatchItem>> {
        let mut stmt = conn.prepare(&format!(
            r#"SELECT {ITEM_COLUMNS} FROM batch_item
               WHERE batch_id = ?1
               ORDER BY (order_id IS NULL),
                        COALESCE(customer_name, ''),
                        flavor_name,
                        item_id"#
        ))?;

        let items = stmt
            .query_map(params![batch_id], Self::map_item_row)?
            .collect::<SqliteResult<Vec<BatchItem>>>()?;

        Ok(items)
    }

    /// 查询备产单全部明细
    pub fn find_items_by_batch(&self, batch_id: &str) -> RepositoryResult<Vec<BatchItem>> {
        let conn = self.get_conn()?;
        Self::find_items_by_batch_tx(&conn, batch_id)
    }

    /// 判断订单是否已被任何备产明细引用 (事务内)
    pub fn order_referenced_tx(conn: &Connection, order_id: &str) -> RepositoryResult<bool> {
        let referenced: bool = conn
            .query_row(
                "SELECT 1 FROM batch_item WHERE order_id = ?1 LIMIT 1",
                params![order_id],
                |_row| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        Ok(referenced)
    }

    /// 删除某订单在备产单中的全部明细 (事务内)
    ///
    /// # 返回
    /// - Ok(usize): 删除的明细条数
    pub fn delete_items_by_order_tx(
        conn: &Connection,
        batch_id: &str,
        order_id: &str,
    ) -> RepositoryResult<usize> {
        let affected = conn.execute(
            "DELETE FROM batch_item WHERE batch_id = ?1 AND order_id = ?2",
            params![batch_id, order_id],
        )?;
        Ok(affected)
    }

    /// 修改加产项数量 (事务内)
    pub fn update_item_quantity_tx(
        conn: &Connection,
        item_id: &str,
        planned_quantity: i64,
    ) -> RepositoryResult<()> {
        let affected = conn.execute(
            "UPDATE batch_item SET planned_quantity = ?1 WHERE item_id = ?2",
            params![planned_quantity, item_id],
        )?;

        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "BatchItem".to_string(),
                id: item_id.to_string(),
            });
        }
        Ok(())
    }

    /// 删除明细 (事务内)
    pub fn delete_item_tx(conn: &Connection, item_id: &str) -> RepositoryResult<()> {
        let affected = conn.execute(
            "DELETE FROM batch_item WHERE item_id = ?1",
            params![item_id],
        )?;

        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "BatchItem".to_string(),
                id: item_id.to_string(),
            });
        }
        Ok(())
    }

    // ==========================================
    // 行映射
    // ==========================================

    /// 映射数据库行到 ProductionBatch 对象
    fn map_batch_row(row: &rusqlite::Row) -> rusqlite::Result<ProductionBatch> {
        let status_raw: String = row.get(2)?;
        let status = BatchStatus::from_str(&status_raw).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                format!("非法备产单状态: {}", status_raw).into(),
            )
        })?;

        Ok(ProductionBatch {
            batch_id: row.get(0)?,
            batch_date: NaiveDate::parse_from_str(&row.get::<_, String>(1)?, "%Y-%m-%d")
                .map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        1,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?,
            status,
            created_by: row.get(3)?,
            created_at: parse_datetime(row, 4)?,
            completed_at: row
                .get::<_, Option<String>>(5)?
                .and_then(|s| NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S").ok()),
            completed_by: row.get(6)?,
        })
    }

    /// 映射数据库行到 BatchItem 对象
    fn map_item_row(row: &rusqlite::Row) -> rusqlite::Result<BatchItem> {
        Ok(BatchItem {
            item_id: row.get(0)?,
            batch_id: row.get(1)?,
            order_id: row.get(2)?,
            customer_name: row.get(3)?,
            flavor_id: row.get(4)?,
            flavor_name: row.get(5)?,
            planned_quantity: row.get(6)?,
            created_at: parse_datetime(row, 7)?,
        })
    }
}
