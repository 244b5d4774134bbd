// ==========================================
// 烘焙工坊产销系统 - 生产记录仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 红线: 记录只增不删;拆分的数量守恒由引擎层在事务内保证
// ==========================================

use crate::domain::production::ProductionRecord;
use crate::domain::types::Disposition;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::slot_repo::parse_datetime;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

const RECORD_COLUMNS: &str = r#"record_id, batch_id, order_id, parent_record_id, flavor_id,
           flavor_name, quantity, disposition, sale_price, created_at, updated_at, updated_by"#;

// ==========================================
// ProductionRecordRepository - 生产记录仓储
// ==========================================

/// 生产记录仓储
/// 职责: 管理 production_record 表的CRUD
pub struct ProductionRecordRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ProductionRecordRepository {
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

    /// 插入生产记录 (事务内)
    pub fn insert_tx(conn: &Connection, record: &ProductionRecord) -> RepositoryResult<()> {
        conn.execute(
            r#"INSERT INTO production_record (
                record_id, batch_id, order_id, parent_record_id, flavor_id,
                flavor_name, quantity, disposition, sale_price,
                created_at, updated_at, updated_by
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"#,
            params![
                record.record_id,
                record.batch_id,
                record.order_id,
                record.parent_record_id,
                record.flavor_id,
                record.flavor_name,
                record.quantity,
                record.disposition.to_db_str(),
                record.sale_price.map(|d| d.to_string()),
                record.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                record.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                record.updated_by,
            ],
        )?;
        Ok(())
    }

    /// 按ID查询生产记录
    pub fn find_by_id(&self, record_id: &str) -> RepositoryResult<Option<ProductionRecord>> {
        let conn = self.get_conn()?;
        Self::find_by_id_tx(&conn, record_id)
    }

    /// 按ID查询生产记录 (事务内)
    pub fn find_by_id_tx(
        conn: &Connection,
        record_id: &str,
    ) -> RepositoryResult<Option<ProductionRecord>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM production_record WHERE record_id = ?1"
        ))?;

        let record = stmt
            .query_row(params![record_id], Self::map_row)
            .optional()?;

        Ok(record)
    }

    /// 查询备产单产出的全部记录
    pub fn list_by_batch(&self, batch_id: &str) -> RepositoryResult<Vec<ProductionRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"SELECT {RECORD_COLUMNS} FROM production_record
               WHERE batch_id = ?1
               ORDER BY created_at, record_id"#
        ))?;

        let records = stmt
            .query_map(params![batch_id], Self::map_row)?
            .collect::<SqliteResult<Vec<ProductionRecord>>>()?;

        Ok(records)
    }

    /// 按去向查询记录列表
    pub fn list_by_disposition(
        &self,
        disposition: Disposition,
    ) -> RepositoryResult<Vec<ProductionRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"SELECT {RECORD_COLUMNS} FROM production_record
               WHERE disposition = ?1
               ORDER BY updated_at DESC, record_id"#
        ))?;

        let records = stmt
            .query_map(params![disposition.to_db_str()], Self::map_row)?
            .collect::<SqliteResult<Vec<ProductionRecord>>>()?;

        Ok(records)
    }

    /// 更新记录去向 (事务内)
    pub fn update_disposition_tx(
        conn: &Connection,
        record_id: &str,
        disposition: Disposition,
        sale_price: Option<Decimal>,
        updated_by: &str,
    ) -> RepositoryResult<()> {
        let affected = conn.execute(
            r#"UPDATE production_record
               SET disposition = ?1,
                   sale_price = ?2,
                   updated_at = datetime('now', 'localtime'),
                   updated_by = ?3
               WHERE record_id = ?4"#,
            params![
                disposition.to_db_str(),
                sale_price.map(|d| d.to_string()),
                updated_by,
                record_id
            ],
        )?;

        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "ProductionRecord".to_string(),
                id: record_id.to_string(),
            });
        }
        Ok(())
    }

    /// 父记录扣减数量 (事务内,拆分用)
    ///
    /// WHERE 带 quantity > ?1 守卫: 满足不了拆分下界时零行命中,
    /// 由调用方回滚整个事务
    pub fn reduce_quantity_tx(
        conn: &Connection,
        record_id: &str,
        reduce_by: i64,
        updated_by: &str,
    ) -> RepositoryResult<()> {
        let affected = conn.execute(
            r#"UPDATE production_record
               SET quantity = quantity - ?1,
                   updated_at = datetime('now', 'localtime'),
                   updated_by = ?2
               WHERE record_id = ?3 AND quantity > ?1"#,
            params![reduce_by, updated_by, record_id],
        )?;

        if affected == 0 {
            return Err(RepositoryError::ValidationError(format!(
                "拆分数量{}不满足 1 <= 拆分量 < 当前数量,record_id={}",
                reduce_by, record_id
            )));
        }
        Ok(())
    }

    /// 映射数据库行到 ProductionRecord 对象
    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<ProductionRecord> {
        let disposition_raw: String = row.get(7)?;
        let disposition = Disposition::from_str(&disposition_raw).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                7,
                rusqlite::types::Type::Text,
                format!("非法成品去向: {}", disposition_raw).into(),
            )
        })?;

        let sale_price_raw: Option<String> = row.get(8)?;
        let sale_price = match sale_price_raw {
            None => None,
            Some(s) => Some(Decimal::from_str(&s).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    8,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?),
        };

        Ok(ProductionRecord {
            record_id: row.get(0)?,
            batch_id: row.get(1)?,
            order_id: row.get(2)?,
            parent_record_id: row.get(3)?,
            flavor_id: row.get(4)?,
            flavor_name: row.get(5)?,
            quantity: row.get(6)?,
            disposition,
            sale_price,
            created_at: parse_datetime(row, 9)?,
            updated_at: parse_datetime(row, 10)?,
            updated_by: row.get(11)?,
        })
    }
}
