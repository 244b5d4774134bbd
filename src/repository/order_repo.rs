// ==========================================
// 烘焙工坊产销系统 - 订单仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 红线: 状态列只存枚举的 SCREAMING_SNAKE 形式,读取时严格解析
// ==========================================

use crate::domain::order::Order;
use crate::domain::types::OrderStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::slot_repo::parse_datetime;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

const ORDER_COLUMNS: &str = r#"order_id, slot_id, customer_name, contact, status, lines_json,
           total_price, deposit, note, created_at, updated_at, updated_by"#;

// ==========================================
// OrderRepository - 订单仓储
// ==========================================

/// 订单仓储
/// 职责: 管理 customer_order 表的CRUD与状态写入
pub struct OrderRepository {
    conn: Arc<Mutex<Connection>>,
}

impl OrderRepository {
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

    /// 插入订单 (事务内)
    pub fn insert_tx(conn: &Connection, order: &Order) -> RepositoryResult<()> {
        conn.execute(
            r#"INSERT INTO customer_order (
                order_id, slot_id, customer_name, contact, status, lines_json,
                total_price, deposit, note, created_at, updated_at, updated_by
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"#,
            params![
                order.order_id,
                order.slot_id,
                order.customer_name,
                order.contact,
                order.status.to_db_str(),
                order.lines_json,
                order.total_price.map(|d| d.to_string()),
                order.deposit.map(|d| d.to_string()),
                order.note,
                order.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                order.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                order.updated_by,
            ],
        )?;
        Ok(())
    }

    /// 按ID查询订单
    pub fn find_by_id(&self, order_id: &str) -> RepositoryResult<Option<Order>> {
        let conn = self.get_conn()?;
        Self::find_by_id_tx(&conn, order_id)
    }

    /// 按ID查询订单 (事务内)
    pub fn find_by_id_tx(conn: &Connection, order_id: &str) -> RepositoryResult<Option<Order>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {ORDER_COLUMNS} FROM customer_order WHERE order_id = ?1"
        ))?;

        let order = stmt
            .query_row(params![order_id], Self::map_row)
            .optional()?;

        Ok(order)
    }

    /// 查询档期下全部订单 (事务内)
    pub fn list_by_slot_tx(conn: &Connection, slot_id: &str) -> RepositoryResult<Vec<Order>> {
        let mut stmt = conn.prepare(&format!(
            r#"SELECT {ORDER_COLUMNS} FROM customer_order
               WHERE slot_id = ?1
               ORDER BY created_at, order_id"#
        ))?;

        let orders = stmt
            .query_map(params![slot_id], Self::map_row)?
            .collect::<SqliteResult<Vec<Order>>>()?;

        Ok(orders)
    }

    /// 查询档期下全部订单
    pub fn list_by_slot(&self, slot_id: &str) -> RepositoryResult<Vec<Order>> {
        let conn = self.get_conn()?;
        Self::list_by_slot_tx(&conn, slot_id)
    }

    /// 按状态查询订单列表
    pub fn list_by_status(&self, status: OrderStatus) -> RepositoryResult<Vec<Order>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"SELECT {ORDER_COLUMNS} FROM customer_order
               WHERE status = ?1
               ORDER BY created_at, order_id"#
        ))?;

        let orders = stmt
            .query_map(params![status.to_db_str()], Self::map_row)?
            .collect::<SqliteResult<Vec<Order>>>()?;

        Ok(orders)
    }

    /// 更新订单状态 (事务内)
    ///
    /// # 返回
    /// - Err(NotFound): 订单不存在
    pub fn update_status_tx(
        conn: &Connection,
        order_id: &str,
        new_status: OrderStatus,
        updated_by: &str,
    ) -> RepositoryResult<()> {
        let affected = conn.execute(
            r#"UPDATE customer_order
               SET status = ?1,
                   updated_at = datetime('now', 'localtime'),
                   updated_by = ?2
               WHERE order_id = ?3"#,
            params![new_status.to_db_str(), updated_by, order_id],
        )?;

        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Order".to_string(),
                id: order_id.to_string(),
            });
        }
        Ok(())
    }

    /// 查询指定日期可纳入备产单的订单 (事务内)
    ///
    /// 条件: 档期日期匹配 + 状态为 SUBMITTED/CONFIRMED
    ///       + 未被任何备产单明细引用
    /// 排序: 客户姓名,其次订单ID (展示用,不影响正确性)
    pub fn find_available_for_date_tx(
        conn: &Connection,
        date: NaiveDate,
    ) -> RepositoryResult<Vec<Order>> {
        let date_str = date.format("%Y-%m-%d").to_string();

        // 与 production_slot 连接,列名需带表别名限定,避免歧义
        let mut stmt = conn.prepare(
            r#"SELECT o.order_id, o.slot_id, o.customer_name, o.contact, o.status,
                      o.lines_json, o.total_price, o.deposit, o.note,
                      o.created_at, o.updated_at, o.updated_by
               FROM customer_order o
               JOIN production_slot s ON s.slot_id = o.slot_id
               WHERE s.slot_date = ?1
                 AND o.status IN ('SUBMITTED', 'CONFIRMED')
                 AND NOT EXISTS (
                     SELECT 1 FROM batch_item bi WHERE bi.order_id = o.order_id
                 )
               ORDER BY o.customer_name, o.order_id"#,
        )?;

        let orders = stmt
            .query_map(params![date_str], Self::map_row)?
            .collect::<SqliteResult<Vec<Order>>>()?;

        Ok(orders)
    }

    /// 查询指定日期可纳入备产单的订单
    pub fn find_available_for_date(&self, date: NaiveDate) -> RepositoryResult<Vec<Order>> {
        let conn = self.get_conn()?;
        Self::find_available_for_date_tx(&conn, date)
    }

    /// 映射数据库行到 Order 对象
    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<Order> {
        let status_raw: String = row.get(4)?;
        let status = OrderStatus::from_str(&status_raw).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                4,
                rusqlite::types::Type::Text,
                format!("非法订单状态: {}", status_raw).into(),
            )
        })?;

        Ok(Order {
            order_id: row.get(0)?,
            slot_id: row.get(1)?,
            customer_name: row.get(2)?,
            contact: row.get(3)?,
            status,
            lines_json: row.get(5)?,
            total_price: parse_decimal(row, 6)?,
            deposit: parse_decimal(row, 7)?,
            note: row.get(8)?,
            created_at: parse_datetime(row, 9)?,
            updated_at: parse_datetime(row, 10)?,
            updated_by: row.get(11)?,
        })
    }
}

/// 解析 TEXT 存储的金额列
fn parse_decimal(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Option<Decimal>> {
    let raw: Option<String> = row.get(idx)?;
    match raw {
        None => Ok(None),
        Some(s) => Decimal::from_str(&s).map(Some).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        }),
    }
}
