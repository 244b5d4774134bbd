// ==========================================
// 烘焙工坊产销系统 - 生产记录跟踪引擎
// ==========================================
// 红线: 记录只增不删;拆分只做"父减子增",同族数量守恒
// 说明: 去向允许反复改判,不存在非法去向转换
// ==========================================

use rusqlite::Connection;
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex};

use crate::domain::production::ProductionRecord;
use crate::domain::types::Disposition;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::production_repo::ProductionRecordRepository;

// ==========================================
// TrackingEngine - 生产记录跟踪引擎
// ==========================================
pub struct TrackingEngine {
    conn: Arc<Mutex<Connection>>,
}

impl TrackingEngine {
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

    /// 校验拆分数量下界 (纯函数,上界需读到父记录后校验)
    fn validate_split_quantity(split_quantity: i64, parent_quantity: i64) -> RepositoryResult<()> {
        if split_quantity < 1 {
            return Err(RepositoryError::ValidationError(format!(
                "拆分数量必须 >= 1,实际为{}",
                split_quantity
            )));
        }
        if split_quantity >= parent_quantity {
            return Err(RepositoryError::ValidationError(format!(
                "拆分数量必须小于当前数量: split={}, current={}",
                split_quantity, parent_quantity
            )));
        }
        Ok(())
    }

    /// 改判成品去向
    ///
    /// # 规则
    /// - 去向可反复改判,不抛非法转换错误
    /// - 改判为 SOLD 时记录售价 (缺省按 0);其余去向清空售价
    pub fn update_disposition(
        &self,
        record_id: &str,
        disposition: Disposition,
        sale_price: Option<Decimal>,
        operator: &str,
    ) -> RepositoryResult<ProductionRecord> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let mut record = ProductionRecordRepository::find_by_id_tx(&tx, record_id)?.ok_or_else(
            || RepositoryError::NotFound {
                entity: "ProductionRecord".to_string(),
                id: record_id.to_string(),
            },
        )?;

        let effective_price = match disposition {
            Disposition::Sold => Some(sale_price.unwrap_or(Decimal::ZERO)),
            _ => None,
        };

        ProductionRecordRepository::update_disposition_tx(
            &tx,
            record_id,
            disposition,
            effective_price,
            operator,
        )?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        record.disposition = disposition;
        record.sale_price = effective_price;
        record.updated_by = Some(operator.to_string());

        tracing::info!(record_id, disposition = %disposition, "成品去向已改判");
        Ok(record)
    }

    /// 拆分生产记录
    ///
    /// # 规则
    /// - 要求 1 <= split_quantity < 父记录数量
    /// - 父记录数量扣减,新同族记录携带父记录的备产单/订单/口味引用
    ///   与 parent_record_id 血缘
    /// - 拆分次数不设限
    pub fn split(
        &self,
        record_id: &str,
        split_quantity: i64,
        new_disposition: Disposition,
        operator: &str,
    ) -> RepositoryResult<(ProductionRecord, ProductionRecord)> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let mut parent = ProductionRecordRepository::find_by_id_tx(&tx, record_id)?.ok_or_else(
            || RepositoryError::NotFound {
                entity: "ProductionRecord".to_string(),
                id: record_id.to_string(),
            },
        )?;

        Self::validate_split_quantity(split_quantity, parent.quantity)?;

        // SQL 侧带 quantity > split 守卫,校验后仍失败则整体回滚
        ProductionRecordRepository::reduce_quantity_tx(&tx, record_id, split_quantity, operator)?;

        let now = chrono::Local::now().naive_local();
        let sibling = ProductionRecord {
            record_id: uuid::Uuid::new_v4().to_string(),
            batch_id: parent.batch_id.clone(),
            order_id: parent.order_id.clone(),
            parent_record_id: Some(parent.record_id.clone()),
            flavor_id: parent.flavor_id.clone(),
            flavor_name: parent.flavor_name.clone(),
            quantity: split_quantity,
            disposition: new_disposition,
            sale_price: None,
            created_at: now,
            updated_at: now,
            updated_by: Some(operator.to_string()),
        };
        ProductionRecordRepository::insert_tx(&tx, &sibling)?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        parent.quantity -= split_quantity;
        parent.updated_by = Some(operator.to_string());

        tracing::info!(
            parent_id = record_id,
            sibling_id = %sibling.record_id,
            split_quantity,
            disposition = %new_disposition,
            "生产记录已拆分"
        );
        Ok((parent, sibling))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_split_quantity() {
        // 下界: 必须 >= 1
        assert!(TrackingEngine::validate_split_quantity(0, 10).is_err());
        assert!(TrackingEngine::validate_split_quantity(-3, 10).is_err());
        // 上界: 必须严格小于当前数量
        assert!(TrackingEngine::validate_split_quantity(10, 10).is_err());
        assert!(TrackingEngine::validate_split_quantity(11, 10).is_err());
        // 合法区间
        assert!(TrackingEngine::validate_split_quantity(1, 10).is_ok());
        assert!(TrackingEngine::validate_split_quantity(9, 10).is_ok());
    }
}
