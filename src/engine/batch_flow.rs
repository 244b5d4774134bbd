// ==========================================
// 烘焙工坊产销系统 - 备产流程引擎
// ==========================================
// 状态机: DRAFT --finalize--> COMPLETED (终态,不可重开)
// 红线: 一切编辑操作要求 DRAFT,否则状态错误且零写入
// 红线: 终结是一个原子单元: 逐明细生成生产记录 + 订单批量置
//       PRODUCED (去重) + 备产单置 COMPLETED,部分落库不允许
// ==========================================

use chrono::NaiveDate;
use rusqlite::Connection;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::domain::batch::{BatchItem, ProductionBatch};
use crate::domain::order::Order;
use crate::domain::production::ProductionRecord;
use crate::domain::types::{BatchStatus, Disposition, OrderStatus, StatusWriteAuthority};
use crate::engine::lifecycle::{LifecycleEngine, OrderTransitionOutcome};
use crate::repository::batch_repo::BatchRepository;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::order_repo::OrderRepository;
use crate::repository::production_repo::ProductionRecordRepository;

/// 明细解析失败时的降级口味标识
const UNKNOWN_FLAVOR_ID: &str = "UNKNOWN";

// ==========================================
// FinalizeOutcome - 终结结果
// ==========================================
#[derive(Debug, Clone)]
pub struct FinalizeOutcome {
    pub batch: ProductionBatch,                       // 终结后的备产单
    pub records: Vec<ProductionRecord>,               // 生成的生产记录
    pub order_transitions: Vec<OrderTransitionOutcome>, // 订单置 PRODUCED 的转换明细
}

// ==========================================
// BatchFlowEngine - 备产流程引擎
// ==========================================
pub struct BatchFlowEngine {
    conn: Arc<Mutex<Connection>>,
}

impl BatchFlowEngine {
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

    /// 读取备产单并要求其处于草稿状态
    fn require_draft(conn: &Connection, batch_id: &str) -> RepositoryResult<ProductionBatch> {
        let batch = BatchRepository::find_by_id_tx(conn, batch_id)?.ok_or_else(|| {
            RepositoryError::NotFound {
                entity: "ProductionBatch".to_string(),
                id: batch_id.to_string(),
            }
        })?;

        if !batch.is_draft() {
            return Err(RepositoryError::BatchNotEditable {
                batch_id: batch_id.to_string(),
                status: batch.status.to_string(),
            });
        }

        Ok(batch)
    }

    /// 按订单明细行构造备产明细 (一行口味一条)
    ///
    /// 降级策略: 明细解析失败时记 warn,按未知口味 1 个生成单条明细,
    /// 与容量侧"按 1 个计"的降级保持一致
    fn build_items_for_order(batch_id: &str, order: &Order) -> Vec<BatchItem> {
        let now = chrono::Local::now().naive_local();

        let lines = match order.parse_lines() {
            Ok(list) => list.lines,
            Err(e) => {
                tracing::warn!(
                    order_id = %order.order_id,
                    error = %e,
                    "订单明细解析失败,按未知口味 1 个生成备产明细"
                );
                return vec![BatchItem {
                    item_id: uuid::Uuid::new_v4().to_string(),
                    batch_id: batch_id.to_string(),
                    order_id: Some(order.order_id.clone()),
                    customer_name: Some(order.customer_name.clone()),
                    flavor_id: UNKNOWN_FLAVOR_ID.to_string(),
                    flavor_name: "未知口味".to_string(),
                    planned_quantity: 1,
                    created_at: now,
                }];
            }
        };

        lines
            .into_iter()
            .map(|line| BatchItem {
                item_id: uuid::Uuid::new_v4().to_string(),
                batch_id: batch_id.to_string(),
                order_id: Some(order.order_id.clone()),
                customer_name: Some(order.customer_name.clone()),
                flavor_id: line.flavor_id,
                flavor_name: line.flavor_name,
                planned_quantity: line.quantity,
                created_at: now,
            })
            .collect()
    }

    // ==========================================
    // 草稿管理
    // ==========================================

    /// 创建备产单草稿
    pub fn create_draft(
        &self,
        batch_date: NaiveDate,
        created_by: &str,
    ) -> RepositoryResult<ProductionBatch> {
        let batch = ProductionBatch {
            batch_id: uuid::Uuid::new_v4().to_string(),
            batch_date,
            status: BatchStatus::Draft,
            created_by: created_by.to_string(),
            created_at: chrono::Local::now().naive_local(),
            completed_at: None,
            completed_by: None,
        };

        let conn = self.get_conn()?;
        BatchRepository::insert_tx(&conn, &batch)?;

        tracing::info!(batch_id = %batch.batch_id, date = %batch_date, "备产单草稿已创建");
        Ok(batch)
    }

    /// 订单纳入备产单
    ///
    /// 一个原子单元: 逐口味行生成明细 + 订单状态置 SCHEDULED
    pub fn assign_order(
        &self,
        batch_id: &str,
        order_id: &str,
        operator: &str,
    ) -> RepositoryResult<Vec<BatchItem>> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        Self::require_draft(&tx, batch_id)?;

        let order = OrderRepository::find_by_id_tx(&tx, order_id)?.ok_or_else(|| {
            RepositoryError::NotFound {
                entity: "Order".to_string(),
                id: order_id.to_string(),
            }
        })?;

        if BatchRepository::order_referenced_tx(&tx, order_id)? {
            return Err(RepositoryError::BusinessRuleViolation(format!(
                "订单{}已被备产单引用,不可重复纳入",
                order_id
            )));
        }

        let items = Self::build_items_for_order(batch_id, &order);
        for item in &items {
            BatchRepository::insert_item_tx(&tx, item)?;
        }

        let outcome = LifecycleEngine::plan_transition(
            &order,
            OrderStatus::Scheduled,
            StatusWriteAuthority::BatchWorkflow,
        )?;
        LifecycleEngine::apply_transition_tx(&tx, &outcome, operator)?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        tracing::info!(batch_id, order_id, items = items.len(), "订单已纳入备产单");
        Ok(items)
    }

    /// 订单移出备产单
    ///
    /// 一个原子单元: 删除该订单全部明细 + 订单状态回退 SUBMITTED
    pub fn unassign_order(
        &self,
        batch_id: &str,
        order_id: &str,
        operator: &str,
    ) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        Self::require_draft(&tx, batch_id)?;

        let removed = BatchRepository::delete_items_by_order_tx(&tx, batch_id, order_id)?;
        if removed == 0 {
            return Err(RepositoryError::NotFound {
                entity: "BatchItem".to_string(),
                id: format!("batch={} order={}", batch_id, order_id),
            });
        }

        LifecycleEngine::transition_in_tx(
            &tx,
            order_id,
            OrderStatus::Submitted,
            StatusWriteAuthority::BatchWorkflow,
            operator,
        )?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        tracing::info!(batch_id, order_id, removed, "订单已移出备产单");
        Ok(removed)
    }

    // ==========================================
    // 加产项管理
    // ==========================================

    /// 新增加产项 (无订单引用的独立明细)
    pub fn add_extra(
        &self,
        batch_id: &str,
        flavor_id: &str,
        flavor_name: &str,
        quantity: i64,
    ) -> RepositoryResult<BatchItem> {
        if quantity < 1 {
            return Err(RepositoryError::ValidationError(format!(
                "加产数量必须 >= 1,实际为{}",
                quantity
            )));
        }

        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        Self::require_draft(&tx, batch_id)?;

        let item = BatchItem {
            item_id: uuid::Uuid::new_v4().to_string(),
            batch_id: batch_id.to_string(),
            order_id: None,
            customer_name: None,
            flavor_id: flavor_id.to_string(),
            flavor_name: flavor_name.to_string(),
            planned_quantity: quantity,
            created_at: chrono::Local::now().naive_local(),
        };
        BatchRepository::insert_item_tx(&tx, &item)?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        tracing::info!(batch_id, flavor_id, quantity, "加产项已添加");
        Ok(item)
    }

    /// 读取加产项并校验其可编辑性
    fn require_editable_extra(conn: &Connection, item_id: &str) -> RepositoryResult<BatchItem> {
        let item = BatchRepository::find_item_by_id_tx(conn, item_id)?.ok_or_else(|| {
            RepositoryError::NotFound {
                entity: "BatchItem".to_string(),
                id: item_id.to_string(),
            }
        })?;

        if !item.is_extra() {
            return Err(RepositoryError::BusinessRuleViolation(format!(
                "明细{}为订单项,只能通过订单纳入/移出维护",
                item_id
            )));
        }

        Self::require_draft(conn, &item.batch_id)?;
        Ok(item)
    }

    /// 修改加产项数量
    pub fn update_extra(&self, item_id: &str, quantity: i64) -> RepositoryResult<BatchItem> {
        if quantity < 1 {
            return Err(RepositoryError::ValidationError(format!(
                "加产数量必须 >= 1,实际为{}",
                quantity
            )));
        }

        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let mut item = Self::require_editable_extra(&tx, item_id)?;
        BatchRepository::update_item_quantity_tx(&tx, item_id, quantity)?;
        item.planned_quantity = quantity;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        Ok(item)
    }

    /// 删除加产项
    pub fn remove_extra(&self, item_id: &str) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        Self::require_editable_extra(&tx, item_id)?;
        BatchRepository::delete_item_tx(&tx, item_id)?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        Ok(())
    }

    // ==========================================
    // 终结
    // ==========================================

    /// 终结备产单
    ///
    /// # 参数
    /// - actual_quantities: 按明细ID覆写实产数量;未覆写的按计划数量
    ///
    /// # 原子单元
    /// 逐明细生成生产记录 (去向 PENDING) + 订单去重置 PRODUCED
    /// + 备产单置 COMPLETED;任一步失败整体回滚
    pub fn finalize(
        &self,
        batch_id: &str,
        actual_quantities: &HashMap<String, i64>,
        operator: &str,
    ) -> RepositoryResult<FinalizeOutcome> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let mut batch = Self::require_draft(&tx, batch_id)?;
        let items = BatchRepository::find_items_by_batch_tx(&tx, batch_id)?;

        // 覆写校验: 键必须指向本单明细,数量不可为负
        for (item_id, qty) in actual_quantities {
            if !items.iter().any(|i| &i.item_id == item_id) {
                return Err(RepositoryError::ValidationError(format!(
                    "实产覆写指向不存在的明细: {}",
                    item_id
                )));
            }
            if *qty < 0 {
                return Err(RepositoryError::ValidationError(format!(
                    "实产数量不可为负: item={}, qty={}",
                    item_id, qty
                )));
            }
        }

        let now = chrono::Local::now().naive_local();

        // 逐明细生成生产记录
        let mut records = Vec::with_capacity(items.len());
        for item in &items {
            let actual = actual_quantities
                .get(&item.item_id)
                .copied()
                .unwrap_or(item.planned_quantity);

            let record = ProductionRecord {
                record_id: uuid::Uuid::new_v4().to_string(),
                batch_id: batch_id.to_string(),
                order_id: item.order_id.clone(),
                parent_record_id: None,
                flavor_id: item.flavor_id.clone(),
                flavor_name: item.flavor_name.clone(),
                quantity: actual,
                disposition: Disposition::Pending,
                sale_price: None,
                created_at: now,
                updated_at: now,
                updated_by: Some(operator.to_string()),
            };
            ProductionRecordRepository::insert_tx(&tx, &record)?;
            records.push(record);
        }

        // 订单去重置 PRODUCED (同一订单可能贡献多条口味明细,只置一次)
        let mut produced_ids: Vec<String> = Vec::new();
        for item in &items {
            if let Some(order_id) = &item.order_id {
                if !produced_ids.contains(order_id) {
                    produced_ids.push(order_id.clone());
                }
            }
        }

        let mut order_transitions = Vec::with_capacity(produced_ids.len());
        for order_id in &produced_ids {
            let outcome = LifecycleEngine::transition_in_tx(
                &tx,
                order_id,
                OrderStatus::Produced,
                StatusWriteAuthority::BatchWorkflow,
                operator,
            )?;
            order_transitions.push(outcome);
        }

        BatchRepository::mark_completed_tx(&tx, batch_id, now, operator)?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        batch.status = BatchStatus::Completed;
        batch.completed_at = Some(now);
        batch.completed_by = Some(operator.to_string());

        tracing::info!(
            batch_id,
            records = records.len(),
            produced_orders = order_transitions.len(),
            "备产单已终结"
        );

        Ok(FinalizeOutcome {
            batch,
            records,
            order_transitions,
        })
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 查询指定日期可纳入备产单的订单
    ///
    /// 条件: 档期日期匹配 + SUBMITTED/CONFIRMED + 未被任何备产明细引用
    /// 纯读操作,无任何变更
    pub fn list_available_orders(&self, date: NaiveDate) -> RepositoryResult<Vec<Order>> {
        let conn = self.get_conn()?;
        OrderRepository::find_available_for_date_tx(&conn, date)
    }
}
