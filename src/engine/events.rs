// ==========================================
// 烘焙工坊产销系统 - 引擎层事件发布
// ==========================================
// 职责: 定义产销事件发布 trait，实现依赖倒置
// 说明: Engine 层定义 trait，下游消费方 (看板/通知) 实现适配器
// 红线: 事件发布为 fire-and-forget,失败绝不影响主事务
// ==========================================

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;

// ==========================================
// 产销事件类型
// ==========================================

/// 产销事件触发类型
///
/// Engine 层定义的事件类型，用于通知下游系统
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpsEventType {
    /// 订单状态变更
    OrderStatusChanged,
    /// 档期容量变更
    SlotCapacityChanged,
    /// 备产单创建
    BatchDrafted,
    /// 备产单终结
    BatchFinalized,
    /// 生产记录拆分
    RecordSplit,
    /// 成品去向改判
    DispositionChanged,
}

impl OpsEventType {
    /// 转换为字符串标识
    pub fn as_str(&self) -> &str {
        match self {
            OpsEventType::OrderStatusChanged => "OrderStatusChanged",
            OpsEventType::SlotCapacityChanged => "SlotCapacityChanged",
            OpsEventType::BatchDrafted => "BatchDrafted",
            OpsEventType::BatchFinalized => "BatchFinalized",
            OpsEventType::RecordSplit => "RecordSplit",
            OpsEventType::DispositionChanged => "DispositionChanged",
        }
    }
}

/// 产销事件
///
/// 携带事件类型与受影响实体的ID,下游按需拉取详情
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpsEvent {
    /// 事件类型
    pub event_type: OpsEventType,
    /// 事件来源描述
    pub source: Option<String>,
    /// 受影响订单
    pub order_id: Option<String>,
    /// 受影响档期
    pub slot_id: Option<String>,
    /// 受影响备产单
    pub batch_id: Option<String>,
    /// 受影响生产记录
    pub record_id: Option<String>,
}

impl OpsEvent {
    /// 创建事件
    pub fn new(event_type: OpsEventType, source: Option<String>) -> Self {
        Self {
            event_type,
            source,
            order_id: None,
            slot_id: None,
            batch_id: None,
            record_id: None,
        }
    }

    /// 设置受影响订单
    pub fn with_order(mut self, order_id: &str) -> Self {
        self.order_id = Some(order_id.to_string());
        self
    }

    /// 设置受影响档期
    pub fn with_slot(mut self, slot_id: &str) -> Self {
        self.slot_id = Some(slot_id.to_string());
        self
    }

    /// 设置受影响备产单
    pub fn with_batch(mut self, batch_id: &str) -> Self {
        self.batch_id = Some(batch_id.to_string());
        self
    }

    /// 设置受影响生产记录
    pub fn with_record(mut self, record_id: &str) -> Self {
        self.record_id = Some(record_id.to_string());
        self
    }
}

// ==========================================
// 事件发布 Trait
// ==========================================

/// 产销事件发布者 Trait
///
/// Engine 层定义，下游实现
/// 通过 trait 实现依赖倒置，核心不依赖任何消费方
pub trait OpsEventPublisher: Send + Sync {
    /// 发布产销事件
    ///
    /// # 返回
    /// - `Ok(())`: 发布成功
    /// - `Err`: 发布失败 (调用方降级为告警)
    fn publish(&self, event: OpsEvent) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// 空操作事件发布者
///
/// 用于不需要事件发布的场景（如单元测试）
#[derive(Debug, Clone, Default)]
pub struct NoOpEventPublisher;

impl OpsEventPublisher for NoOpEventPublisher {
    fn publish(&self, event: OpsEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
        tracing::debug!(
            "NoOpEventPublisher: 跳过事件发布 - event_type={}",
            event.event_type.as_str()
        );
        Ok(())
    }
}

/// 可选的事件发布者包装
///
/// 简化 Option<Arc<dyn OpsEventPublisher>> 的使用;
/// 发布失败只记告警,不上抛
pub struct OptionalEventPublisher {
    inner: Option<Arc<dyn OpsEventPublisher>>,
}

impl OptionalEventPublisher {
    /// 创建带发布者的实例
    pub fn with_publisher(publisher: Arc<dyn OpsEventPublisher>) -> Self {
        Self {
            inner: Some(publisher),
        }
    }

    /// 创建空实例（不发布事件）
    pub fn none() -> Self {
        Self { inner: None }
    }

    /// 发布事件（如果有发布者）,失败降级为告警
    pub fn publish(&self, event: OpsEvent) {
        let Some(publisher) = &self.inner else {
            tracing::debug!(
                "OptionalEventPublisher: 未配置发布者，跳过事件 - event_type={}",
                event.event_type.as_str()
            );
            return;
        };

        if let Err(e) = publisher.publish(event.clone()) {
            tracing::warn!(
                "事件发布失败 (不影响主流程): event_type={}, error={}",
                event.event_type.as_str(),
                e
            );
        }
    }

    /// 检查是否配置了发布者
    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }
}

impl Default for OptionalEventPublisher {
    fn default() -> Self {
        Self::none()
    }
}
