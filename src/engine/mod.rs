// ==========================================
// 烘焙工坊产销系统 - 引擎层
// ==========================================
// 职责: 实现业务规则引擎,把多实体写入编排为原子事务
// 红线: Engine 不拼 SQL,行级读写一律走仓储层的 *_tx 函数
// 红线: 所有规则拒绝必须携带可读原因
// ==========================================

pub mod batch_flow;
pub mod capacity_ledger;
pub mod consistency;
pub mod events;
pub mod lifecycle;
pub mod tracking;

// 重导出核心引擎
pub use batch_flow::{BatchFlowEngine, FinalizeOutcome};
pub use capacity_ledger::CapacityLedger;
pub use consistency::{ConsistencyChecker, SlotCapacityAudit};
pub use events::{
    NoOpEventPublisher, OpsEvent, OpsEventPublisher, OpsEventType, OptionalEventPublisher,
};
pub use lifecycle::{LifecycleEngine, OrderTransitionOutcome};
pub use tracking::TrackingEngine;
