// ==========================================
// 烘焙工坊产销系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、业务规则接口
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod action_log;
pub mod batch;
pub mod order;
pub mod production;
pub mod slot;
pub mod types;

// 重导出核心类型
pub use action_log::{ActionLog, ActionType};
pub use batch::{BatchItem, ProductionBatch};
pub use order::{Order, OrderLine, OrderLineList, ORDER_LINE_FORMAT_VERSION};
pub use production::ProductionRecord;
pub use slot::{ProductionSlot, SlotCapacity};
pub use types::{BatchStatus, Disposition, OrderStatus, StatusWriteAuthority};
