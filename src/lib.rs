// ==========================================
// 烘焙工坊产销系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 小型烘焙工坊的订单承接、档期容量与生产履约核心
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/schema）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 状态装配
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{BatchStatus, Disposition, OrderStatus, StatusWriteAuthority};

// 领域实体
pub use domain::{
    ActionLog, ActionType, BatchItem, Order, OrderLine, OrderLineList, ProductionBatch,
    ProductionRecord, ProductionSlot, SlotCapacity,
};

// 引擎
pub use engine::{
    BatchFlowEngine, CapacityLedger, ConsistencyChecker, LifecycleEngine, TrackingEngine,
};

// API
pub use api::{AuditApi, BatchApi, OrderApi, ProductionApi, SlotApi};

// 应用状态
pub use app::AppState;

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "烘焙工坊产销系统";

// ==========================================
// 预编译检查
// ==========================================

// 确保编译时所有模块可见
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
