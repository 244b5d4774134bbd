// ==========================================
// 烘焙工坊产销系统 - 数据仓储层
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 红线: Repository 不含业务逻辑
// 约束: 所有查询使用参数化,防止 SQL 注入
// 约定: *_tx 结尾的关联函数在调用方事务内执行,
//       供引擎层把多实体写入编排为一个原子单元
// ==========================================

pub mod action_log_repo;
pub mod batch_repo;
pub mod error;
pub mod order_repo;
pub mod production_repo;
pub mod slot_repo;

// 重导出核心仓储
pub use action_log_repo::ActionLogRepository;
pub use batch_repo::BatchRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use order_repo::OrderRepository;
pub use production_repo::ProductionRecordRepository;
pub use slot_repo::SlotRepository;
