// ==========================================
// 烘焙工坊产销系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// 说明: 所有仓储/引擎共享同一个 Arc<Mutex<Connection>>,
//       多实体写入经该连接的事务串行化
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::{AuditApi, BatchApi, OrderApi, ProductionApi, SlotApi};
use crate::config::ConfigManager;
use crate::engine::events::{OpsEventPublisher, OptionalEventPublisher};
use crate::engine::{BatchFlowEngine, ConsistencyChecker, LifecycleEngine, TrackingEngine};
use crate::repository::{
    ActionLogRepository, BatchRepository, OrderRepository, ProductionRecordRepository,
    SlotRepository,
};

/// 应用状态
///
/// 包含所有API实例和共享资源
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 订单API
    pub order_api: Arc<OrderApi>,

    /// 生产档期API
    pub slot_api: Arc<SlotApi>,

    /// 备产单API
    pub batch_api: Arc<BatchApi>,

    /// 生产记录API
    pub production_api: Arc<ProductionApi>,

    /// 操作日志API
    pub audit_api: Arc<AuditApi>,

    /// 操作日志仓储（用于审计追踪）
    pub action_log_repo: Arc<ActionLogRepository>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    /// - event_publisher: 可选的产销事件发布者 (无下游时传 None)
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开共享数据库连接并初始化 schema
    /// 2. 初始化所有Repository与Engine
    /// 3. 创建所有API实例
    pub fn new(
        db_path: String,
        event_publisher: Option<Arc<dyn OpsEventPublisher>>,
    ) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        // 创建数据库连接（共享连接）
        let conn = crate::db::open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        crate::db::init_schema(&conn).map_err(|e| format!("schema 初始化失败: {}", e))?;

        match crate::db::read_schema_version(&conn) {
            Ok(Some(v)) if v != crate::db::CURRENT_SCHEMA_VERSION => {
                tracing::warn!(
                    found = v,
                    expected = crate::db::CURRENT_SCHEMA_VERSION,
                    "schema_version 与当前代码不一致"
                );
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("schema_version 读取失败(将继续启动): {}", e),
        }

        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let slot_repo = Arc::new(SlotRepository::new(Arc::clone(&conn)));
        let order_repo = Arc::new(OrderRepository::new(Arc::clone(&conn)));
        let batch_repo = Arc::new(BatchRepository::new(Arc::clone(&conn)));
        let production_repo = Arc::new(ProductionRecordRepository::new(Arc::clone(&conn)));
        let action_log_repo = Arc::new(ActionLogRepository::new(Arc::clone(&conn)));

        // ==========================================
        // 初始化Engine层
        // ==========================================
        let lifecycle_engine = Arc::new(LifecycleEngine::new(Arc::clone(&conn)));
        let batch_flow_engine = Arc::new(BatchFlowEngine::new(Arc::clone(&conn)));
        let tracking_engine = Arc::new(TrackingEngine::new(Arc::clone(&conn)));
        let consistency_checker = Arc::new(ConsistencyChecker::new(Arc::clone(&conn)));

        // 配置管理器复用共享连接
        let config_manager = Arc::new(
            ConfigManager::from_connection(Arc::clone(&conn))
                .map_err(|e| format!("配置管理器初始化失败: {}", e))?,
        );

        // ==========================================
        // 初始化API层
        // ==========================================
        let make_publisher = || match &event_publisher {
            Some(p) => OptionalEventPublisher::with_publisher(Arc::clone(p)),
            None => OptionalEventPublisher::none(),
        };

        let order_api = Arc::new(OrderApi::new(
            Arc::clone(&order_repo),
            Arc::clone(&lifecycle_engine),
            Arc::clone(&action_log_repo),
            make_publisher(),
        ));

        let slot_api = Arc::new(SlotApi::new(
            Arc::clone(&slot_repo),
            Arc::clone(&consistency_checker),
            Arc::clone(&config_manager),
            Arc::clone(&action_log_repo),
        ));

        let batch_api = Arc::new(BatchApi::new(
            Arc::clone(&batch_repo),
            Arc::clone(&batch_flow_engine),
            Arc::clone(&action_log_repo),
            make_publisher(),
        ));

        let production_api = Arc::new(ProductionApi::new(
            Arc::clone(&production_repo),
            Arc::clone(&tracking_engine),
            Arc::clone(&action_log_repo),
            make_publisher(),
        ));

        let audit_api = Arc::new(AuditApi::new(Arc::clone(&action_log_repo)));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            order_api,
            slot_api,
            batch_api,
            production_api,
            audit_api,
            action_log_repo,
        })
    }
}

/// 解析默认数据库路径
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    // 允许通过环境变量显式指定 DB 路径（便于调试/测试/CI）
    if let Ok(path) = std::env::var("BAKESHOP_OPS_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    // 先给一个默认回退值，后续如果能拿到 data_dir 再覆盖。
    let mut path = PathBuf::from("./bakeshop_ops.db");

    // 尝试获取用户数据目录
    if let Some(data_dir) = dirs::data_dir() {
        // 开发环境使用独立目录，避免污染生产数据
        #[cfg(debug_assertions)]
        {
            path = data_dir.join("bakeshop-ops-dev");
        }

        #[cfg(not(debug_assertions))]
        {
            path = data_dir.join("bakeshop-ops");
        }

        if let Err(e) = std::fs::create_dir_all(&path) {
            tracing::warn!("数据目录创建失败,回落当前目录: {}", e);
            return "./bakeshop_ops.db".to_string();
        }
        path = path.join("bakeshop_ops.db");
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_default_db_path() {
        let path = get_default_db_path();
        assert!(!path.is_empty());
        assert!(path.ends_with(".db"));
    }

    // 注意：AppState::new() 的测试需要真实的数据库文件
    // 这些测试在集成测试中进行
}
