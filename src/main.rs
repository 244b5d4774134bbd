// ==========================================
// 烘焙工坊产销系统 - 主入口
// ==========================================
// 技术栈: Rust + SQLite
// 用途: 打开/初始化数据库并输出启动摘要,
//       供运维验证环境与容量一致性
// ==========================================

use bakeshop_ops::app::{get_default_db_path, AppState};

fn main() {
    // 初始化日志系统
    bakeshop_ops::logging::init();

    tracing::info!("==================================================");
    tracing::info!("{}", bakeshop_ops::APP_NAME);
    tracing::info!("系统版本: {}", bakeshop_ops::VERSION);
    tracing::info!("==================================================");

    // 数据库路径: 命令行参数优先,其次环境变量/用户数据目录
    let db_path = std::env::args()
        .nth(1)
        .unwrap_or_else(get_default_db_path);
    tracing::info!("使用数据库: {}", db_path);

    // 创建AppState (打开连接并初始化 schema)
    let app_state = match AppState::new(db_path, None) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("AppState初始化失败: {}", e);
            std::process::exit(1);
        }
    };

    // 启动时巡检容量一致性,漂移只告警不修复
    match app_state.slot_api.audit_capacity() {
        Ok(audits) => {
            let drifted = audits.iter().filter(|a| a.is_drifted()).count();
            if drifted > 0 {
                tracing::warn!(
                    total = audits.len(),
                    drifted,
                    "存在容量计数漂移的档期,可通过 rebuild_capacity 修复"
                );
            } else {
                tracing::info!(total = audits.len(), "档期容量一致性巡检通过");
            }
        }
        Err(e) => tracing::warn!("容量一致性巡检失败: {}", e),
    }

    tracing::info!("数据库就绪,核心服务可用");
}
