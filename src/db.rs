// ==========================================
// 烘焙工坊产销系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为，避免"部分模块外键开启/部分不开启"
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 集中建表语句，库/测试共用同一份 schema
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要"每个连接"单独开启
/// - busy_timeout 需要"每个连接"单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 初始化数据库 schema（幂等，CREATE TABLE IF NOT EXISTS）
///
/// 表清单:
/// - schema_version: 版本标记
/// - config_kv: 配置键值
/// - production_slot: 生产档期 (容量台账落点)
/// - customer_order: 订单
/// - production_batch / batch_item: 备产单与明细
/// - production_record: 生产记录
/// - action_log: 操作日志
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS production_slot (
            slot_id TEXT PRIMARY KEY,
            slot_date TEXT NOT NULL,
            slot_label TEXT,
            total_capacity INTEGER NOT NULL,
            committed_count INTEGER NOT NULL DEFAULT 0,
            is_open INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_slot_date ON production_slot(slot_date);

        CREATE TABLE IF NOT EXISTS customer_order (
            order_id TEXT PRIMARY KEY,
            slot_id TEXT NOT NULL REFERENCES production_slot(slot_id),
            customer_name TEXT NOT NULL,
            contact TEXT,
            status TEXT NOT NULL,
            lines_json TEXT NOT NULL,
            total_price TEXT,
            deposit TEXT,
            note TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            updated_by TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_order_slot ON customer_order(slot_id);
        CREATE INDEX IF NOT EXISTS idx_order_status ON customer_order(status);

        CREATE TABLE IF NOT EXISTS production_batch (
            batch_id TEXT PRIMARY KEY,
            batch_date TEXT NOT NULL,
            status TEXT NOT NULL,
            created_by TEXT NOT NULL,
            created_at TEXT NOT NULL,
            completed_at TEXT,
            completed_by TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_batch_date ON production_batch(batch_date);

        CREATE TABLE IF NOT EXISTS batch_item (
            item_id TEXT PRIMARY KEY,
            batch_id TEXT NOT NULL REFERENCES production_batch(batch_id),
            order_id TEXT REFERENCES customer_order(order_id),
            customer_name TEXT,
            flavor_id TEXT NOT NULL,
            flavor_name TEXT NOT NULL,
            planned_quantity INTEGER NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_item_batch ON batch_item(batch_id);
        CREATE INDEX IF NOT EXISTS idx_item_order ON batch_item(order_id);

        CREATE TABLE IF NOT EXISTS production_record (
            record_id TEXT PRIMARY KEY,
            batch_id TEXT NOT NULL REFERENCES production_batch(batch_id),
            order_id TEXT REFERENCES customer_order(order_id),
            parent_record_id TEXT,
            flavor_id TEXT NOT NULL,
            flavor_name TEXT NOT NULL,
            quantity INTEGER NOT NULL,
            disposition TEXT NOT NULL,
            sale_price TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            updated_by TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_record_batch ON production_record(batch_id);
        CREATE INDEX IF NOT EXISTS idx_record_disposition ON production_record(disposition);

        CREATE TABLE IF NOT EXISTS action_log (
            action_id TEXT PRIMARY KEY,
            action_type TEXT NOT NULL,
            action_ts TEXT NOT NULL,
            actor TEXT NOT NULL,
            payload_json TEXT,
            slot_id TEXT,
            batch_id TEXT,
            detail TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_action_ts ON action_log(action_ts);
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    Ok(())
}
