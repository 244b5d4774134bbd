// ==========================================
// 烘焙工坊产销系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value)
// ==========================================

use crate::db::open_sqlite_connection;
use rusqlite::{params, Connection, OptionalExtension};
use std::error::Error;
use std::sync::{Arc, Mutex};

/// 新建档期的默认容量 (单位: 个)
pub const DEFAULT_SLOT_CAPACITY: i64 = 10;

/// 配置键: 新建档期默认容量
pub const KEY_DEFAULT_SLOT_CAPACITY: &str = "slot.default_capacity";

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn
            .query_row(
                "SELECT value FROM config_kv WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        Ok(result)
    }

    /// 写入配置值 (UPSERT)
    pub fn set_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        conn.execute(
            r#"INSERT INTO config_kv (key, value, updated_at)
               VALUES (?1, ?2, datetime('now', 'localtime'))
               ON CONFLICT(key) DO UPDATE SET
                   value = excluded.value,
                   updated_at = excluded.updated_at"#,
            params![key, value],
        )?;

        Ok(())
    }

    /// 新建档期的默认容量
    ///
    /// 配置缺失或非法时回落到内置默认值
    pub fn default_slot_capacity(&self) -> i64 {
        match self.get_config_value(KEY_DEFAULT_SLOT_CAPACITY) {
            Ok(Some(raw)) => raw.trim().parse::<i64>().unwrap_or_else(|_| {
                tracing::warn!(raw = %raw, "档期默认容量配置非法,回落内置默认值");
                DEFAULT_SLOT_CAPACITY
            }),
            Ok(None) => DEFAULT_SLOT_CAPACITY,
            Err(e) => {
                tracing::warn!(error = %e, "读取档期默认容量失败,回落内置默认值");
                DEFAULT_SLOT_CAPACITY
            }
        }
    }
}
