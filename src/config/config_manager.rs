// ==========================================
// 烘焙生产库存系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::production_config_trait::ProductionConfigReader;
use crate::domain::catalog::DEFAULT_SHELF_LIFE_DAYS;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// 默认归档天数
pub const DEFAULT_ARCHIVE_DAYS: i64 = 30;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let conn_guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 读取 global scope 的配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global scope 的配置值（存在则覆盖）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        tracing::info!(key, value, "配置已更新");
        Ok(())
    }

    /// 获取所有 global 配置（按键排序）
    pub fn list_global_config(&self) -> RepositoryResult<BTreeMap<String, String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;

        let mut config_map = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }
        Ok(config_map)
    }

    /// 读取非负整数配置，缺省或解析失败时返回默认值
    fn get_days_or_default(&self, key: &str, default: i64) -> RepositoryResult<i64> {
        match self.get_global_config_value(key)? {
            None => Ok(default),
            Some(raw) => match raw.trim().parse::<i64>() {
                Ok(v) if v >= 0 => Ok(v),
                _ => {
                    tracing::warn!(key, value = %raw, default, "配置值无效，使用默认值");
                    Ok(default)
                }
            },
        }
    }
}

impl ProductionConfigReader for ConfigManager {
    fn get_default_shelf_life_days(&self) -> RepositoryResult<i64> {
        self.get_days_or_default(config_keys::DEFAULT_SHELF_LIFE_DAYS, DEFAULT_SHELF_LIFE_DAYS)
    }

    fn get_production_archive_days(&self) -> RepositoryResult<i64> {
        self.get_days_or_default(config_keys::PRODUCTION_ARCHIVE_DAYS, DEFAULT_ARCHIVE_DAYS)
    }

    fn get_transaction_archive_days(&self) -> RepositoryResult<i64> {
        self.get_days_or_default(config_keys::TRANSACTION_ARCHIVE_DAYS, DEFAULT_ARCHIVE_DAYS)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 成品保质期
    pub const DEFAULT_SHELF_LIFE_DAYS: &str = "default_shelf_life_days";

    // 归档
    pub const PRODUCTION_ARCHIVE_DAYS: &str = "production_archive_days";
    pub const TRANSACTION_ARCHIVE_DAYS: &str = "transaction_archive_days";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;

    fn setup() -> ConfigManager {
        let conn = Arc::new(Mutex::new(open_in_memory().unwrap()));
        ConfigManager::from_connection(conn).unwrap()
    }

    #[test]
    fn test_defaults_when_missing() {
        let config = setup();
        assert_eq!(config.get_default_shelf_life_days().unwrap(), 3);
        assert_eq!(config.get_production_archive_days().unwrap(), 30);
        assert_eq!(config.get_transaction_archive_days().unwrap(), 30);
    }

    #[test]
    fn test_override_and_invalid_value() {
        let config = setup();
        config
            .set_global_config_value(config_keys::DEFAULT_SHELF_LIFE_DAYS, "5")
            .unwrap();
        assert_eq!(config.get_default_shelf_life_days().unwrap(), 5);

        config
            .set_global_config_value(config_keys::DEFAULT_SHELF_LIFE_DAYS, "7")
            .unwrap();
        assert_eq!(config.get_default_shelf_life_days().unwrap(), 7);

        config
            .set_global_config_value(config_keys::PRODUCTION_ARCHIVE_DAYS, "-1")
            .unwrap();
        assert_eq!(config.get_production_archive_days().unwrap(), 30);

        let all = config.list_global_config().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all.get("default_shelf_life_days").map(String::as_str), Some("7"));
    }
}
