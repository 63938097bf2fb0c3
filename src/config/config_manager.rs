// ==========================================
// 保单数据批量导入 - 配置管理器
// ==========================================
// 职责: 配置加载、查询
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::import_config_trait::ImportConfigReader;
use crate::db::open_sqlite_connection;
use crate::importer::error::{ImportError, ImportResult};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

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
    pub fn new(db_path: &str) -> ImportResult<Self> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> ImportResult<Option<String>> {
        let conn = self.conn.lock().map_err(|e| ImportError::ConfigError {
            key: key.to_string(),
            message: format!("锁获取失败: {}", e),
        })?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 从 config_kv 表读取配置值，带默认值
    fn get_config_or_default(&self, key: &str, default: &str) -> ImportResult<String> {
        Ok(self.get_config_value(key)?.unwrap_or_else(|| default.to_string()))
    }

    /// 写入 global scope 配置（CLI/测试初始化使用）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ImportResult<()> {
        let conn = self.conn.lock().map_err(|e| ImportError::ConfigError {
            key: key.to_string(),
            message: format!("锁获取失败: {}", e),
        })?;

        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value, updated_at)
            VALUES ('global', ?1, ?2, datetime('now'))
            ON CONFLICT(scope_id, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
            params![key, value],
        )?;
        Ok(())
    }

    fn get_bool(&self, key: &str, default: bool) -> ImportResult<bool> {
        let value = self.get_config_or_default(key, if default { "true" } else { "false" })?;
        match value.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => {
                tracing::warn!(
                    config_key = key,
                    raw_value = %value,
                    "布尔配置格式错误，使用默认值"
                );
                Ok(default)
            }
        }
    }

    fn get_usize(&self, key: &str, default: usize) -> ImportResult<usize> {
        let value = self.get_config_or_default(key, &default.to_string())?;
        Ok(value.trim().parse::<usize>().unwrap_or_else(|_| {
            tracing::warn!(
                config_key = key,
                raw_value = %value,
                "数值配置格式错误，使用默认值"
            );
            default
        }))
    }
}

// ==========================================
// ImportConfigReader Trait 实现
// ==========================================
#[async_trait]
impl ImportConfigReader for ConfigManager {
    async fn get_enforce_policy_number_unique(&self) -> ImportResult<bool> {
        self.get_bool(config_keys::ENFORCE_POLICY_NUMBER_UNIQUE, false)
    }

    async fn get_drop_legacy_policy_number_index(&self) -> ImportResult<bool> {
        self.get_bool(config_keys::DROP_LEGACY_POLICY_NUMBER_INDEX, true)
    }

    async fn get_duplicate_retry_limit(&self) -> ImportResult<u32> {
        let limit = self.get_usize(config_keys::DUPLICATE_RETRY_LIMIT, 1)?;
        Ok(u32::try_from(limit).unwrap_or(1))
    }

    async fn get_max_co_customers(&self) -> ImportResult<usize> {
        self.get_usize(config_keys::MAX_CO_CUSTOMERS, 5)
    }

    async fn get_error_preview_cells(&self) -> ImportResult<usize> {
        self.get_usize(config_keys::ERROR_PREVIEW_CELLS, 10)
    }

    async fn get_receipt_location_prefixes(&self) -> ImportResult<HashMap<String, String>> {
        let value = self.get_config_or_default(config_keys::RECEIPT_LOCATION_PREFIXES, "{}")?;
        let prefixes: HashMap<String, String> = serde_json::from_str(&value)
            .unwrap_or_else(|_| {
                tracing::warn!(
                    config_key = config_keys::RECEIPT_LOCATION_PREFIXES,
                    raw_value = %value,
                    "收据地点前缀配置格式错误，使用空配置"
                );
                HashMap::new()
            });

        // 前缀统一大写匹配
        Ok(prefixes
            .into_iter()
            .map(|(k, v)| (k.trim().to_uppercase(), v))
            .collect())
    }

    async fn get_default_receipt_location(&self) -> ImportResult<String> {
        self.get_config_or_default(config_keys::DEFAULT_RECEIPT_LOCATION, "Head Office")
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    pub const ENFORCE_POLICY_NUMBER_UNIQUE: &str = "import_enforce_policy_number_unique";
    pub const DROP_LEGACY_POLICY_NUMBER_INDEX: &str = "import_drop_legacy_policy_number_index";
    pub const DUPLICATE_RETRY_LIMIT: &str = "import_duplicate_retry_limit";
    pub const MAX_CO_CUSTOMERS: &str = "import_max_co_customers";
    pub const ERROR_PREVIEW_CELLS: &str = "import_error_preview_cells";
    pub const RECEIPT_LOCATION_PREFIXES: &str = "import_receipt_location_prefixes";
    pub const DEFAULT_RECEIPT_LOCATION: &str = "import_default_receipt_location";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImportSettings;
    use crate::db::init_schema;

    fn test_manager() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn)))
    }

    #[tokio::test]
    async fn test_defaults_when_table_empty() {
        let manager = test_manager();
        let settings = manager.load_settings().await.unwrap();
        assert_eq!(settings, ImportSettings::default());
    }

    #[tokio::test]
    async fn test_overrides_and_invalid_values() {
        let manager = test_manager();
        manager
            .set_global_config_value(config_keys::ENFORCE_POLICY_NUMBER_UNIQUE, "yes")
            .unwrap();
        manager
            .set_global_config_value(config_keys::DUPLICATE_RETRY_LIMIT, "not-a-number")
            .unwrap();
        manager
            .set_global_config_value(
                config_keys::RECEIPT_LOCATION_PREFIXES,
                r#"{"nrb": "Nairobi", "MSA": "Mombasa"}"#,
            )
            .unwrap();

        let settings = manager.load_settings().await.unwrap();
        assert!(settings.enforce_policy_number_unique);
        assert_eq!(settings.duplicate_retry_limit, 1);
        assert_eq!(
            settings.receipt_location_prefixes.get("NRB"),
            Some(&"Nairobi".to_string())
        );
        assert_eq!(
            settings.receipt_location_prefixes.get("MSA"),
            Some(&"Mombasa".to_string())
        );
    }
}
