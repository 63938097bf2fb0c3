// ==========================================
// 保单数据批量导入 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入模块所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::importer::error::ImportResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ==========================================
// ImportSettings - 单次导入使用的配置快照
// ==========================================
// 每次导入开始时读取一次，整批共用
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportSettings {
    /// 是否对保单号做唯一性保护（默认关闭：历史数据存在合法重复）
    pub enforce_policy_number_unique: bool,
    /// 导入开始时删除 policies.policy_number 上的历史唯一索引
    pub drop_legacy_policy_number_index: bool,
    /// 唯一约束冲突后的重试次数上限
    pub duplicate_retry_limit: u32,
    /// 共同客户数量上限
    pub max_co_customers: usize,
    /// 错误信息中预览的单元格数量
    pub error_preview_cells: usize,
    /// 保单号前缀 → 收据开具地点
    pub receipt_location_prefixes: HashMap<String, String>,
    /// 前缀未命中时的开具地点
    pub default_receipt_location: String,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            enforce_policy_number_unique: false,
            drop_legacy_policy_number_index: true,
            duplicate_retry_limit: 1,
            max_co_customers: 5,
            error_preview_cells: 10,
            receipt_location_prefixes: HashMap::new(),
            default_receipt_location: "Head Office".to_string(),
        }
    }
}

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    /// 是否对保单号做唯一性保护
    ///
    /// # 默认值
    /// - false
    async fn get_enforce_policy_number_unique(&self) -> ImportResult<bool>;

    /// 导入开始时是否删除保单号历史唯一索引
    ///
    /// # 默认值
    /// - true
    async fn get_drop_legacy_policy_number_index(&self) -> ImportResult<bool>;

    /// 唯一约束冲突后的重试次数
    ///
    /// # 默认值
    /// - 1
    async fn get_duplicate_retry_limit(&self) -> ImportResult<u32>;

    /// 共同客户数量上限
    ///
    /// # 默认值
    /// - 5
    async fn get_max_co_customers(&self) -> ImportResult<usize>;

    /// 错误信息中预览的单元格数量
    ///
    /// # 默认值
    /// - 10
    async fn get_error_preview_cells(&self) -> ImportResult<usize>;

    /// 保单号前缀 → 收据开具地点（JSON 对象）
    ///
    /// # 默认值
    /// - {}
    async fn get_receipt_location_prefixes(&self) -> ImportResult<HashMap<String, String>>;

    /// 前缀未命中时的开具地点
    ///
    /// # 默认值
    /// - Head Office
    async fn get_default_receipt_location(&self) -> ImportResult<String>;

    /// 读取完整配置快照
    async fn load_settings(&self) -> ImportResult<ImportSettings> {
        Ok(ImportSettings {
            enforce_policy_number_unique: self.get_enforce_policy_number_unique().await?,
            drop_legacy_policy_number_index: self.get_drop_legacy_policy_number_index().await?,
            duplicate_retry_limit: self.get_duplicate_retry_limit().await?,
            max_co_customers: self.get_max_co_customers().await?,
            error_preview_cells: self.get_error_preview_cells().await?,
            receipt_location_prefixes: self.get_receipt_location_prefixes().await?,
            default_receipt_location: self.get_default_receipt_location().await?,
        })
    }
}

// 固定配置（测试与无库场景）
#[async_trait]
impl ImportConfigReader for ImportSettings {
    async fn get_enforce_policy_number_unique(&self) -> ImportResult<bool> {
        Ok(self.enforce_policy_number_unique)
    }

    async fn get_drop_legacy_policy_number_index(&self) -> ImportResult<bool> {
        Ok(self.drop_legacy_policy_number_index)
    }

    async fn get_duplicate_retry_limit(&self) -> ImportResult<u32> {
        Ok(self.duplicate_retry_limit)
    }

    async fn get_max_co_customers(&self) -> ImportResult<usize> {
        Ok(self.max_co_customers)
    }

    async fn get_error_preview_cells(&self) -> ImportResult<usize> {
        Ok(self.error_preview_cells)
    }

    async fn get_receipt_location_prefixes(&self) -> ImportResult<HashMap<String, String>> {
        Ok(self.receipt_location_prefixes.clone())
    }

    async fn get_default_receipt_location(&self) -> ImportResult<String> {
        Ok(self.default_receipt_location.clone())
    }
}
