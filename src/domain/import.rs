// ==========================================
// 保单数据批量导入 - 导入请求/事件/结果模型
// ==========================================
// 职责: 调用入参、流式事件、终态汇总
// 序列化: camelCase（与调用方 JSON 约定一致）
// ==========================================

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 字段映射表: 目标字段名 → CSV 列名
pub type FieldMappings = HashMap<String, String>;

// ==========================================
// ImportRequest - 导入请求
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRequest {
    /// CSV 全文
    pub csv: String,
    /// 实体种类 (customers|policies|payments|receipts)
    pub collection_type: String,
    /// 字段映射
    #[serde(default)]
    pub field_mappings: FieldMappings,
}

// ==========================================
// ImportEvent - 流式进度事件
// ==========================================
// 帧格式: `data: <json>\n\n`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ImportEvent {
    /// 每行一次
    Progress {
        current: usize,
        total: usize,
        imported: usize,
        errors: usize,
    },
    /// 行级错误（row 为展示行号）; 致命错误无行号
    Error {
        error: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        row: Option<usize>,
    },
    /// 终态事件，仅一次
    Complete {
        imported: usize,
        errors: Vec<String>,
        total: usize,
    },
}

impl ImportEvent {
    /// 编码为 SSE 数据帧
    pub fn to_sse_frame(&self) -> Result<String, serde_json::Error> {
        Ok(format!("data: {}\n\n", serde_json::to_string(self)?))
    }
}

// ==========================================
// ImportSummary - 单次导入汇总
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    /// 数据行总数（不含表头）
    pub total: usize,
    /// 成功落库行数
    pub imported: usize,
    /// 行级错误（按出现顺序）
    pub errors: Vec<String>,
}

impl ImportSummary {
    pub fn error_rows(&self) -> usize {
        self.errors.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_event_frame() {
        let event = ImportEvent::Progress {
            current: 5,
            total: 120,
            imported: 4,
            errors: 1,
        };
        assert_eq!(
            event.to_sse_frame().unwrap(),
            "data: {\"type\":\"progress\",\"current\":5,\"total\":120,\"imported\":4,\"errors\":1}\n\n"
        );
    }

    #[test]
    fn test_error_event_with_and_without_row() {
        let row_error = ImportEvent::Error {
            error: "Row 7: Policy not found: \"POL-X\"".to_string(),
            row: Some(7),
        };
        let json = serde_json::to_value(&row_error).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["row"], 7);

        let fatal = ImportEvent::Error {
            error: "CSV file is empty".to_string(),
            row: None,
        };
        let json = serde_json::to_value(&fatal).unwrap();
        assert!(json.get("row").is_none());
    }

    #[test]
    fn test_request_deserialize_camel_case() {
        let request: ImportRequest = serde_json::from_str(
            r#"{"csv":"a\n1","collectionType":"customers","fieldMappings":{"firstName":"a"}}"#,
        )
        .unwrap();
        assert_eq!(request.collection_type, "customers");
        assert_eq!(request.field_mappings.get("firstName"), Some(&"a".to_string()));
    }
}
