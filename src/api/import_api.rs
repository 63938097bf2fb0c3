// ==========================================
// 保单数据批量导入 - 导入API
// ==========================================
// 职责: 请求校验 → 权限校验 → 同步/流式导入
// 约束: 致命输入错误（种类非法/映射缺失/无权限）在处理任何行之前返回
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::api::permission::{CallerContext, ImportPermissionGuard};
use crate::clock::SystemClock;
use crate::config::ConfigManager;
use crate::db::{init_schema, open_sqlite_connection};
use crate::domain::import::{ImportEvent, ImportRequest, ImportSummary};
use crate::domain::types::EntityKind;
use crate::importer::{
    event_channel, BulkImporter, BulkImporterImpl, ImportError, ImportRepositories, ProgressSink,
    DEFAULT_EVENT_BUFFER,
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// 同步导入响应
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportResponse {
    pub success: bool,
    pub imported: usize,
    /// 行级错误（无错误时省略）
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub errors: Option<Vec<String>>,
}

impl From<ImportSummary> for ImportResponse {
    fn from(summary: ImportSummary) -> Self {
        Self {
            success: true,
            imported: summary.imported,
            errors: if summary.errors.is_empty() {
                None
            } else {
                Some(summary.errors)
            },
        }
    }
}

/// 导入API
pub struct ImportApi {
    importer: Arc<dyn BulkImporter>,
    guard: Arc<dyn ImportPermissionGuard>,
}

impl ImportApi {
    pub fn new(importer: Arc<dyn BulkImporter>, guard: Arc<dyn ImportPermissionGuard>) -> Self {
        Self { importer, guard }
    }

    /// 基于 SQLite 数据库创建（建表幂等）
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    /// - guard: 权限校验器
    pub fn open(db_path: &str, guard: Arc<dyn ImportPermissionGuard>) -> ApiResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| ApiError::DatabaseError(format!("打开数据库失败: {}", e)))?;
        init_schema(&conn)
            .map_err(|e| ApiError::DatabaseError(format!("初始化 schema 失败: {}", e)))?;

        let conn = Arc::new(Mutex::new(conn));
        let repos = ImportRepositories::sqlite(conn.clone())?;
        let config = ConfigManager::from_connection(conn);
        let importer = BulkImporterImpl::new(repos, config, Arc::new(SystemClock));

        Ok(Self::new(Arc::new(importer), guard))
    }

    /// 请求校验 + 权限校验
    fn authorize(&self, caller: &CallerContext, request: &ImportRequest) -> ApiResult<EntityKind> {
        let kind: EntityKind = request.collection_type.parse().map_err(|_| {
            ApiError::from(ImportError::InvalidEntityKind(request.collection_type.clone()))
        })?;

        self.guard.authorize(caller, kind)?;

        if request
            .field_mappings
            .values()
            .all(|header| header.trim().is_empty())
        {
            return Err(ImportError::MissingMappings.into());
        }

        Ok(kind)
    }

    /// 同步导入
    ///
    /// # 返回
    /// - Ok(ImportResponse): 批次已处理完（行级错误在 errors 中）
    /// - Err(ApiError): 致命错误，未处理任何行
    pub async fn import_records(
        &self,
        caller: &CallerContext,
        request: &ImportRequest,
    ) -> ApiResult<ImportResponse> {
        let kind = self.authorize(caller, request)?;
        info!(user = %caller.user_id, kind = %kind, "开始同步导入");

        let summary = self
            .importer
            .import_csv(kind, &request.csv, &request.field_mappings)
            .await?;
        Ok(summary.into())
    }

    /// 流式导入（事件写入 sink）
    ///
    /// # 说明
    /// - 请求/权限校验失败: 投递一条不带行号的 error 事件后返回 Err
    pub async fn import_records_streaming(
        &self,
        caller: &CallerContext,
        request: &ImportRequest,
        sink: &mut dyn ProgressSink,
    ) -> ApiResult<ImportSummary> {
        let kind = match self.authorize(caller, request) {
            Ok(kind) => kind,
            Err(e) => {
                let event = ImportEvent::Error {
                    error: e.to_string(),
                    row: None,
                };
                if let Err(sink_err) = sink.emit(event).await {
                    warn!(error = %sink_err, "致命错误事件投递失败");
                }
                return Err(e);
            }
        };
        info!(user = %caller.user_id, kind = %kind, "开始流式导入");

        let summary = self
            .importer
            .import_csv_streaming(kind, &request.csv, &request.field_mappings, sink)
            .await?;
        Ok(summary)
    }

    /// 流式导入（返回事件 Stream）
    ///
    /// 导入在后台任务中执行；丢弃 Stream 即中止导入。
    pub fn import_stream(
        self: Arc<Self>,
        caller: CallerContext,
        request: ImportRequest,
    ) -> impl Stream<Item = ImportEvent> + Send {
        let (mut sink, stream) = event_channel(DEFAULT_EVENT_BUFFER);

        tokio::spawn(async move {
            if let Err(e) = self
                .import_records_streaming(&caller, &request, &mut sink)
                .await
            {
                warn!(error = %e, "流式导入结束（失败）");
            }
        });

        stream
    }
}
