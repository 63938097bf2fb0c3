// ==========================================
// 保单数据批量导入 - 批量导入器实现
// ==========================================
// 职责: 整合导入流程，从 CSV 文本到数据库
// 流程: 解析 → 映射 → 配置快照 → 逐行(转换 → 解析引用 → 默认值 → 唯一键保护 → 落库) → 汇总
// 约束: 严格逐行顺序执行，后续行可见前序行写入
// 约束: 同步/流式共用同一实现，仅事件出口不同
// ==========================================

use crate::clock::Clock;
use crate::config::ImportConfigReader;
use crate::domain::import::{FieldMappings, ImportEvent, ImportSummary};
use crate::domain::types::EntityKind;
use crate::importer::bulk_importer_trait::{BulkImporter, DataCleaner, FieldMapper, FileParser};
use crate::importer::data_cleaner::DataCleaner as DataCleanerImpl;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_mapper::{row_preview, ColumnMapping, FieldMapper as FieldMapperImpl};
use crate::importer::file_parser::CsvParser;
use crate::importer::progress::{NoopSink, ProgressSink};
use crate::importer::repositories::ImportRepositories;
use crate::importer::row_importer::{row_importer_for, EntityRowImporter, RowContext, RowServices};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// 展示行号偏移（表头占 1 行，行号从 1 开始）
const DISPLAY_ROW_OFFSET: usize = 2;

// ==========================================
// BulkImporterImpl - 批量导入器实现
// ==========================================
pub struct BulkImporterImpl<C>
where
    C: ImportConfigReader,
{
    // 配置读取器
    config: C,

    // 仓储 + 引用解析 + 唯一键保护 + 派生
    services: Arc<RowServices>,

    // 导入组件
    file_parser: Box<dyn FileParser>,
    field_mapper: Box<dyn FieldMapper>,
    data_cleaner: Box<dyn DataCleaner>,
}

impl<C> BulkImporterImpl<C>
where
    C: ImportConfigReader,
{
    /// 创建导入器（使用默认解析/映射/转换组件）
    ///
    /// # 参数
    /// - repos: 四类实体仓储
    /// - config: 配置读取器
    /// - clock: 时钟（默认值与唯一键后缀）
    pub fn new(repos: ImportRepositories, config: C, clock: Arc<dyn Clock>) -> Self {
        Self::with_components(
            repos,
            config,
            clock,
            Box::new(CsvParser),
            Box::new(FieldMapperImpl),
            Box::new(DataCleanerImpl),
        )
    }

    pub fn with_components(
        repos: ImportRepositories,
        config: C,
        clock: Arc<dyn Clock>,
        file_parser: Box<dyn FileParser>,
        field_mapper: Box<dyn FieldMapper>,
        data_cleaner: Box<dyn DataCleaner>,
    ) -> Self {
        Self {
            config,
            services: Arc::new(RowServices::new(repos, clock)),
            file_parser,
            field_mapper,
            data_cleaner,
        }
    }

    /// 执行一次导入
    ///
    /// # 说明
    /// - 致命错误: 向 sink 投递一条不带行号的 error 事件后返回 Err
    /// - sink 关闭: 直接返回 Err(SinkClosed)
    #[instrument(skip_all, fields(kind = %kind))]
    pub async fn run(
        &self,
        kind: EntityKind,
        csv_text: &str,
        mappings: &FieldMappings,
        sink: &mut dyn ProgressSink,
    ) -> ImportResult<ImportSummary> {
        match self.run_rows(kind, csv_text, mappings, sink).await {
            Err(ImportError::SinkClosed(reason)) => {
                warn!(reason = %reason, "进度流已关闭，导入中止");
                Err(ImportError::SinkClosed(reason))
            }
            Err(e) => {
                error!(error = %e, "导入中止");
                let event = ImportEvent::Error {
                    error: e.to_string(),
                    row: None,
                };
                if let Err(sink_err) = sink.emit(event).await {
                    warn!(error = %sink_err, "致命错误事件投递失败");
                }
                Err(e)
            }
            ok => ok,
        }
    }

    async fn run_rows(
        &self,
        kind: EntityKind,
        csv_text: &str,
        mappings: &FieldMappings,
        sink: &mut dyn ProgressSink,
    ) -> ImportResult<ImportSummary> {
        let start_time = Instant::now();

        // === 步骤 1: 解析 CSV ===
        debug!("步骤 1: 解析 CSV");
        let table = self.file_parser.parse_text(csv_text)?;
        if table.is_empty() {
            return Err(ImportError::EmptyInput);
        }
        let total = table.rows.len();
        info!(total_rows = total, columns = table.headers.len(), "CSV 解析完成");

        // === 步骤 2: 字段映射 ===
        debug!("步骤 2: 字段映射");
        let mapping = self.field_mapper.build_mapping(kind, &table, mappings)?;

        // === 步骤 3: 配置快照 ===
        debug!("步骤 3: 读取导入配置");
        let settings = self.config.load_settings().await?;

        // === 步骤 4: 删除保单号历史唯一索引 ===
        if settings.drop_legacy_policy_number_index {
            let dropped = self
                .services
                .repos
                .policies
                .drop_policy_number_unique_index()
                .await?;
            if !dropped.is_empty() {
                info!(indexes = ?dropped, "已删除保单号唯一索引");
            }
        }

        // === 步骤 5: 逐行导入 ===
        debug!("步骤 5: 逐行导入");
        let importer = row_importer_for(kind, self.services.clone());
        let mut summary = ImportSummary {
            total,
            ..ImportSummary::default()
        };

        for (row_index, cells) in table.rows.iter().enumerate() {
            let preview = row_preview(cells, settings.error_preview_cells);
            let ctx = RowContext {
                row_index,
                display_row: row_index + DISPLAY_ROW_OFFSET,
                preview: &preview,
                settings: &settings,
            };

            match self.import_row(importer.as_ref(), &mapping, cells, &ctx).await {
                Ok(id) => {
                    summary.imported += 1;
                    debug!(row = ctx.display_row, id = %id, "行导入成功");
                }
                Err(err) => {
                    let err = into_row_error(err, ctx.display_row);
                    warn!(row = ctx.display_row, error = %err, "行导入失败");
                    let message = err.to_string();
                    summary.errors.push(message.clone());
                    sink.emit(ImportEvent::Error {
                        error: message,
                        row: err.row(),
                    })
                    .await?;
                }
            }

            sink.emit(ImportEvent::Progress {
                current: row_index + 1,
                total,
                imported: summary.imported,
                errors: summary.error_rows(),
            })
            .await?;
        }

        // === 步骤 6: 终态事件 ===
        sink.emit(ImportEvent::Complete {
            imported: summary.imported,
            errors: summary.errors.clone(),
            total,
        })
        .await?;

        info!(
            kind = %kind,
            total = summary.total,
            imported = summary.imported,
            errors = summary.error_rows(),
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "导入完成"
        );

        Ok(summary)
    }

    /// 单行: 转换 → 解析引用 → 默认值 → 落库
    async fn import_row(
        &self,
        importer: &dyn EntityRowImporter,
        mapping: &ColumnMapping,
        cells: &[String],
        ctx: &RowContext<'_>,
    ) -> ImportResult<String> {
        let mut row = self
            .field_mapper
            .coerce_row(mapping, cells, self.data_cleaner.as_ref());
        importer.resolve(&mut row, ctx).await?;
        self.field_mapper.apply_defaults(
            mapping,
            &mut row,
            self.data_cleaner.as_ref(),
            self.services.clock.as_ref(),
        );
        importer.persist(&row, ctx).await
    }
}

/// 行内任何失败都只影响该行
fn into_row_error(err: ImportError, display_row: usize) -> ImportError {
    if err.is_row_error() {
        err
    } else {
        ImportError::RowPersistence {
            row: display_row,
            message: err.row_detail(),
        }
    }
}

#[async_trait]
impl<C> BulkImporter for BulkImporterImpl<C>
where
    C: ImportConfigReader,
{
    async fn import_csv(
        &self,
        kind: EntityKind,
        csv_text: &str,
        mappings: &FieldMappings,
    ) -> ImportResult<ImportSummary> {
        let mut sink = NoopSink;
        self.run(kind, csv_text, mappings, &mut sink).await
    }

    async fn import_csv_streaming(
        &self,
        kind: EntityKind,
        csv_text: &str,
        mappings: &FieldMappings,
        sink: &mut dyn ProgressSink,
    ) -> ImportResult<ImportSummary> {
        self.run(kind, csv_text, mappings, sink).await
    }
}
