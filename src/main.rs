// ==========================================
// 保单数据批量导入 - 命令行入口
// ==========================================
// 用法:
//   policy-import <db_path|-> <collection> <csv_file> <mappings.json> [--stream]
//
// - db_path 为 "-" 时使用默认数据库路径
// - 同步模式输出 JSON 汇总；--stream 模式逐行输出 SSE 帧
// ==========================================

use anyhow::Context;
use clap::Parser;
use policy_import::api::{AllowAllGuard, CallerContext, ImportApi};
use policy_import::db::default_db_path;
use policy_import::domain::{FieldMappings, ImportRequest};
use policy_import::importer::SseWriterSink;
use policy_import::logging;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "policy-import")]
#[command(about = "Bulk import policy records from CSV", long_about = None)]
#[command(version)]
struct Cli {
    /// SQLite database path ("-" selects the default location)
    db: String,

    /// Target collection: customers|policies|payments|receipts
    collection: String,

    /// CSV file to import
    csv: PathBuf,

    /// JSON object mapping target fields to CSV header names
    mappings: PathBuf,

    /// Emit SSE frames per row instead of a JSON summary (stdout)
    #[arg(long)]
    stream: bool,
}

impl Cli {
    fn db_path(&self) -> String {
        if self.db == "-" {
            default_db_path()
        } else {
            self.db.clone()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init();

    let db_path = cli.db_path();

    tracing::info!("==================================================");
    tracing::info!("{} v{}", policy_import::APP_NAME, policy_import::VERSION);
    tracing::info!("使用数据库: {}", db_path);
    tracing::info!("==================================================");

    let csv = std::fs::read_to_string(&cli.csv)
        .with_context(|| format!("读取 CSV 文件失败: {}", cli.csv.display()))?;
    let mappings_text = std::fs::read_to_string(&cli.mappings)
        .with_context(|| format!("读取映射文件失败: {}", cli.mappings.display()))?;
    let field_mappings: FieldMappings = serde_json::from_str(&mappings_text)
        .with_context(|| format!("映射文件不是 JSON 对象: {}", cli.mappings.display()))?;

    let request = ImportRequest {
        csv,
        collection_type: cli.collection.clone(),
        field_mappings,
    };

    let api = ImportApi::open(&db_path, Arc::new(AllowAllGuard))?;
    let caller = CallerContext::new("cli", &["admin"]);

    if cli.stream {
        let mut sink = SseWriterSink::new(std::io::stdout());
        api.import_records_streaming(&caller, &request, &mut sink)
            .await?;
    } else {
        let response = api.import_records(&caller, &request).await?;
        println!("{}", serde_json::to_string_pretty(&response)?);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_parses_positionals_and_stream_flag() {
        let cli = Cli::try_parse_from([
            "policy-import",
            "/tmp/p.db",
            "payments",
            "payments.csv",
            "mappings.json",
            "--stream",
        ])
        .unwrap();
        assert_eq!(cli.db_path(), "/tmp/p.db");
        assert_eq!(cli.collection, "payments");
        assert_eq!(cli.csv, PathBuf::from("payments.csv"));
        assert_eq!(cli.mappings, PathBuf::from("mappings.json"));
        assert!(cli.stream);
    }

    #[test]
    fn test_cli_rejects_unknown_flag_and_missing_args() {
        let unknown = Cli::try_parse_from([
            "policy-import",
            "p.db",
            "customers",
            "c.csv",
            "m.json",
            "--strem",
        ]);
        assert_eq!(
            unknown.unwrap_err().kind(),
            clap::error::ErrorKind::UnknownArgument
        );

        let missing = Cli::try_parse_from(["policy-import", "p.db", "customers"]);
        assert_eq!(
            missing.unwrap_err().kind(),
            clap::error::ErrorKind::MissingRequiredArgument
        );
    }
}
