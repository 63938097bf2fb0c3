// ==========================================
// 保单数据批量导入 - 日志
// ==========================================
// 职责: 安装 tracing 订阅者
// 约束: stdout 只输出导入结果（JSON 汇总或 SSE 帧），日志一律写 stderr
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

/// 日志格式环境变量（text | json）
pub const LOG_FORMAT_ENV: &str = "POLICY_IMPORT_LOG_FORMAT";

/// 日志输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// 人读格式（默认）
    #[default]
    Text,
    /// 每行一个 JSON 对象，供日志采集
    Json,
}

impl LogFormat {
    /// 解析格式名，无法识别时回退 Text
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }

    fn from_env() -> Self {
        std::env::var(LOG_FORMAT_ENV)
            .map(|raw| Self::parse(&raw))
            .unwrap_or_default()
    }
}

/// 初始化日志系统
///
/// # 环境变量
/// - RUST_LOG: 过滤器（默认 info），例如 `RUST_LOG=policy_import::importer=debug`
/// - POLICY_IMPORT_LOG_FORMAT: `json` 时输出结构化日志
///
/// 行级错误以 warn 级别记录（行号 + 错误），汇总以 info 级别记录。
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_line_number(true)
        .with_writer(std::io::stderr);

    match LogFormat::from_env() {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

/// 测试用日志（只看本 crate 的 debug 输出，可重复调用）
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("policy_import=debug"))
        .with_test_writer()
        .try_init();
}
