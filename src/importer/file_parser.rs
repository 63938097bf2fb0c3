// ==========================================
// 保单数据批量导入 - CSV 解析器实现
// ==========================================
// 职责: 原始文本 → 表头 + 数据行
// 规则: 逗号分隔 / 双引号包裹 / "" 表示字面引号 / 解析前剔除空白行
// ==========================================

use crate::importer::bulk_importer_trait::FileParser;
use crate::importer::error::ImportResult;
use csv::ReaderBuilder;

// ==========================================
// CsvTable - 解析结果
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvTable {
    /// 表头（已 TRIM）
    pub headers: Vec<String>,
    /// 数据行（单元格原样保留）
    pub rows: Vec<Vec<String>>,
}

impl CsvTable {
    /// 无表头视为空文件
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// 按列名定位列序号（先精确匹配，再忽略大小写匹配）
    pub fn column_index(&self, header: &str) -> Option<usize> {
        let wanted = header.trim();
        self.headers
            .iter()
            .position(|h| h == wanted)
            .or_else(|| {
                self.headers
                    .iter()
                    .position(|h| h.eq_ignore_ascii_case(wanted))
            })
    }
}

// ==========================================
// CsvParser 实现
// ==========================================
pub struct CsvParser;

impl FileParser for CsvParser {
    fn parse_text(&self, text: &str) -> ImportResult<CsvTable> {
        // 去除 BOM 并剔除空白行（先于引号解析，CRLF 统一为 LF）
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let content: Vec<&str> = text.lines().filter(|line| !line.trim().is_empty()).collect();

        if content.is_empty() {
            return Ok(CsvTable::default());
        }

        let joined = content.join("\n");
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true) // 允许行长度不一致
            .from_reader(joined.as_bytes());

        let mut records = reader.records();

        // 读取表头
        let headers: Vec<String> = match records.next() {
            Some(record) => record?.iter().map(|h| h.trim().to_string()).collect(),
            None => return Ok(CsvTable::default()),
        };

        // 读取所有行
        let mut rows = Vec::new();
        for result in records {
            let record = result?;
            rows.push(record.iter().map(|cell| cell.to_string()).collect());
        }

        Ok(CsvTable { headers, rows })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_parser_basic() {
        let table = CsvParser
            .parse_text("firstName,idNumber\nJane,0012\nJohn,0013\n")
            .unwrap();

        assert_eq!(table.headers, vec!["firstName", "idNumber"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0], vec!["Jane", "0012"]);
    }

    #[test]
    fn test_csv_parser_quoted_fields() {
        let table = CsvParser
            .parse_text("name,address\n\"Doe, Jane\",\"12 \"\"Main\"\" St\"\n")
            .unwrap();

        assert_eq!(table.rows[0][0], "Doe, Jane");
        assert_eq!(table.rows[0][1], "12 \"Main\" St");
    }

    #[test]
    fn test_csv_parser_skip_blank_lines() {
        let table = CsvParser
            .parse_text("\n  \na,b\r\n1,2\r\n\r\n   \n3,4\n")
            .unwrap();

        // 应跳过空行
        assert_eq!(table.headers, vec!["a", "b"]);
        assert_eq!(table.rows, vec![vec!["1", "2"], vec!["3", "4"]]);
    }

    #[test]
    fn test_csv_parser_multiline_quoted_field() {
        // 空白行先于解析剔除，引号内的空行与 CRLF 同样受影响
        let table = CsvParser
            .parse_text("notes,amount\r\n\"line one\r\n\r\nline two\",100\r\n")
            .unwrap();

        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0], vec!["line one\nline two", "100"]);
    }

    #[test]
    fn test_csv_parser_empty_input() {
        let table = CsvParser.parse_text("  \n\n").unwrap();
        assert!(table.is_empty());
        assert!(table.rows.is_empty());
    }

    #[test]
    fn test_csv_parser_ragged_rows_and_header_lookup() {
        let table = CsvParser.parse_text(" Policy No ,Amount\nPOL-1\n").unwrap();

        assert_eq!(table.rows[0], vec!["POL-1"]);
        assert_eq!(table.column_index("Policy No"), Some(0));
        assert_eq!(table.column_index("amount"), Some(1));
        assert_eq!(table.column_index("missing"), None);
    }
}
