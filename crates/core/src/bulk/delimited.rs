//! Delimited-text (CSV) adapter.
//!
//! Parsing sits behind [`DelimitedTextParser`] so callers can swap in their
//! own reader; [`CsvParser`] is the default, backed by the `csv` crate.

use csv::{QuoteStyle, ReaderBuilder, StringRecord, Terminator, WriterBuilder};

use super::types::{ColumnSpec, FieldValue, Record};
use crate::error::CoreError;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// One parsed data record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelimitedRow {
    /// 1-based physical line the record starts on.
    pub line: usize,
    /// Bytes of input consumed once this record was read.
    pub byte_end: usize,
    pub cells: Vec<String>,
}

/// A parsed document: the header record plus every data record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DelimitedTable {
    pub headers: Vec<String>,
    pub rows: Vec<DelimitedRow>,
    /// Total input length in bytes, BOM excluded.
    pub byte_len: usize,
}

impl DelimitedTable {
    /// Position of the column holding `field`.
    ///
    /// Tries the exact name, then the required-marked form `"{field} *"`, then
    /// a case-insensitive match with surrounding whitespace and a trailing `*`
    /// ignored.
    pub fn column_index(&self, field: &str) -> Option<usize> {
        let marked = format!("{field} *");
        self.headers
            .iter()
            .position(|h| h == field)
            .or_else(|| self.headers.iter().position(|h| *h == marked))
            .or_else(|| {
                let wanted = field.trim().to_lowercase();
                self.headers
                    .iter()
                    .position(|h| normalize_header(h) == wanted)
            })
    }
}

fn normalize_header(header: &str) -> String {
    header
        .trim()
        .trim_end_matches('*')
        .trim()
        .to_lowercase()
}

/// Turns raw delimited-text bytes into a [`DelimitedTable`].
pub trait DelimitedTextParser: Send + Sync {
    fn parse(&self, bytes: &[u8]) -> Result<DelimitedTable, CoreError>;
}

/// RFC 4180 parser with flexible row lengths. Strips a leading UTF-8 BOM.
#[derive(Debug, Clone, Copy)]
pub struct CsvParser {
    delimiter: u8,
}

impl Default for CsvParser {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

impl CsvParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delimiter(delimiter: u8) -> Self {
        Self { delimiter }
    }
}

impl DelimitedTextParser for CsvParser {
    fn parse(&self, bytes: &[u8]) -> Result<DelimitedTable, CoreError> {
        let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(self.delimiter)
            .from_reader(bytes);

        let mut table = DelimitedTable {
            byte_len: bytes.len(),
            ..DelimitedTable::default()
        };
        let mut record = StringRecord::new();
        let mut seen_header = false;

        while reader.read_record(&mut record)? {
            let cells: Vec<String> = record.iter().map(str::to_string).collect();
            if !seen_header {
                table.headers = cells;
                seen_header = true;
                continue;
            }
            let line = record
                .position()
                .map(|p| p.line() as usize)
                .unwrap_or_default();
            table.rows.push(DelimitedRow {
                line,
                byte_end: reader.position().byte() as usize,
                cells,
            });
        }

        Ok(table)
    }
}

/// Render records as CSV: a header line, then one line per record.
///
/// Fields are quoted only when they contain the delimiter, a quote, CR or
/// LF. Lines end with `\n`.
pub fn write_records(records: &[Record], columns: &[ColumnSpec]) -> Result<Vec<u8>, CoreError> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Necessary)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(columns.iter().map(|c| c.header.as_str()))?;
    for record in records {
        writer.write_record(columns.iter().map(|c| {
            record
                .get(&c.key)
                .map(FieldValue::to_display_string)
                .unwrap_or_default()
        }))?;
    }

    writer
        .into_inner()
        .map_err(|e| CoreError::Delimited(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bulk::types::ColumnType;
    use chrono::NaiveDate;

    fn parse(text: &str) -> DelimitedTable {
        CsvParser::new().parse(text.as_bytes()).unwrap()
    }

    #[test]
    fn parses_header_and_rows_with_line_numbers() {
        let table = parse("nis,fullName\n20240001,Ahmad\n20240002,Fatimah\n");
        assert_eq!(table.headers, vec!["nis", "fullName"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].line, 2);
        assert_eq!(table.rows[1].line, 3);
        assert_eq!(table.rows[1].cells, vec!["20240002", "Fatimah"]);
        assert!(table.rows[0].byte_end < table.rows[1].byte_end);
        assert!(table.rows[1].byte_end <= table.byte_len);
    }

    #[test]
    fn quoted_fields_keep_commas_quotes_and_newlines() {
        let table = parse("nis,address\n1,\"Jl. Merdeka, No. 5\"\n2,\"Pondok \"\"Al-Ikhlas\"\"\nBlok B\"\n3,x\n");
        assert_eq!(table.rows[0].cells[1], "Jl. Merdeka, No. 5");
        assert_eq!(table.rows[1].cells[1], "Pondok \"Al-Ikhlas\"\nBlok B");
        // the multi-line record pushes the next one down a line
        assert_eq!(table.rows[2].line, 5);
    }

    #[test]
    fn bom_is_stripped_from_first_header() {
        let table = CsvParser::new()
            .parse(b"\xEF\xBB\xBFnis,fullName\n1,Ahmad\n")
            .unwrap();
        assert_eq!(table.headers[0], "nis");
    }

    #[test]
    fn ragged_rows_are_accepted() {
        let table = parse("a,b,c\n1\n1,2,3,4\n");
        assert_eq!(table.rows[0].cells.len(), 1);
        assert_eq!(table.rows[1].cells.len(), 4);
    }

    #[test]
    fn custom_delimiter() {
        let table = CsvParser::with_delimiter(b';').parse(b"nis;nama\n1;Ahmad\n").unwrap();
        assert_eq!(table.headers, vec!["nis", "nama"]);
        assert_eq!(table.rows[0].cells, vec!["1", "Ahmad"]);
    }

    #[test]
    fn invalid_utf8_is_an_error() {
        let err = CsvParser::new().parse(b"nis\n\xFF\xFE\n").unwrap_err();
        assert!(matches!(err, CoreError::Delimited(_)));
    }

    #[test]
    fn column_lookup_accepts_marked_and_loose_headers() {
        let table = parse("nis *, FullName ,email\n");
        assert_eq!(table.column_index("nis"), Some(0));
        assert_eq!(table.column_index("fullName"), Some(1));
        assert_eq!(table.column_index("email"), Some(2));
        assert_eq!(table.column_index("phone"), None);
    }

    #[test]
    fn writer_quotes_only_when_needed() {
        let columns = vec![
            ColumnSpec::new("name", "Nama", ColumnType::String),
            ColumnSpec::new("amount", "Nominal", ColumnType::Number),
            ColumnSpec::new("dueDate", "Jatuh Tempo", ColumnType::Date),
        ];
        let records: Vec<Record> = vec![
            [
                ("name", FieldValue::from("Ahmad, S.Pd")),
                ("amount", FieldValue::Number(150000.0)),
                ("dueDate", FieldValue::Date(NaiveDate::from_ymd_opt(2024, 7, 10).unwrap())),
            ]
            .into_iter()
            .collect(),
            [("name", FieldValue::from("Said \"Abu\""))].into_iter().collect(),
        ];

        let bytes = write_records(&records, &columns).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(
            text,
            "Nama,Nominal,Jatuh Tempo\n\"Ahmad, S.Pd\",150000,2024-07-10\n\"Said \"\"Abu\"\"\",,\n"
        );
    }

    #[test]
    fn writer_emits_header_for_empty_records() {
        let columns = vec![ColumnSpec::new("nis", "NIS", ColumnType::String)];
        let bytes = write_records(&[], &columns).unwrap();
        assert_eq!(bytes, b"NIS\n");
    }
}
