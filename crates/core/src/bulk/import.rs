//! Import entry points.
//!
//! These never return an error: a document that cannot be opened becomes a
//! hard-failure [`ImportResult`], bad rows become error lines.

use super::delimited::{CsvParser, DelimitedTable, DelimitedTextParser};
use super::rules::{validate_rules, ValidationRule};
use super::schema::{has_example_marker, is_blank_row, is_placeholder_row, RowProcessor};
use super::types::{ImportResult, RawCell};
use super::xlsx;
use crate::error::CoreError;

/// Receives `(current, total, message)` as rows are processed.
pub type ProgressCallback<'a> = &'a mut dyn FnMut(usize, usize, Option<&str>);

/// Upper bound of CSV progress, which is reported in percent of bytes read.
pub const PERCENT: usize = 100;

struct Progress<'a>(Option<ProgressCallback<'a>>);

impl Progress<'_> {
    fn report(&mut self, current: usize, total: usize, message: Option<&str>) {
        if let Some(callback) = self.0.as_deref_mut() {
            callback(current, total, message);
        }
    }
}

fn fail(format: &str, reason: impl std::fmt::Display) -> ImportResult {
    tracing::warn!(format, error = %reason, "Import aborted, document unreadable");
    ImportResult::hard_failure(reason)
}

fn reject_rules(format: &str, err: CoreError) -> ImportResult {
    let reason = match err {
        CoreError::Validation(message) => message,
        other => other.to_string(),
    };
    tracing::warn!(format, error = %reason, "Import aborted, rule set inconsistent");
    ImportResult::invalid_rules(reason)
}

fn log_finished(format: &str, result: &ImportResult) {
    tracing::debug!(
        format,
        total = result.total_rows,
        valid = result.valid_rows,
        invalid = result.error_rows,
        "Import finished"
    );
}

// ---------------------------------------------------------------------------
// Spreadsheet
// ---------------------------------------------------------------------------

/// Import `.xlsx` bytes.
///
/// Reads the `Data` sheet (or the first sheet), skips the header row, blank
/// rows and the template's example row, and matches rule *i* to column *i*.
/// Progress is reported once per data row as `(row index, data row count)`.
///
/// The example row is the one carrying the template marker. On sheets not
/// named `Data`, a first row whose every rule-mapped cell says "contoh" is
/// treated as a hand-made example row too.
pub fn import_from_excel(
    bytes: &[u8],
    rules: &[ValidationRule],
    on_progress: Option<ProgressCallback<'_>>,
) -> ImportResult {
    if let Err(e) = validate_rules(rules) {
        return reject_rules("xlsx", e);
    }
    let sheet = match xlsx::read_rows(bytes) {
        Ok(sheet) => sheet,
        Err(e) => return fail("xlsx", e),
    };

    let data_rows = sheet.rows.get(1..).unwrap_or_default();
    let total = data_rows.len();
    let mapped_width = sheet
        .rows
        .first()
        .map_or(0, |header| header.cells.len().min(rules.len()));
    let placeholder_allowed = sheet.sheet_name != xlsx::DATA_SHEET;
    tracing::debug!(sheet = %sheet.sheet_name, rows = total, "Importing spreadsheet");

    let mut progress = Progress(on_progress);
    let mut processor = RowProcessor::new(rules);
    for (i, row) in data_rows.iter().enumerate() {
        let example = has_example_marker(&row.cells)
            || (i == 0 && placeholder_allowed && {
                let mapped: Vec<RawCell> = (0..mapped_width)
                    .map(|c| row.cells.get(c).cloned().unwrap_or(RawCell::Empty))
                    .collect();
                is_placeholder_row(&mapped)
            });
        if example {
            tracing::debug!(row = row.number, "Skipping example row");
        } else if !is_blank_row(&row.cells) {
            processor.process_row(row.number, &row.cells);
        }
        progress.report(i + 1, total, None);
    }

    let result = processor.finish();
    log_finished("xlsx", &result);
    result
}

// ---------------------------------------------------------------------------
// Delimited text
// ---------------------------------------------------------------------------

/// Import CSV bytes with the default [`CsvParser`].
pub fn import_from_csv(
    bytes: &[u8],
    rules: &[ValidationRule],
    on_progress: Option<ProgressCallback<'_>>,
) -> ImportResult {
    import_from_csv_with(&CsvParser::new(), bytes, rules, on_progress)
}

/// Import delimited text with any parser.
///
/// Rules look their column up by header name (see
/// [`DelimitedTable::column_index`]). Error lines carry the physical line
/// number of the record. Progress is `(percent of bytes read, 100)`.
///
/// A first record carrying the template marker, or whose every cell under a
/// rule's column says "contoh", is skipped as an example row.
pub fn import_from_csv_with<P>(
    parser: &P,
    bytes: &[u8],
    rules: &[ValidationRule],
    on_progress: Option<ProgressCallback<'_>>,
) -> ImportResult
where
    P: DelimitedTextParser + ?Sized,
{
    if let Err(e) = validate_rules(rules) {
        return reject_rules("csv", e);
    }
    let table = match parser.parse(bytes) {
        Ok(table) => table,
        Err(e) => return fail("csv", e),
    };

    let columns = rule_columns(&table, rules);
    tracing::debug!(rows = table.rows.len(), "Importing CSV");

    let mut progress = Progress(on_progress);
    let mut processor = RowProcessor::new(rules);
    let last = table.rows.len().saturating_sub(1);
    for (i, row) in table.rows.iter().enumerate() {
        let whole: Vec<RawCell> = row.cells.iter().map(|s| RawCell::from(s.as_str())).collect();
        let cell_at = |c: usize| whole.get(c).cloned().unwrap_or(RawCell::Empty);
        let example = has_example_marker(&whole)
            || (i == 0 && {
                let present: Vec<RawCell> = columns.iter().flatten().map(|&c| cell_at(c)).collect();
                is_placeholder_row(&present)
            });
        if example {
            tracing::debug!(line = row.line, "Skipping example row");
        } else if !is_blank_row(&whole) {
            let cells: Vec<RawCell> = columns
                .iter()
                .map(|col| col.map_or(RawCell::Empty, cell_at))
                .collect();
            processor.process_row(row.line, &cells);
        }
        let consumed = if i == last { table.byte_len } else { row.byte_end };
        progress.report(percent(consumed, table.byte_len), PERCENT, None);
    }

    let result = processor.finish();
    log_finished("csv", &result);
    result
}

/// Column index of each rule's field, in rule order.
fn rule_columns(table: &DelimitedTable, rules: &[ValidationRule]) -> Vec<Option<usize>> {
    rules
        .iter()
        .map(|rule| {
            let index = table.column_index(&rule.field);
            if index.is_none() {
                tracing::debug!(field = %rule.field, "No CSV column for field");
            }
            index
        })
        .collect()
}

fn percent(done: usize, total: usize) -> usize {
    if total == 0 {
        return PERCENT;
    }
    (done.saturating_mul(PERCENT) / total).min(PERCENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bulk::rules::FieldType;
    use crate::bulk::types::FieldValue;

    fn rules() -> Vec<ValidationRule> {
        vec![
            ValidationRule::new("nis", FieldType::String).required(),
            ValidationRule::new("fullName", FieldType::String).required(),
            ValidationRule::new("phone", FieldType::Phone),
        ]
    }

    #[test]
    fn csv_rows_are_matched_by_header() {
        let csv = "phone,fullName *,nis *\n0812-3456-7890,Ahmad,20240001\n,Fatimah,20240002\n";
        let result = import_from_csv(csv.as_bytes(), &rules(), None);

        assert!(result.success);
        assert_eq!(result.total_rows, 2);
        assert_eq!(result.valid_rows, 2);
        assert_eq!(result.data[0].get("nis"), Some(&FieldValue::from("20240001")));
        assert_eq!(result.data[0].get("phone"), Some(&FieldValue::from("081234567890")));
        assert_eq!(result.data[1].get("phone"), Some(&FieldValue::Null));
    }

    #[test]
    fn csv_errors_use_physical_line_numbers() {
        let csv = "nis,fullName\n20240001,Ahmad\n\n20240002,\n";
        let result = import_from_csv(csv.as_bytes(), &rules(), None);

        assert_eq!((result.total_rows, result.valid_rows, result.error_rows), (2, 1, 1));
        assert_eq!(result.errors, vec!["Baris 4: fullName wajib diisi"]);
    }

    #[test]
    fn missing_required_column_fails_every_row() {
        let csv = "nis\n20240001\n20240002\n";
        let result = import_from_csv(csv.as_bytes(), &rules(), None);
        assert!(!result.success);
        assert_eq!(result.error_rows, 2);
        assert!(result.errors.iter().all(|e| e.contains("fullName wajib diisi")));
    }

    #[test]
    fn csv_example_and_blank_rows_are_skipped() {
        let csv = "nis,fullName\nContoh: 20240001,Contoh nama\n,\n20240002,Fatimah\n";
        let result = import_from_csv(csv.as_bytes(), &rules(), None);
        assert_eq!(result.total_rows, 1);
        assert_eq!(result.valid_rows, 1);
    }

    #[test]
    fn csv_partly_filled_row_mentioning_contoh_is_reported() {
        let rules = vec![
            ValidationRule::new("nis", FieldType::String).required(),
            ValidationRule::new("fullName", FieldType::String).required(),
            ValidationRule::new("guardianEmail", FieldType::Email),
        ];
        let csv = "nis,fullName,guardianEmail\n,,wali@contoh.sch.id\n";
        let result = import_from_csv(csv.as_bytes(), &rules, None);
        assert_eq!(result.total_rows, 1);
        assert_eq!(result.errors, vec!["Baris 2: nis wajib diisi, fullName wajib diisi"]);
    }

    #[test]
    fn csv_placeholder_text_below_first_row_is_data() {
        let csv = "nis,fullName\n20240001,Ahmad\ncontoh,contoh\n";
        let result = import_from_csv(csv.as_bytes(), &rules(), None);
        assert_eq!(result.total_rows, 2);
        assert_eq!(result.valid_rows, 2);
    }

    #[test]
    fn csv_progress_reaches_one_hundred_percent() {
        let csv = "nis,fullName\n1,A\n2,B\n3,C\n";
        let mut seen = Vec::new();
        let mut on_progress = |current: usize, total: usize, _: Option<&str>| {
            seen.push((current, total));
        };
        import_from_csv(
            csv.as_bytes(),
            &rules(),
            Some(&mut on_progress as ProgressCallback),
        );

        assert_eq!(seen.len(), 3);
        assert!(seen.iter().all(|(_, total)| *total == PERCENT));
        assert!(seen.windows(2).all(|w| w[0].0 <= w[1].0));
        assert_eq!(seen.last().map(|p| p.0), Some(PERCENT));
    }

    #[test]
    fn header_only_csv_is_empty_success() {
        let result = import_from_csv(b"nis,fullName\n", &rules(), None);
        assert!(result.success);
        assert_eq!(result.total_rows, 0);
        assert!(result.errors.is_empty());
    }

    struct FailingParser;

    impl DelimitedTextParser for FailingParser {
        fn parse(&self, _bytes: &[u8]) -> Result<DelimitedTable, CoreError> {
            Err(CoreError::Delimited("unterminated quote".into()))
        }
    }

    #[test]
    fn parser_failure_is_hard_failure() {
        let result = import_from_csv_with(&FailingParser, b"whatever", &rules(), None);
        assert!(result.is_hard_failure());
        assert_eq!(
            result.errors,
            vec!["Error reading file: Delimited text error: unterminated quote"]
        );
    }

    #[test]
    fn inconsistent_rules_are_reported_as_rule_errors() {
        let rules = vec![
            ValidationRule::new("nis", FieldType::String),
            ValidationRule::new("nis", FieldType::String),
        ];
        let result = import_from_csv(b"nis\n1\n", &rules, None);
        assert!(result.is_hard_failure());
        assert_eq!(
            result.errors,
            vec!["Invalid import rules: Duplicate rule for field 'nis'"]
        );

        let result = import_from_excel(b"not read", &rules, None);
        assert!(result.errors[0].starts_with("Invalid import rules: "));
    }

    #[test]
    fn garbage_spreadsheet_is_hard_failure() {
        let result = import_from_excel(b"PK\x03\x04 not really a zip", &rules(), None);
        assert!(result.is_hard_failure());
        assert_eq!((result.total_rows, result.valid_rows, result.error_rows), (0, 0, 0));
        assert!(result.errors[0].starts_with("Error reading file: "));
    }

    #[test]
    fn percent_is_clamped() {
        assert_eq!(percent(0, 0), 100);
        assert_eq!(percent(50, 200), 25);
        assert_eq!(percent(300, 200), 100);
    }
}
