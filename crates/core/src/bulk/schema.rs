//! Row/schema processor.
//!
//! Applies a rule list to each data row in file order, collects every field
//! error of a row, and keeps either the coerced record or a single
//! `Baris N: ...` error line. One bad row never stops the import.

use super::cell::{validate_cell, CellOutcome};
use super::rules::ValidationRule;
use super::types::{ImportResult, RawCell, Record};

/// Sentinel written into a hidden cell of the template's example row.
pub const EXAMPLE_ROW_MARKER: &str = "__contoh__";

/// Placeholder word of hand-made example rows ("example").
pub const EXAMPLE_PLACEHOLDER: &str = "contoh";

/// Prefix of a row error line ("row").
pub const ROW_ERROR_PREFIX: &str = "Baris";

/// What happened to one processed row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOutcome {
    Accepted,
    Rejected,
}

/// True when the row carries the template's hidden [`EXAMPLE_ROW_MARKER`].
pub fn has_example_marker(cells: &[RawCell]) -> bool {
    cells
        .iter()
        .any(|c| matches!(c, RawCell::Text(s) if s.trim() == EXAMPLE_ROW_MARKER))
}

/// Placeholder row of a hand-made template: every rule-mapped cell is text
/// containing "contoh" (case-insensitive). Blank cells never match.
///
/// `cells` holds exactly the cells mapped to rules. Importers only ask this
/// of the first row under the header.
pub fn is_placeholder_row(cells: &[RawCell]) -> bool {
    !cells.is_empty()
        && cells.iter().all(|c| match c {
            RawCell::Text(s) => s.to_lowercase().contains(EXAMPLE_PLACEHOLDER),
            _ => false,
        })
}

/// True when every cell is blank.
pub fn is_blank_row(cells: &[RawCell]) -> bool {
    cells.iter().all(RawCell::is_blank)
}

/// Accumulates validated records and error lines across the rows of one
/// import call.
#[derive(Debug)]
pub struct RowProcessor<'a> {
    rules: &'a [ValidationRule],
    data: Vec<Record>,
    errors: Vec<String>,
    total_rows: usize,
}

impl<'a> RowProcessor<'a> {
    pub fn new(rules: &'a [ValidationRule]) -> Self {
        Self {
            rules,
            data: Vec::new(),
            errors: Vec::new(),
            total_rows: 0,
        }
    }

    /// Validate one row. `cells[i]` is the raw value for `rules[i]`; missing
    /// trailing cells count as empty.
    pub fn process_row(&mut self, row_number: usize, cells: &[RawCell]) -> RowOutcome {
        self.total_rows += 1;

        let mut record = Record::new();
        let mut row_errors = Vec::new();

        for (i, rule) in self.rules.iter().enumerate() {
            let raw = cells.get(i).unwrap_or(&RawCell::Empty);
            match validate_cell(raw, rule, row_number) {
                CellOutcome::Valid(value) => record.insert(rule.field.clone(), value),
                CellOutcome::Invalid(message) => row_errors.push(message),
            }
        }

        if row_errors.is_empty() {
            self.data.push(record);
            RowOutcome::Accepted
        } else {
            self.errors.push(format!(
                "{ROW_ERROR_PREFIX} {row_number}: {}",
                row_errors.join(", ")
            ));
            RowOutcome::Rejected
        }
    }

    pub fn total_rows(&self) -> usize {
        self.total_rows
    }

    pub fn valid_rows(&self) -> usize {
        self.data.len()
    }

    pub fn finish(self) -> ImportResult {
        ImportResult::from_rows(self.data, self.errors, self.total_rows)
    }
}
