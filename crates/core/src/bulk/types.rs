//! Column, record, and result types shared by the import and export paths.
//!
//! Everything here is transient: built by the caller for one call and
//! dropped afterwards.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Prefix of the single diagnostic line of a hard-failure [`ImportResult`].
pub const HARD_FAILURE_PREFIX: &str = "Error reading file";

/// Prefix of the single diagnostic line when the rule set itself is unusable.
pub const INVALID_RULES_PREFIX: &str = "Invalid import rules";

// ---------------------------------------------------------------------------
// Column descriptors
// ---------------------------------------------------------------------------

/// How an exported column is rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    #[default]
    String,
    Number,
    Date,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Date => "date",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps one record field to a labelled, typed output column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSpec {
    /// Record field name. Unique within a column set.
    pub key: String,
    /// Human-readable header label.
    pub header: String,
    /// Display width hint in character units.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(rename = "type", default)]
    pub column_type: ColumnType,
}

impl ColumnSpec {
    pub fn new(key: impl Into<String>, header: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            key: key.into(),
            header: header.into(),
            width: None,
            column_type,
        }
    }
}

/// A [`ColumnSpec`] with the metadata the import template needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateColumnSpec {
    #[serde(flatten)]
    pub column: ColumnSpec,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub example: String,
}

impl TemplateColumnSpec {
    pub fn new(column: ColumnSpec, required: bool, example: impl Into<String>) -> Self {
        Self {
            column,
            required,
            example: example.into(),
        }
    }

    /// Header as written to the template's Data sheet: required columns
    /// carry a trailing ` *`.
    pub fn marked_header(&self) -> String {
        if self.required {
            format!("{} *", self.column.header)
        } else {
            self.column.header.clone()
        }
    }
}

/// Check that a column set is usable: non-empty keys, unique keys.
pub fn validate_columns(columns: &[ColumnSpec]) -> Result<(), CoreError> {
    let mut seen = HashSet::new();
    for (i, column) in columns.iter().enumerate() {
        if column.key.trim().is_empty() {
            return Err(CoreError::Validation(format!(
                "Column at index {i} has an empty key"
            )));
        }
        if !seen.insert(column.key.as_str()) {
            return Err(CoreError::Validation(format!(
                "Duplicate column key '{}'",
                column.key
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// A raw cell as read from an uploaded document, before any rule applies.
#[derive(Debug, Clone, PartialEq)]
pub enum RawCell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDate),
}

impl RawCell {
    /// `Empty`, or text that is empty once trimmed.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Untrimmed text form of the cell.
    pub fn to_text(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Text(s) => s.clone(),
            Self::Number(n) => format_plain_number(*n),
            Self::Bool(b) => b.to_string(),
            Self::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }
}

impl From<&str> for RawCell {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// A coerced, typed field value.
///
/// Serialized untagged: `null`, a boolean, a number, an ISO date string, or a
/// string. Because `Date` is tried before `Text`, an incoming `"2024-07-15"`
/// becomes a date; export renders both the same way, so the ambiguity is
/// harmless. Import never yields `Bool` since no rule type coerces to it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Date(NaiveDate),
    Text(String),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Plain text rendering used by CSV export and pattern matching.
    pub fn to_display_string(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => format_plain_number(*n),
            Self::Date(d) => d.format("%Y-%m-%d").to_string(),
            Self::Text(s) => s.clone(),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

/// Render a number without a trailing `.0` when it is integral.
pub fn format_plain_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// One row of data keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(BTreeMap<String, FieldValue>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        self.0.insert(key.into(), value.into());
    }
}

impl<K: Into<String>> FromIterator<(K, FieldValue)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, FieldValue)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

// ---------------------------------------------------------------------------
// Import result
// ---------------------------------------------------------------------------

/// Outcome of one import call.
///
/// Invariants: `valid_rows + error_rows == total_rows`, and `success` is true
/// iff at least one row was valid, or nothing was processed and nothing went
/// wrong. Bad rows are skipped and reported; they never fail the import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub success: bool,
    #[serde(default)]
    pub data: Vec<Record>,
    pub errors: Vec<String>,
    pub total_rows: usize,
    pub valid_rows: usize,
    pub error_rows: usize,
}

impl ImportResult {
    /// The document could not be opened or parsed at all.
    pub fn hard_failure(reason: impl fmt::Display) -> Self {
        Self::aborted(format!("{HARD_FAILURE_PREFIX}: {reason}"))
    }

    /// The rules were inconsistent, so no row was looked at.
    pub fn invalid_rules(reason: impl fmt::Display) -> Self {
        Self::aborted(format!("{INVALID_RULES_PREFIX}: {reason}"))
    }

    fn aborted(line: String) -> Self {
        Self {
            success: false,
            data: Vec::new(),
            errors: vec![line],
            total_rows: 0,
            valid_rows: 0,
            error_rows: 0,
        }
    }

    /// Assemble a result from processed rows, deriving the counters.
    pub fn from_rows(data: Vec<Record>, errors: Vec<String>, total_rows: usize) -> Self {
        let valid_rows = data.len();
        let error_rows = total_rows.saturating_sub(valid_rows);
        let success = valid_rows > 0 || (total_rows == 0 && errors.is_empty());
        Self {
            success,
            data,
            errors,
            total_rows,
            valid_rows,
            error_rows,
        }
    }

    /// True when the import stopped before any row: the document could not
    /// be read or the rules were unusable.
    pub fn is_hard_failure(&self) -> bool {
        !self.success
            && self.total_rows == 0
            && self.errors.first().is_some_and(|e| {
                e.starts_with(HARD_FAILURE_PREFIX) || e.starts_with(INVALID_RULES_PREFIX)
            })
    }
}
