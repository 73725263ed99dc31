//! Export and template entry points.
//!
//! Each call renders a complete document in memory and hands it back as an
//! [`ExportArtifact`]; delivering the bytes (HTTP response, file) is the
//! caller's job.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::types::{validate_columns, ColumnSpec, Record, TemplateColumnSpec};
use super::{delimited, xlsx};
use crate::error::CoreError;

/// Slug of default export filenames.
pub const DEFAULT_EXPORT_SLUG: &str = "export";

/// Slug of default template filenames.
pub const DEFAULT_TEMPLATE_SLUG: &str = "template-import";

/// Output document format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Xlsx,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Xlsx => "xlsx",
            Self::Csv => "csv",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            Self::Csv => "text/csv; charset=utf-8",
        }
    }
}

/// Caller overrides for an export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportOptions {
    #[serde(default)]
    pub filename: Option<String>,
    /// Spreadsheet only; defaults to `Data`.
    #[serde(default)]
    pub sheet_name: Option<String>,
}

/// A rendered, downloadable document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub filename: String,
    pub format: ExportFormat,
    pub bytes: Vec<u8>,
}

impl ExportArtifact {
    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }
}

// ---------------------------------------------------------------------------
// Filenames
// ---------------------------------------------------------------------------

/// `<slug>-<YYYY-MM-DD>.<ext>`.
pub fn default_filename(slug: &str, format: ExportFormat, date: NaiveDate) -> String {
    format!("{slug}-{}.{}", date.format("%Y-%m-%d"), format.extension())
}

/// Use the caller's filename when given (extension appended when missing),
/// otherwise the dated default.
///
/// Path separators, quotes and control characters are replaced with `_`.
pub fn resolve_filename(
    requested: Option<&str>,
    slug: &str,
    format: ExportFormat,
    today: NaiveDate,
) -> String {
    let requested = requested.map(str::trim).filter(|s| !s.is_empty());
    let Some(name) = requested else {
        return default_filename(slug, format, today);
    };

    let mut name: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '"' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let suffix = format!(".{}", format.extension());
    if !name.to_lowercase().ends_with(&suffix) {
        name.push_str(&suffix);
    }
    name
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Render `records` as a single-sheet `.xlsx` document.
///
/// An empty record set yields a header-only document.
pub fn export_to_excel(
    records: &[Record],
    columns: &[ColumnSpec],
    options: &ExportOptions,
) -> Result<ExportArtifact, CoreError> {
    validate_columns(columns)?;

    let sheet_name = options
        .sheet_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(xlsx::DATA_SHEET);
    let bytes = xlsx::write_records(records, columns, sheet_name)?;
    let filename = resolve_filename(
        options.filename.as_deref(),
        DEFAULT_EXPORT_SLUG,
        ExportFormat::Xlsx,
        today(),
    );

    tracing::debug!(
        records = records.len(),
        columns = columns.len(),
        sheet = sheet_name,
        %filename,
        size = bytes.len(),
        "Exported spreadsheet"
    );

    Ok(ExportArtifact {
        filename,
        format: ExportFormat::Xlsx,
        bytes,
    })
}

/// Render `records` as CSV. `options.sheet_name` is ignored.
///
/// An empty record set yields a header-only document.
pub fn export_to_csv(
    records: &[Record],
    columns: &[ColumnSpec],
    options: &ExportOptions,
) -> Result<ExportArtifact, CoreError> {
    validate_columns(columns)?;

    let bytes = delimited::write_records(records, columns)?;
    let filename = resolve_filename(
        options.filename.as_deref(),
        DEFAULT_EXPORT_SLUG,
        ExportFormat::Csv,
        today(),
    );

    tracing::debug!(
        records = records.len(),
        columns = columns.len(),
        %filename,
        size = bytes.len(),
        "Exported CSV"
    );

    Ok(ExportArtifact {
        filename,
        format: ExportFormat::Csv,
        bytes,
    })
}

/// Render the two-sheet import template for `columns`.
pub fn generate_excel_template(
    columns: &[TemplateColumnSpec],
    filename: Option<&str>,
) -> Result<ExportArtifact, CoreError> {
    if columns.is_empty() {
        return Err(CoreError::Validation(
            "A template needs at least one column".into(),
        ));
    }
    let specs: Vec<ColumnSpec> = columns.iter().map(|c| c.column.clone()).collect();
    validate_columns(&specs)?;

    let bytes = xlsx::write_template(columns)?;
    let filename = resolve_filename(filename, DEFAULT_TEMPLATE_SLUG, ExportFormat::Xlsx, today());

    tracing::debug!(columns = columns.len(), %filename, "Generated import template");

    Ok(ExportArtifact {
        filename,
        format: ExportFormat::Xlsx,
        bytes,
    })
}
