//! Bulk import/export engine.
//!
//! Two directions of data flow over the same column/rule vocabulary:
//!
//! - Export: records + [`ColumnSpec`]s -> `.xlsx` or `.csv` [`ExportArtifact`].
//! - Import: uploaded bytes + [`ValidationRule`]s -> [`ImportResult`].
//!
//! plus a template generator that seeds correct input for the import side.
//!
//! Layering, leaves first: [`cell`] (per-cell coercion), [`schema`] (row
//! processing and error accumulation), the format adapters [`xlsx`] and
//! [`delimited`], then the public entry points in [`export`] and [`import`].

pub mod cell;
pub mod delimited;
pub mod export;
pub mod import;
pub mod presets;
pub mod rules;
pub mod schema;
pub mod types;
pub mod xlsx;

pub use cell::{validate_cell, CellOutcome};
pub use delimited::{CsvParser, DelimitedTable, DelimitedTextParser};
pub use export::{
    export_to_csv, export_to_excel, generate_excel_template, ExportArtifact, ExportFormat,
    ExportOptions,
};
pub use import::{import_from_csv, import_from_csv_with, import_from_excel, ProgressCallback};
pub use presets::FlowPreset;
pub use rules::{CustomValidator, FieldType, ValidationRule, Verdict};
pub use types::{
    ColumnSpec, ColumnType, FieldValue, ImportResult, RawCell, Record, TemplateColumnSpec,
};
