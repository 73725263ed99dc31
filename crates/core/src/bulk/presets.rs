//! Built-in column/rule sets for the data-entry flows that use the engine.
//!
//! Each preset is plain data. Columns and rules are built from the same field
//! list, so rule *i* always describes template column *i*, which is what the
//! positional spreadsheet import relies on.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::rules::{FieldType, ValidationRule};
use super::types::{ColumnSpec, ColumnType, TemplateColumnSpec};

pub const STUDENTS: &str = "students";
pub const TEACHERS: &str = "teachers";
pub const BILLS: &str = "bills";

pub const PRESET_NAMES: &[&str] = &[STUDENTS, TEACHERS, BILLS];

pub const INSTITUTION_TYPES: &[&str] = &["TK", "SD", "SMP", "SMA"];
pub const GENDERS: &[&str] = &["L", "P"];
pub const BILL_TYPES: &[&str] = &["SPP", "DAFTAR_ULANG", "SERAGAM", "KITAB", "LAINNYA"];

static NIS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{8,20}$").expect("valid NIS regex"));
static NIP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{18}$").expect("valid NIP regex"));
static PERIOD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-(0[1-9]|1[0-2])$").expect("valid period regex"));

/// A named import/export flow.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowPreset {
    pub name: &'static str,
    pub label: &'static str,
    pub columns: Vec<TemplateColumnSpec>,
    pub rules: Vec<ValidationRule>,
}

impl FlowPreset {
    /// The plain export columns of this flow.
    pub fn column_specs(&self) -> Vec<ColumnSpec> {
        self.columns.iter().map(|c| c.column.clone()).collect()
    }
}

/// Look a preset up by name.
pub fn preset(name: &str) -> Option<FlowPreset> {
    match name {
        STUDENTS => Some(students()),
        TEACHERS => Some(teachers()),
        BILLS => Some(bills()),
        _ => None,
    }
}

/// Every built-in preset, in [`PRESET_NAMES`] order.
pub fn all() -> Vec<FlowPreset> {
    PRESET_NAMES.iter().filter_map(|name| preset(name)).collect()
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

struct Field {
    header: &'static str,
    column_type: ColumnType,
    width: Option<f64>,
    example: &'static str,
    rule: ValidationRule,
}

fn field(
    header: &'static str,
    column_type: ColumnType,
    example: &'static str,
    rule: ValidationRule,
) -> Field {
    Field {
        header,
        column_type,
        width: None,
        example,
        rule,
    }
}

impl Field {
    fn width(mut self, width: f64) -> Self {
        self.width = Some(width);
        self
    }
}

fn build(name: &'static str, label: &'static str, fields: Vec<Field>) -> FlowPreset {
    let mut columns = Vec::with_capacity(fields.len());
    let mut rules = Vec::with_capacity(fields.len());
    for f in fields {
        let mut column = ColumnSpec::new(f.rule.field.clone(), f.header, f.column_type);
        column.width = f.width;
        columns.push(TemplateColumnSpec::new(column, f.rule.required, f.example));
        rules.push(f.rule);
    }
    FlowPreset {
        name,
        label,
        columns,
        rules,
    }
}

// ---------------------------------------------------------------------------
// Presets
// ---------------------------------------------------------------------------

fn students() -> FlowPreset {
    build(
        STUDENTS,
        "Data Santri",
        vec![
            field(
                "NIS",
                ColumnType::String,
                "20240001",
                ValidationRule::new("nis", FieldType::String)
                    .required()
                    .pattern(NIS_RE.clone()),
            ),
            field(
                "Nama Lengkap",
                ColumnType::String,
                "Ahmad Fauzi",
                ValidationRule::new("fullName", FieldType::String)
                    .required()
                    .min_length(3)
                    .max_length(100),
            )
            .width(30.0),
            field(
                "Jenis Kelamin",
                ColumnType::String,
                "L",
                ValidationRule::new("gender", FieldType::String)
                    .required()
                    .one_of(GENDERS.iter().copied()),
            ),
            field(
                "Tanggal Lahir",
                ColumnType::Date,
                "2010-05-14",
                ValidationRule::new("birthDate", FieldType::Date),
            ),
            field(
                "Jenjang",
                ColumnType::String,
                "SMP",
                ValidationRule::new("institutionType", FieldType::String)
                    .required()
                    .one_of(INSTITUTION_TYPES.iter().copied()),
            ),
            field(
                "Nama Wali",
                ColumnType::String,
                "Budi Santoso",
                ValidationRule::new("guardianName", FieldType::String).max_length(100),
            )
            .width(30.0),
            field(
                "No. HP Wali",
                ColumnType::String,
                "081234567890",
                ValidationRule::new("guardianPhone", FieldType::Phone),
            ),
            field(
                "Email Wali",
                ColumnType::String,
                "budi.santoso@gmail.com",
                ValidationRule::new("guardianEmail", FieldType::Email),
            )
            .width(30.0),
        ],
    )
}

fn teachers() -> FlowPreset {
    build(
        TEACHERS,
        "Data Guru",
        vec![
            field(
                "NIP",
                ColumnType::String,
                "198501012010011001",
                ValidationRule::new("nip", FieldType::String).pattern(NIP_RE.clone()),
            )
            .width(22.0),
            field(
                "Nama Lengkap",
                ColumnType::String,
                "Siti Aminah, S.Pd",
                ValidationRule::new("fullName", FieldType::String)
                    .required()
                    .min_length(3)
                    .max_length(100),
            )
            .width(30.0),
            field(
                "Jenis Kelamin",
                ColumnType::String,
                "P",
                ValidationRule::new("gender", FieldType::String)
                    .required()
                    .one_of(GENDERS.iter().copied()),
            ),
            field(
                "No. HP",
                ColumnType::String,
                "081298765432",
                ValidationRule::new("phone", FieldType::Phone).required(),
            ),
            field(
                "Email",
                ColumnType::String,
                "siti.aminah@gmail.com",
                ValidationRule::new("email", FieldType::Email),
            )
            .width(30.0),
            field(
                "Mata Pelajaran",
                ColumnType::String,
                "Bahasa Arab",
                ValidationRule::new("subject", FieldType::String).max_length(100),
            ),
            field(
                "Jenjang",
                ColumnType::String,
                "SMA",
                ValidationRule::new("institutionType", FieldType::String)
                    .required()
                    .one_of(INSTITUTION_TYPES.iter().copied()),
            ),
        ],
    )
}

fn bills() -> FlowPreset {
    build(
        BILLS,
        "Tagihan",
        vec![
            field(
                "NIS",
                ColumnType::String,
                "20240001",
                ValidationRule::new("nis", FieldType::String)
                    .required()
                    .pattern(NIS_RE.clone()),
            ),
            field(
                "Jenis Tagihan",
                ColumnType::String,
                "SPP",
                ValidationRule::new("billType", FieldType::String)
                    .required()
                    .one_of(BILL_TYPES.iter().copied()),
            ),
            field(
                "Periode",
                ColumnType::String,
                "2024-07",
                ValidationRule::new("period", FieldType::String).pattern(PERIOD_RE.clone()),
            ),
            field(
                "Nominal",
                ColumnType::Number,
                "150000",
                ValidationRule::new("amount", FieldType::Number)
                    .required()
                    .min_value(0.0),
            ),
            field(
                "Jatuh Tempo",
                ColumnType::Date,
                "2024-07-10",
                ValidationRule::new("dueDate", FieldType::Date).required(),
            ),
            field(
                "Keterangan",
                ColumnType::String,
                "SPP Juli 2024",
                ValidationRule::new("description", FieldType::String).max_length(255),
            )
            .width(30.0),
        ],
    )
}
