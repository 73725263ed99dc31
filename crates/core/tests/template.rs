//! Integration tests for the import template and the CSV path.

use std::io::Cursor;

use calamine::{Data, Reader, Xlsx};
use pesantren_core::bulk::presets::{self, BILLS, STUDENTS};
use pesantren_core::bulk::xlsx::{DATA_SHEET, INSTRUCTIONS_SHEET};
use pesantren_core::bulk::{
    export_to_csv, generate_excel_template, import_from_csv, import_from_excel, ColumnSpec,
    ColumnType, ExportOptions, FieldType, FieldValue, Record, TemplateColumnSpec, ValidationRule,
};

fn open(bytes: &[u8]) -> Xlsx<Cursor<&[u8]>> {
    Xlsx::new(Cursor::new(bytes)).expect("template should open")
}

// ---------------------------------------------------------------------------
// Test: required header marker and example row
// ---------------------------------------------------------------------------

#[test]
fn template_marks_required_header_and_keeps_example_text() {
    let columns = vec![TemplateColumnSpec::new(
        ColumnSpec::new("nis", "NIS", ColumnType::String),
        true,
        "20240001",
    )];
    let artifact = generate_excel_template(&columns, Some("template-santri"))
        .expect("template should render");
    assert_eq!(artifact.filename, "template-santri.xlsx");

    let mut workbook = open(&artifact.bytes);
    assert_eq!(workbook.sheet_names(), vec![INSTRUCTIONS_SHEET, DATA_SHEET]);

    let data = workbook.worksheet_range(DATA_SHEET).expect("data sheet");
    assert_eq!(data.get_value((0, 0)), Some(&Data::String("NIS *".into())));
    assert_eq!(data.get_value((1, 0)), Some(&Data::String("20240001".into())));
}

#[test]
fn template_default_filename_is_dated() {
    let columns = vec![TemplateColumnSpec::new(
        ColumnSpec::new("nis", "NIS", ColumnType::String),
        true,
        "20240001",
    )];
    let artifact = generate_excel_template(&columns, None).expect("template should render");
    assert!(artifact.filename.starts_with("template-import-"));
    assert!(artifact.filename.ends_with(".xlsx"));
}

// ---------------------------------------------------------------------------
// Test: an untouched template imports as empty
// ---------------------------------------------------------------------------

#[test]
fn untouched_template_imports_nothing() {
    for name in presets::PRESET_NAMES {
        let preset = presets::preset(name).expect("preset exists");
        let artifact =
            generate_excel_template(&preset.columns, None).expect("template should render");

        let result = import_from_excel(&artifact.bytes, &preset.rules, None);
        assert!(result.success, "{name}: {:?}", result.errors);
        assert_eq!(result.total_rows, 0, "{name}: example row must be skipped");
        assert!(result.errors.is_empty());
    }
}

#[test]
fn numeric_example_is_a_number_cell() {
    let preset = presets::preset(BILLS).expect("bills preset");
    let artifact = generate_excel_template(&preset.columns, None).expect("template should render");

    let mut workbook = open(&artifact.bytes);
    let data = workbook.worksheet_range(DATA_SHEET).expect("data sheet");
    let amount_col = preset
        .columns
        .iter()
        .position(|c| c.column.key == "amount")
        .expect("amount column") as u32;
    assert_eq!(data.get_value((1, amount_col)), Some(&Data::Float(150000.0)));
}

// ---------------------------------------------------------------------------
// Test: CSV export then import
// ---------------------------------------------------------------------------

#[test]
fn csv_round_trip_with_preset() {
    let preset = presets::preset(STUDENTS).expect("students preset");
    let record: Record = preset
        .columns
        .iter()
        .map(|c| (c.column.key.clone(), FieldValue::from(c.example.as_str())))
        .collect();

    // headers keyed by field so the importer can find them
    let columns: Vec<ColumnSpec> = preset
        .column_specs()
        .into_iter()
        .map(|mut c| {
            c.header = c.key.clone();
            c
        })
        .collect();
    let artifact = export_to_csv(&[record], &columns, &ExportOptions::default())
        .expect("csv export should succeed");
    assert!(artifact.filename.ends_with(".csv"));

    let result = import_from_csv(&artifact.bytes, &preset.rules, None);
    assert!(result.success, "{:?}", result.errors);
    assert_eq!(result.valid_rows, 1);
    assert_eq!(
        result.data[0].get("guardianEmail"),
        Some(&FieldValue::from("budi.santoso@gmail.com"))
    );
    assert!(result.data[0].get("birthDate").and_then(FieldValue::as_date).is_some());
}

#[test]
fn csv_quoted_values_survive_round_trip() {
    let columns = vec![
        ColumnSpec::new("nis", "nis", ColumnType::String),
        ColumnSpec::new("address", "address", ColumnType::String),
    ];
    let record: Record = [
        ("nis", FieldValue::from("20240001")),
        ("address", FieldValue::from("Jl. Merdeka No. 5, RT \"03\"\nBlok B")),
    ]
    .into_iter()
    .collect();
    let artifact = export_to_csv(&[record.clone()], &columns, &ExportOptions::default())
        .expect("csv export should succeed");

    let rules = vec![
        ValidationRule::new("nis", FieldType::String).required(),
        ValidationRule::new("address", FieldType::String),
    ];
    let result = import_from_csv(&artifact.bytes, &rules, None);
    assert_eq!(result.data, vec![record]);
}
