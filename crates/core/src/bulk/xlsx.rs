//! Spreadsheet adapter: `.xlsx` writer (export and template) and reader
//! (import).
//!
//! Every call builds a fresh [`Workbook`]; nothing is shared between calls.

use std::io::Cursor;

use calamine::{Data, Reader, Xlsx};
use chrono::NaiveDate;
use rust_xlsxwriter::{Color, Format, FormatBorder, Workbook, Worksheet};

use super::cell::parse_date;
use super::schema::EXAMPLE_ROW_MARKER;
use super::types::{ColumnSpec, ColumnType, FieldValue, RawCell, Record, TemplateColumnSpec};
use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Sheet the importer looks for first, and the template's data sheet.
pub const DATA_SHEET: &str = "Data";

/// The template's instructions sheet.
pub const INSTRUCTIONS_SHEET: &str = "Instructions";

/// Narrowest auto-sized column, in character units.
pub const MIN_COLUMN_WIDTH: f64 = 10.0;

const COLUMN_PADDING: f64 = 2.0;

const DATE_DISPLAY_FORMAT: &str = "dd/mm/yyyy";
const INTEGER_FORMAT: &str = "#,##0";
const DECIMAL_FORMAT: &str = "#,##0.00";
const HEADER_FILL: u32 = 0xD9E1F2;

/// Last row index of an `.xlsx` sheet (zero-based).
const MAX_ROW_INDEX: usize = 1_048_575;

/// Last column index of an `.xlsx` sheet (zero-based).
const MAX_COL_INDEX: usize = 16_383;

const INSTRUCTION_LINES: &[&str] = &[
    "1. Isi data pada sheet \"Data\", mulai dari baris ke-3.",
    "2. Baris ke-2 (huruf miring) adalah contoh dan tidak ikut diimport. Jangan menimpanya.",
    "3. Kolom bertanda * wajib diisi.",
    "4. Jangan mengubah urutan, nama, atau jumlah kolom.",
    "5. Tanggal ditulis DD/MM/YYYY atau YYYY-MM-DD.",
    "6. Nomor telepon berisi 10-15 digit, boleh diawali +.",
];

// ---------------------------------------------------------------------------
// Formats
// ---------------------------------------------------------------------------

struct Formats {
    header: Format,
    required_header: Format,
    date: Format,
    integer: Format,
    decimal: Format,
    example: Format,
    title: Format,
}

impl Formats {
    fn new() -> Self {
        let header = Format::new()
            .set_bold()
            .set_background_color(Color::RGB(HEADER_FILL))
            .set_border(FormatBorder::Thin);
        Self {
            required_header: header.clone().set_font_color(Color::Red),
            header,
            date: Format::new().set_num_format(DATE_DISPLAY_FORMAT),
            integer: Format::new().set_num_format(INTEGER_FORMAT),
            decimal: Format::new().set_num_format(DECIMAL_FORMAT),
            example: Format::new().set_italic().set_font_color(Color::Gray),
            title: Format::new().set_bold().set_font_size(14),
        }
    }
}

fn row_num(index: usize) -> Result<u32, CoreError> {
    if index > MAX_ROW_INDEX {
        return Err(CoreError::Spreadsheet(format!(
            "row {} exceeds the sheet limit of {} rows",
            index + 1,
            MAX_ROW_INDEX + 1
        )));
    }
    u32::try_from(index).map_err(|e| CoreError::Internal(e.to_string()))
}

fn col_num(index: usize) -> Result<u16, CoreError> {
    if index > MAX_COL_INDEX {
        return Err(CoreError::Spreadsheet(format!(
            "column {} exceeds the sheet limit of {} columns",
            index + 1,
            MAX_COL_INDEX + 1
        )));
    }
    u16::try_from(index).map_err(|e| CoreError::Internal(e.to_string()))
}

// ---------------------------------------------------------------------------
// Column widths
// ---------------------------------------------------------------------------

/// Tracks the widest rendered text per column.
struct ColumnWidths(Vec<usize>);

impl ColumnWidths {
    fn new<'a>(headers: impl IntoIterator<Item = &'a str>) -> Self {
        Self(headers.into_iter().map(|h| h.chars().count()).collect())
    }

    fn observe(&mut self, col: usize, rendered: &str) {
        if let Some(w) = self.0.get_mut(col) {
            *w = (*w).max(rendered.chars().count());
        }
    }

    fn apply(&self, worksheet: &mut Worksheet, hints: &[Option<f64>]) -> Result<(), CoreError> {
        for (col, chars) in self.0.iter().enumerate() {
            let hint = hints.get(col).copied().flatten();
            worksheet.set_column_width(col_num(col)?, column_width(*chars, hint))?;
        }
        Ok(())
    }
}

/// Width for a column whose widest rendered cell is `max_chars` long.
pub fn column_width(max_chars: usize, hint: Option<f64>) -> f64 {
    let fitted = (max_chars as f64 + COLUMN_PADDING).max(MIN_COLUMN_WIDTH);
    match hint {
        Some(h) if h > fitted => h,
        _ => fitted,
    }
}

/// Render a number the way `#,##0` / `#,##0.00` display it.
pub fn group_thousands(n: f64) -> String {
    let integral = n.fract() == 0.0;
    let text = if integral {
        format!("{:.0}", n.abs())
    } else {
        format!("{:.2}", n.abs())
    };
    let (int_part, frac_part) = match text.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (text.as_str(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3 + 4);
    if n < 0.0 {
        grouped.push('-');
    }
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if let Some(f) = frac_part {
        grouped.push('.');
        grouped.push_str(f);
    }
    grouped
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// Write `records` as a single-sheet workbook and return its bytes.
pub fn write_records(
    records: &[Record],
    columns: &[ColumnSpec],
    sheet_name: &str,
) -> Result<Vec<u8>, CoreError> {
    let formats = Formats::new();
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet_name)?;

    for (c, column) in columns.iter().enumerate() {
        worksheet.write_string_with_format(0, col_num(c)?, &column.header, &formats.header)?;
    }

    let mut widths = ColumnWidths::new(columns.iter().map(|c| c.header.as_str()));
    for (i, record) in records.iter().enumerate() {
        let row = row_num(i + 1)?;
        for (c, column) in columns.iter().enumerate() {
            let value = record.get(&column.key).unwrap_or(&FieldValue::Null);
            let rendered = write_value(
                worksheet,
                row,
                col_num(c)?,
                column.column_type,
                value,
                &formats,
            )?;
            widths.observe(c, &rendered);
        }
    }

    let hints: Vec<Option<f64>> = columns.iter().map(|c| c.width).collect();
    widths.apply(worksheet, &hints)?;
    worksheet.set_freeze_panes(1, 0)?;

    Ok(workbook.save_to_buffer()?)
}

/// Write one typed cell and return its rendered text (for width fitting).
fn write_value(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    column_type: ColumnType,
    value: &FieldValue,
    formats: &Formats,
) -> Result<String, CoreError> {
    match (column_type, value) {
        (_, FieldValue::Null) => Ok(String::new()),
        (_, FieldValue::Bool(b)) => {
            worksheet.write_boolean(row, col, *b)?;
            Ok(if *b { "TRUE" } else { "FALSE" }.to_string())
        }
        (ColumnType::Number, FieldValue::Number(n)) => write_number(worksheet, row, col, *n, formats),
        (ColumnType::Number, FieldValue::Text(s)) => match s.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => write_number(worksheet, row, col, n, formats),
            _ => write_text(worksheet, row, col, s),
        },
        (ColumnType::Date, FieldValue::Date(d)) => write_date(worksheet, row, col, d, formats),
        (ColumnType::Date, FieldValue::Text(s)) => match parse_date(s.trim()) {
            Some(d) => write_date(worksheet, row, col, &d, formats),
            None => write_text(worksheet, row, col, s),
        },
        _ => write_text(worksheet, row, col, &value.to_display_string()),
    }
}

fn write_text(worksheet: &mut Worksheet, row: u32, col: u16, text: &str) -> Result<String, CoreError> {
    worksheet.write_string(row, col, text)?;
    Ok(text.to_string())
}

fn write_number(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    n: f64,
    formats: &Formats,
) -> Result<String, CoreError> {
    let format = if n.fract() == 0.0 {
        &formats.integer
    } else {
        &formats.decimal
    };
    worksheet.write_number_with_format(row, col, n, format)?;
    Ok(group_thousands(n))
}

fn write_date(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    date: &NaiveDate,
    formats: &Formats,
) -> Result<String, CoreError> {
    worksheet.write_datetime_with_format(row, col, date, &formats.date)?;
    Ok(date.format("%d/%m/%Y").to_string())
}

// ---------------------------------------------------------------------------
// Template
// ---------------------------------------------------------------------------

/// Write the two-sheet import template and return its bytes.
///
/// The Data sheet's example row carries [`EXAMPLE_ROW_MARKER`] in a hidden
/// column after the last data column so the importer can skip it.
pub fn write_template(columns: &[TemplateColumnSpec]) -> Result<Vec<u8>, CoreError> {
    let formats = Formats::new();
    let mut workbook = Workbook::new();

    write_instructions(workbook.add_worksheet(), columns, &formats)?;
    write_template_data(workbook.add_worksheet(), columns, &formats)?;

    Ok(workbook.save_to_buffer()?)
}

fn write_instructions(
    worksheet: &mut Worksheet,
    columns: &[TemplateColumnSpec],
    formats: &Formats,
) -> Result<(), CoreError> {
    worksheet.set_name(INSTRUCTIONS_SHEET)?;
    worksheet.write_string_with_format(0, 0, "Petunjuk Pengisian Template Import", &formats.title)?;

    let mut row = 2usize;
    for line in INSTRUCTION_LINES {
        worksheet.write_string(row_num(row)?, 0, *line)?;
        row += 1;
    }

    row += 1;
    let table_header = ["Kolom", "Wajib", "Contoh", "Tipe"];
    for (c, label) in table_header.iter().enumerate() {
        worksheet.write_string_with_format(row_num(row)?, col_num(c)?, *label, &formats.header)?;
    }

    let mut widths = ColumnWidths::new(table_header);
    for column in columns {
        row += 1;
        let cells = [
            column.column.header.clone(),
            if column.required { "Ya" } else { "Tidak" }.to_string(),
            column.example.clone(),
            column.column.column_type.to_string(),
        ];
        for (c, text) in cells.iter().enumerate() {
            worksheet.write_string(row_num(row)?, col_num(c)?, text)?;
            widths.observe(c, text);
        }
    }
    widths.apply(worksheet, &[])?;
    Ok(())
}

fn write_template_data(
    worksheet: &mut Worksheet,
    columns: &[TemplateColumnSpec],
    formats: &Formats,
) -> Result<(), CoreError> {
    worksheet.set_name(DATA_SHEET)?;

    let headers: Vec<String> = columns.iter().map(TemplateColumnSpec::marked_header).collect();
    let mut widths = ColumnWidths::new(headers.iter().map(String::as_str));

    for (c, (column, header)) in columns.iter().zip(&headers).enumerate() {
        let format = if column.required {
            &formats.required_header
        } else {
            &formats.header
        };
        let col = col_num(c)?;
        worksheet.write_string_with_format(0, col, header, format)?;
        write_example(worksheet, col, column, formats)?;
        widths.observe(c, &column.example);
    }

    let marker_col = col_num(columns.len())?;
    worksheet.write_string(1, marker_col, EXAMPLE_ROW_MARKER)?;
    worksheet.set_column_hidden(marker_col)?;

    let hints: Vec<Option<f64>> = columns.iter().map(|c| c.column.width).collect();
    widths.apply(worksheet, &hints)?;
    worksheet.set_freeze_panes(1, 0)?;
    Ok(())
}

/// Number columns get a numeric example when it parses; everything else is
/// written as text so values like `20240001` keep their form.
fn write_example(
    worksheet: &mut Worksheet,
    col: u16,
    column: &TemplateColumnSpec,
    formats: &Formats,
) -> Result<(), CoreError> {
    let example = column.example.trim();
    match (column.column.column_type, example.parse::<f64>()) {
        (ColumnType::Number, Ok(n)) if n.is_finite() => {
            worksheet.write_number_with_format(1, col, n, &formats.example)?;
        }
        _ => {
            worksheet.write_string_with_format(1, col, &column.example, &formats.example)?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

/// One physical sheet row, cells aligned so that `cells[0]` is column A.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetRow {
    /// 1-based row number as shown by spreadsheet applications.
    pub number: usize,
    pub cells: Vec<RawCell>,
}

/// The rows of the sheet chosen for import, header row included.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetRows {
    pub sheet_name: String,
    pub rows: Vec<SheetRow>,
}

/// Open `.xlsx` bytes and read the `Data` sheet, or the first sheet when
/// there is no `Data` sheet.
pub fn read_rows(bytes: &[u8]) -> Result<SheetRows, CoreError> {
    let mut workbook: Xlsx<Cursor<&[u8]>> = Xlsx::new(Cursor::new(bytes))?;

    let names = workbook.sheet_names();
    let sheet_name = names
        .iter()
        .find(|name| name.as_str() == DATA_SHEET)
        .or_else(|| names.first())
        .cloned()
        .ok_or_else(|| CoreError::Spreadsheet("workbook contains no sheets".into()))?;

    let range = workbook.worksheet_range(&sheet_name)?;
    let (start_row, start_col) = range.start().unwrap_or((0, 0));

    let rows = range
        .rows()
        .enumerate()
        .map(|(i, cells)| {
            let mut aligned = vec![RawCell::Empty; start_col as usize];
            aligned.extend(cells.iter().map(raw_cell));
            SheetRow {
                number: start_row as usize + i + 1,
                cells: aligned,
            }
        })
        .collect();

    Ok(SheetRows { sheet_name, rows })
}

fn raw_cell(data: &Data) -> RawCell {
    match data {
        Data::Empty => RawCell::Empty,
        Data::String(s) => RawCell::Text(s.clone()),
        Data::Float(f) => RawCell::Number(*f),
        Data::Int(i) => RawCell::Number(*i as f64),
        Data::Bool(b) => RawCell::Bool(*b),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| RawCell::Date(d.date()))
            .unwrap_or(RawCell::Empty),
        Data::DateTimeIso(s) => parse_date(s)
            .map(RawCell::Date)
            .unwrap_or_else(|| RawCell::Text(s.clone())),
        Data::DurationIso(s) => RawCell::Text(s.clone()),
        Data::Error(e) => RawCell::Text(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> Vec<ColumnSpec> {
        vec![
            ColumnSpec::new("nis", "NIS", ColumnType::String),
            ColumnSpec::new("amount", "Nominal", ColumnType::Number),
            ColumnSpec::new("dueDate", "Jatuh Tempo", ColumnType::Date),
        ]
    }

    fn record(nis: &str, amount: f64, due: NaiveDate) -> Record {
        [
            ("nis", FieldValue::from(nis)),
            ("amount", FieldValue::Number(amount)),
            ("dueDate", FieldValue::Date(due)),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn written_workbook_reads_back_typed_cells() {
        let due = NaiveDate::from_ymd_opt(2024, 7, 10).unwrap();
        let bytes = write_records(&[record("20240001", 150000.0, due)], &columns(), "Tagihan").unwrap();

        let sheet = read_rows(&bytes).unwrap();
        assert_eq!(sheet.sheet_name, "Tagihan");
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(
            sheet.rows[0].cells,
            vec![
                RawCell::from("NIS"),
                RawCell::from("Nominal"),
                RawCell::from("Jatuh Tempo")
            ]
        );
        assert_eq!(sheet.rows[1].number, 2);
        assert_eq!(sheet.rows[1].cells[0], RawCell::from("20240001"));
        assert_eq!(sheet.rows[1].cells[1], RawCell::Number(150000.0));
        assert_eq!(sheet.rows[1].cells[2], RawCell::Date(due));
    }

    #[test]
    fn null_values_leave_cells_blank() {
        let rec: Record = [("nis", FieldValue::from("20240001"))].into_iter().collect();
        let bytes = write_records(&[rec], &columns(), DATA_SHEET).unwrap();
        let sheet = read_rows(&bytes).unwrap();
        let data_row = &sheet.rows[1];
        assert!(data_row.cells.iter().skip(1).all(RawCell::is_blank));
    }

    #[test]
    fn numeric_text_in_number_column_written_as_number() {
        let rec: Record = [("amount", FieldValue::from("2500"))].into_iter().collect();
        let bytes = write_records(&[rec], &columns(), DATA_SHEET).unwrap();
        let sheet = read_rows(&bytes).unwrap();
        assert_eq!(sheet.rows[1].cells[1], RawCell::Number(2500.0));
    }

    #[test]
    fn template_has_instructions_and_data_sheets() {
        let cols = vec![
            TemplateColumnSpec::new(ColumnSpec::new("nis", "NIS", ColumnType::String), true, "20240001"),
            TemplateColumnSpec::new(ColumnSpec::new("email", "Email", ColumnType::String), false, "wali@contoh.id"),
        ];
        let bytes = write_template(&cols).unwrap();

        let mut workbook: Xlsx<Cursor<&[u8]>> = Xlsx::new(Cursor::new(bytes.as_slice())).unwrap();
        assert_eq!(workbook.sheet_names(), vec![INSTRUCTIONS_SHEET, DATA_SHEET]);

        let instructions = workbook.worksheet_range(INSTRUCTIONS_SHEET).unwrap();
        let texts: Vec<String> = instructions
            .rows()
            .flat_map(|r| r.iter().map(|d| d.to_string()))
            .collect();
        assert!(texts.iter().any(|t| t == "NIS"));
        assert!(texts.iter().any(|t| t == "Ya"));
        assert!(texts.iter().any(|t| t == "wali@contoh.id"));

        let sheet = read_rows(&bytes).unwrap();
        assert_eq!(sheet.sheet_name, DATA_SHEET);
        assert_eq!(sheet.rows[0].cells[0], RawCell::from("NIS *"));
        assert_eq!(sheet.rows[0].cells[1], RawCell::from("Email"));
        assert_eq!(sheet.rows[1].cells[0], RawCell::from("20240001"));
        assert_eq!(sheet.rows[1].cells[2], RawCell::from(EXAMPLE_ROW_MARKER));
    }

    #[test]
    fn garbage_bytes_fail_to_open() {
        let err = read_rows(b"definitely not a zip archive").unwrap_err();
        assert!(matches!(err, CoreError::Spreadsheet(_)));
    }

    #[test]
    fn width_has_floor_and_honours_hint() {
        assert_eq!(column_width(3, None), MIN_COLUMN_WIDTH);
        assert_eq!(column_width(20, None), 22.0);
        assert_eq!(column_width(20, Some(30.0)), 30.0);
        assert_eq!(column_width(20, Some(5.0)), 22.0);
    }

    #[test]
    fn thousands_grouping() {
        assert_eq!(group_thousands(0.0), "0");
        assert_eq!(group_thousands(999.0), "999");
        assert_eq!(group_thousands(1500000.0), "1,500,000");
        assert_eq!(group_thousands(-1234.5), "-1,234.50");
    }

    #[test]
    fn oversized_indices_rejected() {
        assert!(row_num(MAX_ROW_INDEX + 1).is_err());
        assert!(col_num(MAX_COL_INDEX + 1).is_err());
        assert_eq!(col_num(3).unwrap(), 3);
    }
}
