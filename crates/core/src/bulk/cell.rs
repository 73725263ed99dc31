//! Cell validator/coercer: pure logic, no I/O.
//!
//! Turns one raw cell plus one [`ValidationRule`] into either a typed
//! [`FieldValue`] or a human-readable (Indonesian) error message. Failures are
//! returned, never raised, so the row processor can collect every error of a
//! row before deciding its fate.

use std::sync::LazyLock;

use chrono::{Days, NaiveDate, NaiveDateTime};
use regex::Regex;

use super::rules::{FieldType, ValidationRule, Verdict};
use super::types::{format_plain_number, FieldValue, RawCell};

/// Minimum number of digits in a phone number.
pub const PHONE_MIN_DIGITS: usize = 10;

/// Maximum number of digits in a phone number.
pub const PHONE_MAX_DIGITS: usize = 15;

/// Text date layouts accepted on import, tried in order.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d"];

/// Date-time layouts whose date part is kept.
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"];

/// Largest spreadsheet serial date (9999-12-31).
const MAX_SERIAL_DATE: f64 = 2_958_465.0;

/// Serial of the phantom 1900-02-29.
const LEAP_BUG_SERIAL: u64 = 60;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

/// Result of validating one cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellOutcome {
    Valid(FieldValue),
    Invalid(String),
}

impl CellOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }
}

/// Validate and coerce one raw cell against `rule`.
///
/// `row_number` is the physical row of the cell in the source document; it is
/// only used for tracing, the row-level caller owns the `Baris N` prefix.
pub fn validate_cell(raw: &RawCell, rule: &ValidationRule, row_number: usize) -> CellOutcome {
    let outcome = evaluate(raw, rule);
    if let CellOutcome::Invalid(message) = &outcome {
        tracing::trace!(row = row_number, field = %rule.field, %message, "Cell rejected");
    }
    outcome
}

fn evaluate(raw: &RawCell, rule: &ValidationRule) -> CellOutcome {
    let field = &rule.field;

    if raw.is_blank() {
        return if rule.required {
            CellOutcome::Invalid(format!("{field} wajib diisi"))
        } else {
            CellOutcome::Valid(FieldValue::Null)
        };
    }

    let value = match coerce(raw, rule) {
        Ok(v) => v,
        Err(message) => return CellOutcome::Invalid(message),
    };

    if let Err(message) = check_bounds(&value, rule) {
        return CellOutcome::Invalid(message);
    }

    if let Some(pattern) = &rule.pattern {
        if !pattern.is_match(&value.to_display_string()) {
            return CellOutcome::Invalid(format!("{field} format tidak sesuai"));
        }
    }

    if let Some(validator) = &rule.validator {
        match validator.check(&value) {
            Verdict::Valid => {}
            Verdict::Invalid => return CellOutcome::Invalid(format!("{field} tidak valid")),
            Verdict::Message(message) => return CellOutcome::Invalid(message),
        }
    }

    CellOutcome::Valid(value)
}

// ---------------------------------------------------------------------------
// Type coercion
// ---------------------------------------------------------------------------

fn coerce(raw: &RawCell, rule: &ValidationRule) -> Result<FieldValue, String> {
    let field = &rule.field;
    match rule.field_type {
        FieldType::String => {
            let text = raw.to_text().trim().to_string();
            let len = text.chars().count();
            if let Some(min) = rule.min_length {
                if len < min {
                    return Err(format!("{field} minimal {min} karakter"));
                }
            }
            if let Some(max) = rule.max_length {
                if len > max {
                    return Err(format!("{field} maksimal {max} karakter"));
                }
            }
            Ok(FieldValue::Text(text))
        }
        FieldType::Number => coerce_number(raw)
            .map(FieldValue::Number)
            .ok_or_else(|| format!("{field} harus berupa angka")),
        FieldType::Date => coerce_date(raw)
            .map(FieldValue::Date)
            .ok_or_else(|| format!("{field} format tanggal tidak valid")),
        FieldType::Email => {
            let email = raw.to_text().trim().to_lowercase();
            if EMAIL_RE.is_match(&email) {
                Ok(FieldValue::Text(email))
            } else {
                Err(format!("{field} format email tidak valid"))
            }
        }
        FieldType::Phone => {
            let phone = normalize_phone(&raw.to_text());
            let digits = phone.chars().filter(char::is_ascii_digit).count();
            if (PHONE_MIN_DIGITS..=PHONE_MAX_DIGITS).contains(&digits) {
                Ok(FieldValue::Text(phone))
            } else {
                Err(format!(
                    "{field} harus {PHONE_MIN_DIGITS}-{PHONE_MAX_DIGITS} digit"
                ))
            }
        }
    }
}

fn coerce_number(raw: &RawCell) -> Option<f64> {
    match raw {
        RawCell::Number(n) => Some(*n),
        RawCell::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        RawCell::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        RawCell::Date(_) | RawCell::Empty => None,
    }
}

fn coerce_date(raw: &RawCell) -> Option<NaiveDate> {
    match raw {
        RawCell::Date(d) => Some(*d),
        RawCell::Number(n) => date_from_serial(*n),
        RawCell::Text(s) => parse_date(s.trim()),
        RawCell::Bool(_) | RawCell::Empty => None,
    }
}

/// Parse a date from text using the accepted layouts.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| {
            chrono::DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|dt| dt.date_naive())
        })
}

/// Convert a spreadsheet serial day number (1900 date system) to a date.
///
/// The 1900 system counts a 1900-02-29 that never existed (serial 60), so
/// serials below it are one day off the 1899-12-30 epoch and serial 60
/// itself is rejected.
pub fn date_from_serial(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 || serial > MAX_SERIAL_DATE {
        return None;
    }
    let day = serial.floor() as u64;
    let epoch = if day < LEAP_BUG_SERIAL {
        NaiveDate::from_ymd_opt(1899, 12, 31)?
    } else if day == LEAP_BUG_SERIAL {
        return None;
    } else {
        NaiveDate::from_ymd_opt(1899, 12, 30)?
    };
    epoch.checked_add_days(Days::new(day))
}

/// Keep digits, plus a `+` when it leads the trimmed input.
pub fn normalize_phone(input: &str) -> String {
    let trimmed = input.trim();
    let mut out = String::with_capacity(trimmed.len());
    if trimmed.starts_with('+') {
        out.push('+');
    }
    out.extend(trimmed.chars().filter(char::is_ascii_digit));
    out
}

// ---------------------------------------------------------------------------
// Bounds
// ---------------------------------------------------------------------------

fn check_bounds(value: &FieldValue, rule: &ValidationRule) -> Result<(), String> {
    let field = &rule.field;

    if !rule.allowed_values.is_empty() {
        let text = value.to_display_string();
        if !rule.allowed_values.iter().any(|allowed| *allowed == text) {
            return Err(format!(
                "{field} harus salah satu dari: {}",
                rule.allowed_values.join(", ")
            ));
        }
    }

    if let Some(n) = value.as_number() {
        if let Some(min) = rule.min_value {
            if n < min {
                return Err(format!("{field} minimal {}", format_plain_number(min)));
            }
        }
        if let Some(max) = rule.max_value {
            if n > max {
                return Err(format!("{field} maksimal {}", format_plain_number(max)));
            }
        }
    }

    Ok(())
}
