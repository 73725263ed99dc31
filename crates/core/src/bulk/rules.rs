//! Validation rule types.
//!
//! A [`ValidationRule`] is the contract one field of an imported row must
//! satisfy. Rules are plain data so each flow (students, teachers, bills) can
//! ship its own set, including as JSON; only the custom predicate is
//! code-only.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::types::FieldValue;
use crate::error::CoreError;

/// Declared type of an imported field. Drives coercion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    String,
    Number,
    Date,
    Email,
    Phone,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Date => "date",
            Self::Email => "email",
            Self::Phone => "phone",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Custom predicates
// ---------------------------------------------------------------------------

/// Answer of a custom field predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Valid,
    /// Rejected with the generic "tidak valid" message.
    Invalid,
    /// Rejected with this message.
    Message(String),
}

impl From<bool> for Verdict {
    fn from(ok: bool) -> Self {
        if ok {
            Self::Valid
        } else {
            Self::Invalid
        }
    }
}

/// A caller-supplied predicate run on the coerced value.
#[derive(Clone)]
pub struct CustomValidator(Arc<dyn Fn(&FieldValue) -> Verdict + Send + Sync>);

impl CustomValidator {
    pub fn new(check: impl Fn(&FieldValue) -> Verdict + Send + Sync + 'static) -> Self {
        Self(Arc::new(check))
    }

    pub fn check(&self, value: &FieldValue) -> Verdict {
        (self.0)(value)
    }
}

impl fmt::Debug for CustomValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CustomValidator(..)")
    }
}

// ---------------------------------------------------------------------------
// Rule
// ---------------------------------------------------------------------------

/// The contract a single field of an imported row must satisfy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRule {
    /// Field name. Unique within a rule set; also the key in the output record.
    pub field: String,
    #[serde(default)]
    pub required: bool,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    /// Must match the coerced value's text form.
    #[serde(default, with = "pattern_serde", skip_serializing_if = "Option::is_none")]
    pub pattern: Option<Regex>,
    /// When non-empty, the coerced value's text form must be one of these.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_values: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
    #[serde(skip)]
    pub validator: Option<CustomValidator>,
}

impl ValidationRule {
    pub fn new(field: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            field: field.into(),
            required: false,
            field_type,
            min_length: None,
            max_length: None,
            pattern: None,
            allowed_values: Vec::new(),
            min_value: None,
            max_value: None,
            validator: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn min_length(mut self, n: usize) -> Self {
        self.min_length = Some(n);
        self
    }

    pub fn max_length(mut self, n: usize) -> Self {
        self.max_length = Some(n);
        self
    }

    pub fn pattern(mut self, pattern: Regex) -> Self {
        self.pattern = Some(pattern);
        self
    }

    pub fn one_of<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_values = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn min_value(mut self, n: f64) -> Self {
        self.min_value = Some(n);
        self
    }

    pub fn max_value(mut self, n: f64) -> Self {
        self.max_value = Some(n);
        self
    }

    pub fn validator(
        mut self,
        check: impl Fn(&FieldValue) -> Verdict + Send + Sync + 'static,
    ) -> Self {
        self.validator = Some(CustomValidator::new(check));
        self
    }
}

/// Check that a rule set is internally consistent.
pub fn validate_rules(rules: &[ValidationRule]) -> Result<(), CoreError> {
    let mut seen = HashSet::new();
    for (i, rule) in rules.iter().enumerate() {
        if rule.field.trim().is_empty() {
            return Err(CoreError::Validation(format!(
                "Rule at index {i} has an empty field name"
            )));
        }
        if !seen.insert(rule.field.as_str()) {
            return Err(CoreError::Validation(format!(
                "Duplicate rule for field '{}'",
                rule.field
            )));
        }
        if let (Some(min), Some(max)) = (rule.min_length, rule.max_length) {
            if min > max {
                return Err(CoreError::Validation(format!(
                    "Rule '{}' has minLength {min} greater than maxLength {max}",
                    rule.field
                )));
            }
        }
        if let (Some(min), Some(max)) = (rule.min_value, rule.max_value) {
            if min > max {
                return Err(CoreError::Validation(format!(
                    "Rule '{}' has minValue {min} greater than maxValue {max}",
                    rule.field
                )));
            }
        }
    }
    Ok(())
}

/// Regexes travel as strings and are compiled on deserialization.
mod pattern_serde {
    use regex::Regex;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Regex>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(re) => s.serialize_str(re.as_str()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Regex>, D::Error> {
        Option::<String>::deserialize(d)?
            .map(|p| Regex::new(&p).map_err(|e| D::Error::custom(format!("invalid pattern: {e}"))))
            .transpose()
    }
}
