//! Field schema and record validation.
//!
//! # Responsibility
//! - Describe per-field constraints (type, max length, range, required).
//! - Validate records against the schema, accumulating every failure.
//!
//! # Invariants
//! - Fields unknown to the schema are never reported.
//! - Checks run in `type, maxlength, range, required` order and are
//!   independent: one field can collect several errors.
//! - `Null` values are absent: only `required` can flag them.
//! - A numeric `0` satisfies `required`.

use crate::model::record::Record;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Declared scalar type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
}

impl FieldType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
        }
    }
}

/// Constraints for one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    #[serde(rename = "type")]
    pub kind: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maxlength: Option<usize>,
    /// Inclusive `[min, max]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<[f64; 2]>,
    #[serde(default)]
    pub required: bool,
}

impl FieldDescriptor {
    pub fn text(maxlength: Option<usize>, required: bool) -> Self {
        Self {
            kind: FieldType::String,
            maxlength,
            range: None,
            required,
        }
    }

    pub fn number(range: Option<[f64; 2]>, required: bool) -> Self {
        Self {
            kind: FieldType::Number,
            maxlength: None,
            range,
            required,
        }
    }
}

/// Which descriptor check produced a validation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationRule {
    Type,
    MaxLength,
    Range,
    Required,
    /// Supplied record id is not a valid identifier.
    Id,
}

/// One failed check on one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub field: String,
    pub rule: ValidationRule,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &str, rule: ValidationRule, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            rule,
            message: message.into(),
        }
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for ValidationError {}

/// Non-empty list of validation failures returned by a rejected write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    /// Returns `None` for an empty list.
    pub fn from_vec(errors: Vec<ValidationError>) -> Option<Self> {
        if errors.is_empty() {
            None
        } else {
            Some(Self(errors))
        }
    }

    pub fn as_slice(&self) -> &[ValidationError] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<ValidationError> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ValidationError> {
        self.0.iter()
    }

    pub fn messages(&self) -> Vec<String> {
        self.0.iter().map(|error| error.message.clone()).collect()
    }
}

impl Display for ValidationErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.messages().join("; "))
    }
}

impl Error for ValidationErrors {}

impl From<ValidationError> for ValidationErrors {
    fn from(value: ValidationError) -> Self {
        Self(vec![value])
    }
}

impl<'a> IntoIterator for &'a ValidationErrors {
    type Item = &'a ValidationError;
    type IntoIter = std::slice::Iter<'a, ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Schema declaration errors.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaError {
    InvertedRange { field: String, min: f64, max: f64 },
    EmptyFieldName,
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvertedRange { field, min, max } => {
                write!(f, "range of field `{field}` is inverted: [{min}, {max}]")
            }
            Self::EmptyFieldName => write!(f, "schema field name must not be empty"),
        }
    }
}

impl Error for SchemaError {}

/// Field name → constraints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldSchema {
    fields: BTreeMap<String, FieldDescriptor>,
}

impl FieldSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Book catalog schema: author, name, year, pages.
    pub fn catalog() -> Self {
        Self::new()
            .with_field("author", FieldDescriptor::text(Some(40), true))
            .with_field("name", FieldDescriptor::text(Some(60), true))
            .with_field("year", FieldDescriptor::number(Some([0.0, 3000.0]), false))
            .with_field("pages", FieldDescriptor::number(Some([0.0, 10000.0]), false))
    }

    pub fn with_field(mut self, name: impl Into<String>, descriptor: FieldDescriptor) -> Self {
        self.fields.insert(name.into(), descriptor);
        self
    }

    pub fn get(&self, field: &str) -> Option<&FieldDescriptor> {
        self.fields.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldDescriptor)> {
        self.fields
            .iter()
            .map(|(name, descriptor)| (name.as_str(), descriptor))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Checks declaration-level invariants.
    pub fn check(&self) -> Result<(), SchemaError> {
        for (name, descriptor) in &self.fields {
            if name.trim().is_empty() {
                return Err(SchemaError::EmptyFieldName);
            }
            if let Some([min, max]) = descriptor.range {
                if min > max {
                    return Err(SchemaError::InvertedRange {
                        field: name.clone(),
                        min,
                        max,
                    });
                }
            }
        }
        Ok(())
    }

    /// Validates every schema-known field present in `record`.
    pub fn validate(&self, record: &Record) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        for (field, value) in record.iter() {
            let Some(descriptor) = self.fields.get(field) else {
                continue;
            };

            if let Some(actual) = value.type_name() {
                // Non-finite numbers have no JSON form and would not survive a save.
                let non_finite = value.as_number().is_some_and(|number| !number.is_finite());
                if actual != descriptor.kind.as_str() || non_finite {
                    errors.push(ValidationError::new(
                        field,
                        ValidationRule::Type,
                        format!(
                            "Wrong data type in field {field}. Expected: {}",
                            descriptor.kind.as_str()
                        ),
                    ));
                }
            }

            if let (Some(maxlength), Some(text)) = (descriptor.maxlength, value.as_text()) {
                if text.chars().count() > maxlength {
                    errors.push(ValidationError::new(
                        field,
                        ValidationRule::MaxLength,
                        format!("Field {field} must not exceed {maxlength} characters."),
                    ));
                }
            }

            if let (Some([min, max]), Some(number)) = (descriptor.range, value.as_number()) {
                if number < min || number > max {
                    errors.push(ValidationError::new(
                        field,
                        ValidationRule::Range,
                        format!("Value of field {field} looks implausible (expected {min}..={max})."),
                    ));
                }
            }

            if descriptor.required && value.is_missing() {
                errors.push(ValidationError::new(
                    field,
                    ValidationRule::Required,
                    format!("Field {field} is required."),
                ));
            }
        }
        errors
    }
}
