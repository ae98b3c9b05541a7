//! Record domain model.
//!
//! # Responsibility
//! - Define the flat record shape shared by store, view and controller.
//! - Define the JSON wire shape of records and the id-keyed store.
//!
//! # Invariants
//! - `RecordId` values are assigned by the store counter and never reused.
//! - The `id` field is not part of a stored record body; it is attached on
//!   read and consumed on write.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// Synthetic record identifier.
pub type RecordId = u64;

/// Id-keyed record mapping. Serialized as a JSON object with decimal keys.
pub type Store = BTreeMap<RecordId, Record>;

/// Field name under which the record id travels on read and write.
pub const ID_FIELD: &str = "id";

/// Scalar field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    /// Absent value: a blank numeric input, or a NaN that went through JSON.
    Null,
}

impl FieldValue {
    /// Schema type name of this value, `None` for `Null`.
    pub fn type_name(&self) -> Option<&'static str> {
        match self {
            Self::Text(_) => Some("string"),
            Self::Number(_) => Some("number"),
            Self::Null => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }

    /// `Null`, empty text and NaN carry no value.
    pub fn is_missing(&self) -> bool {
        match self {
            Self::Text(value) => value.is_empty(),
            Self::Number(value) => value.is_nan(),
            Self::Null => true,
        }
    }
}

impl Display for FieldValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(value) => write!(f, "{value}"),
            Self::Number(value) if value.is_finite() && value.fract() == 0.0 => {
                write!(f, "{value:.0}")
            }
            Self::Number(value) => write!(f, "{value}"),
            Self::Null => Ok(()),
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

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

/// One flat record: field name → scalar value, iterated in field-name order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, FieldValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn remove(&mut self, field: &str) -> Option<FieldValue> {
        self.fields.remove(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Display text for `field`; missing fields render empty.
    pub fn display(&self, field: &str) -> String {
        self.fields
            .get(field)
            .map(ToString::to_string)
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields
            .iter()
            .map(|(field, value)| (field.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(field, value)| (field.into(), value.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FieldValue, Record, Store};

    #[test]
    fn display_renders_integral_numbers_without_fraction() {
        assert_eq!(FieldValue::from(1999_i64).to_string(), "1999");
        assert_eq!(FieldValue::from(0.5).to_string(), "0.5");
        assert_eq!(FieldValue::Null.to_string(), "");
        assert_eq!(FieldValue::from("Tolkien").to_string(), "Tolkien");
    }

    #[test]
    fn missing_values_cover_null_empty_and_nan() {
        assert!(FieldValue::Null.is_missing());
        assert!(FieldValue::from("").is_missing());
        assert!(FieldValue::Number(f64::NAN).is_missing());
        assert!(!FieldValue::from(0_i64).is_missing());
    }

    #[test]
    fn store_serializes_with_decimal_keys_and_untagged_values() {
        let mut store = Store::new();
        store.insert(
            3,
            Record::new()
                .with("author", "Le Guin")
                .with("year", 1969_i64)
                .with("pages", FieldValue::Null),
        );

        let json = serde_json::to_value(&store).expect("store should serialize");
        assert_eq!(json["3"]["author"], "Le Guin");
        assert_eq!(json["3"]["year"], 1969.0);
        assert!(json["3"]["pages"].is_null());

        let decoded: Store = serde_json::from_value(json).expect("store should deserialize");
        assert_eq!(decoded, store);
    }

    #[test]
    fn display_of_absent_field_is_empty() {
        let record = Record::new().with("name", "Dune");
        assert_eq!(record.display("name"), "Dune");
        assert_eq!(record.display("author"), "");
    }
}
