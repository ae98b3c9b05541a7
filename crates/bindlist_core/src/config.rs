//! Application configuration.
//!
//! # Responsibility
//! - Collect the binding descriptors, field schema, storage slot names and
//!   highlight class into one deserializable value.
//! - Validate configuration before any component is constructed.
//!
//! # Invariants
//! - Omitted keys fall back to the catalog defaults.
//! - A config that passes `validate` always resolves to a full `Bindings`.

use crate::binding::{BindingDescriptor, BindingError, Bindings};
use crate::model::schema::{FieldSchema, SchemaError};
use crate::model::store::StorageKeys;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const DEFAULT_HIGHLIGHT_CLASS: &str = "info";

#[derive(Debug)]
pub enum ConfigError {
    Json(serde_json::Error),
    Binding(BindingError),
    Schema(SchemaError),
    InvalidHighlightClass(String),
    InvalidStorageKeys(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(err) => write!(f, "invalid config json: {err}"),
            Self::Binding(err) => write!(f, "{err}"),
            Self::Schema(err) => write!(f, "{err}"),
            Self::InvalidHighlightClass(value) => {
                write!(f, "highlight class must be one non-empty token, got `{value}`")
            }
            Self::InvalidStorageKeys(message) => write!(f, "invalid storage keys: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
            Self::Binding(err) => Some(err),
            Self::Schema(err) => Some(err),
            Self::InvalidHighlightClass(_) | Self::InvalidStorageKeys(_) => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<BindingError> for ConfigError {
    fn from(value: BindingError) -> Self {
        Self::Binding(value)
    }
}

impl From<SchemaError> for ConfigError {
    fn from(value: SchemaError) -> Self {
        Self::Schema(value)
    }
}

/// Everything needed to bootstrap one application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub bindings: Vec<BindingDescriptor>,
    pub schema: FieldSchema,
    pub storage_keys: StorageKeys,
    pub highlight_class: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bindings: Bindings::default().descriptors(),
            schema: FieldSchema::catalog(),
            storage_keys: StorageKeys::default(),
            highlight_class: DEFAULT_HIGHLIGHT_CLASS.to_string(),
        }
    }
}

impl AppConfig {
    /// Parses and validates a JSON config document.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every section; returns the resolved bindings.
    pub fn validate(&self) -> Result<Bindings, ConfigError> {
        let bindings = Bindings::from_descriptors(&self.bindings)?;
        self.schema.check()?;

        let class = self.highlight_class.trim();
        if class.is_empty() || class.split_whitespace().count() != 1 {
            return Err(ConfigError::InvalidHighlightClass(
                self.highlight_class.clone(),
            ));
        }

        let keys = &self.storage_keys;
        if keys.data.trim().is_empty() || keys.counter.trim().is_empty() {
            return Err(ConfigError::InvalidStorageKeys(
                "slot names must not be empty".to_string(),
            ));
        }
        if keys.data == keys.counter {
            return Err(ConfigError::InvalidStorageKeys(format!(
                "data and counter share slot `{}`",
                keys.data
            )));
        }

        Ok(bindings)
    }
}
