//! Core of bindlist: a small declarative binding layer that keeps a list of
//! validated records in sync with a page through attribute markers.

pub mod app;
pub mod binding;
pub mod bus;
pub mod config;
pub mod controller;
pub mod dom;
pub mod logging;
pub mod model;
pub mod storage;
pub mod view;

pub use app::{App, AppError, AppResult};
pub use binding::{AttributeIndex, BindingDescriptor, BindingError, BindingRole, Bindings};
pub use bus::{BusError, BusResult, ChangeBus, Listener};
pub use config::{AppConfig, ConfigError};
pub use controller::{Action, Controller, SubmitOutcome, UiEvent};
pub use dom::page::build_record_page;
pub use dom::{ArenaDom, Dom, DomError, DomResult, NodeId};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::record::{FieldValue, Record, RecordId, Store};
pub use model::schema::{
    FieldDescriptor, FieldSchema, FieldType, SchemaError, ValidationError, ValidationErrors,
    ValidationRule,
};
pub use model::store::{Model, ModelError, ModelResult, Mutation, RecordChange, StorageKeys};
pub use storage::{KeyValueStore, MemoryStore, SqliteStore, StorageError, StorageResult};
pub use view::{Template, View, ViewError, ViewListeners, ViewResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
