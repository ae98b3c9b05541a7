//! Record store (the Model).
//!
//! # Responsibility
//! - Own records, the id counter, the field schema and persistence.
//! - Publish add/edit/remove/load changes on four independent buses.
//!
//! # Invariants
//! - Every accepted write is validated first; rejected writes mutate nothing.
//! - The counter only grows; ids are never reused after removal.
//! - Every mutation persists the full store and counter immediately.
//! - Construction never fails: unreadable persisted state yields an empty
//!   store and is logged.
//! - The load event is published at most once, by `activate`, and only when
//!   state was restored from persistence.
//! - Listeners run while the store is borrowed and must not call back into it.

use crate::bus::ChangeBus;
use crate::model::record::{FieldValue, Record, RecordId, Store, ID_FIELD};
use crate::model::schema::{FieldSchema, ValidationError, ValidationErrors, ValidationRule};
use crate::storage::{KeyValueStore, StorageError};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ModelResult<T> = Result<T, ModelError>;

/// Payload of add/edit events.
pub type RecordChange = (Record, RecordId);

#[derive(Debug)]
pub enum ModelError {
    NotFound(RecordId),
    Persistence(StorageError),
    Serialization(serde_json::Error),
}

impl Display for ModelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "record not found: {id}"),
            Self::Persistence(err) => write!(f, "{err}"),
            Self::Serialization(err) => write!(f, "record serialization failed: {err}"),
        }
    }
}

impl Error for ModelError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NotFound(_) => None,
            Self::Persistence(err) => Some(err),
            Self::Serialization(err) => Some(err),
        }
    }
}

impl From<StorageError> for ModelError {
    fn from(value: StorageError) -> Self {
        Self::Persistence(value)
    }
}

impl From<serde_json::Error> for ModelError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

/// Names of the two persisted slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageKeys {
    /// Slot holding the JSON store.
    pub data: String,
    /// Slot holding the id counter.
    pub counter: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            data: "bindlist_data".to_string(),
            counter: "bindlist_id".to_string(),
        }
    }
}

/// Outcome of an accepted write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Added(RecordId),
    Edited(RecordId),
}

impl Mutation {
    pub fn id(self) -> RecordId {
        match self {
            Self::Added(id) | Self::Edited(id) => id,
        }
    }
}

/// In-memory record store with validation, persistence and change buses.
pub struct Model<S: KeyValueStore> {
    store: Store,
    counter: RecordId,
    schema: FieldSchema,
    storage: S,
    keys: StorageKeys,
    pending_load: bool,
    on_add: ChangeBus<RecordChange>,
    on_edit: ChangeBus<RecordChange>,
    on_remove: ChangeBus<RecordId>,
    on_load: ChangeBus<Store>,
}

impl<S: KeyValueStore> Model<S> {
    /// Creates a store and hydrates it from `storage` when possible.
    ///
    /// Hydration requires both slots to be present and parseable. Nothing is
    /// published here; call `activate` once listeners are attached.
    pub fn new(storage: S, schema: FieldSchema, keys: StorageKeys) -> Self {
        let mut model = Self {
            store: Store::new(),
            counter: 0,
            schema,
            storage,
            keys,
            pending_load: false,
            on_add: ChangeBus::new(),
            on_edit: ChangeBus::new(),
            on_remove: ChangeBus::new(),
            on_load: ChangeBus::new(),
        };
        model.restore();
        model
    }

    fn restore(&mut self) {
        match read_snapshot(&self.storage, &self.keys) {
            Ok(Some((store, counter))) => {
                let highest = store.keys().next_back().copied().unwrap_or(0);
                if counter < highest {
                    warn!(
                        "event=model_restore module=model status=repaired counter={} highest_id={}",
                        counter, highest
                    );
                }
                self.counter = counter.max(highest);
                self.store = store;
                self.pending_load = true;
                info!(
                    "event=model_restore module=model status=ok records={} counter={}",
                    self.store.len(),
                    self.counter
                );
            }
            Ok(None) => {
                info!("event=model_restore module=model status=empty");
            }
            Err(err) => {
                error!(
                    "event=model_restore module=model status=error error={}",
                    err
                );
            }
        }
    }

    /// Publishes the restored store on the load bus.
    ///
    /// Returns `true` when the event fired. Fires at most once per store and
    /// never when nothing was restored.
    pub fn activate(&mut self) -> bool {
        if !self.pending_load {
            return false;
        }
        self.pending_load = false;
        self.on_load.publish(&self.store);
        true
    }

    /// Returns a copy of record `id` with the id attached as the `id` field.
    ///
    /// # Errors
    /// - `ModelError::NotFound` when no record has this id.
    pub fn get(&self, id: RecordId) -> ModelResult<Record> {
        let mut record = self
            .store
            .get(&id)
            .cloned()
            .ok_or(ModelError::NotFound(id))?;
        record.insert(ID_FIELD, id.to_string());
        Ok(record)
    }

    /// Validates and stores `record`.
    ///
    /// A blank or absent `id` field adds a new record under the next counter
    /// value; any other id replaces (or creates) the entry at that id.
    ///
    /// # Errors
    /// - Returns every validation failure; state is untouched.
    pub fn add(&mut self, mut record: Record) -> Result<Mutation, ValidationErrors> {
        let mut errors = Vec::new();
        let requested_id = match record.remove(ID_FIELD) {
            Some(value) => match parse_record_id(&value) {
                Ok(id) => id,
                Err(error) => {
                    errors.push(error);
                    None
                }
            },
            None => None,
        };
        errors.extend(self.schema.validate(&record));
        if let Some(errors) = ValidationErrors::from_vec(errors) {
            info!(
                "event=record_write module=model status=rejected errors={}",
                errors.len()
            );
            return Err(errors);
        }

        let mutation = match requested_id {
            None => {
                let Some(id) = self.counter.checked_add(1) else {
                    error!(
                        "event=record_write module=model status=rejected reason=ids_exhausted counter={}",
                        self.counter
                    );
                    return Err(ValidationErrors::from(ValidationError::new(
                        ID_FIELD,
                        ValidationRule::Id,
                        "No record ids are left in this store.",
                    )));
                };
                self.counter = id;
                self.store.insert(id, record.clone());
                self.on_add.publish(&(record, id));
                Mutation::Added(id)
            }
            Some(id) => {
                // Explicit ids above the counter still reserve their slot.
                self.counter = self.counter.max(id);
                self.store.insert(id, record.clone());
                self.on_edit.publish(&(record, id));
                Mutation::Edited(id)
            }
        };
        info!(
            "event=record_write module=model status=ok kind={} id={}",
            match mutation {
                Mutation::Added(_) => "add",
                Mutation::Edited(_) => "edit",
            },
            mutation.id()
        );
        self.save();
        Ok(mutation)
    }

    /// Deletes record `id`. Returns `false` (and logs) when it is absent.
    pub fn remove(&mut self, id: RecordId) -> bool {
        if self.store.remove(&id).is_none() {
            warn!(
                "event=record_remove module=model status=not_found id={}",
                id
            );
            return false;
        }
        self.on_remove.publish(&id);
        info!("event=record_remove module=model status=ok id={}", id);
        self.save();
        true
    }

    /// Runs schema validation without touching state.
    pub fn validate(&self, record: &Record) -> Vec<ValidationError> {
        self.schema.validate(record)
    }

    /// Persists the store and counter, logging failures.
    pub fn save(&mut self) {
        if let Err(err) = self.try_save() {
            error!("event=model_save module=model status=error error={}", err);
        }
    }

    /// Persists the store and counter.
    pub fn try_save(&mut self) -> ModelResult<()> {
        let data = serde_json::to_string(&self.store)?;
        let counter = serde_json::to_string(&self.counter)?;
        self.storage.set_item(&self.keys.data, &data)?;
        self.storage.set_item(&self.keys.counter, &counter)?;
        Ok(())
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn counter(&self) -> RecordId {
        self.counter
    }

    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    pub fn keys(&self) -> &StorageKeys {
        &self.keys
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn add_bus(&self) -> &ChangeBus<RecordChange> {
        &self.on_add
    }

    pub fn edit_bus(&self) -> &ChangeBus<RecordChange> {
        &self.on_edit
    }

    pub fn remove_bus(&self) -> &ChangeBus<RecordId> {
        &self.on_remove
    }

    pub fn load_bus(&self) -> &ChangeBus<Store> {
        &self.on_load
    }
}

/// Parses a supplied id field. Blank values mean "no id".
///
/// `RecordId::MAX` itself is refused so the counter always has room for one
/// more add after an explicit id.
fn parse_record_id(value: &FieldValue) -> Result<Option<RecordId>, ValidationError> {
    let invalid = || {
        ValidationError::new(
            ID_FIELD,
            ValidationRule::Id,
            format!("Record id `{value}` is not a valid identifier."),
        )
    };
    match value {
        FieldValue::Null => Ok(None),
        FieldValue::Text(text) if text.trim().is_empty() => Ok(None),
        FieldValue::Text(text) => match text.trim().parse::<RecordId>() {
            Ok(id) if id < RecordId::MAX => Ok(Some(id)),
            _ => Err(invalid()),
        },
        // `RecordId::MAX as f64` rounds up to 2^64, so `<` keeps the cast exact.
        FieldValue::Number(number)
            if number.is_finite()
                && *number >= 0.0
                && number.fract() == 0.0
                && *number < RecordId::MAX as f64 =>
        {
            Ok(Some(*number as RecordId))
        }
        FieldValue::Number(_) => Err(invalid()),
    }
}

#[derive(Debug)]
enum RestoreError {
    Storage(StorageError),
    Data(serde_json::Error),
    Counter(String),
}

impl Display for RestoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Storage(err) => write!(f, "{err}"),
            Self::Data(err) => write!(f, "persisted store is not valid JSON: {err}"),
            Self::Counter(raw) => write!(f, "persisted counter `{raw}` is not a number"),
        }
    }
}

fn read_snapshot<S: KeyValueStore>(
    storage: &S,
    keys: &StorageKeys,
) -> Result<Option<(Store, RecordId)>, RestoreError> {
    let data = storage.get_item(&keys.data).map_err(RestoreError::Storage)?;
    let counter = storage
        .get_item(&keys.counter)
        .map_err(RestoreError::Storage)?;
    let (Some(data), Some(counter)) = (data, counter) else {
        return Ok(None);
    };
    let counter = counter
        .trim()
        .parse::<RecordId>()
        .map_err(|_| RestoreError::Counter(counter.clone()))?;
    let store: Store = serde_json::from_str(&data).map_err(RestoreError::Data)?;
    Ok(Some((store, counter)))
}
