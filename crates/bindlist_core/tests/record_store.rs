use bindlist_core::{
    FieldDescriptor, FieldSchema, FieldValue, KeyValueStore, Listener, MemoryStore, Model,
    ModelError, Mutation, Record, RecordChange, RecordId, StorageError, StorageKeys,
    StorageResult, Store, ValidationRule,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

fn catalog_model(storage: MemoryStore) -> Model<MemoryStore> {
    Model::new(storage, FieldSchema::catalog(), StorageKeys::default())
}

fn book(author: &str, name: &str) -> Record {
    Record::new().with("author", author).with("name", name)
}

/// Slot storage that refuses every write.
#[derive(Default)]
struct ReadOnlyStore {
    inner: MemoryStore,
}

impl KeyValueStore for ReadOnlyStore {
    fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        self.inner.get_item(key)
    }

    fn set_item(&mut self, _key: &str, _value: &str) -> StorageResult<()> {
        Err(StorageError::Unavailable("quota exceeded".to_string()))
    }

    fn remove_item(&mut self, _key: &str) -> StorageResult<()> {
        Err(StorageError::Unavailable("quota exceeded".to_string()))
    }
}

#[test]
fn sequential_adds_assign_increasing_ids() {
    let mut model = catalog_model(MemoryStore::new());

    assert_eq!(model.add(book("Lem", "Solaris")), Ok(Mutation::Added(1)));
    assert_eq!(model.add(book("Lem", "Eden")), Ok(Mutation::Added(2)));
    assert_eq!(model.counter(), 2);
    assert_eq!(
        model.store().keys().copied().collect::<Vec<_>>(),
        vec![1, 2]
    );
}

#[test]
fn edit_replaces_entry_and_keeps_counter() {
    let mut model = catalog_model(MemoryStore::new());
    model
        .add(book("Lem", "Solaris").with("year", 1961_i64))
        .expect("valid record");
    model.add(book("Lem", "Eden")).expect("valid record");

    let edited = model.add(book("Stanislaw Lem", "Solaris").with("id", "1"));

    assert_eq!(edited, Ok(Mutation::Edited(1)));
    assert_eq!(model.counter(), 2);
    let stored = model.get(1).expect("record 1 exists");
    assert_eq!(stored.display("author"), "Stanislaw Lem");
    assert!(!stored.contains("year"), "edit replaces the entry wholesale");
}

#[test]
fn get_attaches_id_and_reports_missing_records() {
    let mut model = catalog_model(MemoryStore::new());
    model.add(book("Lem", "Solaris")).expect("valid record");

    let record = model.get(1).expect("record 1 exists");
    assert_eq!(record.get("id"), Some(&FieldValue::from("1")));
    assert!(!model.store()[&1].contains("id"));

    assert!(matches!(model.get(9), Err(ModelError::NotFound(9))));
}

#[test]
fn maxlength_violation_yields_one_error_and_no_change() {
    let schema = FieldSchema::default().with_field("name", FieldDescriptor::text(Some(5), true));
    let mut model = Model::new(MemoryStore::new(), schema, StorageKeys::default());

    let errors = model
        .add(Record::new().with("name", "toolong"))
        .expect_err("name is too long");

    assert_eq!(errors.len(), 1);
    assert_eq!(errors.as_slice()[0].rule, ValidationRule::MaxLength);
    assert!(model.is_empty());
    assert_eq!(model.counter(), 0);
    assert!(model.storage().is_empty(), "rejected input is not persisted");
}

#[test]
fn invalid_id_is_reported_with_field_errors() {
    let mut model = catalog_model(MemoryStore::new());

    let errors = model
        .add(book("", "Solaris").with("id", "abc"))
        .expect_err("id and author are invalid");

    let rules: Vec<ValidationRule> = errors.iter().map(|error| error.rule).collect();
    assert_eq!(rules, vec![ValidationRule::Id, ValidationRule::Required]);
    assert!(model.is_empty());
}

#[test]
fn add_then_remove_notifies_remove_listener_once() {
    let mut model = catalog_model(MemoryStore::new());
    let removed: Rc<RefCell<Vec<RecordId>>> = Rc::default();
    let sink = Rc::clone(&removed);
    let listener = Listener::new(move |id: &RecordId| sink.borrow_mut().push(*id));
    model.remove_bus().subscribe(&listener);

    let id = model.add(book("Lem", "Solaris")).expect("valid").id();
    assert!(model.remove(id));

    assert!(model.is_empty());
    assert_eq!(*removed.borrow(), vec![id]);
}

#[test]
fn remove_of_missing_id_changes_nothing() {
    let mut model = catalog_model(MemoryStore::new());
    model.add(book("Lem", "Solaris")).expect("valid");
    let calls = Rc::new(Cell::new(0));
    let counter = Rc::clone(&calls);
    let listener = Listener::new(move |_: &RecordId| counter.set(counter.get() + 1));
    model.remove_bus().subscribe(&listener);
    let before = model.store().clone();

    assert!(!model.remove(42));

    assert_eq!(model.store(), &before);
    assert_eq!(calls.get(), 0);
}

#[test]
fn add_and_edit_publish_on_separate_buses() {
    let mut model = catalog_model(MemoryStore::new());
    let events: Rc<RefCell<Vec<String>>> = Rc::default();
    let on_add = {
        let events = Rc::clone(&events);
        Listener::new(move |(_, id): &RecordChange| events.borrow_mut().push(format!("add:{id}")))
    };
    let on_edit = {
        let events = Rc::clone(&events);
        Listener::new(move |(_, id): &RecordChange| events.borrow_mut().push(format!("edit:{id}")))
    };
    model.add_bus().subscribe(&on_add);
    model.edit_bus().subscribe(&on_edit);

    model.add(book("Lem", "Solaris")).expect("valid");
    model
        .add(book("Lem", "Solaris").with("id", 1_i64))
        .expect("valid");

    assert_eq!(*events.borrow(), vec!["add:1", "edit:1"]);
}

#[test]
fn restore_then_activate_publishes_load_once() {
    let mut seed = catalog_model(MemoryStore::new());
    for name in ["Solaris", "Eden", "Fiasco"] {
        seed.add(book("Lem", name)).expect("valid");
    }
    let mut model = catalog_model(seed.into_storage());

    let loads: Rc<RefCell<Vec<Vec<RecordId>>>> = Rc::default();
    let sink = Rc::clone(&loads);
    let listener = Listener::new(move |store: &Store| {
        sink.borrow_mut().push(store.keys().copied().collect())
    });
    model.load_bus().subscribe(&listener);

    assert_eq!(model.counter(), 3);
    assert!(loads.borrow().is_empty(), "restore alone publishes nothing");
    assert!(model.activate());
    assert!(!model.activate());
    assert_eq!(*loads.borrow(), vec![vec![1, 2, 3]]);
}

#[test]
fn empty_storage_never_publishes_load() {
    let mut model = catalog_model(MemoryStore::new());
    assert!(!model.activate());
    assert_eq!(model.counter(), 0);
}

#[test]
fn corrupt_counter_starts_empty() {
    let mut storage = MemoryStore::new();
    storage.set_item("bindlist_data", r#"{"1":{"name":"Solaris"}}"#).expect("seed");
    storage.set_item("bindlist_id", "not a number").expect("seed");

    let mut model = catalog_model(storage);

    assert!(model.is_empty());
    assert_eq!(model.counter(), 0);
    assert!(!model.activate());
}

#[test]
fn restored_counter_below_highest_id_is_repaired() {
    let mut storage = MemoryStore::new();
    storage
        .set_item("bindlist_data", r#"{"4":{"author":"Lem","name":"Solaris"}}"#)
        .expect("seed");
    storage.set_item("bindlist_id", "1").expect("seed");

    let mut model = catalog_model(storage);

    assert_eq!(model.counter(), 4);
    assert_eq!(model.add(book("Lem", "Eden")), Ok(Mutation::Added(5)));
}

#[test]
fn custom_storage_keys_are_honoured() {
    let keys = StorageKeys {
        data: "books".to_string(),
        counter: "books_seq".to_string(),
    };
    let mut model = Model::new(MemoryStore::new(), FieldSchema::catalog(), keys);
    model.add(book("Lem", "Solaris")).expect("valid");

    let storage = model.into_storage();
    assert!(storage.get_item("books").expect("read").is_some());
    assert_eq!(storage.get_item("books_seq").expect("read").as_deref(), Some("1"));
    assert_eq!(storage.get_item("bindlist_data").expect("read"), None);
}

#[test]
fn storage_failures_are_logged_not_propagated() {
    let mut model = Model::new(
        ReadOnlyStore::default(),
        FieldSchema::catalog(),
        StorageKeys::default(),
    );

    assert_eq!(model.add(book("Lem", "Solaris")), Ok(Mutation::Added(1)));
    assert_eq!(model.len(), 1);
    assert!(model.remove(1));
    assert!(matches!(
        model.try_save(),
        Err(ModelError::Persistence(StorageError::Unavailable(_)))
    ));
}

#[test]
fn explicit_max_id_is_rejected_and_counter_untouched() {
    let mut model = catalog_model(MemoryStore::new());

    let errors = model
        .add(book("Lem", "Solaris").with("id", u64::MAX.to_string()))
        .expect_err("no headroom above this id");
    assert_eq!(errors.as_slice()[0].rule, ValidationRule::Id);

    let errors = model
        .add(book("Lem", "Solaris").with("id", 1e20))
        .expect_err("beyond the id range");
    assert_eq!(errors.as_slice()[0].rule, ValidationRule::Id);

    assert_eq!(model.counter(), 0);
    assert_eq!(model.add(book("Lem", "Eden")), Ok(Mutation::Added(1)));
}

#[test]
fn exhausted_counter_rejects_new_records_without_overwriting() {
    let mut model = catalog_model(MemoryStore::new());
    let last = u64::MAX - 1;
    assert_eq!(
        model.add(book("Lem", "Solaris").with("id", last.to_string())),
        Ok(Mutation::Edited(last))
    );
    assert_eq!(model.counter(), last);

    assert_eq!(model.add(book("Lem", "Eden")), Ok(Mutation::Added(u64::MAX)));
    let errors = model
        .add(book("Lem", "Fiasco"))
        .expect_err("ids are exhausted");

    assert_eq!(errors.len(), 1);
    assert_eq!(errors.as_slice()[0].rule, ValidationRule::Id);
    assert_eq!(model.counter(), u64::MAX);
    assert_eq!(model.len(), 2);
    assert!(model.get(0).is_err());
}

#[test]
fn restored_max_counter_does_not_wrap() {
    let mut storage = MemoryStore::new();
    storage.set_item("bindlist_data", "{}").expect("seed");
    storage
        .set_item("bindlist_id", &u64::MAX.to_string())
        .expect("seed");

    let mut model = catalog_model(storage);

    assert_eq!(model.counter(), u64::MAX);
    let errors = model
        .add(book("Lem", "Solaris"))
        .expect_err("ids are exhausted");
    assert_eq!(errors.as_slice()[0].rule, ValidationRule::Id);
    assert!(model.is_empty());
}

#[test]
fn infinite_number_is_rejected_so_restore_matches_save() {
    let schema = FieldSchema::new().with_field("pages", FieldDescriptor::number(None, false));
    let mut model = Model::new(MemoryStore::new(), schema.clone(), StorageKeys::default());

    let errors = model
        .add(Record::new().with("pages", f64::INFINITY))
        .expect_err("infinity has no persisted form");
    assert_eq!(errors.as_slice()[0].rule, ValidationRule::Type);

    model
        .add(Record::new().with("pages", 387.5))
        .expect("finite numbers persist");
    let saved = model.store().clone();

    let restored = Model::new(model.into_storage(), schema, StorageKeys::default());
    assert_eq!(restored.store(), &saved);
}
