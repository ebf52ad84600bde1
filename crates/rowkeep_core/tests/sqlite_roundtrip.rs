mod support;

use rowkeep_core::{
    open_adapter, AdapterError, AdapterRegistry, Backend, Collection, DatabaseAdapter,
    DatabaseConfig, SortDirection, SqlValue, SqliteAdapter, SqliteConfig, DEFAULT_CONNECTION,
};
use support::{Widget, WIDGET_SCHEMA};

fn registry_with_schema() -> AdapterRegistry {
    let mut db = SqliteAdapter::open_in_memory().unwrap();
    db.execute(WIDGET_SCHEMA).unwrap();
    AdapterRegistry::with_default(Box::new(db))
}

fn db(registry: &mut AdapterRegistry) -> &mut dyn DatabaseAdapter {
    registry.get_mut(DEFAULT_CONNECTION).unwrap()
}

fn row_count(registry: &mut AdapterRegistry) -> Option<i64> {
    db(registry)
        .scalar("SELECT COUNT(*) FROM widgets")
        .and_then(|count| count.as_i64())
}

fn seed(registry: &mut AdapterRegistry, widgets: &[(&str, i64)]) {
    let mut collection = Collection::new();
    for (name, value) in widgets {
        collection.add(Widget::new(name, *value));
    }
    assert!(collection.save(registry).unwrap());
}

#[test]
fn saved_widgets_come_back_from_a_fresh_load() {
    let mut registry = registry_with_schema();
    let mut widgets = Collection::new();
    let bolt = widgets.add(Widget::new("bolt", 3));
    let nut = widgets.add(Widget::new("nut", 1));

    assert!(widgets.save(&mut registry).unwrap());
    assert_eq!(bolt.borrow().id, Some(1));
    assert_eq!(nut.borrow().id, Some(2));
    assert_eq!(widgets.keys().collect::<Vec<_>>(), ["1", "2"]);

    let mut loaded = Collection::<Widget>::new();
    assert!(loaded.load(&mut registry).unwrap());
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded.get("2").unwrap().borrow().name, "nut");
    assert_eq!(loaded.get("1").unwrap().borrow().value, 3);
}

#[test]
fn updates_and_deletions_are_persisted() {
    let mut registry = registry_with_schema();
    seed(&mut registry, &[("bolt", 3), ("nut", 1)]);

    let mut widgets = Collection::<Widget>::new();
    widgets.load(&mut registry).unwrap();
    widgets.get("1").unwrap().borrow_mut().value = 30;
    let nut = widgets.get("2").unwrap();
    nut.borrow_mut().deleted = true;
    widgets.remove(&nut).unwrap();

    assert!(widgets.save(&mut registry).unwrap());
    assert_eq!(db(&mut registry).affected_row_count(), 1);
    assert_eq!(row_count(&mut registry), Some(1));

    let mut reloaded = Collection::<Widget>::new();
    reloaded.load(&mut registry).unwrap();
    assert_eq!(reloaded.len(), 1);
    assert_eq!(reloaded.first().unwrap().borrow().value, 30);
}

#[test]
fn partial_failure_keeps_successful_saves() {
    let mut registry = registry_with_schema();
    let mut widgets = Collection::new();
    let good = widgets.add(Widget::new("bolt", 5));
    let bad = widgets.add(Widget::new("nut", -1));

    assert!(!widgets.save(&mut registry).unwrap());
    assert_eq!(good.borrow().id, Some(1));
    assert!(bad.borrow().id.is_none());
    assert!(db(&mut registry)
        .last_error()
        .unwrap()
        .contains("CHECK constraint failed"));

    assert!(widgets.contains_key("1"));
    assert_eq!(widgets.len(), 2);
    assert_eq!(row_count(&mut registry), Some(1));
}

#[test]
fn caller_transaction_makes_save_atomic() {
    let mut registry = registry_with_schema();
    let mut widgets = Collection::new();
    widgets.add(Widget::new("bolt", 5));
    widgets.add(Widget::new("nut", -1));

    db(&mut registry).start_transaction();
    let saved = widgets.save(&mut registry).unwrap();
    {
        let db = db(&mut registry);
        assert!(!saved);
        assert!(db
            .last_error()
            .unwrap()
            .starts_with("Transaction Failed with SQLite error: "));
        db.rollback();
        assert_eq!(db.transaction_depth(), 0);
    }
    assert_eq!(row_count(&mut registry), Some(0));
}

#[test]
fn filtered_loads() {
    let mut registry = registry_with_schema();
    seed(
        &mut registry,
        &[("bolt", 3), ("nut", 1), ("washer", 9), ("bolt", 7)],
    );

    let mut bolts = Collection::<Widget>::new();
    assert!(bolts
        .load_by_hash(&mut registry, [("name", "bolt")])
        .unwrap());
    assert_eq!(bolts.keys().collect::<Vec<_>>(), ["1", "4"]);

    let mut picked = Collection::<Widget>::new();
    assert!(picked
        .load_by_ids(&mut registry, [2, 3], None)
        .unwrap());
    assert_eq!(picked.keys().collect::<Vec<_>>(), ["2", "3"]);

    let mut heavy = Collection::<Widget>::new();
    assert!(heavy
        .load_by_prepared_stmt(
            &mut registry,
            "SELECT * FROM widgets WHERE value > ? ORDER BY value DESC",
            &[SqlValue::Int(5)],
            "i",
        )
        .unwrap());
    assert_eq!(heavy.keys().collect::<Vec<_>>(), ["3", "4"]);
}

#[test]
fn loaded_collection_sorts_and_projects() {
    let mut registry = registry_with_schema();
    seed(&mut registry, &[("bolt", 3), ("nut", 1), ("washer", 2)]);

    let mut widgets = Collection::<Widget>::new();
    widgets
        .load_by_sql(&mut registry, "SELECT * FROM widgets ORDER BY name DESC")
        .unwrap();
    assert_eq!(widgets.last().unwrap().borrow().name, "bolt");

    widgets
        .sort_by_method("value", SortDirection::Ascending)
        .unwrap();
    let names = widgets
        .key_values("name", Some("value"))
        .unwrap()
        .collect::<Vec<_>>();
    assert_eq!(
        names,
        [
            (SqlValue::Int(1), SqlValue::from("nut")),
            (SqlValue::Int(2), SqlValue::from("washer")),
            (SqlValue::Int(3), SqlValue::from("bolt")),
        ]
    );

    let mut cursor = widgets.iter();
    assert!(cursor.seek(2));
    assert_eq!(cursor.current().unwrap().0, "1");
    assert!(!cursor.seek(3));
    assert!(cursor.next().is_none());
}

#[test]
fn failing_statement_leaves_collection_untouched() {
    let mut registry = registry_with_schema();
    let mut widgets = Collection::<Widget>::new();
    assert!(!widgets
        .load_by_sql(&mut registry, "SELECT * FROM gadgets")
        .unwrap());
    assert!(widgets.is_empty());
    assert!(db(&mut registry)
        .last_error()
        .unwrap()
        .contains("no such table"));
}

#[test]
fn sqlite_dialect() {
    let mut db = SqliteAdapter::open_in_memory().unwrap();
    assert_eq!(db.backend(), Backend::Sqlite);
    assert_eq!(db.quote(&SqlValue::from("it's")), "'it''s'");
    assert_eq!(db.quote(&SqlValue::Null), "NULL");
    assert_eq!(db.quote_identifier("we\"ird"), "\"weird\"");
    assert!(db.can_execute_prepared());
    assert!(matches!(
        db.found_row_count(),
        Err(AdapterError::Unsupported {
            backend: Backend::Sqlite,
            ..
        })
    ));
    assert!(db.select_database("main"));
    assert!(!db.select_database("warehouse"));
    assert_eq!(db.database_name(), Some("main"));
}

#[test]
fn blob_literals_and_parameters_keep_their_bytes() {
    let mut db = SqliteAdapter::open_in_memory().unwrap();
    let bytes = SqlValue::Blob(vec![0xff, 0xfe, 0x41]);
    let literal = db.quote(&bytes);
    assert_eq!(literal, "X'fffe41'");
    assert_eq!(db.scalar(&format!("SELECT {literal}")), Some(bytes.clone()));

    db.execute("CREATE TABLE payloads (data BLOB)").unwrap();
    db.execute_prepared(
        "INSERT INTO payloads (data) VALUES (?)",
        &[bytes.clone()],
        "",
    )
    .unwrap()
    .unwrap();
    assert_eq!(db.scalar("SELECT typeof(data) FROM payloads"), Some(SqlValue::from("blob")));
    assert_eq!(db.scalar("SELECT data FROM payloads"), Some(bytes));
}

#[test]
fn file_database_survives_reopening() {
    let dir = tempfile::tempdir().unwrap();
    let config = DatabaseConfig::Sqlite(SqliteConfig::file(dir.path().join("rowkeep.db")));

    {
        let mut db = open_adapter(&config, None).unwrap();
        db.execute(WIDGET_SCHEMA).unwrap();
        let mut registry = AdapterRegistry::with_default(db);
        seed(&mut registry, &[("bolt", 3)]);
        registry.disconnect_all();
    }

    let mut registry = AdapterRegistry::with_default(open_adapter(&config, None).unwrap());
    let mut widgets = Collection::<Widget>::new();
    widgets.load(&mut registry).unwrap();
    assert_eq!(widgets.get("1").unwrap().borrow().name, "bolt");
}
