//! Integration tests for the on-disk store
//!
//! These tests open stores under temporary base directories to verify
//! directory provisioning, durability across reopen, and sharing between
//! handles.

use groupstore_core::{Config, EntityId, Error, ListOrder, Record, Store, StoreConfig};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

fn named(name: &str) -> Record {
    Record::new().with("name", name)
}

// ============================================
// Provisioning
// ============================================

#[test]
fn test_open_creates_var_directory() {
    groupstore_core::logging::init_test();
    let temp = TempDir::new().unwrap();
    let base = temp.path().join("app");
    assert!(!base.join("var").exists());

    let store: Store = Store::open(&base).expect("open should succeed");

    assert!(base.join("var").is_dir());
    assert_eq!(store.path(), Some(base.join("var/entities.db").as_path()));
    assert!(base.join("var/entities.db").exists());
}

#[test]
fn test_second_open_same_base_dir() {
    let temp = TempDir::new().unwrap();

    let first: Store = Store::open(temp.path()).unwrap();
    first.add(named("A")).unwrap();

    let second: Store = Store::open(temp.path()).expect("second open should succeed");
    assert_eq!(second.count().unwrap(), 1);

    let entries: Vec<_> = std::fs::read_dir(temp.path()).unwrap().collect();
    assert_eq!(entries.len(), 1, "only var/ should exist in the base dir");
}

#[test]
fn test_open_fails_when_var_is_a_file() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("var"), b"not a directory").unwrap();

    let result: groupstore_core::Result<Store> = Store::open(temp.path());
    assert!(matches!(result, Err(Error::Io(_))));
}

#[test]
fn test_open_fails_when_database_path_is_a_directory() {
    for wal in [true, false] {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("var/entities.db")).unwrap();

        let config = StoreConfig {
            wal,
            ..Default::default()
        };
        let result: groupstore_core::Result<Store> = Store::open_with(temp.path(), &config);
        assert!(
            matches!(result, Err(Error::Io(_))),
            "wal = {}: expected Io error",
            wal
        );
    }
}

#[test]
fn test_open_with_custom_relative_path() {
    let temp = TempDir::new().unwrap();
    let config = StoreConfig {
        relative_path: PathBuf::from("data/nested/groups.db"),
        wal: false,
        ..Default::default()
    };

    let store: Store = Store::open_with(temp.path(), &config).unwrap();
    store.add(named("A")).unwrap();

    assert!(temp.path().join("data/nested/groups.db").exists());
}

#[test]
fn test_open_with_config_file() {
    let temp = TempDir::new().unwrap();
    std::fs::write(
        Config::config_path(temp.path()),
        "[store]\nrelative_path = \"var/groups.db\"\n",
    )
    .unwrap();

    let config = Config::load(temp.path()).unwrap();
    let _store: Store = Store::open_with(temp.path(), &config.store).unwrap();

    assert!(temp.path().join("var/groups.db").exists());
}

// ============================================
// Lifecycle scenario
// ============================================

#[test]
fn test_add_list_delete_scenario() {
    let temp = TempDir::new().unwrap();
    let base = temp.path().join("app");

    let store: Store = Store::open(&base).unwrap();
    assert!(base.join("var").is_dir());

    let added = store.add(named("A")).unwrap();
    assert_eq!(serde_json::to_value(&added).unwrap(), json!({"id": 1, "name": "A"}));

    let listed = store.list().unwrap();
    assert_eq!(
        serde_json::to_value(&listed).unwrap(),
        json!([{"id": 1, "name": "A"}])
    );

    store.delete(EntityId(1)).unwrap();
    assert!(store.list().unwrap().is_empty());
}

#[test]
fn test_data_survives_reopen() {
    let temp = TempDir::new().unwrap();

    {
        let store: Store = Store::open(temp.path()).unwrap();
        store.add(named("A")).unwrap();
        let b = store.add(named("B")).unwrap();
        store.delete(b.id.unwrap()).unwrap();
    }

    let store: Store = Store::open(temp.path()).unwrap();
    let names: Vec<_> = store
        .list()
        .unwrap()
        .into_iter()
        .filter_map(|r| r.get("name").cloned())
        .collect();
    assert_eq!(names, vec![json!("A")]);

    // The deleted identity stays retired across reopen
    let c = store.add(named("C")).unwrap();
    assert_eq!(c.id, Some(EntityId(3)));
}

#[test]
fn test_list_orders_on_disk() {
    let temp = TempDir::new().unwrap();
    let store: Store = Store::open(temp.path()).unwrap();

    store.add(Record::with_id(2).with("name", "two")).unwrap();
    let mut one = store.add(Record::with_id(1).with("name", "one")).unwrap();
    store.add(Record::with_id(3).with("name", "three")).unwrap();

    one.set("name", "uno");
    store.update(&one).unwrap();

    let ids = |order| -> Vec<i64> {
        store
            .list_by(order)
            .unwrap()
            .into_iter()
            .map(|r| r.id.unwrap().get())
            .collect()
    };

    assert_eq!(ids(ListOrder::Inserted), vec![2, 1, 3]);
    assert_eq!(ids(ListOrder::Id), vec![1, 2, 3]);
    assert_eq!(ids(ListOrder::RecentlyUpdated), vec![1, 3, 2]);
}

// ============================================
// Sharing
// ============================================

#[test]
fn test_concurrent_adds_get_unique_ids() {
    let temp = TempDir::new().unwrap();
    let store: Arc<Store> = Arc::new(Store::open(temp.path()).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                (0..25)
                    .map(|i| {
                        store
                            .add(named(&format!("w{}-{}", worker, i)))
                            .unwrap()
                            .id
                            .unwrap()
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut ids: Vec<EntityId> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    ids.sort();
    ids.dedup();

    assert_eq!(ids.len(), 100);
    assert_eq!(store.count().unwrap(), 100);
}

#[test]
fn test_two_handles_see_each_others_writes() {
    let temp = TempDir::new().unwrap();
    let writer: Store = Store::open(temp.path()).unwrap();
    let reader: Store = Store::open(temp.path()).unwrap();

    let added = writer.add(named("A")).unwrap();
    assert_eq!(reader.get(added.id.unwrap()).unwrap(), added);

    let err = reader.add(Record::with_id(1).with("name", "dup")).unwrap_err();
    assert!(err.is_conflict());
}
