// Table Tests for tabledb
// These tests cover the record operations of the table façade end to end

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tabledb::index::{index_json, index_string};
use tabledb::{Config, Error, ManualClock, Store, MEMORY_PATH};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct User {
    name: String,
    updated: i64,
}

fn user(name: &str, updated: i64) -> User {
    User { name: name.to_string(), updated }
}

fn memory_store_with_clock() -> (Store, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let store = Store::open_with_config(MEMORY_PATH, Config::new().clock(clock.clone())).unwrap();
    (store, clock)
}

/// The canonical users scenario
#[test]
fn test_users_scenario() {
    env_logger::try_init().ok();
    let store = Store::open(MEMORY_PATH, 0).unwrap();
    let users = store.table("users").unwrap();

    users.set("alice", &user("Alice", 1), 0).unwrap();
    users.set("bob", &user("Bob", 2), 0).unwrap();

    let all: Vec<User> = users.get_all().unwrap();
    assert_eq!(all, vec![user("Alice", 1), user("Bob", 2)]);

    let last: User = users.get_last(users.default_index()).unwrap();
    assert_eq!(last, user("Bob", 2));

    users.delete("alice").unwrap();
    let all: Vec<User> = users.get_all().unwrap();
    assert_eq!(all, vec![user("Bob", 2)]);

    store.close().unwrap();
}

/// Test set then get returns an equal record
#[test]
fn test_round_trip() {
    let store = Store::open(MEMORY_PATH, 0).unwrap();
    let users = store.table("users").unwrap();

    let record = user("Zoë \"quoted\" \n newline", -42);
    users.set("z", &record, 0).unwrap();
    assert_eq!(users.get::<User>("z").unwrap(), record);

    // last write wins
    users.set("z", &user("Zed", 5), 0).unwrap();
    assert_eq!(users.get::<User>("z").unwrap(), user("Zed", 5));
}

/// Test raw values bypass encoding
#[test]
fn test_raw_values() {
    let store = Store::open(MEMORY_PATH, 0).unwrap();
    let table = store.table("table_test").unwrap();

    table.set_raw("k", "dfsddf", 0).unwrap();
    assert_eq!(table.get_raw("k").unwrap(), "dfsddf");
}

/// Test two tables never see each other's keys
#[test]
fn test_namespace_isolation() {
    let store = Store::open(MEMORY_PATH, 0).unwrap();
    let a = store.table("a").unwrap();
    let b = store.table("b").unwrap();

    a.set("k", &user("in-a", 1), 0).unwrap();
    assert!(matches!(b.get::<User>("k"), Err(Error::NotFound)));
    assert!(b.get_all::<User>().unwrap().is_empty());

    b.set("k", &user("in-b", 2), 0).unwrap();
    assert_eq!(a.get::<User>("k").unwrap().name, "in-a");
    assert_eq!(b.get::<User>("k").unwrap().name, "in-b");
    assert_eq!(a.len().unwrap(), 1);
}

/// Test names containing the key separator are rejected
#[test]
fn test_table_name_with_separator_rejected() {
    let store = Store::open(MEMORY_PATH, 0).unwrap();
    let a = store.table("a").unwrap();

    // "a:b" would live inside the key range of "a"
    assert!(matches!(store.table("a:b"), Err(Error::InvalidArgument(_))));
    assert!(matches!(store.table("a:"), Err(Error::InvalidArgument(_))));

    // keys with the separator are still fine inside a table
    a.set_raw("b:k", r#"{"updated":1}"#, 0).unwrap();
    assert_eq!(a.keys().unwrap(), vec!["b:k"]);
}

/// Test a TTL too large to represent saturates instead of overflowing
#[test]
fn test_huge_ttl() {
    let (store, clock) = memory_store_with_clock();
    let table = store.table("forever").unwrap();

    table.set_raw("k", "v", i64::MAX).unwrap();
    assert_eq!(table.get_raw("k").unwrap(), "v");
    assert!(table.ttl("k").unwrap().is_some());

    clock.advance(Duration::from_secs(100 * 365 * 24 * 3600));
    assert_eq!(table.get_raw("k").unwrap(), "v");

    store.update(|tx| tx.set("raw", "v", Some(Duration::MAX)).map(|_| ())).unwrap();
    assert!(store.view(|tx| tx.ttl("raw")).unwrap().is_some());
}

/// Test records with a TTL disappear once it passes
#[test]
fn test_ttl_expiry() {
    let (store, clock) = memory_store_with_clock();
    let sessions = store.table("sessions").unwrap();

    sessions.set_raw("short", r#"{"updated":1}"#, 1).unwrap();
    sessions.set_raw("forever", r#"{"updated":2}"#, 0).unwrap();
    sessions.set_raw("negative", r#"{"updated":3}"#, -5).unwrap();

    assert_eq!(sessions.ttl("short").unwrap(), Some(Duration::from_secs(60)));
    assert_eq!(sessions.ttl("forever").unwrap(), None);
    assert_eq!(sessions.ttl("negative").unwrap(), None);

    clock.advance(Duration::from_secs(59));
    assert!(sessions.get_raw("short").is_ok());

    clock.advance(Duration::from_secs(1));
    assert!(matches!(sessions.get_raw("short"), Err(Error::NotFound)));
    assert_eq!(sessions.get_all_raw().unwrap().len(), 2);

    clock.advance(Duration::from_secs(365 * 24 * 3600));
    assert!(sessions.get_raw("forever").is_ok());
    assert!(sessions.get_raw("negative").is_ok());
    assert_eq!(sessions.len().unwrap(), 2);
}

/// Test expired records are purged by the next write
#[test]
fn test_expired_records_purged_on_write() {
    let (store, clock) = memory_store_with_clock();
    let cache = store.table("cache").unwrap();

    cache.set_raw("a", "1", 1).unwrap();
    clock.advance(Duration::from_secs(120));
    cache.set_raw("b", "2", 0).unwrap();

    let total = store.view(|tx| Ok(tx.len())).unwrap();
    assert_eq!(total, 1);
    assert!(matches!(cache.delete("a"), Err(Error::NotFound)));
}

/// Test delete then get
#[test]
fn test_delete_then_get() {
    let store = Store::open(MEMORY_PATH, 0).unwrap();
    let users = store.table("users").unwrap();

    users.set("alice", &user("Alice", 1), 0).unwrap();
    users.delete("alice").unwrap();
    assert!(matches!(users.get::<User>("alice"), Err(Error::NotFound)));
    assert!(matches!(users.delete("alice"), Err(Error::NotFound)));
}

/// Test get_all is ordered by updated regardless of write order
#[test]
fn test_ordering_by_updated() {
    let store = Store::open(MEMORY_PATH, 0).unwrap();
    let users = store.table("users").unwrap();

    for (key, updated) in [("d", 40), ("a", 10), ("c", 30), ("e", 50), ("b", 20)] {
        users.set(key, &user(key, updated), 0).unwrap();
    }

    let order: Vec<i64> = users.get_all::<User>().unwrap().iter().map(|u| u.updated).collect();
    assert_eq!(order, vec![10, 20, 30, 40, 50]);

    let first: User = users.get_first(users.default_index()).unwrap();
    let last: User = users.get_last(users.default_index()).unwrap();
    assert_eq!(first.updated, 10);
    assert_eq!(last.updated, 50);

    // updating moves a record in the index
    users.set("a", &user("a", 99), 0).unwrap();
    let last: User = users.get_last(users.default_index()).unwrap();
    assert_eq!(last.name, "a");
}

/// Test RFC 3339 timestamps order correctly as strings
#[test]
fn test_ordering_by_timestamp_strings() {
    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Event {
        id: u32,
        updated: String,
    }

    let store = Store::open(MEMORY_PATH, 0).unwrap();
    let events = store.table("events").unwrap();
    events.set("1", &Event { id: 1, updated: "2024-03-01T10:00:00Z".into() }, 0).unwrap();
    events.set("2", &Event { id: 2, updated: "2023-12-31T23:59:59Z".into() }, 0).unwrap();
    events.set("3", &Event { id: 3, updated: "2024-01-15T00:00:00Z".into() }, 0).unwrap();

    let ids: Vec<u32> = events.get_all::<Event>().unwrap().iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![2, 3, 1]);
}

/// Test records without an updated field sort first
#[test]
fn test_records_without_updated_sort_first() {
    let store = Store::open(MEMORY_PATH, 0).unwrap();
    let table = store.table("mixed").unwrap();

    table.set_raw("with", r#"{"updated":1}"#, 0).unwrap();
    table.set_raw("without", r#"{"name":"x"}"#, 0).unwrap();

    assert_eq!(table.get_all_raw().unwrap(), vec![r#"{"name":"x"}"#, r#"{"updated":1}"#]);
}

/// Test an empty table
#[test]
fn test_empty_table() {
    let store = Store::open(MEMORY_PATH, 0).unwrap();
    let users = store.table("users").unwrap();

    assert!(users.get_all::<User>().unwrap().is_empty());
    assert!(users.is_empty().unwrap());
    assert!(matches!(users.get_first::<User>(users.default_index()), Err(Error::NotFound)));
    assert!(matches!(users.get_last::<User>(users.default_index()), Err(Error::NotFound)));
}

/// Test secondary indexes defined by the caller
#[test]
fn test_secondary_indexes() {
    let store = Store::open(MEMORY_PATH, 0).unwrap();
    let users = store.table("users").unwrap();

    users.set("1", &user("carol", 1), 0).unwrap();
    users.set("2", &user("Alice", 2), 0).unwrap();

    let by_name = users.create_index("name", &[index_json("name")]).unwrap();
    users.set("3", &user("bob", 3), 0).unwrap();

    let first: User = users.get_first(&by_name).unwrap();
    let last: User = users.get_last(&by_name).unwrap();
    assert_eq!(first.name, "Alice");
    assert_eq!(last.name, "carol");

    // same definition again is a no-op
    assert_eq!(users.create_index("name", &[index_json("name")]).unwrap(), by_name);
    assert_eq!(users.indexes().unwrap(), vec![by_name.clone(), users.default_index().to_string()]);
}

/// Test an index with no comparator orders by raw value
#[test]
fn test_index_without_comparator() {
    let store = Store::open(MEMORY_PATH, 0).unwrap();
    let words = store.table("words").unwrap();
    let raw = words.create_index("raw", &[]).unwrap();
    let folded = words.create_index("folded", &[index_string()]).unwrap();

    words.set_raw("1", "banana", 0).unwrap();
    words.set_raw("2", "Cherry", 0).unwrap();
    words.set_raw("3", "apple", 0).unwrap();

    let first_raw: String = words
        .store()
        .view(|tx| {
            let mut first = String::new();
            tx.ascend(&raw, |_, v| {
                first = v.to_string();
                false
            })?;
            Ok(first)
        })
        .unwrap();
    assert_eq!(first_raw, "Cherry");

    let last_folded: String = words
        .store()
        .view(|tx| {
            let mut last = String::new();
            tx.descend(&folded, |_, v| {
                last = v.to_string();
                false
            })?;
            Ok(last)
        })
        .unwrap();
    assert_eq!(last_folded, "Cherry");
}

/// Test a closed store fails table operations
#[test]
fn test_operations_after_close() {
    let store = Store::open(MEMORY_PATH, 0).unwrap();
    let users = store.table("users").unwrap();
    store.close().unwrap();

    assert!(matches!(users.set("a", &user("a", 1), 0), Err(Error::DatabaseClosed)));
    assert!(matches!(users.get::<User>("a"), Err(Error::DatabaseClosed)));
    assert!(matches!(store.table("other"), Err(Error::DatabaseClosed)));
}
