//! Users table example for tabledb
//!
//! This example demonstrates:
//! - Opening a file-backed store
//! - Writing, reading and deleting JSON records in a table
//! - Ordering by the default `updated` index and a secondary index
//! - Expiring records with a TTL
//! - Shrinking the log

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tabledb::index::index_json;
use tabledb::Store;

#[derive(Debug, Serialize, Deserialize)]
struct User {
    name: String,
    email: String,
    updated: String,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let store = Store::open("./users_data.db", 5).context("opening store")?;
    let users = store.table("users")?;
    println!("Opened {:?}", store.path());

    users.set(
        "alice",
        &User {
            name: "Alice".into(),
            email: "alice@example.com".into(),
            updated: "2024-05-01T09:00:00Z".into(),
        },
        0,
    )?;
    users.set(
        "bob",
        &User {
            name: "bob".into(),
            email: "bob@example.com".into(),
            updated: "2024-05-02T12:30:00Z".into(),
        },
        0,
    )?;

    // one-minute session record
    users.set_raw("session-token", r#"{"updated":"2024-05-02T12:31:00Z"}"#, 1)?;
    println!("session expires in {:?}", users.ttl("session-token")?);

    let alice: User = users.get("alice")?;
    println!("alice => {:?}", alice);

    println!("All users by last update:");
    for raw in users.get_all_raw()? {
        println!("  {}", raw);
    }

    let newest: User = users.get_last(users.default_index())?;
    println!("Most recently updated: {}", newest.name);

    let by_name = users.create_index("name", &[index_json("name")])?;
    let first: User = users.get_first(&by_name)?;
    println!("First by name: {}", first.name);

    users.delete("bob")?;
    match users.get::<User>("bob") {
        Ok(_) => println!("bob still exists (unexpected)"),
        Err(e) if e.is_not_found() => println!("bob was deleted"),
        Err(e) => return Err(e.into()),
    }

    let stats = store.shrink()?;
    println!("Shrunk log from {} to {} bytes", stats.size_before, stats.size_after);

    store.close()?;
    println!("Store closed");
    Ok(())
}
