//! Tables: key-prefixed partitions of a shared store holding JSON records.
//!
//! A table named `users` owns every key starting with `users:`. Records are
//! encoded with `serde_json` on the way in and decoded on the way out. Each
//! table keeps a default index, `users:index-updated`, ordering its records
//! by their `updated` field; records without that field sort first.
//!
//! Every method runs in exactly one transaction. Use
//! [`Store::update`](crate::Store::update) directly when several keys must
//! change atomically.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::index::{index_json, LessFn};
use crate::Store;

/// Field the default index orders records by.
pub const UPDATED_FIELD: &str = "updated";

const KEY_SEPARATOR: &str = ":";
const INDEX_INFIX: &str = "index-";
const SECS_PER_MINUTE: u64 = 60;

/// A logical table inside a [`Store`].
#[derive(Clone, Debug)]
pub struct Table {
    store: Store,
    name: String,
    prefix: String,
    default_index: String,
}

impl Table {
    pub(crate) fn new(store: Store, name: &str) -> Result<Self> {
        if name.is_empty() {
            return Err(Error::invalid_argument("table name must not be empty"));
        }
        if name.contains(KEY_SEPARATOR) {
            return Err(Error::invalid_argument(format!(
                "table name {:?} must not contain {:?}",
                name, KEY_SEPARATOR
            )));
        }

        let prefix = format!("{}{}", name, KEY_SEPARATOR);
        let default_index = format!("{}{}{}", prefix, INDEX_INFIX, UPDATED_FIELD);
        let table = Self { store, name: name.to_string(), prefix, default_index };

        let pattern = table.pattern();
        let created = table.store.update(|tx| {
            tx.create_index(&table.default_index, &pattern, &[index_json(UPDATED_FIELD)])
        });
        if let Err(e) = created {
            log::error!("table {}: can't create default index: {}", table.name, e);
            return Err(e);
        }

        log::debug!("table {}: ready", table.name);
        Ok(table)
    }

    /// The table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The prefix (`name:`) carried by every key of this table.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Full name of the index ordering records by `updated`.
    pub fn default_index(&self) -> &str {
        &self.default_index
    }

    /// Full name of the secondary index `name` of this table.
    pub fn index_name(&self, name: &str) -> String {
        format!("{}{}{}", self.prefix, INDEX_INFIX, name)
    }

    /// The store this table lives in.
    pub fn store(&self) -> &Store {
        &self.store
    }

    fn pattern(&self) -> String {
        format!("{}*", self.prefix)
    }

    fn key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Registers a secondary index over this table's records.
    ///
    /// Records are ordered by `less` in turn; with no comparators they are
    /// ordered by their raw JSON text. Returns the full index name to pass to
    /// [`get_first`](Self::get_first) and [`get_last`](Self::get_last).
    ///
    /// # Example
    ///
    /// ```rust
    /// use tabledb::index::index_json;
    /// # use tabledb::{Store, MEMORY_PATH};
    /// # fn main() -> Result<(), tabledb::Error> {
    /// # let store = Store::open(MEMORY_PATH, 0)?;
    /// let users = store.table("users")?;
    /// let by_age = users.create_index("age", &[index_json("age")])?;
    /// assert_eq!(by_age, "users:index-age");
    /// # Ok(())
    /// # }
    /// ```
    pub fn create_index(&self, name: &str, less: &[LessFn]) -> Result<String> {
        let full_name = self.index_name(name);
        let pattern = self.pattern();
        let created = self.store.update(|tx| tx.create_index(&full_name, &pattern, less));
        if let Err(e) = created {
            log::error!("table {}: can't create index {}: {}", self.name, name, e);
            return Err(e);
        }

        log::debug!("table {}: index {} ready", self.name, full_name);
        Ok(full_name)
    }

    /// Removes the secondary index `name`.
    pub fn drop_index(&self, name: &str) -> Result<()> {
        let full_name = self.index_name(name);
        self.store.update(|tx| tx.drop_index(&full_name))
    }

    /// Full names of the indexes scoped to this table, sorted.
    pub fn indexes(&self) -> Result<Vec<String>> {
        self.store.view(|tx| {
            Ok(tx.indexes().into_iter().filter(|name| name.starts_with(&self.prefix)).collect())
        })
    }

    /// Stores an already-encoded value.
    ///
    /// A positive `ttl_minutes` makes the record expire after that many
    /// minutes; zero or less keeps it until deleted. Expiry is measured on
    /// the store's [`Config::clock`](crate::Config::clock()).
    pub fn set_raw(&self, key: &str, value: &str, ttl_minutes: i64) -> Result<()> {
        let key = self.key(key);
        let ttl = (ttl_minutes > 0)
            .then(|| Duration::from_secs((ttl_minutes as u64).saturating_mul(SECS_PER_MINUTE)));
        self.store.update(|tx| tx.set(&key, value, ttl).map(|_| ()))
    }

    /// Encodes `value` as JSON and stores it.
    ///
    /// Nothing is written if encoding fails.
    pub fn set<T>(&self, key: &str, value: &T, ttl_minutes: i64) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let encoded = serde_json::to_string(value).map_err(Error::Encode)?;
        self.set_raw(key, &encoded, ttl_minutes)
    }

    /// Returns the stored value without decoding it.
    pub fn get_raw(&self, key: &str) -> Result<String> {
        let key = self.key(key);
        self.store.view(|tx| tx.get(&key))
    }

    /// Reads and decodes the record stored under `key`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        decode(&self.get_raw(key)?)
    }

    /// Deletes the record stored under `key`.
    pub fn delete(&self, key: &str) -> Result<()> {
        let key = self.key(key);
        self.store.update(|tx| tx.delete(&key).map(|_| ()))
    }

    /// Remaining time to live of `key`; `None` if it never expires.
    pub fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        let key = self.key(key);
        self.store.view(|tx| tx.ttl(&key))
    }

    /// All raw values in ascending `updated` order.
    pub fn get_all_raw(&self) -> Result<Vec<String>> {
        self.store.view(|tx| {
            let mut values = Vec::new();
            tx.ascend(&self.default_index, |_, value| {
                values.push(value.to_string());
                true
            })?;
            Ok(values)
        })
    }

    /// All records in ascending `updated` order.
    pub fn get_all<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        self.get_all_raw()?.iter().map(|raw| decode(raw)).collect()
    }

    /// The first record of `index` (its minimum).
    pub fn get_first<T: DeserializeOwned>(&self, index: &str) -> Result<T> {
        let raw = self.store.view(|tx| {
            let mut found = None;
            tx.ascend(index, |_, value| {
                found = Some(value.to_string());
                false
            })?;
            Ok(found)
        })?;
        decode(&raw.ok_or(Error::NotFound)?)
    }

    /// The last record of `index` (its maximum).
    pub fn get_last<T: DeserializeOwned>(&self, index: &str) -> Result<T> {
        let raw = self.store.view(|tx| {
            let mut found = None;
            tx.descend(index, |_, value| {
                found = Some(value.to_string());
                false
            })?;
            Ok(found)
        })?;
        decode(&raw.ok_or(Error::NotFound)?)
    }

    /// Keys of this table, without the prefix, in key order.
    pub fn keys(&self) -> Result<Vec<String>> {
        self.store.view(|tx| {
            let mut keys = Vec::new();
            tx.ascend_keys(&self.pattern(), |key, _| {
                keys.push(key[self.prefix.len()..].to_string());
                true
            })?;
            Ok(keys)
        })
    }

    /// Number of live records in this table.
    pub fn len(&self) -> Result<usize> {
        self.store.view(|tx| {
            let mut count = 0;
            tx.ascend_keys(&self.pattern(), |_, _| {
                count += 1;
                true
            })?;
            Ok(count)
        })
    }

    /// Returns true if the table holds no live records.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

fn decode<T: DeserializeOwned>(raw: &str) -> Result<T> {
    serde_json::from_str(raw).map_err(Error::Decode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::index_int;
    use crate::MEMORY_PATH;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Note {
        text: String,
        updated: i64,
    }

    fn note(text: &str, updated: i64) -> Note {
        Note { text: text.to_string(), updated }
    }

    #[test]
    fn test_names() {
        let store = Store::open(MEMORY_PATH, 0).unwrap();
        let table = store.table("notes").unwrap();
        assert_eq!(table.name(), "notes");
        assert_eq!(table.prefix(), "notes:");
        assert_eq!(table.default_index(), "notes:index-updated");
        assert_eq!(table.index_name("score"), "notes:index-score");
    }

    #[test]
    fn test_keys_are_prefixed_in_store() {
        let store = Store::open(MEMORY_PATH, 0).unwrap();
        let table = store.table("notes").unwrap();
        table.set_raw("a", "raw", 0).unwrap();

        assert_eq!(store.view(|tx| tx.get("notes:a")).unwrap(), "raw");
        assert_eq!(table.keys().unwrap(), vec!["a"]);
    }

    #[test]
    fn test_reopening_table_is_idempotent() {
        let store = Store::open(MEMORY_PATH, 0).unwrap();
        let first = store.table("notes").unwrap();
        first.set("a", &note("x", 1), 0).unwrap();

        let second = store.table("notes").unwrap();
        assert_eq!(second.get::<Note>("a").unwrap(), note("x", 1));
        assert_eq!(second.indexes().unwrap(), vec!["notes:index-updated"]);
    }

    #[test]
    fn test_invalid_names_rejected() {
        let store = Store::open(MEMORY_PATH, 0).unwrap();
        assert!(matches!(store.table(""), Err(Error::InvalidArgument(_))));
        assert!(matches!(store.table("a:b"), Err(Error::InvalidArgument(_))));
        assert!(matches!(store.table(":"), Err(Error::InvalidArgument(_))));

        // nothing was created for the rejected names
        assert!(store.view(|tx| Ok(tx.indexes())).unwrap().is_empty());
    }

    #[test]
    fn test_encode_failure_leaves_store_untouched() {
        use std::collections::HashMap;

        let store = Store::open(MEMORY_PATH, 0).unwrap();
        let table = store.table("notes").unwrap();

        // JSON object keys must be strings
        let mut bad = HashMap::new();
        bad.insert(vec![1u8], 1);
        assert!(matches!(table.set("bad", &bad, 0), Err(Error::Encode(_))));
        assert!(matches!(table.get_raw("bad"), Err(Error::NotFound)));
    }

    #[test]
    fn test_decode_failure_surfaces() {
        let store = Store::open(MEMORY_PATH, 0).unwrap();
        let table = store.table("notes").unwrap();
        table.set_raw("a", "not json", 0).unwrap();
        assert!(matches!(table.get::<Note>("a"), Err(Error::Decode(_))));
    }

    #[test]
    fn test_custom_index_first_last() {
        let store = Store::open(MEMORY_PATH, 0).unwrap();
        let table = store.table("scores").unwrap();
        let index = table.create_index("raw", &[index_int()]).unwrap();

        for (key, score) in [("a", "30"), ("b", "7"), ("c", "100")] {
            table.set_raw(key, score, 0).unwrap();
        }

        assert_eq!(table.get_first::<i64>(&index).unwrap(), 7);
        assert_eq!(table.get_last::<i64>(&index).unwrap(), 100);

        table.drop_index("raw").unwrap();
        assert!(matches!(table.get_first::<i64>(&index), Err(Error::IndexNotFound(_))));
    }
}
