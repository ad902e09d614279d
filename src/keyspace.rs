//! The in-memory item set.
//!
//! Items live in a `BTreeMap` ordered by key. Every mutation goes through
//! [`Keyspace::insert`] or [`Keyspace::remove`], which keep the expiration
//! queue and all secondary indexes in step with the map.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Bound;
use std::sync::Arc;

use crate::index::Index;

/// A stored key/value pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Item {
    pub(crate) key: Arc<str>,
    pub(crate) value: Arc<str>,
    /// Absolute expiry in milliseconds since the Unix epoch.
    pub(crate) expires_at: Option<u64>,
}

impl Item {
    pub(crate) fn new(key: &str, value: &str, expires_at: Option<u64>) -> Self {
        Self { key: Arc::from(key), value: Arc::from(value), expires_at }
    }

    pub(crate) fn is_expired(&self, now: u64) -> bool {
        is_expired(self.expires_at, now)
    }
}

pub(crate) fn is_expired(expires_at: Option<u64>, now: u64) -> bool {
    matches!(expires_at, Some(at) if at <= now)
}

#[derive(Debug, Default)]
pub(crate) struct Keyspace {
    items: BTreeMap<Arc<str>, Item>,
    expirations: BTreeSet<(u64, Arc<str>)>,
    indexes: HashMap<String, Index>,
}

impl Keyspace {
    pub(crate) fn get(&self, key: &str) -> Option<&Item> {
        self.items.get(key)
    }

    /// Stores `item`, returning whatever it replaced (expired or not).
    pub(crate) fn insert(&mut self, item: Item) -> Option<Item> {
        let previous = self.remove(&item.key);

        if let Some(at) = item.expires_at {
            self.expirations.insert((at, Arc::clone(&item.key)));
        }
        for index in self.indexes.values_mut() {
            index.insert(&item.key, &item.value, item.expires_at);
        }
        self.items.insert(Arc::clone(&item.key), item);

        previous
    }

    pub(crate) fn remove(&mut self, key: &str) -> Option<Item> {
        let item = self.items.remove(key)?;

        if let Some(at) = item.expires_at {
            self.expirations.remove(&(at, Arc::clone(&item.key)));
        }
        for index in self.indexes.values_mut() {
            index.remove(&item.key, &item.value);
        }
        Some(item)
    }

    pub(crate) fn clear(&mut self) {
        self.items.clear();
        self.expirations.clear();
        self.indexes.clear();
    }

    /// Keys whose expiry is at or before `now`, soonest first.
    pub(crate) fn expired_keys(&self, now: u64) -> Vec<Arc<str>> {
        self.expirations
            .iter()
            .take_while(|(at, _)| *at <= now)
            .map(|(_, key)| Arc::clone(key))
            .collect()
    }

    /// Number of items that have not expired at `now`.
    pub(crate) fn live_len(&self, now: u64) -> usize {
        let expired = self.expirations.iter().take_while(|(at, _)| *at <= now).count();
        self.items.len() - expired
    }

    pub(crate) fn items(&self) -> impl DoubleEndedIterator<Item = &Item> {
        self.items.values()
    }

    /// Items whose key starts with `prefix`, in key order.
    pub(crate) fn with_prefix(&self, prefix: &str) -> impl DoubleEndedIterator<Item = &Item> + '_ {
        let upper = prefix_successor(prefix);
        let upper = match &upper {
            Some(successor) => Bound::Excluded(successor.as_str()),
            None => Bound::Unbounded,
        };
        self.items.range::<str, _>((Bound::Included(prefix), upper)).map(|(_, item)| item)
    }

    pub(crate) fn index(&self, name: &str) -> Option<&Index> {
        self.indexes.get(name)
    }

    /// Registers an index and fills it from the current items.
    pub(crate) fn build_index(&mut self, mut index: Index) {
        for item in self.items.values() {
            index.insert(&item.key, &item.value, item.expires_at);
        }
        log::debug!("built index {} over {} items", index.name(), index.len());
        self.indexes.insert(index.name().to_string(), index);
    }

    /// Puts back an index removed by [`Keyspace::take_index`] without rebuilding it.
    pub(crate) fn restore_index(&mut self, index: Index) {
        self.indexes.insert(index.name().to_string(), index);
    }

    pub(crate) fn take_index(&mut self, name: &str) -> Option<Index> {
        self.indexes.remove(name)
    }

    pub(crate) fn index_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.indexes.keys().cloned().collect();
        names.sort();
        names
    }
}

/// The smallest string greater than every string starting with `prefix`.
fn prefix_successor(prefix: &str) -> Option<String> {
    let mut chars: Vec<char> = prefix.chars().collect();
    while let Some(last) = chars.pop() {
        let mut next = last as u32 + 1;
        if next == 0xD800 {
            next = 0xE000;
        }
        if let Some(c) = char::from_u32(next) {
            chars.push(c);
            return Some(chars.into_iter().collect());
        }
    }
    None
}
