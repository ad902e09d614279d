//! Secondary indexes.
//!
//! An index covers every item whose key matches its glob pattern and keeps
//! those items ordered by a chain of comparators over the raw values. When
//! the first comparator considers two values equal the next one decides, and
//! the key breaks any remaining tie, so each item has exactly one position.
//!
//! ## Usage
//!
//! ```rust
//! use tabledb::index::{index_json, index_int};
//!
//! let by_updated = index_json("updated");
//! assert!(by_updated(r#"{"updated":1}"#, r#"{"updated":2}"#));
//!
//! let by_number = index_int();
//! assert!(by_number("9", "10"));
//! ```

mod compare;
mod json;

pub use compare::{
    index_binary, index_float, index_int, index_json, index_json_case_sensitive, index_string,
    index_uint,
};

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::pattern;

/// Reports whether the first raw value sorts strictly before the second.
pub type LessFn = Arc<dyn Fn(&str, &str) -> bool + Send + Sync>;

/// One item's position inside an index.
#[derive(Clone)]
pub(crate) struct IndexEntry {
    pub(crate) key: Arc<str>,
    pub(crate) value: Arc<str>,
    pub(crate) expires_at: Option<u64>,
    order: Arc<[LessFn]>,
}

impl IndexEntry {
    fn cmp_values(&self, other: &Self) -> Ordering {
        if self.order.is_empty() {
            return self.value.as_bytes().cmp(other.value.as_bytes());
        }
        for less in self.order.iter() {
            if less(&*self.value, &*other.value) {
                return Ordering::Less;
            }
            if less(&*other.value, &*self.value) {
                return Ordering::Greater;
            }
        }
        Ordering::Equal
    }
}

impl PartialEq for IndexEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for IndexEntry {}

impl PartialOrd for IndexEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IndexEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_values(other).then_with(|| self.key.cmp(&other.key))
    }
}

/// A named, pattern-scoped secondary index.
pub(crate) struct Index {
    name: String,
    pattern: String,
    order: Arc<[LessFn]>,
    entries: BTreeSet<IndexEntry>,
}

impl Index {
    pub(crate) fn new(name: &str, pattern: &str, less: &[LessFn]) -> Self {
        Self {
            name: name.to_string(),
            pattern: pattern.to_string(),
            order: less.iter().cloned().collect(),
            entries: BTreeSet::new(),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn pattern(&self) -> &str {
        &self.pattern
    }

    pub(crate) fn covers(&self, key: &str) -> bool {
        pattern::matches(&self.pattern, key)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    fn entry(&self, key: &Arc<str>, value: &Arc<str>, expires_at: Option<u64>) -> IndexEntry {
        IndexEntry {
            key: Arc::clone(key),
            value: Arc::clone(value),
            expires_at,
            order: Arc::clone(&self.order),
        }
    }

    /// Adds an item if its key falls inside the index scope.
    pub(crate) fn insert(&mut self, key: &Arc<str>, value: &Arc<str>, expires_at: Option<u64>) {
        if self.covers(key) {
            let entry = self.entry(key, value, expires_at);
            self.entries.insert(entry);
        }
    }

    /// Removes an item previously added with the same key and value.
    pub(crate) fn remove(&mut self, key: &Arc<str>, value: &Arc<str>) {
        if self.covers(key) {
            let probe = self.entry(key, value, None);
            self.entries.remove(&probe);
        }
    }

    pub(crate) fn iter(&self) -> impl DoubleEndedIterator<Item = &IndexEntry> {
        self.entries.iter()
    }
}

impl fmt::Debug for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Index")
            .field("name", &self.name)
            .field("pattern", &self.pattern)
            .field("comparators", &self.order.len())
            .field("entries", &self.entries.len())
            .finish()
    }
}
