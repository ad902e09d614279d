//! Transactions.
//!
//! A [`Tx`] is handed to the closure passed to
//! [`Store::update`](crate::Store::update) or [`Store::view`](crate::Store::view).
//! Update transactions hold the exclusive engine lock, record how to undo
//! each change, and collect the changes into a [`WriteBatch`] that is logged
//! on commit. View transactions share the lock and reject writes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::error::{Error, Result};
use crate::index::{Index, LessFn};
use crate::keyspace::{is_expired, Item};
use crate::pattern;
use crate::write_batch::WriteBatch;
use crate::Engine;

enum Guard<'a> {
    Read(RwLockReadGuard<'a, Engine>),
    Write(RwLockWriteGuard<'a, Engine>),
}

/// How to put things back if the transaction does not commit.
#[derive(Default)]
struct Undo {
    /// State of each touched key before its first change.
    items: HashMap<Arc<str>, Option<Item>>,
    /// State of each touched index before its first change.
    indexes: HashMap<String, Option<Index>>,
}

/// A read-only or read-write transaction over the store.
pub struct Tx<'a> {
    guard: Guard<'a>,
    now: u64,
    undo: Undo,
    batch: WriteBatch,
}

impl<'a> Tx<'a> {
    pub(crate) fn read(guard: RwLockReadGuard<'a, Engine>) -> Self {
        let now = guard.config.clock.now_millis();
        Self { guard: Guard::Read(guard), now, undo: Undo::default(), batch: WriteBatch::new() }
    }

    /// Starts a write transaction, first purging items that have expired.
    pub(crate) fn write(guard: RwLockWriteGuard<'a, Engine>) -> Self {
        let now = guard.config.clock.now_millis();
        let mut tx =
            Self { guard: Guard::Write(guard), now, undo: Undo::default(), batch: WriteBatch::new() };

        tx.purge_expired();
        tx
    }

    /// Removes every item that has expired by the transaction's timestamp,
    /// logging a delete for each.
    fn purge_expired(&mut self) {
        let Guard::Write(engine) = &mut self.guard else {
            return;
        };
        let expired = engine.keyspace.expired_keys(self.now);
        if expired.is_empty() {
            return;
        }

        log::debug!("purging {} expired items", expired.len());
        for key in expired {
            if let Some(item) = engine.keyspace.remove(&key) {
                self.batch.delete(&key);
                self.undo.items.entry(key).or_insert(Some(item));
            }
        }
    }

    fn engine(&self) -> &Engine {
        match &self.guard {
            Guard::Read(guard) => &**guard,
            Guard::Write(guard) => &**guard,
        }
    }

    fn parts(&mut self) -> Result<(&mut Engine, &mut Undo, &mut WriteBatch, u64)> {
        match &mut self.guard {
            Guard::Write(guard) => Ok((&mut **guard, &mut self.undo, &mut self.batch, self.now)),
            Guard::Read(_) => Err(Error::TxNotWritable),
        }
    }

    /// Whether this transaction may modify the store.
    pub fn is_writable(&self) -> bool {
        matches!(self.guard, Guard::Write(_))
    }

    /// The transaction's timestamp, in milliseconds since the Unix epoch.
    pub fn now_millis(&self) -> u64 {
        self.now
    }

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// With a `ttl` the item expires that long after the transaction started.
    /// Returns the previous value if one was live.
    pub fn set(&mut self, key: &str, value: &str, ttl: Option<Duration>) -> Result<Option<String>> {
        let (engine, undo, batch, now) = self.parts()?;

        let expires_at = ttl.map(|ttl| {
            let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
            now.saturating_add(millis)
        });
        let previous = engine.keyspace.insert(Item::new(key, value, expires_at));
        undo.items.entry(Arc::from(key)).or_insert_with(|| previous.clone());
        batch.set(key, value, expires_at);

        Ok(previous.filter(|item| !item.is_expired(now)).map(|item| item.value.to_string()))
    }

    /// Returns the value stored under `key`.
    pub fn get(&self, key: &str) -> Result<String> {
        self.engine()
            .keyspace
            .get(key)
            .filter(|item| !item.is_expired(self.now))
            .map(|item| item.value.to_string())
            .ok_or(Error::NotFound)
    }

    /// Removes `key`, returning its value.
    pub fn delete(&mut self, key: &str) -> Result<String> {
        let (engine, undo, batch, now) = self.parts()?;

        let item = engine.keyspace.remove(key).ok_or(Error::NotFound)?;
        batch.delete(key);
        let expired = item.is_expired(now);
        let value = item.value.to_string();
        undo.items.entry(Arc::clone(&item.key)).or_insert(Some(item));

        if expired {
            Err(Error::NotFound)
        } else {
            Ok(value)
        }
    }

    /// Remaining time to live of `key`; `None` if it never expires.
    pub fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        let item = self
            .engine()
            .keyspace
            .get(key)
            .filter(|item| !item.is_expired(self.now))
            .ok_or(Error::NotFound)?;
        Ok(item.expires_at.map(|at| Duration::from_millis(at - self.now)))
    }

    /// Number of live items in the store.
    pub fn len(&self) -> usize {
        self.engine().keyspace.live_len(self.now)
    }

    /// Returns true if the store holds no live items.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Creates an index over keys matching `pattern`, ordered by `less`.
    ///
    /// Existing matching items are indexed immediately. Creating an index that
    /// already exists with the same pattern does nothing.
    pub fn create_index(&mut self, name: &str, pattern: &str, less: &[LessFn]) -> Result<()> {
        if name.is_empty() {
            return Err(Error::invalid_argument("index name must not be empty"));
        }
        let (engine, undo, _, _) = self.parts()?;

        if let Some(existing) = engine.keyspace.index(name) {
            if existing.pattern() == pattern {
                return Ok(());
            }
            return Err(Error::IndexExists(name.to_string()));
        }

        engine.keyspace.build_index(Index::new(name, pattern, less));
        undo.indexes.entry(name.to_string()).or_insert(None);
        Ok(())
    }

    /// Removes an index. Items are not affected.
    pub fn drop_index(&mut self, name: &str) -> Result<()> {
        let (engine, undo, _, _) = self.parts()?;

        let index = engine
            .keyspace
            .take_index(name)
            .ok_or_else(|| Error::IndexNotFound(name.to_string()))?;
        undo.indexes.entry(name.to_string()).or_insert(Some(index));
        Ok(())
    }

    /// Names of all indexes, sorted.
    pub fn indexes(&self) -> Vec<String> {
        self.engine().keyspace.index_names()
    }

    /// Visits items in ascending index order until `visit` returns false.
    ///
    /// An empty index name walks every item in key order.
    pub fn ascend<F>(&self, index: &str, visit: F) -> Result<()>
    where
        F: FnMut(&str, &str) -> bool,
    {
        self.walk_index(index, false, visit)
    }

    /// Visits items in descending index order until `visit` returns false.
    pub fn descend<F>(&self, index: &str, visit: F) -> Result<()>
    where
        F: FnMut(&str, &str) -> bool,
    {
        self.walk_index(index, true, visit)
    }

    /// Visits items whose key matches `pattern`, in ascending key order.
    pub fn ascend_keys<F>(&self, pattern: &str, visit: F) -> Result<()>
    where
        F: FnMut(&str, &str) -> bool,
    {
        self.walk_keys(pattern, false, visit)
    }

    /// Visits items whose key matches `pattern`, in descending key order.
    pub fn descend_keys<F>(&self, pattern: &str, visit: F) -> Result<()>
    where
        F: FnMut(&str, &str) -> bool,
    {
        self.walk_keys(pattern, true, visit)
    }

    fn walk_index<F>(&self, name: &str, reverse: bool, visit: F) -> Result<()>
    where
        F: FnMut(&str, &str) -> bool,
    {
        let keyspace = &self.engine().keyspace;
        if name.is_empty() {
            let items = keyspace.items().map(|item| (&*item.key, &*item.value, item.expires_at));
            if reverse {
                visit_live(items.rev(), self.now, visit);
            } else {
                visit_live(items, self.now, visit);
            }
            return Ok(());
        }

        let index = keyspace.index(name).ok_or_else(|| Error::IndexNotFound(name.to_string()))?;
        let entries = index.iter().map(|e| (&*e.key, &*e.value, e.expires_at));
        if reverse {
            visit_live(entries.rev(), self.now, visit);
        } else {
            visit_live(entries, self.now, visit);
        }
        Ok(())
    }

    fn walk_keys<F>(&self, pattern: &str, reverse: bool, visit: F) -> Result<()>
    where
        F: FnMut(&str, &str) -> bool,
    {
        let items = self
            .engine()
            .keyspace
            .with_prefix(pattern::literal_prefix(pattern))
            .map(|item| (&*item.key, &*item.value, item.expires_at));
        if reverse {
            let matching = items.rev().filter(|(key, _, _)| pattern::matches(pattern, key));
            visit_live(matching, self.now, visit);
        } else {
            let matching = items.filter(|(key, _, _)| pattern::matches(pattern, key));
            visit_live(matching, self.now, visit);
        }
        Ok(())
    }

    /// Logs the batch and releases the lock. On failure every change is undone.
    pub(crate) fn commit(self) -> Result<()> {
        let Tx { guard, undo, batch, .. } = self;
        let mut engine = match guard {
            Guard::Write(engine) => engine,
            Guard::Read(_) => return Ok(()),
        };
        if batch.is_empty() {
            return Ok(());
        }

        let policy = engine.config.sync_policy;
        let logged = match engine.wal.as_mut() {
            Some(wal) => wal.append_batch(&batch, policy),
            None => Ok(()),
        };
        if let Err(e) = logged {
            log::error!("failed to log {} operations, rolling back: {}", batch.len(), e);
            undo.apply(&mut engine);
            return Err(e);
        }
        engine.maybe_auto_shrink();
        Ok(())
    }

    /// Discards every change made by the transaction.
    pub(crate) fn rollback(self) {
        let Tx { guard, undo, .. } = self;
        if let Guard::Write(mut engine) = guard {
            undo.apply(&mut engine);
        }
    }
}

impl Undo {
    fn apply(self, engine: &mut Engine) {
        // Indexes first: a restored index already reflects the items as they
        // were when it was dropped, and the item restores below fix the rest.
        for (name, previous) in self.indexes {
            match previous {
                Some(index) => engine.keyspace.restore_index(index),
                None => {
                    engine.keyspace.take_index(&name);
                }
            }
        }
        for (key, previous) in self.items {
            match previous {
                Some(item) => {
                    engine.keyspace.insert(item);
                }
                None => {
                    engine.keyspace.remove(&key);
                }
            }
        }
    }
}

fn visit_live<'i, I, F>(entries: I, now: u64, mut visit: F)
where
    I: Iterator<Item = (&'i str, &'i str, Option<u64>)>,
    F: FnMut(&str, &str) -> bool,
{
    for (key, value, expires_at) in entries {
        if is_expired(expires_at, now) {
            continue;
        }
        if !visit(key, value) {
            break;
        }
    }
}
