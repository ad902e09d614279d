//! # tabledb - Namespaced Tables over an Embedded Ordered Store
//!
//! tabledb splits one embedded key-value store into logical tables. Each
//! table prefixes its keys with its own name, stores records as JSON, can
//! expire records after a TTL, and keeps them ordered by their `updated`
//! field plus any secondary indexes the caller defines.
//!
//! ## Architecture
//!
//! - **Store**: shared handle to the engine; opens the log, holds the
//!   configuration and runs closure-scoped transactions
//! - **Tx**: read-only (`view`) or read-write (`update`) transaction with
//!   rollback on error
//! - **Keyspace**: in-memory ordered items, expiration queue and indexes
//! - **WAL**: append-only, checksummed log replayed on open
//! - **Shrink**: rewrites the log down to the live items once it grows
//! - **Table**: key-prefixed JSON façade with a default `updated` index
//!
//! ## Example Usage
//!
//! ```rust
//! use serde::{Deserialize, Serialize};
//! use tabledb::{Store, MEMORY_PATH};
//!
//! #[derive(Debug, PartialEq, Serialize, Deserialize)]
//! struct User {
//!     name: String,
//!     updated: u64,
//! }
//!
//! # fn main() -> Result<(), tabledb::Error> {
//! let store = Store::open(MEMORY_PATH, 0)?;
//! let users = store.table("users")?;
//!
//! users.set("alice", &User { name: "Alice".into(), updated: 1 }, 0)?;
//! users.set("bob", &User { name: "Bob".into(), updated: 2 }, 0)?;
//!
//! let newest: User = users.get_last(users.default_index())?;
//! assert_eq!(newest.name, "Bob");
//!
//! let all: Vec<User> = users.get_all()?;
//! assert_eq!(all.len(), 2);
//!
//! store.close()?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// Module declarations
pub mod clock;
pub mod config;
pub mod error;
pub mod index;
mod keyspace;
pub mod pattern;
pub mod shrink;
pub mod table;
pub mod tx;
pub mod wal;
pub mod write_batch;

// Re-exports
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, SyncPolicy};
pub use error::{Error, Result};
pub use index::LessFn;
pub use shrink::ShrinkStats;
pub use table::Table;
pub use tx::Tx;
pub use write_batch::{WriteBatch, WriteOp};

use keyspace::{Item, Keyspace};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use wal::WAL;

/// Path that opens a purely in-memory store with no log file.
pub const MEMORY_PATH: &str = ":memory:";

/// Engine state guarded by the store lock.
pub(crate) struct Engine {
    keyspace: Keyspace,
    wal: Option<WAL>,
    config: Config,
    closed: bool,
    /// Log size right after the last shrink (or open).
    last_shrink_size: u64,
}

impl Engine {
    fn shrink(&mut self) -> Result<ShrinkStats> {
        let Some(wal) = self.wal.as_mut() else {
            return Ok(ShrinkStats { size_before: 0, size_after: 0, items: 0 });
        };
        let now = self.config.clock.now_millis();
        let live = self.keyspace.items().filter(|item| !item.is_expired(now));
        let stats = shrink::rewrite(wal, live)?;
        self.last_shrink_size = stats.size_after;
        Ok(stats)
    }

    fn maybe_auto_shrink(&mut self) {
        let size = match &self.wal {
            Some(wal) => wal.size(),
            None => return,
        };
        if !shrink::should_shrink(&self.config, size, self.last_shrink_size) {
            return;
        }
        log::info!(
            "log is {} bytes (last shrink left {}), triggering shrink",
            size,
            self.last_shrink_size
        );
        if let Err(e) = self.shrink() {
            log::error!("auto shrink failed: {}", e);
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Some(wal) = self.wal.as_mut() {
            if let Err(e) = wal.sync() {
                log::warn!("failed to sync log during drop: {}", e);
            }
        }
    }
}

struct Shared {
    path: PathBuf,
    engine: RwLock<Engine>,
}

/// The store handle.
///
/// Cloning a `Store` is cheap and yields another handle to the same engine.
/// [`Table`]s keep such a handle; [`Store::close`] shuts the engine down for
/// all of them.
///
/// # Thread Safety
///
/// `Store` is `Send + Sync`. Update transactions are serialized; view
/// transactions run concurrently with each other.
#[derive(Clone)]
pub struct Store {
    shared: Arc<Shared>,
}

impl Store {
    /// Opens the store at `path` with the table-layer defaults.
    ///
    /// `auto_shrink_min_size_mb` sets how large (in MiB) the log must grow
    /// before it is shrunk automatically; 0 selects 5 MiB. Pass
    /// [`MEMORY_PATH`] for a store that lives only in memory.
    ///
    /// If the file cannot be opened it is removed before the error is
    /// returned, so the next open starts from an empty store.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use tabledb::Store;
    ///
    /// # fn main() -> Result<(), tabledb::Error> {
    /// let store = Store::open("./app.db", 5)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn open<P: AsRef<Path>>(path: P, auto_shrink_min_size_mb: u64) -> Result<Self> {
        let path = path.as_ref();
        let store = match Self::open_with_config(path, Config::default()) {
            Ok(store) => store,
            Err(e) => {
                log::error!("can't open {:?}, removing it: {}", path, e);
                if path != Path::new(MEMORY_PATH) {
                    let _ = std::fs::remove_file(path);
                }
                return Err(e);
            }
        };

        let mb = if auto_shrink_min_size_mb == 0 {
            config::DEFAULT_TABLE_SHRINK_MIN_MB
        } else {
            auto_shrink_min_size_mb
        };
        let configured = store
            .read_config()
            .and_then(|current| store.set_config(current.auto_shrink_min_size(mb * config::MIB)));
        if let Err(e) = configured {
            log::error!("can't configure {:?}: {}", path, e);
            return Err(e);
        }

        Ok(store)
    }

    /// Opens the store at `path` with an explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The configuration is invalid
    /// - The log file cannot be opened or created
    /// - A complete log entry cannot be decoded
    pub fn open_with_config<P: AsRef<Path>>(path: P, config: Config) -> Result<Self> {
        config.validate()?;
        let path = path.as_ref().to_path_buf();

        let mut keyspace = Keyspace::default();
        let wal = if path == Path::new(MEMORY_PATH) {
            None
        } else {
            let (wal, batches) = WAL::open(&path)?;
            let now = config.clock.now_millis();
            let replayed = batches.len();
            for batch in batches {
                for op in batch {
                    match op {
                        WriteOp::Set { key, value, expires_at } => {
                            let item = Item::new(&key, &value, expires_at);
                            if item.is_expired(now) {
                                keyspace.remove(&key);
                            } else {
                                keyspace.insert(item);
                            }
                        }
                        WriteOp::Delete { key } => {
                            keyspace.remove(&key);
                        }
                    }
                }
            }
            log::info!(
                "opened {:?}: replayed {} batches, {} live items",
                path,
                replayed,
                keyspace.live_len(now)
            );
            Some(wal)
        };

        let last_shrink_size = wal.as_ref().map_or(0, WAL::size);
        let engine = Engine { keyspace, wal, config, closed: false, last_shrink_size };
        Ok(Self { shared: Arc::new(Shared { path, engine: RwLock::new(engine) }) })
    }

    /// The path this store was opened with.
    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    /// Runs `f` in a read-write transaction.
    ///
    /// If `f` returns an error, or the changes cannot be logged, every change
    /// made inside the transaction is undone and the error is returned.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use tabledb::{Store, MEMORY_PATH};
    /// # fn main() -> Result<(), tabledb::Error> {
    /// let store = Store::open(MEMORY_PATH, 0)?;
    /// store.update(|tx| {
    ///     tx.set("a", "1", None)?;
    ///     tx.set("b", "2", None)?;
    ///     Ok(())
    /// })?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn update<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Tx<'_>) -> Result<R>,
    {
        let engine = self.shared.engine.write();
        if engine.closed {
            return Err(Error::DatabaseClosed);
        }

        let mut tx = Tx::write(engine);
        match f(&mut tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(e) => {
                tx.rollback();
                Err(e)
            }
        }
    }

    /// Runs `f` in a read-only transaction.
    pub fn view<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Tx<'_>) -> Result<R>,
    {
        let engine = self.shared.engine.read();
        if engine.closed {
            return Err(Error::DatabaseClosed);
        }

        let mut tx = Tx::read(engine);
        f(&mut tx)
    }

    /// Returns a copy of the current configuration.
    pub fn read_config(&self) -> Result<Config> {
        let engine = self.shared.engine.read();
        if engine.closed {
            return Err(Error::DatabaseClosed);
        }
        Ok(engine.config.clone())
    }

    /// Replaces the configuration.
    pub fn set_config(&self, config: Config) -> Result<()> {
        config.validate()?;
        let mut engine = self.shared.engine.write();
        if engine.closed {
            return Err(Error::DatabaseClosed);
        }
        engine.config = config;
        Ok(())
    }

    /// Rewrites the log so it only holds the live items.
    ///
    /// Does nothing for an in-memory store.
    pub fn shrink(&self) -> Result<ShrinkStats> {
        let mut engine = self.shared.engine.write();
        if engine.closed {
            return Err(Error::DatabaseClosed);
        }
        engine.shrink()
    }

    /// Derives a table named `name` and ensures its default index exists.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use tabledb::{Store, MEMORY_PATH};
    /// # fn main() -> Result<(), tabledb::Error> {
    /// let store = Store::open(MEMORY_PATH, 0)?;
    /// let orders = store.table("orders")?;
    /// assert_eq!(orders.default_index(), "orders:index-updated");
    /// # Ok(())
    /// # }
    /// ```
    pub fn table(&self, name: &str) -> Result<Table> {
        Table::new(self.clone(), name)
    }

    /// Syncs and closes the log.
    ///
    /// Every later operation through this store, its clones, or its tables
    /// fails with [`Error::DatabaseClosed`].
    pub fn close(&self) -> Result<()> {
        let mut engine = self.shared.engine.write();
        if engine.closed {
            return Err(Error::DatabaseClosed);
        }
        engine.closed = true;
        engine.keyspace.clear();
        log::info!("closing {:?}", self.shared.path);
        match engine.wal.take() {
            Some(wal) => wal.close(),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").field("path", &self.shared.path).finish()
    }
}
