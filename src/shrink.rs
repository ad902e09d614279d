//! Log shrinking.
//!
//! The log only ever grows: overwritten and deleted keys keep their old
//! entries. Shrinking rewrites it so it holds exactly one `set` per live item.
//!
//! ## Process
//!
//! 1. Write the live items, in key order, to `<log>.shrink` in fixed-size batches
//! 2. Sync the new file
//! 3. Rename it over the log and reopen the writer
//!
//! A crash before the rename leaves the old log untouched; the stale
//! `.shrink` file is overwritten by the next attempt.

use std::fs;
use std::path::PathBuf;

use crate::config::Config;
use crate::error::Result;
use crate::keyspace::Item;
use crate::wal::{WALWriter, WAL};
use crate::write_batch::WriteBatch;

/// Number of items written per batch in the rewritten log.
const ITEMS_PER_BATCH: usize = 1000;

/// Outcome of a shrink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShrinkStats {
    /// Log size before the rewrite
    pub size_before: u64,
    /// Log size after the rewrite
    pub size_after: u64,
    /// Items written to the new log
    pub items: usize,
}

/// Whether the log has grown enough to be shrunk automatically.
pub(crate) fn should_shrink(config: &Config, size: u64, last_shrink_size: u64) -> bool {
    if config.auto_shrink_disabled || size <= config.auto_shrink_min_size {
        return false;
    }
    let growth = last_shrink_size.saturating_mul(u64::from(config.auto_shrink_percentage)) / 100;
    size > last_shrink_size.saturating_add(growth)
}

/// Rewrite `wal` so it contains only `items`.
pub(crate) fn rewrite<'a>(
    wal: &mut WAL,
    items: impl Iterator<Item = &'a Item>,
) -> Result<ShrinkStats> {
    let size_before = wal.size();
    let tmp_path = shrink_path(wal);
    if tmp_path.exists() {
        fs::remove_file(&tmp_path)?;
    }

    let mut written = 0;
    {
        let mut writer = WALWriter::new(&tmp_path)?;
        let mut batch = WriteBatch::new();
        for item in items {
            batch.set(&item.key, &item.value, item.expires_at);
            written += 1;
            if batch.len() >= ITEMS_PER_BATCH {
                writer.append(&batch.encode()?)?;
                batch.clear();
            }
        }
        if !batch.is_empty() {
            writer.append(&batch.encode()?)?;
        }
        writer.close()?;
    }

    wal.replace_with(&tmp_path)?;
    let stats = ShrinkStats { size_before, size_after: wal.size(), items: written };
    log::info!(
        "shrunk {:?}: {} -> {} bytes, {} items",
        wal.path(),
        stats.size_before,
        stats.size_after,
        stats.items
    );
    Ok(stats)
}

fn shrink_path(wal: &WAL) -> PathBuf {
    let mut name = wal.path().as_os_str().to_os_string();
    name.push(".shrink");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncPolicy;
    use tempfile::TempDir;

    #[test]
    fn test_should_shrink_thresholds() {
        let config = Config::new().auto_shrink_min_size(1000).auto_shrink_percentage(100);

        // below minimum size
        assert!(!should_shrink(&config, 900, 0));
        // above minimum, doubled since last shrink
        assert!(should_shrink(&config, 2001, 1000));
        // above minimum, not yet doubled
        assert!(!should_shrink(&config, 1999, 1000));

        let disabled = config.clone().auto_shrink_disabled(true);
        assert!(!should_shrink(&disabled, 1_000_000, 0));
    }

    #[test]
    fn test_rewrite_keeps_only_given_items() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.db");
        let (mut wal, _) = WAL::open(&path).unwrap();

        for i in 0..50 {
            let mut batch = WriteBatch::new();
            batch.set("hot", &format!("value-{}", i), None);
            wal.append_batch(&batch, SyncPolicy::Never).unwrap();
        }

        let live = [Item::new("hot", "value-49", None), Item::new("ttl", "x", Some(99))];
        let stats = rewrite(&mut wal, live.iter()).unwrap();
        assert_eq!(stats.items, 2);
        assert!(stats.size_after < stats.size_before);
        drop(wal);

        let (_wal, replayed) = WAL::open(&path).unwrap();
        assert_eq!(replayed.len(), 1);
        assert_eq!(replayed[0].len(), 2);
    }
}
