//! Configuration options for the store engine.

use std::sync::Arc;

use crate::clock::{Clock, SystemClock};

/// One mebibyte, the unit of the table-level auto-shrink threshold.
pub const MIB: u64 = 1024 * 1024;

/// Auto-shrink threshold used by [`Store::open`](crate::Store::open) when the
/// caller passes 0 megabytes.
pub const DEFAULT_TABLE_SHRINK_MIN_MB: u64 = 5;

/// How often the log file is fsync'd.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPolicy {
    /// Leave syncing to the operating system.
    Never,
    /// Sync at most once per second, checked at commit time.
    #[default]
    EverySecond,
    /// Sync after every committed write transaction.
    Always,
}

/// Runtime configuration of a [`Store`](crate::Store).
#[derive(Debug, Clone)]
pub struct Config {
    /// When to fsync the log.
    /// Default: SyncPolicy::EverySecond
    pub sync_policy: SyncPolicy,

    /// Growth over the size after the previous shrink, in percent, that
    /// triggers an automatic shrink.
    /// Default: 100
    pub auto_shrink_percentage: u32,

    /// The log must be at least this large (in bytes) before it is shrunk
    /// automatically.
    /// Default: 32MB
    pub auto_shrink_min_size: u64,

    /// Disable automatic shrinking.
    /// Default: false
    pub auto_shrink_disabled: bool,

    /// Time source for expirations.
    /// Default: SystemClock
    pub clock: Arc<dyn Clock>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sync_policy: SyncPolicy::default(),
            auto_shrink_percentage: 100,
            auto_shrink_min_size: 32 * MIB,
            auto_shrink_disabled: false,
            clock: Arc::new(SystemClock),
        }
    }
}

impl Config {
    /// Creates a new Config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the sync policy.
    pub fn sync_policy(mut self, policy: SyncPolicy) -> Self {
        self.sync_policy = policy;
        self
    }

    /// Sets the auto-shrink growth percentage.
    pub fn auto_shrink_percentage(mut self, percentage: u32) -> Self {
        self.auto_shrink_percentage = percentage;
        self
    }

    /// Sets the minimum log size, in bytes, for automatic shrinking.
    pub fn auto_shrink_min_size(mut self, size: u64) -> Self {
        self.auto_shrink_min_size = size;
        self
    }

    /// Enables or disables automatic shrinking.
    pub fn auto_shrink_disabled(mut self, value: bool) -> Self {
        self.auto_shrink_disabled = value;
        self
    }

    /// Sets the clock used for TTL bookkeeping.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Validates the configuration and returns an error if any value is invalid.
    pub fn validate(&self) -> crate::Result<()> {
        if !self.auto_shrink_disabled && self.auto_shrink_percentage == 0 {
            return Err(crate::Error::invalid_argument(
                "auto_shrink_percentage must be > 0 unless auto shrink is disabled",
            ));
        }
        Ok(())
    }
}
