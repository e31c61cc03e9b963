//! Log writer configuration.

use crate::record::{Level, TimestampFormat};

/// Configuration for opening a [`crate::LogWriter`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Memtable capacity in bytes.
    pub buffer_capacity: usize,

    /// Advisory per-segment size budget in bytes.
    ///
    /// A memtable is always flushed whole to one segment; exceeding the
    /// budget is only reported.
    pub segment_size_budget: u64,

    /// Level stamped on records until changed with `set_level`.
    pub level: Level,

    /// Timestamp format used until changed with `set_timestamp_format`.
    pub timestamp_format: TimestampFormat,

    /// Whether to create the log directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to fsync every segment and index append.
    pub sync_on_flush: bool,

    /// Bound of the submit channel. 0 makes every hand-off a rendezvous.
    pub submit_queue_depth: usize,

    /// Bound of the completed-segment channel.
    pub compaction_queue_depth: usize,

    /// Retries for a failed index append before it is treated as fatal.
    pub index_write_retries: u32,

    /// Whether to index segment files found on disk but missing from the index.
    pub adopt_unindexed_segments: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            buffer_capacity: 1024 * 1024,           // 1 MB
            segment_size_budget: 64 * 1024 * 1024, // 64 MB
            level: Level::Info,
            timestamp_format: TimestampFormat::Local,
            create_if_missing: true,
            sync_on_flush: true,
            submit_queue_depth: 0,
            compaction_queue_depth: 16,
            index_write_retries: 0,
            adopt_unindexed_segments: true,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the memtable capacity.
    #[must_use]
    pub const fn buffer_capacity(mut self, bytes: usize) -> Self {
        self.buffer_capacity = bytes;
        self
    }

    /// Sets the advisory segment size budget.
    #[must_use]
    pub const fn segment_size_budget(mut self, bytes: u64) -> Self {
        self.segment_size_budget = bytes;
        self
    }

    /// Sets the initial record level.
    #[must_use]
    pub const fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Sets the initial timestamp format.
    #[must_use]
    pub const fn timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.timestamp_format = format;
        self
    }

    /// Sets whether to create the log directory if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to fsync segment and index writes.
    #[must_use]
    pub const fn sync_on_flush(mut self, value: bool) -> Self {
        self.sync_on_flush = value;
        self
    }

    /// Sets the submit channel bound.
    #[must_use]
    pub const fn submit_queue_depth(mut self, depth: usize) -> Self {
        self.submit_queue_depth = depth;
        self
    }

    /// Sets the completed-segment channel bound.
    #[must_use]
    pub const fn compaction_queue_depth(mut self, depth: usize) -> Self {
        self.compaction_queue_depth = depth;
        self
    }

    /// Sets how often a failed index append is retried.
    #[must_use]
    pub const fn index_write_retries(mut self, retries: u32) -> Self {
        self.index_write_retries = retries;
        self
    }

    /// Sets whether unindexed segment files are adopted on open.
    #[must_use]
    pub const fn adopt_unindexed_segments(mut self, value: bool) -> Self {
        self.adopt_unindexed_segments = value;
        self
    }
}
