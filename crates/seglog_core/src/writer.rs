//! The log writer.

use crate::compaction::CompactionListener;
use crate::config::Config;
use crate::dir::LogDir;
use crate::error::{CoreError, CoreResult};
use crate::flush::{FlushContext, FlushPipeline};
use crate::health::Health;
use crate::index::Index;
use crate::memtable::Memtable;
use crate::record::{Level, Record, TimestampFormat};
use crate::replay::Replay;
use crate::segment::{SegmentInfo, SegmentRegistry};
use crate::stats::{StatsSnapshot, WriterStats};
use crate::types::StartTimestamp;
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;
use std::sync::mpsc;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy)]
struct Settings {
    level: Level,
    timestamp_format: TimestampFormat,
}

/// An append-only log writer over one log directory.
///
/// Records are buffered in a [`Memtable`]. When a record would overflow it,
/// the whole memtable is handed to the background flush pipeline and a
/// fresh one takes its place; the record then goes into the fresh one.
/// Flushed segments are indexed by a second background thread.
///
/// One writer per directory. `write` and `close` take `&mut self`, so
/// records are totally ordered by call order.
///
/// Dropping an open writer closes it.
pub struct LogWriter {
    dir: LogDir,
    config: Config,
    settings: RwLock<Settings>,
    memtable: Memtable,
    last_start: Option<StartTimestamp>,
    registry: Arc<SegmentRegistry>,
    index: Arc<Index>,
    stats: Arc<WriterStats>,
    health: Health,
    flush: FlushPipeline,
    compaction: CompactionListener,
    closed: bool,
}

impl LogWriter {
    /// Opens a writer with the given buffer capacity and advisory segment
    /// size budget, using defaults for everything else.
    ///
    /// # Errors
    ///
    /// See [`LogWriter::open`].
    pub fn new(
        path: impl AsRef<Path>,
        buffer_capacity: usize,
        segment_size_budget: u64,
    ) -> CoreResult<Self> {
        let config = Config::new()
            .buffer_capacity(buffer_capacity)
            .segment_size_budget(segment_size_budget);
        Self::open(path, config)
    }

    /// Opens a writer over `path`.
    ///
    /// Segments recorded in the index become visible to [`LogWriter::replay`].
    /// With `adopt_unindexed_segments`, segment files missing from the index
    /// are appended to it first.
    ///
    /// # Errors
    ///
    /// Returns an error if the capacity is zero, the directory cannot be
    /// opened, the index is corrupt, or a background thread fails to start.
    pub fn open(path: impl AsRef<Path>, config: Config) -> CoreResult<Self> {
        if config.buffer_capacity == 0 {
            return Err(CoreError::invalid_operation("buffer capacity must be non-zero"));
        }

        let dir = LogDir::open(path.as_ref(), config.create_if_missing)?;
        let index = Arc::new(Index::open(&dir, config.sync_on_flush)?);
        let (registry, last_start) = recover(&dir, &index, config.adopt_unindexed_segments)?;
        let registry = Arc::new(registry);

        let stats = Arc::new(WriterStats::new());
        let health = Health::new();

        let (completed_tx, completed_rx) = mpsc::sync_channel(config.compaction_queue_depth);
        let compaction = CompactionListener::spawn(
            Arc::clone(&index),
            Arc::clone(&stats),
            health.clone(),
            config.index_write_retries,
            completed_rx,
        )?;
        let flush = FlushPipeline::spawn(
            FlushContext {
                dir: dir.clone(),
                registry: Arc::clone(&registry),
                stats: Arc::clone(&stats),
                health: health.clone(),
                size_budget: config.segment_size_budget,
                sync_on_flush: config.sync_on_flush,
            },
            config.submit_queue_depth,
            completed_tx,
        )?;

        info!(
            path = %dir.path().display(),
            segments = registry.sealed_count(),
            buffer_capacity = config.buffer_capacity,
            "opened log writer"
        );

        Ok(Self {
            memtable: Memtable::new(config.buffer_capacity),
            settings: RwLock::new(Settings {
                level: config.level,
                timestamp_format: config.timestamp_format,
            }),
            dir,
            config,
            last_start,
            registry,
            index,
            stats,
            health,
            flush,
            compaction,
            closed: false,
        })
    }

    /// Reads `payload` to the end and appends it as one record.
    ///
    /// Returns the encoded size of the record, without its terminator.
    /// Blocks only while handing a full memtable to the flush pipeline.
    ///
    /// # Errors
    ///
    /// - [`CoreError::WriterClosed`] after [`LogWriter::close`].
    /// - [`CoreError::PipelineFailed`] once a background task has failed.
    /// - [`CoreError::InvalidRecord`] if the payload contains `\n`.
    /// - [`CoreError::RecordTooLarge`] if the record cannot fit in an empty
    ///   memtable.
    /// - An I/O error if reading `payload` fails.
    pub fn write(&mut self, mut payload: impl Read) -> CoreResult<usize> {
        if self.closed {
            return Err(CoreError::WriterClosed);
        }
        self.health.check()?;

        let mut message = Vec::new();
        payload.read_to_end(&mut message)?;
        if message.contains(&b'\n') {
            return Err(CoreError::invalid_record("payload contains a line terminator"));
        }

        let settings = *self.settings.read();
        let record = Record::format(message, settings.level, settings.timestamp_format);
        let size = record.size();

        if size + 1 > self.config.buffer_capacity {
            return Err(CoreError::RecordTooLarge {
                size: size + 1,
                capacity: self.config.buffer_capacity,
            });
        }
        if !self.memtable.fits(size) {
            self.rotate()?;
        }

        let first = self.memtable.is_empty();
        self.memtable.append(record);
        if first {
            if let Some(previous) = self.last_start {
                self.memtable.start_after(previous);
            }
            self.last_start = self.memtable.start_timestamp();
        }

        self.stats.record_write(size as u64 + 1);
        Ok(size)
    }

    fn rotate(&mut self) -> CoreResult<()> {
        let full = std::mem::replace(&mut self.memtable, Memtable::new(self.config.buffer_capacity));
        debug!(
            records = full.len(),
            bytes = full.occupied_size(),
            "submitting full memtable"
        );
        self.flush.submit(full)?;
        self.stats.record_submit();
        Ok(())
    }

    /// Sets the level of subsequently written records.
    pub fn set_level(&self, level: Level) {
        self.settings.write().level = level;
    }

    /// Sets the timestamp format of subsequently written records.
    pub fn set_timestamp_format(&self, format: TimestampFormat) {
        self.settings.write().timestamp_format = format;
    }

    /// Returns the current record level.
    #[must_use]
    pub fn level(&self) -> Level {
        self.settings.read().level
    }

    /// Returns the current timestamp format.
    #[must_use]
    pub fn timestamp_format(&self) -> TimestampFormat {
        self.settings.read().timestamp_format
    }

    /// Flushes the current memtable and waits until every submitted
    /// memtable is written and indexed.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::WriterClosed`] if already closed, or
    /// [`CoreError::PipelineFailed`] if a background task failed.
    pub fn close(&mut self) -> CoreResult<()> {
        if self.closed {
            return Err(CoreError::WriterClosed);
        }
        self.closed = true;

        let last = std::mem::replace(&mut self.memtable, Memtable::new(0));
        if !last.is_empty() {
            self.stats.record_submit();
        }
        let result = self.flush.close(last);
        self.compaction.join();
        let result = result.and_then(|()| self.health.check());

        info!(
            path = %self.dir.path().display(),
            segments = self.registry.sealed_count(),
            indexed = self.index.len(),
            "closed log writer"
        );
        result
    }

    /// Returns true once [`LogWriter::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Returns a lazy replay of every sealed segment.
    ///
    /// Records still buffered or queued for flush are not included.
    ///
    /// # Errors
    ///
    /// Currently infallible; opening segments is deferred to iteration.
    pub fn replay(&self) -> CoreResult<Replay> {
        Ok(Replay::new(self.registry.sealed()))
    }

    /// Returns a snapshot of the writer's counters.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Returns the number of sealed segments.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.registry.sealed_count()
    }

    /// Returns the number of index entries.
    #[must_use]
    pub fn index_len(&self) -> usize {
        self.index.len()
    }

    /// Returns the number of records in the current memtable.
    #[must_use]
    pub fn buffered_records(&self) -> usize {
        self.memtable.len()
    }

    /// Returns the log directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Returns the configuration the writer was opened with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Drop for LogWriter {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(err) = self.close() {
            error!(path = %self.dir.path().display(), error = %err, "failed to close log writer on drop");
        }
    }
}

impl std::fmt::Debug for LogWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogWriter")
            .field("path", &self.dir.path())
            .field("segments", &self.registry.sealed_count())
            .field("buffered_records", &self.memtable.len())
            .field("closed", &self.closed)
            .finish()
    }
}

/// Rebuilds the registry from the index and the segment files on disk.
///
/// Returns the registry and the highest segment start found on disk.
fn recover(
    dir: &LogDir,
    index: &Index,
    adopt: bool,
) -> CoreResult<(SegmentRegistry, Option<StartTimestamp>)> {
    let registry = SegmentRegistry::new();
    let on_disk: BTreeSet<StartTimestamp> = dir.list_segments()?.into_iter().collect();

    let mut missing = 0;
    for start in index.entries() {
        if !on_disk.contains(&start) {
            warn!(segment = %start, "indexed segment file is missing");
            missing += 1;
            continue;
        }
        if registry.contains(start) {
            warn!(segment = %start, "duplicate index entry");
            continue;
        }
        registry.register_sealed(SegmentInfo::stat(dir, start)?)?;
    }

    let orphans: Vec<StartTimestamp> = on_disk
        .iter()
        .copied()
        .filter(|start| !registry.contains(*start))
        .collect();
    if adopt {
        for start in &orphans {
            registry.register_sealed(SegmentInfo::stat(dir, *start)?)?;
            index.write(*start)?;
            warn!(segment = %start, "adopted unindexed segment");
        }
    } else if !orphans.is_empty() {
        warn!(count = orphans.len(), "ignoring unindexed segment files");
    }

    if missing > 0 || !orphans.is_empty() {
        info!(
            segments = registry.len(),
            missing,
            orphans = orphans.len(),
            "recovered segment registry"
        );
    }

    Ok((registry, on_disk.last().copied()))
}
