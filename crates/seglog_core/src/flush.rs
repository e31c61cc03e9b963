//! Background flush pipeline.
//!
//! A single thread owns a FIFO queue of memtables and writes each one to
//! its own segment file, strictly in submission order. Completed segments
//! are handed to the compaction listener for indexing.
//!
//! ## States
//!
//! ```text
//!  Running ──Close / disconnect──▶ Closed (drain queue, exit)
//! ```
//!
//! The thread blocks on its command channel while the queue is empty and
//! only polls it between flushes while work is pending.

use crate::dir::LogDir;
use crate::error::{CoreError, CoreResult};
use crate::health::Health;
use crate::memtable::Memtable;
use crate::segment::{SegmentFile, SegmentInfo, SegmentRegistry};
use crate::stats::WriterStats;
use std::collections::VecDeque;
use std::fs;
use std::sync::mpsc::{self, Receiver, SyncSender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, warn};

/// Message from the writer to the flush thread.
pub(crate) enum FlushCommand {
    /// A full memtable to flush.
    Submit(Memtable),
    /// The final memtable; drain everything, acknowledge and stop.
    Close {
        memtable: Memtable,
        ack: SyncSender<()>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Running,
    Closed,
}

/// What the flush thread needs to write and register segments.
pub(crate) struct FlushContext {
    pub dir: LogDir,
    pub registry: Arc<SegmentRegistry>,
    pub stats: Arc<WriterStats>,
    pub health: Health,
    pub size_budget: u64,
    pub sync_on_flush: bool,
}

/// Handle to the flush thread.
pub(crate) struct FlushPipeline {
    sender: Option<SyncSender<FlushCommand>>,
    handle: Option<JoinHandle<()>>,
    health: Health,
}

impl FlushPipeline {
    /// Starts the flush thread.
    ///
    /// `completed` receives every sealed segment, in flush order.
    pub(crate) fn spawn(
        context: FlushContext,
        queue_depth: usize,
        completed: SyncSender<SegmentInfo>,
    ) -> CoreResult<Self> {
        let (sender, receiver) = mpsc::sync_channel(queue_depth);
        let health = context.health.clone();

        let worker = FlushWorker {
            context,
            completed,
            queue: VecDeque::new(),
            state: State::Running,
        };
        let handle = thread::Builder::new()
            .name("seglog-flush".to_string())
            .spawn(move || worker.run(receiver))?;

        Ok(Self {
            sender: Some(sender),
            handle: Some(handle),
            health,
        })
    }

    /// Hands a full memtable to the flush thread.
    ///
    /// Blocks until the thread accepts it.
    pub(crate) fn submit(&self, memtable: Memtable) -> CoreResult<()> {
        let sender = self.sender.as_ref().ok_or(CoreError::WriterClosed)?;
        sender
            .send(FlushCommand::Submit(memtable))
            .map_err(|_| self.health.stopped("flush pipeline"))
    }

    /// Sends the final memtable, waits until the queue is drained and joins
    /// the thread.
    pub(crate) fn close(&mut self, memtable: Memtable) -> CoreResult<()> {
        let sender = self.sender.take().ok_or(CoreError::WriterClosed)?;
        let (ack_tx, ack_rx) = mpsc::sync_channel(1);

        let sent = sender.send(FlushCommand::Close {
            memtable,
            ack: ack_tx,
        });
        drop(sender);
        let acked = sent.is_ok() && ack_rx.recv().is_ok();

        self.join();
        if acked {
            self.health.check()
        } else {
            Err(self.health.stopped("flush pipeline"))
        }
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                self.health.fail("flush pipeline panicked");
            }
        }
    }
}

impl Drop for FlushPipeline {
    fn drop(&mut self) {
        self.sender.take();
        self.join();
    }
}

struct FlushWorker {
    context: FlushContext,
    completed: SyncSender<SegmentInfo>,
    queue: VecDeque<Memtable>,
    state: State,
}

impl FlushWorker {
    fn run(mut self, receiver: Receiver<FlushCommand>) {
        let mut ack = None;

        loop {
            if self.state == State::Running {
                let command = if self.queue.is_empty() {
                    receiver.recv().ok()
                } else {
                    match receiver.try_recv() {
                        Ok(command) => Some(command),
                        Err(TryRecvError::Empty) => None,
                        Err(TryRecvError::Disconnected) => {
                            self.state = State::Closed;
                            None
                        }
                    }
                };

                match command {
                    Some(FlushCommand::Submit(memtable)) => self.queue.push_back(memtable),
                    Some(FlushCommand::Close { memtable, ack: reply }) => {
                        self.queue.push_back(memtable);
                        self.state = State::Closed;
                        ack = Some(reply);
                    }
                    None if self.queue.is_empty() => self.state = State::Closed,
                    None => {}
                }
            }

            let Some(memtable) = self.queue.pop_front() else {
                if self.state == State::Closed {
                    break;
                }
                continue;
            };

            if let Err(err) = self.flush(memtable) {
                error!(error = %err, "segment flush failed, halting writer");
                self.context.stats.record_error();
                self.context.health.fail(format!("segment flush failed: {err}"));
                return;
            }
        }

        debug!("flush pipeline drained");
        // The compaction listener drains and exits once `completed` is dropped.
        drop(self.completed);
        if let Some(ack) = ack {
            let _ = ack.send(());
        }
    }

    fn flush(&self, memtable: Memtable) -> CoreResult<()> {
        let Some(start) = memtable.start_timestamp() else {
            return Ok(());
        };
        let ctx = &self.context;

        let mut segment = SegmentFile::create(&ctx.dir, start, ctx.size_budget)?;
        ctx.registry.register(segment.info())?;
        debug!(segment = segment.name(), records = memtable.len(), "flushing memtable");

        let written = self.write_or_discard(&mut segment, &memtable)?;
        if ctx.sync_on_flush {
            ctx.dir.sync()?;
        }

        if segment.is_over_budget() {
            warn!(
                segment = segment.name(),
                size = segment.occupied_size(),
                budget = segment.size_budget(),
                "segment exceeds size budget"
            );
            ctx.stats.record_budget_overrun();
        }

        let info = ctx
            .registry
            .seal(start, segment.occupied_size())
            .ok_or_else(|| CoreError::invalid_operation(format!("segment {start} vanished from registry")))?;
        ctx.stats.record_flush(written);

        self.completed
            .send(info)
            .map_err(|_| ctx.health.stopped("compaction listener"))
    }

    /// Writes `memtable` into `segment`. On failure the segment is
    /// unregistered and its partial file removed, so recovery never adopts
    /// it as a complete segment.
    fn write_or_discard(&self, segment: &mut SegmentFile, memtable: &Memtable) -> CoreResult<u64> {
        let ctx = &self.context;
        write_segment(segment, memtable, ctx.sync_on_flush).map_err(|err| {
            ctx.registry.unregister(segment.start_timestamp());
            if let Err(remove_err) = fs::remove_file(segment.path()) {
                warn!(
                    segment = segment.name(),
                    error = %remove_err,
                    "failed to remove partial segment"
                );
            }
            err
        })
    }
}

fn write_segment(segment: &mut SegmentFile, memtable: &Memtable, sync: bool) -> CoreResult<u64> {
    let written = memtable.flush(segment.writer()?)?;
    if sync {
        segment.sync()?;
    }
    segment.close()?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Level, Record, TimestampFormat};
    use crate::types::StartTimestamp;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    fn memtable(start_secs: i64, messages: &[&str]) -> Memtable {
        let mut memtable = Memtable::new(4096);
        for (i, message) in messages.iter().enumerate() {
            memtable.append(Record::at(
                Utc.timestamp_opt(start_secs + i as i64, 0).unwrap(),
                message.as_bytes().to_vec(),
                Level::Info,
                TimestampFormat::Utc,
            ));
        }
        memtable
    }

    fn context(dir: &LogDir) -> (FlushContext, Arc<SegmentRegistry>, Health) {
        let registry = Arc::new(SegmentRegistry::new());
        let health = Health::new();
        let context = FlushContext {
            dir: dir.clone(),
            registry: Arc::clone(&registry),
            stats: Arc::new(WriterStats::new()),
            health: health.clone(),
            size_budget: 1024,
            sync_on_flush: false,
        };
        (context, registry, health)
    }

    #[test]
    fn flushes_in_submission_order() {
        let temp = tempdir().unwrap();
        let dir = LogDir::open(temp.path(), true).unwrap();
        let (ctx, registry, _) = context(&dir);
        let (done_tx, done_rx) = mpsc::sync_channel(16);

        let mut pipeline = FlushPipeline::spawn(ctx, 0, done_tx).unwrap();
        pipeline.submit(memtable(1_000, &["a", "b"])).unwrap();
        pipeline.submit(memtable(2_000, &["c"])).unwrap();
        pipeline.close(memtable(3_000, &["d"])).unwrap();

        let completed: Vec<_> = done_rx.iter().map(|info| info.start_timestamp).collect();
        assert_eq!(
            completed,
            vec![
                StartTimestamp::new(1_000_000_000_000),
                StartTimestamp::new(2_000_000_000_000),
                StartTimestamp::new(3_000_000_000_000)
            ]
        );
        assert_eq!(registry.sealed_count(), 3);
        assert_eq!(
            std::fs::read_to_string(temp.path().join("1000000000000")).unwrap(),
            "[1970-01-01T00:16:40Z] info a\n[1970-01-01T00:16:41Z] info b\n"
        );
    }

    #[test]
    fn empty_memtable_is_not_flushed() {
        let temp = tempdir().unwrap();
        let dir = LogDir::open(temp.path(), true).unwrap();
        let (ctx, registry, _) = context(&dir);
        let (done_tx, done_rx) = mpsc::sync_channel(16);

        let mut pipeline = FlushPipeline::spawn(ctx, 0, done_tx).unwrap();
        pipeline.close(Memtable::new(16)).unwrap();

        assert_eq!(done_rx.iter().count(), 0);
        assert!(registry.is_empty());
        assert!(dir.list_segments().unwrap().is_empty());
    }

    #[test]
    fn collision_halts_pipeline() {
        let temp = tempdir().unwrap();
        let dir = LogDir::open(temp.path(), true).unwrap();
        std::fs::write(temp.path().join("5000000000000"), b"existing\n").unwrap();
        let (ctx, _, health) = context(&dir);
        let (done_tx, _done_rx) = mpsc::sync_channel(16);

        let mut pipeline = FlushPipeline::spawn(ctx, 0, done_tx).unwrap();
        let err = pipeline.close(memtable(5_000, &["clobber"])).unwrap_err();

        assert!(matches!(err, CoreError::PipelineFailed { .. }));
        assert!(health.failure().unwrap().contains("already exists"));
        assert_eq!(
            std::fs::read(temp.path().join("5000000000000")).unwrap(),
            b"existing\n"
        );
    }

    #[test]
    fn failed_write_removes_partial_segment() {
        use seglog_storage::StorageBackend;

        let temp = tempdir().unwrap();
        let dir = LogDir::open(temp.path(), true).unwrap();
        let (ctx, registry, _) = context(&dir);
        let (done_tx, done_rx) = mpsc::sync_channel(16);
        let worker = FlushWorker {
            context: ctx,
            completed: done_tx,
            queue: VecDeque::new(),
            state: State::Running,
        };

        let start = StartTimestamp::new(7_000_000_000_000);
        let mut segment = SegmentFile::create(&dir, start, 1024).unwrap();
        registry.register(segment.info()).unwrap();
        segment.writer().unwrap().append(b"[1970-01-01T01:56:40Z] in").unwrap();
        // A closed segment refuses further writes.
        segment.close().unwrap();

        let err = worker
            .write_or_discard(&mut segment, &memtable(7_000, &["lost"]))
            .unwrap_err();

        assert!(err.is_state_error());
        assert!(!registry.contains(start));
        assert!(!temp.path().join(start.file_name()).exists());
        assert!(dir.list_segments().unwrap().is_empty());
        drop(worker);
        assert_eq!(done_rx.iter().count(), 0);
    }

    #[test]
    fn submit_after_close_is_rejected() {
        let temp = tempdir().unwrap();
        let dir = LogDir::open(temp.path(), true).unwrap();
        let (ctx, _, _) = context(&dir);
        let (done_tx, _done_rx) = mpsc::sync_channel(16);

        let mut pipeline = FlushPipeline::spawn(ctx, 0, done_tx).unwrap();
        pipeline.close(Memtable::new(16)).unwrap();

        assert!(matches!(
            pipeline.submit(memtable(1, &["late"])),
            Err(CoreError::WriterClosed)
        ));
        assert!(matches!(
            pipeline.close(Memtable::new(16)),
            Err(CoreError::WriterClosed)
        ));
    }
}
