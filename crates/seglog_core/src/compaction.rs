//! Background compaction listener.
//!
//! Consumes sealed segments from the flush pipeline, one at a time, and
//! records each in the [`Index`]. Segments are remembered in a seen list
//! so that later merging work has them at hand; nothing is merged yet.

use crate::health::Health;
use crate::index::Index;
use crate::segment::SegmentInfo;
use crate::stats::WriterStats;
use crate::types::StartTimestamp;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, warn};

/// Backoff between index append attempts.
const RETRY_BACKOFF: Duration = Duration::from_millis(10);

/// Handle to the compaction thread.
pub(crate) struct CompactionListener {
    handle: Option<JoinHandle<()>>,
    health: Health,
}

impl CompactionListener {
    /// Starts the listener on the receiving end of the completed-segment
    /// channel. It exits once every sender is dropped.
    pub(crate) fn spawn(
        index: Arc<Index>,
        stats: Arc<WriterStats>,
        health: Health,
        retries: u32,
        completed: Receiver<SegmentInfo>,
    ) -> std::io::Result<Self> {
        let worker = CompactionWorker {
            index,
            stats,
            health: health.clone(),
            retries,
            seen: Vec::new(),
        };
        let handle = thread::Builder::new()
            .name("seglog-compaction".to_string())
            .spawn(move || worker.run(completed))?;

        Ok(Self {
            handle: Some(handle),
            health,
        })
    }

    /// Waits for the listener to drain its channel and exit.
    pub(crate) fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                self.health.fail("compaction listener panicked");
            }
        }
    }
}

impl Drop for CompactionListener {
    fn drop(&mut self) {
        self.join();
    }
}

struct CompactionWorker {
    index: Arc<Index>,
    stats: Arc<WriterStats>,
    health: Health,
    retries: u32,
    seen: Vec<StartTimestamp>,
}

impl CompactionWorker {
    fn run(mut self, completed: Receiver<SegmentInfo>) {
        for info in completed {
            self.seen.push(info.start_timestamp);

            if let Err(err) = self.record(&info) {
                error!(segment = %info.name, error = %err, "index write failed, halting writer");
                self.stats.record_error();
                self.health
                    .fail(format!("index write failed for segment {}: {err}", info.name));
                return;
            }
            self.stats.record_index();
            debug!(segment = %info.name, "segment indexed");
        }

        debug!(segments = self.seen.len(), "compaction listener drained");
    }

    fn record(&self, info: &SegmentInfo) -> crate::CoreResult<()> {
        let mut attempt = 0;
        loop {
            match self.index.write(info.start_timestamp) {
                Ok(()) => return Ok(()),
                Err(err) if attempt < self.retries => {
                    attempt += 1;
                    warn!(
                        segment = %info.name,
                        attempt,
                        error = %err,
                        "index write failed, retrying"
                    );
                    thread::sleep(RETRY_BACKOFF * attempt);
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dir::LogDir;
    use std::sync::mpsc;
    use tempfile::tempdir;

    fn info(start: i64) -> SegmentInfo {
        let start = StartTimestamp::new(start);
        SegmentInfo {
            name: start.file_name(),
            start_timestamp: start,
            path: start.file_name().into(),
            size: 0,
        }
    }

    #[test]
    fn indexes_segments_in_arrival_order() {
        let temp = tempdir().unwrap();
        let dir = LogDir::open(temp.path(), true).unwrap();
        let index = Arc::new(Index::open(&dir, false).unwrap());
        let stats = Arc::new(WriterStats::new());
        let (tx, rx) = mpsc::sync_channel(4);

        let mut listener =
            CompactionListener::spawn(Arc::clone(&index), Arc::clone(&stats), Health::new(), 0, rx)
                .unwrap();
        for start in [30, 10, 20] {
            tx.send(info(start)).unwrap();
        }
        drop(tx);
        listener.join();

        assert_eq!(
            index.entries(),
            vec![
                StartTimestamp::new(30),
                StartTimestamp::new(10),
                StartTimestamp::new(20)
            ]
        );
        assert_eq!(stats.segments_indexed(), 3);
        assert_eq!(
            std::fs::read_to_string(temp.path().join("index")).unwrap(),
            "30\n10\n20\n"
        );
    }

    #[test]
    fn exits_when_channel_closes() {
        let temp = tempdir().unwrap();
        let dir = LogDir::open(temp.path(), true).unwrap();
        let index = Arc::new(Index::open(&dir, false).unwrap());
        let health = Health::new();
        let (tx, rx) = mpsc::sync_channel::<SegmentInfo>(1);

        let mut listener = CompactionListener::spawn(
            Arc::clone(&index),
            Arc::new(WriterStats::new()),
            health.clone(),
            2,
            rx,
        )
        .unwrap();
        drop(tx);
        listener.join();

        assert!(index.is_empty());
        assert!(health.check().is_ok());
    }
}
