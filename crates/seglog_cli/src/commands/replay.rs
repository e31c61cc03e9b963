//! Replay command implementation.

use seglog_core::{Index, Level, LogDir, Record, Replay, SegmentInfo};
use serde::Serialize;
use std::collections::BTreeSet;
use std::io::{self, Write};
use std::path::Path;
use tracing::warn;

/// One replayed record in JSON output.
#[derive(Debug, Serialize)]
pub struct ReplayLine {
    /// RFC 3339 timestamp.
    pub timestamp: String,
    /// Record level.
    pub level: Level,
    /// Message, lossily decoded as UTF-8.
    pub message: String,
}

impl From<&Record> for ReplayLine {
    fn from(record: &Record) -> Self {
        Self {
            timestamp: record.timestamp().to_rfc3339(),
            level: record.level(),
            message: String::from_utf8_lossy(record.message()).into_owned(),
        }
    }
}

/// Runs the replay command.
///
/// Only indexed segments are replayed and nothing in the directory is
/// modified. Corrupt lines are reported on stderr and replay moves on to
/// the next segment.
pub fn run(
    path: &Path,
    limit: Option<usize>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let replay = open_replay(path)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut printed = 0usize;
    let mut errors = 0usize;

    for record in replay {
        if limit.is_some_and(|limit| printed >= limit) {
            break;
        }
        match record {
            Ok(record) => {
                match format {
                    "json" => {
                        let line = serde_json::to_string(&ReplayLine::from(&record))?;
                        writeln!(out, "{line}")?;
                    }
                    _ => writeln!(out, "{record}")?,
                }
                printed += 1;
            }
            Err(err) => {
                errors += 1;
                eprintln!("error: {err}");
            }
        }
    }
    out.flush()?;

    if errors > 0 {
        return Err(format!("{errors} segment(s) could not be fully replayed").into());
    }
    Ok(())
}

/// Builds a replay over the indexed segments of `path` without opening a
/// writer. A torn index tail is ignored and missing segments are skipped.
pub fn open_replay(path: &Path) -> Result<Replay, Box<dyn std::error::Error>> {
    let dir = LogDir::open(path, false)?;
    let (entries, torn) = Index::read_entries(dir.index_path())?;
    if torn > 0 {
        warn!(bytes = torn, "ignoring unterminated index entry");
    }

    let on_disk: BTreeSet<_> = dir.list_segments()?.into_iter().collect();
    let mut seen = BTreeSet::new();
    let mut segments = Vec::with_capacity(entries.len());
    for start in entries {
        if !on_disk.contains(&start) {
            warn!(segment = %start, "indexed segment file is missing");
            continue;
        }
        if seen.insert(start) {
            segments.push(SegmentInfo::stat(&dir, start)?);
        }
    }
    Ok(Replay::new(segments))
}
