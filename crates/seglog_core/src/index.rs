//! Durable ledger of completed segments.
//!
//! The index file holds one decimal start timestamp per line, in the order
//! segments completed:
//!
//! ```text
//! 1700000000123456789
//! 1700000004987654321
//! ```
//!
//! ## Recovery Policy
//!
//! - A final line without its terminator is a torn append. It is cut off
//!   and loading continues.
//! - Any complete line that is not a decimal integer is fatal: the index is
//!   trusted to resume from, so a corrupt one must not be guessed around.

use crate::dir::LogDir;
use crate::error::{CoreError, CoreResult};
use crate::types::StartTimestamp;
use parking_lot::Mutex;
use seglog_storage::{FileBackend, StorageBackend};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// The segment index.
///
/// One lock covers both the file append and the in-memory list, so
/// [`Index::len`] always agrees with what is durable on disk.
#[derive(Debug)]
pub struct Index {
    path: PathBuf,
    sync_on_write: bool,
    inner: Mutex<IndexInner>,
}

#[derive(Debug)]
struct IndexInner {
    backend: FileBackend,
    entries: Vec<StartTimestamp>,
}

impl Index {
    /// Loads the index in `directory`, creating an empty one if absent.
    ///
    /// Appends are synced to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or any complete line
    /// fails to parse.
    pub fn load(directory: impl AsRef<Path>) -> CoreResult<Self> {
        let dir = LogDir::open(directory.as_ref(), true)?;
        Self::open(&dir, true)
    }

    /// Loads the index of an already opened log directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or any complete line
    /// fails to parse.
    pub fn open(dir: &LogDir, sync_on_write: bool) -> CoreResult<Self> {
        let path = dir.index_path();
        let mut backend = FileBackend::open(&path)?;

        let size = backend.size()?;
        let data = backend.read_at(0, size as usize)?;

        let complete = complete_len(&data);
        if complete < data.len() {
            warn!(
                path = %path.display(),
                torn_bytes = data.len() - complete,
                "truncating torn index tail"
            );
            backend.truncate(complete as u64)?;
        }

        let entries = parse_entries(&data[..complete])?;
        debug!(path = %path.display(), entries = entries.len(), "loaded segment index");

        Ok(Self {
            path,
            sync_on_write,
            inner: Mutex::new(IndexInner { backend, entries }),
        })
    }

    /// Reads the entries of the index file at `path` without opening it
    /// for writing.
    ///
    /// Returns the entries and the length of an unterminated final line,
    /// which is ignored. A missing file reads as empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or any complete line
    /// fails to parse.
    pub fn read_entries(path: impl AsRef<Path>) -> CoreResult<(Vec<StartTimestamp>, usize)> {
        let data = match std::fs::read(path.as_ref()) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(err) => return Err(err.into()),
        };
        let complete = complete_len(&data);
        Ok((parse_entries(&data[..complete])?, data.len() - complete))
    }

    /// Appends `start` to the index file and then to the in-memory list.
    ///
    /// # Errors
    ///
    /// Returns an error if the append fails. A partial append is cut back
    /// off before returning, and the in-memory list is left unchanged.
    pub fn write(&self, start: StartTimestamp) -> CoreResult<()> {
        let mut inner = self.inner.lock();
        let line = format!("{start}\n");

        let before = inner.backend.size()?;
        let result = inner.backend.append(line.as_bytes()).and_then(|_| {
            if self.sync_on_write {
                inner.backend.sync()
            } else {
                inner.backend.flush()
            }
        });

        if let Err(err) = result {
            if let Err(undo) = inner.backend.truncate(before) {
                warn!(path = %self.path.display(), error = %undo, "failed to undo partial index append");
            }
            return Err(err.into());
        }

        inner.entries.push(start);
        Ok(())
    }

    /// Returns the number of indexed segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Returns true if no segment has been indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Returns a copy of all entries in completion order.
    #[must_use]
    pub fn entries(&self) -> Vec<StartTimestamp> {
        self.inner.lock().entries.clone()
    }

    /// Returns the most recently indexed segment.
    #[must_use]
    pub fn last(&self) -> Option<StartTimestamp> {
        self.inner.lock().entries.last().copied()
    }

    /// Returns the path of the index file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Length of `data` up to and including its last line terminator.
fn complete_len(data: &[u8]) -> usize {
    data.iter().rposition(|&b| b == b'\n').map_or(0, |pos| pos + 1)
}

fn parse_entries(data: &[u8]) -> CoreResult<Vec<StartTimestamp>> {
    let mut entries = Vec::new();

    // `data` ends with a terminator, so the last split piece is empty.
    let mut lines = data.split(|&b| b == b'\n');
    lines.next_back();

    for (i, line) in lines.enumerate() {
        let text = std::str::from_utf8(line)
            .map_err(|_| CoreError::index_corruption(i + 1, "entry is not UTF-8"))?;
        let start = text.parse::<StartTimestamp>().map_err(|e| {
            CoreError::index_corruption(i + 1, format!("invalid start timestamp {text:?}: {e}"))
        })?;
        entries.push(start);
    }

    Ok(entries)
}
