//! A single segment file.

use crate::dir::LogDir;
use crate::error::{CoreError, CoreResult};
use crate::types::StartTimestamp;
use seglog_storage::{FileBackend, StorageBackend, StorageError};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Immutable description of a segment on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentInfo {
    /// Segment name, the decimal start timestamp.
    pub name: String,
    /// Start timestamp of the memtable the segment was flushed from.
    pub start_timestamp: StartTimestamp,
    /// Path of the segment file.
    pub path: PathBuf,
    /// Size in bytes.
    pub size: u64,
}

impl SegmentInfo {
    /// Describes the existing segment starting at `start` in `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the segment file cannot be stat'ed.
    pub fn stat(dir: &LogDir, start: StartTimestamp) -> CoreResult<Self> {
        let path = dir.segment_path(start);
        let size = std::fs::metadata(&path)?.len();
        Ok(Self {
            name: start.file_name(),
            start_timestamp: start,
            path,
            size,
        })
    }

    /// Opens the segment for sequential reading.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn open_reader(&self) -> CoreResult<BufReader<File>> {
        Ok(BufReader::new(File::open(&self.path)?))
    }
}

/// A segment being written by the flush pipeline.
///
/// The file is created exclusively: a segment whose name is already taken
/// is a construction error, never an overwrite.
#[derive(Debug)]
pub struct SegmentFile {
    name: String,
    start_timestamp: StartTimestamp,
    size_budget: u64,
    path: PathBuf,
    backend: Option<FileBackend>,
    occupied_size: u64,
}

impl SegmentFile {
    /// Creates a new, empty segment file in `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DuplicateSegment`] if a segment with the same
    /// start timestamp exists, or an I/O error if creation fails.
    pub fn create(dir: &LogDir, start_timestamp: StartTimestamp, size_budget: u64) -> CoreResult<Self> {
        let name = start_timestamp.file_name();
        let path = dir.segment_path(start_timestamp);

        let backend = FileBackend::create_new(&path).map_err(|e| match e {
            StorageError::AlreadyExists { .. } => CoreError::DuplicateSegment { name: name.clone() },
            other => CoreError::Storage(other),
        })?;

        Ok(Self {
            name,
            start_timestamp,
            size_budget,
            path,
            backend: Some(backend),
            occupied_size: 0,
        })
    }

    /// Returns the write side of the segment.
    ///
    /// # Errors
    ///
    /// Returns an error if the segment has been closed.
    pub fn writer(&mut self) -> CoreResult<&mut dyn StorageBackend> {
        match self.backend.as_mut() {
            Some(backend) => Ok(backend as &mut dyn StorageBackend),
            None => Err(CoreError::invalid_operation(format!(
                "segment {} is closed",
                self.name
            ))),
        }
    }

    /// Opens an independent sequential reader over the segment.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn reader(&self) -> CoreResult<BufReader<File>> {
        Ok(BufReader::new(File::open(&self.path)?))
    }

    /// Syncs written data to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the segment is closed or the sync fails.
    pub fn sync(&mut self) -> CoreResult<()> {
        self.writer()?.sync()?;
        Ok(())
    }

    /// Flushes and releases the write handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails or the segment was already closed.
    pub fn close(&mut self) -> CoreResult<()> {
        let mut backend = self.backend.take().ok_or_else(|| {
            CoreError::invalid_operation(format!("segment {} closed twice", self.name))
        })?;

        backend.flush()?;
        self.occupied_size = backend.size()?;
        Ok(())
    }

    /// Returns the segment name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the start timestamp.
    #[must_use]
    pub fn start_timestamp(&self) -> StartTimestamp {
        self.start_timestamp
    }

    /// Returns the advisory size budget.
    #[must_use]
    pub fn size_budget(&self) -> u64 {
        self.size_budget
    }

    /// Returns the path of the segment file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the number of bytes written.
    #[must_use]
    pub fn occupied_size(&self) -> u64 {
        match &self.backend {
            Some(backend) => backend.size().unwrap_or(self.occupied_size),
            None => self.occupied_size,
        }
    }

    /// Returns true if more bytes were written than the budget allows.
    #[must_use]
    pub fn is_over_budget(&self) -> bool {
        self.occupied_size() > self.size_budget
    }

    /// Returns the immutable description of this segment.
    #[must_use]
    pub fn info(&self) -> SegmentInfo {
        SegmentInfo {
            name: self.name.clone(),
            start_timestamp: self.start_timestamp,
            path: self.path.clone(),
            size: self.occupied_size(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::tempdir;

    #[test]
    fn create_names_file_by_start_timestamp() {
        let temp = tempdir().unwrap();
        let dir = LogDir::open(temp.path(), true).unwrap();

        let segment = SegmentFile::create(&dir, StartTimestamp::new(1_700_000_000_000_000_007), 1024).unwrap();
        assert_eq!(segment.name(), "1700000000000000007");
        assert_eq!(segment.path(), temp.path().join("1700000000000000007"));
        assert!(segment.path().exists());
        assert_eq!(segment.occupied_size(), 0);
    }

    #[test]
    fn create_refuses_collision() {
        let temp = tempdir().unwrap();
        let dir = LogDir::open(temp.path(), true).unwrap();

        let mut first = SegmentFile::create(&dir, StartTimestamp::new(5), 1024).unwrap();
        first.writer().unwrap().append(b"kept\n").unwrap();
        first.close().unwrap();

        let err = SegmentFile::create(&dir, StartTimestamp::new(5), 1024).unwrap_err();
        assert!(matches!(err, CoreError::DuplicateSegment { ref name } if name == "5"));
        assert_eq!(std::fs::read(temp.path().join("5")).unwrap(), b"kept\n");
    }

    #[test]
    fn reader_sees_written_bytes() {
        let temp = tempdir().unwrap();
        let dir = LogDir::open(temp.path(), true).unwrap();

        let mut segment = SegmentFile::create(&dir, StartTimestamp::new(9), 1024).unwrap();
        segment.writer().unwrap().append(b"line one\n").unwrap();
        segment.sync().unwrap();

        let mut contents = String::new();
        segment.reader().unwrap().read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "line one\n");
    }

    #[test]
    fn close_keeps_size_and_rejects_writes() {
        let temp = tempdir().unwrap();
        let dir = LogDir::open(temp.path(), true).unwrap();

        let mut segment = SegmentFile::create(&dir, StartTimestamp::new(11), 4).unwrap();
        segment.writer().unwrap().append(b"12345\n").unwrap();
        segment.close().unwrap();

        assert_eq!(segment.occupied_size(), 6);
        assert!(segment.is_over_budget());
        assert!(segment.writer().is_err());
        assert!(segment.close().is_err());
        assert_eq!(segment.info().size, 6);
    }
}
