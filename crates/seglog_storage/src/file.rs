//! File-based storage backend.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A storage backend over a single OS file.
///
/// Writes always land at the end of the file. `flush` hands buffered bytes
/// to the OS; `sync` waits for them to reach the disk.
///
/// Reads seek the shared file cursor, so concurrent `read_at` calls on one
/// backend must be serialized by the caller.
///
/// # Example
///
/// ```no_run
/// use seglog_storage::{FileBackend, StorageBackend};
/// use std::path::Path;
///
/// let mut backend = FileBackend::open(Path::new("logs/index")).unwrap();
/// backend.append(b"1700000000000000000\n").unwrap();
/// backend.sync().unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    file: File,
    len: u64,
}

impl FileBackend {
    /// Opens the file at `path`, creating it if it does not exist.
    ///
    /// Existing contents are kept; new data is appended after them.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .append(true)
            .create(true)
            .open(path)?;
        Self::from_file(path, file)
    }

    /// Creates a new, empty file at `path`.
    ///
    /// Unlike [`FileBackend::open`], this never reuses an existing file.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::AlreadyExists`] if a file is already present
    /// at `path`, or an I/O error if creation fails.
    pub fn create_new(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .append(true)
            .create_new(true)
            .open(path)
            .map_err(|err| match err.kind() {
                io::ErrorKind::AlreadyExists => StorageError::AlreadyExists {
                    path: path.to_path_buf(),
                },
                _ => StorageError::Io(err),
            })?;
        Self::from_file(path, file)
    }

    fn from_file(path: &Path, file: File) -> StorageResult<Self> {
        let len = file.metadata()?.len();
        Ok(Self {
            path: path.to_path_buf(),
            file,
            len,
        })
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StorageBackend for FileBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let in_bounds = offset
            .checked_add(len as u64)
            .is_some_and(|end| end <= self.len);
        if !in_bounds {
            return Err(StorageError::ReadPastEnd {
                offset,
                len,
                size: self.len,
            });
        }

        let mut buf = vec![0u8; len];
        if len > 0 {
            let mut file = &self.file;
            file.seek(SeekFrom::Start(offset))?;
            file.read_exact(&mut buf)?;
        }
        Ok(buf)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let offset = self.len;
        if !data.is_empty() {
            self.file.write_all(data)?;
            self.len += data.len() as u64;
        }
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        Ok(self.file.flush()?)
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.len)
    }

    fn sync(&mut self) -> StorageResult<()> {
        Ok(self.file.sync_all()?)
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        if new_size > self.len {
            return Err(StorageError::TruncatePastEnd {
                requested: new_size,
                size: self.len,
            });
        }
        self.file.set_len(new_size)?;
        self.file.sync_all()?;
        self.len = new_size;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index");

        let backend = FileBackend::open(&path).unwrap();
        assert_eq!(backend.size().unwrap(), 0);
        assert!(path.exists());
    }

    #[test]
    fn append_and_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index");

        let mut backend = FileBackend::open(&path).unwrap();

        assert_eq!(backend.append(b"100\n").unwrap(), 0);
        assert_eq!(backend.append(b"200\n").unwrap(), 4);
        assert_eq!(backend.size().unwrap(), 8);

        assert_eq!(backend.read_at(0, 8).unwrap(), b"100\n200\n");
        assert_eq!(backend.read_at(4, 3).unwrap(), b"200");
    }

    #[test]
    fn read_past_end_fails() {
        let dir = tempdir().unwrap();
        let mut backend = FileBackend::open(&dir.path().join("f")).unwrap();
        backend.append(b"hello").unwrap();

        let result = backend.read_at(3, 5);
        assert!(matches!(result, Err(StorageError::ReadPastEnd { .. })));
    }

    #[test]
    fn open_keeps_existing_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index");

        {
            let mut backend = FileBackend::open(&path).unwrap();
            backend.append(b"1\n").unwrap();
            backend.sync().unwrap();
        }

        let mut backend = FileBackend::open(&path).unwrap();
        assert_eq!(backend.size().unwrap(), 2);
        assert_eq!(backend.append(b"2\n").unwrap(), 2);
        assert_eq!(backend.read_at(0, 4).unwrap(), b"1\n2\n");
    }

    #[test]
    fn create_new_refuses_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("1700000000000000000");

        let mut first = FileBackend::create_new(&path).unwrap();
        first.append(b"line\n").unwrap();

        let second = FileBackend::create_new(&path);
        assert!(matches!(second, Err(StorageError::AlreadyExists { .. })));

        // the original contents survive the failed attempt
        assert_eq!(std::fs::read(&path).unwrap(), b"line\n");
    }

    #[test]
    fn truncate_cuts_tail() {
        let dir = tempdir().unwrap();
        let mut backend = FileBackend::open(&dir.path().join("index")).unwrap();
        backend.append(b"100\n20").unwrap();

        backend.truncate(4).unwrap();
        assert_eq!(backend.size().unwrap(), 4);
        assert_eq!(backend.append(b"300\n").unwrap(), 4);
        assert_eq!(backend.read_at(0, 8).unwrap(), b"100\n300\n");
    }

    #[test]
    fn truncate_past_end_fails() {
        let dir = tempdir().unwrap();
        let mut backend = FileBackend::open(&dir.path().join("index")).unwrap();
        backend.append(b"abc").unwrap();

        let result = backend.truncate(10);
        assert!(matches!(result, Err(StorageError::TruncatePastEnd { .. })));
    }

    #[test]
    fn empty_append_returns_current_size() {
        let dir = tempdir().unwrap();
        let mut backend = FileBackend::open(&dir.path().join("f")).unwrap();
        backend.append(b"x").unwrap();

        assert_eq!(backend.append(b"").unwrap(), 1);
        assert_eq!(backend.size().unwrap(), 1);
    }
}
