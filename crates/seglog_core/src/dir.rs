//! Log directory layout.
//!
//! ```text
//! <log_dir>/
//! ├─ index                 # completed segment start timestamps, one per line
//! ├─ 1700000000123456789   # segment files, named by start timestamp
//! └─ 1700000004987654321
//! ```
//!
//! Any other file in the directory is ignored.

use crate::error::{CoreError, CoreResult};
use crate::types::StartTimestamp;
use std::fs;
use std::path::{Path, PathBuf};

/// File name of the segment index.
pub(crate) const INDEX_FILE: &str = "index";

/// A log directory.
///
/// # Example
///
/// ```rust,no_run
/// use seglog_core::LogDir;
/// use std::path::Path;
///
/// let dir = LogDir::open(Path::new("logs"), true)?;
/// for start in dir.list_segments()? {
///     println!("segment {start}");
/// }
/// # Ok::<(), seglog_core::CoreError>(())
/// ```
#[derive(Debug, Clone)]
pub struct LogDir {
    path: PathBuf,
}

impl LogDir {
    /// Opens or creates a log directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory doesn't exist and
    /// `create_if_missing` is false, if the path is not a directory, or if
    /// creating it fails.
    pub fn open(path: &Path, create_if_missing: bool) -> CoreResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(CoreError::invalid_operation(format!(
                    "log directory does not exist: {}",
                    path.display()
                )));
            }
        }

        if !path.is_dir() {
            return Err(CoreError::invalid_operation(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    /// Returns the directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path of the segment index.
    #[must_use]
    pub fn index_path(&self) -> PathBuf {
        self.path.join(INDEX_FILE)
    }

    /// Returns the path of the segment starting at `start`.
    #[must_use]
    pub fn segment_path(&self, start: StartTimestamp) -> PathBuf {
        self.path.join(start.file_name())
    }

    /// Lists segment files present on disk, in ascending start order.
    ///
    /// A segment file is any regular file whose name is a non-empty run of
    /// ASCII digits.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read.
    pub fn list_segments(&self) -> CoreResult<Vec<StartTimestamp>> {
        let mut segments = Vec::new();

        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }

            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
                continue;
            }
            if let Ok(start) = name.parse::<StartTimestamp>() {
                segments.push(start);
            }
        }

        segments.sort_unstable();
        Ok(segments)
    }

    /// Syncs the directory so that newly created entries are durable.
    #[cfg(unix)]
    pub fn sync(&self) -> CoreResult<()> {
        fs::File::open(&self.path)?.sync_all()?;
        Ok(())
    }

    /// Directory fsync is not available on this platform.
    #[cfg(not(unix))]
    pub fn sync(&self) -> CoreResult<()> {
        Ok(())
    }
}
