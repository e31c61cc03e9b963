//! Error types for the log engine.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in log engine operations.
///
/// Variants fall into three families: I/O failures ([`CoreError::is_io_error`]),
/// malformed on-disk data ([`CoreError::is_parse_error`]) and operations that
/// are invalid in the writer's current state ([`CoreError::is_state_error`]).
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] seglog_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A log line or payload does not have the canonical record shape.
    #[error("invalid record: {message}")]
    InvalidRecord {
        /// Description of what failed to parse.
        message: String,
    },

    /// A segment line could not be decoded during replay.
    #[error("segment {segment} corrupted at line {line}: {message}")]
    SegmentCorruption {
        /// Segment name (its start timestamp).
        segment: String,
        /// 1-based line number within the segment.
        line: usize,
        /// Description of the corruption.
        message: String,
    },

    /// Reading a segment failed partway through replay.
    #[error("segment {segment} unreadable at line {line}: {source}")]
    SegmentRead {
        /// Segment name (its start timestamp).
        segment: String,
        /// 1-based number of the line being read.
        line: usize,
        /// Underlying read failure.
        source: io::Error,
    },

    /// The segment index could not be loaded.
    #[error("index corrupted at line {line}: {message}")]
    IndexCorruption {
        /// 1-based line number within the index file.
        line: usize,
        /// Description of the corruption.
        message: String,
    },

    /// A segment with the same start timestamp already exists.
    #[error("segment {name} already exists")]
    DuplicateSegment {
        /// The colliding segment name.
        name: String,
    },

    /// A record does not fit in an empty memtable.
    #[error("record of {size} bytes exceeds buffer capacity of {capacity} bytes")]
    RecordTooLarge {
        /// Footprint of the record, including its line terminator.
        size: usize,
        /// Configured buffer capacity.
        capacity: usize,
    },

    /// The writer has been closed.
    #[error("log writer is closed")]
    WriterClosed,

    /// A background task hit an unrecoverable error and stopped.
    #[error("flush pipeline failed: {message}")]
    PipelineFailed {
        /// The failure that halted the pipeline.
        message: String,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates an invalid record error.
    pub fn invalid_record(message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            message: message.into(),
        }
    }

    /// Creates a segment corruption error.
    pub fn segment_corruption(
        segment: impl Into<String>,
        line: usize,
        message: impl Into<String>,
    ) -> Self {
        Self::SegmentCorruption {
            segment: segment.into(),
            line,
            message: message.into(),
        }
    }

    /// Creates a segment read error.
    pub fn segment_read(segment: impl Into<String>, line: usize, source: io::Error) -> Self {
        Self::SegmentRead {
            segment: segment.into(),
            line,
            source,
        }
    }

    /// Creates an index corruption error.
    pub fn index_corruption(line: usize, message: impl Into<String>) -> Self {
        Self::IndexCorruption {
            line,
            message: message.into(),
        }
    }

    /// Creates a pipeline failure error.
    pub fn pipeline_failed(message: impl Into<String>) -> Self {
        Self::PipelineFailed {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns true for file create/open/read/write failures.
    #[must_use]
    pub fn is_io_error(&self) -> bool {
        matches!(
            self,
            Self::Storage(_) | Self::Io(_) | Self::SegmentRead { .. }
        )
    }

    /// Returns true for malformed log lines, segments or index entries.
    #[must_use]
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidRecord { .. } | Self::SegmentCorruption { .. } | Self::IndexCorruption { .. }
        )
    }

    /// Returns true for operations rejected by the writer's state.
    #[must_use]
    pub fn is_state_error(&self) -> bool {
        matches!(
            self,
            Self::DuplicateSegment { .. }
                | Self::RecordTooLarge { .. }
                | Self::WriterClosed
                | Self::PipelineFailed { .. }
                | Self::InvalidOperation { .. }
        )
    }
}
