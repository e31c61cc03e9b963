//! # seglog core
//!
//! Append-only log storage engine.
//!
//! Callers hand [`LogWriter`] raw payloads. Each payload is stamped into a
//! [`Record`] and accumulated in an in-memory [`Memtable`]. When the memtable
//! would overflow it is handed to a background flush pipeline, which writes
//! it to an immutable segment file named by its start timestamp. A second
//! background task records every completed segment in the durable [`Index`].
//! [`LogWriter::replay`] reads all segments back in start-timestamp order.
//!
//! ## On-disk layout
//!
//! ```text
//! <log_dir>/
//! ├─ index                 # one decimal start timestamp per completed segment
//! ├─ 1700000000123456789   # segment: one "<[ts]> <level> <message>\n" per record
//! └─ 1700000004987654321
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use seglog_core::LogWriter;
//!
//! let mut writer = LogWriter::new("logs", 4096, 64 * 1024)?;
//! writer.write(&b"application starting"[..])?;
//! writer.write(&b"loading configs"[..])?;
//! writer.close()?;
//!
//! for record in writer.replay()? {
//!     println!("{}", record?);
//! }
//! # Ok::<(), seglog_core::CoreError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod compaction;
mod config;
mod dir;
mod error;
mod flush;
mod health;
mod index;
mod memtable;
mod record;
mod replay;
mod segment;
mod stats;
mod types;
mod writer;

pub use config::Config;
pub use dir::LogDir;
pub use error::{CoreError, CoreResult};
pub use index::Index;
pub use memtable::Memtable;
pub use record::{Level, Record, TimestampFormat};
pub use replay::Replay;
pub use segment::{SegmentFile, SegmentInfo, SegmentRegistry};
pub use stats::{StatsSnapshot, WriterStats};
pub use types::StartTimestamp;
pub use writer::LogWriter;

/// Crate version, reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
