//! Segment files and the in-memory segment registry.
//!
//! A segment is an immutable file holding one flushed memtable, named by the
//! memtable's start timestamp. Segments are created exactly once by the
//! flush pipeline and are only read afterwards.
//!
//! ## Segment Format
//!
//! ```text
//! <[timestamp]> <level> <message>\n
//! <[timestamp]> <level> <message>\n
//! ...
//! ```
//!
//! There is no header, length prefix or checksum; every line ends in `\n`.

mod file;
mod registry;

pub use file::{SegmentFile, SegmentInfo};
pub use registry::SegmentRegistry;
