//! # seglog storage
//!
//! Byte-store backends underneath the seglog engine.
//!
//! Backends are **opaque byte stores**: they append, read back and make
//! durable whatever bytes they are handed. They know nothing about log
//! lines, segments or the segment index; `seglog_core` owns every file
//! format.
//!
//! ## Available Backends
//!
//! - [`FileBackend`] - Persistent storage on a single OS file
//! - [`InMemoryBackend`] - Ephemeral storage for tests
//!
//! ## Example
//!
//! ```rust
//! use seglog_storage::{InMemoryBackend, StorageBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"[Jan 2 2006 15:04:05] info started\n").unwrap();
//! assert_eq!(offset, 0);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
