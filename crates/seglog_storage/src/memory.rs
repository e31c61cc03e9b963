//! In-memory storage backend for tests and benchmarks.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};

/// A growable byte buffer behind the [`StorageBackend`] trait.
///
/// ```rust
/// use seglog_storage::{InMemoryBackend, StorageBackend};
///
/// let mut backend = InMemoryBackend::new();
/// backend.append(b"[2006-01-02T15:04:05Z] info up\n").unwrap();
/// assert!(backend.data().ends_with(b"up\n"));
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    data: Vec<u8>,
}

impl InMemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns everything appended so far.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl StorageBackend for InMemoryBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        usize::try_from(offset)
            .ok()
            .and_then(|start| self.data.get(start..start.checked_add(len)?))
            .map(<[u8]>::to_vec)
            .ok_or(StorageError::ReadPastEnd {
                offset,
                len,
                size: self.data.len() as u64,
            })
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let offset = self.data.len() as u64;
        self.data.extend_from_slice(data);
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.data.len() as u64)
    }

    fn sync(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        match usize::try_from(new_size) {
            Ok(len) if len <= self.data.len() => {
                self.data.truncate(len);
                Ok(())
            }
            _ => Err(StorageError::TruncatePastEnd {
                requested: new_size,
                size: self.data.len() as u64,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn out_of_range_access_fails() {
        let mut backend = InMemoryBackend::new();
        backend.append(b"12\n3").unwrap();

        assert!(matches!(backend.read_at(2, 4), Err(StorageError::ReadPastEnd { .. })));
        assert!(matches!(backend.truncate(9), Err(StorageError::TruncatePastEnd { .. })));
        backend.truncate(3).unwrap();
        assert_eq!(backend.data(), b"12\n");
    }

    proptest! {
        #[test]
        fn append_offsets_are_cumulative(chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..32), 0..16)) {
            let mut backend = InMemoryBackend::new();
            let mut expected = 0u64;
            for chunk in &chunks {
                prop_assert_eq!(backend.append(chunk).unwrap(), expected);
                expected += chunk.len() as u64;
            }
            prop_assert_eq!(backend.size().unwrap(), expected);
            let concatenated = chunks.concat();
            prop_assert_eq!(backend.data(), concatenated.as_slice());
        }
    }
}
