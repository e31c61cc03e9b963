//! In-memory registry of segments known to the writer.

use super::SegmentInfo;
use crate::error::{CoreError, CoreResult};
use crate::types::StartTimestamp;
use parking_lot::RwLock;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
struct Entry {
    info: SegmentInfo,
    sealed: bool,
}

/// Segments by start timestamp.
///
/// The flush pipeline registers a segment before writing it and seals it
/// once the write succeeded. Replay only ever sees sealed segments, so a
/// reader never observes a half-written file.
#[derive(Debug, Default)]
pub struct SegmentRegistry {
    segments: RwLock<BTreeMap<StartTimestamp, Entry>>,
}

impl SegmentRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a segment that is about to be written.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DuplicateSegment`] if the start timestamp is
    /// already registered.
    pub fn register(&self, info: SegmentInfo) -> CoreResult<()> {
        self.insert(info, false)
    }

    /// Registers a segment that is already complete on disk.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DuplicateSegment`] if the start timestamp is
    /// already registered.
    pub fn register_sealed(&self, info: SegmentInfo) -> CoreResult<()> {
        self.insert(info, true)
    }

    fn insert(&self, info: SegmentInfo, sealed: bool) -> CoreResult<()> {
        let mut segments = self.segments.write();
        if segments.contains_key(&info.start_timestamp) {
            return Err(CoreError::DuplicateSegment { name: info.name });
        }
        segments.insert(info.start_timestamp, Entry { info, sealed });
        Ok(())
    }

    /// Marks a segment complete and records its final size.
    ///
    /// Returns the sealed segment's info, or `None` if it is not registered.
    pub fn seal(&self, start: StartTimestamp, size: u64) -> Option<SegmentInfo> {
        let mut segments = self.segments.write();
        let entry = segments.get_mut(&start)?;
        entry.info.size = size;
        entry.sealed = true;
        Some(entry.info.clone())
    }

    /// Removes a segment whose write failed.
    pub fn unregister(&self, start: StartTimestamp) -> Option<SegmentInfo> {
        self.segments.write().remove(&start).map(|entry| entry.info)
    }

    /// Returns the sealed segments in ascending start order.
    #[must_use]
    pub fn sealed(&self) -> Vec<SegmentInfo> {
        self.segments
            .read()
            .values()
            .filter(|entry| entry.sealed)
            .map(|entry| entry.info.clone())
            .collect()
    }

    /// Returns the info of a registered segment.
    #[must_use]
    pub fn get(&self, start: StartTimestamp) -> Option<SegmentInfo> {
        self.segments.read().get(&start).map(|entry| entry.info.clone())
    }

    /// Returns true if the start timestamp is registered.
    #[must_use]
    pub fn contains(&self, start: StartTimestamp) -> bool {
        self.segments.read().contains_key(&start)
    }

    /// Returns the number of registered segments, sealed or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.read().len()
    }

    /// Returns true if no segment is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.read().is_empty()
    }

    /// Returns the number of sealed segments.
    #[must_use]
    pub fn sealed_count(&self) -> usize {
        self.segments.read().values().filter(|entry| entry.sealed).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn info(start: i64) -> SegmentInfo {
        let start = StartTimestamp::new(start);
        SegmentInfo {
            name: start.file_name(),
            start_timestamp: start,
            path: PathBuf::from(start.file_name()),
            size: 0,
        }
    }

    #[test]
    fn sealed_is_ordered_numerically() {
        let registry = SegmentRegistry::new();
        registry.register_sealed(info(1000)).unwrap();
        registry.register_sealed(info(20)).unwrap();
        registry.register_sealed(info(300)).unwrap();

        let names: Vec<_> = registry.sealed().into_iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["20", "300", "1000"]);
    }

    #[test]
    fn unsealed_segments_are_hidden() {
        let registry = SegmentRegistry::new();
        registry.register(info(1)).unwrap();
        registry.register_sealed(info(2)).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.sealed_count(), 1);

        let sealed = registry.seal(StartTimestamp::new(1), 42).unwrap();
        assert_eq!(sealed.size, 42);
        assert_eq!(registry.sealed().len(), 2);
    }

    #[test]
    fn duplicate_registration_fails() {
        let registry = SegmentRegistry::new();
        registry.register(info(7)).unwrap();

        let err = registry.register_sealed(info(7)).unwrap_err();
        assert!(matches!(err, CoreError::DuplicateSegment { .. }));
    }

    #[test]
    fn unregister_and_seal_unknown() {
        let registry = SegmentRegistry::new();
        registry.register(info(7)).unwrap();

        assert!(registry.unregister(StartTimestamp::new(7)).is_some());
        assert!(!registry.contains(StartTimestamp::new(7)));
        assert!(registry.seal(StartTimestamp::new(7), 0).is_none());
        assert!(registry.is_empty());
    }
}
