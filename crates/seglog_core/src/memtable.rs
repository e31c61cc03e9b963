//! In-memory buffer of records awaiting flush.

use crate::error::CoreResult;
use crate::record::Record;
use crate::types::StartTimestamp;
use seglog_storage::StorageBackend;

/// A size-bounded, ordered accumulator of records.
///
/// The memtable only grows: records are appended in write order and never
/// removed. Once handed to the flush pipeline it is owned by the pipeline
/// and the writer starts a fresh one.
///
/// Each record occupies `record.size() + 1` bytes of capacity; the extra
/// byte is the line terminator written at flush time.
#[derive(Debug)]
pub struct Memtable {
    records: Vec<Record>,
    start_timestamp: Option<StartTimestamp>,
    occupied_size: usize,
    capacity: usize,
}

impl Memtable {
    /// Creates an empty memtable with the given capacity in bytes.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Vec::new(),
            start_timestamp: None,
            occupied_size: 0,
            capacity,
        }
    }

    /// Appends a record.
    ///
    /// The first record fixes the memtable's start timestamp at nanosecond
    /// resolution. Capacity is not checked here; callers check
    /// [`Memtable::fits`] first.
    pub fn append(&mut self, record: Record) {
        if self.start_timestamp.is_none() {
            let stamp = record.timestamp();
            let nanos = stamp
                .timestamp_nanos_opt()
                .unwrap_or_else(|| stamp.timestamp().saturating_mul(1_000_000_000));
            self.start_timestamp = Some(StartTimestamp::new(nanos));
        }

        self.occupied_size += record.size() + 1;
        self.records.push(record);
    }

    /// Moves the start timestamp past `previous` if it does not already
    /// follow it.
    ///
    /// Keeps segment names strictly increasing when the clock is coarse or
    /// has stepped backwards since the previous memtable started.
    pub(crate) fn start_after(&mut self, previous: StartTimestamp) {
        if let Some(start) = self.start_timestamp {
            if start <= previous {
                self.start_timestamp = Some(previous.next());
            }
        }
    }

    /// Returns true if a record of encoded length `size` still fits.
    #[must_use]
    pub fn fits(&self, size: usize) -> bool {
        self.occupied_size + size + 1 <= self.capacity
    }

    /// Writes every record followed by `\n`, in append order, to `sink`.
    ///
    /// Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails. A failed flush may leave part of
    /// the data in `sink`; the caller must not treat it as complete.
    pub fn flush(&self, sink: &mut dyn StorageBackend) -> CoreResult<u64> {
        let mut data = Vec::with_capacity(self.occupied_size);
        for record in &self.records {
            data.extend_from_slice(&record.encode());
            data.push(b'\n');
        }

        sink.append(&data)?;
        Ok(data.len() as u64)
    }

    /// Returns the start timestamp, or `None` while empty.
    #[must_use]
    pub fn start_timestamp(&self) -> Option<StartTimestamp> {
        self.start_timestamp
    }

    /// Returns the number of bytes the buffered records will occupy on disk.
    #[must_use]
    pub fn occupied_size(&self) -> usize {
        self.occupied_size
    }

    /// Returns the capacity in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the buffered records in append order.
    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Returns the number of buffered records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if no record has been appended.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
