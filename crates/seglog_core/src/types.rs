//! Core type definitions.

use std::fmt;
use std::str::FromStr;

/// Start timestamp of a memtable, in nanoseconds since the Unix epoch.
///
/// A segment is named by the start timestamp of the memtable it was flushed
/// from, so the decimal form doubles as the segment's file name and its
/// index entry. Nanosecond resolution keeps two memtables started within
/// the same second from colliding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StartTimestamp(pub i64);

impl StartTimestamp {
    /// Creates a start timestamp from raw nanoseconds.
    #[must_use]
    pub const fn new(nanos: i64) -> Self {
        Self(nanos)
    }

    /// Returns the raw nanosecond value.
    #[must_use]
    pub const fn as_nanos(self) -> i64 {
        self.0
    }

    /// Returns the timestamp one nanosecond later.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Returns the segment file name for this timestamp.
    #[must_use]
    pub fn file_name(self) -> String {
        self.0.to_string()
    }
}

impl fmt::Display for StartTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for StartTimestamp {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<i64>().map(Self)
    }
}
