//! Log records and their canonical line format.
//!
//! A record is rendered as
//!
//! ```text
//! <[timestamp]> <level> <message>
//! ```
//!
//! where the bracketed timestamp uses one of two formats:
//!
//! - [`TimestampFormat::Local`]: `[Jan 2 2006 15:04:05]` in the local time zone
//! - [`TimestampFormat::Utc`]: `[2006-01-02T15:04:05Z]`
//!
//! Both have second resolution. The line terminator is not part of the
//! encoding; the memtable appends it at flush time.

use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const LOCAL_PATTERN: &str = "[%b %-d %Y %H:%M:%S]";
const UTC_PATTERN: &str = "[%Y-%m-%dT%H:%M:%SZ]";

/// Severity level of a record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Finest-grained tracing output.
    Trace,
    /// Debugging output.
    Debug,
    /// Informational output.
    #[default]
    Info,
    /// Something unexpected but recoverable.
    Warn,
    /// An operation failed.
    Error,
    /// The application cannot continue.
    Fatal,
}

impl Level {
    /// All levels, lowest severity first.
    pub const ALL: [Level; 6] = [
        Level::Trace,
        Level::Debug,
        Level::Info,
        Level::Warn,
        Level::Error,
        Level::Fatal,
    ];

    /// Returns the word used for this level in a log line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Fatal => "fatal",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Level::ALL
            .into_iter()
            .find(|level| level.as_str() == s)
            .ok_or_else(|| CoreError::invalid_record(format!("unknown level {s:?}")))
    }
}

/// How a record's timestamp is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampFormat {
    /// Local wall-clock time, e.g. `[Jan 2 2006 15:04:05]`.
    #[default]
    Local,
    /// UTC in ISO-8601 form, e.g. `[2006-01-02T15:04:05Z]`.
    Utc,
}

impl TimestampFormat {
    /// Formats `timestamp` as a bracketed string.
    #[must_use]
    pub fn render(self, timestamp: &DateTime<Utc>) -> String {
        match self {
            TimestampFormat::Local => timestamp
                .with_timezone(&Local)
                .format(LOCAL_PATTERN)
                .to_string(),
            TimestampFormat::Utc => timestamp.format(UTC_PATTERN).to_string(),
        }
    }

    /// Parses a bracketed timestamp produced by [`TimestampFormat::render`].
    ///
    /// Returns `None` if `text` is not in this format. Local times that are
    /// ambiguous (daylight-saving fold) resolve to the earlier instant.
    #[must_use]
    pub fn parse(self, text: &str) -> Option<DateTime<Utc>> {
        match self {
            TimestampFormat::Local => NaiveDateTime::parse_from_str(text, LOCAL_PATTERN)
                .ok()
                .and_then(|naive| Local.from_local_datetime(&naive).earliest())
                .map(|local| local.with_timezone(&Utc)),
            TimestampFormat::Utc => NaiveDateTime::parse_from_str(text, UTC_PATTERN)
                .ok()
                .map(|naive| naive.and_utc()),
        }
    }
}

/// A single log record.
///
/// Records are immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    timestamp: DateTime<Utc>,
    level: Level,
    timestamp_format: TimestampFormat,
    message: Vec<u8>,
}

impl Record {
    /// Stamps `payload` with the current time.
    #[must_use]
    pub fn format(
        payload: impl Into<Vec<u8>>,
        level: Level,
        timestamp_format: TimestampFormat,
    ) -> Self {
        Self::at(Utc::now(), payload, level, timestamp_format)
    }

    /// Builds a record with an explicit timestamp.
    #[must_use]
    pub fn at(
        timestamp: DateTime<Utc>,
        payload: impl Into<Vec<u8>>,
        level: Level,
        timestamp_format: TimestampFormat,
    ) -> Self {
        Self {
            timestamp,
            level,
            timestamp_format,
            message: payload.into(),
        }
    }

    /// Returns the full-precision timestamp the record was stamped with.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns the severity level.
    #[must_use]
    pub fn level(&self) -> Level {
        self.level
    }

    /// Returns the timestamp format tag.
    #[must_use]
    pub fn timestamp_format(&self) -> TimestampFormat {
        self.timestamp_format
    }

    /// Returns the message bytes.
    #[must_use]
    pub fn message(&self) -> &[u8] {
        &self.message
    }

    /// Consumes the record, returning its message bytes.
    #[must_use]
    pub fn into_message(self) -> Vec<u8> {
        self.message
    }

    /// Encodes the record as `<[timestamp]> <level> <message>`, without a
    /// line terminator.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let timestamp = self.timestamp_format.render(&self.timestamp);
        let level = self.level.as_str();

        let mut buf = Vec::with_capacity(timestamp.len() + level.len() + self.message.len() + 2);
        buf.extend_from_slice(timestamp.as_bytes());
        buf.push(b' ');
        buf.extend_from_slice(level.as_bytes());
        buf.push(b' ');
        buf.extend_from_slice(&self.message);
        buf
    }

    /// Returns the byte length of [`Record::encode`].
    #[must_use]
    pub fn size(&self) -> usize {
        self.timestamp_format.render(&self.timestamp).len()
            + self.level.as_str().len()
            + self.message.len()
            + 2
    }

    /// Decodes one line produced by [`Record::encode`].
    ///
    /// A single trailing `\n` is ignored. The timestamp is tried as
    /// [`TimestampFormat::Local`] first, then [`TimestampFormat::Utc`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidRecord`] if the line is not
    /// `<[timestamp]> <word> <rest>`, the level word is unknown, or the
    /// timestamp matches neither format.
    pub fn decode(line: &[u8]) -> CoreResult<Self> {
        let line = line.strip_suffix(b"\n").unwrap_or(line);

        if line.first() != Some(&b'[') {
            return Err(CoreError::invalid_record("missing bracketed timestamp"));
        }
        let close = line
            .iter()
            .position(|&b| b == b']')
            .ok_or_else(|| CoreError::invalid_record("unterminated timestamp bracket"))?;

        let (stamp, rest) = line.split_at(close + 1);
        let rest = rest
            .strip_prefix(b" ")
            .ok_or_else(|| CoreError::invalid_record("expected space after timestamp"))?;

        let space = rest
            .iter()
            .position(|&b| b == b' ')
            .ok_or_else(|| CoreError::invalid_record("expected space after level"))?;
        let (level, message) = (&rest[..space], &rest[space + 1..]);

        let level = std::str::from_utf8(level)
            .map_err(|_| CoreError::invalid_record("level is not UTF-8"))?
            .parse::<Level>()?;

        let stamp = std::str::from_utf8(stamp)
            .map_err(|_| CoreError::invalid_record("timestamp is not UTF-8"))?;
        let (timestamp, timestamp_format) = [TimestampFormat::Local, TimestampFormat::Utc]
            .into_iter()
            .find_map(|format| format.parse(stamp).map(|ts| (ts, format)))
            .ok_or_else(|| CoreError::invalid_record(format!("unparseable timestamp {stamp}")))?;

        Ok(Self {
            timestamp,
            level,
            timestamp_format,
            message: message.to_vec(),
        })
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.encode()))
    }
}
